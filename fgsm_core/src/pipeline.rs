//! End-to-end run: load, attack once, composite per region, render, log.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::attack::{fgsm_attack, sign_noise, summarize, AttackSummary};
use crate::autodiff::GradContext;
use crate::checkpoint::Checkpointable;
use crate::classifier::{Classifier, Label, MlpClassifier};
use crate::config::AttackConfig;
use crate::error::{FgsmError, FgsmResult};
use crate::loader::{load_image, INPUT_SIZE};
use crate::logging::{log_attack, log_region};
use crate::region::{apply_noise_to_regions, Region};
use crate::tensor::{ImageTensor, TensorStatistics};
use crate::visualize::plot_images;

/// Outcome of compositing the noise into one region.
#[derive(Debug, Clone, Serialize)]
pub struct RegionReport {
    pub region: Region,
    pub figure: PathBuf,
    pub statistics: TensorStatistics,
    /// Pixel positions where at least one channel differs from the original
    pub changed_pixels: usize,
    pub prediction: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub summary: AttackSummary,
    pub original_prediction: usize,
    pub perturbed_prediction: usize,
    pub regions: Vec<RegionReport>,
}

/// Loads the checkpoint named by `config.weights`, or falls back to a seeded
/// untrained classifier.
///
/// A loaded checkpoint carries its own architecture, which replaces the
/// `[classifier]` settings. It must accept [`INPUT_SIZE`] square images and
/// score `config.label`; otherwise this fails with
/// [`FgsmError::IncompatibleWeights`] or [`FgsmError::LabelOutOfRange`].
pub fn build_classifier(config: &AttackConfig) -> FgsmResult<MlpClassifier> {
    let classifier = match &config.weights {
        Some(path) => {
            info!(path = %path.display(), "loading classifier weights");
            let classifier = MlpClassifier::load_checkpoint(path)?;
            let loaded = classifier.config();
            if loaded.input_height != INPUT_SIZE || loaded.input_width != INPUT_SIZE {
                return Err(FgsmError::IncompatibleWeights(format!(
                    "{} expects {}x{} inputs, images are loaded at {INPUT_SIZE}x{INPUT_SIZE}",
                    path.display(),
                    loaded.input_height,
                    loaded.input_width
                )));
            }
            if loaded.hidden_size != config.classifier.hidden_size
                || loaded.num_classes != config.classifier.num_classes
            {
                warn!(
                    hidden_size = loaded.hidden_size,
                    num_classes = loaded.num_classes,
                    "checkpoint architecture overrides [classifier] settings"
                );
            }
            classifier
        }
        None => {
            warn!(
                seed = config.classifier.seed,
                "no classifier weights configured; using randomly initialized classifier"
            );
            MlpClassifier::new(config.classifier.clone())
        }
    };

    let num_classes = classifier.num_classes();
    if config.label >= num_classes {
        return Err(FgsmError::LabelOutOfRange {
            label: config.label,
            num_classes,
        });
    }
    Ok(classifier)
}

/// Runs the attack once and renders one figure per region into
/// `config.output_dir`.
///
/// Noise is always composited onto the original image, never onto a
/// previous region's result. If the attack fails nothing is rendered.
pub fn run_pipeline(
    config: &AttackConfig,
    classifier: &dyn Classifier,
) -> FgsmResult<PipelineReport> {
    let image = load_image(&config.image_path)?;
    info!(path = %config.image_path.display(), shape = ?image.shape(), "image loaded");

    let label = Label::new(config.label);
    let mut ctx = GradContext::new();
    let output = fgsm_attack(classifier, &mut ctx, &image, label, config.epsilon)?;
    let summary = summarize(&output, label, config.epsilon);

    let original_prediction = classifier.predict(&image)?;
    let perturbed_prediction = classifier.predict(&output.perturbed)?;
    info!(
        loss = summary.loss,
        original_prediction,
        perturbed_prediction,
        "attack complete"
    );

    if let Err(err) = log_attack(
        &config.log_dir,
        &summary,
        original_prediction,
        perturbed_prediction,
        &output.gradient.statistics(),
    ) {
        warn!("failed to write attack log: {err}");
    }

    let noise = sign_noise(&output.gradient, config.epsilon);
    let mut regions = Vec::with_capacity(Region::ALL.len());
    for region in Region::ALL {
        let report = render_region(config, classifier, &image, &noise, region)?;
        regions.push(report);
    }

    Ok(PipelineReport {
        summary,
        original_prediction,
        perturbed_prediction,
        regions,
    })
}

fn render_region(
    config: &AttackConfig,
    classifier: &dyn Classifier,
    image: &ImageTensor,
    noise: &ImageTensor,
    region: Region,
) -> FgsmResult<RegionReport> {
    let perturbed = apply_noise_to_regions(image, noise, region)?;
    let figure = figure_path(&config.output_dir, region);
    plot_images(image, noise, &perturbed, &figure, &config.style)?;

    let statistics = perturbed.statistics();
    let changed_pixels = changed_pixels(image, &perturbed);
    let prediction = classifier.predict(&perturbed)?;
    info!(%region, changed_pixels, prediction, figure = %figure.display(), "region rendered");

    if let Err(err) = log_region(&config.log_dir, region, &statistics, changed_pixels) {
        warn!("failed to write region log for {region}: {err}");
    }

    Ok(RegionReport {
        region,
        figure,
        statistics,
        changed_pixels,
        prediction,
    })
}

pub fn figure_path(output_dir: &Path, region: Region) -> PathBuf {
    output_dir.join(format!("region_{}.png", region.as_str()))
}

fn changed_pixels(original: &ImageTensor, perturbed: &ImageTensor) -> usize {
    let (_, channels, height, width) = original.shape();
    let mut count = 0;
    for row in 0..height {
        for col in 0..width {
            if (0..channels).any(|c| original.get(c, row, col) != perturbed.get(c, row, col)) {
                count += 1;
            }
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ClassifierConfig;

    #[test]
    fn test_figure_path_uses_region_tag() {
        let path = figure_path(Path::new("out"), Region::BottomLeft);
        assert_eq!(path, PathBuf::from("out/region_bottom_left.png"));
    }

    #[test]
    fn test_changed_pixels_counts_positions() {
        let original = ImageTensor::from_elem(4, 4, 0.5);
        let mut noise = ImageTensor::zeros(4, 4);
        noise.add_window(&ImageTensor::from_elem(4, 4, 0.1), 0..2, 0..1);
        let perturbed = original.try_add(&noise).unwrap();
        assert_eq!(changed_pixels(&original, &perturbed), 2);
        assert_eq!(changed_pixels(&original, &original), 0);
    }

    #[test]
    fn test_build_classifier_without_weights_uses_seed() {
        let mut config = AttackConfig::default();
        config.classifier.input_height = 4;
        config.classifier.input_width = 4;
        config.classifier.num_classes = 3;
        let a = build_classifier(&config).unwrap();
        let b = MlpClassifier::new(config.classifier.clone());
        let image = ImageTensor::from_elem(4, 4, 0.3);
        assert_eq!(a.forward(&image).unwrap(), b.forward(&image).unwrap());
    }

    fn saved_weights(name: &str, classifier: &ClassifierConfig) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "selective-fgsm-weights-{name}-{}.bin",
            std::process::id()
        ));
        MlpClassifier::new(classifier.clone())
            .save_checkpoint(&path)
            .unwrap();
        path
    }

    #[test]
    fn test_build_classifier_rejects_wrong_input_size() {
        let small = ClassifierConfig {
            input_height: 32,
            input_width: 32,
            hidden_size: 4,
            num_classes: 3,
            seed: 1,
        };
        let mut config = AttackConfig::default();
        config.weights = Some(saved_weights("small-input", &small));

        let result = build_classifier(&config);
        std::fs::remove_file(config.weights.as_ref().unwrap()).ok();
        assert!(matches!(
            result,
            Err(FgsmError::IncompatibleWeights(msg)) if msg.contains("32x32")
        ));
    }

    #[test]
    fn test_build_classifier_rejects_label_beyond_checkpoint_classes() {
        let narrow = ClassifierConfig {
            hidden_size: 1,
            num_classes: 2,
            ..ClassifierConfig::default()
        };
        let mut config = AttackConfig::default();
        config.label = 5;
        config.weights = Some(saved_weights("narrow-head", &narrow));

        let result = build_classifier(&config);
        std::fs::remove_file(config.weights.as_ref().unwrap()).ok();
        assert!(matches!(
            result,
            Err(FgsmError::LabelOutOfRange {
                label: 5,
                num_classes: 2
            })
        ));
    }

    #[test]
    fn test_build_classifier_missing_checkpoint_fails() {
        let mut config = AttackConfig::default();
        config.weights = Some(std::env::temp_dir().join("selective-fgsm-no-such-weights.bin"));
        assert!(build_classifier(&config).is_err());
    }
}
