//! Image classification model
//!
//! A two-layer perceptron over the flattened `[3, H, W]` image:
//! Input → Hidden (ReLU) → Logits. Backpropagation is written out by hand
//! and reaches all the way to the input pixels.

use ndarray::{Array1, Array2, Array4, Axis};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::Classifier;
use crate::autodiff::GradContext;
use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::error::{FgsmError, FgsmResult};
use crate::tensor::{ImageTensor, CHANNELS};

/// Configuration for the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Input image height
    pub input_height: usize,
    /// Input image width
    pub input_width: usize,
    /// Hidden layer size
    pub hidden_size: usize,
    /// Output size (number of classes)
    pub num_classes: usize,
    /// Random seed for weight initialization
    pub seed: u64,
}

impl ClassifierConfig {
    /// Flattened input length, channels included.
    pub fn input_size(&self) -> usize {
        CHANNELS * self.input_height * self.input_width
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            input_height: 224,
            input_width: 224,
            hidden_size: 32,
            num_classes: 1000,
            seed: 42,
        }
    }
}

/// Simple MLP classifier: Input → Hidden (ReLU) → Logits
#[derive(Debug, Clone)]
pub struct MlpClassifier {
    config: ClassifierConfig,
    // Layer 1: input → hidden
    w1: Array2<f32>, // [hidden_size, input_size]
    b1: Array1<f32>, // [hidden_size]
    // Layer 2: hidden → logits
    w2: Array2<f32>, // [num_classes, hidden_size]
    b2: Array1<f32>, // [num_classes]
}

/// Row-major parameter dump stored in a weights file.
#[derive(Serialize, Deserialize)]
pub struct MlpSnapshot {
    config: ClassifierConfig,
    w1: Vec<f32>,
    b1: Vec<f32>,
    w2: Vec<f32>,
    b2: Vec<f32>,
}

impl MlpClassifier {
    /// Create a new MLP classifier with seeded random initialization
    pub fn new(config: ClassifierConfig) -> Self {
        let mut rng = rand::rngs::StdRng::seed_from_u64(config.seed);
        let input_size = config.input_size();

        // Xavier initialization for weights
        let w1_scale = (2.0 / input_size as f32).sqrt();
        let w1 = Array2::from_shape_fn((config.hidden_size, input_size), |_| {
            (rng.gen::<f32>() - 0.5) * 2.0 * w1_scale
        });
        let b1 = Array1::zeros(config.hidden_size);

        let w2_scale = (2.0 / config.hidden_size as f32).sqrt();
        let w2 = Array2::from_shape_fn((config.num_classes, config.hidden_size), |_| {
            (rng.gen::<f32>() - 0.5) * 2.0 * w2_scale
        });
        let b2 = Array1::zeros(config.num_classes);

        Self {
            config,
            w1,
            b1,
            w2,
            b2,
        }
    }

    /// Builds a classifier from explicit parameters.
    ///
    /// Fails with [`CheckpointError::InvalidFormat`] when a parameter does not
    /// match the shape implied by `config`.
    pub fn from_parameters(
        config: ClassifierConfig,
        w1: Vec<f32>,
        b1: Vec<f32>,
        w2: Vec<f32>,
        b2: Vec<f32>,
    ) -> Result<Self, CheckpointError> {
        let shape_error = |name: &str, err: ndarray::ShapeError| {
            CheckpointError::InvalidFormat(format!("{name}: {err}"))
        };

        let w1 = Array2::from_shape_vec((config.hidden_size, config.input_size()), w1)
            .map_err(|err| shape_error("w1", err))?;
        let w2 = Array2::from_shape_vec((config.num_classes, config.hidden_size), w2)
            .map_err(|err| shape_error("w2", err))?;
        if b1.len() != config.hidden_size {
            return Err(CheckpointError::InvalidFormat(format!(
                "b1: expected {} values, found {}",
                config.hidden_size,
                b1.len()
            )));
        }
        if b2.len() != config.num_classes {
            return Err(CheckpointError::InvalidFormat(format!(
                "b2: expected {} values, found {}",
                config.num_classes,
                b2.len()
            )));
        }

        Ok(Self {
            config,
            w1,
            b1: Array1::from_vec(b1),
            w2,
            b2: Array1::from_vec(b2),
        })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Flatten an image into a 1D feature vector in `[channel, row, col]` order
    fn flatten(&self, image: &ImageTensor) -> FgsmResult<Array1<f32>> {
        let expected = (1, CHANNELS, self.config.input_height, self.config.input_width);
        if image.shape() != expected {
            return Err(FgsmError::ShapeMismatch {
                expected,
                got: image.shape(),
                context: "MlpClassifier input".to_string(),
            });
        }
        Ok(Array1::from_vec(image.to_vec()))
    }

    /// Forward pass with intermediate activations
    fn forward_with_cache(&self, input: &Array1<f32>) -> (Array1<f32>, Array1<f32>, Array1<f32>) {
        // Hidden layer: z1 = W1 * x + b1
        let z1 = self.w1.dot(input) + &self.b1;
        let h1 = z1.mapv(|v| v.max(0.0));

        // Output layer: z2 = W2 * h1 + b2
        let logits = self.w2.dot(&h1) + &self.b2;

        (logits, h1, z1)
    }
}

impl Classifier for MlpClassifier {
    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn forward(&self, image: &ImageTensor) -> FgsmResult<Array2<f32>> {
        let input = self.flatten(image)?;
        let (logits, _, _) = self.forward_with_cache(&input);
        Ok(logits.insert_axis(Axis(0)))
    }

    fn backward(
        &self,
        ctx: &mut GradContext,
        image: &ImageTensor,
        grad_logits: &Array2<f32>,
    ) -> FgsmResult<ImageTensor> {
        ctx.begin_backward()?;

        let input = self.flatten(image)?;
        let (_, h1, z1) = self.forward_with_cache(&input);
        let dz2 = grad_logits.index_axis(Axis(0), 0).to_owned();

        // Output layer parameters
        let dw2 = outer(&dz2, &h1);
        ctx.accumulate("w2", dw2.view().into_dyn());
        ctx.accumulate("b2", dz2.view().into_dyn());

        // Hidden layer gradient through ReLU
        let dh1 = self.w2.t().dot(&dz2);
        let relu_mask = z1.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let dz1 = &dh1 * &relu_mask;

        let dw1 = outer(&dz1, &input);
        ctx.accumulate("w1", dw1.view().into_dyn());
        ctx.accumulate("b1", dz1.view().into_dyn());

        // Input gradient
        let dx = self.w1.t().dot(&dz1);
        let len = dx.len();
        let dx: Array4<f32> = dx
            .into_shape((1, CHANNELS, self.config.input_height, self.config.input_width))
            .map_err(|_| FgsmError::ShapeMismatch {
                expected: image.shape(),
                got: (1, 1, 1, len),
                context: "MlpClassifier input gradient".to_string(),
            })?;
        let gradient = ImageTensor::from_array(dx)?;
        ctx.set_input_grad(gradient.clone());

        Ok(gradient)
    }
}

impl Checkpointable for MlpClassifier {
    const VERSION: u32 = 1;

    type Snapshot = MlpSnapshot;

    fn snapshot(&self) -> MlpSnapshot {
        MlpSnapshot {
            config: self.config.clone(),
            w1: self.w1.iter().cloned().collect(),
            b1: self.b1.to_vec(),
            w2: self.w2.iter().cloned().collect(),
            b2: self.b2.to_vec(),
        }
    }

    fn restore(snapshot: MlpSnapshot) -> Result<Self, CheckpointError> {
        Self::from_parameters(
            snapshot.config,
            snapshot.w1,
            snapshot.b1,
            snapshot.w2,
            snapshot.b2,
        )
    }
}

fn outer(lhs: &Array1<f32>, rhs: &Array1<f32>) -> Array2<f32> {
    let column = lhs.view().insert_axis(Axis(1));
    let row = rhs.view().insert_axis(Axis(0));
    column.dot(&row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{cross_entropy, Label};

    fn small_config() -> ClassifierConfig {
        ClassifierConfig {
            input_height: 4,
            input_width: 5,
            hidden_size: 8,
            num_classes: 3,
            seed: 7,
        }
    }

    fn sample_image() -> ImageTensor {
        ImageTensor::from_shape_fn(4, 5, |c, h, w| ((c * 20 + h * 5 + w) as f32 * 0.37).sin().abs())
    }

    #[test]
    fn test_mlp_creation() {
        let classifier = MlpClassifier::new(small_config());

        assert_eq!(classifier.w1.dim(), (8, 60));
        assert_eq!(classifier.b1.dim(), 8);
        assert_eq!(classifier.w2.dim(), (3, 8));
        assert_eq!(classifier.b2.dim(), 3);
    }

    #[test]
    fn test_forward_shape_and_determinism() {
        let a = MlpClassifier::new(small_config());
        let b = MlpClassifier::new(small_config());
        let image = sample_image();

        let logits = a.forward(&image).unwrap();
        assert_eq!(logits.dim(), (1, 3));
        assert_eq!(logits, b.forward(&image).unwrap());
        assert!(a.predict(&image).unwrap() < 3);
    }

    #[test]
    fn test_forward_rejects_wrong_shape() {
        let classifier = MlpClassifier::new(small_config());
        let err = classifier.forward(&ImageTensor::zeros(5, 5)).unwrap_err();
        assert!(matches!(err, FgsmError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_input_gradient_matches_finite_difference() {
        let classifier = MlpClassifier::new(small_config());
        let image = sample_image();
        let label = Label::new(1);

        let mut ctx = GradContext::new();
        ctx.zero_grad();
        ctx.watch_input();
        let logits = classifier.forward(&image).unwrap();
        let (_, grad_logits) = cross_entropy(&logits, label).unwrap();
        let gradient = classifier.backward(&mut ctx, &image, &grad_logits).unwrap();

        let loss_at = |tensor: &ImageTensor| {
            let logits = classifier.forward(tensor).unwrap();
            cross_entropy(&logits, label).unwrap().0
        };

        let step = 1e-3f32;
        for &(c, h, w) in &[(0, 0, 0), (1, 2, 3), (2, 3, 4)] {
            let bump = |delta: f32| {
                ImageTensor::from_shape_fn(4, 5, |cc, hh, ww| {
                    let base = image.get(cc, hh, ww);
                    if (cc, hh, ww) == (c, h, w) {
                        base + delta
                    } else {
                        base
                    }
                })
            };
            let numeric = (loss_at(&bump(step)) - loss_at(&bump(-step))) / (2.0 * step);
            let analytic = gradient.get(c, h, w);
            assert!(
                (numeric - analytic).abs() < 1e-2,
                "pixel ({c},{h},{w}): numeric {numeric} vs analytic {analytic}"
            );
        }

        assert!(ctx.input_grad().is_some());
        assert_eq!(
            ctx.parameter_grad("w1").map(|g| g.shape().to_vec()),
            Some(vec![8, 60])
        );
    }

    #[test]
    fn test_parameter_gradients_accumulate_until_reset() {
        let classifier = MlpClassifier::new(small_config());
        let image = sample_image();
        let logits = classifier.forward(&image).unwrap();
        let (_, grad_logits) = cross_entropy(&logits, Label::new(0)).unwrap();

        let mut ctx = GradContext::new();
        ctx.watch_input();
        ctx.zero_grad();
        classifier.backward(&mut ctx, &image, &grad_logits).unwrap();
        let first = ctx.parameter_grad("b2").unwrap().to_owned();

        assert!(matches!(
            classifier.backward(&mut ctx, &image, &grad_logits),
            Err(FgsmError::StaleGradients)
        ));

        ctx.zero_grad();
        classifier.backward(&mut ctx, &image, &grad_logits).unwrap();
        assert_eq!(ctx.parameter_grad("b2").unwrap(), &first);
    }

    #[test]
    fn test_checkpoint_roundtrip() {
        let classifier = MlpClassifier::new(small_config());
        let path = std::env::temp_dir().join(format!(
            "selective-fgsm-mlp-{}.bin",
            std::process::id()
        ));
        classifier.save_checkpoint(&path).unwrap();
        let restored = MlpClassifier::load_checkpoint(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let image = sample_image();
        assert_eq!(restored.config(), classifier.config());
        assert_eq!(
            restored.forward(&image).unwrap(),
            classifier.forward(&image).unwrap()
        );
    }

    #[test]
    fn test_from_parameters_rejects_bad_shapes() {
        let config = small_config();
        let err = MlpClassifier::from_parameters(config, vec![0.0; 3], vec![], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, CheckpointError::InvalidFormat(_)));
    }
}
