use selective_fgsm::{
    build_classifier, register_caption_font, run_pipeline, AttackConfig, ConfigError,
};
use tracing::warn;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = load_config()?;
    println!(
        "Loaded config: image={} label={} epsilon={} output={}",
        config.image_path.display(),
        config.label,
        config.epsilon,
        config.output_dir.display()
    );

    if let Some(font) = &config.font_path {
        if let Err(err) = register_caption_font(font) {
            warn!("captions disabled: {err}");
        }
    }

    let classifier = build_classifier(&config)?;
    let report = run_pipeline(&config, &classifier)?;

    println!(
        "Attack loss {:.6}: class {} -> {}",
        report.summary.loss, report.original_prediction, report.perturbed_prediction
    );
    for region in &report.regions {
        println!(
            "  {:<12} changed={:>6} predicted={:>4} -> {}",
            region.region.as_str(),
            region.changed_pixels,
            region.prediction,
            region.figure.display()
        );
    }
    Ok(())
}

fn load_config() -> Result<AttackConfig, ConfigError> {
    AttackConfig::load_from_file("config/attack.toml").or_else(|err| {
        eprintln!("Falling back to default config: {err}");
        Ok(AttackConfig::default())
    })
}
