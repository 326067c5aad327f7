//! Attack configuration via TOML files.
//!
//! Every section and key is optional; missing values fall back to defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierConfig;
use crate::loader::INPUT_SIZE;
use crate::visualize::FigureStyle;

/// Attack configuration loaded from a TOML file.
///
/// # Examples
///
/// ```
/// use selective_fgsm::AttackConfig;
///
/// let config = AttackConfig::load_from_file("config/attack.toml")
///     .unwrap_or_else(|_| AttackConfig::default());
///
/// println!("epsilon={} label={}", config.epsilon, config.label);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackConfig {
    /// Image to attack
    pub image_path: PathBuf,
    /// Class index whose loss the attack increases
    pub label: usize,
    /// Perturbation magnitude
    pub epsilon: f32,
    /// Directory receiving one figure per region
    pub output_dir: PathBuf,
    /// Directory receiving JSON-lines logs
    pub log_dir: PathBuf,
    /// Classifier architecture and seed
    pub classifier: ClassifierConfig,
    /// Optional checkpoint with pretrained classifier weights
    pub weights: Option<PathBuf>,
    /// Figure size and captions
    pub style: FigureStyle,
    /// Optional TrueType font used for panel captions
    pub font_path: Option<PathBuf>,
}

impl AttackConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    pub fn from_str(toml_str: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig =
            toml::from_str(toml_str).map_err(|err| ConfigError::Parse(err.to_string()))?;

        let attack = raw.attack;
        if !attack.epsilon.is_finite() || attack.epsilon < 0.0 {
            return Err(ConfigError::Parse(
                "attack.epsilon must be finite and ≥ 0".into(),
            ));
        }

        let classifier = raw.classifier;
        if classifier.hidden_size == 0 {
            return Err(ConfigError::Parse(
                "classifier.hidden_size must be ≥ 1".into(),
            ));
        }
        if classifier.num_classes == 0 {
            return Err(ConfigError::Parse(
                "classifier.num_classes must be ≥ 1".into(),
            ));
        }
        if attack.label >= classifier.num_classes {
            return Err(ConfigError::Parse(format!(
                "attack.label {} must be below classifier.num_classes {}",
                attack.label, classifier.num_classes
            )));
        }

        let render = raw.render;
        if render.width < 3 || render.height == 0 {
            return Err(ConfigError::Parse(
                "render.width must be ≥ 3 and render.height ≥ 1".into(),
            ));
        }

        Ok(Self {
            image_path: attack.image_path,
            label: attack.label,
            epsilon: attack.epsilon,
            output_dir: attack.output_dir,
            log_dir: attack.log_dir,
            classifier: ClassifierConfig {
                input_height: INPUT_SIZE,
                input_width: INPUT_SIZE,
                hidden_size: classifier.hidden_size,
                num_classes: classifier.num_classes,
                seed: classifier.seed,
            },
            weights: classifier.weights,
            style: FigureStyle {
                width: render.width,
                height: render.height,
                captions: render.captions,
            },
            font_path: render.font_path,
        })
    }
}

impl Default for AttackConfig {
    fn default() -> Self {
        let raw = RawConfig::default();
        Self {
            image_path: raw.attack.image_path,
            label: raw.attack.label,
            epsilon: raw.attack.epsilon,
            output_dir: raw.attack.output_dir,
            log_dir: raw.attack.log_dir,
            classifier: ClassifierConfig::default(),
            weights: None,
            style: FigureStyle::default(),
            font_path: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    attack: RawAttack,
    #[serde(default)]
    classifier: RawClassifier,
    #[serde(default)]
    render: RawRender,
}

#[derive(Debug, Deserialize)]
struct RawAttack {
    #[serde(default = "default_image_path")]
    image_path: PathBuf,
    #[serde(default)]
    label: usize,
    #[serde(default = "default_epsilon")]
    epsilon: f32,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    log_dir: PathBuf,
}

impl Default for RawAttack {
    fn default() -> Self {
        Self {
            image_path: default_image_path(),
            label: 0,
            epsilon: default_epsilon(),
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClassifier {
    #[serde(default = "default_hidden_size")]
    hidden_size: usize,
    #[serde(default = "default_num_classes")]
    num_classes: usize,
    #[serde(default = "default_seed")]
    seed: u64,
    #[serde(default)]
    weights: Option<PathBuf>,
}

impl Default for RawClassifier {
    fn default() -> Self {
        Self {
            hidden_size: default_hidden_size(),
            num_classes: default_num_classes(),
            seed: default_seed(),
            weights: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRender {
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default = "default_captions")]
    captions: bool,
    #[serde(default)]
    font_path: Option<PathBuf>,
}

impl Default for RawRender {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            captions: default_captions(),
            font_path: None,
        }
    }
}

fn default_image_path() -> PathBuf {
    PathBuf::from("./John von neumann.jpg")
}

fn default_epsilon() -> f32 {
    0.1
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_hidden_size() -> usize {
    ClassifierConfig::default().hidden_size
}

fn default_num_classes() -> usize {
    ClassifierConfig::default().num_classes
}

fn default_seed() -> u64 {
    ClassifierConfig::default().seed
}

fn default_width() -> u32 {
    FigureStyle::default().width
}

fn default_height() -> u32 {
    FigureStyle::default().height
}

fn default_captions() -> bool {
    FigureStyle::default().captions
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "IO error: {}", err),
            ConfigError::Parse(err) => write!(f, "Parse error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        ConfigError::Io(value)
    }
}
