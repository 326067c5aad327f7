//! # Selective FGSM
//!
//! Single-step gradient-sign adversarial perturbations, composited into
//! chosen spatial regions of an image and rendered for side-by-side
//! comparison.
//!
//! ## Quick Start
//!
//! ```rust
//! use selective_fgsm::{
//!     apply_noise_to_regions, fgsm_attack, sign_noise, ClassifierConfig, GradContext,
//!     ImageTensor, Label, MlpClassifier, Region,
//! };
//!
//! let classifier = MlpClassifier::new(ClassifierConfig {
//!     input_height: 16,
//!     input_width: 16,
//!     hidden_size: 8,
//!     num_classes: 4,
//!     seed: 42,
//! });
//! let image = ImageTensor::from_elem(16, 16, 0.5);
//!
//! let mut ctx = GradContext::new();
//! let output = fgsm_attack(&classifier, &mut ctx, &image, Label::new(2), 0.1).unwrap();
//! let noise = sign_noise(&output.gradient, 0.1);
//!
//! let corner = apply_noise_to_regions(&image, &noise, Region::TopLeft).unwrap();
//! assert_eq!(corner.get(0, 12, 12), 0.5);
//! ```
//!
//! ## Core Modules
//!
//! - [`tensor`] - `[1, 3, H, W]` image tensors with copy-on-write storage
//! - [`attack`] - The gradient-sign step
//! - [`region`] - Region selectors and the noise compositor
//! - [`visualize`] - Three-panel PNG figures
//! - [`pipeline`] - Load, attack, composite, render, log
//! - [`config`] - Run configuration via TOML
//! - [`logging`] - JSON line-delimited logging

pub mod attack;
pub mod autodiff;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod pipeline;
pub mod region;
pub mod tensor;
pub mod visualize;

pub use attack::{fgsm_attack, sign_noise, summarize, AttackSummary, FgsmOutput};
pub use autodiff::GradContext;
pub use checkpoint::{CheckpointError, Checkpointable};
pub use classifier::{cross_entropy, softmax, Classifier, ClassifierConfig, Label, MlpClassifier};
pub use config::{AttackConfig, ConfigError};
pub use error::{FgsmError, FgsmResult};
pub use loader::{load_image, load_image_with_size, INPUT_SIZE};
pub use pipeline::{build_classifier, run_pipeline, PipelineReport, RegionReport};
pub use region::{apply_noise_to_named_region, apply_noise_to_regions, Band, Region};
pub use tensor::{ImageTensor, TensorStatistics};
pub use visualize::{plot_images, register_caption_font, render_to_buffer, FigureStyle};
