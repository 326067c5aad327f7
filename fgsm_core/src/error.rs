//! Error types for the attack pipeline
//!
//! Every fallible operation in the crate returns [`FgsmResult`]. Failures are
//! never retried; they propagate to the caller and end the run.

use std::fmt;

use crate::checkpoint::CheckpointError;

/// Result type alias for pipeline operations
pub type FgsmResult<T> = Result<T, FgsmError>;

/// Error type shared by the loader, attack, compositor and renderer
#[derive(Debug)]
pub enum FgsmError {
    /// The image file could not be opened or read
    Io(std::io::Error),

    /// The image file was read but could not be decoded
    Decode(String),

    /// Two tensors that must agree in shape did not
    ShapeMismatch {
        expected: (usize, usize, usize, usize),
        got: (usize, usize, usize, usize),
        context: String,
    },

    /// A region tag outside the seven known selectors
    UnknownRegion(String),

    /// Perturbation magnitude was negative or not finite
    InvalidEpsilon(f32),

    /// Class index not produced by the classifier
    LabelOutOfRange { label: usize, num_classes: usize },

    /// A backward pass was requested without resetting the previous gradients
    StaleGradients,

    /// A backward pass was requested without enabling input tracking
    InputNotWatched,

    /// The plotting backend failed to draw or encode a figure
    Render(String),

    /// Classifier weights could not be loaded
    Checkpoint(CheckpointError),

    /// Loaded weights do not fit the configured run
    IncompatibleWeights(String),
}

impl fmt::Display for FgsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FgsmError::Io(err) => write!(f, "I/O error while reading image: {err}"),
            FgsmError::Decode(msg) => write!(f, "Failed to decode image: {msg}"),
            FgsmError::ShapeMismatch {
                expected,
                got,
                context,
            } => write!(
                f,
                "Shape mismatch in {context}: expected {expected:?}, got {got:?}"
            ),
            FgsmError::UnknownRegion(tag) => write!(
                f,
                "Unknown region '{tag}': expected one of full, top_left, top_right, \
                 bottom_left, bottom_right, center, border"
            ),
            FgsmError::InvalidEpsilon(eps) => {
                write!(f, "Epsilon must be finite and non-negative, got {eps}")
            }
            FgsmError::LabelOutOfRange { label, num_classes } => write!(
                f,
                "Label {label} is out of range for a classifier with {num_classes} classes"
            ),
            FgsmError::StaleGradients => write!(
                f,
                "Gradients from a previous backward pass were not reset; call zero_grad() first"
            ),
            FgsmError::InputNotWatched => write!(
                f,
                "Input gradient tracking is disabled; call watch_input() before backward"
            ),
            FgsmError::Render(msg) => write!(f, "Failed to render figure: {msg}"),
            FgsmError::Checkpoint(err) => write!(f, "Failed to load classifier weights: {err}"),
            FgsmError::IncompatibleWeights(msg) => {
                write!(f, "Classifier weights do not fit this run: {msg}")
            }
        }
    }
}

impl std::error::Error for FgsmError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FgsmError::Io(err) => Some(err),
            FgsmError::Checkpoint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FgsmError {
    fn from(err: std::io::Error) -> Self {
        FgsmError::Io(err)
    }
}

impl From<CheckpointError> for FgsmError {
    fn from(err: CheckpointError) -> Self {
        FgsmError::Checkpoint(err)
    }
}

impl From<image::ImageError> for FgsmError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(io) => FgsmError::Io(io),
            other => FgsmError::Decode(other.to_string()),
        }
    }
}
