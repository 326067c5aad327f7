//! Differentiable image classifiers.
//!
//! The attack only needs two capabilities from a model: a forward pass from
//! an image tensor to class scores, and a reverse pass from a gradient on
//! those scores back to the input. [`Classifier`] captures exactly that.

pub mod loss;
pub mod mlp;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::autodiff::GradContext;
use crate::error::FgsmResult;
use crate::tensor::ImageTensor;

pub use loss::{cross_entropy, softmax};
pub use mlp::{ClassifierConfig, MlpClassifier};

/// Target class index for a batch of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label(usize);

impl Label {
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

pub trait Classifier {
    /// Number of classes scored by [`forward`](Self::forward).
    fn num_classes(&self) -> usize;

    /// Forward pass - raw class scores of shape `[1, num_classes]`
    fn forward(&self, image: &ImageTensor) -> FgsmResult<Array2<f32>>;

    /// Reverse pass from `grad_logits` (shape `[1, num_classes]`) to the input.
    ///
    /// Implementations must call [`GradContext::begin_backward`] before doing
    /// any work, accumulate their parameter gradients into `ctx`, and record
    /// the returned input gradient with [`GradContext::set_input_grad`].
    fn backward(
        &self,
        ctx: &mut GradContext,
        image: &ImageTensor,
        grad_logits: &Array2<f32>,
    ) -> FgsmResult<ImageTensor>;

    /// Predict the most likely class
    fn predict(&self, image: &ImageTensor) -> FgsmResult<usize> {
        let logits = self.forward(image)?;
        let predicted = logits
            .iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (idx, &score)| {
                if score > best.1 {
                    (idx, score)
                } else {
                    best
                }
            })
            .0;
        Ok(predicted)
    }
}
