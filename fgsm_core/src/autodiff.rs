//! Explicit differentiation context for reverse-mode passes.
//!
//! A [`GradContext`] owns the gradient state that a classifier produces while
//! running its backward pass: whether the input is being tracked, the
//! accumulated gradient buffer of every named parameter, and the gradient
//! with respect to the input. Parameter gradients accumulate across backward
//! passes until [`GradContext::zero_grad`] is called, and a backward pass on
//! a context that has not been reset since the previous one is rejected.

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayViewD};

use crate::error::{FgsmError, FgsmResult};
use crate::tensor::ImageTensor;

#[derive(Debug, Default)]
pub struct GradContext {
    watch_input: bool,
    zeroed: bool,
    parameter_grads: BTreeMap<String, ArrayD<f32>>,
    input_grad: Option<ImageTensor>,
    backward_passes: usize,
}

impl GradContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables gradient tracking for the classifier input.
    pub fn watch_input(&mut self) {
        self.watch_input = true;
    }

    pub fn is_watching_input(&self) -> bool {
        self.watch_input
    }

    /// Resets every accumulated parameter gradient to zero and drops the
    /// input gradient of the previous pass.
    pub fn zero_grad(&mut self) {
        for grad in self.parameter_grads.values_mut() {
            grad.fill(0.0);
        }
        self.input_grad = None;
        self.zeroed = true;
    }

    /// Called by a classifier at the start of its backward pass.
    ///
    /// Fails with [`FgsmError::StaleGradients`] unless [`zero_grad`](Self::zero_grad)
    /// ran since the last backward pass, and with
    /// [`FgsmError::InputNotWatched`] unless the input is tracked.
    pub fn begin_backward(&mut self) -> FgsmResult<()> {
        if !self.zeroed {
            return Err(FgsmError::StaleGradients);
        }
        if !self.watch_input {
            return Err(FgsmError::InputNotWatched);
        }
        self.zeroed = false;
        self.backward_passes += 1;
        Ok(())
    }

    /// Adds `grad` into the buffer registered under `name`.
    pub fn accumulate(&mut self, name: &str, grad: ArrayViewD<'_, f32>) {
        if let Some(existing) = self.parameter_grads.get_mut(name) {
            if existing.shape() == grad.shape() {
                *existing += &grad;
                return;
            }
        }
        self.parameter_grads
            .insert(name.to_string(), grad.to_owned());
    }

    /// Records the gradient of the loss with respect to the input.
    pub fn set_input_grad(&mut self, grad: ImageTensor) {
        self.input_grad = Some(grad);
    }

    pub fn input_grad(&self) -> Option<&ImageTensor> {
        self.input_grad.as_ref()
    }

    pub fn parameter_grad(&self, name: &str) -> Option<&ArrayD<f32>> {
        self.parameter_grads.get(name)
    }

    pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
        self.parameter_grads.keys().map(String::as_str)
    }

    /// Number of backward passes run through this context.
    pub fn backward_passes(&self) -> usize {
        self.backward_passes
    }
}
