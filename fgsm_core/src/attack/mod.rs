//! Single-step gradient-sign attack.
//!
//! Forward: `perturbed = clamp(image + epsilon * sign(dL/dimage), 0, 1)`
//! where `L` is the cross-entropy of the classifier logits against `label`.

use serde::Serialize;
use tracing::debug;

use crate::autodiff::GradContext;
use crate::classifier::{cross_entropy, Classifier, Label};
use crate::error::{FgsmError, FgsmResult};
use crate::tensor::ImageTensor;

/// Result of one attack step.
#[derive(Debug, Clone)]
pub struct FgsmOutput {
    /// `image + epsilon * sign(gradient)`, clamped to [0, 1]
    pub perturbed: ImageTensor,
    /// Raw gradient of the loss with respect to the input
    pub gradient: ImageTensor,
    /// Cross-entropy loss of the unperturbed image
    pub loss: f32,
}

/// Summary of an attack for logs and reports.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AttackSummary {
    pub loss: f32,
    pub epsilon: f32,
    pub label: usize,
    pub positive_gradients: usize,
    pub negative_gradients: usize,
    pub zero_gradients: usize,
    pub nan_gradients: usize,
}

/// Computes the gradient-sign perturbation of `image` against `label`.
///
/// Resets the gradient state in `ctx` and enables input tracking before the
/// forward pass, so repeated calls with one context never accumulate
/// gradients from earlier attacks.
///
/// # Arguments
///
/// * `classifier` - Differentiable model under attack
/// * `ctx` - Differentiation context that receives the gradients
/// * `image` - Input tensor, left untouched
/// * `label` - Class whose loss is increased
/// * `epsilon` - Perturbation magnitude, finite and non-negative
///
/// # Examples
///
/// ```
/// use selective_fgsm::{
///     fgsm_attack, ClassifierConfig, GradContext, ImageTensor, Label, MlpClassifier,
/// };
///
/// let classifier = MlpClassifier::new(ClassifierConfig {
///     input_height: 8,
///     input_width: 8,
///     hidden_size: 4,
///     num_classes: 3,
///     seed: 1,
/// });
/// let image = ImageTensor::from_elem(8, 8, 0.5);
/// let mut ctx = GradContext::new();
///
/// let output = fgsm_attack(&classifier, &mut ctx, &image, Label::new(0), 0.1).unwrap();
/// assert_eq!(output.perturbed.shape(), image.shape());
/// ```
pub fn fgsm_attack(
    classifier: &dyn Classifier,
    ctx: &mut GradContext,
    image: &ImageTensor,
    label: Label,
    epsilon: f32,
) -> FgsmResult<FgsmOutput> {
    validate_epsilon(epsilon)?;

    ctx.zero_grad();
    ctx.watch_input();

    let logits = classifier.forward(image)?;
    let (loss, grad_logits) = cross_entropy(&logits, label)?;
    let gradient = classifier.backward(ctx, image, &grad_logits)?;
    image.ensure_same_shape(&gradient, "fgsm_attack gradient")?;

    let noise = sign_noise(&gradient, epsilon);
    let perturbed = image.try_add(&noise)?.clamp(0.0, 1.0);

    debug!(loss, epsilon, label = label.index(), "fgsm step computed");

    Ok(FgsmOutput {
        perturbed,
        gradient,
        loss,
    })
}

/// Returns `epsilon * sign(gradient)`, with values in {-epsilon, 0, +epsilon}.
///
/// NaN gradient components stay NaN in the noise.
pub fn sign_noise(gradient: &ImageTensor, epsilon: f32) -> ImageTensor {
    gradient.sign().scale(epsilon)
}

pub fn summarize(output: &FgsmOutput, label: Label, epsilon: f32) -> AttackSummary {
    let (mut positive, mut negative, mut zero, mut nan) = (0, 0, 0, 0);
    for value in output.gradient.view().iter() {
        if *value > 0.0 {
            positive += 1;
        } else if *value < 0.0 {
            negative += 1;
        } else if value.is_nan() {
            nan += 1;
        } else {
            zero += 1;
        }
    }
    AttackSummary {
        loss: output.loss,
        epsilon,
        label: label.index(),
        positive_gradients: positive,
        negative_gradients: negative,
        zero_gradients: zero,
        nan_gradients: nan,
    }
}

fn validate_epsilon(epsilon: f32) -> FgsmResult<()> {
    if !epsilon.is_finite() || epsilon < 0.0 {
        return Err(FgsmError::InvalidEpsilon(epsilon));
    }
    Ok(())
}
