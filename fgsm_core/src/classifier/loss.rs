//! Cross-entropy loss over classifier logits.

use ndarray::{Array1, Array2, ArrayView1, Axis};

use super::Label;
use crate::error::{FgsmError, FgsmResult};

/// Numerically stable softmax of a single logits row.
pub fn softmax(logits: ArrayView1<'_, f32>) -> Array1<f32> {
    let max = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

/// Computes cross-entropy loss for a batch of one.
///
/// # Arguments
///
/// * `logits` - Raw class scores, shape `[1, num_classes]`
/// * `label` - Target class
///
/// # Returns
///
/// Tuple of (loss value, gradient w.r.t. logits). The gradient is
/// `softmax(logits) - one_hot(label)`.
pub fn cross_entropy(logits: &Array2<f32>, label: Label) -> FgsmResult<(f32, Array2<f32>)> {
    let num_classes = logits.ncols();
    if label.index() >= num_classes {
        return Err(FgsmError::LabelOutOfRange {
            label: label.index(),
            num_classes,
        });
    }

    let row = logits.index_axis(Axis(0), 0);
    let max = row.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let log_sum_exp = row.iter().map(|&v| (v - max).exp()).sum::<f32>().ln() + max;
    let loss = log_sum_exp - row[label.index()];

    let mut grad = softmax(row);
    grad[label.index()] -= 1.0;

    Ok((loss, grad.insert_axis(Axis(0))))
}
