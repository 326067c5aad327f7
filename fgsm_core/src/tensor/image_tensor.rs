use std::fmt::{self, Display};
use std::ops::Range;

use ndarray::{s, ArcArray, Array3, Array4, ArrayView4, Axis, Ix4, Zip};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::{FgsmError, FgsmResult};

/// Number of color channels carried by every image tensor.
pub const CHANNELS: usize = 3;

/// A batch-of-one, channel-first image tensor with values nominally in [0, 1].
///
/// The layout is `[1, 3, height, width]`. Storage is reference counted with
/// copy-on-write semantics: cloning is cheap, and the first write through a
/// shared handle copies the buffer, so a clone never aliases its source once
/// either side is modified.
///
/// # Examples
///
/// ```
/// use selective_fgsm::ImageTensor;
///
/// let image = ImageTensor::from_elem(224, 224, 0.5);
/// assert_eq!(image.shape(), (1, 3, 224, 224));
///
/// let brighter = image.map(|v| v + 0.6).clamp(0.0, 1.0);
/// assert_eq!(brighter.get(0, 0, 0), 1.0);
/// assert_eq!(image.get(0, 0, 0), 0.5);
/// ```
#[derive(Clone, Debug)]
pub struct ImageTensor {
    data: ArcArray<f32, Ix4>,
}

impl ImageTensor {
    /// Creates a tensor of the given spatial size filled with zeros.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: Array4::zeros((1, CHANNELS, height, width)).into_shared(),
        }
    }

    /// Creates a tensor of the given spatial size filled with `value`.
    pub fn from_elem(height: usize, width: usize, value: f32) -> Self {
        Self {
            data: Array4::from_elem((1, CHANNELS, height, width), value).into_shared(),
        }
    }

    /// Builds a tensor by evaluating `f(channel, row, col)` for every element.
    pub fn from_shape_fn<F>(height: usize, width: usize, f: F) -> Self
    where
        F: Fn(usize, usize, usize) -> f32,
    {
        let data = Array4::from_shape_fn((1, CHANNELS, height, width), |(_, c, h, w)| f(c, h, w));
        Self {
            data: data.into_shared(),
        }
    }

    /// Wraps an existing `[1, 3, H, W]` array.
    ///
    /// Fails with [`FgsmError::ShapeMismatch`] when the batch axis is not 1 or
    /// the channel axis is not 3.
    pub fn from_array(array: Array4<f32>) -> FgsmResult<Self> {
        let (batch, channels, height, width) = array.dim();
        if batch != 1 || channels != CHANNELS {
            return Err(FgsmError::ShapeMismatch {
                expected: (1, CHANNELS, height, width),
                got: (batch, channels, height, width),
                context: "ImageTensor::from_array".to_string(),
            });
        }
        Ok(Self {
            data: array.into_shared(),
        })
    }

    pub fn shape(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn height(&self) -> usize {
        self.data.dim().2
    }

    pub fn width(&self) -> usize {
        self.data.dim().3
    }

    /// Total number of scalar elements (channels included).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(channel, row, col)` of the single batch entry.
    pub fn get(&self, channel: usize, row: usize, col: usize) -> f32 {
        self.data[[0, channel, row, col]]
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.data.view()
    }

    /// True when both handles still point at the same buffer.
    pub fn shares_storage_with(&self, other: &ImageTensor) -> bool {
        self.data.as_ptr() == other.data.as_ptr()
    }

    /// Applies `f` to every element, returning a new tensor.
    pub fn map<F>(&self, f: F) -> Self
    where
        F: Fn(f32) -> f32 + Sync + Send,
    {
        let mut out = Array4::zeros(self.data.dim());
        Zip::from(&mut out)
            .and(&self.data)
            .par_for_each(|out, &value| *out = f(value));
        Self {
            data: out.into_shared(),
        }
    }

    pub fn clamp(&self, min: f32, max: f32) -> Self {
        self.map(|value| value.clamp(min, max))
    }

    /// Elementwise sign: -1, 0 or +1. Exact zeros stay zero and NaN stays NaN.
    pub fn sign(&self) -> Self {
        self.map(sign)
    }

    pub fn scale(&self, factor: f32) -> Self {
        self.map(|value| value * factor)
    }

    /// Elementwise sum of two tensors of identical shape.
    pub fn try_add(&self, rhs: &ImageTensor) -> FgsmResult<Self> {
        self.ensure_same_shape(rhs, "ImageTensor::try_add")?;
        let mut out = Array4::zeros(self.data.dim());
        Zip::from(&mut out)
            .and(&self.data)
            .and(&rhs.data)
            .par_for_each(|out, &lhs, &rhs| *out = lhs + rhs);
        Ok(Self {
            data: out.into_shared(),
        })
    }

    pub fn ensure_same_shape(&self, other: &ImageTensor, context: &str) -> FgsmResult<()> {
        if self.shape() != other.shape() {
            return Err(FgsmError::ShapeMismatch {
                expected: self.shape(),
                got: other.shape(),
                context: context.to_string(),
            });
        }
        Ok(())
    }

    /// Adds `noise[rows, cols]` into this tensor's own buffer across all channels.
    ///
    /// Shapes must already have been checked by the caller. If the buffer is
    /// shared with another handle it is copied before the write.
    pub(crate) fn add_window(
        &mut self,
        noise: &ImageTensor,
        rows: Range<usize>,
        cols: Range<usize>,
    ) {
        let source = noise.data.slice(s![.., .., rows.clone(), cols.clone()]);
        let mut target = self.data.slice_mut(s![.., .., rows, cols]);
        target += &source;
    }

    /// Channel-last `[height, width, 3]` copy for rendering.
    pub fn to_hwc(&self) -> Array3<f32> {
        let chw = self.data.index_axis(Axis(0), 0);
        chw.permuted_axes([1, 2, 0]).as_standard_layout().into_owned()
    }

    /// Flattened values in `[channel, row, col]` order.
    pub fn to_vec(&self) -> Vec<f32> {
        self.data.iter().cloned().collect()
    }

    pub fn statistics(&self) -> TensorStatistics {
        let (_, _, height, width) = self.shape();
        let cells = (height * width) as f32;

        let mut mean_rgb = [0.0f32; CHANNELS];
        for (channel, mean) in mean_rgb.iter_mut().enumerate() {
            let plane = self.data.slice(s![0, channel, .., ..]);
            let sum = match plane.as_slice() {
                Some(slice) => slice.par_iter().cloned().sum::<f32>(),
                None => plane.iter().cloned().sum::<f32>(),
            };
            *mean = if cells > 0.0 { sum / cells } else { 0.0 };
        }

        let (min, max) = self
            .data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let count = self.data.len().max(1) as f32;
        let mean = self.data.iter().cloned().sum::<f32>() / count;

        TensorStatistics {
            mean,
            mean_rgb,
            min,
            max,
        }
    }
}

impl Display for ImageTensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.statistics();
        let (batch, channels, height, width) = self.shape();
        write!(
            f,
            "ImageTensor {}x{}x{}x{} mean_rgb=({:.3},{:.3},{:.3}) range=[{:.3},{:.3}]",
            batch,
            channels,
            height,
            width,
            stats.mean_rgb[0],
            stats.mean_rgb[1],
            stats.mean_rgb[2],
            stats.min,
            stats.max,
        )
    }
}

#[derive(Debug, Clone, Copy, Serialize, Default, PartialEq)]
pub struct TensorStatistics {
    pub mean: f32,
    pub mean_rgb: [f32; 3],
    pub min: f32,
    pub max: f32,
}

fn sign(value: f32) -> f32 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else if value.is_nan() {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_keeps_zero() {
        let tensor = ImageTensor::from_shape_fn(1, 3, |_, _, col| col as f32 - 1.0);
        let signed = tensor.sign();
        assert_eq!(signed.get(0, 0, 0), -1.0);
        assert_eq!(signed.get(0, 0, 1), 0.0);
        assert_eq!(signed.get(0, 0, 2), 1.0);

        let negative_zero = ImageTensor::from_elem(1, 1, -0.0).sign();
        assert_eq!(negative_zero.get(0, 0, 0), 0.0);
    }

    #[test]
    fn test_sign_propagates_nan() {
        let signed = ImageTensor::from_elem(1, 1, f32::NAN).sign();
        assert!(signed.get(2, 0, 0).is_nan());
    }

    #[test]
    fn test_clone_is_copy_on_write() {
        let original = ImageTensor::from_elem(4, 4, 0.25);
        let mut copy = original.clone();
        assert!(copy.shares_storage_with(&original));

        let noise = ImageTensor::from_elem(4, 4, 0.5);
        copy.add_window(&noise, 0..2, 0..2);

        assert!(!copy.shares_storage_with(&original));
        assert_eq!(original.get(0, 0, 0), 0.25);
        assert!((copy.get(0, 0, 0) - 0.75).abs() < 1e-6);
        assert_eq!(copy.get(0, 3, 3), 0.25);
    }

    #[test]
    fn test_try_add_rejects_shape_mismatch() {
        let a = ImageTensor::zeros(4, 4);
        let b = ImageTensor::zeros(4, 5);
        let err = a.try_add(&b).unwrap_err();
        assert!(matches!(err, FgsmError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_from_array_requires_batch_of_one_rgb() {
        assert!(ImageTensor::from_array(Array4::zeros((1, 3, 2, 2))).is_ok());
        assert!(ImageTensor::from_array(Array4::zeros((2, 3, 2, 2))).is_err());
        assert!(ImageTensor::from_array(Array4::zeros((1, 1, 2, 2))).is_err());
    }

    #[test]
    fn test_to_hwc_moves_channels_last() {
        let tensor = ImageTensor::from_shape_fn(2, 3, |c, h, w| (c * 100 + h * 10 + w) as f32);
        let hwc = tensor.to_hwc();
        assert_eq!(hwc.dim(), (2, 3, 3));
        assert_eq!(hwc[[1, 2, 0]], 12.0);
        assert_eq!(hwc[[1, 2, 2]], 212.0);
    }

    #[test]
    fn test_statistics() {
        let tensor = ImageTensor::from_shape_fn(2, 2, |c, _, _| c as f32 * 0.5);
        let stats = tensor.statistics();
        assert!((stats.mean_rgb[0] - 0.0).abs() < 1e-6);
        assert!((stats.mean_rgb[1] - 0.5).abs() < 1e-6);
        assert!((stats.mean_rgb[2] - 1.0).abs() < 1e-6);
        assert_eq!(stats.min, 0.0);
        assert_eq!(stats.max, 1.0);
    }
}
