use tracing::trace;

use super::Region;
use crate::error::FgsmResult;
use crate::tensor::ImageTensor;

/// Adds `noise` to `image` inside `region` and clamps the result to [0, 1].
///
/// The input image is never modified: the result starts as a copy-on-write
/// clone, and the first band written detaches it from `image`'s buffer.
/// Border bands are applied in sequence, so corner pixels receive the noise
/// twice.
///
/// # Errors
///
/// [`FgsmError::ShapeMismatch`](crate::FgsmError::ShapeMismatch) when `image`
/// and `noise` differ in shape.
///
/// # Examples
///
/// ```
/// use selective_fgsm::{apply_noise_to_regions, ImageTensor, Region};
///
/// let image = ImageTensor::from_elem(224, 224, 0.5);
/// let noise = ImageTensor::from_elem(224, 224, 0.1);
///
/// let out = apply_noise_to_regions(&image, &noise, Region::TopLeft).unwrap();
/// assert!((out.get(0, 0, 0) - 0.6).abs() < 1e-6);
/// assert_eq!(out.get(0, 200, 200), 0.5);
/// ```
pub fn apply_noise_to_regions(
    image: &ImageTensor,
    noise: &ImageTensor,
    region: Region,
) -> FgsmResult<ImageTensor> {
    image.ensure_same_shape(noise, "apply_noise_to_regions")?;

    let mut perturbed = image.clone();
    for band in region.bands(image.height(), image.width()) {
        trace!(%region, rows = ?band.rows, cols = ?band.cols, "adding noise band");
        perturbed.add_window(noise, band.rows, band.cols);
    }

    Ok(perturbed.clamp(0.0, 1.0))
}

/// String-tagged entry point; unknown tags fail with
/// [`FgsmError::UnknownRegion`](crate::FgsmError::UnknownRegion).
pub fn apply_noise_to_named_region(
    image: &ImageTensor,
    noise: &ImageTensor,
    tag: &str,
) -> FgsmResult<ImageTensor> {
    let region: Region = tag.parse()?;
    apply_noise_to_regions(image, noise, region)
}
