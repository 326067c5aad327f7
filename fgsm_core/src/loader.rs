//! Image decoding into normalized tensors.
//!
//! Files are decoded with the `image` crate, converted to RGB, resized to a
//! fixed square input and scaled from `u8` into [0, 1].

use std::path::Path;

use image::imageops::{self, FilterType};
use image::RgbImage;
use tracing::debug;

use crate::error::FgsmResult;
use crate::tensor::ImageTensor;

/// Spatial size expected by the classifier.
pub const INPUT_SIZE: usize = 224;

/// Loads an image file as a `[1, 3, 224, 224]` tensor with values in [0, 1].
///
/// Fails with [`FgsmError::Io`](crate::FgsmError::Io) when the file cannot be
/// opened and [`FgsmError::Decode`](crate::FgsmError::Decode) when its
/// contents are not a supported image.
pub fn load_image<P: AsRef<Path>>(path: P) -> FgsmResult<ImageTensor> {
    load_image_with_size(path, INPUT_SIZE, INPUT_SIZE)
}

/// Loads an image file resized to `height` x `width`.
pub fn load_image_with_size<P: AsRef<Path>>(
    path: P,
    height: usize,
    width: usize,
) -> FgsmResult<ImageTensor> {
    let path = path.as_ref();
    let decoded = image::open(path)?;
    debug!(
        path = %path.display(),
        width = decoded.width(),
        height = decoded.height(),
        "decoded image"
    );

    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, width as u32, height as u32, FilterType::Triangle);
    Ok(tensor_from_rgb(&resized))
}

/// Converts RGB pixels to a channel-first tensor without resizing.
pub fn tensor_from_rgb(image: &RgbImage) -> ImageTensor {
    let (width, height) = image.dimensions();
    ImageTensor::from_shape_fn(height as usize, width as usize, |channel, row, col| {
        f32::from(image.get_pixel(col as u32, row as u32)[channel]) / 255.0
    })
}
