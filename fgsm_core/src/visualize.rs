//! Three-panel figures: original, noise, perturbed.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array3;
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::{register_font, FontStyle};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{FgsmError, FgsmResult};
use crate::tensor::ImageTensor;

pub const PANEL_TITLES: [&str; 3] = ["Original Image", "Noise", "Perturbed Image"];

static CAPTION_FONT: Mutex<Option<PathBuf>> = Mutex::new(None);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigureStyle {
    /// Figure width in pixels
    pub width: u32,
    /// Figure height in pixels
    pub height: u32,
    /// Draw a title above each panel
    pub captions: bool,
}

impl Default for FigureStyle {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            captions: true,
        }
    }
}

/// Registers a TrueType font under the `sans-serif` family used for captions.
///
/// Without a registered font, captions fail to render and panels are drawn
/// untitled. Only the first successful registration takes effect; later
/// calls keep that font and return `Ok`.
pub fn register_caption_font<P: AsRef<Path>>(path: P) -> FgsmResult<()> {
    let path = path.as_ref();
    let mut registered = CAPTION_FONT.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(existing) = registered.as_ref() {
        if existing != path {
            debug!(
                registered = %existing.display(),
                requested = %path.display(),
                "caption font already registered"
            );
        }
        return Ok(());
    }

    let bytes = std::fs::read(path)?;
    // plotters keeps a 'static reference to the font data for the process.
    let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
    register_font("sans-serif", FontStyle::Normal, bytes).map_err(|_| {
        FgsmError::Render(format!("{} is not a usable TrueType font", path.display()))
    })?;
    *registered = Some(path.to_path_buf());
    Ok(())
}

/// Renders the original/noise/perturbed triplet to a PNG at `path`.
///
/// All three tensors must share one shape. Parent directories are created
/// as needed.
pub fn plot_images<P: AsRef<Path>>(
    original: &ImageTensor,
    noise: &ImageTensor,
    perturbed: &ImageTensor,
    path: P,
    style: &FigureStyle,
) -> FgsmResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let root = BitMapBackend::new(path, (style.width, style.height)).into_drawing_area();
    draw_figure(&root, original, noise, perturbed, style)?;
    root.present().map_err(render_error)
}

/// Renders the same figure into an in-memory RGB buffer of
/// `width * height * 3` bytes.
pub fn render_to_buffer(
    original: &ImageTensor,
    noise: &ImageTensor,
    perturbed: &ImageTensor,
    style: &FigureStyle,
) -> FgsmResult<Vec<u8>> {
    let mut buffer = vec![0u8; style.width as usize * style.height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, (style.width, style.height))
            .into_drawing_area();
        draw_figure(&root, original, noise, perturbed, style)?;
        root.present().map_err(render_error)?;
    }
    Ok(buffer)
}

fn draw_figure<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    original: &ImageTensor,
    noise: &ImageTensor,
    perturbed: &ImageTensor,
    style: &FigureStyle,
) -> FgsmResult<()> {
    original.ensure_same_shape(noise, "plot_images noise")?;
    original.ensure_same_shape(perturbed, "plot_images perturbed")?;

    root.fill(&WHITE).map_err(render_error)?;

    let pixels = [
        original.clamp(0.0, 1.0).to_hwc(),
        noise_for_display(noise).to_hwc(),
        perturbed.clamp(0.0, 1.0).to_hwc(),
    ];
    let panels = root.split_evenly((1, 3));

    for ((panel, title), image) in panels.iter().zip(PANEL_TITLES).zip(pixels.iter()) {
        let body = if style.captions {
            match panel.titled(title, ("sans-serif", 24)) {
                Ok(body) => body,
                Err(err) => {
                    warn!("failed to draw caption '{title}': {err}; drawing panel untitled");
                    panel.clone()
                }
            }
        } else {
            panel.clone()
        };
        draw_image(&body, image)?;
    }

    Ok(())
}

/// Maps noise symmetrically around mid-grey so negative components stay visible.
fn noise_for_display(noise: &ImageTensor) -> ImageTensor {
    let stats = noise.statistics();
    let max_abs = stats.min.abs().max(stats.max.abs());
    if max_abs > 0.0 && max_abs.is_finite() {
        noise.map(|value| 0.5 + value / (2.0 * max_abs))
    } else {
        noise.map(|_| 0.5)
    }
}

/// Draws `image` (`[height, width, 3]`) scaled to fit and centered in `area`.
fn draw_image<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    image: &Array3<f32>,
) -> FgsmResult<()> {
    let (rows, cols, _) = image.dim();
    let (area_w, area_h) = area.dim_in_pixel();
    if rows == 0 || cols == 0 || area_w == 0 || area_h == 0 {
        return Ok(());
    }

    let scale = (area_w as f64 / cols as f64).min(area_h as f64 / rows as f64);
    let target_w = ((cols as f64 * scale).floor() as u32).max(1);
    let target_h = ((rows as f64 * scale).floor() as u32).max(1);
    let offset_x = (area_w - target_w.min(area_w)) / 2;
    let offset_y = (area_h - target_h.min(area_h)) / 2;

    for y in 0..target_h {
        let row = ((y as f64 / scale) as usize).min(rows - 1);
        for x in 0..target_w {
            let col = ((x as f64 / scale) as usize).min(cols - 1);
            let color = RGBColor(
                float_to_byte(image[[row, col, 0]]),
                float_to_byte(image[[row, col, 1]]),
                float_to_byte(image[[row, col, 2]]),
            );
            area.draw_pixel(((offset_x + x) as i32, (offset_y + y) as i32), &color)
                .map_err(render_error)?;
        }
    }

    Ok(())
}

fn render_error<E: std::error::Error + Send + Sync>(err: DrawingAreaErrorKind<E>) -> FgsmError {
    FgsmError::Render(err.to_string())
}

fn float_to_byte(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_style() -> FigureStyle {
        FigureStyle {
            width: 300,
            height: 100,
            captions: false,
        }
    }

    #[test]
    fn test_render_to_buffer_draws_three_panels() {
        let original = ImageTensor::from_elem(8, 8, 1.0);
        let noise = ImageTensor::from_shape_fn(8, 8, |_, row, _| if row < 4 { -0.1 } else { 0.1 });
        let perturbed = ImageTensor::from_elem(8, 8, 0.0);

        let buffer = render_to_buffer(&original, &noise, &perturbed, &plain_style()).unwrap();
        assert_eq!(buffer.len(), 300 * 100 * 3);

        let pixel = |x: usize, y: usize| {
            let idx = (y * 300 + x) * 3;
            [buffer[idx], buffer[idx + 1], buffer[idx + 2]]
        };
        // Centers of the three 100x100 panels.
        assert_eq!(pixel(50, 50), [255, 255, 255]);
        assert_eq!(pixel(150, 20), [0, 0, 0]);
        assert_eq!(pixel(150, 80), [255, 255, 255]);
        assert_eq!(pixel(250, 50), [0, 0, 0]);
    }

    #[test]
    fn test_noise_display_is_symmetric() {
        let noise = ImageTensor::from_shape_fn(1, 3, |_, _, col| col as f32 * 0.1 - 0.1);
        let shown = noise_for_display(&noise);
        assert!((shown.get(0, 0, 0) - 0.0).abs() < 1e-6);
        assert!((shown.get(0, 0, 1) - 0.5).abs() < 1e-6);
        assert!((shown.get(0, 0, 2) - 1.0).abs() < 1e-6);

        let silent = noise_for_display(&ImageTensor::zeros(2, 2));
        assert_eq!(silent.get(1, 1, 1), 0.5);
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let a = ImageTensor::zeros(4, 4);
        let b = ImageTensor::zeros(4, 5);
        let err = render_to_buffer(&a, &b, &a, &plain_style()).unwrap_err();
        assert!(matches!(err, FgsmError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_rejected_font_is_not_registered() {
        let path = std::env::temp_dir().join(format!(
            "selective-fgsm-font-{}.ttf",
            std::process::id()
        ));
        std::fs::write(&path, b"not a font").unwrap();

        let first = register_caption_font(&path);
        let second = register_caption_font(&path);
        std::fs::remove_file(&path).ok();

        assert!(matches!(first, Err(FgsmError::Render(_))));
        assert!(matches!(second, Err(FgsmError::Render(_))));
        let absent = std::env::temp_dir().join("selective-fgsm-absent.ttf");
        assert!(matches!(register_caption_font(absent), Err(FgsmError::Io(_))));
    }

    #[test]
    fn test_plot_images_writes_png() {
        let dir = std::env::temp_dir().join(format!("selective-fgsm-plot-{}", std::process::id()));
        let path = dir.join("figure.png");
        let tensor = ImageTensor::from_elem(16, 16, 0.25);
        let noise = ImageTensor::from_elem(16, 16, 0.1);

        plot_images(&tensor, &noise, &tensor, &path, &plain_style()).unwrap();
        let written = image::open(&path).unwrap();
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!((written.width(), written.height()), (300, 100));
    }
}
