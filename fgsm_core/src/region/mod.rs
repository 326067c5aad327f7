//! Spatial region selectors for compositing noise.
//!
//! A [`Region`] names a set of rectangular [`Band`]s over the image plane.
//! Most regions are a single rectangle; [`Region::Border`] is four
//! overlapping bands that are applied one after another.

pub mod compositor;

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FgsmError;

pub use compositor::{apply_noise_to_named_region, apply_noise_to_regions};

/// Width in pixels of each band of [`Region::Border`].
pub const BORDER_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Region {
    Full,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    Border,
}

/// A rectangle of rows x columns, covering every channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub rows: Range<usize>,
    pub cols: Range<usize>,
}

impl Band {
    fn new(rows: Range<usize>, cols: Range<usize>) -> Self {
        Self { rows, cols }
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.contains(&row) && self.cols.contains(&col)
    }
}

impl Region {
    /// Every region, in the order the driver visits them.
    pub const ALL: [Region; 7] = [
        Region::Full,
        Region::TopLeft,
        Region::TopRight,
        Region::BottomLeft,
        Region::BottomRight,
        Region::Center,
        Region::Border,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::Full => "full",
            Region::TopLeft => "top_left",
            Region::TopRight => "top_right",
            Region::BottomLeft => "bottom_left",
            Region::BottomRight => "bottom_right",
            Region::Center => "center",
            Region::Border => "border",
        }
    }

    /// Bands receiving noise on a `height` x `width` plane.
    ///
    /// Split points use integer division. The center block spans
    /// `[h/4, 3*(h/4))` by `[w/4, 3*(w/4))`. Border bands are clipped to the
    /// plane when it is narrower than [`BORDER_WIDTH`].
    pub fn bands(&self, height: usize, width: usize) -> Vec<Band> {
        let (mid_h, mid_w) = (height / 2, width / 2);
        match self {
            Region::Full => vec![Band::new(0..height, 0..width)],
            Region::TopLeft => vec![Band::new(0..mid_h, 0..mid_w)],
            Region::TopRight => vec![Band::new(0..mid_h, mid_w..width)],
            Region::BottomLeft => vec![Band::new(mid_h..height, 0..mid_w)],
            Region::BottomRight => vec![Band::new(mid_h..height, mid_w..width)],
            Region::Center => {
                let (quarter_h, quarter_w) = (height / 4, width / 4);
                vec![Band::new(
                    quarter_h..3 * quarter_h,
                    quarter_w..3 * quarter_w,
                )]
            }
            Region::Border => {
                let top = BORDER_WIDTH.min(height);
                let left = BORDER_WIDTH.min(width);
                vec![
                    Band::new(0..top, 0..width),
                    Band::new(height.saturating_sub(BORDER_WIDTH)..height, 0..width),
                    Band::new(0..height, 0..left),
                    Band::new(0..height, width.saturating_sub(BORDER_WIDTH)..width),
                ]
            }
        }
    }

    /// How many times the pixel at `(row, col)` receives the noise.
    pub fn coverage(&self, height: usize, width: usize, row: usize, col: usize) -> usize {
        self.bands(height, width)
            .iter()
            .filter(|band| band.contains(row, col))
            .count()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = FgsmError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .iter()
            .copied()
            .find(|region| region.as_str() == tag)
            .ok_or_else(|| FgsmError::UnknownRegion(tag.to_string()))
    }
}
