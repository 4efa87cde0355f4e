#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ZoomRange;
use crate::grid::PixelGrid;

/// Center point and zoom factor of one request.
///
/// Values built through [`ViewState::clamped`] always carry a zoom inside the
/// configured [`ZoomRange`], so the zoom is strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewState {
    pub center_real: f64,
    pub center_imag: f64,
    pub zoom: f64,
}

impl ViewState {
    /// Builds a view with the zoom clamped into `range`. A NaN zoom maps to
    /// the range minimum.
    #[must_use]
    pub fn clamped(center_real: f64, center_imag: f64, zoom: f64, range: &ZoomRange) -> Self {
        Self {
            center_real,
            center_imag,
            zoom: range.clamp(zoom),
        }
    }

    /// Returns true if both center coordinates are finite numbers.
    #[must_use]
    pub fn has_finite_center(&self) -> bool {
        self.center_real.is_finite() && self.center_imag.is_finite()
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center_real: -0.5,
            center_imag: 0.0,
            zoom: 1.0,
        }
    }
}

/// Rectangular window of the complex plane covered by the pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComplexBounds {
    pub min_real: f64,
    pub max_real: f64,
    pub min_imag: f64,
    pub max_imag: f64,
}

impl ComplexBounds {
    /// Width of the window along the real axis.
    #[must_use]
    pub fn real_extent(&self) -> f64 {
        self.max_real - self.min_real
    }

    /// Height of the window along the imaginary axis.
    #[must_use]
    pub fn imag_extent(&self) -> f64 {
        self.max_imag - self.min_imag
    }

    /// Maps pixel `(x, y)` of `grid` to its complex coordinate.
    ///
    /// The expression order matches the WGSL kernel so both sides round the
    /// same way.
    #[must_use]
    pub fn point_at(&self, x: u32, y: u32, grid: &PixelGrid) -> (f64, f64) {
        let real =
            self.min_real + f64::from(x) * (self.max_real - self.min_real) / f64::from(grid.width);
        let imag = self.min_imag
            + f64::from(y) * (self.max_imag - self.min_imag) / f64::from(grid.height);
        (real, imag)
    }
}

/// Resolves the complex-plane window for a center, zoom and viewport extent.
///
/// `viewport_width` and `viewport_height` are the extents visible at zoom 1,
/// in complex-plane units. The window is centered on `(center_real,
/// center_imag)` and each extent is divided by `zoom`.
#[must_use]
pub fn resolve(
    center_real: f64,
    center_imag: f64,
    zoom: f64,
    viewport_width: f64,
    viewport_height: f64,
) -> ComplexBounds {
    let view_width = viewport_width / zoom;
    let view_height = viewport_height / zoom;
    let half_width = view_width / 2.0;
    let half_height = view_height / 2.0;

    ComplexBounds {
        min_real: center_real - half_width,
        max_real: center_real + half_width,
        min_imag: center_imag - half_height,
        max_imag: center_imag + half_height,
    }
}
