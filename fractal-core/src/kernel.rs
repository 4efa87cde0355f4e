//! The per-pixel kernel contract.
//!
//! A kernel receives pixel coordinates plus the per-request scalars and
//! returns one escape count. It must not read or write anything shared with
//! other pixels, so a backend is free to run pixels in any order or all at
//! once.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Viewport;
use crate::escape::escape_time;
use crate::grid::PixelGrid;
use crate::view::{resolve, ComplexBounds, ViewState};

/// Scalars passed to every work unit of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KernelParams {
    pub width: u32,
    pub height: u32,
    pub iteration_budget: u32,
    pub center_real: f64,
    pub center_imag: f64,
    pub zoom: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
}

impl KernelParams {
    #[must_use]
    pub const fn new(
        grid: &PixelGrid,
        viewport: &Viewport,
        view: &ViewState,
        iteration_budget: u32,
    ) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            iteration_budget,
            center_real: view.center_real,
            center_imag: view.center_imag,
            zoom: view.zoom,
            viewport_width: viewport.width,
            viewport_height: viewport.height,
        }
    }

    #[must_use]
    pub const fn grid(&self) -> PixelGrid {
        PixelGrid::new(self.width, self.height)
    }

    /// Number of work units a dispatch with these params covers.
    #[must_use]
    pub const fn work_units(&self) -> usize {
        self.grid().len()
    }

    /// The window these params describe, resolved the same way each work unit
    /// resolves it.
    #[must_use]
    pub fn bounds(&self) -> ComplexBounds {
        resolve(
            self.center_real,
            self.center_imag,
            self.zoom,
            self.viewport_width,
            self.viewport_height,
        )
    }
}

/// A pure per-pixel kernel: `(x, y, params) -> escape count`.
pub type PixelKernel = fn(u32, u32, &KernelParams) -> u32;

/// Reference kernel.
///
/// Resolves the window from the request scalars inside the work unit instead
/// of receiving precomputed bounds, then evaluates the escape time of the
/// pixel's point.
#[must_use]
pub fn evaluate_pixel(x: u32, y: u32, params: &KernelParams) -> u32 {
    let (real, imag) = params.bounds().point_at(x, y, &params.grid());
    escape_time(real, imag, params.iteration_budget)
}
