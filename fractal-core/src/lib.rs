//! Core library for the escape-time fractal engine.
//! Defines the device-independent data structures and pure computations
//! shared by every compute backend.

use thiserror::Error;

/// Iteration budget policy driven by zoom depth.
pub mod budget;
/// Engine configuration consumed by the compute layer.
pub mod config;
/// Escape-time evaluation for a single point.
pub mod escape;
/// Fixed pixel grid and linear index mapping.
pub mod grid;
/// Per-pixel kernel contract shared by all backends.
pub mod kernel;
/// View state and complex-plane window resolution.
pub mod view;

pub use crate::budget::IterationBudgetPolicy;
pub use crate::config::{BudgetConfig, EngineConfig, Viewport, ZoomRange};
pub use crate::escape::{escape_time, ESCAPE_RADIUS_SQUARED};
pub use crate::grid::PixelGrid;
pub use crate::kernel::{evaluate_pixel, KernelParams, PixelKernel};
pub use crate::view::{resolve, ComplexBounds, ViewState};

/// Errors raised while validating engine configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// The pixel grid has a zero dimension or too many pixels to address.
    #[error("Invalid pixel grid {width}x{height}: {reason}")]
    InvalidGrid {
        width: u32,
        height: u32,
        reason: &'static str,
    },
    /// A viewport extent is zero, negative or not finite.
    #[error("Invalid viewport extent {width}x{height}: both must be finite and positive")]
    InvalidViewport { width: f64, height: f64 },
    /// The iteration budget settings are inconsistent.
    #[error("Invalid iteration budget: {0}")]
    InvalidBudget(String),
    /// The zoom range is empty or not strictly positive.
    #[error("Invalid zoom range [{min}, {max}]: requires 0 < min <= max")]
    InvalidZoomRange { min: f64, max: f64 },
    /// The default view does not lie inside the configured limits.
    #[error("Invalid default view: {0}")]
    InvalidDefaultView(String),
}
