//! Engine configuration.
//!
//! These values are owned by the embedding application and stay fixed for the
//! lifetime of an engine. Nothing here is derived from a request.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::budget::IterationBudgetPolicy;
use crate::grid::PixelGrid;
use crate::view::ViewState;
use crate::ConfigError;

/// Extent of the complex plane visible at zoom 1.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 3.5,
            height: 2.625,
        }
    }
}

/// Inclusive zoom limits applied to every request.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
}

impl ZoomRange {
    /// Clamps `zoom` into the range. NaN maps to `min`.
    #[must_use]
    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            self.min
        } else {
            zoom.clamp(self.min, self.max)
        }
    }
}

impl Default for ZoomRange {
    fn default() -> Self {
        Self {
            min: 0.5,
            max: 1.0e12,
        }
    }
}

/// Settings for the zoom-dependent iteration budget.
///
/// The minimum budget is always `base_iterations`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BudgetConfig {
    pub base_iterations: u32,
    pub max_iterations: u32,
    pub scaling_factor: f64,
}

impl BudgetConfig {
    /// The lower clamp of the budget, equal to the base count.
    #[must_use]
    pub const fn min_iterations(&self) -> u32 {
        self.base_iterations
    }
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            base_iterations: 100_000,
            max_iterations: 1_000_000,
            scaling_factor: 50_000.0,
        }
    }
}

/// Complete configuration of a compute engine.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Output resolution; every request produces `width * height` counts.
    pub grid: PixelGrid,
    /// Complex-plane extent at zoom 1.
    pub viewport: Viewport,
    /// View used when a caller does not supply one.
    pub default_view: ViewState,
    pub budget: BudgetConfig,
    pub zoom: ZoomRange,
}

impl EngineConfig {
    /// Checks that the configuration can drive the engine.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let PixelGrid { width, height } = self.grid;
        if width == 0 || height == 0 {
            return Err(ConfigError::InvalidGrid {
                width,
                height,
                reason: "dimensions must be non-zero",
            });
        }
        if u64::from(width) * u64::from(height) > u64::from(u32::MAX) {
            return Err(ConfigError::InvalidGrid {
                width,
                height,
                reason: "pixel count must fit in a 32-bit index",
            });
        }

        let Viewport { width: vw, height: vh } = self.viewport;
        if !(vw.is_finite() && vh.is_finite() && vw > 0.0 && vh > 0.0) {
            return Err(ConfigError::InvalidViewport {
                width: vw,
                height: vh,
            });
        }

        let budget = &self.budget;
        if budget.base_iterations == 0 {
            return Err(ConfigError::InvalidBudget(
                "base_iterations must be at least 1".to_string(),
            ));
        }
        if budget.max_iterations < budget.base_iterations {
            return Err(ConfigError::InvalidBudget(format!(
                "max_iterations ({}) is below base_iterations ({})",
                budget.max_iterations, budget.base_iterations
            )));
        }
        if !(budget.scaling_factor.is_finite() && budget.scaling_factor >= 0.0) {
            return Err(ConfigError::InvalidBudget(format!(
                "scaling_factor ({}) must be finite and non-negative",
                budget.scaling_factor
            )));
        }

        let ZoomRange { min, max } = self.zoom;
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::InvalidZoomRange { min, max });
        }

        if !self.default_view.has_finite_center() {
            return Err(ConfigError::InvalidDefaultView(
                "center coordinates must be finite".to_string(),
            ));
        }

        Ok(())
    }

    /// Builds the iteration budget policy for this configuration.
    #[must_use]
    pub fn budget_policy(&self) -> IterationBudgetPolicy {
        IterationBudgetPolicy::from_config(&self.budget)
    }

    /// Builds a request view with the zoom clamped to the configured range.
    #[must_use]
    pub fn view(&self, center_real: f64, center_imag: f64, zoom: f64) -> ViewState {
        ViewState::clamped(center_real, center_imag, zoom, &self.zoom)
    }
}
