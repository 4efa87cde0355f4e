use log::warn;

use crate::config::BudgetConfig;

/// Maps a zoom factor to the number of escape-time iterations per pixel.
///
/// Deeper zoom needs more iterations to separate boundary detail, so the
/// budget grows with `log2(zoom)` above zoom 1 and is clamped to
/// `[min_iterations, max_iterations]`, where `min_iterations` is the base
/// count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IterationBudgetPolicy {
    base_iterations: u32,
    max_iterations: u32,
    scaling_factor: f64,
}

impl IterationBudgetPolicy {
    /// Creates a policy. `max_iterations` is raised to `base_iterations` if
    /// given lower, keeping the clamp range non-empty.
    #[must_use]
    pub fn new(base_iterations: u32, max_iterations: u32, scaling_factor: f64) -> Self {
        if max_iterations < base_iterations {
            warn!(
                "max_iterations {} below base_iterations {}, raising it",
                max_iterations, base_iterations
            );
        }
        Self {
            base_iterations,
            max_iterations: max_iterations.max(base_iterations),
            scaling_factor,
        }
    }

    #[must_use]
    pub fn from_config(config: &BudgetConfig) -> Self {
        Self::new(
            config.base_iterations,
            config.max_iterations,
            config.scaling_factor,
        )
    }

    #[must_use]
    pub const fn min_iterations(&self) -> u32 {
        self.base_iterations
    }

    #[must_use]
    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Returns the iteration budget for `zoom`.
    ///
    /// Zoom values at or below 1 (and NaN) get exactly the base count.
    #[must_use]
    pub fn budget(&self, zoom: f64) -> u32 {
        if zoom.is_nan() || zoom <= 1.0 {
            return self.base_iterations;
        }

        #[allow(clippy::suboptimal_flops)]
        let scaled = (f64::from(self.base_iterations) + zoom.log2() * self.scaling_factor).round();
        // A non-finite scaling factor, or an infinite zoom with zero scaling,
        // yields NaN, which `clamp` would pass through.
        if scaled.is_nan() {
            return self.min_iterations();
        }
        to_u32(scaled.clamp(
            f64::from(self.min_iterations()),
            f64::from(self.max_iterations),
        ))
    }
}

/// `value` must already lie in `[0, u32::MAX]`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
const fn to_u32(value: f64) -> u32 {
    value as u32
}

impl Default for IterationBudgetPolicy {
    fn default() -> Self {
        Self::from_config(&BudgetConfig::default())
    }
}
