#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Fixed rectangular pixel grid. Each pixel is one independent work unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelGrid {
    pub width: u32,
    pub height: u32,
}

impl PixelGrid {
    /// Creates a grid with the given dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the number of pixels (work units) in the grid.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Returns true if the grid has no pixels.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calculates the row-major linear index for the given coordinates.
    /// Returns None if the coordinates are out of bounds.
    #[must_use]
    pub const fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// Maps a linear index back to `(x, y)` with `x = i mod W` and `y = i div W`.
    /// Returns None if the index is outside the grid.
    #[must_use]
    pub const fn coords(&self, index: usize) -> Option<(u32, u32)> {
        if index < self.len() {
            let width = self.width as usize;
            #[allow(clippy::cast_possible_truncation)]
            Some(((index % width) as u32, (index / width) as u32))
        } else {
            None
        }
    }
}

impl Default for PixelGrid {
    fn default() -> Self {
        Self::new(800, 600)
    }
}
