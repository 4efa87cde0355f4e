/// Squared magnitude a point must strictly exceed to count as escaped.
pub const ESCAPE_RADIUS_SQUARED: f64 = 4.0;

/// Counts iterations of `z <- z^2 + c` for `c = (real, imag)` starting at zero.
///
/// The magnitude test runs before each step and uses a strict `>` against
/// [`ESCAPE_RADIUS_SQUARED`], so a point sitting exactly on the radius takes
/// one more step before it is reported as escaped. A return value equal to
/// `budget` means the point never escaped and is presumed inside the set.
///
/// The WGSL kernel in `fractal-gpu` mirrors this loop line for line.
#[must_use]
pub fn escape_time(real: f64, imag: f64, budget: u32) -> u32 {
    let mut zr = 0.0_f64;
    let mut zi = 0.0_f64;
    let mut iterations = 0_u32;

    while iterations < budget {
        let zr2 = zr * zr;
        let zi2 = zi * zi;
        if zr2 + zi2 > ESCAPE_RADIUS_SQUARED {
            break;
        }
        let new_zr = zr2 - zi2 + real;
        zi = 2.0 * zr * zi + imag;
        zr = new_zr;
        iterations += 1;
    }

    iterations
}
