use crate::fill::ColorMatcher;
use crate::raster::{Bounds, BoundsTracker, Mask, RasterBuffer};

/// Padding applied around preview bounds when invalidating the overlay.
pub const DIRTY_PADDING: u32 = 2;

/// Instant feedback before any engine runs: the seed's 3x3 neighbourhood,
/// keeping only pixels that match the seed colour, clipped to the raster.
pub fn seed_flash(raster: &RasterBuffer, x: i32, y: i32, tolerance: u8) -> Option<(Mask, Bounds)> {
    if !raster.contains(x as i64, y as i64) {
        return None;
    }
    let (w, h) = (raster.width() as i64, raster.height() as i64);
    let matcher = ColorMatcher::new(raster.pixel(x as u32, y as u32), tolerance);
    let mut mask = Mask::new(raster.width(), raster.height());
    let mut bounds = BoundsTracker::new();
    for ny in (y as i64 - 1).max(0)..=(y as i64 + 1).min(h - 1) {
        for nx in (x as i64 - 1).max(0)..=(x as i64 + 1).min(w - 1) {
            let (nx, ny) = (nx as u32, ny as u32);
            if matcher.matches(raster.pixel(nx, ny)) {
                mask.set(raster.index(nx, ny));
                bounds.include(nx, ny);
            }
        }
    }
    Some((mask, bounds.finish()))
}

/// Region of the overlay that must be redrawn for a preview covering `bounds`.
pub fn dirty_rect(bounds: &Bounds, width: u32, height: u32) -> Bounds {
    bounds.padded(DIRTY_PADDING, width, height)
}
