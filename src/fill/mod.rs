//! One-shot fill engines and the dispatcher that picks between them.

pub mod predicate;
mod hybrid;
mod queue;
pub mod rescan;
mod scanline;

use std::time::Instant;

use crate::raster::{FillResult, RasterBuffer, RegionBuilder};
use crate::settings::{Connectivity, Engine, EngineSettings};
use crate::{log_info, wave};

pub use hybrid::hybrid_fill;
pub use predicate::ColorMatcher;
pub use queue::{instant_fill, queue_fill};
pub use rescan::boundary_rescan_fill;
pub use scanline::scanline_fill;

// Per-pixel visit states.
pub(crate) const UNSEEN: u8 = 0;
pub(crate) const ACCEPTED: u8 = 1;
pub(crate) const REJECTED: u8 = 2;

/// Signature shared by the exact one-shot engines.
pub type FillFn = fn(&RasterBuffer, i32, i32, u8, Connectivity) -> FillResult;

#[derive(Clone, Copy, Debug)]
pub(crate) struct Seed {
    pub x: u32,
    pub y: u32,
    pub index: u32,
    pub color: [u8; 4],
}

/// None when the seed lies off the raster; callers turn that into an empty result.
pub(crate) fn resolve_seed(raster: &RasterBuffer, x: i32, y: i32) -> Option<Seed> {
    if !raster.contains(x as i64, y as i64) {
        return None;
    }
    let (x, y) = (x as u32, y as u32);
    Some(Seed {
        x,
        y,
        index: raster.index(x, y) as u32,
        color: raster.pixel(x, y),
    })
}

#[inline(always)]
pub(crate) fn step(x: u32, y: u32, dx: i32, dy: i32, w: u32, h: u32) -> Option<(u32, u32)> {
    let nx = x as i64 + dx as i64;
    let ny = y as i64 + dy as i64;
    if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
        None
    } else {
        Some((nx as u32, ny as u32))
    }
}

pub fn engine_fn(engine: Engine) -> Option<FillFn> {
    match engine {
        Engine::Hybrid => Some(hybrid_fill),
        Engine::Instant => Some(instant_fill),
        Engine::Scanline => Some(scanline_fill),
        Engine::Queue => Some(queue_fill),
        Engine::Wave(_) | Engine::BoundaryRescan(_) => None,
    }
}

/// Run the engine named by `settings` to completion.
///
/// The wave engine is driven synchronously here; use [`crate::wave::RingWave`]
/// directly to spread it across frames.
pub fn fill_with_engine(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    settings: &EngineSettings,
) -> FillResult {
    let tol = settings.tolerance;
    let conn = settings.connectivity;
    let result = if !settings.contiguous {
        global_select(raster, seed_x, seed_y, tol)
    } else {
        match settings.engine {
            Engine::Hybrid => hybrid_fill(raster, seed_x, seed_y, tol, conn),
            Engine::Instant => instant_fill(raster, seed_x, seed_y, tol, conn),
            Engine::Scanline => scanline_fill(raster, seed_x, seed_y, tol, conn),
            Engine::Queue => queue_fill(raster, seed_x, seed_y, tol, conn),
            Engine::Wave(_) => wave::wave_fill(raster, seed_x, seed_y, tol, conn),
            Engine::BoundaryRescan(params) => {
                boundary_rescan_fill(raster, seed_x, seed_y, tol, conn, &params)
            }
        }
    };
    log_info!(
        "{} fill at ({}, {}) tol={} conn={} -> {} px, {} rings in {:.2}ms",
        if settings.contiguous { settings.engine.name() } else { "Global" },
        seed_x,
        seed_y,
        tol,
        conn.as_u8(),
        result.pixel_count(),
        result.rings,
        result.elapsed.as_secs_f64() * 1000.0
    );
    result
}

/// Every pixel matching the seed colour, connected or not.
pub fn global_select(raster: &RasterBuffer, seed_x: i32, seed_y: i32, tolerance: u8) -> FillResult {
    let started = Instant::now();
    let Some(seed) = resolve_seed(raster, seed_x, seed_y) else {
        return FillResult::empty(raster.width(), raster.height());
    };
    let matcher = ColorMatcher::new(seed.color, tolerance);
    let w = raster.width();
    let mut region = RegionBuilder::new(w, raster.height());
    for (i, &px) in raster.pixels().iter().enumerate() {
        if matcher.matches(px) {
            let i = i as u32;
            region.accept(i, i % w, i / w);
        }
    }
    region.finish(1, started)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::raster::RasterBuffer;

    pub const RED: [u8; 4] = [255, 0, 0, 255];
    pub const CLEAR: [u8; 4] = [0, 0, 0, 0];

    /// 4x4, opaque red 2x2 block in the top-left, transparent elsewhere.
    pub fn red_block() -> RasterBuffer {
        let mut r = RasterBuffer::filled(4, 4, CLEAR).unwrap();
        for (x, y) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
            let i = r.index(x, y);
            r.pixels_mut()[i] = RED;
        }
        r
    }

    /// Build a raster from an ASCII picture; each distinct char is a colour.
    pub fn from_art(rows: &[&str]) -> RasterBuffer {
        let h = rows.len() as u32;
        let w = rows[0].len() as u32;
        let mut r = RasterBuffer::filled(w, h, CLEAR).unwrap();
        for (y, row) in rows.iter().enumerate() {
            for (x, c) in row.bytes().enumerate() {
                let i = r.index(x as u32, y as u32);
                r.pixels_mut()[i] = [c, c.wrapping_mul(7), c.wrapping_mul(13), 255];
            }
        }
        r
    }
}
