//! Low-resolution proxy fill refined along its boundary at full resolution.
//!
//! 1. Downscale (nearest neighbour) so the long side is at most
//!    `proxy_max_dim`, and span-fill the proxy using the full-resolution seed
//!    colour.
//! 2. Upscale the proxy mask, find its edge pixels, and clear a ribbon of
//!    `buffer_radius` pixels around every edge.
//! 3. Re-admit ribbon pixels that match the seed colour and touch an already
//!    confirmed pixel, sweeping alternately forwards and backwards for at most
//!    `buffer_radius` passes or until nothing changes.
//!
//! Results match the exact engines everywhere except within the ribbon.

use std::time::Instant;

use super::{hybrid, resolve_seed, step, ColorMatcher};
use crate::raster::{FillResult, Mask, RasterBuffer};
use crate::settings::{Connectivity, RescanParams};

/// Proxy dimensions for a `w`x`h` raster; unchanged when already small enough.
pub fn proxy_size(w: u32, h: u32, max_dim: u32) -> (u32, u32) {
    let long = w.max(h);
    if long <= max_dim {
        return (w, h);
    }
    let scale = max_dim as f64 / long as f64;
    let pw = ((w as f64 * scale).floor() as u32).max(1);
    let ph = ((h as f64 * scale).floor() as u32).max(1);
    (pw, ph)
}

pub fn downscale_nearest(raster: &RasterBuffer, pw: u32, ph: u32) -> RasterBuffer {
    let (w, h) = (raster.width(), raster.height());
    let src = raster.pixels();
    let mut data = Vec::with_capacity(pw as usize * ph as usize * 4);
    for py in 0..ph {
        let sy = (py as u64 * h as u64 / ph as u64) as usize;
        for px in 0..pw {
            let sx = (px as u64 * w as u64 / pw as u64) as usize;
            data.extend_from_slice(&src[sy * w as usize + sx]);
        }
    }
    RasterBuffer::from_raw_parts(pw, ph, data)
}

pub fn upscale_mask(proxy: &Mask, w: u32, h: u32) -> Mask {
    let (pw, ph) = (proxy.width(), proxy.height());
    let src = proxy.as_bytes();
    let col_map: Vec<usize> = (0..w)
        .map(|x| (x as u64 * pw as u64 / w as u64) as usize)
        .collect();
    let mut out = Mask::new(w, h);
    let dst = out.as_bytes_mut();
    for y in 0..h as usize {
        let py = (y as u64 * ph as u64 / h as u64) as usize;
        let src_row = &src[py * pw as usize..(py + 1) * pw as usize];
        let dst_row = &mut dst[y * w as usize..(y + 1) * w as usize];
        for (d, &px) in dst_row.iter_mut().zip(&col_map) {
            *d = src_row[px];
        }
    }
    out
}

/// Proxy fill upscaled to full size with no boundary refinement. Used for
/// the quick first frame of a large preview.
pub fn proxy_fill(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    tolerance: u8,
    connectivity: Connectivity,
    max_dim: u32,
) -> FillResult {
    let started = Instant::now();
    let (w, h) = (raster.width(), raster.height());
    let Some(seed) = resolve_seed(raster, seed_x, seed_y) else {
        return FillResult::empty(w, h);
    };
    let matcher = ColorMatcher::new(seed.color, tolerance);
    let (pw, ph) = proxy_size(w, h, max_dim);
    if (pw, ph) == (w, h) {
        return hybrid::fill_from(raster, seed.x, seed.y, &matcher, connectivity, started);
    }
    let proxy = downscale_nearest(raster, pw, ph);
    let (psx, psy) = proxy_point(seed.x, seed.y, w, h, pw, ph);
    let coarse = hybrid::fill_from(&proxy, psx, psy, &matcher, connectivity, started);
    let mut mask = upscale_mask(&coarse.mask, w, h);
    mask.set(seed.index as usize);
    FillResult::from_mask(mask, 1, started)
}

pub fn boundary_rescan_fill(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    tolerance: u8,
    connectivity: Connectivity,
    params: &RescanParams,
) -> FillResult {
    let started = Instant::now();
    let (w, h) = (raster.width(), raster.height());
    let Some(seed) = resolve_seed(raster, seed_x, seed_y) else {
        return FillResult::empty(w, h);
    };
    let matcher = ColorMatcher::new(seed.color, tolerance);
    let (pw, ph) = proxy_size(w, h, params.proxy_max_dim());
    if (pw, ph) == (w, h) {
        // Nothing to gain from a proxy; this is exact.
        return hybrid::fill_from(raster, seed.x, seed.y, &matcher, connectivity, started);
    }

    let proxy = downscale_nearest(raster, pw, ph);
    let (psx, psy) = proxy_point(seed.x, seed.y, w, h, pw, ph);
    let coarse = hybrid::fill_from(&proxy, psx, psy, &matcher, connectivity, started);
    let mut mask = upscale_mask(&coarse.mask, w, h);
    mask.set(seed.index as usize);

    let radius = params.buffer_radius();
    let ribbon = ribbon_around_edges(&mask, radius);
    for &i in &ribbon {
        mask.clear(i as usize);
    }
    mask.set(seed.index as usize);

    let pixels = raster.pixels();
    let candidates: Vec<u32> = ribbon
        .into_iter()
        .filter(|&i| i != seed.index && matcher.matches(pixels[i as usize]))
        .collect();

    let mut passes = 0u32;
    for pass in 0..radius {
        let mut changed = false;
        if pass % 2 == 0 {
            for &i in &candidates {
                changed |= admit_if_connected(&mut mask, i, connectivity);
            }
        } else {
            for &i in candidates.iter().rev() {
                changed |= admit_if_connected(&mut mask, i, connectivity);
            }
        }
        passes += 1;
        if !changed {
            break;
        }
    }

    FillResult::from_mask(mask, 1 + passes, started)
}

fn proxy_point(x: u32, y: u32, w: u32, h: u32, pw: u32, ph: u32) -> (u32, u32) {
    (
        ((x as u64 * pw as u64 / w as u64) as u32).min(pw - 1),
        ((y as u64 * ph as u64 / h as u64) as u32).min(ph - 1),
    )
}

/// Included pixels with an excluded or off-canvas 4-neighbour.
pub fn is_edge(mask: &Mask, x: u32, y: u32) -> bool {
    let (x, y) = (x as i64, y as i64);
    mask.is_set_at(x, y)
        && (!mask.is_set_at(x - 1, y)
            || !mask.is_set_at(x + 1, y)
            || !mask.is_set_at(x, y - 1)
            || !mask.is_set_at(x, y + 1))
}

/// Every pixel within Chebyshev distance `radius` of an edge pixel, sorted
/// by index.
fn ribbon_around_edges(mask: &Mask, radius: u32) -> Vec<u32> {
    let (w, h) = (mask.width(), mask.height());
    let mut in_ribbon = vec![false; w as usize * h as usize];
    let mut ribbon = Vec::new();
    for y in 0..h {
        for x in 0..w {
            if !is_edge(mask, x, y) {
                continue;
            }
            let y0 = y.saturating_sub(radius);
            let y1 = (y + radius).min(h - 1);
            let x0 = x.saturating_sub(radius);
            let x1 = (x + radius).min(w - 1);
            for ry in y0..=y1 {
                for rx in x0..=x1 {
                    let i = (ry * w + rx) as usize;
                    if !in_ribbon[i] {
                        in_ribbon[i] = true;
                        ribbon.push(i as u32);
                    }
                }
            }
        }
    }
    ribbon.sort_unstable();
    ribbon
}

fn admit_if_connected(mask: &mut Mask, index: u32, connectivity: Connectivity) -> bool {
    if mask.is_set(index as usize) {
        return false;
    }
    let (w, h) = (mask.width(), mask.height());
    let (x, y) = (index % w, index / w);
    let touches = connectivity.offsets().iter().any(|&(dx, dy)| {
        step(x, y, dx, dy, w, h).is_some_and(|(nx, ny)| mask.is_set((ny * w + nx) as usize))
    });
    if touches {
        mask.set(index as usize);
    }
    touches
}
