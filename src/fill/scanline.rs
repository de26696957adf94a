use std::time::Instant;

use super::{resolve_seed, ColorMatcher, ACCEPTED, REJECTED, UNSEEN};
use crate::raster::{FillResult, RasterBuffer, RegionBuilder};
use crate::settings::Connectivity;

/// Span fill: grow a horizontal run left and right from each task, then queue
/// one task per matching run on the rows above and below, restricted to the
/// run's x-range (widened by one column each side for 8-connectivity).
pub fn scanline_fill(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    tolerance: u8,
    connectivity: Connectivity,
) -> FillResult {
    let started = Instant::now();
    let (w, h) = (raster.width(), raster.height());
    let Some(seed) = resolve_seed(raster, seed_x, seed_y) else {
        return FillResult::empty(w, h);
    };
    let matcher = ColorMatcher::new(seed.color, tolerance);
    let pixels = raster.pixels();
    let reach = connectivity.span_reach();

    let mut visited = vec![UNSEEN; raster.pixel_count()];
    let mut region = RegionBuilder::new(w, h);
    let mut tasks: Vec<(u32, u32)> = vec![(seed.x, seed.y)];
    let mut spans = 0u32;

    while let Some((x, y)) = tasks.pop() {
        let row = y as usize * w as usize;
        if !test(&mut visited, pixels, &matcher, row + x as usize) {
            continue;
        }

        let mut lx = x;
        while lx > 0 && test(&mut visited, pixels, &matcher, row + lx as usize - 1) {
            lx -= 1;
        }
        let mut rx = x;
        while rx + 1 < w && test(&mut visited, pixels, &matcher, row + rx as usize + 1) {
            rx += 1;
        }
        for sx in lx..=rx {
            let i = row + sx as usize;
            visited[i] = ACCEPTED;
            region.accept(i as u32, sx, y);
        }
        spans += 1;

        let from = lx.saturating_sub(reach);
        let to = (rx + reach).min(w - 1);
        for ny in [y.checked_sub(1), (y + 1 < h).then_some(y + 1)].into_iter().flatten() {
            let nrow = ny as usize * w as usize;
            let mut in_run = false;
            for sx in from..=to {
                let i = nrow + sx as usize;
                if test(&mut visited, pixels, &matcher, i) {
                    if !in_run {
                        tasks.push((sx, ny));
                        in_run = true;
                    }
                } else {
                    in_run = false;
                }
            }
        }
    }

    region.finish(spans, started)
}

/// Failures are recorded as REJECTED so they are never re-tested; passing
/// pixels stay UNSEEN until their span is accepted.
#[inline(always)]
fn test(visited: &mut [u8], pixels: &[[u8; 4]], matcher: &ColorMatcher, i: usize) -> bool {
    if visited[i] != UNSEEN {
        return false;
    }
    if matcher.matches(pixels[i]) {
        true
    } else {
        visited[i] = REJECTED;
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::fixtures::*;
    use crate::raster::Bounds;

    #[test]
    fn follows_a_serpentine_corridor() {
        let raster = from_art(&[
            "aaaaa", //
            "bbbba",
            "aaaaa",
            "abbbb",
            "aaaaa",
        ]);
        let r = scanline_fill(&raster, 0, 0, 0, Connectivity::Four);
        assert_eq!(r.pixel_count(), 17);
        assert_eq!(r.bounds, Bounds::new(0, 0, 5, 5));
        let mut sorted = r.pixels.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), r.pixels.len(), "pixel listed twice");
    }

    #[test]
    fn diagonal_span_reach() {
        let raster = from_art(&["aa..", "..aa"]);
        assert_eq!(scanline_fill(&raster, 0, 0, 0, Connectivity::Four).pixel_count(), 2);
        assert_eq!(scanline_fill(&raster, 0, 0, 0, Connectivity::Eight).pixel_count(), 4);
    }

    #[test]
    fn red_block_from_corner() {
        let r = scanline_fill(&red_block(), 1, 1, 0, Connectivity::Four);
        let mut px = r.pixels.clone();
        px.sort_unstable();
        assert_eq!(px, vec![0, 1, 4, 5]);
        assert_eq!(r.rings, 2);
    }
}
