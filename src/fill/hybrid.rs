use std::time::Instant;

use super::{resolve_seed, ColorMatcher};
use crate::raster::{FillResult, RasterBuffer, RegionBuilder};
use crate::settings::Connectivity;

/// Filled spans of one row: sorted, disjoint, inclusive `(x0, x1)`.
type RowSpans = Vec<(u32, u32)>;

/// End column of the span covering `x`, if any.
#[inline]
fn covering_span_end(spans: &RowSpans, x: u32) -> Option<u32> {
    let idx = spans.partition_point(|&(start, _)| start <= x);
    if idx > 0 && spans[idx - 1].1 >= x {
        Some(spans[idx - 1].1)
    } else {
        None
    }
}

#[inline]
fn insert_span(spans: &mut RowSpans, span: (u32, u32)) {
    let idx = spans.partition_point(|&(start, _)| start < span.0);
    spans.insert(idx, span);
}

/// Scanline fill driven by a flat `[x, y, x, y, ...]` stack, with visited
/// state kept as per-row span lists instead of a per-pixel bitmap.
pub fn hybrid_fill(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    tolerance: u8,
    connectivity: Connectivity,
) -> FillResult {
    let started = Instant::now();
    let Some(seed) = resolve_seed(raster, seed_x, seed_y) else {
        return FillResult::empty(raster.width(), raster.height());
    };
    let matcher = ColorMatcher::new(seed.color, tolerance);
    fill_from(raster, seed.x, seed.y, &matcher, connectivity, started)
}

/// Span fill from an in-bounds start point against an explicit matcher. The
/// start pixel itself must pass the matcher or the result is empty.
pub(super) fn fill_from(
    raster: &RasterBuffer,
    start_x: u32,
    start_y: u32,
    matcher: &ColorMatcher,
    connectivity: Connectivity,
    started: Instant,
) -> FillResult {
    let (w, h) = (raster.width(), raster.height());
    let pixels = raster.pixels();
    let reach = connectivity.span_reach();
    let stride = w as usize;
    let matches_at = |x: u32, y: u32| matcher.matches(pixels[y as usize * stride + x as usize]);

    let mut rows: Vec<RowSpans> = vec![Vec::new(); h as usize];
    let mut region = RegionBuilder::new(w, h);
    let mut stack: Vec<u32> = Vec::with_capacity(256);
    stack.push(start_x);
    stack.push(start_y);
    let mut spans = 0u32;

    while let Some(y) = stack.pop() {
        let Some(x) = stack.pop() else { break };
        let row = &rows[y as usize];
        if covering_span_end(row, x).is_some() || !matches_at(x, y) {
            continue;
        }

        let mut lx = x;
        while lx > 0 && matches_at(lx - 1, y) && covering_span_end(row, lx - 1).is_none() {
            lx -= 1;
        }
        let mut rx = x;
        while rx + 1 < w && matches_at(rx + 1, y) && covering_span_end(row, rx + 1).is_none() {
            rx += 1;
        }
        insert_span(&mut rows[y as usize], (lx, rx));
        let base = y * w;
        for sx in lx..=rx {
            region.accept(base + sx, sx, y);
        }
        spans += 1;

        let from = lx.saturating_sub(reach);
        let to = (rx + reach).min(w - 1);
        for ny in [y.checked_sub(1), (y + 1 < h).then_some(y + 1)].into_iter().flatten() {
            let nrow = &rows[ny as usize];
            let mut sx = from;
            let mut in_run = false;
            while sx <= to {
                if let Some(end) = covering_span_end(nrow, sx) {
                    in_run = false;
                    sx = end + 1;
                    continue;
                }
                if matches_at(sx, ny) {
                    if !in_run {
                        stack.push(sx);
                        stack.push(ny);
                        in_run = true;
                    }
                } else {
                    in_run = false;
                }
                sx += 1;
            }
        }
    }

    region.finish(spans, started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::fixtures::*;
    use crate::raster::Bounds;

    #[test]
    fn span_lookup() {
        let mut spans = RowSpans::new();
        insert_span(&mut spans, (10, 12));
        insert_span(&mut spans, (2, 4));
        insert_span(&mut spans, (6, 6));
        assert_eq!(spans, vec![(2, 4), (6, 6), (10, 12)]);
        assert_eq!(covering_span_end(&spans, 3), Some(4));
        assert_eq!(covering_span_end(&spans, 6), Some(6));
        assert_eq!(covering_span_end(&spans, 5), None);
        assert_eq!(covering_span_end(&spans, 13), None);
        assert_eq!(covering_span_end(&spans, 0), None);
    }

    #[test]
    fn fills_around_a_hole() {
        let raster = from_art(&[
            "aaaaa", //
            "a.a.a",
            "aaaaa",
        ]);
        let r = hybrid_fill(&raster, 2, 1, 0, Connectivity::Four);
        assert_eq!(r.pixel_count(), 13);
        assert_eq!(r.bounds, Bounds::new(0, 0, 5, 3));
        assert!(!r.mask.is_set(6));
        assert!(!r.mask.is_set(8));
    }

    #[test]
    fn u_shape_needs_revisits() {
        let raster = from_art(&[
            "a...a", //
            "a...a",
            "aaaaa",
        ]);
        let r = hybrid_fill(&raster, 4, 0, 0, Connectivity::Four);
        assert_eq!(r.pixel_count(), 9);
    }
}
