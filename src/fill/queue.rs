use std::collections::VecDeque;
use std::time::Instant;

use super::{resolve_seed, step, ColorMatcher, ACCEPTED, REJECTED, UNSEEN};
use crate::raster::{FillResult, RasterBuffer, RegionBuilder};
use crate::settings::Connectivity;

/// Classic BFS over a `VecDeque` of pixel indices.
pub fn queue_fill(
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

    let mut visited = vec![UNSEEN; raster.pixel_count()];
    let mut region = RegionBuilder::new(w, h);
    let mut queue: VecDeque<u32> = VecDeque::new();

    visited[seed.index as usize] = ACCEPTED;
    region.accept(seed.index, seed.x, seed.y);
    queue.push_back(seed.index);

    while let Some(idx) = queue.pop_front() {
        let (x, y) = (idx % w, idx / w);
        for &(dx, dy) in connectivity.offsets() {
            let Some((nx, ny)) = step(x, y, dx, dy, w, h) else { continue };
            let ni = ny * w + nx;
            if visited[ni as usize] != UNSEEN {
                continue;
            }
            if matcher.matches(pixels[ni as usize]) {
                visited[ni as usize] = ACCEPTED;
                region.accept(ni, nx, ny);
                queue.push_back(ni);
            } else {
                visited[ni as usize] = REJECTED;
            }
        }
    }

    region.finish(1, started)
}

/// Ring-at-a-time BFS over two preallocated index arrays.
///
/// Both arrays are sized to the pixel count up front, which is also the hard
/// ceiling on memory for a fill that selects everything.
pub fn instant_fill(
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
    let total = raster.pixel_count();

    let mut visited = vec![UNSEEN; total];
    let mut region = RegionBuilder::new(w, h);
    let mut current = vec![0u32; total];
    let mut next = vec![0u32; total];
    let mut current_len = 1usize;
    let mut rings = 0u32;

    visited[seed.index as usize] = ACCEPTED;
    region.accept(seed.index, seed.x, seed.y);
    current[0] = seed.index;

    while current_len > 0 {
        let mut next_len = 0usize;
        for &idx in &current[..current_len] {
            let (x, y) = (idx % w, idx / w);
            for &(dx, dy) in connectivity.offsets() {
                let Some((nx, ny)) = step(x, y, dx, dy, w, h) else { continue };
                let ni = ny * w + nx;
                if visited[ni as usize] != UNSEEN {
                    continue;
                }
                if matcher.matches(pixels[ni as usize]) {
                    visited[ni as usize] = ACCEPTED;
                    region.accept(ni, nx, ny);
                    next[next_len] = ni;
                    next_len += 1;
                } else {
                    visited[ni as usize] = REJECTED;
                }
            }
        }
        std::mem::swap(&mut current, &mut next);
        current_len = next_len;
        rings += 1;
    }

    region.finish(rings, started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fill::fixtures::*;
    use crate::raster::Bounds;

    #[test]
    fn red_block_from_corner() {
        let r = queue_fill(&red_block(), 0, 0, 0, Connectivity::Four);
        assert_eq!(r.pixels, vec![0, 1, 4, 5]);
        assert_eq!(r.bounds, Bounds::new(0, 0, 2, 2));
    }

    #[test]
    fn transparent_region_is_the_rest() {
        // the block does not isolate (3,3): the L-shaped clear area is connected
        let r = instant_fill(&red_block(), 3, 3, 0, Connectivity::Four);
        assert_eq!(r.pixel_count(), 12);
        assert!(r.mask.is_set(15));
        assert!(!r.mask.is_set(0));
        assert_eq!(r.bounds, Bounds::new(0, 0, 4, 4));
    }

    #[test]
    fn off_canvas_seed_is_empty() {
        for (x, y) in [(-1, -1), (4, 0), (0, 4)] {
            let r = instant_fill(&red_block(), x, y, 255, Connectivity::Eight);
            assert!(r.is_empty());
            assert_eq!(r.bounds, Bounds::EMPTY);
            assert!(r.mask.is_empty());
        }
    }

    #[test]
    fn no_wrap_across_row_ends() {
        // column 0 and column 3 share a colour but are not adjacent
        let raster = from_art(&["a..a", "a..a", "a..a"]);
        let r = queue_fill(&raster, 0, 0, 0, Connectivity::Eight);
        assert_eq!(r.pixels.len(), 3);
        assert!(r.pixels.iter().all(|i| i % 4 == 0));
    }

    #[test]
    fn diagonal_only_joins_with_eight() {
        let raster = from_art(&["a.", ".a"]);
        assert_eq!(instant_fill(&raster, 0, 0, 0, Connectivity::Four).pixel_count(), 1);
        let r = instant_fill(&raster, 0, 0, 0, Connectivity::Eight);
        assert_eq!(r.pixel_count(), 2);
        assert_eq!(r.rings, 2);
    }
}
