//! Tolerance changes on a live wave.
//!
//! Raising tolerance only re-tests the rejected frontier (rejected pixels
//! touching the accepted region); passing pixels join the next ring and the
//! wave carries on. Lowering it re-validates every accepted pixel and
//! re-floods from the seed, since pixels can lose their connection.

use std::time::Instant;

use super::{RingWave, WavePhase, WaveState};
use crate::fill::{step, ACCEPTED, REJECTED, UNSEEN};
use crate::raster::{BoundsTracker, Mask};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ToleranceChange {
    pub added: usize,
    pub removed: usize,
    /// Colour tests performed while applying the change.
    pub retested: usize,
}

impl RingWave {
    /// Apply a new tolerance mid-session. No-op without a session or when the
    /// tolerance is unchanged.
    pub fn update_tolerance(&mut self, tolerance: u8) -> ToleranceChange {
        let (Some(raster), Some(state)) = (self.raster.as_deref(), self.state.as_mut()) else {
            return ToleranceChange::default();
        };
        let old = state.matcher.tolerance();
        let change = if tolerance > old {
            state.grow(raster.pixels(), tolerance)
        } else if tolerance < old {
            state.shrink(raster.pixels(), tolerance)
        } else {
            return ToleranceChange::default();
        };

        if state.current_ring.is_empty() {
            self.phase = WavePhase::Complete;
        } else if self.phase == WavePhase::Complete {
            self.phase = WavePhase::Running;
        }
        if let Some(t) = self.started.as_mut() {
            *t = Instant::now();
        }
        change
    }

    /// Rejected pixels with an accepted neighbour.
    pub fn rejected_frontier(&self) -> Vec<u32> {
        self.state.as_ref().map_or_else(Vec::new, |s| s.rejected_frontier())
    }
}

impl WaveState {
    fn rejected_frontier(&self) -> Vec<u32> {
        let (w, h) = (self.width, self.height);
        let offsets = self.connectivity.offsets();
        self.visited
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v == REJECTED)
            .filter_map(|(i, _)| {
                let i = i as u32;
                let (x, y) = (i % w, i / w);
                offsets
                    .iter()
                    .any(|&(dx, dy)| {
                        step(x, y, dx, dy, w, h)
                            .is_some_and(|(nx, ny)| self.visited[(ny * w + nx) as usize] == ACCEPTED)
                    })
                    .then_some(i)
            })
            .collect()
    }

    fn grow(&mut self, pixels: &[[u8; 4]], tolerance: u8) -> ToleranceChange {
        let frontier = self.rejected_frontier();
        self.matcher = self.matcher.with_tolerance(tolerance);

        // Rejections were made under the old threshold; forget them so the
        // continuing wave re-tests anything it reaches.
        for v in self.visited.iter_mut() {
            if *v == REJECTED {
                *v = UNSEEN;
            }
        }

        let mut change = ToleranceChange {
            retested: frontier.len(),
            ..ToleranceChange::default()
        };
        for i in frontier {
            if self.matcher.matches(pixels[i as usize]) {
                self.accept(i);
                self.current_ring.push(i);
                change.added += 1;
            } else {
                self.visited[i as usize] = REJECTED;
            }
        }
        change
    }

    fn shrink(&mut self, pixels: &[[u8; 4]], tolerance: u8) -> ToleranceChange {
        self.matcher = self.matcher.with_tolerance(tolerance);
        let (w, h) = (self.width, self.height);
        let previous = std::mem::take(&mut self.accepted);

        // Accepted pixels still passing are candidates; flood them from the seed.
        let mut candidate = vec![false; self.visited.len()];
        for &i in &previous {
            if self.matcher.matches(pixels[i as usize]) {
                candidate[i as usize] = true;
            }
        }
        let pending: Vec<u32> = self.current_ring.drain(..).collect();
        let mut keep = Mask::new(w, h);
        let mut accepted = Vec::with_capacity(previous.len());
        let mut bounds = BoundsTracker::new();
        let mut queue = std::collections::VecDeque::from([self.seed_index]);
        keep.set(self.seed_index as usize);
        while let Some(idx) = queue.pop_front() {
            accepted.push(idx);
            bounds.include(idx % w, idx / w);
            let (x, y) = (idx % w, idx / w);
            for &(dx, dy) in self.connectivity.offsets() {
                let Some((nx, ny)) = step(x, y, dx, dy, w, h) else { continue };
                let ni = (ny * w + nx) as usize;
                if candidate[ni] && !keep.is_set(ni) {
                    keep.set(ni);
                    queue.push_back(ni as u32);
                }
            }
        }

        for &i in &previous {
            if !keep.is_set(i as usize) {
                self.visited[i as usize] = if candidate[i as usize] { UNSEEN } else { REJECTED };
            }
        }
        self.current_ring = pending.into_iter().filter(|&i| keep.is_set(i as usize)).collect();
        let change = ToleranceChange {
            added: 0,
            removed: previous.len() - accepted.len(),
            retested: previous.len(),
        };
        self.mask = keep;
        self.accepted = accepted;
        self.bounds = bounds;
        change
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use crate::fill::instant_fill;
    use crate::raster::RasterBuffer;
    use crate::settings::Connectivity;
    use crate::wave::RingWave;

    const FOREVER: Duration = Duration::from_secs(60);

    /// Horizontal gradient: column x has grey level 10 * x.
    fn gradient(w: u32, h: u32) -> RasterBuffer {
        let mut r = RasterBuffer::filled(w, h, [0, 0, 0, 255]).unwrap();
        for y in 0..h {
            for x in 0..w {
                let i = r.index(x, y);
                let g = (x * 10) as u8;
                r.pixels_mut()[i] = [g, g, g, 255];
            }
        }
        r
    }

    fn run(wave: &mut RingWave) {
        while !wave.process_frame(FOREVER).completed {}
    }

    #[test]
    fn growing_tolerance_retests_only_the_frontier() {
        let raster = gradient(10, 4);
        let mut wave = RingWave::new();
        assert!(wave.initialize(Arc::new(raster.clone()), 0, 0, 10, Connectivity::Four, 100));
        run(&mut wave);
        // column 1 already sits 17.3 away from the seed
        assert_eq!(wave.accepted_count(), 4);

        let frontier = wave.rejected_frontier();
        assert_eq!(frontier.len(), 4);
        let change = wave.update_tolerance(40);
        assert_eq!(change.retested, 4);
        assert_eq!(change.added, 4);
        assert!(!wave.is_complete());

        run(&mut wave);
        let expected = instant_fill(&raster, 0, 0, 40, Connectivity::Four);
        assert_eq!(wave.mask(), Some(&expected.mask));
        assert_eq!(wave.bounds(), expected.bounds);
    }

    #[test]
    fn shrinking_tolerance_revalidates_everything() {
        let raster = gradient(10, 4);
        let mut wave = RingWave::new();
        assert!(wave.initialize(Arc::new(raster.clone()), 0, 0, 60, Connectivity::Four, 100));
        run(&mut wave);
        let before = wave.accepted_count();

        let change = wave.update_tolerance(10);
        assert_eq!(change.retested, before);
        run(&mut wave);
        let expected = instant_fill(&raster, 0, 0, 10, Connectivity::Four);
        assert_eq!(wave.mask(), Some(&expected.mask));
        assert_eq!(wave.accepted_count(), expected.pixel_count());
        assert_eq!(change.removed, before - expected.pixel_count());
    }

    #[test]
    fn shrinking_disconnects_islands() {
        // the right-hand 'a' pixels only connect to the seed through 'b'
        let raster = crate::fill::fixtures::from_art(&["aab", "bbb", "aab"]);
        let mut wave = RingWave::new();
        assert!(wave.initialize(Arc::new(raster.clone()), 0, 0, 255, Connectivity::Four, 100));
        run(&mut wave);
        assert_eq!(wave.accepted_count(), 9);
        wave.update_tolerance(0);
        run(&mut wave);
        assert_eq!(wave.accepted_count(), 2);
        assert!(wave.mask().unwrap().is_set(1));
        assert!(!wave.mask().unwrap().is_set(6));
    }

    #[test]
    fn unchanged_tolerance_is_ignored() {
        let mut wave = RingWave::new();
        assert_eq!(wave.update_tolerance(5), Default::default());
        assert!(wave.initialize(Arc::new(gradient(4, 1)), 0, 0, 5, Connectivity::Four, 1));
        assert_eq!(wave.update_tolerance(5), Default::default());
    }
}
