//! Ring-at-a-time incremental flood fill.
//!
//! [`RingWave`] does the same work as the one-shot engines, but a host loop
//! drives it with [`RingWave::process_frame`] under a per-frame time budget,
//! rendering the partial mask in between. Phases:
//!
//! ```text
//! Uninitialized --initialize--> Initialized --process_frame--> Running --frontier empty--> Complete
//!       ^                                                                                   |
//!       +---------------------------------- reset (from any phase) ------------------------+
//! ```

mod breathing;

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::fill::{resolve_seed, step, ColorMatcher, ACCEPTED, REJECTED, UNSEEN};
use crate::raster::{Bounds, BoundsTracker, FillResult, Mask, RasterBuffer};
use crate::settings::Connectivity;

pub use breathing::ToleranceChange;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum WavePhase {
    #[default]
    Uninitialized,
    Initialized,
    Running,
    Complete,
}

/// What one `process_frame` call did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub completed: bool,
    pub pixels_accepted: usize,
    pub rings_processed: u32,
    pub time_used: Duration,
}

/// Raster-independent session state. The owning [`RingWave`] holds the raster
/// and lends it to every call.
struct WaveState {
    width: u32,
    height: u32,
    visited: Vec<u8>,
    current_ring: Vec<u32>,
    next_ring: Vec<u32>,
    mask: Mask,
    accepted: Vec<u32>,
    bounds: BoundsTracker,
    matcher: ColorMatcher,
    connectivity: Connectivity,
    seed: (u32, u32),
    seed_index: u32,
    ring_number: u32,
}

impl WaveState {
    fn start(raster: &RasterBuffer, x: i32, y: i32, tolerance: u8, connectivity: Connectivity) -> Option<Self> {
        let seed = resolve_seed(raster, x, y)?;
        let (w, h) = (raster.width(), raster.height());
        let mut state = Self {
            width: w,
            height: h,
            visited: vec![UNSEEN; raster.pixel_count()],
            current_ring: vec![seed.index],
            next_ring: Vec::new(),
            mask: Mask::new(w, h),
            accepted: Vec::new(),
            bounds: BoundsTracker::new(),
            matcher: ColorMatcher::new(seed.color, tolerance),
            connectivity,
            seed: (seed.x, seed.y),
            seed_index: seed.index,
            ring_number: 0,
        };
        state.accept(seed.index);
        Some(state)
    }

    #[inline(always)]
    fn accept(&mut self, index: u32) {
        self.visited[index as usize] = ACCEPTED;
        self.mask.set(index as usize);
        self.accepted.push(index);
        self.bounds.include(index % self.width, index / self.width);
    }

    /// Expand the whole current ring; returns pixels accepted.
    fn expand_ring(&mut self, raster: &RasterBuffer) -> usize {
        let pixels = raster.pixels();
        let (w, h) = (self.width, self.height);
        let before = self.accepted.len();
        let ring = std::mem::take(&mut self.current_ring);
        for &idx in &ring {
            let (x, y) = (idx % w, idx / w);
            for &(dx, dy) in self.connectivity.offsets() {
                let Some((nx, ny)) = step(x, y, dx, dy, w, h) else { continue };
                let ni = ny * w + nx;
                if self.visited[ni as usize] != UNSEEN {
                    continue;
                }
                if self.matcher.matches(pixels[ni as usize]) {
                    self.accept(ni);
                    self.next_ring.push(ni);
                } else {
                    self.visited[ni as usize] = REJECTED;
                }
            }
        }
        self.current_ring = std::mem::take(&mut self.next_ring);
        self.next_ring = ring;
        self.next_ring.clear();
        self.ring_number += 1;
        self.accepted.len() - before
    }
}

#[derive(Default)]
pub struct RingWave {
    raster: Option<Arc<RasterBuffer>>,
    state: Option<WaveState>,
    phase: WavePhase,
    expansion_rate: u32,
    started: Option<Instant>,
}

impl RingWave {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a new session. An out-of-bounds seed returns false and leaves the
    /// current session untouched; otherwise any running session is dropped
    /// first.
    pub fn initialize(
        &mut self,
        raster: Arc<RasterBuffer>,
        seed_x: i32,
        seed_y: i32,
        tolerance: u8,
        connectivity: Connectivity,
        expansion_rate: u32,
    ) -> bool {
        if !raster.contains(seed_x as i64, seed_y as i64) {
            return false;
        }
        self.reset();
        let Some(state) = WaveState::start(&raster, seed_x, seed_y, tolerance, connectivity) else {
            return false;
        };
        self.state = Some(state);
        self.raster = Some(raster);
        self.expansion_rate = expansion_rate.max(1);
        self.phase = WavePhase::Initialized;
        self.started = Some(Instant::now());
        true
    }

    /// Process whole rings until `expansion_rate` rings are done, the budget
    /// runs out, or the frontier empties. Calling this without a session is a
    /// harmless no-op that reports completion.
    pub fn process_frame(&mut self, time_budget: Duration) -> FrameReport {
        let frame_start = Instant::now();
        let (Some(raster), Some(state)) = (self.raster.as_deref(), self.state.as_mut()) else {
            return FrameReport {
                completed: true,
                ..FrameReport::default()
            };
        };
        if self.phase == WavePhase::Complete {
            return FrameReport {
                completed: true,
                ..FrameReport::default()
            };
        }
        self.phase = WavePhase::Running;

        let mut report = FrameReport::default();
        while report.rings_processed < self.expansion_rate && !state.current_ring.is_empty() {
            report.pixels_accepted += state.expand_ring(raster);
            report.rings_processed += 1;
            if frame_start.elapsed() >= time_budget {
                break;
            }
        }
        if state.current_ring.is_empty() {
            self.phase = WavePhase::Complete;
            report.completed = true;
        }
        report.time_used = frame_start.elapsed();
        report
    }

    /// Drop the session and return to `Uninitialized`.
    pub fn reset(&mut self) {
        self.raster = None;
        self.state = None;
        self.phase = WavePhase::Uninitialized;
        self.started = None;
    }

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn is_initialized(&self) -> bool {
        self.phase != WavePhase::Uninitialized
    }

    pub fn is_complete(&self) -> bool {
        self.phase == WavePhase::Complete
    }

    pub fn mask(&self) -> Option<&Mask> {
        self.state.as_ref().map(|s| &s.mask)
    }

    pub fn bounds(&self) -> Bounds {
        self.state.as_ref().map_or(Bounds::EMPTY, |s| s.bounds.finish())
    }

    pub fn accepted_count(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.accepted.len())
    }

    pub fn ring_number(&self) -> u32 {
        self.state.as_ref().map_or(0, |s| s.ring_number)
    }

    pub fn seed(&self) -> Option<(u32, u32)> {
        self.state.as_ref().map(|s| s.seed)
    }

    pub fn tolerance(&self) -> Option<u8> {
        self.state.as_ref().map(|s| s.matcher.tolerance())
    }

    pub fn raster(&self) -> Option<&Arc<RasterBuffer>> {
        self.raster.as_ref()
    }

    /// Copy of the current state shaped like a one-shot result.
    pub fn snapshot(&self) -> Option<FillResult> {
        let state = self.state.as_ref()?;
        Some(FillResult {
            mask: state.mask.clone(),
            bounds: state.bounds.finish(),
            pixels: state.accepted.clone(),
            rings: state.ring_number,
            elapsed: self.started.map_or(Duration::ZERO, |t| t.elapsed()),
        })
    }
}

/// Run the ring wave to completion in one call.
pub fn wave_fill(
    raster: &RasterBuffer,
    seed_x: i32,
    seed_y: i32,
    tolerance: u8,
    connectivity: Connectivity,
) -> FillResult {
    let started = Instant::now();
    let Some(mut state) = WaveState::start(raster, seed_x, seed_y, tolerance, connectivity) else {
        return FillResult::empty(raster.width(), raster.height());
    };
    while !state.current_ring.is_empty() {
        state.expand_ring(raster);
    }
    FillResult {
        bounds: state.bounds.finish(),
        mask: state.mask,
        pixels: state.accepted,
        rings: state.ring_number,
        elapsed: started.elapsed(),
    }
}
