use std::sync::Arc;
use std::time::Duration;

use super::cancel::{RequestId, RequestTracker};
use super::flash::seed_flash;
use super::worker::{ReplyStage, SegmentationWorker};
use crate::error::WandResult;
use crate::fill::fill_with_engine;
use crate::raster::{Bounds, FillResult, Mask, RasterBuffer};
use crate::settings::{Engine, EngineSettings, PROXY_THRESHOLD};
use crate::wave::RingWave;
use crate::{log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStage {
    /// 3x3 seed neighbourhood emitted before any engine work.
    SeedFlash,
    /// Low-resolution worker result.
    Proxy,
    /// Wave progress after one tick.
    Partial,
    Final,
}

#[derive(Clone, Debug)]
pub struct PreviewFrame {
    pub request: RequestId,
    pub stage: FrameStage,
    pub mask: Arc<Mask>,
    pub bounds: Bounds,
    pub ring_number: u32,
    pub accepted_count: usize,
    pub complete: bool,
    pub seed: (u32, u32),
    pub tolerance: u8,
}

#[derive(Clone, Debug)]
pub enum PreviewUpdate {
    Frame(PreviewFrame),
    /// Nothing should be displayed.
    Cleared,
}

pub type PreviewListener = Box<dyn FnMut(&PreviewUpdate)>;

struct LastRequest {
    raster: Arc<RasterBuffer>,
    seed: (i32, i32),
    tolerance: u8,
    settings: EngineSettings,
}

/// Keeps at most one preview alive and drives it from the host's frame
/// callback.
///
/// Blocking engines finish inside [`start_preview`](Self::start_preview)
/// unless a worker is attached and the image is large. The wave engine
/// advances one budgeted step per [`tick`](Self::tick). Every result passes a
/// request-id check before it is emitted, so nothing from a superseded
/// request ever reaches the listener.
pub struct PreviewScheduler {
    tracker: RequestTracker,
    wave: RingWave,
    wave_request: Option<RequestId>,
    wave_budget: Duration,
    worker: Option<SegmentationWorker>,
    worker_threshold: usize,
    last: Option<LastRequest>,
    latest: Option<PreviewFrame>,
    listener: Option<PreviewListener>,
}

impl Default for PreviewScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PreviewScheduler {
    pub fn new() -> Self {
        Self {
            tracker: RequestTracker::new(),
            wave: RingWave::new(),
            wave_request: None,
            wave_budget: Duration::from_millis(8),
            worker: None,
            worker_threshold: PROXY_THRESHOLD,
            last: None,
            latest: None,
            listener: None,
        }
    }

    pub fn set_listener(&mut self, listener: PreviewListener) {
        self.listener = Some(listener);
    }

    /// Route blocking fills on images with at least `threshold` pixels to a
    /// background thread.
    pub fn enable_worker(&mut self, threshold: usize) -> WandResult<()> {
        if self.worker.is_none() {
            self.worker = Some(SegmentationWorker::spawn(&self.tracker)?);
        }
        self.worker_threshold = threshold;
        Ok(())
    }

    pub fn disable_worker(&mut self) {
        self.worker = None;
    }

    /// Cancel whatever is running and begin a preview at `seed`.
    ///
    /// Returns `None` when nothing was started: previews disabled or the seed
    /// off the raster. Both clear the displayed preview.
    pub fn start_preview(
        &mut self,
        raster: Arc<RasterBuffer>,
        seed: (i32, i32),
        tolerance: u8,
        settings: &EngineSettings,
    ) -> Option<RequestId> {
        self.stop_work();
        if !settings.preview_enabled || !raster.contains(seed.0 as i64, seed.1 as i64) {
            self.last = None;
            self.emit(PreviewUpdate::Cleared);
            return None;
        }

        let request = self.tracker.start();
        let mut settings = settings.clone();
        settings.tolerance = tolerance;
        self.last = Some(LastRequest {
            raster: Arc::clone(&raster),
            seed,
            tolerance,
            settings: settings.clone(),
        });

        if settings.zero_latency_preview
            && let Some((mask, bounds)) = seed_flash(&raster, seed.0, seed.1, tolerance)
        {
            let accepted_count = mask.count();
            self.emit(PreviewUpdate::Frame(PreviewFrame {
                request,
                stage: FrameStage::SeedFlash,
                mask: Arc::new(mask),
                bounds,
                ring_number: 0,
                accepted_count,
                complete: false,
                seed: (seed.0 as u32, seed.1 as u32),
                tolerance,
            }));
        }

        if let (Engine::Wave(params), true) = (settings.engine, settings.contiguous) {
            if self.wave.initialize(
                raster,
                seed.0,
                seed.1,
                tolerance,
                settings.connectivity,
                params.expansion_rate(),
            ) {
                self.wave_request = Some(request);
                self.wave_budget = params.time_budget();
            }
            return Some(request);
        }

        if let Some(worker) = self.worker.as_ref()
            && raster.pixel_count() >= self.worker_threshold
        {
            match worker.submit(request, &raster, seed, &settings) {
                Ok(()) => return Some(request),
                Err(e) => {
                    log_warn!("Worker unavailable ({}), filling on the caller's thread", e);
                    self.worker = None;
                }
            }
        }

        let result = fill_with_engine(&raster, seed.0, seed.1, &settings);
        self.tracker.complete(request);
        self.emit(one_shot_frame(request, FrameStage::Final, seed, tolerance, result));
        Some(request)
    }

    /// One host frame: collect worker replies and advance the wave. Returns
    /// true while more ticks are needed.
    pub fn tick(&mut self) -> bool {
        self.drain_worker();

        if let Some(request) = self.wave_request {
            if !self.tracker.is_valid(request) {
                self.wave_request = None;
            } else {
                let report = self.wave.process_frame(self.wave_budget);
                if let Some(frame) = self.wave_frame(request) {
                    self.emit(PreviewUpdate::Frame(frame));
                }
                if report.completed {
                    log_info!(
                        "Wave preview {} complete: {} px in {} rings",
                        request,
                        self.wave.accepted_count(),
                        self.wave.ring_number()
                    );
                    self.tracker.complete(request);
                    self.wave_request = None;
                }
            }
        }
        self.is_active()
    }

    /// Apply a new tolerance to the current preview. A wave session with
    /// breathing enabled adjusts in place; anything else restarts.
    pub fn update_tolerance(&mut self, tolerance: u8) -> Option<RequestId> {
        let last = self.last.as_ref()?;
        if last.tolerance == tolerance {
            return self.tracker.current();
        }
        let breathe = last.settings.breathing_enabled
            && last.settings.contiguous
            && last.settings.engine.is_incremental()
            && self.wave.is_initialized();
        if !breathe {
            let raster = Arc::clone(&last.raster);
            let seed = last.seed;
            let settings = last.settings.clone();
            return self.start_preview(raster, seed, tolerance, &settings);
        }

        let request = self.tracker.start();
        self.wave.update_tolerance(tolerance);
        if let Some(last) = self.last.as_mut() {
            last.tolerance = tolerance;
            last.settings.tolerance = tolerance;
        }
        if let Some(frame) = self.wave_frame(request) {
            self.emit(PreviewUpdate::Frame(frame));
        }
        if self.wave.is_complete() {
            self.tracker.complete(request);
            self.wave_request = None;
        } else {
            self.wave_request = Some(request);
        }
        Some(request)
    }

    /// Drop the active preview and clear what is displayed.
    pub fn cancel(&mut self) {
        self.stop_work();
        self.last = None;
        self.emit(PreviewUpdate::Cleared);
    }

    /// Pointer left the canvas or the window lost focus.
    pub fn mouse_leave(&mut self) {
        self.cancel();
    }

    pub fn is_active(&self) -> bool {
        self.tracker.has_active()
    }

    pub fn current_request(&self) -> Option<RequestId> {
        self.tracker.current()
    }

    /// The most recent frame of the live (or just finished) request. Starting
    /// or cancelling a request clears it.
    pub fn latest_frame(&self) -> Option<&PreviewFrame> {
        self.latest.as_ref()
    }

    pub fn wave(&self) -> &RingWave {
        &self.wave
    }

    fn stop_work(&mut self) {
        self.tracker.cancel_all();
        self.wave.reset();
        self.wave_request = None;
        self.latest = None;
    }

    fn drain_worker(&mut self) {
        let Some(worker) = self.worker.as_ref() else { return };
        let replies = match worker.poll() {
            Ok(r) => r,
            Err(e) => {
                log_warn!("Dropping worker: {}", e);
                self.worker = None;
                return;
            }
        };
        for reply in replies {
            if !self.tracker.is_valid(reply.request) {
                log_info!("Dropped stale worker result {}", reply.request);
                continue;
            }
            let stage = match reply.stage {
                ReplyStage::Proxy => FrameStage::Proxy,
                ReplyStage::Full => FrameStage::Final,
            };
            if stage == FrameStage::Final {
                self.tracker.complete(reply.request);
            }
            let frame = one_shot_frame(reply.request, stage, reply.seed, reply.tolerance, reply.result);
            self.emit(frame);
        }
    }

    fn wave_frame(&self, request: RequestId) -> Option<PreviewFrame> {
        let mask = self.wave.mask()?.clone();
        Some(PreviewFrame {
            request,
            stage: if self.wave.is_complete() { FrameStage::Final } else { FrameStage::Partial },
            mask: Arc::new(mask),
            bounds: self.wave.bounds(),
            ring_number: self.wave.ring_number(),
            accepted_count: self.wave.accepted_count(),
            complete: self.wave.is_complete(),
            seed: self.wave.seed().unwrap_or_default(),
            tolerance: self.wave.tolerance().unwrap_or_default(),
        })
    }

    fn emit(&mut self, update: PreviewUpdate) {
        if let Some(listener) = self.listener.as_mut() {
            listener(&update);
        }
        match update {
            PreviewUpdate::Frame(frame) => self.latest = Some(frame),
            PreviewUpdate::Cleared => self.latest = None,
        }
    }
}

fn one_shot_frame(
    request: RequestId,
    stage: FrameStage,
    seed: (i32, i32),
    tolerance: u8,
    result: FillResult,
) -> PreviewUpdate {
    PreviewUpdate::Frame(PreviewFrame {
        request,
        stage,
        bounds: result.bounds,
        ring_number: result.rings,
        accepted_count: result.pixels.len(),
        complete: stage == FrameStage::Final,
        mask: Arc::new(result.mask),
        seed: (seed.0.max(0) as u32, seed.1.max(0) as u32),
        tolerance,
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::fill::fixtures::red_block;
    use crate::settings::{Connectivity, WaveParams};

    fn recorder(s: &mut PreviewScheduler) -> Rc<RefCell<Vec<PreviewUpdate>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        s.set_listener(Box::new(move |u| sink.borrow_mut().push(u.clone())));
        log
    }

    fn quiet(engine: Engine) -> EngineSettings {
        EngineSettings {
            zero_latency_preview: false,
            ..EngineSettings::new(engine, 0, Connectivity::Four)
        }
    }

    #[test]
    fn one_shot_engine_emits_a_single_final_frame() {
        let mut s = PreviewScheduler::new();
        let log = recorder(&mut s);
        let id = s.start_preview(Arc::new(red_block()), (0, 0), 0, &quiet(Engine::Hybrid));
        assert!(id.is_some());
        assert!(!s.is_active());
        let log = log.borrow();
        assert_eq!(log.len(), 1);
        let PreviewUpdate::Frame(f) = &log[0] else { panic!("expected a frame") };
        assert!(f.complete);
        assert_eq!(f.accepted_count, 4);
        assert_eq!(f.bounds, Bounds::new(0, 0, 2, 2));
    }

    #[test]
    fn disabled_preview_is_a_no_op() {
        let mut s = PreviewScheduler::new();
        let log = recorder(&mut s);
        let settings = EngineSettings {
            preview_enabled: false,
            ..quiet(Engine::Hybrid)
        };
        assert!(s.start_preview(Arc::new(red_block()), (0, 0), 0, &settings).is_none());
        assert!(s.latest_frame().is_none());
        assert!(matches!(log.borrow().as_slice(), [PreviewUpdate::Cleared]));
    }

    #[test]
    fn seed_flash_precedes_the_result() {
        let mut s = PreviewScheduler::new();
        let log = recorder(&mut s);
        let settings = EngineSettings::new(Engine::Queue, 0, Connectivity::Four);
        s.start_preview(Arc::new(red_block()), (1, 1), 0, &settings);
        let stages: Vec<FrameStage> = log
            .borrow()
            .iter()
            .filter_map(|u| match u {
                PreviewUpdate::Frame(f) => Some(f.stage),
                PreviewUpdate::Cleared => None,
            })
            .collect();
        assert_eq!(stages, vec![FrameStage::SeedFlash, FrameStage::Final]);
    }

    #[test]
    fn wave_ticks_until_complete_with_rising_rings() {
        let mut s = PreviewScheduler::new();
        let log = recorder(&mut s);
        let raster = Arc::new(RasterBuffer::filled(16, 1, [3, 3, 3, 255]).unwrap());
        let params = WaveParams::new(1000, 2).unwrap();
        s.start_preview(raster, (0, 0), 0, &quiet(Engine::Wave(params)));
        assert!(s.is_active());
        let mut ticks = 0;
        while s.tick() {
            ticks += 1;
            assert!(ticks < 100);
        }
        let log = log.borrow();
        let rings: Vec<u32> = log
            .iter()
            .filter_map(|u| match u {
                PreviewUpdate::Frame(f) => Some(f.ring_number),
                PreviewUpdate::Cleared => None,
            })
            .collect();
        assert!(rings.windows(2).all(|w| w[0] < w[1]), "rings {rings:?}");
        let last = s.latest_frame().unwrap();
        assert!(last.complete);
        assert_eq!(last.accepted_count, 16);
    }

    #[test]
    fn new_preview_supersedes_running_wave() {
        let mut s = PreviewScheduler::new();
        let raster = Arc::new(RasterBuffer::filled(64, 64, [1, 1, 1, 255]).unwrap());
        let settings = quiet(Engine::Wave(WaveParams::new(1000, 1).unwrap()));
        let first = s.start_preview(Arc::clone(&raster), (0, 0), 0, &settings).unwrap();
        s.tick();
        let second = s.start_preview(raster, (63, 63), 0, &settings).unwrap();
        assert!(second > first);
        while s.tick() {}
        let last = s.latest_frame().unwrap();
        assert_eq!(last.request, second);
        assert_eq!(last.seed, (63, 63));
        assert!(last.complete);
    }

    #[test]
    fn mouse_leave_clears_everything() {
        let mut s = PreviewScheduler::new();
        let settings = quiet(Engine::Wave(WaveParams::default()));
        let raster = Arc::new(RasterBuffer::filled(32, 32, [1, 1, 1, 255]).unwrap());
        s.start_preview(raster, (5, 5), 0, &settings);
        s.tick();
        s.mouse_leave();
        assert!(!s.is_active());
        assert!(s.latest_frame().is_none());
        assert!(!s.tick());
        assert!(!s.wave().is_initialized());
    }

    #[test]
    fn off_canvas_seed_clears() {
        let mut s = PreviewScheduler::new();
        s.start_preview(Arc::new(red_block()), (0, 0), 0, &quiet(Engine::Hybrid));
        assert!(s.latest_frame().is_some());
        assert!(s.start_preview(Arc::new(red_block()), (-1, -1), 0, &quiet(Engine::Hybrid)).is_none());
        assert!(s.latest_frame().is_none());
    }

    #[test]
    fn breathing_keeps_the_wave_session() {
        let mut s = PreviewScheduler::new();
        let settings = quiet(Engine::Wave(WaveParams::default()));
        let mut raster = RasterBuffer::filled(8, 1, [0, 0, 0, 255]).unwrap();
        raster.pixels_mut()[4] = [20, 0, 0, 255];
        let raster = Arc::new(raster);
        s.start_preview(Arc::clone(&raster), (0, 0), 0, &settings);
        while s.tick() {}
        assert_eq!(s.latest_frame().unwrap().accepted_count, 4);

        let id = s.update_tolerance(30).unwrap();
        assert_eq!(s.wave().seed(), Some((0, 0)));
        while s.tick() {}
        let last = s.latest_frame().unwrap();
        assert_eq!(last.request, id);
        assert_eq!(last.accepted_count, 8);
        assert_eq!(last.tolerance, 30);
    }

    #[test]
    fn tolerance_change_restarts_one_shot_engines() {
        let mut s = PreviewScheduler::new();
        let mut raster = RasterBuffer::filled(8, 1, [0, 0, 0, 255]).unwrap();
        raster.pixels_mut()[4] = [20, 0, 0, 255];
        s.start_preview(Arc::new(raster), (0, 0), 0, &quiet(Engine::Scanline));
        let first = s.latest_frame().unwrap().request;
        let second = s.update_tolerance(30).unwrap();
        assert!(second > first);
        assert_eq!(s.latest_frame().unwrap().accepted_count, 8);
    }

    #[test]
    fn worker_results_arrive_through_tick() {
        let mut s = PreviewScheduler::new();
        s.enable_worker(1).unwrap();
        let id = s
            .start_preview(Arc::new(red_block()), (0, 0), 0, &quiet(Engine::Instant))
            .unwrap();
        assert!(s.is_active());
        let deadline = std::time::Instant::now() + Duration::from_secs(10);
        while s.tick() {
            assert!(std::time::Instant::now() < deadline, "worker never replied");
            std::thread::sleep(Duration::from_millis(1));
        }
        let last = s.latest_frame().unwrap();
        assert_eq!(last.request, id);
        assert_eq!(last.accepted_count, 4);
    }
}
