//! Background thread for one-shot fills.
//!
//! Jobs carry their own copy of the raster; nothing is shared with the UI
//! thread except the channels and the tracker's "latest request" marker.
//! The worker drops jobs that were superseded before it picked them up, and
//! the receiving side re-checks the request id before using any reply.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use super::cancel::{RequestId, RequestTracker};
use crate::error::{WandError, WandResult};
use crate::fill::{fill_with_engine, rescan};
use crate::raster::{FillResult, RasterBuffer};
use crate::settings::{EngineSettings, PROXY_MAX_DIM, PROXY_THRESHOLD};
use crate::{log_info, log_warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyStage {
    /// Quick upscaled low-resolution result; a `Full` reply follows.
    Proxy,
    Full,
}

pub struct WorkerReply {
    pub request: RequestId,
    pub stage: ReplyStage,
    pub seed: (i32, i32),
    pub tolerance: u8,
    pub result: FillResult,
}

struct Job {
    request: RequestId,
    raster: RasterBuffer,
    seed: (i32, i32),
    settings: EngineSettings,
}

pub struct SegmentationWorker {
    jobs: Option<Sender<Job>>,
    replies: Receiver<WorkerReply>,
    latest: Arc<AtomicU64>,
    handle: Option<JoinHandle<()>>,
}

impl SegmentationWorker {
    /// Spawn the worker thread, sharing the tracker's cancellation marker.
    pub fn spawn(tracker: &RequestTracker) -> WandResult<Self> {
        let (job_tx, job_rx) = mpsc::channel::<Job>();
        let (reply_tx, reply_rx) = mpsc::channel::<WorkerReply>();
        let latest = tracker.latest_marker();
        let marker = Arc::clone(&latest);
        let handle = std::thread::Builder::new()
            .name("wandfe-segmentation".into())
            .spawn(move || run_jobs(job_rx, reply_tx, marker))?;
        log_info!("Segmentation worker started");
        Ok(Self {
            jobs: Some(job_tx),
            replies: reply_rx,
            latest,
            handle: Some(handle),
        })
    }

    /// Queue a fill. The raster is copied here so the caller keeps ownership.
    pub fn submit(
        &self,
        request: RequestId,
        raster: &RasterBuffer,
        seed: (i32, i32),
        settings: &EngineSettings,
    ) -> WandResult<()> {
        let jobs = self.jobs.as_ref().ok_or(WandError::WorkerDisconnected)?;
        jobs.send(Job {
            request,
            raster: raster.clone(),
            seed,
            settings: settings.clone(),
        })
        .map_err(|_| WandError::WorkerDisconnected)
    }

    /// Drain every reply that has arrived; never blocks.
    pub fn poll(&self) -> WandResult<Vec<WorkerReply>> {
        let mut out = Vec::new();
        loop {
            match self.replies.try_recv() {
                Ok(reply) => out.push(reply),
                Err(TryRecvError::Empty) => return Ok(out),
                Err(TryRecvError::Disconnected) if !out.is_empty() => return Ok(out),
                Err(TryRecvError::Disconnected) => return Err(WandError::WorkerDisconnected),
            }
        }
    }

    /// Block for the next reply. Mostly for tests and the CLI.
    pub fn recv(&self) -> WandResult<WorkerReply> {
        self.replies.recv().map_err(|_| WandError::WorkerDisconnected)
    }

    pub fn is_stale(&self, request: RequestId) -> bool {
        self.latest.load(Ordering::Acquire) != request.value()
    }
}

impl Drop for SegmentationWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the thread's receive loop.
        self.jobs = None;
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log_warn!("Segmentation worker panicked");
        }
    }
}

fn run_jobs(jobs: Receiver<Job>, replies: Sender<WorkerReply>, latest: Arc<AtomicU64>) {
    let is_live = |id: RequestId| latest.load(Ordering::Acquire) == id.value();
    for job in jobs {
        if !is_live(job.request) {
            log_info!("Worker skipped stale request {}", job.request);
            continue;
        }
        let (sx, sy) = job.seed;
        let s = &job.settings;
        if job.raster.pixel_count() > PROXY_THRESHOLD && s.contiguous {
            let result = rescan::proxy_fill(&job.raster, sx, sy, s.tolerance, s.connectivity, PROXY_MAX_DIM);
            let reply = WorkerReply {
                request: job.request,
                stage: ReplyStage::Proxy,
                seed: job.seed,
                tolerance: s.tolerance,
                result,
            };
            if replies.send(reply).is_err() {
                return;
            }
            if !is_live(job.request) {
                continue;
            }
        }
        let result = fill_with_engine(&job.raster, sx, sy, s);
        let reply = WorkerReply {
            request: job.request,
            stage: ReplyStage::Full,
            seed: job.seed,
            tolerance: s.tolerance,
            result,
        };
        if replies.send(reply).is_err() {
            return;
        }
    }
    log_info!("Segmentation worker stopped");
}
