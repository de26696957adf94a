//! Hover preview: request ids, the seed flash, the optional background worker
//! and the scheduler that ties them to the host's frame loop.

pub mod cancel;
pub mod flash;
pub mod scheduler;
pub mod worker;

pub use cancel::{RequestId, RequestTracker};
pub use flash::{dirty_rect, seed_flash, DIRTY_PADDING};
pub use scheduler::{FrameStage, PreviewFrame, PreviewListener, PreviewScheduler, PreviewUpdate};
pub use worker::{ReplyStage, SegmentationWorker, WorkerReply};
