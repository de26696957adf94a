use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one preview request. Later requests compare greater.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out request ids and keeps at most one of them live.
///
/// Starting a request cancels every earlier one, so a deferred continuation
/// holding an old id finds `is_valid` false and drops its work. The latest id
/// is mirrored into an atomic so a worker thread can skip stale jobs too.
#[derive(Debug, Default)]
pub struct RequestTracker {
    current: u64,
    active: HashSet<u64>,
    latest: Arc<AtomicU64>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) -> RequestId {
        self.cancel_all();
        self.current += 1;
        self.active.insert(self.current);
        self.latest.store(self.current, Ordering::Release);
        RequestId(self.current)
    }

    pub fn is_valid(&self, id: RequestId) -> bool {
        id.0 == self.current && self.active.contains(&id.0)
    }

    pub fn cancel(&mut self, id: RequestId) {
        self.active.remove(&id.0);
    }

    /// Invalidate everything, including the current request.
    pub fn cancel_all(&mut self) {
        self.active.clear();
        // Bump the shared marker past any id a worker might still hold.
        self.latest.store(self.current + 1, Ordering::Release);
    }

    pub fn complete(&mut self, id: RequestId) {
        self.active.remove(&id.0);
    }

    pub fn has_active(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn current(&self) -> Option<RequestId> {
        self.active.contains(&self.current).then_some(RequestId(self.current))
    }

    /// Shared "newest request" marker for off-thread consumers.
    pub fn latest_marker(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_request_invalidates_older() {
        let mut t = RequestTracker::new();
        let a = t.start();
        assert!(t.is_valid(a));
        let b = t.start();
        assert!(b > a);
        assert!(!t.is_valid(a));
        assert!(t.is_valid(b));
        assert_eq!(t.current(), Some(b));
    }

    #[test]
    fn complete_and_cancel_release_the_request() {
        let mut t = RequestTracker::new();
        let a = t.start();
        t.complete(a);
        assert!(!t.is_valid(a));
        assert!(!t.has_active());
        let b = t.start();
        t.cancel(b);
        assert!(!t.is_valid(b));
        assert_eq!(t.current(), None);
    }

    #[test]
    fn marker_tracks_cancellation() {
        let mut t = RequestTracker::new();
        let marker = t.latest_marker();
        let a = t.start();
        assert_eq!(marker.load(Ordering::Acquire), a.value());
        t.cancel_all();
        assert_ne!(marker.load(Ordering::Acquire), a.value());
        let b = t.start();
        assert_eq!(marker.load(Ordering::Acquire), b.value());
    }
}
