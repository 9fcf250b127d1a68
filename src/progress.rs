//! Progress-callback trait for per-student generation events.
//!
//! Inject an [`Arc<dyn JobProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline processes each student.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database row,
//! or a terminal progress bar — without the library knowing anything about
//! how the host application communicates. The trait is `Send + Sync` so it
//! works correctly while asset fetches run concurrently.

use std::sync::Arc;

/// Called by the generation pipeline as it processes each student.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Layout and archive insertion run in roster order,
/// but `on_entity_start` may interleave with the concurrent fetch phase —
/// protect shared mutable state accordingly.
pub trait JobProgressCallback: Send + Sync {
    /// Called once before any student is processed.
    fn on_job_start(&self, total_entities: usize) {
        let _ = total_entities;
    }

    /// Called just before a student's document is laid out.
    fn on_entity_start(&self, index: usize, total: usize, entity_id: &str) {
        let _ = (index, total, entity_id);
    }

    /// Called when a student's document was generated and inserted.
    fn on_entity_complete(&self, index: usize, total: usize, entity_id: &str, bytes: usize) {
        let _ = (index, total, entity_id, bytes);
    }

    /// Called when a student failed or was skipped by cancellation.
    fn on_entity_error(&self, index: usize, total: usize, entity_id: &str, error: &str) {
        let _ = (index, total, entity_id, error);
    }

    /// Called once after every student has been attempted.
    fn on_job_complete(&self, total_entities: usize, generated: usize) {
        let _ = (total_entities, generated);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl JobProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        final_generated: AtomicUsize,
    }

    impl JobProgressCallback for TrackingCallback {
        fn on_entity_start(&self, _index: usize, _total: usize, _id: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn on_entity_complete(&self, _index: usize, _total: usize, _id: &str, _bytes: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
        fn on_entity_error(&self, _index: usize, _total: usize, _id: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
        fn on_job_complete(&self, _total: usize, generated: usize) {
            self.final_generated.store(generated, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_job_start(5);
        cb.on_entity_start(0, 5, "14");
        cb.on_entity_complete(0, 5, "14", 1024);
        cb.on_entity_error(1, 5, "19", "some error");
        cb.on_job_complete(5, 4);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: AtomicUsize::new(0),
            completes: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_generated: AtomicUsize::new(0),
        };

        tracker.on_job_start(3);
        tracker.on_entity_start(0, 3, "1");
        tracker.on_entity_complete(0, 3, "1", 100);
        tracker.on_entity_start(1, 3, "2");
        tracker.on_entity_error(1, 3, "2", "render failed");
        tracker.on_entity_start(2, 3, "3");
        tracker.on_entity_complete(2, 3, "3", 200);
        tracker.on_job_complete(3, 2);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.final_generated.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn JobProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_job_start(10);
        cb.on_entity_complete(0, 10, "roll-1", 512);
    }
}
