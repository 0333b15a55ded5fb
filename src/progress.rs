//! Progress-callback trait for per-entry batch events.
//!
//! Inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::BatchConfigBuilder::progress_callback`] to receive events
//! as the coordinator fetches each manifest entry. The CLI forwards them to
//! an indicatif progress bar; a server could forward them to a channel.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pagebind::{BatchConfig, BatchProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     fetched: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_fetch_complete(&self, ordinal: u32, total: usize, bytes: u64) {
//!         let done = self.fetched.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("#{ordinal} ({done}/{total}) {bytes} bytes");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { fetched: AtomicUsize::new(0) });
//! let config = BatchConfig::builder()
//!     .progress_callback(cb as Arc<dyn BatchProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the batch coordinator as it processes each manifest entry.
///
/// Fetches run concurrently, so `on_fetch_start`, `on_fetch_complete` and
/// `on_fetch_error` may be called from different tasks at the same time and
/// in any ordinal order. All methods default to no-ops.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first fetch is dispatched.
    fn on_batch_start(&self, total_entries: usize) {
        let _ = total_entries;
    }

    /// Called when a fetch is dispatched.
    fn on_fetch_start(&self, ordinal: u32, total_entries: usize) {
        let _ = (ordinal, total_entries);
    }

    /// Called when a fetch stored its artifact.
    fn on_fetch_complete(&self, ordinal: u32, total_entries: usize, bytes: u64) {
        let _ = (ordinal, total_entries, bytes);
    }

    /// Called when a fetch failed.
    fn on_fetch_error(&self, ordinal: u32, total_entries: usize, error: &str) {
        let _ = (ordinal, total_entries, error);
    }

    /// Called once after every dispatched fetch reached a terminal state.
    fn on_batch_complete(&self, succeeded: usize, failed: usize) {
        let _ = (succeeded, failed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::BatchConfig`].
pub type ProgressCallback = Arc<dyn BatchProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        bytes: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_fetch_start(&self, _ordinal: u32, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_fetch_complete(&self, _ordinal: u32, _total: usize, bytes: u64) {
            self.completes.fetch_add(1, Ordering::SeqCst);
            self.bytes.fetch_add(bytes as usize, Ordering::SeqCst);
        }

        fn on_fetch_error(&self, _ordinal: u32, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(3);
        cb.on_fetch_start(1, 3);
        cb.on_fetch_complete(1, 3, 10);
        cb.on_fetch_error(2, 3, "HTTP 404");
        cb.on_batch_complete(1, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = TrackingCallback::default();
        t.on_fetch_start(1, 2);
        t.on_fetch_complete(1, 2, 100);
        t.on_fetch_start(2, 2);
        t.on_fetch_error(2, 2, "timeout");
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
        assert_eq!(t.bytes.load(Ordering::SeqCst), 100);
    }
}
