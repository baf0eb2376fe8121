//! Progress reporting hook for long-running window loops.

/// Receives progress of a windowed operation.
///
/// Library code only counts work; binaries decide how to display it.
pub trait Progress: Sync {
    /// Called once before processing `total` units of work.
    fn start(&self, _total: u64, _message: &str) {}

    /// Called after `n` more units have been processed.
    fn advance(&self, _n: u64) {}

    /// Called when the operation is done.
    fn finish(&self) {}
}

/// No progress output.
impl Progress for () {}

#[cfg(test)]
pub(crate) mod testing {
    use super::Progress;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Counts calls for assertions.
    #[derive(Default)]
    pub struct CountingProgress {
        pub total: AtomicU64,
        pub done: AtomicU64,
        pub finished: AtomicU64,
    }

    impl Progress for CountingProgress {
        fn start(&self, total: u64, _message: &str) {
            self.total.store(total, Ordering::SeqCst);
        }

        fn advance(&self, n: u64) {
            self.done.fetch_add(n, Ordering::SeqCst);
        }

        fn finish(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }
}
