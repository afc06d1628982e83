//! Per-call cancellation for blocking database work.
//!
//! `Database::run` installs a flag for the blocking thread it runs on. The
//! connection's progress handler polls the flag through a thread-local, so a
//! statement is only ever interrupted by the call that issued it.

use std::cell::RefCell;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

thread_local! {
    static CURRENT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether the call running on this thread has been cancelled.
/// Also installed as the SQLite progress handler: `true` aborts the statement.
pub(crate) fn requested() -> bool {
    CURRENT.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    })
}

/// Run `f` with `flag` as this thread's cancellation flag.
pub(crate) fn scoped<T>(flag: Arc<AtomicBool>, f: impl FnOnce() -> T) -> T {
    struct Reset;

    impl Drop for Reset {
        fn drop(&mut self) {
            CURRENT.with(|current| current.borrow_mut().take());
        }
    }

    CURRENT.with(|current| *current.borrow_mut() = Some(flag));
    let _reset = Reset;
    f()
}

/// Raises the flag when the awaiting side goes away.
pub(crate) struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    pub(crate) fn new(flag: Arc<AtomicBool>) -> Self {
        Self(flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}
