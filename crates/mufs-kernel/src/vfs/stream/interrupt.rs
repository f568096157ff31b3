//! Per-thread interruption.
//!
//! Blocking stream calls watch the interrupt handle of the thread that issued
//! them. Another thread cancels an in-flight transfer by calling
//! [`InterruptHandle::interrupt`] on a handle obtained from the worker:
//!
//! ```no_run
//! use mufs_kernel::vfs::stream::interrupt::InterruptHandle;
//! use std::sync::mpsc;
//!
//! let (tx, rx) = mpsc::channel();
//! let worker = std::thread::spawn(move || {
//!     tx.send(InterruptHandle::current()).unwrap();
//!     // ... long copy through mufs streams, fails with VfsError::Interrupted
//! });
//! rx.recv().unwrap().interrupt();
//! worker.join().unwrap();
//! ```

use std::cell::RefCell;

use tokio_util::sync::CancellationToken;

thread_local! {
    static CURRENT: RefCell<Option<CancellationToken>> = const { RefCell::new(None) };
}

/// Handle for interrupting one thread's blocking stream calls.
#[derive(Clone, Debug)]
pub struct InterruptHandle {
    token: CancellationToken,
}

impl InterruptHandle {
    /// Handle of the calling thread.
    pub fn current() -> Self {
        let token = CURRENT.with(|cell| cell.borrow_mut().get_or_insert_with(CancellationToken::new).clone());
        Self { token }
    }

    /// Interrupt the thread. Sticky until that thread calls [`clear`].
    pub fn interrupt(&self) {
        self.token.cancel();
    }

    pub fn is_interrupted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// True if the calling thread has been interrupted.
pub fn is_interrupted() -> bool {
    CURRENT.with(|cell| cell.borrow().as_ref().is_some_and(CancellationToken::is_cancelled))
}

/// Reset the calling thread's interrupt status, returning the previous one.
///
/// Handles obtained before the reset no longer affect this thread.
pub fn clear() -> bool {
    CURRENT.with(|cell| {
        let mut slot = cell.borrow_mut();
        let was = slot.as_ref().is_some_and(CancellationToken::is_cancelled);
        if was {
            *slot = None;
        }
        was
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_is_per_thread() {
        let handle = InterruptHandle::current();
        assert!(!is_interrupted());

        let other = std::thread::spawn(|| {
            InterruptHandle::current().interrupt();
            is_interrupted()
        });
        assert!(other.join().unwrap());
        assert!(!is_interrupted());

        handle.interrupt();
        assert!(is_interrupted());
        assert!(clear());
        assert!(!is_interrupted());
        assert!(!clear());
    }

    #[test]
    fn test_interrupt_from_another_thread() {
        let handle = std::thread::spawn(InterruptHandle::current).join().unwrap();
        assert!(!handle.is_interrupted());
        handle.interrupt();
        assert!(handle.is_interrupted());
        assert!(!is_interrupted());
    }
}
