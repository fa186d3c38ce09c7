//! Compute-once shared values.

use super::error::PkgError;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

type Init<T> = Box<dyn FnOnce() -> Result<Arc<T>, PkgError> + Send>;

/// A value computed on first access and shared by every clone.
///
/// Failures are cached too: every later `get` returns the same error
/// without re-running the computation.
pub struct Memo<T> {
    cell: Arc<Lazy<Result<Arc<T>, PkgError>, Init<T>>>,
}

impl<T: Send + Sync + 'static> Memo<T> {
    /// Wrap a computation. Nothing runs until the first `get`.
    pub fn new(f: impl FnOnce() -> Result<T, PkgError> + Send + 'static) -> Self {
        let init: Init<T> = Box::new(move || f().map(Arc::new));
        Self {
            cell: Arc::new(Lazy::new(init)),
        }
    }

    /// A memo that is already resolved.
    pub fn ready(value: T) -> Self {
        Self::new(move || Ok(value))
    }

    /// Force the computation and return its shared result.
    ///
    /// # Errors
    /// Returns the error produced by the computation.
    pub fn get(&self) -> Result<Arc<T>, PkgError> {
        match Lazy::force(&*self.cell) {
            Ok(value) => Ok(Arc::clone(value)),
            Err(e) => Err(e.clone()),
        }
    }

    /// True when both handles share the same underlying cell.
    #[must_use]
    pub fn shares_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<T> Clone for Memo<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memo").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::error::codes;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_runs_once_across_threads() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let memo = Memo::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(42u32)
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                thread::spawn(move || *memo.get().unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 42);
        }
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_errors_are_cached() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&runs);
        let memo: Memo<u32> = Memo::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(PkgError::cache_error("boom"))
        });

        assert_eq!(memo.get().unwrap_err().code(), codes::PKG_CACHE_ERROR);
        assert_eq!(memo.get().unwrap_err().message(), "boom");
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_value() {
        let memo = Memo::ready(String::from("x"));
        let other = memo.clone();
        assert!(memo.shares_cell(&other));
        assert!(Arc::ptr_eq(&memo.get().unwrap(), &other.get().unwrap()));
        assert!(!memo.shares_cell(&Memo::ready(String::from("x"))));
    }
}
