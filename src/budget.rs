//! The shared print budget.

use std::sync::atomic::{AtomicI64, Ordering};

/// Number of entries still allowed to print, shared by reference across
/// every adapter in one run.
///
/// Reservation decrements first and then checks for a negative result, so
/// concurrent callers can never overshoot the limit.
#[derive(Debug)]
pub struct FileBudget {
    limit: Option<usize>,
    remaining: Option<AtomicI64>,
}

impl FileBudget {
    /// `None` means unlimited.
    pub fn new(max_files: Option<usize>) -> Self {
        Self {
            limit: max_files,
            remaining: max_files.map(|n| AtomicI64::new(i64::try_from(n).unwrap_or(i64::MAX))),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Reserve one unit. Returns false once the budget is spent.
    pub fn try_consume(&self) -> bool {
        let Some(remaining) = &self.remaining else {
            return true;
        };
        if remaining.fetch_sub(1, Ordering::AcqRel) <= 0 {
            remaining.fetch_add(1, Ordering::AcqRel);
            return false;
        }
        true
    }

    /// True once nothing more may print.
    pub fn spent(&self) -> bool {
        match &self.remaining {
            Some(r) => r.load(Ordering::Acquire) <= 0,
            None => false,
        }
    }

    pub fn available(&self) -> bool {
        !self.spent()
    }

    /// Units left, `None` when unlimited.
    pub fn remaining(&self) -> Option<usize> {
        self.remaining
            .as_ref()
            .map(|r| usize::try_from(r.load(Ordering::Acquire).max(0)).unwrap_or(0))
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }
}

impl Default for FileBudget {
    fn default() -> Self {
        Self::unlimited()
    }
}
