//! Unit-counted progress reporting and cooperative cancellation.
//!
//! Every long-running operation ([`Archive::add_entry`],
//! [`Archive::extract`], [`Archive::remove`]) takes an optional
//! [`Progress`]. The operation sets the total before it starts moving
//! bytes and bumps the completed count once per chunk, so a caller
//! polling from another thread sees a monotonically filling gauge.
//! Setting the cancel flag makes the operation abort with
//! [`ZipError::Cancelled`] before its next chunk.
//!
//! [`Archive::add_entry`]: ../write/struct.EntryOptions.html
//! [`Archive::extract`]: ../read/struct.Archive.html#method.extract
//! [`Archive::remove`]: ../read/struct.Archive.html#method.remove
//! [`ZipError::Cancelled`]: ../result/enum.ZipError.html#variant.Cancelled

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

/// A shared (total, completed) counter pair plus a cancel flag.
///
/// Progress trees are optional: [`Progress::add_child`] hangs another
/// progress off this one, and the parent's completed count then
/// includes each child's contribution weighted by the units it was
/// registered with.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicI64,
    completed: AtomicI64,
    cancelled: AtomicBool,
    children: Mutex<Vec<(Arc<Progress>, i64)>>,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// A progress expecting `total` units of work.
    pub fn with_total(total: i64) -> Self {
        let progress = Self::new();
        progress.set_total(total);
        progress
    }

    pub fn set_total(&self, total: i64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn total_unit_count(&self) -> i64 {
        self.total.load(Ordering::Relaxed)
    }

    /// Units completed so far, children's weighted shares included.
    pub fn completed_unit_count(&self) -> i64 {
        let own = self.completed.load(Ordering::Relaxed);
        let children = self.children.lock().expect("progress lock poisoned");
        own + children
            .iter()
            .map(|(child, weight)| (child.fraction_completed() * *weight as f64) as i64)
            .sum::<i64>()
    }

    /// Completion as a fraction in [0, 1]; 0 while no total is set.
    pub fn fraction_completed(&self) -> f64 {
        let total = self.total_unit_count();
        if total <= 0 {
            return 0.0;
        }
        (self.completed_unit_count() as f64 / total as f64).clamp(0.0, 1.0)
    }

    pub fn add_completed(&self, units: i64) {
        self.completed.fetch_add(units, Ordering::Relaxed);
    }

    /// Marks all units done, e.g. after a zero-byte directory entry.
    pub fn complete(&self) {
        self.completed
            .store(self.total.load(Ordering::Relaxed), Ordering::Relaxed);
    }

    /// Registers `child` as `units` of this progress's total.
    pub fn add_child(&self, child: Arc<Progress>, units: i64) {
        self.children
            .lock()
            .expect("progress lock poisoned")
            .push((child, units));
    }

    /// Requests cooperative cancellation.
    /// The running operation aborts before its next chunk.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}
