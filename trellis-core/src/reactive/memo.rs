//! Memo Cells
//!
//! A memo cell caches the last output of one derivation together with the
//! versions of every input that evaluation read.
//!
//! # How Memos Work
//!
//! 1. On first read, the derivation runs and its output is cached along
//!    with the input version vector.
//!
//! 2. On later reads, each recorded input is brought up to date and its
//!    current version compared with the recorded one.
//!
//! 3. If all versions match, the cached value is returned without running
//!    the derivation.
//!
//! 4. Otherwise the derivation runs again. The cell's own version only moves
//!    when the new output differs from the cached one, so derivations
//!    downstream stay cached when an upstream recomputation yields an equal
//!    value.
//!
//! # Thread Safety
//!
//! The cell is only locked to copy the cache out or store a new one. The
//! derivation itself always runs unlocked.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::graph::NodeId;
use crate::value::Value;

/// Input versions observed by one evaluation.
pub(crate) type InputVersions = SmallVec<[(NodeId, u64); 4]>;

#[derive(Debug, Clone)]
pub(crate) struct Cached {
    pub(crate) value: Value,
    pub(crate) inputs: InputVersions,
    pub(crate) version: u64,
}

pub(crate) struct MemoCell {
    cached: Mutex<Option<Cached>>,
    cycle_checked: AtomicBool,
    evaluations: AtomicU64,
}

impl MemoCell {
    pub(crate) fn new() -> Self {
        Self {
            cached: Mutex::new(None),
            cycle_checked: AtomicBool::new(false),
            evaluations: AtomicU64::new(0),
        }
    }

    pub(crate) fn snapshot(&self) -> Option<Cached> {
        self.cached.lock().clone()
    }

    /// Store a fresh evaluation and return the cell's version.
    pub(crate) fn store(&self, value: Value, inputs: InputVersions) -> u64 {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let mut cached = self.cached.lock();
        let version = match cached.as_ref() {
            Some(previous) if previous.value == value => previous.version,
            Some(previous) => previous.version + 1,
            None => 1,
        };
        *cached = Some(Cached {
            value,
            inputs,
            version,
        });
        version
    }

    pub(crate) fn cycle_checked(&self) -> bool {
        self.cycle_checked.load(Ordering::Acquire)
    }

    pub(crate) fn mark_cycle_checked(&self) {
        self.cycle_checked.store(true, Ordering::Release);
    }

    /// How many times the derivation has run.
    pub(crate) fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl Default for MemoCell {
    fn default() -> Self {
        Self::new()
    }
}

// ---- Tests ----
