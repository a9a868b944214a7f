//! Evaluation Context
//!
//! Tracks which derivations are currently being evaluated, so that a
//! derivation reaching itself again is reported as a cycle instead of
//! recursing until the stack overflows.
//!
//! # Implementation
//!
//! Each instance owns one `EvalStack`. Frames are kept per thread: two
//! threads evaluating the same instance never see each other's frames.
//! Entering a derivation pushes its index; the returned guard pops it when
//! dropped, also when the evaluation fails or panics.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use parking_lot::Mutex;

/// The visiting set of an instance's derivation evaluations.
#[derive(Default)]
pub(crate) struct EvalStack {
    frames: Mutex<HashMap<ThreadId, Vec<usize>>>,
}

impl EvalStack {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Enter the evaluation of derivation `node`.
    ///
    /// Fails with the cycle path (first and last element equal) when `node`
    /// is already being evaluated on this thread.
    pub(crate) fn enter(&self, node: usize) -> Result<FrameGuard<'_>, Vec<usize>> {
        let thread = thread::current().id();
        let mut frames = self.frames.lock();
        let stack = frames.entry(thread).or_default();

        if let Some(position) = stack.iter().position(|&n| n == node) {
            let mut path = stack[position..].to_vec();
            path.push(node);
            return Err(path);
        }

        stack.push(node);
        Ok(FrameGuard {
            stack: self,
            thread,
            node,
        })
    }

    /// Current depth on this thread.
    pub(crate) fn depth(&self) -> usize {
        self.frames
            .lock()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }
}

/// Pops the frame when dropped.
pub(crate) struct FrameGuard<'a> {
    stack: &'a EvalStack,
    thread: ThreadId,
    node: usize,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        let mut frames = self.stack.frames.lock();
        if let Some(stack) = frames.get_mut(&self.thread) {
            let popped = stack.pop();
            debug_assert_eq!(
                popped,
                Some(self.node),
                "evaluation frames popped out of order"
            );
            if stack.is_empty() {
                frames.remove(&self.thread);
            }
        }
    }
}

// ---- Tests ----
