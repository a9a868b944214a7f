//! Notification batching.
//!
//! Every mutation call enters the batch; nested calls only deepen it. State
//! written anywhere inside is collected, and subscribers hear about it once,
//! when the outermost call leaves (returning normally or with an error).
//!
//! Batches are kept per thread, like evaluation frames: a call tree in
//! progress on one thread never holds back the notice of a call that
//! finished on another.

use std::collections::HashMap;
use std::thread::{self, ThreadId};

use indexmap::IndexSet;
use parking_lot::Mutex;

use super::subscriber::{Change, SubscriberList};

#[derive(Default)]
struct Pending {
    depth: usize,
    changed: IndexSet<String>,
}

#[derive(Default)]
pub(crate) struct Batch {
    pending: Mutex<HashMap<ThreadId, Pending>>,
}

impl Batch {
    pub(crate) fn enter<'a>(&'a self, subscribers: &'a SubscriberList) -> BatchGuard<'a> {
        let thread = thread::current().id();
        self.pending.lock().entry(thread).or_default().depth += 1;
        BatchGuard {
            batch: self,
            subscribers,
            thread,
        }
    }

    /// Record a write made by the call tree running on this thread.
    pub(crate) fn mark(&self, state: &str) {
        let mut pending = self.pending.lock();
        let changed = &mut pending.entry(thread::current().id()).or_default().changed;
        if !changed.contains(state) {
            changed.insert(state.to_owned());
        }
    }
}

/// Leaves the batch when dropped. Must be dropped on the thread that
/// entered it.
pub(crate) struct BatchGuard<'a> {
    batch: &'a Batch,
    subscribers: &'a SubscriberList,
    thread: ThreadId,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let states: Vec<String> = {
            let mut pending = self.batch.pending.lock();
            let Some(entry) = pending.get_mut(&self.thread) else {
                return;
            };
            entry.depth = entry.depth.saturating_sub(1);
            if entry.depth > 0 {
                return;
            }
            match pending.remove(&self.thread) {
                Some(done) if !done.changed.is_empty() => done.changed.into_iter().collect(),
                _ => return,
            }
        };
        self.subscribers.notify(&Change { states });
    }
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;
    use std::sync::Arc;

    #[test]
    fn nested_writes_produce_one_notice() {
        let subscribers = SubscriberList::default();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = subscribers.add(move |change| sink.lock().push(change.states.clone()));

        let batch = Batch::default();
        {
            let _outer = batch.enter(&subscribers);
            batch.mark("a");
            {
                let _inner = batch.enter(&subscribers);
                batch.mark("b");
                batch.mark("a");
            }
            assert!(seen.lock().is_empty());
        }
        assert_eq!(*seen.lock(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn calls_without_writes_are_silent() {
        let subscribers = SubscriberList::default();
        let seen = Arc::new(PlMutex::new(0));
        let sink = Arc::clone(&seen);
        let _subscription = subscribers.add(move |_| *sink.lock() += 1);

        let batch = Batch::default();
        drop(batch.enter(&subscribers));
        assert_eq!(*seen.lock(), 0);
    }

    #[test]
    fn open_batch_on_another_thread_does_not_delay_notices() {
        let subscribers = SubscriberList::default();
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _subscription = subscribers.add(move |change| sink.lock().push(change.states.clone()));

        let batch = &Batch::default();
        let subscribers = &subscribers;
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                let _held = batch.enter(subscribers);
                batch.mark("slow");
                entered_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            });
            entered_rx.recv().unwrap();

            {
                let _call = batch.enter(subscribers);
                batch.mark("fast");
            }
            assert_eq!(*seen.lock(), vec![vec!["fast".to_string()]]);
            release_tx.send(()).unwrap();
        });

        assert_eq!(
            *seen.lock(),
            vec![vec!["fast".to_string()], vec!["slow".to_string()]]
        );
    }
}
