//! Asynchronous calls.
//!
//! # Ordering
//!
//! Every asynchronous call on a mutation takes a generation number when it
//! starts. When a call's chain resolves and a newer call on the same mutation
//! has started in the meantime, the older call is stale:
//!
//! - if that is noticed before the body runs, the body is skipped and nothing
//!   is written;
//! - otherwise the result is discarded.
//!
//! Either way the stale call reports [`CallOutcome::Superseded`].
//!
//! # Cancellation
//!
//! Each call carries a [`CancellationToken`]. Async hooks receive it through
//! their [`HookContext`](super::HookContext); cancelling it interrupts the
//! pending hook and ends the call with [`CallOutcome::Cancelled`].

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::CallOutcome;
use crate::error::Result;

/// Cooperative cancellation for one asynchronous call.
///
/// Clones share the same flag.
#[derive(Clone)]
pub struct CancellationToken {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut receiver = self.sender.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Latest started generation per mutation.
#[derive(Default)]
pub(crate) struct Generations {
    latest: Mutex<HashMap<String, u64>>,
}

impl Generations {
    /// Start a new call on `mutation` and return its generation.
    pub(crate) fn start(&self, mutation: &str) -> u64 {
        let mut latest = self.latest.lock();
        let generation = latest.entry(mutation.to_owned()).or_insert(0);
        *generation += 1;
        *generation
    }

    pub(crate) fn is_current(&self, mutation: &str, generation: u64) -> bool {
        self.latest.lock().get(mutation).copied() == Some(generation)
    }
}

/// A pending asynchronous mutation call.
///
/// Returned by [`Instance::call_async`](crate::Instance::call_async). The
/// call makes progress only while it is polled.
#[must_use = "an async call does nothing unless awaited"]
pub struct AsyncCall {
    token: CancellationToken,
    generation: u64,
    future: BoxFuture<'static, Result<CallOutcome>>,
}

impl AsyncCall {
    pub(crate) fn new(
        token: CancellationToken,
        generation: u64,
        future: BoxFuture<'static, Result<CallOutcome>>,
    ) -> Self {
        Self {
            token,
            generation,
            future,
        }
    }

    /// Token that cancels this call.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl Future for AsyncCall {
    type Output = Result<CallOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.future.as_mut().poll(cx)
    }
}

impl fmt::Debug for AsyncCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCall")
            .field("generation", &self.generation)
            .field("token", &self.token)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generations_track_the_latest_call() {
        let generations = Generations::default();
        let first = generations.start("search");
        let second = generations.start("search");
        assert!(!generations.is_current("search", first));
        assert!(generations.is_current("search", second));
        assert_eq!(generations.start("other"), 1);
    }

    #[test]
    fn token_clones_share_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_cancel() {
        let token = CancellationToken::new();
        let waiter = {
            let token = token.clone();
            tokio::spawn(async move { token.cancelled().await })
        };
        token.cancel();
        waiter.await.unwrap();
    }
}
