// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `Synchronizable` / `Wait` (§4.6): an async mutex fused with a condition
//! wait, so endpoint enqueue/dequeue can serialize without blocking a
//! worker thread.
//!
//! Grounded the same way the wider Rust RPC ecosystem builds this primitive
//! (e.g. `starpc`'s `CommonRpc`, which pairs a `tokio::sync::Mutex`-guarded
//! queue with a `tokio::sync::Notify` for wakeups): the lock only ever
//! guards a synchronous critical section; waiting for a predicate to become
//! true releases the lock and parks on a `Notify`, re-checking the predicate
//! under the lock on every wakeup since spurious wakeups are tolerated.

use tokio::sync::{Mutex, Notify};

/// Owns one piece of shared state `S`, reachable only while holding the
/// internal async mutex, plus a `Notify` used to wake whoever is parked in
/// [`Synchronizable::wait`].
pub struct Synchronizable<S> {
    state: Mutex<S>,
    notify: Notify,
}

impl<S> Synchronizable<S> {
    pub fn new(state: S) -> Self {
        Synchronizable {
            state: Mutex::new(state),
            notify: Notify::new(),
        }
    }

    /// Acquires the lock, runs `f` against the guarded state, and releases
    /// the lock when `f`'s future resolves — on any path, mirroring
    /// `Synchronized(e)`'s "release upon e's terminal signal" guarantee,
    /// since the `MutexGuard` is simply dropped at the end of the async
    /// block regardless of how it completes.
    pub async fn synchronized<T, F, Fut>(&self, f: F) -> T
    where
        F: FnOnce(&mut S) -> Fut,
        Fut: std::future::Future<Output = T>,
    {
        let mut guard = self.state.lock().await;
        f(&mut guard).await
    }

    /// Runs `predicate` under the lock repeatedly until it returns `Some`,
    /// releasing the lock and parking on `notify` in between attempts.
    ///
    /// The predicate is only ever evaluated while the lock is held; between
    /// attempts the lock is released so producers (`notify_one`/
    /// `notify_waiters`, typically from `synchronized`) can make progress.
    pub async fn wait<T, P>(&self, mut predicate: P) -> T
    where
        P: FnMut(&mut S) -> Option<T>,
    {
        loop {
            let mut guard = self.state.lock().await;
            if let Some(value) = predicate(&mut guard) {
                return value;
            }
            // Register interest in being woken before dropping the lock, so
            // a notification fired right after we unlock isn't missed.
            let notified = self.notify.notified();
            drop(guard);
            notified.await;
        }
    }

    /// Wakes exactly one waiter parked in [`Synchronizable::wait`].
    pub fn notify_one(&self) {
        self.notify.notify_one();
    }

    /// Wakes every waiter parked in [`Synchronizable::wait`].
    pub fn notify_waiters(&self) {
        self.notify.notify_waiters();
    }
}
