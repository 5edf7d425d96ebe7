// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `Interrupt` (§4.1, §5): a cancellation token a pipeline can `Register`
//! upstream, and that worker tasks carry a dedicated instance of for
//! `Shutdown`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

struct Inner {
    triggered: AtomicBool,
    notify: Notify,
}

/// The read side of an interrupt: leaf eventuals `Register` against this to
/// learn when cancellation has been requested.
#[derive(Clone)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

/// The write side of an interrupt, held by whoever owns the pipeline
/// (a worker task's `Shutdown` path, a client's deadline timer, ...).
#[derive(Clone)]
pub struct InterruptHandle {
    inner: Arc<Inner>,
}

/// Creates a fresh, untriggered interrupt and its handle.
pub fn interrupt() -> (Interrupt, InterruptHandle) {
    let inner = Arc::new(Inner {
        triggered: AtomicBool::new(false),
        notify: Notify::new(),
    });
    (
        Interrupt {
            inner: inner.clone(),
        },
        InterruptHandle { inner },
    )
}

impl Interrupt {
    /// True if `trigger()` has already been called.
    ///
    /// Used by the handler builder's `Prepare` stage (§4.2): "if the
    /// interrupt was already triggered, invoke it and abort" instead of
    /// registering a handler that would otherwise never fire.
    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger()` has been called, even if that happened
    /// before this call started waiting.
    pub async fn triggered(&self) {
        loop {
            if self.is_triggered() {
                return;
            }
            let notified = self.inner.notify.notified();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }
}

impl InterruptHandle {
    /// Triggers the interrupt, waking every pipeline registered against it.
    /// Idempotent: triggering twice is a no-op the second time.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn triggered_resolves_after_trigger() {
        let (token, handle) = interrupt();
        assert!(!token.is_triggered());

        let waiter = tokio::spawn(async move {
            token.triggered().await;
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.trigger();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("triggered() should resolve promptly")
            .unwrap();
    }

    #[tokio::test]
    async fn triggered_resolves_immediately_if_already_fired() {
        let (token, handle) = interrupt();
        handle.trigger();
        tokio::time::timeout(Duration::from_millis(50), token.triggered())
            .await
            .expect("already-triggered interrupt should not block");
    }
}
