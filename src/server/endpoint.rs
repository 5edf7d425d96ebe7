// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `Endpoint` (§3, §4.5): the per-`(path, host)` rendezvous queue between
//! the dispatch loop and the user's `accept` consumer.

use std::collections::VecDeque;

use crate::server::context::ServerContext;
use crate::sync::Synchronizable;

/// A FIFO of pending inbound calls for one `(path, host)` pair.
///
/// Backed by [`Synchronizable`] so `dequeue` parks the consumer task
/// instead of blocking a worker thread (§4.6): the dispatch loop's
/// `enqueue` wakes whichever consumer is parked in `dequeue`.
pub struct Endpoint {
    path: String,
    host: String,
    queue: Synchronizable<VecDeque<ServerContext>>,
}

impl Endpoint {
    pub fn new(path: impl Into<String>, host: impl Into<String>) -> Self {
        Endpoint {
            path: path.into(),
            host: host.into(),
            queue: Synchronizable::new(VecDeque::new()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Pushes a newly-dispatched call and wakes a parked consumer, if any.
    pub async fn enqueue(&self, context: ServerContext) {
        self.queue
            .synchronized(|queue| {
                queue.push_back(context);
                async {}
            })
            .await;
        self.queue.notify_one();
    }

    /// Pops the next call in FIFO order, parking until one is available.
    pub async fn dequeue(&self) -> ServerContext {
        self.queue.wait(|queue| queue.pop_front()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeCallChannel;
    use crate::transport::IncomingCall;
    use bytes::Bytes;
    use std::time::Duration;

    fn context(method: &str) -> ServerContext {
        let channel = FakeCallChannel::new(Vec::<Bytes>::new());
        ServerContext::new(IncomingCall {
            method: method.to_string(),
            host: "*".to_string(),
            deadline: None,
            channel,
        })
    }

    #[tokio::test]
    async fn dequeue_returns_enqueued_call_in_order() {
        let endpoint = Endpoint::new("/pkg.Svc/Method", "*");
        endpoint.enqueue(context("first")).await;
        endpoint.enqueue(context("second")).await;

        let first = endpoint.dequeue().await;
        let second = endpoint.dequeue().await;
        assert_eq!(first.method(), "first");
        assert_eq!(second.method(), "second");
    }

    #[tokio::test]
    async fn dequeue_parks_until_enqueue() {
        let endpoint = std::sync::Arc::new(Endpoint::new("/pkg.Svc/Method", "*"));
        let waiter = tokio::spawn({
            let endpoint = endpoint.clone();
            async move { endpoint.dequeue().await }
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        endpoint.enqueue(context("late")).await;

        let context = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("dequeue should resolve promptly")
            .unwrap();
        assert_eq!(context.method(), "late");
    }
}
