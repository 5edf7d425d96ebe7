// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The transport seam (§4.3–§4.5, §6): the boundary between the dispatch
//! core and whatever actually carries bytes on the wire. Wire framing is an
//! explicit Non-goal, so this module only defines the shape a transport must
//! present — an inbound call's `read/write/finish/done` primitives — plus an
//! in-process [`fake`] implementation the test suite drives instead of a
//! real network transport (also out of scope).

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Error;

/// A transport-level status code, returned by `Finish` and observed by the
/// client side of a call. Named after the small, fixed set §8's boundary
/// behaviors actually exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok,
    Cancelled,
    DeadlineExceeded,
    Unimplemented,
    Unavailable,
    Internal,
}

/// The terminal status a call finishes with.
#[derive(Debug, Clone)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn ok() -> Self {
        Status {
            code: StatusCode::Ok,
            message: String::new(),
        }
    }

    pub fn unimplemented(message: impl Into<String>) -> Self {
        Status {
            code: StatusCode::Unimplemented,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Status {
            code: StatusCode::Internal,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

/// A single inbound call, as delivered by `RequestCall` (§4.5 step 2).
///
/// `channel` is `Arc`-shared rather than boxed: `ServerContext` keeps its
/// own handle for `finish_then_done`/`wait_for_done`, tests keep another to
/// assert on, and `CallChannel`'s methods all take `&self`, so shared
/// ownership is the natural fit.
pub struct IncomingCall {
    pub method: String,
    pub host: String,
    pub deadline: Option<SystemTime>,
    pub channel: Arc<dyn CallChannel>,
}

/// The per-call primitives `ServerContext`/`Reader`/`Writer` submit against
/// (§4.3, §4.4). Every method here is the raw, untyped transport operation;
/// (de)serialization happens one layer up via [`crate::message::Message`].
///
/// `done` may be awaited by more than one caller (it backs `FinishThenOnDone`
/// and any number of `WaitForDone` callers), so it takes `&self` and must
/// tolerate concurrent watchers rather than being consumed by the first one.
#[async_trait]
pub trait CallChannel: Send + Sync {
    /// Reads the next request message. `Ok(None)` is `Read(ok=false)` —
    /// end of the request stream.
    async fn read(&self) -> Result<Option<Bytes>, Error>;

    /// Writes a response message and waits for the transport to confirm it.
    async fn write(&self, payload: Bytes) -> Result<(), Error>;

    /// Writes the final response message without waiting for transport
    /// confirmation (§4.4: "resolves immediately... the caller must still
    /// invoke `Finish` and will observe errors there").
    fn write_last(&self, payload: Bytes);

    /// Submits the call's terminal status.
    async fn finish(&self, status: Status) -> Result<(), Error>;

    /// Resolves once the call is done, yielding whether it was cancelled.
    /// Safe to call more than once and from more than one watcher.
    async fn done(&self) -> bool;
}

/// The server-side transport handle: hands out inbound calls and can be
/// asked to stop producing them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Submits `RequestCall` and waits for the next inbound call. Returns
    /// `Err` only for transport-fatal conditions; a shut-down transport
    /// should instead make this future pend forever so dispatch workers
    /// rely on their own interrupt token (§4.5 step 5) to stop looping.
    async fn request_call(&self) -> Result<IncomingCall, Error>;

    /// Stops accepting new calls. Idempotent.
    async fn shutdown(&self);
}

/// An in-process stand-in for a real network transport, used by this
/// crate's own tests and available to integration tests for the same
/// reason — a real socket-backed transport is explicitly out of scope
/// (§1), and §8's scenarios are written against "the in-process fake
/// transport" throughout.
pub mod fake {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex as StdMutex};
    use std::time::SystemTime;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::{CallChannel, IncomingCall, Status, Transport};
    use crate::error::Error;
    use crate::sync::Synchronizable;

    struct RequestState {
        requests: VecDeque<Bytes>,
        ended: bool,
    }

    /// One simulated call: a queue of request messages fed in by the test,
    /// and the response/status traffic the handler under test produces.
    /// `responses`/`status` use a plain blocking mutex since their critical
    /// sections never cross an `.await` point; `requests` goes through
    /// `Synchronizable` because `read()` needs to park until a message (or
    /// end-of-stream) is available.
    pub struct FakeCallChannel {
        requests: Synchronizable<RequestState>,
        responses: StdMutex<Vec<Bytes>>,
        status: StdMutex<Option<Status>>,
        done_rx: tokio::sync::watch::Receiver<Option<bool>>,
        done_set: tokio::sync::watch::Sender<Option<bool>>,
        fail_write: std::sync::atomic::AtomicBool,
        fail_finish: std::sync::atomic::AtomicBool,
    }

    impl FakeCallChannel {
        /// `requests` is the full, pre-seeded request stream; the fake
        /// treats it as already ended, matching every current test's usage
        /// (single request-response calls). Use [`Self::push_request`] for
        /// tests that need to extend the stream afterwards.
        pub fn new(requests: Vec<Bytes>) -> Arc<Self> {
            let (done_set, done_rx) = tokio::sync::watch::channel(None);
            Arc::new(FakeCallChannel {
                requests: Synchronizable::new(RequestState {
                    requests: requests.into(),
                    ended: true,
                }),
                responses: StdMutex::new(Vec::new()),
                status: StdMutex::new(None),
                done_rx,
                done_set,
                fail_write: std::sync::atomic::AtomicBool::new(false),
                fail_finish: std::sync::atomic::AtomicBool::new(false),
            })
        }

        /// Makes every subsequent `write`/`write_last` report `ok = false`
        /// as `Error::Transport("write")`, simulating a transport that has
        /// gone bad mid-call.
        pub fn fail_writes(&self) {
            self.fail_write
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }

        /// Makes the next `finish` report `ok = false` as
        /// `Error::Transport("finish")` instead of recording the status.
        pub fn fail_finish(&self) {
            self.fail_finish
                .store(true, std::sync::atomic::Ordering::SeqCst);
        }

        /// Appends another request message without closing the stream.
        pub async fn push_request(&self, payload: Bytes) {
            self.requests
                .synchronized(|s| {
                    s.requests.push_back(payload);
                    async {}
                })
                .await;
            self.requests.notify_waiters();
        }

        pub fn responses(&self) -> Vec<Bytes> {
            self.responses.lock().unwrap().clone()
        }

        pub fn status(&self) -> Option<Status> {
            self.status.lock().unwrap().clone()
        }

        /// Marks the call cancelled, as observed by `done()`.
        pub fn cancel(&self) {
            let _ = self.done_set.send(Some(true));
        }
    }

    #[async_trait]
    impl CallChannel for FakeCallChannel {
        async fn read(&self) -> Result<Option<Bytes>, Error> {
            Ok(self
                .requests
                .wait(|s| {
                    if let Some(payload) = s.requests.pop_front() {
                        Some(Some(payload))
                    } else if s.ended {
                        Some(None)
                    } else {
                        None
                    }
                })
                .await)
        }

        async fn write(&self, payload: Bytes) -> Result<(), Error> {
            if self.fail_write.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Transport("write"));
            }
            self.responses.lock().unwrap().push(payload);
            Ok(())
        }

        fn write_last(&self, payload: Bytes) {
            if self.fail_write.load(std::sync::atomic::Ordering::SeqCst) {
                return;
            }
            self.responses.lock().unwrap().push(payload);
        }

        async fn finish(&self, status: Status) -> Result<(), Error> {
            if self.fail_finish.load(std::sync::atomic::Ordering::SeqCst) {
                return Err(Error::Transport("finish"));
            }
            *self.status.lock().unwrap() = Some(status);
            // Only stamp "not cancelled" if nothing has claimed the done
            // signal yet — an explicit `cancel()` must win.
            if self.done_rx.borrow().is_none() {
                let _ = self.done_set.send(Some(false));
            }
            Ok(())
        }

        async fn done(&self) -> bool {
            let mut rx = self.done_rx.clone();
            loop {
                if let Some(cancelled) = *rx.borrow() {
                    return cancelled;
                }
                if rx.changed().await.is_err() {
                    return false;
                }
            }
        }
    }

    /// A queue of pre-seeded [`IncomingCall`]s, drained one per
    /// `request_call`. Never produces an error; callers unable to get a
    /// call simply wait until the queue is shut down, then the producer
    /// side is expected to rely on its own interrupt token.
    pub struct FakeTransport {
        queue: Synchronizable<VecDeque<IncomingCall>>,
        shut_down: std::sync::atomic::AtomicBool,
    }

    impl FakeTransport {
        pub fn new() -> Arc<Self> {
            Arc::new(FakeTransport {
                queue: Synchronizable::new(VecDeque::new()),
                shut_down: std::sync::atomic::AtomicBool::new(false),
            })
        }

        pub async fn push_call(
            &self,
            method: impl Into<String>,
            host: impl Into<String>,
            deadline: Option<SystemTime>,
            channel: Arc<dyn CallChannel>,
        ) {
            let call = IncomingCall {
                method: method.into(),
                host: host.into(),
                deadline,
                channel,
            };
            self.queue
                .synchronized(|q| {
                    q.push_back(call);
                    async {}
                })
                .await;
            self.queue.notify_waiters();
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn request_call(&self) -> Result<IncomingCall, Error> {
            Ok(self
                .queue
                .wait(|q| {
                    if self.shut_down.load(std::sync::atomic::Ordering::SeqCst) {
                        return None;
                    }
                    q.pop_front()
                })
                .await)
        }

        async fn shutdown(&self) {
            self.shut_down
                .store(true, std::sync::atomic::Ordering::SeqCst);
            self.queue.notify_waiters();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeCallChannel;
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn read_drains_seeded_requests_then_ends() {
        let channel = FakeCallChannel::new(vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
        assert_eq!(channel.read().await.unwrap(), Some(Bytes::from_static(b"one")));
        assert_eq!(channel.read().await.unwrap(), Some(Bytes::from_static(b"two")));
        assert_eq!(channel.read().await.unwrap(), None);
    }

    #[tokio::test]
    async fn write_then_finish_records_response_and_status() {
        let channel = FakeCallChannel::new(Vec::new());
        channel.write(Bytes::from_static(b"resp")).await.unwrap();
        channel.finish(Status::ok()).await.unwrap();
        assert_eq!(channel.responses(), vec![Bytes::from_static(b"resp")]);
        assert!(channel.status().unwrap().is_ok());
    }

    #[tokio::test]
    async fn cancel_is_observed_by_done() {
        let channel = FakeCallChannel::new(Vec::new());
        channel.cancel();
        assert!(channel.done().await);
    }

    #[tokio::test]
    async fn write_reports_transport_error_once_forced_to_fail() {
        let channel = FakeCallChannel::new(Vec::new());
        channel.fail_writes();
        let err = channel.write(Bytes::from_static(b"resp")).await.unwrap_err();
        assert!(matches!(err, Error::Transport("write")));
        assert!(channel.responses().is_empty());
    }

    #[tokio::test]
    async fn finish_reports_transport_error_once_forced_to_fail() {
        let channel = FakeCallChannel::new(Vec::new());
        channel.fail_finish();
        let err = channel.finish(Status::ok()).await.unwrap_err();
        assert!(matches!(err, Error::Transport("finish")));
        assert!(channel.status().is_none());
    }

    #[tokio::test]
    async fn shut_down_transport_never_yields_another_call() {
        let transport = super::fake::FakeTransport::new();
        transport.shutdown().await;
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            transport.request_call(),
        )
        .await;
        assert!(result.is_err(), "shut-down transport should pend forever");
    }
}
