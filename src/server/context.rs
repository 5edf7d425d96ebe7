// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `ServerContext` (§3, §4.3): owns one transport call handle and
//! normalizes the transport's unordered `finish`/`done` callbacks into a
//! single `finish_then_done` sequencer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::error::Error;
use crate::transport::{CallChannel, IncomingCall, Status};

/// One inbound call, between the moment `RequestCall` completes and the
/// moment both `finish` and `done` have fired (§3 lifecycle).
pub struct ServerContext {
    channel: Arc<dyn CallChannel>,
    method: String,
    host: String,
    deadline: Option<SystemTime>,
    finished: AtomicBool,
}

impl ServerContext {
    pub(crate) fn new(call: IncomingCall) -> Self {
        ServerContext {
            channel: call.channel,
            method: call.method,
            host: call.host,
            deadline: call.deadline,
            finished: AtomicBool::new(false),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    pub(crate) fn channel(&self) -> Arc<dyn CallChannel> {
        self.channel.clone()
    }

    /// `FinishThenOnDone` (§4.3): submits `status`, and only once that
    /// transport operation has completed does it watch `done`. Since this
    /// is ordinary `async`/`await`, "install a callback that watches done
    /// once finish fires" collapses to sequencing two awaits — the ordering
    /// guarantee falls out of `.await` rather than an explicit sequencer
    /// object.
    ///
    /// At most once per call; a second invocation is a programming error
    /// (§4.3 precondition, §7 "programmer misuse").
    pub async fn finish_then_done(&self, status: Status) -> Result<bool, Error> {
        if self.finished.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyFinished);
        }
        self.channel.finish(status).await?;
        Ok(self.channel.done().await)
    }

    /// `WaitForDone` (§6): observes cancellation without finishing the
    /// call. May be called any number of times, including concurrently
    /// with `finish_then_done`, since `CallChannel::done` tolerates
    /// multiple watchers.
    pub async fn wait_for_done(&self) -> bool {
        self.channel.done().await
    }
}
