// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `Terminate` (§4.1): converts an eventual tail into a `(future, starter)`
//! pair. Calling `starter.start()` drives the pipeline; the returned future
//! resolves to the pipeline's value, error, or `Stop`.
//!
//! A bare `Pipeline<T>` is already lazy (nothing runs until it's polled), so
//! in principle `.await`ing it directly would suffice. `Terminate` exists
//! because a deadline scenario needs to start a pipeline on the executor
//! and hand back a handle to its eventual result independently of the task
//! that started it — exactly the split `tokio::spawn` plus a `oneshot`
//! channel gives you, the same idiom a `TokioServerExecutor`/
//! `TokioChannelExecutor` future uses to drive spawned work to completion.

use tokio::sync::oneshot;

use crate::error::Error;
use crate::eventual::{Completion, EventualOutput, Pipeline};

/// The future half of [`terminate`]: resolves once the pipeline it was
/// split from has run to completion (`Start`, `Stop`, or `Fail`).
pub struct Terminated<T> {
    receiver: oneshot::Receiver<EventualOutput<T>>,
}

impl<T> Terminated<T> {
    /// Waits for the pipeline to finish and unwraps its outcome into a
    /// plain `Result`, treating `Stop` as cancellation (`Ok(None)`).
    pub async fn wait(self) -> Result<Option<T>, Error> {
        match self.receiver.await {
            Ok(Ok(Completion::Start(value))) => Ok(Some(value)),
            Ok(Ok(Completion::Stop)) => Ok(None),
            Ok(Err(error)) => Err(error),
            // The starter was dropped without ever calling `start()`.
            Err(_) => Ok(None),
        }
    }
}

/// The starter half of [`terminate`]: owns the pipeline until `start()`
/// spawns it onto the executor.
pub struct Starter<T> {
    sender: oneshot::Sender<EventualOutput<T>>,
    pipeline: Pipeline<T>,
}

impl<T: Send + 'static> Starter<T> {
    /// Spawns the pipeline on the executor. Consumes `self`, matching the
    /// single-shot contract every eventual node carries.
    pub fn start(self) {
        let sender = self.sender;
        let pipeline = self.pipeline.into_inner();
        tokio::spawn(async move {
            let result = pipeline.await;
            // The receiving `Terminated` may already have been dropped
            // (e.g. the caller only wanted fire-and-forget semantics); that
            // is not a programming error.
            let _ = sender.send(result);
        });
    }
}

/// Splits `pipeline` into a `(Terminated, Starter)` pair.
pub fn terminate<T: Send + 'static>(pipeline: Pipeline<T>) -> (Terminated<T>, Starter<T>) {
    let (sender, receiver) = oneshot::channel();
    (Terminated { receiver }, Starter { sender, pipeline })
}
