// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The stream variant (§4.1): an eventual producing multiple values via
//! `Emit(v)` before `Ended()`/`Fail`, plus the two combinators that close
//! over it: `Head` (take the first emission, stop the rest) and `Repeat`
//! (rebuild and restart a generator eventual once per emission, forever).

use std::pin::Pin;

use futures::stream::{self, Stream as FuturesStream, StreamExt};

use crate::error::Error;
use crate::eventual::{Completion, Eventual, Pipeline};

/// A boxed stream of `Req`/response values, emitting `Ok(v)` per `Emit(v)`
/// and terminating the underlying `futures::Stream` (returning `None`) on
/// `Ended()`. A `Fail` is modeled as one `Err` item followed by the stream's
/// end — downstream combinators (`Head`, the `Reader`) treat an `Err` item
/// as terminal.
pub type BoxStream<'a, T> = Pin<Box<dyn FuturesStream<Item = Result<T, Error>> + Send + 'a>>;

/// A streaming pipeline: the stream analogue of [`Pipeline`], existing
/// mainly so `reader.read() | Head` reads the way §4.1 describes it.
pub struct StreamPipeline<T> {
    inner: BoxStream<'static, T>,
}

impl<T: Send + 'static> StreamPipeline<T> {
    pub fn new<S>(stream: S) -> Self
    where
        S: FuturesStream<Item = Result<T, Error>> + Send + 'static,
    {
        StreamPipeline {
            inner: Box::pin(stream),
        }
    }

    pub fn into_inner(self) -> BoxStream<'static, T> {
        self.inner
    }
}

/// Marker type piped onto a [`StreamPipeline`] to take its first emission,
/// per §4.1's `Head`: "Takes the first emission of a stream as the final
/// value, then stops the stream."
pub struct Head;

impl<T: Send + 'static> std::ops::BitOr<Head> for StreamPipeline<T> {
    type Output = Pipeline<T>;

    fn bitor(self, _: Head) -> Pipeline<T> {
        Pipeline::new(head(self.inner))
    }
}

/// Resolves to the stream's first item, then drops the stream — dropping a
/// not-yet-exhausted `futures::Stream` is this crate's `Stop` signal, and is
/// exactly how leaf nodes (e.g. `Reader::read`) are expected to release
/// their transport resources in response (per the design notes' "`Head`
/// must issue an upstream `Stop`").
pub fn head<T, S>(mut stream: Pin<Box<S>>) -> impl Eventual<T>
where
    S: FuturesStream<Item = Result<T, Error>> + Send + ?Sized,
    T: Send + 'static,
{
    async move {
        match stream.next().await {
            Some(Ok(value)) => Ok(Completion::Start(value)),
            Some(Err(error)) => Err(error),
            None => Ok(Completion::Stop),
        }
    }
}

enum RepeatState<G> {
    Live(G),
    Done,
}

/// `Repeat(gen)` (§4.1): re-constructs and starts `gen()` each time the
/// previous iteration terminates with `Start`, emitting that value, until
/// `gen()` itself stops (ending the stream) or fails (emitting the failure,
/// then ending).
pub fn repeat<T, G, E>(gen: G) -> StreamPipeline<T>
where
    G: FnMut() -> E + Send + 'static,
    E: Eventual<T> + 'static,
    T: Send + 'static,
{
    let stream = stream::unfold(RepeatState::Live(gen), |state| async move {
        match state {
            RepeatState::Live(mut gen) => match gen().await {
                Ok(Completion::Start(value)) => Some((Ok(value), RepeatState::Live(gen))),
                Ok(Completion::Stop) => None,
                Err(error) => Some((Err(error), RepeatState::Done)),
            },
            RepeatState::Done => None,
        }
    });
    StreamPipeline::new(stream)
}
