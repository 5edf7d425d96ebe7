// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The eventuals composition model (§4.1): a lazy, single-shot, push-based
//! continuation pipeline.
//!
//! An `Eventual<T>` is just a `Future<Output = EventualOutput<T>>` — there is
//! no separate "continuation" object to drive it; Rust's executor already
//! provides the push (a completion wakes the task, which polls the future,
//! which runs user code up to its next suspension point). "Installing a
//! continuation `k`" becomes, here, composing futures with ordinary
//! combinators; "terminal signals" are encoded in [`Completion`] plus the
//! `Result`'s `Err` arm. `Stop` falls out of
//! Rust's usual cancel-by-drop model: dropping an in-flight eventual (e.g.
//! because an upstream `Head` only wanted the first emission) is the
//! `Stop` signal, and is exactly how `tarpc`'s `Abortable`-wrapped request
//! futures are cancelled.
//!
//! This keeps composition entirely at compile time via generics — the same
//! choice `tarpc` makes for `BaseChannel<Req, Resp, T>` and `Requests<C>`
//! rather than type-erasing `Req`/`Resp` — while still boxing at the
//! explicit composition boundary (`Pipeline`) the design notes call out as
//! the idiomatic alternative.

pub mod stream;
pub mod terminate;

use std::future::Future;
use std::ops::BitOr;
use std::pin::Pin;

use crate::error::Error;

/// The three terminal signals a non-streaming eventual can deliver,
/// collapsed into the success arm of a `Result` (the error arm carries
/// `Fail`).
#[derive(Debug)]
pub enum Completion<T> {
    /// `Start(value)`: the eventual produced a value.
    Start(T),
    /// `Stop()`: the eventual was cancelled before producing a value.
    Stop,
}

impl<T> Completion<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Completion<U> {
        match self {
            Completion::Start(value) => Completion::Start(f(value)),
            Completion::Stop => Completion::Stop,
        }
    }

    pub fn value(self) -> Option<T> {
        match self {
            Completion::Start(value) => Some(value),
            Completion::Stop => None,
        }
    }
}

/// What an `Eventual<T>` resolves to: `Ok(Completion::Start(v))` for
/// `Start`, `Ok(Completion::Stop)` for `Stop`, `Err(e)` for `Fail`.
pub type EventualOutput<T> = Result<Completion<T>, Error>;

/// A lazy, single-shot, push-based computation node producing `T`.
///
/// Blanket-implemented for any future with the right output type, so
/// `async move { ... }` blocks are themselves valid eventuals — this is the
/// idiom every combinator in this module (and every leaf in `server::call`)
/// builds on.
pub trait Eventual<T>: Future<Output = EventualOutput<T>> + Send {}

impl<T, F> Eventual<T> for F where F: Future<Output = EventualOutput<T>> + Send {}

/// A boxed, type-erased-at-the-boundary eventual, used only at composition
/// points (`Pipeline`) — never inside a single combinator's implementation.
pub type BoxEventual<'a, T> = Pin<Box<dyn Future<Output = EventualOutput<T>> + Send + 'a>>;

/// A continuation attachable to a `Pipeline<T>` via `|`.
///
/// `Lambda`, `Then`, and the handler builder's produced `Handler` all
/// implement this; composing `upstream | continuation` hands the
/// continuation a boxed upstream eventual and gets back the next stage of
/// the pipeline.
pub trait Continuation<T> {
    type Output: Send + 'static;

    fn compose(self, upstream: BoxEventual<'static, T>) -> BoxEventual<'static, Self::Output>;
}

/// A single-shot, boxed eventual, and the home of the `|` composition
/// operator (§4.1: "Composition `A | B` transfers ownership of `A` into a
/// new node whose downstream is `B`").
pub struct Pipeline<T> {
    inner: BoxEventual<'static, T>,
}

impl<T: Send + 'static> Pipeline<T> {
    pub fn new<E>(eventual: E) -> Self
    where
        E: Eventual<T> + 'static,
    {
        Pipeline {
            inner: Box::pin(eventual),
        }
    }

    pub fn into_inner(self) -> BoxEventual<'static, T> {
        self.inner
    }
}

impl<T: Send + 'static, C> BitOr<C> for Pipeline<T>
where
    C: Continuation<T>,
{
    type Output = Pipeline<C::Output>;

    fn bitor(self, continuation: C) -> Self::Output {
        Pipeline {
            inner: continuation.compose(self.inner),
        }
    }
}

/// An immediately-available eventual, for leaves that don't actually need to
/// suspend (e.g. a synchronous validation check).
pub fn just<T: Send + 'static>(completion: EventualOutput<T>) -> impl Eventual<T> {
    async move { completion }
}

pub fn start<T: Send + 'static>(value: T) -> impl Eventual<T> {
    just(Ok(Completion::Start(value)))
}

pub fn fail<T: Send + 'static>(error: Error) -> impl Eventual<T> {
    just(Err(error))
}

pub fn stop<T: Send + 'static>() -> impl Eventual<T> {
    just(Ok(Completion::Stop))
}

/// `Lambda(f)` (§4.1): a synchronous transform, `Start(v) ->
/// downstream.Start(f(v))`. `Stop`/`Fail` pass through untouched.
pub struct Lambda<F>(pub F);

impl<T, U, F> Continuation<T> for Lambda<F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> U + Send + 'static,
{
    type Output = U;

    fn compose(self, upstream: BoxEventual<'static, T>) -> BoxEventual<'static, U> {
        let f = self.0;
        Box::pin(async move {
            match upstream.await? {
                Completion::Start(value) => Ok(Completion::Start(f(value))),
                Completion::Stop => Ok(Completion::Stop),
            }
        })
    }
}

/// `Then(f)` (§4.1): applies `f` to the upstream value, where `f` itself
/// returns a new eventual — allowing asynchronous transformation chains.
pub struct Then<F>(pub F);

impl<T, U, F, E2> Continuation<T> for Then<F>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnOnce(T) -> E2 + Send + 'static,
    E2: Eventual<U> + 'static,
{
    type Output = U;

    fn compose(self, upstream: BoxEventual<'static, T>) -> BoxEventual<'static, U> {
        let f = self.0;
        Box::pin(async move {
            match upstream.await? {
                Completion::Start(value) => f(value).await,
                Completion::Stop => Ok(Completion::Stop),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lambda_transforms_start() {
        let pipeline = Pipeline::new(start(2)) | Lambda(|v: i32| v * 21);
        let out = pipeline.into_inner().await.unwrap();
        assert!(matches!(out, Completion::Start(42)));
    }

    #[tokio::test]
    async fn lambda_passes_stop_through() {
        let pipeline = Pipeline::new(stop::<i32>()) | Lambda(|v: i32| v * 21);
        let out = pipeline.into_inner().await.unwrap();
        assert!(matches!(out, Completion::Stop));
    }

    #[tokio::test]
    async fn then_chains_async_transforms() {
        let pipeline = Pipeline::new(start(2)) | Then(|v: i32| start(v * 21));
        let out = pipeline.into_inner().await.unwrap();
        assert!(matches!(out, Completion::Start(42)));
    }

    #[tokio::test]
    async fn fail_short_circuits_before_continuation_runs() {
        let pipeline = Pipeline::new(fail::<i32>(Error::other("boom"))) | Lambda(|v: i32| v * 21);
        let err = pipeline.into_inner().await.unwrap_err();
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn exactly_one_terminal_signal_per_completion() {
        // Completion<T> is a two-variant enum and EventualOutput adds the
        // error arm; by construction there is no way to observe more than
        // one of {Start, Fail, Stop} for a single resolved eventual.
        fn assert_exclusive<T>(output: EventualOutput<T>) {
            match output {
                Ok(Completion::Start(_)) | Ok(Completion::Stop) | Err(_) => {}
            }
        }
        assert_exclusive(Ok::<Completion<()>, Error>(Completion::Start(())));
    }
}
