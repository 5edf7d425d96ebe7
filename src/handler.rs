// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The handler builder (§4.2): a fluent, move-only builder parameterized by
//! callbacks for `prepare/ready/body/finished/stop/interrupt`, with an
//! optional shared `context`.
//!
//! Each setter consumes `self` and returns a new builder, enforcing "each
//! callback slot may be set at most once" via a runtime check rather than a
//! compile-time one, since Rust builders conventionally reuse one concrete
//! type across calls rather than growing a new type parameter per slot.
//! `context` is shared via `Clone` (typically an `Arc`) rather than by
//! mutable reference threading.

use crate::error::Error;
use crate::eventual::{BoxEventual, Completion, Continuation};
use crate::interrupt::Interrupt;

type Stage<C> = Box<dyn FnOnce(Option<&C>) + Send>;
type FinishedStage<C, T> = Box<dyn FnOnce(Option<&C>, T) -> T + Send>;
type StopStage<C> = Box<dyn FnOnce(Option<&C>) + Send>;
type InterruptStage<C> = Box<dyn FnOnce(Option<&C>) + Send>;

/// A completed, immutable handler record (§3 "Handler spec"). Produced by
/// [`HandlerBuilder::build`]; implements [`Continuation`] so it can be piped
/// onto a [`crate::eventual::Pipeline`] with `|`.
pub struct Handler<C, T> {
    context: Option<C>,
    prepare: Option<Stage<C>>,
    ready: Option<Stage<C>>,
    body: Option<Stage<C>>,
    finished: Option<FinishedStage<C, T>>,
    stop: Option<StopStage<C>>,
    interrupt: Option<InterruptStage<C>>,
    interrupt_token: Option<Interrupt>,
}

/// The builder. Every setter is single-assignment; calling one twice returns
/// `Err(Error::DuplicateHandlerSlot(...))` instead of panicking, a runtime
/// check rather than a compile-time one since this builder doesn't grow a
/// fresh type per call.
pub struct HandlerBuilder<C, T> {
    context: Option<C>,
    prepare: Option<Stage<C>>,
    ready: Option<Stage<C>>,
    body: Option<Stage<C>>,
    finished: Option<FinishedStage<C, T>>,
    stop: Option<StopStage<C>>,
    interrupt: Option<InterruptStage<C>>,
    interrupt_token: Option<Interrupt>,
}

impl<C, T> Default for HandlerBuilder<C, T> {
    fn default() -> Self {
        HandlerBuilder {
            context: None,
            prepare: None,
            ready: None,
            body: None,
            finished: None,
            stop: None,
            interrupt: None,
            interrupt_token: None,
        }
    }
}

impl<C, T> HandlerBuilder<C, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn context(mut self, context: C) -> Result<Self, Error> {
        if self.context.is_some() {
            return Err(Error::DuplicateHandlerSlot("context"));
        }
        self.context = Some(context);
        Ok(self)
    }

    pub fn prepare<F>(mut self, prepare: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>) + Send + 'static,
    {
        if self.prepare.is_some() {
            return Err(Error::DuplicateHandlerSlot("prepare"));
        }
        self.prepare = Some(Box::new(prepare));
        Ok(self)
    }

    pub fn ready<F>(mut self, ready: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>) + Send + 'static,
    {
        if self.ready.is_some() {
            return Err(Error::DuplicateHandlerSlot("ready"));
        }
        self.ready = Some(Box::new(ready));
        Ok(self)
    }

    pub fn body<F>(mut self, body: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>) + Send + 'static,
    {
        if self.body.is_some() {
            return Err(Error::DuplicateHandlerSlot("body"));
        }
        self.body = Some(Box::new(body));
        Ok(self)
    }

    pub fn finished<F>(mut self, finished: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>, T) -> T + Send + 'static,
    {
        if self.finished.is_some() {
            return Err(Error::DuplicateHandlerSlot("finished"));
        }
        self.finished = Some(Box::new(finished));
        Ok(self)
    }

    pub fn stop<F>(mut self, stop: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>) + Send + 'static,
    {
        if self.stop.is_some() {
            return Err(Error::DuplicateHandlerSlot("stop"));
        }
        self.stop = Some(Box::new(stop));
        Ok(self)
    }

    /// Installs both the interrupt callback and the token it watches.
    /// Requires a token rather than discovering one lazily, since "attempt
    /// to install an interrupt handler" (§4.2) needs something concrete to
    /// register against.
    pub fn interrupt<F>(mut self, token: Interrupt, interrupt: F) -> Result<Self, Error>
    where
        F: FnOnce(Option<&C>) + Send + 'static,
    {
        if self.interrupt.is_some() {
            return Err(Error::DuplicateHandlerSlot("interrupt"));
        }
        self.interrupt = Some(Box::new(interrupt));
        self.interrupt_token = Some(token);
        Ok(self)
    }

    pub fn build(self) -> Handler<C, T> {
        Handler {
            context: self.context,
            prepare: self.prepare,
            ready: self.ready,
            body: self.body,
            finished: self.finished,
            stop: self.stop,
            interrupt: self.interrupt,
            interrupt_token: self.interrupt_token,
        }
    }
}

impl<C, T> Handler<C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    /// Runs the `Prepare` stage (§4.2): if an interrupt callback was
    /// installed and its token is already triggered, invoke the callback
    /// and report the call as stopped rather than running `prepare` at all.
    /// Otherwise run `prepare` (if defined) and return `false`.
    async fn run_prepare(&mut self) -> bool {
        if let Some(token) = &self.interrupt_token {
            if token.is_triggered() {
                if let Some(interrupt) = self.interrupt.take() {
                    interrupt(self.context.as_ref());
                }
                return true;
            }
        }
        if let Some(prepare) = self.prepare.take() {
            prepare(self.context.as_ref());
        }
        false
    }

    fn run_ready(&mut self) {
        if let Some(ready) = self.ready.take() {
            ready(self.context.as_ref());
        }
    }

    fn run_body(&mut self) {
        if let Some(body) = self.body.take() {
            body(self.context.as_ref());
        }
    }

    fn run_finished(mut self, value: T) -> T {
        match self.finished.take() {
            Some(finished) => finished(self.context.as_ref(), value),
            // "otherwise default to succeed(k, args)" — pass the value
            // through unchanged.
            None => value,
        }
    }

    /// Runs the `Stop` stage (§4.2): `stop` must be defined, a fail-fast
    /// precondition.
    fn run_stop(mut self) {
        let stop = self
            .stop
            .take()
            .expect("Undefined 'stop' (and no default)");
        stop(self.context.as_ref());
    }
}

impl<C, T> Continuation<T> for Handler<C, T>
where
    C: Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn compose(mut self, upstream: BoxEventual<'static, T>) -> BoxEventual<'static, T> {
        Box::pin(async move {
            let interrupted = self.run_prepare().await;
            if interrupted {
                self.run_stop();
                return Ok(Completion::Stop);
            }
            self.run_ready();
            self.run_body();

            match upstream.await? {
                Completion::Start(value) => Ok(Completion::Start(self.run_finished(value))),
                Completion::Stop => {
                    self.run_stop();
                    Ok(Completion::Stop)
                }
            }
        })
    }
}
