// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Typed `Reader`/`Writer` (§4.4) and the `ServerCall<Req,Resp>` facade
//! (§3, §6) that ties them to a [`ServerContext`].

use std::marker::PhantomData;
use std::sync::Arc;

use futures::stream;

use crate::context::CallContext;
use crate::error::Error;
use crate::eventual::stream::StreamPipeline;
use crate::eventual::{Completion, Eventual};
use crate::message::Message;
use crate::server::context::ServerContext;
use crate::transport::{CallChannel, Status};

enum ReadState {
    Live(Arc<dyn CallChannel>),
    Done,
}

/// A lazy stream of `Req`, one transport `Read` per item (§4.4).
pub struct Reader<Req> {
    channel: Arc<dyn CallChannel>,
    _marker: PhantomData<fn() -> Req>,
}

impl<Req: Message> Reader<Req> {
    /// At most one `Read` should be in flight per stream at a time — a
    /// transport rule the core documents rather than enforces (§4.4).
    pub fn read(&self) -> StreamPipeline<Req> {
        let channel = self.channel.clone();
        let stream = stream::unfold(ReadState::Live(channel), |state| async move {
            match state {
                ReadState::Live(channel) => match channel.read().await {
                    Ok(Some(bytes)) => match Req::decode(bytes) {
                        Ok(value) => Some((Ok(value), ReadState::Live(channel))),
                        Err(error) => Some((Err(error), ReadState::Done)),
                    },
                    Ok(None) => None,
                    Err(error) => Some((Err(error), ReadState::Done)),
                },
                ReadState::Done => None,
            }
        });
        StreamPipeline::new(stream)
    }
}

/// Submits `Write`/`WriteLast` for a typed response (§4.4).
pub struct Writer<Resp> {
    channel: Arc<dyn CallChannel>,
    _marker: PhantomData<fn() -> Resp>,
}

impl<Resp: Message> Writer<Resp> {
    /// `Write(resp, options)`: serializes, submits, and resolves once the
    /// transport confirms the write.
    pub fn write(&self, response: Resp) -> impl Eventual<()> {
        let channel = self.channel.clone();
        async move {
            let payload = response.encode()?;
            channel.write(payload).await?;
            Ok(Completion::Start(()))
        }
    }

    /// `WriteLast(resp, options)`: submits without waiting for transport
    /// confirmation — the underlying transport defers that completion
    /// until `Finish`, so errors here only surface through `Finish` (§4.4).
    pub fn write_last(&self, response: Resp) -> impl Eventual<()> {
        let channel = self.channel.clone();
        async move {
            let payload = response.encode()?;
            channel.write_last(payload);
            Ok(Completion::Start(()))
        }
    }
}

/// A typed facade over one [`ServerContext`] (§3, §6).
pub struct ServerCall<Req, Resp> {
    context: Arc<ServerContext>,
    call_context: CallContext,
    _marker: PhantomData<fn() -> (Req, Resp)>,
}

impl<Req: Message, Resp: Message> ServerCall<Req, Resp> {
    pub(crate) fn new(context: Arc<ServerContext>) -> Self {
        let mut call_context = CallContext::new(context.method(), context.host());
        if let Some(deadline) = context.deadline() {
            call_context = call_context.with_deadline(deadline);
        }
        ServerCall {
            context,
            call_context,
            _marker: PhantomData,
        }
    }

    /// Access to method/host/deadline (§6).
    pub fn context(&self) -> &CallContext {
        &self.call_context
    }

    pub fn reader(&self) -> Reader<Req> {
        Reader {
            channel: self.context.channel(),
            _marker: PhantomData,
        }
    }

    pub fn writer(&self) -> Writer<Resp> {
        Writer {
            channel: self.context.channel(),
            _marker: PhantomData,
        }
    }

    /// `Finish(status)` (§6): submits the call's terminal status, returning
    /// whether it was cancelled.
    pub async fn finish(&self, status: Status) -> Result<bool, Error> {
        self.context.finish_then_done(status).await
    }

    /// `WaitForDone()` (§6): `cancelled: bool`.
    pub async fn wait_for_done(&self) -> bool {
        self.context.wait_for_done().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::FakeCallChannel;
    use crate::transport::IncomingCall;
    use bytes::Bytes;
    use futures::StreamExt;

    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Req(String);
    #[derive(Debug, PartialEq, Eq, Clone)]
    struct Resp(String);

    impl Message for Req {
        fn message_name() -> &'static str {
            "test.Req"
        }
        fn encode(&self) -> Result<Bytes, Error> {
            Ok(Bytes::from(self.0.clone()))
        }
        fn decode(buf: Bytes) -> Result<Self, Error> {
            Ok(Req(String::from_utf8_lossy(&buf).into_owned()))
        }
    }

    impl Message for Resp {
        fn message_name() -> &'static str {
            "test.Resp"
        }
        fn encode(&self) -> Result<Bytes, Error> {
            Ok(Bytes::from(self.0.clone()))
        }
        fn decode(buf: Bytes) -> Result<Self, Error> {
            Ok(Resp(String::from_utf8_lossy(&buf).into_owned()))
        }
    }

    fn call(channel: Arc<FakeCallChannel>) -> ServerCall<Req, Resp> {
        let context = ServerContext::new(IncomingCall {
            method: "pkg.Svc.Method".to_string(),
            host: "*".to_string(),
            deadline: None,
            channel,
        });
        ServerCall::new(Arc::new(context))
    }

    #[tokio::test]
    async fn reader_decodes_each_request_then_ends() {
        let channel = FakeCallChannel::new(vec![Bytes::from_static(b"a"), Bytes::from_static(b"b")]);
        let server_call = call(channel);
        let items: Vec<_> = server_call.reader().read().into_inner().collect().await;
        let values: Vec<Req> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, vec![Req("a".to_string()), Req("b".to_string())]);
    }

    #[tokio::test]
    async fn writer_write_records_response() {
        let channel = FakeCallChannel::new(Vec::new());
        let server_call = call(channel.clone());
        let pipeline = crate::eventual::Pipeline::new(server_call.writer().write(Resp("hi".to_string())));
        pipeline.into_inner().await.unwrap();
        assert_eq!(channel.responses(), vec![Bytes::from_static(b"hi")]);
    }

    #[tokio::test]
    async fn finish_then_wait_for_done_agree() {
        let channel = FakeCallChannel::new(Vec::new());
        let server_call = call(channel);
        let cancelled = server_call.finish(Status::ok()).await.unwrap();
        assert!(!cancelled);
    }
}
