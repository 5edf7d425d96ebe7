// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The server dispatch engine (§4.2–§4.5): method validation, endpoint
//! registration, per-endpoint dispatch queues, and the per-call lifecycle
//! that wraps the transport's racy primitives into ordered eventuals.

pub mod builder;
pub mod call;
pub mod context;
pub mod dispatch;
pub mod endpoint;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use tokio::task::JoinHandle;

pub use builder::{ServerBuilder, ServerStatus, ServerStatusOrServer};
pub use call::{Reader, ServerCall, Writer};
pub use context::ServerContext;
pub use endpoint::Endpoint;

use crate::error::Error;
use crate::eventual::stream::{repeat, StreamPipeline};
use crate::eventual::Completion;
use crate::interrupt::{interrupt, InterruptHandle};
use crate::message::{method_path, validate, Arity, DescriptorPool, Message};
use crate::server::dispatch::{run_worker, EndpointMap};
use crate::transport::Transport;

/// Owns the transport handle, the `(path, host) -> Endpoint` registry, and
/// the dispatch workers draining it (§3 "Server").
pub struct Server {
    transport: Arc<dyn Transport>,
    descriptors: Arc<dyn DescriptorPool>,
    endpoints: Arc<EndpointMap>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
    worker_interrupts: Vec<InterruptHandle>,
    shutdown_started: AtomicBool,
}

impl Server {
    pub(crate) fn start(
        transport: Arc<dyn Transport>,
        descriptors: Arc<dyn DescriptorPool>,
        completion_queues: usize,
        min_threads_per_cq: usize,
    ) -> Arc<Server> {
        let endpoints = Arc::new(EndpointMap::new());
        let worker_count = completion_queues.max(1) * min_threads_per_cq.max(1);

        let mut workers = Vec::with_capacity(worker_count);
        let mut worker_interrupts = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let (token, handle) = interrupt();
            let worker_transport = transport.clone();
            let worker_endpoints = endpoints.clone();
            workers.push(tokio::spawn(run_worker(
                worker_transport,
                worker_endpoints,
                token,
            )));
            worker_interrupts.push(handle);
        }

        log::info!("server started with {} dispatch worker(s)", worker_count);

        Arc::new(Server {
            transport,
            descriptors,
            endpoints,
            workers: StdMutex::new(workers),
            worker_interrupts,
            shutdown_started: AtomicBool::new(false),
        })
    }

    /// `accept<Req,Resp>(name, host, client_streaming, server_streaming)`
    /// (§4.5, §6): validates `name` against the descriptor pool — including
    /// that its registered streaming arities match the ones the caller is
    /// accepting with — registers a fresh endpoint, and returns an infinite
    /// stream of typed calls (one per dispatched request) the caller
    /// composes further, typically with `| Head` for a single call or left
    /// as a `Repeat` loop for a long-running service.
    pub async fn accept<Req, Resp>(
        &self,
        name: &str,
        host: &str,
        client_streaming: Arity,
        server_streaming: Arity,
    ) -> Result<StreamPipeline<ServerCall<Req, Resp>>, Error>
    where
        Req: Message,
        Resp: Message,
    {
        validate::<Req, Resp>(
            self.descriptors.as_ref(),
            name,
            client_streaming,
            server_streaming,
        )?;

        let path = method_path(name);
        let endpoint = Arc::new(Endpoint::new(path.clone(), host.to_string()));
        self.endpoints
            .insert(path.clone(), host.to_string(), endpoint.clone())
            .await?;

        log::debug!("accepting calls for {} (host {})", path, host);

        Ok(repeat(move || {
            let endpoint = endpoint.clone();
            async move {
                let context = endpoint.dequeue().await;
                Ok(Completion::Start(ServerCall::new(Arc::new(context))))
            }
        }))
    }

    /// `shutdown()` (§4.5, §6): signals every worker's interrupt and tells
    /// the transport to stop producing new calls. Idempotent.
    pub async fn shutdown(&self) {
        if self.shutdown_started.swap(true, Ordering::SeqCst) {
            return;
        }
        log::info!("server shutting down");
        for handle in &self.worker_interrupts {
            handle.trigger();
        }
        self.transport.shutdown().await;
    }

    /// `wait()` (§6): blocks until every dispatch worker has observed
    /// shutdown and returned.
    pub async fn wait(&self) {
        let handles = {
            let mut guard = self.workers.lock().unwrap();
            std::mem::take(&mut *guard)
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

impl Drop for Server {
    /// Best-effort shutdown (§4.5: "the destructor ensures shutdown if not
    /// already performed"). `Drop` can't `.await`, so this only triggers
    /// the interrupts; a caller that wants the queues drained and threads
    /// joined before the process exits must call `shutdown()`/`wait()`
    /// explicitly.
    fn drop(&mut self) {
        if !self.shutdown_started.swap(true, Ordering::SeqCst) {
            for handle in &self.worker_interrupts {
                handle.trigger();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventual::stream::Head;
    use crate::message::{MethodDescriptor, StaticDescriptorPool};
    use crate::transport::fake::{FakeCallChannel, FakeTransport};
    use bytes::Bytes;

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

    fn pool_with(name: &str) -> Arc<dyn DescriptorPool> {
        let mut pool = StaticDescriptorPool::new();
        pool.register(MethodDescriptor::unary(name, "test.Req", "test.Resp"));
        Arc::new(pool)
    }

    #[tokio::test]
    async fn accept_on_unknown_method_fails_validation() {
        let transport = FakeTransport::new();
        let server = Server::start(transport, Arc::new(StaticDescriptorPool::new()), 1, 1);
        let err = server
            .accept::<Req, Resp>("pkg.Svc.Method", "*", Arity::Unary, Arity::Unary)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotFound(_)));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn duplicate_accept_on_same_path_and_host_fails() {
        let transport = FakeTransport::new();
        let server = Server::start(transport, pool_with("pkg.Svc.Method"), 1, 1);
        server
            .accept::<Req, Resp>("pkg.Svc.Method", "*", Arity::Unary, Arity::Unary)
            .await
            .unwrap();
        let err = server
            .accept::<Req, Resp>("pkg.Svc.Method", "*", Arity::Unary, Arity::Unary)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateEndpoint { .. }));
        server.shutdown().await;
    }

    #[tokio::test]
    async fn accept_head_resolves_a_single_dispatched_call() {
        let transport = FakeTransport::new();
        let server = Server::start(transport.clone(), pool_with("pkg.Svc.Method"), 1, 1);

        let stream = server
            .accept::<Req, Resp>("pkg.Svc.Method", "*", Arity::Unary, Arity::Unary)
            .await
            .unwrap();

        let channel = FakeCallChannel::new(vec![Bytes::from_static(b"hi")]);
        transport
            .push_call("/pkg.Svc/Method", "*", None, channel)
            .await;

        let pipeline = stream | Head;
        let out = pipeline.into_inner().await.unwrap();
        match out {
            Completion::Start(call) => {
                assert_eq!(call.context().method(), "/pkg.Svc/Method");
            }
            Completion::Stop => panic!("expected a dispatched call"),
        }

        server.shutdown().await;
    }
}
