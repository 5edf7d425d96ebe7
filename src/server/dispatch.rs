// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The dispatch loop (§4.5): worker tasks pumping inbound calls off the
//! transport, looking up the `(path, host)` endpoint, and either enqueuing
//! the call or rejecting it as unimplemented.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Error;
use crate::interrupt::Interrupt;
use crate::server::context::ServerContext;
use crate::server::endpoint::Endpoint;
use crate::sync::Synchronizable;
use crate::transport::{Status, Transport};

/// The `(path, host) -> Endpoint` registry (§3 "Server" `endpoints_` field),
/// shared between `accept` (which inserts) and the dispatch loop (which
/// reads).
pub(crate) struct EndpointMap {
    inner: Synchronizable<HashMap<(String, String), Arc<Endpoint>>>,
}

impl EndpointMap {
    pub fn new() -> Self {
        EndpointMap {
            inner: Synchronizable::new(HashMap::new()),
        }
    }

    /// Inserts under serialized mutation; duplicates fail (§4.5 step 2, §8
    /// "for all (path, host), after accept returns, insert of the same
    /// pair fails").
    pub async fn insert(
        &self,
        path: String,
        host: String,
        endpoint: Arc<Endpoint>,
    ) -> Result<(), Error> {
        self.inner
            .synchronized(|map| {
                let key = (path.clone(), host.clone());
                let result = if map.contains_key(&key) {
                    Err(Error::DuplicateEndpoint { path, host })
                } else {
                    map.insert(key, endpoint);
                    Ok(())
                };
                async move { result }
            })
            .await
    }

    /// Exact-then-wildcard lookup (§4.5 step 3; no suffix matching, per the
    /// decided Open Question).
    pub async fn lookup(&self, method: &str, host: &str) -> Option<Arc<Endpoint>> {
        self.inner
            .synchronized(|map| {
                let exact = map.get(&(method.to_string(), host.to_string())).cloned();
                let result =
                    exact.or_else(|| map.get(&(method.to_string(), "*".to_string())).cloned());
                async move { result }
            })
            .await
    }
}

/// One completion-queue worker (§4.5 "Dispatch loop"): repeatedly requests
/// a call, looks up its endpoint, and enqueues or rejects it, until
/// `interrupt` fires.
pub(crate) async fn run_worker(
    transport: Arc<dyn Transport>,
    endpoints: Arc<EndpointMap>,
    interrupt: Interrupt,
) {
    loop {
        let incoming = tokio::select! {
            _ = interrupt.triggered() => {
                log::debug!("dispatch worker observed shutdown interrupt");
                break;
            }
            result = transport.request_call() => result,
        };

        let call = match incoming {
            Ok(call) => call,
            Err(error) => {
                log::debug!("request_call failed: {}", error);
                continue;
            }
        };

        let context = ServerContext::new(call);
        let method = context.method().to_string();
        let host = context.host().to_string();

        match endpoints.lookup(&method, &host).await {
            Some(endpoint) => {
                log::trace!("dispatching call for {} (host {})", method, host);
                endpoint.enqueue(context).await;
            }
            None => {
                log::info!("rejecting unimplemented method {} (host {})", method, host);
                let status = Status::unimplemented(format!("Method not found: {}", method));
                if let Err(error) = context.finish_then_done(status).await {
                    log::debug!("failed to finish unimplemented call: {}", error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::fake::{FakeCallChannel, FakeTransport};
    use bytes::Bytes;

    #[tokio::test]
    async fn unregistered_method_is_finished_unimplemented() {
        let transport = FakeTransport::new();
        let endpoints = Arc::new(EndpointMap::new());
        let channel = FakeCallChannel::new(Vec::<Bytes>::new());
        transport
            .push_call("pkg.Svc.Method", "*", None, channel.clone())
            .await;

        let (token, handle) = crate::interrupt::interrupt();
        let worker = tokio::spawn(run_worker(transport.clone(), endpoints, token));

        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            loop {
                if let Some(status) = channel.status() {
                    assert_eq!(status.code, crate::transport::StatusCode::Unimplemented);
                    break;
                }
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("call should be finished as unimplemented");

        handle.trigger();
        let _ = worker.await;
    }

    #[tokio::test]
    async fn registered_endpoint_receives_enqueued_call() {
        let transport = FakeTransport::new();
        let endpoints = Arc::new(EndpointMap::new());
        let endpoint = Arc::new(Endpoint::new("/pkg.Svc/Method", "*"));
        endpoints
            .insert("/pkg.Svc/Method".to_string(), "*".to_string(), endpoint.clone())
            .await
            .unwrap();

        let channel = FakeCallChannel::new(Vec::<Bytes>::new());
        transport
            .push_call("/pkg.Svc/Method", "*", None, channel)
            .await;

        let (token, handle) = crate::interrupt::interrupt();
        let worker = tokio::spawn(run_worker(transport, endpoints, token));

        let context = tokio::time::timeout(std::time::Duration::from_secs(1), endpoint.dequeue())
            .await
            .expect("endpoint should receive the dispatched call");
        assert_eq!(context.method(), "/pkg.Svc/Method");

        handle.trigger();
        let _ = worker.await;
    }
}
