// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! `ServerBuilder` (§4.9, §6): the fluent configuration surface,
//! `completion_queues`/`min_threads_per_cq`/listening ports, terminating in
//! `build_and_start`.

use std::sync::Arc;

use crate::message::{DescriptorPool, StaticDescriptorPool};
use crate::server::Server;
use crate::transport::Transport;

/// One bind point requested via `add_listening_port`. Binding the address
/// is a transport concern (out of scope, §1); this just records what the
/// caller asked for, the way `build_and_start`'s scenario 2 expects a
/// non-null server handle without actually opening a socket.
#[derive(Clone, Debug)]
pub struct ListeningPort {
    pub address: String,
}

/// Builder defaults: one named-constant map plus a `Default` impl.
const DEFAULT_COMPLETION_QUEUES: usize = 1;
const DEFAULT_MIN_THREADS_PER_CQ: usize = 1;

pub struct ServerBuilder {
    completion_queues: usize,
    min_threads_per_cq: usize,
    listening_ports: Vec<ListeningPort>,
    descriptors: Option<Arc<dyn DescriptorPool>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        ServerBuilder {
            completion_queues: DEFAULT_COMPLETION_QUEUES,
            min_threads_per_cq: DEFAULT_MIN_THREADS_PER_CQ,
            listening_ports: Vec::new(),
            descriptors: None,
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_completion_queues(mut self, n: usize) -> Self {
        self.completion_queues = n.max(1);
        self
    }

    pub fn set_min_threads_per_cq(mut self, n: usize) -> Self {
        self.min_threads_per_cq = n.max(1);
        self
    }

    pub fn add_listening_port(mut self, address: impl Into<String>) -> Self {
        self.listening_ports.push(ListeningPort {
            address: address.into(),
        });
        self
    }

    /// Installs the descriptor pool `accept` validates against. Defaults
    /// to an empty [`StaticDescriptorPool`] if never called — every
    /// `accept` then fails `MethodNotFound` until the caller registers
    /// something, which is the honest default rather than silently
    /// skipping validation.
    pub fn descriptor_pool(mut self, pool: Arc<dyn DescriptorPool>) -> Self {
        self.descriptors = Some(pool);
        self
    }

    /// `build_and_start()` (§4.9, §6): starts the dispatch workers against
    /// `transport` and returns immediately.
    pub fn build_and_start(self, transport: Arc<dyn Transport>) -> ServerStatusOrServer {
        for port in &self.listening_ports {
            log::info!("listening on {}", port.address);
        }
        let descriptors = self
            .descriptors
            .unwrap_or_else(|| Arc::new(StaticDescriptorPool::new()));
        let server = Server::start(
            transport,
            descriptors,
            self.completion_queues,
            self.min_threads_per_cq,
        );
        ServerStatusOrServer {
            status: ServerStatus::Ok,
            server: Some(server),
        }
    }
}

/// `Ok` or `Error(msg)` (§3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ServerStatus {
    Ok,
    Error(String),
}

impl ServerStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ServerStatus::Ok)
    }
}

/// What `build_and_start` returns (§6).
pub struct ServerStatusOrServer {
    pub status: ServerStatus,
    pub server: Option<Arc<Server>>,
}
