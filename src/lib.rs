// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! A composable continuation-passing eventuals pipeline (§4.1) and the
//! server-side dispatch engine (§4.2–§4.5) built on top of it, for
//! serving typed RPCs over a generic, untyped byte-buffer transport.
//!
//! The entry points most consumers need:
//!
//! - [`eventual`]: the `Eventual`/`Pipeline`/`Continuation` composition
//!   model and the `|` pipe operator.
//! - [`server`]: `ServerBuilder`, `Server::accept`, `ServerCall`.
//! - [`message`]: the `Message` trait and `DescriptorPool` a service
//!   registers its methods against.
//! - [`transport`]: the seam a concrete transport implements; an
//!   in-process [`transport::fake`] is provided for tests.
//!
//! ```no_run
//! use eventuals_rpc::eventual::stream::Head;
//! use eventuals_rpc::server::ServerBuilder;
//!
//! # async fn example(transport: std::sync::Arc<dyn eventuals_rpc::transport::Transport>) -> Result<(), eventuals_rpc::error::Error> {
//! let running = ServerBuilder::new()
//!     .add_listening_port("0.0.0.0:50051")
//!     .build_and_start(transport);
//! assert!(running.status.is_ok());
//! # Ok(())
//! # }
//! ```

pub mod context;
pub mod error;
pub mod eventual;
pub mod handler;
pub mod interrupt;
pub mod message;
pub mod server;
pub mod sync;
pub mod transport;

pub use context::CallContext;
pub use error::Error;
pub use eventual::{Completion, Continuation, Eventual, Pipeline};
pub use handler::{Handler, HandlerBuilder};
pub use message::Message;
pub use server::{Server, ServerBuilder, ServerCall};
