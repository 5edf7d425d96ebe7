// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The crate's single error type.
//!
//! Every failure surface named by the dispatch core — schema validation,
//! duplicate endpoints, (de)serialization, transport-reported failures, and
//! programmer misuse — is represented here instead of as an ad hoc string, so
//! callers can match on `Error` rather than scrape messages.

use std::fmt;

/// Errors produced by the eventuals pipeline and the server dispatch core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// `Validate` found no method registered under the given name.
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    /// `Validate` found a method, but the request/response types (or
    /// streaming arity) don't match what's registered.
    #[error("method {method} expected {expected}, got {actual}")]
    TypeMismatch {
        method: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// `Insert` found an existing endpoint at the same `(path, host)`.
    #[error("Already serving {path} for host {host}")]
    DuplicateEndpoint { path: String, host: String },

    /// `Message::encode` failed.
    #[error("failed to serialize: {0}")]
    Serialize(String),

    /// `Message::decode` failed, or the transport delivered a malformed
    /// buffer.
    #[error("request failed to deserialize: {0}")]
    Deserialize(String),

    /// The transport reported `ok = false` for a `Write` or `Finish` op.
    #[error("failed to {0}")]
    Transport(&'static str),

    /// `FinishThenOnDone` (or the lower-level `Finish`) was called more than
    /// once on the same call. Fail-fast programmer error.
    #[error("attempted to call FinishThenOnDone more than once")]
    AlreadyFinished,

    /// A handler builder slot (`prepare`, `ready`, `body`, `finished`,
    /// `stop`, `interrupt`, `context`) was assigned twice.
    #[error("duplicate '{0}' handler slot")]
    DuplicateHandlerSlot(&'static str),

    /// Escape hatch for failures that don't fit another variant but still
    /// need a human-readable message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn other(message: impl fmt::Display) -> Self {
        Error::Other(message.to_string())
    }
}
