// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! Per-call context: method path, host, and deadline.
//!
//! Deadlines are a transport-level concept (§5): the core doesn't enforce
//! them directly, it just carries the value the transport attaches to an
//! inbound call so that a `DEADLINE_EXCEEDED` completion (delivered by the
//! transport like any other completion) can be correlated back to it.

use std::time::SystemTime;

use humantime::format_rfc3339;

/// Identifies one inbound call: its transport path, the host it arrived on,
/// and the deadline the client attached (if any).
#[derive(Clone, Debug)]
pub struct CallContext {
    method: String,
    host: String,
    deadline: Option<SystemTime>,
}

impl CallContext {
    pub fn new(method: impl Into<String>, host: impl Into<String>) -> Self {
        CallContext {
            method: method.into(),
            host: host.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: SystemTime) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The transport path, e.g. `/helloworld.Greeter/SayHello`.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The host the call was addressed to, or whatever the transport reports
    /// when the client didn't set one explicitly.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn deadline(&self) -> Option<SystemTime> {
        self.deadline
    }

    /// Renders the deadline the way `tarpc`'s dispatch logging does, for
    /// trace-level log lines.
    pub fn deadline_rfc3339(&self) -> String {
        match self.deadline {
            Some(deadline) => format_rfc3339(deadline).to_string(),
            None => "none".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_method_and_host() {
        let ctx = CallContext::new("/pkg.Svc/Method", "*");
        assert_eq!(ctx.method(), "/pkg.Svc/Method");
        assert_eq!(ctx.host(), "*");
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn with_deadline_is_observable() {
        let deadline = SystemTime::now();
        let ctx = CallContext::new("/a/b", "*").with_deadline(deadline);
        assert_eq!(ctx.deadline(), Some(deadline));
        assert_ne!(ctx.deadline_rfc3339(), "none");
    }
}
