// Copyright 2018 Google LLC
//
// Use of this source code is governed by an MIT-style
// license that can be found in the LICENSE file or at
// https://opensource.org/licenses/MIT.

//! The typed trait layer bridging `Req`/`Resp` generics to the transport's
//! raw byte buffers, and the in-process descriptor catalog `Validate`
//! consults.
//!
//! Real descriptor *parsing* (turning `.proto` sources into method
//! signatures) is out of scope — descriptors here are registered
//! programmatically, alongside service setup, the same way a service
//! implementation registers itself with `tarpc`'s `Channel`.

use std::collections::HashMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Error;

/// A type that can be carried as an RPC request or response.
///
/// Implementors hand the core a name (used for descriptor validation) and a
/// pair of byte-buffer codecs (used by `Reader`/`Writer`). Nothing here
/// mandates a particular wire format; a crate consumer is free to back this
/// with `serde_json`, `bincode`, `prost`, or anything else.
pub trait Message: Send + Sized + 'static {
    /// The fully-qualified message type name, used only for descriptor
    /// validation diagnostics (e.g. `"helloworld.HelloRequest"`).
    fn message_name() -> &'static str;

    fn encode(&self) -> Result<bytes::Bytes, Error>;

    fn decode(buf: bytes::Bytes) -> Result<Self, Error>;
}

/// A blanket `Message` implementation for any `serde`-compatible type, in
/// the same spirit as `tarpc`'s `serde_transport` layering a codec over a
/// raw transport: a caller who doesn't want to hand-write `encode`/`decode`
/// wraps their type in `Json<T>` instead.
///
/// `name` must be supplied explicitly since a blanket impl has no way to
/// derive a stable, qualified message name from `T` alone.
pub struct Json<T> {
    pub value: T,
    _marker: PhantomData<T>,
}

impl<T> Json<T> {
    pub fn new(value: T) -> Self {
        Json {
            value,
            _marker: PhantomData,
        }
    }

    pub fn into_inner(self) -> T {
        self.value
    }
}

impl<T: Serialize + DeserializeOwned + Send + 'static> Message for Json<T> {
    fn message_name() -> &'static str {
        "eventuals_rpc.Json"
    }

    fn encode(&self) -> Result<bytes::Bytes, Error> {
        serde_json::to_vec(&self.value)
            .map(bytes::Bytes::from)
            .map_err(|err| Error::Serialize(err.to_string()))
    }

    fn decode(buf: bytes::Bytes) -> Result<Self, Error> {
        serde_json::from_slice(&buf)
            .map(Json::new)
            .map_err(|err| Error::Deserialize(err.to_string()))
    }
}

/// Streaming arity of one side (request or response) of a method.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Arity {
    Unary,
    Streaming,
}

impl Arity {
    fn label(self) -> &'static str {
        match self {
            Arity::Unary => "unary",
            Arity::Streaming => "streaming",
        }
    }
}

/// A single registered method's signature, as `Validate` needs it.
#[derive(Clone, Debug)]
pub struct MethodDescriptor {
    pub name: String,
    pub request_type: &'static str,
    pub response_type: &'static str,
    pub client_streaming: Arity,
    pub server_streaming: Arity,
}

impl MethodDescriptor {
    pub fn unary(name: impl Into<String>, request_type: &'static str, response_type: &'static str) -> Self {
        MethodDescriptor {
            name: name.into(),
            request_type,
            response_type,
            client_streaming: Arity::Unary,
            server_streaming: Arity::Unary,
        }
    }

    pub fn with_client_streaming(mut self) -> Self {
        self.client_streaming = Arity::Streaming;
        self
    }

    pub fn with_server_streaming(mut self) -> Self {
        self.server_streaming = Arity::Streaming;
        self
    }
}

/// Registry of `MethodDescriptor`s, consulted by `Server::validate`.
///
/// This is a minimal in-process stand-in for "a descriptor pool service"
/// (§1); a production deployment could swap this trait's implementation for
/// one backed by a real reflection/descriptor-pool service without touching
/// the dispatch core.
pub trait DescriptorPool: Send + Sync {
    fn find(&self, name: &str) -> Option<&MethodDescriptor>;
}

/// A `HashMap`-backed `DescriptorPool` built up by hand (or by generated
/// service registration code).
#[derive(Default)]
pub struct StaticDescriptorPool {
    methods: HashMap<String, MethodDescriptor>,
}

impl StaticDescriptorPool {
    pub fn new() -> Self {
        StaticDescriptorPool {
            methods: HashMap::new(),
        }
    }

    pub fn register(&mut self, descriptor: MethodDescriptor) -> &mut Self {
        self.methods.insert(descriptor.name.clone(), descriptor);
        self
    }
}

impl DescriptorPool for StaticDescriptorPool {
    fn find(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }
}

/// Validates that `Req`/`Resp`, called with the given streaming arities,
/// match the method named `name` in `pool`.
///
/// Mirrors `Server::Validate` (§4.5): a missing method fails `MethodNotFound`;
/// a message-type or streaming-arity mismatch fails `TypeMismatch` with a
/// diagnostic naming the expected value.
pub fn validate<Req: Message, Resp: Message>(
    pool: &dyn DescriptorPool,
    name: &str,
    client_streaming: Arity,
    server_streaming: Arity,
) -> Result<(), Error> {
    let method = pool
        .find(name)
        .ok_or_else(|| Error::MethodNotFound(name.to_string()))?;

    if method.request_type != Req::message_name() {
        return Err(Error::TypeMismatch {
            method: name.to_string(),
            expected: method.request_type,
            actual: Req::message_name(),
        });
    }

    if method.response_type != Resp::message_name() {
        return Err(Error::TypeMismatch {
            method: name.to_string(),
            expected: method.response_type,
            actual: Resp::message_name(),
        });
    }

    if method.client_streaming != client_streaming {
        return Err(Error::TypeMismatch {
            method: name.to_string(),
            expected: method.client_streaming.label(),
            actual: client_streaming.label(),
        });
    }

    if method.server_streaming != server_streaming {
        return Err(Error::TypeMismatch {
            method: name.to_string(),
            expected: method.server_streaming.label(),
            actual: server_streaming.label(),
        });
    }

    Ok(())
}

/// Splits `pkg.Service.Method` into the transport path `/pkg.Service/Method`
/// (§4.5, §6): the last `.` becomes `/`, and the result is `/`-prefixed.
pub fn method_path(name: &str) -> String {
    match name.rfind('.') {
        Some(index) => format!("/{}/{}", &name[..index], &name[index + 1..]),
        None => format!("/{}", name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Req;
    #[derive(Debug, PartialEq, Eq)]
    struct Resp;

    impl Message for Req {
        fn message_name() -> &'static str {
            "pkg.Req"
        }
        fn encode(&self) -> Result<bytes::Bytes, Error> {
            Ok(bytes::Bytes::new())
        }
        fn decode(_buf: bytes::Bytes) -> Result<Self, Error> {
            Ok(Req)
        }
    }

    impl Message for Resp {
        fn message_name() -> &'static str {
            "pkg.Resp"
        }
        fn encode(&self) -> Result<bytes::Bytes, Error> {
            Ok(bytes::Bytes::new())
        }
        fn decode(_buf: bytes::Bytes) -> Result<Self, Error> {
            Ok(Resp)
        }
    }

    #[test]
    fn path_splits_on_last_dot() {
        assert_eq!(method_path("pkg.Svc.Method"), "/pkg.Svc/Method");
        assert_eq!(method_path("helloworld.Greeter.SayHello"), "/helloworld.Greeter/SayHello");
    }

    #[test]
    fn validate_missing_method_fails() {
        let pool = StaticDescriptorPool::new();
        let err = validate::<Req, Resp>(&pool, "pkg.Svc.Method", Arity::Unary, Arity::Unary)
            .unwrap_err();
        assert!(matches!(err, Error::MethodNotFound(_)));
    }

    #[test]
    fn validate_type_mismatch_fails() {
        let mut pool = StaticDescriptorPool::new();
        pool.register(MethodDescriptor::unary("pkg.Svc.Method", "pkg.Other", "pkg.Resp"));
        let err = validate::<Req, Resp>(&pool, "pkg.Svc.Method", Arity::Unary, Arity::Unary)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn validate_client_streaming_mismatch_fails() {
        let mut pool = StaticDescriptorPool::new();
        pool.register(
            MethodDescriptor::unary("pkg.Svc.Method", "pkg.Req", "pkg.Resp")
                .with_client_streaming(),
        );
        let err = validate::<Req, Resp>(&pool, "pkg.Svc.Method", Arity::Unary, Arity::Unary)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn validate_server_streaming_mismatch_fails() {
        let mut pool = StaticDescriptorPool::new();
        pool.register(MethodDescriptor::unary("pkg.Svc.Method", "pkg.Req", "pkg.Resp"));
        let err = validate::<Req, Resp>(&pool, "pkg.Svc.Method", Arity::Unary, Arity::Streaming)
            .unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
    }

    #[test]
    fn validate_matching_types_succeeds() {
        let mut pool = StaticDescriptorPool::new();
        pool.register(MethodDescriptor::unary("pkg.Svc.Method", "pkg.Req", "pkg.Resp"));
        assert!(
            validate::<Req, Resp>(&pool, "pkg.Svc.Method", Arity::Unary, Arity::Unary).is_ok()
        );
    }

    #[derive(Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
    struct Point {
        x: i32,
        y: i32,
    }

    #[test]
    fn json_round_trips_through_encode_decode() {
        let original = Json::new(Point { x: 1, y: -2 });
        let buf = original.encode().unwrap();
        let decoded = Json::<Point>::decode(buf).unwrap();
        assert_eq!(decoded.into_inner(), Point { x: 1, y: -2 });
    }

    #[test]
    fn json_decode_rejects_malformed_payload() {
        let err = Json::<Point>::decode(bytes::Bytes::from_static(b"not json")).unwrap_err();
        assert!(matches!(err, Error::Deserialize(_)));
    }
}
