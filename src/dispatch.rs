//! The URL dispatch table (§4.5): `(method, request string) -> handler`,
//! consulted before any filesystem lookup when URL handlers are enabled.
//!
//! Grounded on the concurrent registry pattern in the teacher's
//! `core/registry.rs` (`Arc<RwLock<HashMap<String, Arc<dyn Block>>>>` with
//! register/lookup/list), re-keyed from block name to `(Method, String)`
//! and re-typed from `Block` to a handler closure trait.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::DispatchError;
use crate::session::SessionId;
use crate::transport::Method;

/// Status line a handler (or the resolver) wants sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Ok200,
    MovedPermanently301,
    NotFound404,
    MethodNotAllowed405,
    InternalError500,
}

impl StatusCode {
    pub fn reason(self) -> &'static str {
        match self {
            StatusCode::Ok200 => "OK",
            StatusCode::MovedPermanently301 => "Moved Permanently",
            StatusCode::NotFound404 => "Not Found",
            StatusCode::MethodNotAllowed405 => "Method Not Allowed",
            StatusCode::InternalError500 => "Internal Server Error",
        }
    }

    pub fn code(self) -> u16 {
        match self {
            StatusCode::Ok200 => 200,
            StatusCode::MovedPermanently301 => 301,
            StatusCode::NotFound404 => 404,
            StatusCode::MethodNotAllowed405 => 405,
            StatusCode::InternalError500 => 500,
        }
    }
}

/// What a handler invocation produced.
pub enum HandlerOutcome {
    /// Send this body immediately with a `200`, then drain and disconnect.
    Reply { body: Vec<u8>, status: StatusCode },
    /// Send a `404` with an empty body and disconnect.
    Err,
    /// The handler has taken ownership of the session and will call back
    /// into an [`AsyncReplySink`] later, from any worker.
    Async,
}

/// Callback surface an `Async` handler uses to deliver its eventual reply.
/// Implemented by [`crate::session::engine::RequestEngine`]; handlers only
/// see the trait object so `dispatch` doesn't need to know about the
/// engine's internals.
pub trait AsyncReplySink: Send + Sync {
    fn send_data(&self, session: SessionId, body: Vec<u8>, status: StatusCode);
}

/// A registered URL handler.
///
/// `&HandlerContext` carries everything the handler needs without forcing
/// it to reach into the engine directly, matching the `ExecutionContext`
/// pattern the teacher's `Block::execute` takes.
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &HandlerContext) -> HandlerOutcome;
}

impl<F> Handler for F
where
    F: Fn(&HandlerContext) -> HandlerOutcome + Send + Sync,
{
    fn call(&self, ctx: &HandlerContext) -> HandlerOutcome {
        self(ctx)
    }
}

pub struct HandlerContext {
    pub method: Method,
    pub request: String,
    pub session: SessionId,
    pub reply: Arc<dyn AsyncReplySink>,
}

/// Concurrent `(method, request) -> handler` map. Readers never block each
/// other; registration is rare (startup-time) and serializes on the same
/// lock.
#[derive(Default)]
pub struct UrlDispatchTable {
    handlers: RwLock<HashMap<(Method, String), Arc<dyn Handler>>>,
}

impl UrlDispatchTable {
    pub fn new() -> Self {
        Self { handlers: RwLock::new(HashMap::new()) }
    }

    /// Registers `handler` for the exact `(method, request)` pair. Fails if
    /// one is already registered — the original silently overwrites, but
    /// doing so in Rust would make startup order load-bearing in a way
    /// that's easy to get wrong; require call sites to be explicit.
    pub fn register(
        &self,
        method: Method,
        request: impl Into<String>,
        handler: impl Handler + 'static,
    ) -> Result<(), DispatchError> {
        let request = request.into();
        let mut handlers = self.handlers.write();
        if handlers.contains_key(&(method, request.clone())) {
            return Err(DispatchError::AlreadyRegistered { method, request });
        }
        handlers.insert((method, request), Arc::new(handler));
        Ok(())
    }

    /// Looks up the handler for `(method, request)`, if any. Only exact
    /// GET or POST matches are consulted (§4.5) — callers are expected to
    /// pass `Method::Other` through unchanged and get `None` back.
    pub fn lookup(&self, method: Method, request: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.read().get(&(method, request.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.read().is_empty()
    }
}

/// Reference handlers shipped for demos and integration tests (§4.5 of the
/// expanded spec): a version string, a liveness probe, and a slow `Async`
/// handler for exercising the cross-worker hand-off path.
pub mod reference {
    use super::*;

    pub fn version(_ctx: &HandlerContext) -> HandlerOutcome {
        HandlerOutcome::Reply {
            body: format!("hss/{}", crate::VERSION).into_bytes(),
            status: StatusCode::Ok200,
        }
    }

    pub fn healthz(_ctx: &HandlerContext) -> HandlerOutcome {
        HandlerOutcome::Reply { body: b"ok".to_vec(), status: StatusCode::Ok200 }
    }

    /// Demonstrates the cross-worker async hand-off (§9): spawns a task
    /// that completes later and calls back into the engine through
    /// [`AsyncReplySink`], exactly as a handler doing real off-thread work
    /// (a database lookup, a proxied fetch) would. Requires a running
    /// tokio runtime.
    pub fn slow_async(ctx: &HandlerContext) -> HandlerOutcome {
        let reply = Arc::clone(&ctx.reply);
        let session = ctx.session;
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            reply.send_data(session, b"slow reply".to_vec(), StatusCode::Ok200);
        });
        HandlerOutcome::Async
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullSink;
    impl AsyncReplySink for NullSink {
        fn send_data(&self, _session: SessionId, _body: Vec<u8>, _status: StatusCode) {}
    }

    fn ctx(method: Method, request: &str) -> HandlerContext {
        HandlerContext {
            method,
            request: request.to_string(),
            session: SessionId { worker_index: 0, session_index: 0 },
            reply: Arc::new(NullSink),
        }
    }

    #[test]
    fn register_then_lookup() {
        let table = UrlDispatchTable::new();
        table.register(Method::Get, "/version", reference::version as fn(&HandlerContext) -> HandlerOutcome).unwrap();
        let handler = table.lookup(Method::Get, "/version").expect("registered");
        match handler.call(&ctx(Method::Get, "/version")) {
            HandlerOutcome::Reply { body, status } => {
                assert_eq!(status, StatusCode::Ok200);
                assert!(String::from_utf8(body).unwrap().starts_with("hss/"));
            }
            _ => panic!("expected a reply"),
        }
    }

    #[test]
    fn lookup_miss_returns_none() {
        let table = UrlDispatchTable::new();
        assert!(table.lookup(Method::Get, "/nope").is_none());
    }

    #[test]
    fn double_register_is_an_error() {
        let table = UrlDispatchTable::new();
        table.register(Method::Get, "/x", reference::healthz as fn(&HandlerContext) -> HandlerOutcome).unwrap();
        let err = table
            .register(Method::Get, "/x", reference::healthz as fn(&HandlerContext) -> HandlerOutcome)
            .unwrap_err();
        assert!(matches!(err, DispatchError::AlreadyRegistered { .. }));
    }

    #[test]
    fn distinct_methods_do_not_collide() {
        let table = UrlDispatchTable::new();
        table.register(Method::Get, "/x", reference::healthz as fn(&HandlerContext) -> HandlerOutcome).unwrap();
        table.register(Method::Post, "/x", reference::healthz as fn(&HandlerContext) -> HandlerOutcome).unwrap();
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn async_handler_returns_async_outcome_and_eventually_replies() {
        let table = UrlDispatchTable::new();
        table
            .register(Method::Get, "/slow", reference::slow_async as fn(&HandlerContext) -> HandlerOutcome)
            .unwrap();
        let handler = table.lookup(Method::Get, "/slow").unwrap();

        struct RecordingSink(std::sync::Mutex<Option<(Vec<u8>, StatusCode)>>);
        impl AsyncReplySink for RecordingSink {
            fn send_data(&self, _session: SessionId, body: Vec<u8>, status: StatusCode) {
                *self.0.lock().unwrap() = Some((body, status));
            }
        }
        let sink = Arc::new(RecordingSink(std::sync::Mutex::new(None)));
        let ctx = HandlerContext {
            method: Method::Get,
            request: "/slow".to_string(),
            session: SessionId { worker_index: 0, session_index: 0 },
            reply: Arc::clone(&sink) as Arc<dyn AsyncReplySink>,
        };

        assert!(matches!(handler.call(&ctx), HandlerOutcome::Async));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let (body, status) = sink.0.lock().unwrap().clone().expect("handler replied by now");
        assert_eq!(body, b"slow reply");
        assert_eq!(status, StatusCode::Ok200);
    }
}
