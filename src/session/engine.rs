//! Wires the cache, the dispatch table, and a transport together into the
//! per-session request/response state machine (§4.6, §4.4 step "Resolve").

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::cache::ContentCache;
use crate::config::ServerConfig;
use crate::dispatch::{AsyncReplySink, HandlerContext, HandlerOutcome, StatusCode, UrlDispatchTable};
use crate::error::CacheError;
use crate::pool::Poison;
use crate::pool::Pool;
use crate::transport::{Endpoint, Method, Request, Transport};

use super::{OutputBody, ReplyDataMode, Session, SessionId, SessionState};

/// One session's full record as held in its worker's [`Pool`] — mirrors
/// `hss_session_t` allocated via `pool_get_zero(hsm->sessions[thread_index],
/// hs)` in `static_server.c:46-52` (§4.1, §4.6).
struct SessionEntry {
    session: Session,
    transport: Box<dyn Transport>,
}

impl Poison for SessionEntry {
    fn poison(&mut self) {
        // `session.id` carries the worker index, kept for diagnostics
        // (§4.1); everything else about the request/response in flight is
        // scrubbed.
        self.session.path = None;
        self.session.body = OutputBody::None;
        self.session.send_offset = 0;
        self.session.state = SessionState::Closing;
    }
}

enum ResolveOutcome {
    Reply(OutputBody, StatusCode),
    /// Raw bytes sent verbatim as the entire response (the 301 case).
    Redirect(Vec<u8>),
    Async,
}

/// A minimal stand-in for the "framed reply record" of §4.6 — not real
/// HTTP wire bytes (header parsing and framing are explicitly out of
/// scope, §9), just enough structure for a transport to tell replies
/// apart in tests and in the `demos/` binary.
struct ReplyRecord {
    status: StatusCode,
    content_type: &'static str,
    body_len: usize,
    mode: ReplyDataMode,
}

impl ReplyRecord {
    fn encode(&self) -> Vec<u8> {
        let mode = match self.mode {
            ReplyDataMode::Inline => "inline",
            ReplyDataMode::Ptr => "ptr",
        };
        format!("REPLY {} {} {} {}\n", self.status.code(), self.content_type, self.body_len, mode)
            .into_bytes()
    }
}

/// Ties a [`ContentCache`], a [`UrlDispatchTable`], and per-session state
/// together. Methods that can hand a handler an [`AsyncReplySink`] take
/// `self: &Arc<Self>` so the callback can be cloned and outlive the
/// triggering `rx` call — the engine is meant to be used behind a single
/// shared `Arc`, matching the original's one process-wide `hss_main`
/// replaced by an explicit owned struct (§9 design notes).
pub struct RequestEngine {
    cache: ContentCache,
    dispatch: Arc<UrlDispatchTable>,
    config: Arc<ServerConfig>,
    /// One [`Pool`] per worker, keyed by `worker_index`, mirroring
    /// `hsm->sessions[thread_index]` (§4.1, §4.6) — sessions are slab-
    /// allocated the same way cache entries are, rather than trusted to a
    /// caller-supplied index.
    sessions: Mutex<HashMap<usize, Pool<SessionEntry>>>,
}

impl RequestEngine {
    pub fn new(cache: ContentCache, dispatch: Arc<UrlDispatchTable>, config: Arc<ServerConfig>) -> Arc<Self> {
        Arc::new(Self { cache, dispatch, config, sessions: Mutex::new(HashMap::new()) })
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().values().map(Pool::len).sum()
    }

    /// Runs `f` against a session's transport, for tests that need to
    /// inspect what was actually enqueued (e.g. downcasting to
    /// [`crate::session::MemoryTransport`] to peek the outbound bytes)
    /// without the engine itself depending on any concrete `Transport`.
    pub fn with_session_transport<R>(&self, id: SessionId, f: impl FnOnce(&dyn Transport) -> R) -> Option<R> {
        let sessions = self.sessions.lock();
        sessions
            .get(&id.worker_index)
            .and_then(|pool| pool.get(id.session_index))
            .map(|entry| f(entry.transport.as_ref()))
    }

    /// `accept` callback: allocates a session for a freshly accepted
    /// connection out of `worker_index`'s pool, the same way
    /// `hss_session_alloc` does `pool_get_zero(hsm->sessions[thread_index],
    /// hs)` and derives the session's identity from the slot it lands in
    /// (§4.1, §4.6). Returns the allocated [`SessionId`].
    pub fn accept(self: &Arc<Self>, worker_index: usize, transport: Box<dyn Transport>) -> SessionId {
        let handle = transport.handle();
        let placeholder = SessionId { worker_index, session_index: 0 };
        let mut sessions = self.sessions.lock();
        let pool = sessions.entry(worker_index).or_insert_with(Pool::new);
        let session_index =
            pool.alloc(SessionEntry { session: Session::new(placeholder, handle), transport });
        let id = SessionId { worker_index, session_index };
        pool.get_mut(session_index).expect("just allocated").session.id = id;
        debug!(worker = id.worker_index, session = id.session_index, handle, "session accepted");
        id
    }

    fn with_entry_mut<R>(&self, id: SessionId, f: impl FnOnce(&mut SessionEntry) -> R) -> Option<R> {
        let mut sessions = self.sessions.lock();
        sessions.get_mut(&id.worker_index).and_then(|pool| pool.get_mut(id.session_index)).map(f)
    }

    /// `rx` callback: a fully framed request record has arrived. Resolves
    /// it against the dispatch table, then the filesystem, and begins (or
    /// suspends) the response.
    pub fn rx(self: &Arc<Self>, id: SessionId, request: Request) {
        let endpoint = {
            let mut sessions = self.sessions.lock();
            let Some(entry) = sessions.get_mut(&id.worker_index).and_then(|pool| pool.get_mut(id.session_index))
            else {
                warn!(worker = id.worker_index, session = id.session_index, "rx for unknown session");
                return;
            };
            entry.session.state = SessionState::Dispatching;
            entry.session.path = Some(request.target.clone());
            entry.transport.endpoint()
        };

        let outcome = self.resolve(request.method, &request.target, id, &endpoint);

        let mut sessions = self.sessions.lock();
        let Some(entry) = sessions.get_mut(&id.worker_index).and_then(|pool| pool.get_mut(id.session_index))
        else {
            return;
        };
        match outcome {
            ResolveOutcome::Reply(body, status) => self.begin_response(entry, status, body),
            ResolveOutcome::Redirect(raw) => self.send_raw(entry, raw),
            ResolveOutcome::Async => {
                entry.session.state = SessionState::AwaitingAsyncReply;
            }
        }
    }

    /// `tx` (drain-notification) callback: resumes streaming a body that
    /// didn't fit in one enqueue.
    pub fn tx(self: &Arc<Self>, id: SessionId) {
        self.with_entry_mut(id, |entry| {
            if entry.session.state == SessionState::SendingBody {
                self.pump_body(entry);
            }
        });
    }

    /// `disconnect` / `reset` callback: no further bytes will be sent.
    pub fn disconnect(self: &Arc<Self>, id: SessionId) {
        self.with_entry_mut(id, |entry| entry.session.state = SessionState::Closing);
    }

    pub fn reset(self: &Arc<Self>, id: SessionId) {
        self.disconnect(id);
    }

    /// `cleanup` callback: frees the session back to its worker's pool.
    /// Dropping the [`Session`] drops any held [`crate::cache::CacheHandle`],
    /// releasing the cache entry's pin.
    pub fn cleanup(self: &Arc<Self>, id: SessionId) {
        let mut sessions = self.sessions.lock();
        if let Some(pool) = sessions.get_mut(&id.worker_index) {
            if pool.is_live(id.session_index) {
                pool.free(id.session_index);
            }
        }
    }

    fn resolve(
        self: &Arc<Self>,
        method: Method,
        request: &str,
        session_id: SessionId,
        endpoint: &Endpoint,
    ) -> ResolveOutcome {
        if self.config.enable_url_handlers {
            if let Some(handler) = self.dispatch.lookup(method, request) {
                let ctx = HandlerContext {
                    method,
                    request: request.to_string(),
                    session: session_id,
                    reply: Arc::clone(self) as Arc<dyn AsyncReplySink>,
                };
                return match handler.call(&ctx) {
                    HandlerOutcome::Reply { body, status } => {
                        ResolveOutcome::Reply(OutputBody::Owned(body), status)
                    }
                    HandlerOutcome::Err => {
                        ResolveOutcome::Reply(OutputBody::None, StatusCode::NotFound404)
                    }
                    HandlerOutcome::Async => ResolveOutcome::Async,
                };
            }
        }

        if !matches!(method, Method::Get | Method::Post) {
            return ResolveOutcome::Reply(OutputBody::None, StatusCode::MethodNotAllowed405);
        }

        let Some(www_root) = self.config.www_root.as_ref() else {
            return ResolveOutcome::Reply(OutputBody::None, StatusCode::NotFound404);
        };

        let suffix = if request.is_empty() {
            String::new()
        } else if request.starts_with('/') {
            request.to_string()
        } else {
            format!("/{request}")
        };
        let base_path = format!("{}{}", www_root.display(), suffix);

        match self.cache.acquire(&base_path) {
            Ok(handle) => return ResolveOutcome::Reply(OutputBody::Cached(handle), StatusCode::Ok200),
            Err(CacheError::NotFound(_)) => {}
            Err(CacheError::Io { .. }) => {
                return ResolveOutcome::Reply(OutputBody::None, StatusCode::InternalError500)
            }
        }

        let attempt2 = format!("{base_path}index.html");
        match self.cache.acquire(&attempt2) {
            Ok(handle) => return ResolveOutcome::Reply(OutputBody::Cached(handle), StatusCode::Ok200),
            Err(CacheError::NotFound(_)) => {}
            Err(CacheError::Io { .. }) => {
                return ResolveOutcome::Reply(OutputBody::None, StatusCode::InternalError500)
            }
        }

        let attempt3 = format!("{base_path}/index.html");
        match self.cache.acquire(&attempt3) {
            Ok(_handle) => {
                // Only the third attempt succeeded: redirect rather than
                // serve, so relative links in the page resolve correctly
                // against a trailing-slash URL (§4.4 step 5).
                let scheme = if endpoint.proto.is_secure() { "https" } else { "http" };
                let port = if endpoint.local_port == endpoint.proto.default_port() {
                    String::new()
                } else {
                    format!(":{}", endpoint.local_port)
                };
                let location = format!("{scheme}://{}{port}{suffix}/index.html", endpoint.local_ip);
                let raw = format!(
                    "HTTP/1.1 301 Moved Permanently\r\nLocation: {location}\r\nContent-Length: 0\r\n\r\n"
                )
                .into_bytes();
                ResolveOutcome::Redirect(raw)
            }
            Err(CacheError::NotFound(_)) => {
                ResolveOutcome::Reply(OutputBody::None, StatusCode::NotFound404)
            }
            Err(CacheError::Io { .. }) => {
                ResolveOutcome::Reply(OutputBody::None, StatusCode::InternalError500)
            }
        }
    }

    fn begin_response(&self, entry: &mut SessionEntry, status: StatusCode, body: OutputBody) {
        let mode = ReplyDataMode::for_len(body.len(), self.config.use_ptr_thresh);
        let record = ReplyRecord { status, content_type: "text/html", body_len: body.len(), mode };
        entry.session.status = status;
        entry.session.body = body;
        entry.session.send_offset = 0;
        entry.session.state = SessionState::SendingHeader;

        let header_bytes = record.encode();
        let accepted = entry.transport.enqueue(&header_bytes);
        debug_assert_eq!(accepted, header_bytes.len(), "reply header must fit in one enqueue");

        entry.session.state = SessionState::SendingBody;
        self.pump_body(entry);
    }

    fn send_raw(&self, entry: &mut SessionEntry, raw: Vec<u8>) {
        entry.session.body = OutputBody::Owned(raw);
        entry.session.send_offset = 0;
        entry.session.state = SessionState::SendingBody;
        self.pump_body(entry);
    }

    fn pump_body(&self, entry: &mut SessionEntry) {
        if entry.session.body.is_empty() {
            entry.session.state = SessionState::Closing;
            entry.transport.disconnect();
            return;
        }
        loop {
            let remaining = entry.session.remaining();
            if remaining.is_empty() {
                break;
            }
            let accepted = entry.transport.enqueue(remaining);
            if accepted == 0 {
                break;
            }
            entry.session.send_offset += accepted;
        }
        if entry.session.is_fully_sent() {
            entry.session.state = SessionState::Draining;
            entry.transport.disconnect();
        } else {
            entry.transport.notify_on_drain(0);
            entry.session.state = SessionState::SendingBody;
        }
    }
}

impl AsyncReplySink for RequestEngine {
    /// Delivers an `Async` handler's eventual reply. Per §9's open
    /// question (c), a second call for the same session overwrites the
    /// first — last-writer-wins — rather than queuing or erroring.
    fn send_data(&self, session: SessionId, body: Vec<u8>, status: StatusCode) {
        let sent = self.with_entry_mut(session, |entry| {
            self.begin_response(entry, status, OutputBody::Owned(body));
        });
        if sent.is_none() {
            warn!(
                worker = session.worker_index,
                session = session.session_index,
                "async reply for a session that was freed in the meantime, dropping"
            );
        }
    }
}
