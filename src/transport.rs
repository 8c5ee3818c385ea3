//! The transport boundary.
//!
//! §3 and §9 of the spec place TCP/TLS/QUIC framing and HTTP header parsing
//! out of scope: this module defines the seam a concrete transport plugs
//! into instead of reaching for a real socket layer. [`Transport`] stands
//! in for the original's `svm_fifo`-backed session layer: enqueue/dequeue
//! of already-framed bytes, backpressure notification thresholds, and a
//! same-process cross-worker event post.

use std::fmt;

/// HTTP method of an inbound request. Only `Get` and `Post` are meaningful
/// to the dispatch table (§4.5); anything else is rejected with `405`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Other,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Other => write!(f, "OTHER"),
        }
    }
}

/// Underlying wire protocol, needed only to decide the `Location` scheme
/// and default port elision for synthesized 301 redirects (§4.4 step 5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportProto {
    Tcp,
    Tls,
    Dtls,
    Quic,
}

impl TransportProto {
    pub fn is_secure(self) -> bool {
        matches!(self, TransportProto::Tls | TransportProto::Dtls)
    }

    pub fn default_port(self) -> u16 {
        if self.is_secure() {
            443
        } else {
            80
        }
    }
}

/// A pre-framed inbound request record, already split into method and
/// request-target by the layer above the transport boundary.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Request target, without a leading `/` stripped — callers normalize.
    pub target: String,
}

/// Everything the session engine needs to know about where a connection
/// terminates, to synthesize `Location` headers and log peer identity.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub local_ip: String,
    pub local_port: u16,
    pub proto: TransportProto,
}

/// A single connection's enqueue/dequeue/notification surface.
///
/// A real implementation backs this with an OS socket (or the host
/// networking stack's own byte queues); [`crate::session::MemoryTransport`]
/// is an in-memory double used by the test suite and the `demos/` binary.
pub trait Transport: Send {
    /// Stable identity, reused as the session's `transport_handle`.
    fn handle(&self) -> u64;

    /// Escape hatch for test doubles that need to downcast back to their
    /// concrete type to inspect queued bytes (see
    /// [`crate::session::MemoryTransport`]).
    fn as_any(&self) -> &dyn std::any::Any;

    fn endpoint(&self) -> Endpoint;

    /// Appends bytes to the outbound queue. Returns the number of bytes
    /// actually accepted (short writes happen under backpressure).
    fn enqueue(&mut self, data: &[u8]) -> usize;

    /// Bytes currently queued but not yet drained by the peer.
    fn outbound_len(&self) -> usize;

    /// Space remaining in the outbound queue before it is full.
    fn outbound_space(&self) -> usize;

    /// Arranges a `tx` callback once at least `thresh` bytes have drained,
    /// mirroring `svm_fifo_add_want_deq_ntf` / `set_deq_thresh`.
    fn notify_on_drain(&mut self, thresh: usize);

    /// Wakes the event loop for this session without new data (used after
    /// an async handler calls back with a reply).
    fn send_io_event(&mut self);

    /// Tears the connection down after any queued bytes are flushed.
    fn disconnect(&mut self);
}
