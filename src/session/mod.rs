//! Per-connection state machine (§4.6) and the session record it drives.

pub mod engine;
mod memory_transport;

pub use engine::RequestEngine;
pub use memory_transport::MemoryTransport;

use crate::cache::CacheHandle;
use crate::dispatch::StatusCode;

/// Stable identity of a session: which worker owns it, and its slot within
/// that worker. Carried across the async-handler hand-off (§9) so a reply
/// can find its way back to the right session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId {
    pub worker_index: usize,
    pub session_index: usize,
}

/// The request/response lifecycle a session moves through, one state at a
/// time, driven entirely by transport callbacks (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Accepted, nothing received yet.
    Idle,
    /// Accumulating an inbound request record.
    ReadingRequest,
    /// Resolving the request against handlers / the filesystem.
    Dispatching,
    /// Suspended on an `Async` handler; waiting for `send_data`.
    AwaitingAsyncReply,
    /// Response header queued, waiting for fifo space to send it.
    SendingHeader,
    /// Response body queued, waiting for it to drain.
    SendingBody,
    /// Body fully enqueued; waiting for the peer to drain it before close.
    Draining,
    /// Torn down; no further callbacks expected.
    Closing,
}

/// What's queued to go out. Distinguishes an owned, engine-synthesized
/// buffer (redirects, error bodies, handler replies) from a zero-copy
/// reference into the content cache, mirroring the original's pointer vs.
/// inline-copy reply variants without needing raw pointers to do it
/// (§9 design notes — "Pointer-mode reply").
pub enum OutputBody {
    None,
    Owned(Vec<u8>),
    Cached(CacheHandle),
}

impl OutputBody {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            OutputBody::None => &[],
            OutputBody::Owned(v) => v,
            OutputBody::Cached(h) => h.bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Which reply variant a body is framed as, mirroring the original's
/// `data.type ∈ {inline, ptr}` (§4.6 SendingHeader/SendingBody). Selected by
/// comparing the body length against `use_ptr_thresh`, not by where the
/// body came from — a large handler-synthesized body gets `Ptr` just as a
/// large cache hit would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyDataMode {
    Inline,
    Ptr,
}

impl ReplyDataMode {
    pub fn for_len(len: usize, use_ptr_thresh: usize) -> Self {
        if len > use_ptr_thresh {
            ReplyDataMode::Ptr
        } else {
            ReplyDataMode::Inline
        }
    }
}

/// One connection's worth of state.
pub struct Session {
    pub id: SessionId,
    pub transport_handle: u64,
    pub state: SessionState,
    /// Resolved filesystem path, once known (used for logging and for the
    /// `show http static server sessions` CLI report).
    pub path: Option<String>,
    /// Response body and send progress.
    pub body: OutputBody,
    pub send_offset: usize,
    pub status: StatusCode,
}

impl Session {
    pub fn new(id: SessionId, transport_handle: u64) -> Self {
        Self {
            id,
            transport_handle,
            state: SessionState::Idle,
            path: None,
            body: OutputBody::None,
            send_offset: 0,
            status: StatusCode::Ok200,
        }
    }

    /// Remaining unsent bytes of the response body.
    pub fn remaining(&self) -> &[u8] {
        &self.body.as_bytes()[self.send_offset.min(self.body.len())..]
    }

    pub fn is_fully_sent(&self) -> bool {
        self.send_offset >= self.body.len()
    }
}
