//! In-memory [`Transport`] double used by tests and the `demos/` binary —
//! there is no real socket here, just two byte queues a test can poke at
//! directly.

use std::collections::VecDeque;

use crate::transport::{Endpoint, Transport, TransportProto};

pub struct MemoryTransport {
    handle: u64,
    endpoint: Endpoint,
    outbound: VecDeque<u8>,
    outbound_cap: usize,
    drain_thresh: Option<usize>,
    pub disconnected: bool,
}

impl MemoryTransport {
    pub fn new(handle: u64) -> Self {
        Self {
            handle,
            endpoint: Endpoint {
                local_ip: "127.0.0.1".to_string(),
                local_port: 80,
                proto: TransportProto::Tcp,
            },
            outbound: VecDeque::new(),
            outbound_cap: 64 << 10,
            drain_thresh: None,
            disconnected: false,
        }
    }

    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Drains and returns everything queued so far, as a test would after
    /// simulating a `tx` callback firing.
    pub fn take_outbound(&mut self) -> Vec<u8> {
        self.outbound.drain(..).collect()
    }

    pub fn peek_outbound(&self) -> Vec<u8> {
        self.outbound.iter().copied().collect()
    }

    /// Whether a drain notification has been armed and the queue has
    /// dropped at or below it — the condition that would fire `tx` in a
    /// real transport.
    pub fn drain_notification_due(&self) -> bool {
        matches!(self.drain_thresh, Some(t) if self.outbound.len() <= t)
    }
}

impl Transport for MemoryTransport {
    fn handle(&self) -> u64 {
        self.handle
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn endpoint(&self) -> Endpoint {
        self.endpoint.clone()
    }

    fn enqueue(&mut self, data: &[u8]) -> usize {
        let space = self.outbound_space();
        let n = data.len().min(space);
        self.outbound.extend(&data[..n]);
        n
    }

    fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    fn outbound_space(&self) -> usize {
        self.outbound_cap.saturating_sub(self.outbound.len())
    }

    fn notify_on_drain(&mut self, thresh: usize) {
        self.drain_thresh = Some(thresh);
    }

    fn send_io_event(&mut self) {}

    fn disconnect(&mut self) {
        self.disconnected = true;
    }
}
