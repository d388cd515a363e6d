use std::net::SocketAddr;

use bytes::Bytes;

use crate::session::PeerHandle;

/// Everything the broker reacts to, queued by the listener and the
/// per-connection readers.
#[derive(Debug)]
pub enum Event {
    /// A connection was accepted. `peer` feeds that connection's writer.
    Connected { addr: SocketAddr, peer: PeerHandle },
    /// The connection's read side failed or reached EOF.
    Disconnected { addr: SocketAddr },
    /// One read's worth of raw bytes. Not a framed message.
    Message { addr: SocketAddr, payload: Bytes },
}

impl Event {
    pub fn addr(&self) -> SocketAddr {
        match self {
            Event::Connected { addr, .. }
            | Event::Disconnected { addr }
            | Event::Message { addr, .. } => *addr,
        }
    }
}
