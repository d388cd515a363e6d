//! Records owned by the broker: one [`ClientSession`] per registered remote
//! address and one [`BanRecord`] per banned IP.

use std::time::Instant;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::DeliveryError;

/// Sending side of a peer's outbound queue.
///
/// The receiving side is drained by that connection's writer task, so handing
/// a payload to a peer never waits on its socket.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    tx: mpsc::Sender<Bytes>,
}

impl PeerHandle {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx }
    }

    /// Creates a handle backed by a fresh queue holding up to `capacity` payloads.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub fn deliver(&self, payload: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(payload).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

#[derive(Debug)]
pub struct ClientSession {
    peer: PeerHandle,
    last_message: Instant,
    strikes: u32,
}

impl ClientSession {
    pub fn new(peer: PeerHandle, now: Instant) -> Self {
        Self {
            peer,
            last_message: now,
            strikes: 0,
        }
    }

    pub fn peer(&self) -> &PeerHandle {
        &self.peer
    }

    /// When the session registered or last had a message relayed.
    pub fn last_message(&self) -> Instant {
        self.last_message
    }

    pub fn strikes(&self) -> u32 {
        self.strikes
    }

    pub fn record_relayed(&mut self, now: Instant) {
        self.last_message = now;
    }

    /// Adds one strike and returns the new total.
    pub fn record_strike(&mut self) -> u32 {
        self.strikes = self.strikes.saturating_add(1);
        self.strikes
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BanRecord {
    pub banned_at: Instant,
}
