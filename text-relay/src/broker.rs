use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    time::Instant,
};

use bytes::Bytes;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, trace, warn};

use crate::{
    event::Event,
    policy::Policy,
    session::{BanRecord, ClientSession, PeerHandle},
};

/// Single owner of the session and ban registries.
///
/// Events are applied strictly one at a time in queue order; nothing else
/// can reach the registries, so no locking is involved. Broadcasting only
/// enqueues onto each peer's outbound queue, so a stalled socket cannot hold
/// up the next event.
pub struct Broker {
    policy: Policy,
    sessions: HashMap<SocketAddr, ClientSession>,
    bans: HashMap<IpAddr, BanRecord>,
}

/// What handling one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Registered,
    /// The connecting IP is banned; no session was created.
    Refused,
    /// The address already had a session, which was kept as is.
    Duplicate,
    Removed,
    /// No session exists for the address; the event was dropped.
    Unknown,
    Relayed {
        delivered: usize,
        failed: usize,
    },
    Rejected {
        strikes: u32,
        banned: bool,
    },
}

impl Broker {
    pub fn new(policy: Policy) -> Self {
        Self {
            policy,
            sessions: HashMap::new(),
            bans: HashMap::new(),
        }
    }

    /// Moves the broker onto its own task, fed by a queue of `capacity` events.
    ///
    /// The task ends once every sender has been dropped.
    pub fn spawn(self, capacity: usize) -> (mpsc::Sender<Event>, JoinHandle<()>) {
        let (events, inbox) = mpsc::channel(capacity);
        let task = tokio::spawn(self.run(inbox));
        (events, task)
    }

    pub async fn run(mut self, mut inbox: mpsc::Receiver<Event>) {
        while let Some(event) = inbox.recv().await {
            let addr = event.addr();
            let outcome = self.handle(event, Instant::now());
            trace!(peer = %addr, ?outcome, "handled event");
        }
        info!(sessions = self.sessions.len(), "event queue closed, broker stopping");
    }

    pub fn handle(&mut self, event: Event, now: Instant) -> Outcome {
        match event {
            Event::Connected { addr, peer } => self.connect(addr, peer, now),
            Event::Disconnected { addr } => self.disconnect(addr),
            Event::Message { addr, payload } => self.message(addr, payload, now),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_registered(&self, addr: SocketAddr) -> bool {
        self.sessions.contains_key(&addr)
    }

    pub fn strikes(&self, addr: SocketAddr) -> Option<u32> {
        self.sessions.get(&addr).map(ClientSession::strikes)
    }

    /// The stored ban for `ip`, expired or not. Expired bans are only dropped
    /// when that IP next connects.
    pub fn ban_record(&self, ip: IpAddr) -> Option<BanRecord> {
        self.bans.get(&ip).copied()
    }

    pub fn is_banned(&self, ip: IpAddr, now: Instant) -> bool {
        self.bans
            .get(&ip)
            .is_some_and(|ban| !self.policy.ban_expired(ban.banned_at, now))
    }

    fn connect(&mut self, addr: SocketAddr, peer: PeerHandle, now: Instant) -> Outcome {
        let ip = addr.ip();
        if let Some(banned_at) = self.bans.get(&ip).map(|ban| ban.banned_at) {
            if !self.policy.ban_expired(banned_at, now) {
                warn!(peer = %addr, "refusing session for banned address");
                return Outcome::Refused;
            }
            self.bans.remove(&ip);
            info!(%ip, "ban expired");
        }

        if self.sessions.contains_key(&addr) {
            warn!(peer = %addr, "address already registered, keeping existing session");
            return Outcome::Duplicate;
        }
        self.sessions.insert(addr, ClientSession::new(peer, now));
        info!(peer = %addr, sessions = self.sessions.len(), "client connected");
        Outcome::Registered
    }

    fn disconnect(&mut self, addr: SocketAddr) -> Outcome {
        match self.sessions.remove(&addr) {
            Some(_) => {
                info!(peer = %addr, sessions = self.sessions.len(), "client disconnected");
                Outcome::Removed
            }
            None => Outcome::Unknown,
        }
    }

    fn message(&mut self, addr: SocketAddr, payload: Bytes, now: Instant) -> Outcome {
        let Some(session) = self.sessions.get_mut(&addr) else {
            debug!(peer = %addr, bytes = payload.len(), "dropping message from unregistered address");
            return Outcome::Unknown;
        };

        let elapsed = now.saturating_duration_since(session.last_message());
        if !self.policy.allows(elapsed, session.strikes()) {
            let strikes = session.record_strike();
            let banned = self.policy.bans_at(strikes);
            if banned {
                self.bans.insert(addr.ip(), BanRecord { banned_at: now });
                warn!(peer = %addr, strikes, "strike limit reached, banning address");
            } else {
                debug!(peer = %addr, strikes, ?elapsed, "message rejected");
            }
            return Outcome::Rejected { strikes, banned };
        }

        session.record_relayed(now);
        let (delivered, failed) = self.broadcast(addr, &payload);
        debug!(peer = %addr, bytes = payload.len(), delivered, failed, "message relayed");
        Outcome::Relayed { delivered, failed }
    }

    fn broadcast(&self, sender: SocketAddr, payload: &Bytes) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;
        for (addr, session) in self.sessions.iter().filter(|(addr, _)| **addr != sender) {
            match session.peer().deliver(payload.clone()) {
                Ok(()) => delivered += 1,
                Err(error) => {
                    failed += 1;
                    warn!(peer = %addr, %error, "could not deliver payload");
                }
            }
        }
        (delivered, failed)
    }
}
