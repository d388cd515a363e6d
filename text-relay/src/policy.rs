//! Abuse-control policy applied by the [`Broker`](crate::broker::Broker).
//!
//! A client may have a message relayed only when more than `min_interval`
//! has passed since its last relayed message and it has collected fewer than
//! `strike_limit` strikes. Every refused message is a strike. When
//! `ban_on_strike_limit` is set, the strike that reaches the limit also bans
//! the client's IP from opening new sessions for `ban_window`.

use std::time::{Duration, Instant};

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STRIKE_LIMIT: u32 = 5;
pub const DEFAULT_BAN_WINDOW: Duration = Duration::from_secs(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    /// Minimum gap between two relayed messages from the same session.
    pub min_interval: Duration,
    /// Strikes after which a session can no longer send.
    pub strike_limit: u32,
    /// How long a ban refuses new sessions from the banned IP.
    pub ban_window: Duration,
    /// Ban the IP of a session when it reaches `strike_limit`.
    pub ban_on_strike_limit: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            min_interval: DEFAULT_MIN_INTERVAL,
            strike_limit: DEFAULT_STRIKE_LIMIT,
            ban_window: DEFAULT_BAN_WINDOW,
            ban_on_strike_limit: true,
        }
    }
}

impl Policy {
    /// Whether a message arriving `elapsed` after the session's last relayed
    /// message, from a session holding `strikes`, may be relayed.
    pub fn allows(&self, elapsed: Duration, strikes: u32) -> bool {
        elapsed > self.min_interval && strikes < self.strike_limit
    }

    /// Whether a ban that began at `banned_at` no longer applies at `now`.
    pub fn ban_expired(&self, banned_at: Instant, now: Instant) -> bool {
        now.saturating_duration_since(banned_at) >= self.ban_window
    }

    /// Whether the strike that brought a session to `strikes` should ban its IP.
    pub fn bans_at(&self, strikes: u32) -> bool {
        self.ban_on_strike_limit && strikes == self.strike_limit
    }
}
