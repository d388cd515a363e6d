use std::{net::SocketAddr, time::Duration};

use clap::Parser;

use crate::{error::ConfigError, policy::Policy};

pub const DEFAULT_PORT: u16 = 6969;
pub const MAX_READ_BUFFER: usize = 64 * 1024;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:6969")]
    pub listen: SocketAddr,

    /// Minimum time between two relayed messages from one client, in milliseconds.
    #[arg(long, default_value_t = 500)]
    pub min_interval_ms: u64,

    /// Rejected messages after which a client can no longer send.
    #[arg(long, default_value_t = 5)]
    pub strike_limit: u32,

    /// How long a banned IP is refused new sessions, in seconds.
    #[arg(long, default_value_t = 500)]
    pub ban_window_secs: u64,

    /// Never ban an IP, even when one of its clients reaches the strike limit.
    #[arg(long)]
    pub no_ban: bool,

    /// Size of the per-connection read buffer in bytes.
    #[arg(long, default_value_t = 64)]
    pub read_buffer: usize,

    /// Number of events that can wait for the broker before readers block.
    #[arg(long, default_value_t = 1024)]
    pub queue_capacity: usize,

    /// Payloads buffered per client before further broadcasts to it are dropped.
    #[arg(long, default_value_t = 64)]
    pub outbound_capacity: usize,

    /// Give up on a client whose socket accepts no data for this long, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub write_timeout_ms: u64,
}

/// Runtime configuration derived from [`Args`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub listen: SocketAddr,
    pub policy: Policy,
    pub read_buffer_size: usize,
    pub queue_capacity: usize,
    pub outbound_capacity: usize,
    pub write_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            policy: Policy::default(),
            read_buffer_size: 64,
            queue_capacity: 1024,
            outbound_capacity: 64,
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl RelayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.policy.strike_limit == 0 {
            return Err(ConfigError::Zero("strike_limit"));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Zero("read_buffer"));
        }
        if self.read_buffer_size > MAX_READ_BUFFER {
            return Err(ConfigError::ReadBufferTooLarge(self.read_buffer_size));
        }
        // tokio's bounded channels panic on a zero capacity.
        if self.queue_capacity == 0 {
            return Err(ConfigError::Zero("queue_capacity"));
        }
        if self.outbound_capacity == 0 {
            return Err(ConfigError::Zero("outbound_capacity"));
        }
        if self.write_timeout.is_zero() {
            return Err(ConfigError::Zero("write_timeout"));
        }
        Ok(())
    }
}

impl From<Args> for RelayConfig {
    fn from(args: Args) -> Self {
        Self {
            listen: args.listen,
            policy: Policy {
                min_interval: Duration::from_millis(args.min_interval_ms),
                strike_limit: args.strike_limit,
                ban_window: Duration::from_secs(args.ban_window_secs),
                ban_on_strike_limit: !args.no_ban,
            },
            read_buffer_size: args.read_buffer,
            queue_capacity: args.queue_capacity,
            outbound_capacity: args.outbound_capacity,
            write_timeout: Duration::from_millis(args.write_timeout_ms),
        }
    }
}
