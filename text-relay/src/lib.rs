//! TCP relay that rebroadcasts every client's bytes to all other clients.
//!
//! Each module focuses on a concrete responsibility:
//!
//! - [`config`] parses the command-line interface into a [`config::RelayConfig`].
//! - [`policy`] holds the rate limit, strike and ban rules.
//! - [`broker`] owns the registered sessions and active bans, applies the
//!   policy to each queued [`event::Event`] and fans accepted payloads out.
//! - [`session`] defines the per-client and per-IP records the broker keeps,
//!   plus the handle used to reach a client's writer.
//! - [`connection`] runs the per-connection reader and writer tasks.
//! - [`server`] accepts TCP connections and wires them to the broker.
//!
//! Payloads are relayed exactly as read off the socket. There is no framing,
//! so one client-side message may arrive split across several chunks or
//! merged with the next one.

pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod event;
pub mod policy;
pub mod server;
pub mod session;
