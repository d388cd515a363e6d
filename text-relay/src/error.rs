use thiserror::Error;

use crate::config::MAX_READ_BUFFER;

/// Rejected relay configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be greater than 0")]
    Zero(&'static str),
    #[error("read buffer of {0} bytes exceeds the {max} byte limit", max = MAX_READ_BUFFER)]
    ReadBufferTooLarge(usize),
}

/// Why a payload could not be handed to a peer's writer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("outbound queue is full")]
    QueueFull,
    #[error("peer writer has stopped")]
    Closed,
}
