//! Per-connection I/O: a reader turning socket reads into broker events and a
//! writer draining the peer's outbound queue onto the socket.

use std::{net::SocketAddr, time::Duration};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::mpsc,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::event::Event;

/// Reads until EOF or error, queueing one [`Event::Message`] per successful
/// read with exactly the bytes that read returned, then one
/// [`Event::Disconnected`].
pub async fn read_loop<R>(
    mut reader: R,
    addr: SocketAddr,
    buffer_size: usize,
    events: mpsc::Sender<Event>,
) where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match reader.read(&mut buffer).await {
            Ok(0) => {
                debug!(peer = %addr, "connection closed by peer");
                break;
            }
            Ok(read) => {
                let payload = Bytes::copy_from_slice(&buffer[..read]);
                if events.send(Event::Message { addr, payload }).await.is_err() {
                    debug!(peer = %addr, "event queue closed, stopping reader");
                    return;
                }
            }
            Err(error) => {
                info!(peer = %addr, ?error, "could not read from client");
                break;
            }
        }
    }

    if events.send(Event::Disconnected { addr }).await.is_err() {
        debug!(peer = %addr, "event queue closed before disconnect was queued");
    }
}

/// Writes queued payloads in order until the queue closes, then shuts the
/// write side down. Gives up on the first failed or timed out write; the
/// broker keeps the session until the reader notices the connection is gone.
pub async fn write_loop<W>(
    mut writer: W,
    addr: SocketAddr,
    mut outbound: mpsc::Receiver<Bytes>,
    write_timeout: Duration,
) where
    W: AsyncWrite + Unpin,
{
    while let Some(payload) = outbound.recv().await {
        match timeout(write_timeout, writer.write_all(&payload)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                warn!(peer = %addr, ?error, "could not send data to client");
                return;
            }
            Err(_) => {
                warn!(peer = %addr, ?write_timeout, "write to client timed out");
                return;
            }
        }
    }

    if let Err(error) = writer.shutdown().await {
        debug!(peer = %addr, ?error, "failed to shut down client writer cleanly");
    }
}
