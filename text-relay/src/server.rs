use std::{future::Future, net::SocketAddr};

use anyhow::{Context, Result};
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    sync::mpsc,
    task::JoinSet,
};
use tracing::{info, warn};

use crate::{
    broker::Broker,
    config::RelayConfig,
    connection::{read_loop, write_loop},
    event::Event,
    session::PeerHandle,
};

/// Accept loop feeding a [`Broker`].
///
/// Every accepted connection gets a writer task draining its outbound queue,
/// a `Connected` event carrying the queue's handle, and then a reader task.
pub struct Relay {
    listener: TcpListener,
    config: RelayConfig,
}

impl Relay {
    pub fn new(listener: TcpListener, config: RelayConfig) -> Self {
        Self { listener, config }
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let Relay { listener, config } = self;
        let (events, broker) = Broker::new(config.policy).spawn(config.queue_capacity);
        let mut readers = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            select! {
                _ = &mut shutdown => {
                    info!("relay shutting down");
                    break;
                }
                accept_result = listener.accept() => {
                    handle_accept_result(accept_result, &events, &config, &mut readers).await;
                }
                Some(_) = readers.join_next(), if !readers.is_empty() => {}
            }
        }

        // Readers hold the remaining event senders; the broker stops once
        // they and ours are gone, dropping every session and its writer.
        readers.shutdown().await;
        drop(events);
        broker.await.context("broker task failed")?;

        Ok(())
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = ?err, "failed to install ctrl-c handler");
            }
        })
        .await
    }
}

async fn handle_accept_result(
    result: std::io::Result<(TcpStream, SocketAddr)>,
    events: &mpsc::Sender<Event>,
    config: &RelayConfig,
    readers: &mut JoinSet<()>,
) {
    match result {
        Ok((stream, peer)) => register_connection(stream, peer, events, config, readers).await,
        Err(err) => warn!(error = ?err, "failed to accept connection"),
    }
}

async fn register_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: &mpsc::Sender<Event>,
    config: &RelayConfig,
    readers: &mut JoinSet<()>,
) {
    info!(peer = %addr, "accepted connection");
    let (reader, writer) = stream.into_split();
    let (peer, outbound) = PeerHandle::channel(config.outbound_capacity);
    tokio::spawn(write_loop(writer, addr, outbound, config.write_timeout));

    // Connected must be queued before the reader can queue anything.
    if events.send(Event::Connected { addr, peer }).await.is_err() {
        warn!(peer = %addr, "broker stopped, dropping connection");
        return;
    }
    readers.spawn(read_loop(
        reader,
        addr,
        config.read_buffer_size,
        events.clone(),
    ));
}
