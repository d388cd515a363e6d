use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use text_relay::{config::RelayConfig, policy::Policy, server::Relay};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
    task::JoinHandle,
    time::{sleep, timeout},
};

const READ_TIMEOUT: Duration = Duration::from_secs(1);
const QUIET_PERIOD: Duration = Duration::from_millis(200);

struct RunningRelay {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<Result<()>>,
}

impl RunningRelay {
    async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        timeout(READ_TIMEOUT, self.task).await???;
        Ok(())
    }
}

async fn start_relay(policy: Policy) -> Result<RunningRelay> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let config = RelayConfig {
        listen: addr,
        policy,
        ..RelayConfig::default()
    };
    let relay = Relay::new(listener, config);

    let (shutdown, shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        relay
            .run_until(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    Ok(RunningRelay {
        addr,
        shutdown,
        task,
    })
}

fn fast_policy() -> Policy {
    Policy {
        min_interval: Duration::from_millis(20),
        ..Policy::default()
    }
}

async fn read_exactly(stream: &mut TcpStream, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    timeout(READ_TIMEOUT, stream.read_exact(&mut buf)).await??;
    Ok(buf)
}

async fn assert_silent(stream: &mut TcpStream) {
    let mut buf = [0u8; 64];
    let read = timeout(QUIET_PERIOD, stream.read(&mut buf)).await;
    assert!(read.is_err(), "expected no data, got {read:?}");
}

#[tokio::test]
async fn bytes_reach_every_other_client() -> Result<()> {
    let relay = start_relay(fast_policy()).await?;

    let mut alice = TcpStream::connect(relay.addr).await?;
    let mut bob = TcpStream::connect(relay.addr).await?;
    let mut carol = TcpStream::connect(relay.addr).await?;
    // Let the broker register everyone and the send interval pass.
    sleep(Duration::from_millis(100)).await;

    alice.write_all(b"hello").await?;

    assert_eq!(read_exactly(&mut bob, 5).await?, b"hello");
    assert_eq!(read_exactly(&mut carol, 5).await?, b"hello");
    assert_silent(&mut alice).await;

    relay.stop().await
}

#[tokio::test]
async fn departed_client_does_not_block_the_rest() -> Result<()> {
    let relay = start_relay(fast_policy()).await?;

    let mut alice = TcpStream::connect(relay.addr).await?;
    let mut bob = TcpStream::connect(relay.addr).await?;
    let carol = TcpStream::connect(relay.addr).await?;
    sleep(Duration::from_millis(100)).await;

    drop(carol);
    sleep(Duration::from_millis(50)).await;

    alice.write_all(b"still here?").await?;
    assert_eq!(read_exactly(&mut bob, 11).await?, b"still here?");

    bob.write_all(b"yes").await?;
    assert_eq!(read_exactly(&mut alice, 3).await?, b"yes");

    relay.stop().await
}

#[tokio::test]
async fn spamming_client_gets_its_address_banned() -> Result<()> {
    let policy = Policy {
        min_interval: Duration::from_millis(400),
        strike_limit: 2,
        ban_window: Duration::from_secs(60),
        ban_on_strike_limit: true,
    };
    let relay = start_relay(policy).await?;

    let mut bob = TcpStream::connect(relay.addr).await?;
    let mut alice = TcpStream::connect(relay.addr).await?;
    sleep(Duration::from_millis(50)).await;

    // All inside the interval that starts at registration.
    for chunk in [b"x", b"y", b"z"] {
        alice.write_all(chunk).await?;
        sleep(Duration::from_millis(50)).await;
    }
    assert_silent(&mut bob).await;

    // Same IP, new connection: refused, so its write side is closed at once.
    let mut carol = TcpStream::connect(relay.addr).await?;
    let mut buf = [0u8; 8];
    let read = timeout(READ_TIMEOUT, carol.read(&mut buf)).await??;
    assert_eq!(read, 0);

    relay.stop().await
}

#[tokio::test]
async fn shutdown_closes_client_connections() -> Result<()> {
    let relay = start_relay(fast_policy()).await?;

    let mut alice = TcpStream::connect(relay.addr).await?;
    sleep(Duration::from_millis(50)).await;

    relay.stop().await?;

    let mut buf = [0u8; 8];
    let read = timeout(READ_TIMEOUT, alice.read(&mut buf)).await??;
    assert_eq!(read, 0);
    Ok(())
}
