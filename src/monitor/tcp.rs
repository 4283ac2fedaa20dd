//! # TCP reachability channel and static service locator.
//!
//! [`TcpChannel`] is a [`ConnectionHandle`] that tracks whether a TCP endpoint accepts
//! connections. A background driver (spawned on the first `get_state(true)`) walks the
//! raw state machine:
//!
//! ```text
//! Idle ──get_state(true)──► Connecting ──ok──► Ready ──peer closed──► TransientFailure
//!                               │                                          │
//!                               └──err/timeout──► TransientFailure ◄───────┘
//!                                                        │
//!                                          sleep(reconnect_delay) ──► Connecting
//! ```
//!
//! The driver stops when the last handle to the channel is dropped.
//!
//! [`StaticLocator`] resolves service names from a fixed table (usually loaded from the
//! configuration file). Callers acquiring the same service while a channel is alive share
//! it; the locator itself only keeps a weak reference, so once the monitor lets go no
//! more connections are opened.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::monitor::{ConnectionError, ConnectionHandle, ConnectionRef, RawState, ServiceLocator};

/// Timing knobs for [`TcpChannel`].
#[derive(Clone, Copy, Debug)]
pub struct TcpChannelConfig {
    /// Upper bound for one connect attempt.
    pub connect_timeout: Duration,
    /// Pause between a failure and the next connect attempt.
    pub reconnect_delay: Duration,
}

impl Default for TcpChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(2),
        }
    }
}

/// Connectivity channel for a single TCP endpoint.
pub struct TcpChannel {
    addr: String,
    cfg: TcpChannelConfig,
    state: Arc<watch::Sender<RawState>>,
    started: AtomicBool,
    token: CancellationToken,
}

impl TcpChannel {
    /// Creates an idle channel for `addr` (`host:port`).
    pub fn new(addr: impl Into<String>, cfg: TcpChannelConfig) -> Self {
        let (tx, _rx) = watch::channel(RawState::Idle);
        Self {
            addr: addr.into(),
            cfg,
            state: Arc::new(tx),
            started: AtomicBool::new(false),
            token: CancellationToken::new(),
        }
    }

    /// Endpoint address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn ensure_driver(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tokio::spawn(drive(
            self.addr.clone(),
            self.cfg,
            Arc::clone(&self.state),
            self.token.clone(),
        ));
    }
}

impl Drop for TcpChannel {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[async_trait]
impl ConnectionHandle for TcpChannel {
    fn get_state(&self, try_to_connect: bool) -> RawState {
        if try_to_connect {
            self.ensure_driver();
        }
        *self.state.borrow()
    }

    async fn watch(
        &self,
        last: RawState,
        deadline: Option<Instant>,
    ) -> Result<RawState, ConnectionError> {
        let mut rx = self.state.subscribe();
        let changed = async {
            rx.wait_for(|s| *s != last)
                .await
                .map(|s| *s)
                .map_err(|_| ConnectionError::Watch {
                    reason: "channel closed".to_string(),
                })
        };
        match deadline {
            None => changed.await,
            Some(at) => match time::timeout_at(at, changed).await {
                Ok(res) => res,
                Err(_elapsed) => Err(ConnectionError::DeadlineExceeded),
            },
        }
    }
}

/// Connect / hold / reconnect loop for one endpoint.
async fn drive(
    addr: String,
    cfg: TcpChannelConfig,
    state: Arc<watch::Sender<RawState>>,
    token: CancellationToken,
) {
    loop {
        state.send_replace(RawState::Connecting);

        let connect = time::timeout(cfg.connect_timeout, TcpStream::connect(&addr));
        let res = tokio::select! {
            _ = token.cancelled() => return,
            res = connect => res,
        };

        match res {
            Ok(Ok(mut stream)) => {
                state.send_replace(RawState::Ready);
                let mut buf = [0u8; 256];
                loop {
                    tokio::select! {
                        _ = token.cancelled() => return,
                        read = stream.read(&mut buf) => match read {
                            Ok(0) | Err(_) => break,
                            Ok(_) => continue,
                        },
                    }
                }
                tracing::debug!(%addr, "connection closed by peer");
            }
            Ok(Err(e)) => tracing::debug!(%addr, err = %e, "connect failed"),
            Err(_elapsed) => tracing::debug!(%addr, "connect timed out"),
        }

        state.send_replace(RawState::TransientFailure);
        tokio::select! {
            _ = token.cancelled() => return,
            _ = time::sleep(cfg.reconnect_delay) => {}
        }
    }
}

/// Resolves services from a fixed name → address table.
pub struct StaticLocator {
    addresses: HashMap<String, String>,
    cfg: TcpChannelConfig,
    channels: Mutex<HashMap<String, Weak<TcpChannel>>>,
}

impl StaticLocator {
    /// Creates a locator over `addresses` (service name → `host:port`).
    pub fn new(addresses: HashMap<String, String>, cfg: TcpChannelConfig) -> Self {
        Self {
            addresses,
            cfg,
            channels: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ServiceLocator for StaticLocator {
    async fn acquire(&self, service: &str) -> Result<ConnectionRef, ConnectionError> {
        let addr = self
            .addresses
            .get(service)
            .ok_or_else(|| ConnectionError::NotRegistered {
                service: service.to_string(),
            })?;

        let mut channels = self.channels.lock().await;
        if let Some(live) = channels.get(service).and_then(Weak::upgrade) {
            let live: ConnectionRef = live;
            return Ok(live);
        }
        let channel = Arc::new(TcpChannel::new(addr.clone(), self.cfg));
        channels.insert(service.to_string(), Arc::downgrade(&channel));
        let channel: ConnectionRef = channel;
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn fast() -> TcpChannelConfig {
        TcpChannelConfig {
            connect_timeout: Duration::from_millis(500),
            reconnect_delay: Duration::from_millis(50),
        }
    }

    #[tokio::test]
    async fn becomes_ready_when_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let _accept = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            time::sleep(Duration::from_secs(5)).await;
            drop(sock);
        });

        let channel = TcpChannel::new(addr, fast());
        assert_eq!(channel.get_state(false), RawState::Idle);

        let mut state = channel.get_state(true);
        let deadline = Instant::now() + Duration::from_secs(2);
        while state != RawState::Ready {
            state = channel.watch(state, Some(deadline)).await.unwrap();
        }
        assert_eq!(state.availability(), crate::monitor::AvailabilityState::Up);
    }

    #[tokio::test]
    async fn reports_transient_failure_when_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let channel = TcpChannel::new(addr, fast());
        let mut state = channel.get_state(true);
        let deadline = Instant::now() + Duration::from_secs(2);
        while state != RawState::TransientFailure {
            state = channel.watch(state, Some(deadline)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn watch_honours_deadline() {
        let channel = TcpChannel::new("127.0.0.1:9", fast());
        let res = channel
            .watch(RawState::Idle, Some(Instant::now() + Duration::from_millis(20)))
            .await;
        assert!(matches!(res, Err(ConnectionError::DeadlineExceeded)));
    }

    #[tokio::test]
    async fn locator_rejects_unknown_and_shares_live_channels() {
        let mut table = HashMap::new();
        table.insert("video-catalog".to_string(), "127.0.0.1:9".to_string());
        let locator = StaticLocator::new(table, fast());

        assert!(matches!(
            locator.acquire("ratings").await,
            Err(ConnectionError::NotRegistered { .. })
        ));
        let a = locator.acquire("video-catalog").await.unwrap();
        let b = locator.acquire("video-catalog").await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let released = Arc::downgrade(&a);
        drop((a, b));
        assert!(released.upgrade().is_none());
        let c = locator.acquire("video-catalog").await.unwrap();
        assert_eq!(c.get_state(false), RawState::Idle);
    }

    #[tokio::test]
    async fn stopped_monitor_stops_reconnecting() {
        use crate::events::Bus;
        use crate::monitor::AvailabilityMonitor;
        use std::sync::atomic::AtomicUsize;

        // Peer hangs up right away, so the channel reconnects every 50ms.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let accepted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&accepted);
        tokio::spawn(async move {
            while let Ok((sock, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(sock);
            }
        });

        let mut table = HashMap::new();
        table.insert("video-catalog".to_string(), addr);
        let monitor = AvailabilityMonitor::new(
            "video-catalog",
            Arc::new(StaticLocator::new(table, fast())),
            Duration::from_millis(50),
            Bus::new(64),
        );
        let mut transitions = monitor.start().unwrap();
        tokio::spawn(async move {
            while let Some(t) = transitions.recv().await {
                t.ack();
            }
        });

        time::sleep(Duration::from_millis(300)).await;
        assert!(accepted.load(Ordering::SeqCst) > 1);

        monitor.stop().unwrap().await.unwrap();
        time::sleep(Duration::from_millis(100)).await;
        let at_stop = accepted.load(Ordering::SeqCst);
        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(accepted.load(Ordering::SeqCst), at_stop);
    }
}
