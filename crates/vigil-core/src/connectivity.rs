//! Connectivity observer
//!
//! The latest known reachability lives in a `watch` channel. Readers take a synchronous
//! snapshot with [`ConnectivityObserver::is_online`] when deciding between the online and
//! offline paths; a probe task (or the host platform) publishes transitions through
//! [`ConnectivityHandle`]. A transition in the middle of an attempt is not applied
//! retroactively: that attempt simply lands on the transport-error path.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};

/// Create a connected handle/observer pair
pub fn channel(initially_online: bool) -> (ConnectivityHandle, ConnectivityObserver) {
    let (tx, rx) = watch::channel(initially_online);
    (
        ConnectivityHandle { tx: Arc::new(tx) },
        ConnectivityObserver { rx },
    )
}

/// Read side of the connectivity signal
#[derive(Clone, Debug)]
pub struct ConnectivityObserver {
    rx: watch::Receiver<bool>,
}

impl ConnectivityObserver {
    /// Observer pinned to a fixed state (CLI `--offline`, tests)
    pub fn fixed(online: bool) -> Self {
        let (_handle, observer) = channel(online);
        observer
    }

    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Treat the current state as seen, so `changed` only reports later transitions
    pub fn mark_seen(&mut self) {
        self.rx.borrow_and_update();
    }

    /// Wait for the next transition. `None` once the publisher is gone.
    pub async fn changed(&mut self) -> Option<bool> {
        self.rx.changed().await.ok()?;
        Some(*self.rx.borrow_and_update())
    }
}

/// Write side of the connectivity signal
#[derive(Clone, Debug)]
pub struct ConnectivityHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityHandle {
    /// Publish the current state; observers are only woken on an actual change
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        });
        if changed {
            log::info!("Connectivity changed: {}", if online { "online" } else { "offline" });
        }
    }

    pub fn subscribe(&self) -> ConnectivityObserver {
        ConnectivityObserver {
            rx: self.tx.subscribe(),
        }
    }
}

/// Something that can tell whether the backend is reachable right now
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn check(&self) -> bool;
}

/// Reachability by opening a TCP connection to the backend host
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Probe the host and port a server URL points at
    pub fn from_url(url: &str, timeout: Duration) -> Result<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| Error::config(format!("Invalid server URL '{}': {}", url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::config(format!("Server URL has no host: {}", url)))?;
        let port = parsed
            .port_or_known_default()
            .ok_or_else(|| Error::config(format!("Server URL has no port: {}", url)))?;
        Ok(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn check(&self) -> bool {
        let connect = TcpStream::connect((self.host.as_str(), self.port));
        matches!(tokio::time::timeout(self.timeout, connect).await, Ok(Ok(_)))
    }
}

/// Run `probe` every `interval` and publish the result. Exits once every observer is gone.
pub fn spawn_probe(
    handle: ConnectivityHandle,
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let online = probe.check().await;
            handle.set_online(online);

            if handle.tx.is_closed() {
                log::debug!("No connectivity observers left, stopping probe");
                break;
            }
            tokio::time::sleep(interval).await;
        }
    })
}
