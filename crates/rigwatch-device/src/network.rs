//! Network reachability checks used for discovery and eviction.

use std::net::{Ipv4Addr, SocketAddr};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

#[async_trait]
pub trait Reachability: Send + Sync {
    /// ICMP echo with up to `retries` attempts.
    async fn ping(&self, ip: Ipv4Addr, retries: u32) -> bool;

    /// Whether a TCP connection to `ip:port` can be opened.
    async fn port_open(&self, ip: Ipv4Addr, port: u16) -> bool;
}

/// [`Reachability`] using the system `ping` binary and plain TCP connects.
#[derive(Debug, Clone)]
pub struct SystemReachability {
    connect_timeout: Duration,
    retry_delay: Duration,
}

impl SystemReachability {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            retry_delay: Duration::from_millis(100),
        }
    }
}

#[async_trait]
impl Reachability for SystemReachability {
    async fn ping(&self, ip: Ipv4Addr, retries: u32) -> bool {
        for attempt in 0..retries.max(1) {
            let status = Command::new("ping")
                .args(["-c", "1", "-W", "1"])
                .arg(ip.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await;
            match status {
                Ok(s) if s.success() => return true,
                Ok(_) => {}
                Err(e) => {
                    debug!(%ip, error = %e, "ping could not be executed");
                    return false;
                }
            }
            if attempt + 1 < retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    async fn port_open(&self, ip: Ipv4Addr, port: u16) -> bool {
        let addr = SocketAddr::from((ip, port));
        matches!(
            timeout(self.connect_timeout, TcpStream::connect(addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Every address from `from` to `to`, inclusive. Empty if `from > to`.
pub fn ip_range(from: Ipv4Addr, to: Ipv4Addr) -> Vec<Ipv4Addr> {
    (u32::from(from)..=u32::from(to))
        .map(Ipv4Addr::from)
        .collect()
}
