//! Device prober — periodic discovery scan of the configured address range.

use std::net::Ipv4Addr;
use std::sync::Arc;

use rigwatch_core::{BusyFlag, NetworkSettings};
use rigwatch_device::{Reachability, ip_range};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::poller::HealthPoller;

pub struct DeviceProber {
    reach: Arc<dyn Reachability>,
    settings: NetworkSettings,
    scanning: BusyFlag,
}

impl DeviceProber {
    pub fn new(reach: Arc<dyn Reachability>, settings: NetworkSettings) -> Self {
        Self {
            reach,
            settings,
            scanning: BusyFlag::new(),
        }
    }

    /// Scan the range once. Returns `None` if a scan is already running.
    ///
    /// An address qualifies when it answers ping and accepts a TCP
    /// connection on the management port.
    pub async fn probe_once(&self) -> Option<Vec<Ipv4Addr>> {
        let Some(_guard) = self.scanning.try_acquire() else {
            debug!("probe already running, skipping");
            return None;
        };

        let mut scans = JoinSet::new();
        for ip in ip_range(self.settings.scan_from, self.settings.scan_to) {
            let reach = self.reach.clone();
            let retries = self.settings.ping_retries;
            let port = self.settings.management_port;
            scans.spawn(async move {
                let open = reach.ping(ip, retries).await && reach.port_open(ip, port).await;
                (ip, open)
            });
        }

        let mut found = Vec::new();
        while let Some(result) = scans.join_next().await {
            match result {
                Ok((ip, true)) => found.push(ip),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "probe task failed"),
            }
        }
        found.sort();
        debug!(found = found.len(), "probe finished");
        Some(found)
    }

    /// Scan every `probe_interval` and hand the results to the poller.
    pub async fn run(self: Arc<Self>, poller: Arc<HealthPoller>, mut shutdown: watch::Receiver<bool>) {
        info!(
            from = %self.settings.scan_from,
            to = %self.settings.scan_to,
            "device prober starting"
        );
        loop {
            if let Some(found) = self.probe_once().await {
                poller.add_candidates(&found).await;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.probe_interval) => {}
                _ = shutdown.changed() => {
                    debug!("device prober shutting down");
                    break;
                }
            }
        }
    }
}
