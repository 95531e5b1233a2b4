//! Health poller — periodic health query of every known address.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

use rigwatch_core::{BusyFlag, DeviceHealthState, HealthSettings};
use rigwatch_device::{DeviceApi, Reachability};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::registry::HealthRegistry;

/// Pings made before an address that stopped answering is dropped.
pub const EVICTION_PING_RETRIES: u32 = 5;

pub struct HealthPoller {
    registry: Arc<HealthRegistry>,
    api: Arc<dyn DeviceApi>,
    reach: Arc<dyn Reachability>,
    settings: HealthSettings,
    /// Known devices keyed by ip.
    devices: Mutex<BTreeMap<String, DeviceHealthState>>,
    polling: BusyFlag,
}

enum PollOutcome {
    Healthy(DeviceHealthState),
    Degraded(DeviceHealthState),
    Gone(String),
}

impl HealthPoller {
    pub fn new(
        registry: Arc<HealthRegistry>,
        api: Arc<dyn DeviceApi>,
        reach: Arc<dyn Reachability>,
        settings: HealthSettings,
    ) -> Self {
        Self {
            registry,
            api,
            reach,
            settings,
            devices: Mutex::new(BTreeMap::new()),
            polling: BusyFlag::new(),
        }
    }

    /// Start tracking addresses found by the prober. Known ones are left alone.
    pub async fn add_candidates(&self, ips: &[Ipv4Addr]) {
        let mut devices = self.devices.lock().await;
        for ip in ips {
            let ip = ip.to_string();
            if !devices.contains_key(&ip) {
                debug!(%ip, "new candidate address");
                devices.insert(ip.clone(), DeviceHealthState::discovered(&ip));
            }
        }
    }

    /// Poll every known address once and publish the result.
    ///
    /// Returns `false` if a poll cycle is already running.
    pub async fn poll_once(&self) -> bool {
        let Some(_guard) = self.polling.try_acquire() else {
            debug!("health poll already running, skipping");
            return false;
        };

        let known: Vec<DeviceHealthState> = {
            let mut devices = self.devices.lock().await;
            let evicted = self.registry.take_evictions();
            if !evicted.is_empty() {
                devices.retain(|_, d| !evicted.contains(&d.health.device_id));
            }
            devices.values().cloned().collect()
        };

        let mut polls = JoinSet::new();
        for state in known {
            let api = self.api.clone();
            let reach = self.reach.clone();
            let threshold = self.settings.eviction_threshold;
            polls.spawn(async move { poll_device(state, api.as_ref(), reach.as_ref(), threshold).await });
        }

        let mut outcomes = Vec::new();
        while let Some(result) = polls.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!(error = %e, "health poll task failed"),
            }
        }

        let batch = {
            let mut devices = self.devices.lock().await;
            for outcome in outcomes {
                match outcome {
                    PollOutcome::Healthy(state) => {
                        self.registry.record_seen(&state);
                        devices.insert(state.ip.clone(), state);
                    }
                    PollOutcome::Degraded(state) => {
                        devices.insert(state.ip.clone(), state);
                    }
                    PollOutcome::Gone(ip) => {
                        devices.remove(&ip);
                    }
                }
            }
            devices.values().cloned().collect::<Vec<_>>()
        };
        debug!(devices = batch.len(), "health snapshot published");
        self.registry.publish(batch);
        true
    }

    /// Poll every `poll_interval` until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(interval = ?self.settings.poll_interval, "health poller starting");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.settings.poll_interval) => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => {
                    debug!("health poller shutting down");
                    break;
                }
            }
        }
    }
}

async fn poll_device(
    mut state: DeviceHealthState,
    api: &dyn DeviceApi,
    reach: &dyn Reachability,
    threshold: u32,
) -> PollOutcome {
    match api.health(&state.ip).await {
        Ok(health) => {
            if state.retry_count > 0 {
                info!(ip = %state.ip, device_id = %health.device_id, "device answering again");
            }
            state.health = health;
            state.retry_count = 0;
            PollOutcome::Healthy(state)
        }
        Err(e) => {
            state.retry_count += 1;
            debug!(ip = %state.ip, retries = state.retry_count, error = %e, "health query failed");
            if state.retry_count < threshold {
                return PollOutcome::Degraded(state);
            }
            let reachable = match state.ip.parse::<Ipv4Addr>() {
                Ok(ip) => reach.ping(ip, EVICTION_PING_RETRIES).await,
                Err(_) => false,
            };
            if reachable {
                PollOutcome::Degraded(state)
            } else {
                info!(
                    ip = %state.ip,
                    device_id = %state.health.device_id,
                    "device unreachable, evicting"
                );
                PollOutcome::Gone(state.ip)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rigwatch_core::{CameraKind, CapabilitySet, DeviceHealth, MotorState, MoveCommand};
    use rigwatch_device::{DeviceError, DeviceResult};
    use rigwatch_state::StateStore;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct FakeDevices {
        healthy: StdMutex<HashMap<String, DeviceHealth>>,
    }

    impl FakeDevices {
        fn answer(&self, ip: &str, id: &str, bits: u32) {
            self.healthy.lock().unwrap().insert(
                ip.to_string(),
                DeviceHealth {
                    device_id: id.to_string(),
                    device_name: id.to_string(),
                    capabilities: CapabilitySet::from_bits(bits),
                },
            );
        }

        fn silence(&self, ip: &str) {
            self.healthy.lock().unwrap().remove(ip);
        }
    }

    fn unreachable() -> DeviceError {
        DeviceError::Connect {
            address: "fake".to_string(),
            reason: "unreachable".to_string(),
        }
    }

    #[async_trait]
    impl DeviceApi for FakeDevices {
        async fn health(&self, ip: &str) -> DeviceResult<DeviceHealth> {
            self.healthy.lock().unwrap().get(ip).cloned().ok_or_else(unreachable)
        }
        async fn switch_outlet(&self, _ip: &str, _code: i64) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn motor_position(&self, _ip: &str) -> DeviceResult<MotorState> {
            Err(unreachable())
        }
        async fn move_motor(&self, _ip: &str, _command: MoveCommand) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn toggle_engage(&self, _ip: &str, _engage: bool) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn reset_history(&self, _ip: &str) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn preview_image(&self, _ip: &str, _camera: CameraKind) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn kill_camera(&self, _ip: &str, _camera: CameraKind) -> DeviceResult<()> {
            Err(unreachable())
        }
        async fn run_ffc(&self, _ip: &str) -> DeviceResult<()> {
            Err(unreachable())
        }
    }

    #[derive(Default)]
    struct FakePing {
        alive: StdMutex<HashSet<Ipv4Addr>>,
        pings: AtomicU32,
    }

    #[async_trait]
    impl Reachability for FakePing {
        async fn ping(&self, ip: Ipv4Addr, _retries: u32) -> bool {
            self.pings.fetch_add(1, Ordering::SeqCst);
            self.alive.lock().unwrap().contains(&ip)
        }
        async fn port_open(&self, _ip: Ipv4Addr, _port: u16) -> bool {
            true
        }
    }

    struct Fixture {
        registry: Arc<HealthRegistry>,
        devices: Arc<FakeDevices>,
        ping: Arc<FakePing>,
        poller: HealthPoller,
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(HealthRegistry::new(StateStore::open_in_memory().unwrap()).unwrap());
        let devices = Arc::new(FakeDevices::default());
        let ping = Arc::new(FakePing::default());
        let poller = HealthPoller::new(
            registry.clone(),
            devices.clone(),
            ping.clone(),
            HealthSettings::default(),
        );
        Fixture {
            registry,
            devices,
            ping,
            poller,
        }
    }

    fn ip(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[tokio::test]
    async fn success_publishes_fresh_health() {
        let f = fixture();
        f.devices.answer("10.0.0.1", "rig-1", 5);
        f.poller.add_candidates(&[ip(1)]).await;

        assert!(f.poller.poll_once().await);
        let entry = f.registry.find("rig-1").unwrap();
        assert_eq!(entry.retry_count, 0);
        assert_eq!(entry.ip, "10.0.0.1");
        assert_eq!(f.registry.seen_devices().len(), 1);
    }

    #[tokio::test]
    async fn failures_keep_stale_health_until_threshold() {
        let f = fixture();
        f.devices.answer("10.0.0.1", "rig-1", 5);
        f.poller.add_candidates(&[ip(1)]).await;
        f.poller.poll_once().await;

        f.devices.silence("10.0.0.1");
        for expected in 1..5 {
            f.poller.poll_once().await;
            let entry = f.registry.find("rig-1").unwrap();
            assert_eq!(entry.retry_count, expected);
            assert_eq!(entry.health.capabilities, CapabilitySet::from_bits(5));
        }
        assert_eq!(f.ping.pings.load(Ordering::SeqCst), 0);

        // Fifth failure: final ping fails, device is gone.
        f.poller.poll_once().await;
        assert_eq!(f.ping.pings.load(Ordering::SeqCst), 1);
        assert!(f.registry.snapshot().is_empty());

        // Rediscovery starts from scratch.
        f.devices.answer("10.0.0.1", "rig-1", 5);
        f.poller.add_candidates(&[ip(1)]).await;
        f.poller.poll_once().await;
        assert_eq!(f.registry.find("rig-1").unwrap().retry_count, 0);
    }

    #[tokio::test]
    async fn pingable_device_is_kept_past_threshold() {
        let f = fixture();
        f.ping.alive.lock().unwrap().insert(ip(2));
        f.poller.add_candidates(&[ip(2)]).await;
        for _ in 0..6 {
            f.poller.poll_once().await;
        }
        let snapshot = f.registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].retry_count, 6);
        assert!(f.registry.seen_devices().is_empty());
    }

    #[tokio::test]
    async fn registry_removal_evicts_poller_entry() {
        let f = fixture();
        f.devices.answer("10.0.0.1", "rig-1", 5);
        f.devices.answer("10.0.0.2", "rig-2", 5);
        f.poller.add_candidates(&[ip(1), ip(2)]).await;
        f.poller.poll_once().await;

        f.registry.remove("rig-1");
        f.poller.poll_once().await;
        assert!(f.registry.find("rig-1").is_none());
        assert!(f.registry.find("rig-2").is_some());

        f.poller.add_candidates(&[ip(1)]).await;
        f.poller.poll_once().await;
        assert!(f.registry.find("rig-1").is_some());
    }

    #[tokio::test]
    async fn candidates_are_not_duplicated() {
        let f = fixture();
        f.devices.answer("10.0.0.1", "rig-1", 5);
        f.poller.add_candidates(&[ip(1), ip(1)]).await;
        f.poller.poll_once().await;
        f.poller.add_candidates(&[ip(1)]).await;
        f.poller.poll_once().await;
        assert_eq!(f.registry.snapshot().len(), 1);
    }
}
