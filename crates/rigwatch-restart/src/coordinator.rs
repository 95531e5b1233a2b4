//! Restart coordinator — decides when and how to power-cycle a device.

use std::collections::HashMap;
use std::sync::Arc;

use rigwatch_core::{DeviceHealthState, OutletCodes, RestartSettings, TourId};
use rigwatch_device::DeviceApi;
use rigwatch_health::HealthRegistry;
use rigwatch_state::{EventLog, StateStore};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// What a restart request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartDecision {
    /// The device was power-cycled recently.
    Cooldown,
    /// Not enough consecutive failures yet.
    NeedsMoreFailures { failures: u32 },
    /// A power cycle for this device is already running.
    InProgress,
    /// No outlet codes are associated with the device.
    NoOutletWiring,
    /// No healthy peer can switch outlets.
    NoSwitchDevices,
    /// OFF and ON codes were sent through `switches` peers.
    PowerCycled { switches: usize },
}

/// Per-device restart state.
#[derive(Debug, Default)]
struct Bookkeeping {
    last_restart: Option<Instant>,
    consecutive_failures: u32,
    in_progress: bool,
}

pub struct RestartCoordinator {
    registry: Arc<HealthRegistry>,
    store: StateStore,
    api: Arc<dyn DeviceApi>,
    events: EventLog,
    settings: RestartSettings,
    bookkeeping: Mutex<HashMap<String, Bookkeeping>>,
}

impl RestartCoordinator {
    pub fn new(
        registry: Arc<HealthRegistry>,
        store: StateStore,
        api: Arc<dyn DeviceApi>,
        events: EventLog,
        settings: RestartSettings,
    ) -> Self {
        Self {
            registry,
            store,
            api,
            events,
            settings,
            bookkeeping: Mutex::new(HashMap::new()),
        }
    }

    /// Count a failure of `device_id` and power-cycle it once the failure
    /// threshold is reached outside the cooldown window.
    pub async fn request_restart(
        &self,
        device_id: &str,
        tour_id: TourId,
        device_name: &str,
    ) -> RestartDecision {
        self.restart(device_id, tour_id, device_name, false).await
    }

    /// Power-cycle `device_id` without waiting for the failure threshold or
    /// the cooldown.
    pub async fn immediate_restart(
        &self,
        device_id: &str,
        tour_id: TourId,
        device_name: &str,
    ) -> RestartDecision {
        self.restart(device_id, tour_id, device_name, true).await
    }

    /// Consecutive failures currently counted for a device.
    pub async fn failure_count(&self, device_id: &str) -> u32 {
        self.bookkeeping
            .lock()
            .await
            .get(device_id)
            .map_or(0, |b| b.consecutive_failures)
    }

    async fn restart(
        &self,
        device_id: &str,
        tour_id: TourId,
        device_name: &str,
        immediate: bool,
    ) -> RestartDecision {
        {
            let mut bookkeeping = self.bookkeeping.lock().await;
            let entry = bookkeeping.entry(device_id.to_string()).or_default();
            if immediate {
                entry.consecutive_failures = self.settings.failure_threshold;
            } else {
                entry.consecutive_failures += 1;
            }
            let failures = entry.consecutive_failures;

            if entry.in_progress {
                debug!(%device_id, "restart already in progress");
                return RestartDecision::InProgress;
            }
            if !immediate
                && let Some(last) = entry.last_restart
                && last.elapsed() < self.settings.cooldown
            {
                self.events.info(
                    tour_id,
                    format!("{device_name}: restart skipped, cooldown after last restart"),
                );
                return RestartDecision::Cooldown;
            }
            if failures < self.settings.failure_threshold {
                self.events.info(
                    tour_id,
                    format!(
                        "{device_name}: restart needs more consecutive failures ({failures}/{})",
                        self.settings.failure_threshold
                    ),
                );
                return RestartDecision::NeedsMoreFailures { failures };
            }
            entry.in_progress = true;
        }

        let decision = self.power_cycle(device_id, tour_id, device_name).await;

        let mut bookkeeping = self.bookkeeping.lock().await;
        let entry = bookkeeping.entry(device_id.to_string()).or_default();
        entry.in_progress = false;
        decision
    }

    async fn power_cycle(&self, device_id: &str, tour_id: TourId, device_name: &str) -> RestartDecision {
        let outlet = match self.store.get_switch_association(device_id) {
            Ok(Some(association)) => association.outlet,
            Ok(None) => {
                self.events.warn(
                    tour_id,
                    format!("{device_name}: no outlet associated, cannot restart"),
                );
                return RestartDecision::NoOutletWiring;
            }
            Err(e) => {
                self.events.error(
                    tour_id,
                    format!("{device_name}: failed to read outlet association: {e}"),
                );
                return RestartDecision::NoOutletWiring;
            }
        };

        let switches = self.registry.outlet_switchers(device_id);
        if switches.is_empty() {
            self.events.warn(
                tour_id,
                format!("{device_name}: no device able to switch outlets, cannot restart"),
            );
            return RestartDecision::NoSwitchDevices;
        }

        self.events.warn(
            tour_id,
            format!(
                "{device_name}: power cycling through {} switch device(s)",
                switches.len()
            ),
        );
        tokio::time::sleep(self.settings.safety_delay).await;

        self.send_code(&switches, outlet, false, tour_id, device_name).await;

        self.registry.remove(device_id);
        {
            let mut bookkeeping = self.bookkeeping.lock().await;
            let entry = bookkeeping.entry(device_id.to_string()).or_default();
            entry.last_restart = Some(Instant::now());
            entry.consecutive_failures = 0;
        }

        self.send_code(&switches, outlet, true, tour_id, device_name).await;

        RestartDecision::PowerCycled {
            switches: switches.len(),
        }
    }

    /// Send one outlet code through every switcher, in order. A failing
    /// switcher is logged and skipped.
    async fn send_code(
        &self,
        switches: &[DeviceHealthState],
        outlet: OutletCodes,
        on: bool,
        tour_id: TourId,
        device_name: &str,
    ) {
        let (code, label) = if on {
            (outlet.on_code, "ON")
        } else {
            (outlet.off_code, "OFF")
        };
        for (i, switch) in switches.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.settings.switch_call_delay).await;
            }
            let via = &switch.health.device_name;
            match self.api.switch_outlet(&switch.ip, code).await {
                Ok(()) => self.events.info(
                    tour_id,
                    format!("{device_name}: sent {label} code {code} via {via}"),
                ),
                Err(e) => self.events.warn(
                    tour_id,
                    format!("{device_name}: sending {label} code {code} via {via} failed: {e}"),
                ),
            }
        }
    }
}
