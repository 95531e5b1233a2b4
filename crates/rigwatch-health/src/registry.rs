//! Health registry — the single current view of the fleet.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rigwatch_core::{Capability, DeviceHealthState, SeenDevice};
use rigwatch_state::{StateResult, StateStore};
use tokio::sync::watch;
use tracing::{debug, error, info};

pub type Snapshot = Arc<Vec<DeviceHealthState>>;

/// Current device health plus the durable log of every device ever seen.
pub struct HealthRegistry {
    snapshot: watch::Sender<Snapshot>,
    seen: Mutex<Vec<SeenDevice>>,
    /// Device ids removed since the poller last looked.
    evicted: Mutex<HashSet<String>>,
    store: StateStore,
}

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HealthRegistry {
    /// Create an empty registry, restoring the seen-device log from `store`.
    pub fn new(store: StateStore) -> StateResult<Self> {
        let seen = store.load_seen_devices()?;
        debug!(seen = seen.len(), "seen-device log restored");
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Ok(Self {
            snapshot,
            seen: Mutex::new(seen),
            evicted: Mutex::new(HashSet::new()),
            store,
        })
    }

    /// Replace the snapshot with `batch`.
    pub fn publish(&self, batch: Vec<DeviceHealthState>) {
        self.snapshot.send_replace(Arc::new(batch));
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    /// Receive every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot.subscribe()
    }

    /// Current entry of a device, by device id.
    pub fn find(&self, device_id: &str) -> Option<DeviceHealthState> {
        self.snapshot
            .borrow()
            .iter()
            .find(|d| d.health.device_id == device_id)
            .cloned()
    }

    /// Healthy entries able to switch outlets, except `excluding`.
    pub fn outlet_switchers(&self, excluding: &str) -> Vec<DeviceHealthState> {
        self.snapshot
            .borrow()
            .iter()
            .filter(|d| {
                d.retry_count == 0
                    && d.health.device_id != excluding
                    && d.health.has(Capability::CanSwitchOutlets)
            })
            .cloned()
            .collect()
    }

    /// Upsert a freshly polled device into the seen-device log.
    ///
    /// Ignored for entries with failed polls pending, so degraded data never
    /// overwrites the last good record.
    pub fn record_seen(&self, state: &DeviceHealthState) {
        if state.retry_count != 0 || !state.is_identified() {
            return;
        }
        let entry = SeenDevice {
            id: state.health.device_id.clone(),
            name: state.health.device_name.clone(),
            last_ip: state.ip.clone(),
            last_health: state.health.capabilities,
        };
        let mut seen = locked(&self.seen);
        match seen.iter_mut().find(|s| s.id == entry.id) {
            Some(existing) if *existing == entry => return,
            Some(existing) => *existing = entry,
            None => {
                info!(device_id = %entry.id, ip = %entry.last_ip, "new device seen");
                seen.push(entry);
            }
        }
        if let Err(e) = self.store.save_seen_devices(&seen) {
            error!(error = %e, "failed to persist seen-device log");
        }
    }

    pub fn seen_devices(&self) -> Vec<SeenDevice> {
        locked(&self.seen).clone()
    }

    /// Drop a device from the snapshot and mark it for eviction from the poller.
    pub fn remove(&self, device_id: &str) -> bool {
        let mut removed = false;
        self.snapshot.send_if_modified(|current| {
            if !current.iter().any(|d| d.health.device_id == device_id) {
                return false;
            }
            let remaining = current
                .iter()
                .filter(|d| d.health.device_id != device_id)
                .cloned()
                .collect();
            *current = Arc::new(remaining);
            removed = true;
            true
        });
        locked(&self.evicted).insert(device_id.to_string());
        info!(%device_id, removed, "device removed from registry");
        removed
    }

    /// Device ids removed since the last call.
    pub fn take_evictions(&self) -> HashSet<String> {
        std::mem::take(&mut *locked(&self.evicted))
    }
}
