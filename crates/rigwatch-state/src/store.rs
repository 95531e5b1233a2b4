//! StateStore — redb-backed persistence for the gateway.
//!
//! Typed operations over tours, trips, events, movement plans, outlet
//! associations, temperature samples and the seen-device log. Values are
//! JSON-serialized into redb's `&[u8]` value columns. Both on-disk and
//! in-memory backends are supported (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use rigwatch_core::{
    MovementPlan, PhotoTour, PhotoTourEvent, PhotoTourTrip, SeenDevice, SwitchAssociation,
    TemperatureSample, TourId,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::keys::*;
use crate::tables::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        for table in [
            TOURS,
            TRIPS,
            EVENTS,
            MOVEMENT_PLANS,
            SWITCH_ASSOCIATIONS,
            CONFIG,
            TEMPERATURES,
            COUNTERS,
        ] {
            txn.open_table(table).map_err(map_err!(Table))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Generic row access ─────────────────────────────────────────

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let value = serde_json::to_vec(value).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    /// All rows whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range(prefix..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(prefix) {
                break;
            }
            let row = serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(row);
        }
        Ok(results)
    }

    /// The row with the greatest key in `start..end`.
    fn last_in<T: DeserializeOwned>(
        &self,
        table: Table,
        start: &str,
        end: &str,
    ) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut range = table.range(start..end).map_err(map_err!(Read))?;
        match range.next_back() {
            Some(entry) => {
                let (_, value) = entry.map_err(map_err!(Read))?;
                let row = serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    // ── Counters ───────────────────────────────────────────────────

    /// Allocate the next id of a named counter. Ids start at 1.
    pub fn next_id(&self, counter: &str) -> StateResult<u64> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let next;
        {
            let mut table = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            let current: u64 = match table.get(counter).map_err(map_err!(Read))? {
                Some(guard) => serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?,
                None => 0,
            };
            next = current + 1;
            let value = serde_json::to_vec(&next).map_err(map_err!(Codec))?;
            table
                .insert(counter, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(next)
    }

    // ── Tours ──────────────────────────────────────────────────────

    /// Insert or update a tour.
    pub fn put_tour(&self, tour: &PhotoTour) -> StateResult<()> {
        self.put(TOURS, &tour_key(tour.id), tour)?;
        debug!(tour_id = tour.id, finished = tour.finished, "tour stored");
        Ok(())
    }

    pub fn get_tour(&self, tour_id: TourId) -> StateResult<Option<PhotoTour>> {
        self.get(TOURS, &tour_key(tour_id))
    }

    /// All tours ordered by id.
    pub fn list_tours(&self) -> StateResult<Vec<PhotoTour>> {
        self.scan(TOURS, "")
    }

    // ── Trips ──────────────────────────────────────────────────────

    pub fn put_trip(&self, trip: &PhotoTourTrip) -> StateResult<()> {
        self.put(TRIPS, &child_key(trip.tour_id, trip.id), trip)?;
        debug!(tour_id = trip.tour_id, trip_id = trip.id, empty = trip.is_empty(), "trip stored");
        Ok(())
    }

    /// Trips of a tour, oldest first.
    pub fn list_trips(&self, tour_id: TourId) -> StateResult<Vec<PhotoTourTrip>> {
        self.scan(TRIPS, &child_prefix(tour_id))
    }

    /// The most recent trip of a tour.
    pub fn last_trip(&self, tour_id: TourId) -> StateResult<Option<PhotoTourTrip>> {
        self.last_in(TRIPS, &child_prefix(tour_id), &child_prefix_end(tour_id))
    }

    // ── Events ─────────────────────────────────────────────────────

    pub fn append_event(&self, event: &PhotoTourEvent) -> StateResult<()> {
        let seq = self.next_id(EVENT_COUNTER)?;
        self.put(EVENTS, &child_key(event.tour_id, seq), event)
    }

    /// Events of a tour in the order they were appended.
    pub fn list_events(&self, tour_id: TourId) -> StateResult<Vec<PhotoTourEvent>> {
        self.scan(EVENTS, &child_prefix(tour_id))
    }

    // ── Movement plans ─────────────────────────────────────────────

    pub fn put_movement_plan(&self, plan: &MovementPlan) -> StateResult<()> {
        self.put(MOVEMENT_PLANS, &plan.device_id, plan)?;
        debug!(device_id = %plan.device_id, points = plan.points.len(), "movement plan stored");
        Ok(())
    }

    pub fn get_movement_plan(&self, device_id: &str) -> StateResult<Option<MovementPlan>> {
        self.get(MOVEMENT_PLANS, device_id)
    }

    pub fn delete_movement_plan(&self, device_id: &str) -> StateResult<bool> {
        self.delete(MOVEMENT_PLANS, device_id)
    }

    // ── Outlet associations ────────────────────────────────────────

    pub fn put_switch_association(&self, association: &SwitchAssociation) -> StateResult<()> {
        self.put(SWITCH_ASSOCIATIONS, &association.device_id, association)
    }

    pub fn get_switch_association(&self, device_id: &str) -> StateResult<Option<SwitchAssociation>> {
        self.get(SWITCH_ASSOCIATIONS, device_id)
    }

    pub fn list_switch_associations(&self) -> StateResult<Vec<SwitchAssociation>> {
        self.scan(SWITCH_ASSOCIATIONS, "")
    }

    pub fn delete_switch_association(&self, device_id: &str) -> StateResult<bool> {
        self.delete(SWITCH_ASSOCIATIONS, device_id)
    }

    // ── Seen devices ───────────────────────────────────────────────

    /// The persisted "all devices ever seen" list. Empty if never written.
    pub fn load_seen_devices(&self) -> StateResult<Vec<SeenDevice>> {
        Ok(self.get(CONFIG, ALL_SEEN_DEVICES)?.unwrap_or_default())
    }

    pub fn save_seen_devices(&self, devices: &[SeenDevice]) -> StateResult<()> {
        self.put(CONFIG, ALL_SEEN_DEVICES, &devices)
    }

    // ── Temperatures ───────────────────────────────────────────────

    pub fn append_temperature(&self, sample: &TemperatureSample) -> StateResult<()> {
        let seq = self.next_id(TEMPERATURE_COUNTER)?;
        self.put(TEMPERATURES, &child_key(sample.tour_id, seq), sample)
    }

    pub fn list_temperatures(&self, tour_id: TourId) -> StateResult<Vec<TemperatureSample>> {
        self.scan(TEMPERATURES, &child_prefix(tour_id))
    }
}
