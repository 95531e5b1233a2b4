//! Offline store maintenance. The gateway holds the database open, so these
//! run while it is stopped.

use std::path::Path;

use anyhow::{Context, bail};
use rigwatch_core::{MovementPlan, OutletCodes, SwitchAssociation, TourId};
use rigwatch_state::{EventLog, StateStore};

pub const DB_FILE: &str = "rigwatch.redb";

pub fn open_store(data_dir: &Path) -> anyhow::Result<StateStore> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let path = data_dir.join(DB_FILE);
    StateStore::open(&path).with_context(|| format!("opening {}", path.display()))
}

/// Read a movement plan from JSON and store it under its device.
pub fn import_plan(store: &StateStore, file: &Path) -> anyhow::Result<MovementPlan> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("reading {}", file.display()))?;
    let plan: MovementPlan =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", file.display()))?;
    if plan.points.is_empty() {
        bail!("movement plan '{}' has no points", plan.name);
    }
    store.put_movement_plan(&plan)?;
    Ok(plan)
}

pub fn set_outlet(store: &StateStore, device_id: &str, on_code: i64, off_code: i64) -> anyhow::Result<()> {
    store.put_switch_association(&SwitchAssociation {
        device_id: device_id.to_string(),
        outlet: OutletCodes { on_code, off_code },
    })?;
    Ok(())
}

/// Outlet wiring, with the last known name of each device.
pub fn outlet_lines(store: &StateStore) -> anyhow::Result<Vec<String>> {
    let seen = store.load_seen_devices()?;
    Ok(store
        .list_switch_associations()?
        .into_iter()
        .map(|a| {
            let name = seen
                .iter()
                .find(|d| d.id == a.device_id)
                .map_or("never seen", |d| d.name.as_str());
            format!(
                "{:<16} on {:<8} off {:<8} ({name})",
                a.device_id, a.outlet.on_code, a.outlet.off_code
            )
        })
        .collect())
}

pub fn tour_lines(store: &StateStore) -> anyhow::Result<Vec<String>> {
    store
        .list_tours()?
        .into_iter()
        .map(|tour| {
            let trips = store.list_trips(tour.id)?.len();
            let state = if tour.finished { "stopped" } else { "running" };
            Ok(format!(
                "{:>4}  {:<8} {:<16} every {} min, {trips} trips  {}",
                tour.id, state, tour.device_id, tour.interval_minutes, tour.name
            ))
        })
        .collect()
}

pub fn event_lines(store: &StateStore, tour_id: TourId, all: bool) -> anyhow::Result<Vec<String>> {
    let events = EventLog::new(store.clone()).events(tour_id, all)?;
    Ok(events
        .into_iter()
        .map(|e| format!("{} {:<11} {}", e.timestamp, e.severity, e.message))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rigwatch_core::{EventSeverity, PhotoTour};

    #[test]
    fn plan_import_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("data")).unwrap();
        let file = dir.path().join("plan.json");
        std::fs::write(
            &file,
            r#"{"device_id":"rig-1","name":"row","points":[
                {"step_offset":100,"focus_cm":120.0,"speed":100},
                {"step_offset":-40,"focus_cm":90.5,"speed":80,"comment":"edge"}]}"#,
        )
        .unwrap();

        let plan = import_plan(&store, &file).unwrap();
        assert_eq!(plan.targets(), vec![100, 60]);
        assert_eq!(store.get_movement_plan("rig-1").unwrap(), Some(plan));
    }

    #[test]
    fn empty_plan_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open_in_memory().unwrap();
        let file = dir.path().join("plan.json");
        std::fs::write(&file, r#"{"device_id":"rig-1","name":"none","points":[]}"#).unwrap();
        assert!(import_plan(&store, &file).is_err());
        assert_eq!(store.get_movement_plan("rig-1").unwrap(), None);
    }

    #[test]
    fn outlet_and_listings() {
        let store = StateStore::open_in_memory().unwrap();
        set_outlet(&store, "rig-1", 1361, 1364).unwrap();
        assert_eq!(
            store.get_switch_association("rig-1").unwrap().unwrap().outlet,
            OutletCodes {
                on_code: 1361,
                off_code: 1364
            }
        );

        store
            .put_tour(&PhotoTour {
                id: 7,
                device_id: "rig-1".to_string(),
                name: "north field".to_string(),
                comment: String::new(),
                interval_minutes: 30.0,
                finished: false,
                uses_ir: true,
                created_at: 0,
            })
            .unwrap();
        let events = EventLog::new(store.clone());
        events.debug(7, "first vis image received");
        events.log(7, EventSeverity::Warning, "preview failed");

        let outlets = outlet_lines(&store).unwrap();
        assert_eq!(outlets.len(), 1);
        assert!(outlets[0].contains("never seen"));

        let tours = tour_lines(&store).unwrap();
        assert_eq!(tours.len(), 1);
        assert!(tours[0].contains("running"));
        assert!(tours[0].contains("north field"));

        assert_eq!(event_lines(&store, 7, false).unwrap().len(), 1);
        assert_eq!(event_lines(&store, 7, true).unwrap().len(), 2);
    }
}
