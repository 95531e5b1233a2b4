mod common;

use common::*;
use rigwatch_core::{CameraKind, CapabilitySet, DeviceHealth, DeviceHealthState, EventSeverity};
use rigwatch_tour::TourError;

fn publish_caps(h: &Harness, bits: u32) {
    h.registry.publish(vec![DeviceHealthState {
        health: DeviceHealth {
            device_id: DEVICE.to_string(),
            device_name: "north rig".to_string(),
            capabilities: CapabilitySet::from_bits(bits),
        },
        retry_count: 0,
        ip: IP.to_string(),
    }]);
}

#[tokio::test]
async fn start_tour_stores_and_logs() {
    let h = harness(None);
    let tour = h.orchestrator.start_tour(new_tour(true)).unwrap();
    assert!(!tour.finished);
    assert_eq!(h.orchestrator.list_tours().unwrap(), vec![tour.clone()]);

    let events = h.orchestrator.events(tour.id, false).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, EventSeverity::Information);
}

#[tokio::test]
async fn start_tour_validates_device() {
    let h = harness(None);

    let mut request = new_tour(false);
    request.device_id = "unknown".to_string();
    assert!(matches!(
        h.orchestrator.start_tour(request),
        Err(TourError::DeviceNotFound(_))
    ));

    publish_caps(&h, 1 | 2 | 4);
    assert!(matches!(
        h.orchestrator.start_tour(new_tour(true)),
        Err(TourError::CameraNotFunctional {
            camera: CameraKind::Thermal,
            ..
        })
    ));

    publish_caps(&h, 1);
    assert!(matches!(
        h.orchestrator.start_tour(new_tour(false)),
        Err(TourError::CameraNotFunctional {
            camera: CameraKind::Visible,
            ..
        })
    ));
}

#[tokio::test]
async fn start_tour_needs_plan_and_free_device() {
    let h = harness(None);
    let first = h.orchestrator.start_tour(new_tour(false)).unwrap();
    assert!(matches!(
        h.orchestrator.start_tour(new_tour(false)),
        Err(TourError::DeviceBusy { tour_id, .. }) if tour_id == first.id
    ));

    h.orchestrator.pause_tour(first.id, true).unwrap();
    h.orchestrator.start_tour(new_tour(false)).unwrap();

    h.store.delete_movement_plan(DEVICE).unwrap();
    assert!(matches!(
        h.orchestrator.start_tour(new_tour(false)),
        Err(TourError::MovementPlanMissing(_))
    ));
}

#[tokio::test]
async fn pause_and_update_change_the_tour() {
    let h = harness(None);
    let tour = h.orchestrator.start_tour(new_tour(false)).unwrap();

    assert!(h.orchestrator.pause_tour(tour.id, true).unwrap().finished);
    assert!(!h.orchestrator.pause_tour(tour.id, false).unwrap().finished);
    let updated = h.orchestrator.update_tour(tour.id, 5.0).unwrap();
    assert_eq!(updated.interval_minutes, 5.0);
    assert_eq!(h.store.get_tour(tour.id).unwrap(), Some(updated));

    assert!(matches!(
        h.orchestrator.pause_tour(999, true),
        Err(TourError::TourNotFound(999))
    ));
    assert!(matches!(
        h.orchestrator.events(999, true),
        Err(TourError::TourNotFound(999))
    ));
}

#[tokio::test]
async fn recovery_stops_unfinished_tours() {
    let h = harness(None);
    let running = h.orchestrator.start_tour(new_tour(false)).unwrap();

    assert_eq!(h.orchestrator.recover_after_restart().unwrap(), 1);
    assert!(h.store.get_tour(running.id).unwrap().unwrap().finished);
    let events = h.orchestrator.events(running.id, false).unwrap();
    assert_eq!(events.last().unwrap().severity, EventSeverity::Critical);

    assert_eq!(h.orchestrator.recover_after_restart().unwrap(), 0);
}
