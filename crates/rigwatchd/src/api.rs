//! Control API — axum handlers for operator tour actions.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/tours` | List tours |
//! | POST | `/api/v1/tours` | Start a tour |
//! | POST | `/api/v1/tours/{id}/pause` | Pause or resume a tour |
//! | POST | `/api/v1/tours/{id}/interval` | Change a tour's interval |
//! | GET | `/api/v1/tours/{id}/events` | Event log (`?all=true` includes debug) |

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rigwatch_core::TourId;
use rigwatch_tour::{NewTour, TourError, TourOrchestrator};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<TourOrchestrator>,
}

pub fn build_router(orchestrator: Arc<TourOrchestrator>) -> Router {
    let routes = Router::new()
        .route("/tours", get(list_tours).post(start_tour))
        .route("/tours/{id}/pause", post(pause_tour))
        .route("/tours/{id}/interval", post(update_tour))
        .route("/tours/{id}/events", get(tour_events))
        .with_state(ApiState { orchestrator });
    Router::new().nest("/api/v1", routes)
}

#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn status_of(error: &TourError) -> StatusCode {
    match error {
        TourError::DeviceNotFound(_) | TourError::TourNotFound(_) => StatusCode::NOT_FOUND,
        TourError::CameraNotFunctional { .. } | TourError::MovementPlanMissing(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        TourError::DeviceBusy { .. } => StatusCode::CONFLICT,
        TourError::State(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(error: TourError) -> axum::response::Response {
    (
        status_of(&error),
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(error.to_string()),
        }),
    )
        .into_response()
}

/// Start request body.
#[derive(Debug, Deserialize)]
pub struct StartTourRequest {
    pub device_id: String,
    pub name: String,
    #[serde(default)]
    pub comment: String,
    pub interval_minutes: f32,
    #[serde(default)]
    pub uses_ir: bool,
}

#[derive(Debug, Deserialize)]
pub struct PauseRequest {
    pub paused: bool,
}

#[derive(Debug, Deserialize)]
pub struct IntervalRequest {
    pub interval_minutes: f32,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    #[serde(default)]
    pub all: bool,
}

/// GET /api/v1/tours
pub async fn list_tours(State(state): State<ApiState>) -> impl IntoResponse {
    match state.orchestrator.list_tours() {
        Ok(tours) => ApiResponse::ok(tours).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/tours
pub async fn start_tour(
    State(state): State<ApiState>,
    Json(req): Json<StartTourRequest>,
) -> impl IntoResponse {
    let request = NewTour {
        device_id: req.device_id,
        name: req.name,
        comment: req.comment,
        interval_minutes: req.interval_minutes,
        uses_ir: req.uses_ir,
    };
    match state.orchestrator.start_tour(request) {
        Ok(tour) => {
            info!(tour_id = tour.id, device_id = %tour.device_id, "tour started over the api");
            (StatusCode::CREATED, ApiResponse::ok(tour)).into_response()
        }
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/tours/{id}/pause
pub async fn pause_tour(
    State(state): State<ApiState>,
    Path(id): Path<TourId>,
    Json(req): Json<PauseRequest>,
) -> impl IntoResponse {
    match state.orchestrator.pause_tour(id, req.paused) {
        Ok(tour) => ApiResponse::ok(tour).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/tours/{id}/interval
pub async fn update_tour(
    State(state): State<ApiState>,
    Path(id): Path<TourId>,
    Json(req): Json<IntervalRequest>,
) -> impl IntoResponse {
    match state.orchestrator.update_tour(id, req.interval_minutes) {
        Ok(tour) => ApiResponse::ok(tour).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/tours/{id}/events
pub async fn tour_events(
    State(state): State<ApiState>,
    Path(id): Path<TourId>,
    Query(query): Query<EventsQuery>,
) -> impl IntoResponse {
    match state.orchestrator.events(id, query.all) {
        Ok(events) => ApiResponse::ok(events).into_response(),
        Err(e) => error_response(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rigwatch_core::{
        CapabilitySet, DeviceHealth, DeviceHealthState, MotorProfile, MovementPlan,
        MovementPoint, RestartSettings, TourSettings,
    };
    use rigwatch_device::{HttpDeviceApi, TcpCameraStreamer};
    use rigwatch_health::HealthRegistry;
    use rigwatch_restart::RestartCoordinator;
    use rigwatch_state::{EventLog, StateStore};
    use rigwatch_tour::TourDeps;

    /// Visible camera found and functional.
    const VISIBLE_ONLY: u32 = 1 | 4;

    fn test_state() -> ApiState {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put_movement_plan(&MovementPlan {
                device_id: "rig-1".to_string(),
                name: "row".to_string(),
                points: vec![MovementPoint {
                    step_offset: 100,
                    focus_cm: 120.0,
                    speed: 100,
                    comment: String::new(),
                }],
            })
            .unwrap();
        let registry = Arc::new(HealthRegistry::new(store.clone()).unwrap());
        registry.publish(vec![DeviceHealthState {
            health: DeviceHealth {
                device_id: "rig-1".to_string(),
                device_name: "north rig".to_string(),
                capabilities: CapabilitySet::from_bits(VISIBLE_ONLY),
            },
            retry_count: 0,
            ip: "127.0.0.1".to_string(),
        }]);
        let api = Arc::new(HttpDeviceApi::new(9, Duration::from_millis(50)));
        let restart = Arc::new(RestartCoordinator::new(
            registry.clone(),
            store.clone(),
            api.clone(),
            EventLog::new(store.clone()),
            RestartSettings::default(),
        ));
        let orchestrator = TourOrchestrator::new(
            TourDeps {
                store: store.clone(),
                health: registry,
                restart,
                api,
                streamer: Arc::new(TcpCameraStreamer::new(
                    9,
                    std::env::temp_dir(),
                    Duration::from_millis(50),
                )),
            },
            TourSettings::default(),
            MotorProfile::default(),
        );
        ApiState {
            orchestrator: Arc::new(orchestrator),
        }
    }

    fn start_request(device_id: &str, uses_ir: bool) -> StartTourRequest {
        StartTourRequest {
            device_id: device_id.to_string(),
            name: "north field".to_string(),
            comment: String::new(),
            interval_minutes: 30.0,
            uses_ir,
        }
    }

    #[tokio::test]
    async fn start_then_list_tours() {
        let state = test_state();
        let resp = start_tour(State(state.clone()), Json(start_request("rig-1", false)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let tours = state.orchestrator.list_tours().unwrap();
        assert_eq!(tours.len(), 1);
        assert!(!tours[0].finished);

        let resp = list_tours(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn start_validation_errors_map_to_status() {
        let state = test_state();
        let resp = start_tour(State(state.clone()), Json(start_request("rig-9", false)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = start_tour(State(state.clone()), Json(start_request("rig-1", true)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = start_tour(State(state.clone()), Json(start_request("rig-1", false)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let resp = start_tour(State(state), Json(start_request("rig-1", false)))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn pause_and_interval_update_the_tour() {
        let state = test_state();
        let tour = state
            .orchestrator
            .start_tour(NewTour {
                device_id: "rig-1".to_string(),
                name: "north field".to_string(),
                comment: String::new(),
                interval_minutes: 30.0,
                uses_ir: false,
            })
            .unwrap();

        let resp = pause_tour(
            State(state.clone()),
            Path(tour.id),
            Json(PauseRequest { paused: true }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = update_tour(
            State(state.clone()),
            Path(tour.id),
            Json(IntervalRequest {
                interval_minutes: 5.0,
            }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::OK);

        let stored = state.orchestrator.list_tours().unwrap().remove(0);
        assert!(stored.finished);
        assert_eq!(stored.interval_minutes, 5.0);

        let resp = tour_events(State(state), Path(tour.id), Query(EventsQuery::default()))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_tour_is_not_found() {
        let state = test_state();
        let resp = pause_tour(
            State(state.clone()),
            Path(42),
            Json(PauseRequest { paused: false }),
        )
        .await
        .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = tour_events(State(state), Path(42), Query(EventsQuery { all: true }))
            .await
            .into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
