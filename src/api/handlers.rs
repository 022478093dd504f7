use crate::api::ApiState;
use crate::api::responses::{
    ConnectivityResponse, ErrorCode, ErrorResponse, SlotResponse, SlotsSuccessResponse,
    SummarySuccessResponse,
};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::error;

const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

pub enum ApiResponse<T> {
    Success(T),
    Error {
        status: StatusCode,
        body: ErrorResponse,
    },
}

impl<T> IntoResponse for ApiResponse<T>
where
    T: serde::Serialize,
{
    fn into_response(self) -> Response {
        match self {
            ApiResponse::Success(body) => (StatusCode::OK, Json(body)).into_response(),
            ApiResponse::Error { status, body } => (status, Json(body)).into_response(),
        }
    }
}

pub async fn get_slots(State(state): State<ApiState>) -> impl IntoResponse {
    build_slots_response(&state, SystemTime::now())
}

pub async fn get_summary(State(state): State<ApiState>) -> impl IntoResponse {
    build_summary_response(&state, SystemTime::now())
}

pub async fn get_connectivity(State(state): State<ApiState>) -> impl IntoResponse {
    build_connectivity_response(&state, SystemTime::now())
}

fn build_slots_response(state: &ApiState, now: SystemTime) -> ApiResponse<SlotsSuccessResponse> {
    let slots = match state.app.read() {
        Ok(guard) => guard.slots().to_vec(),
        Err(_) => return internal_error("state lock poisoned while reading slots"),
    };

    if slots.is_empty() {
        return no_data_response(now);
    }

    let slots = slots
        .into_iter()
        .map(|slot| SlotResponse {
            name: slot.name,
            status: slot.status,
            distance_cm: slot.distance_cm,
            updated_at: slot.updated_at.map(format_timestamp),
        })
        .collect();

    ApiResponse::Success(SlotsSuccessResponse {
        slots,
        timestamp: format_timestamp(now),
    })
}

fn build_summary_response(
    state: &ApiState,
    now: SystemTime,
) -> ApiResponse<SummarySuccessResponse> {
    let (summary, dispatch, last_cycle_at) = match state.app.read() {
        Ok(guard) => (guard.summary(), guard.dispatch_stats(), guard.last_cycle_at()),
        Err(_) => return internal_error("state lock poisoned while reading summary"),
    };

    let Some(last_cycle_at) = last_cycle_at else {
        return no_data_response(now);
    };

    ApiResponse::Success(SummarySuccessResponse {
        total: summary.total,
        occupied: summary.occupied,
        available: summary.available,
        invalid: summary.invalid,
        unknown: summary.unknown,
        dispatch,
        last_cycle_at: Some(format_timestamp(last_cycle_at)),
        timestamp: format_timestamp(now),
    })
}

fn build_connectivity_response(
    state: &ApiState,
    now: SystemTime,
) -> ApiResponse<ConnectivityResponse> {
    let snapshot = state.link.snapshot();
    ApiResponse::Success(ConnectivityResponse {
        state: snapshot.state.label(),
        retry_count: snapshot.retry_count,
        max_retry: state.link.max_retry(),
        usable: state.link.is_usable(),
        address: snapshot.address.map(|address| address.to_string()),
        timestamp: format_timestamp(now),
    })
}

fn no_data_response<T>(now: SystemTime) -> ApiResponse<T> {
    ApiResponse::Error {
        status: StatusCode::SERVICE_UNAVAILABLE,
        body: ErrorResponse {
            error_code: ErrorCode::NoData,
            error_message: "No monitoring cycle completed yet".to_string(),
            timestamp: format_timestamp(now),
        },
    }
}

fn internal_error<T>(message: &str) -> ApiResponse<T> {
    error!(message = message, "Internal error while handling status request");
    ApiResponse::Error {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        body: ErrorResponse {
            error_code: ErrorCode::InternalError,
            error_message: INTERNAL_ERROR_MESSAGE.to_string(),
            timestamp: format_timestamp(SystemTime::now()),
        },
    }
}

fn format_timestamp(timestamp: SystemTime) -> String {
    OffsetDateTime::from(timestamp)
        .format(&Rfc3339)
        .unwrap_or_else(|err| {
            error!(error = %err, "Failed to format timestamp");
            "1970-01-01T00:00:00Z".to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConnectivitySupervisor, LinkEvent};
    use crate::occupancy::Classification;
    use crate::state::{AppState, DispatchStats, SlotStates, SlotStatus};
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, RwLock};
    use std::time::{Duration, UNIX_EPOCH};

    fn api_state(app: AppState) -> ApiState {
        ApiState {
            app: Arc::new(RwLock::new(app)),
            link: Arc::new(ConnectivitySupervisor::new(5)),
        }
    }

    fn published_state() -> AppState {
        let mut states = SlotStates::new(["Slot1", "Slot2"]);
        if let Some(state) = states.get_mut(0) {
            state.record(Some(5.0), Classification::Occupied, UNIX_EPOCH + Duration::from_secs(1));
        }
        let mut app = AppState::new();
        app.publish_cycle(
            &states,
            DispatchStats {
                sent: 1,
                ..DispatchStats::default()
            },
            UNIX_EPOCH + Duration::from_secs(2),
        );
        app
    }

    #[test]
    fn slots_handler_returns_published_slots() {
        let state = api_state(published_state());

        match build_slots_response(&state, UNIX_EPOCH + Duration::from_secs(3)) {
            ApiResponse::Success(body) => {
                assert_eq!(body.slots.len(), 2);
                assert_eq!(body.slots[0].status, SlotStatus::Occupied);
                assert_eq!(body.slots[0].distance_cm, Some(5.0));
                assert_eq!(body.slots[0].updated_at.as_deref(), Some("1970-01-01T00:00:01Z"));
                assert_eq!(body.slots[1].status, SlotStatus::Unknown);
                assert_eq!(body.timestamp, "1970-01-01T00:00:03Z");
            }
            ApiResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn slots_handler_returns_no_data_before_first_cycle() {
        let state = api_state(AppState::new());

        match build_slots_response(&state, UNIX_EPOCH) {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
                assert_eq!(body.error_code, ErrorCode::NoData);
            }
            ApiResponse::Success(_) => panic!("expected no data response"),
        }
    }

    #[test]
    fn summary_handler_includes_dispatch_stats() {
        let state = api_state(published_state());

        match build_summary_response(&state, UNIX_EPOCH) {
            ApiResponse::Success(body) => {
                assert_eq!(body.total, 2);
                assert_eq!(body.occupied, 1);
                assert_eq!(body.unknown, 1);
                assert_eq!(body.dispatch.sent, 1);
                assert_eq!(body.last_cycle_at.as_deref(), Some("1970-01-01T00:00:02Z"));
            }
            ApiResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }

    #[test]
    fn summary_handler_returns_internal_error_when_lock_poisoned() {
        let state = api_state(AppState::new());
        let app_for_thread = Arc::clone(&state.app);
        let _ = std::thread::spawn(move || {
            let _guard = app_for_thread.write().expect("lock for poison");
            panic!("poison lock");
        })
        .join();

        match build_summary_response(&state, UNIX_EPOCH) {
            ApiResponse::Error { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body.error_code, ErrorCode::InternalError);
                assert_eq!(body.error_message, "Internal server error");
            }
            ApiResponse::Success(_) => panic!("expected internal error response"),
        }
    }

    #[test]
    fn connectivity_handler_reflects_supervisor() {
        let state = api_state(AppState::new());
        state
            .link
            .handle_event(LinkEvent::AddressAcquired(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9))));

        match build_connectivity_response(&state, UNIX_EPOCH) {
            ApiResponse::Success(body) => {
                assert_eq!(body.state, "connected");
                assert!(body.usable);
                assert_eq!(body.retry_count, 0);
                assert_eq!(body.max_retry, 5);
                assert_eq!(body.address.as_deref(), Some("10.0.0.9"));
            }
            ApiResponse::Error { status, .. } => panic!("expected success, got {status}"),
        }
    }
}
