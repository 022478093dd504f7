use crate::state::{DispatchStats, SlotStatus};
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SlotResponse {
    pub name: String,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_cm: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SlotsSuccessResponse {
    pub slots: Vec<SlotResponse>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct SummarySuccessResponse {
    pub total: usize,
    pub occupied: usize,
    pub available: usize,
    pub invalid: usize,
    pub unknown: usize,
    pub dispatch: DispatchStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_cycle_at: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ConnectivityResponse {
    pub state: &'static str,
    pub retry_count: u32,
    pub max_retry: u32,
    pub usable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ErrorResponse {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub timestamp: String,
}

#[derive(Debug, Serialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoData,
    InternalError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn slot_response_omits_missing_distance() {
        let response = SlotResponse {
            name: "Slot1".to_string(),
            status: SlotStatus::Unknown,
            distance_cm: None,
            updated_at: None,
        };

        let value = serde_json::to_value(response).expect("serialize slot response");
        assert_eq!(value, json!({"name": "Slot1", "status": "unknown"}));
    }

    #[test]
    fn error_response_uses_screaming_codes() {
        let response = ErrorResponse {
            error_code: ErrorCode::NoData,
            error_message: "No monitoring cycle completed yet".to_string(),
            timestamp: "2026-01-11T12:30:00Z".to_string(),
        };

        let value = serde_json::to_value(response).expect("serialize error response");
        assert_eq!(value["error_code"], json!("NO_DATA"));
    }
}
