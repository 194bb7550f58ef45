//! JSON envelope shared by every endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use time::OffsetDateTime;

use crate::health::HealthVerdict;
use crate::status::{AirStatus, GroundStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Error,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: ApiStatus,
    pub data: Option<T>,
    pub error: Option<ErrorBody>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            status: ApiStatus::Success,
            data: Some(data),
            error: None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub details: Option<String>,
}

/// Error half of the envelope, carrying its own HTTP status.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.body.details = Some(details.into());
        self
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", "Resource not found")
    }

    pub fn no_sensor_data() -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "NO_SENSOR_DATA",
            "Sensor data not available",
        )
        .with_details("The serial daemon may not be running or connected")
    }

    pub fn invalid_duration(min: u64, max: u64, got: i64) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "INVALID_DURATION",
            format!("Duration must be between {min} and {max} seconds"),
        )
        .with_details(format!("Received: {got}"))
    }

    pub fn validation(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "VALIDATION_ERROR",
            "Request validation failed",
        )
        .with_details(details)
    }

    pub fn command_failed(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "COMMAND_FAILED",
            "Failed to send command to the plant",
        )
        .with_details(details)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ApiResponse::<()> {
            status: ApiStatus::Error,
            data: None,
            error: Some(self.body),
        };
        (self.status, Json(envelope)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthData {
    pub service: &'static str,
    pub version: &'static str,
    pub mode: &'static str,
    /// Daemon status from the snapshot, or `no_data`.
    pub daemon_status: String,
}

#[derive(Debug, Serialize)]
pub struct AirInfo {
    pub temperature: String,
    pub humidity: String,
    pub status: Option<AirStatus>,
}

#[derive(Debug, Serialize)]
pub struct GroundInfo {
    pub humidity: String,
    pub status: Option<GroundStatus>,
}

#[derive(Debug, Serialize)]
pub struct PlantInfo {
    pub air: AirInfo,
    pub ground: GroundInfo,
}

#[derive(Debug, Serialize)]
pub struct PlantData {
    pub plant_info: PlantInfo,
    pub health: HealthVerdict,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_updated: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct WateringData {
    pub triggered: bool,
    pub duration_seconds: u64,
    pub message: String,
}

/// `"21.2C"`, or `"--C"` when the value is missing.
pub fn display_value<T: std::fmt::Display>(v: Option<T>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v}{unit}"),
        None => format!("--{unit}"),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
