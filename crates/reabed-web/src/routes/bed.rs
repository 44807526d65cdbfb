//! Bed state routes.
//!
//! # Endpoints
//!
//! ### `GET /api/v1/reanimation-bed`
//! Returns the whole state: `{"angles":{...},"height":..,"weight":..}`.
//!
//! ### `GET|PUT /api/v1/reanimation-bed/angles`
//! Body and response `{"back":..,"hip":..,"ankle":..}`.
//!
//! ### `GET|PUT /api/v1/reanimation-bed/height`
//! Body and response `{"height":..}`.
//!
//! ### `GET|PUT /api/v1/reanimation-bed/weight`
//! Body and response `{"weight":..}`.
//!
//! A PUT answers `{"status":"success","message":..}` when the new value was
//! written to the device file, and `422` with `{"status":"error",..}` when it
//! was rejected. The in-memory state changes once the ingestor applies the
//! file, so a GET right after a PUT may still return the old value.

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use reabed_core::{Angles, DeviceState};
use reabed_server::DeviceError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::AppState;

/// Angle part of the bed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnglesBody {
    pub back: i32,
    pub hip: i32,
    pub ankle: i32,
}

impl From<Angles> for AnglesBody {
    fn from(a: Angles) -> Self {
        Self {
            back: a.back,
            hip: a.hip,
            ankle: a.ankle,
        }
    }
}

impl From<AnglesBody> for Angles {
    fn from(a: AnglesBody) -> Self {
        Angles::new(a.back, a.hip, a.ankle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeightBody {
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightBody {
    pub weight: i32,
}

/// Whole bed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BedBody {
    pub angles: AnglesBody,
    pub height: i32,
    pub weight: i32,
}

impl From<DeviceState> for BedBody {
    fn from(state: DeviceState) -> Self {
        Self {
            angles: state.angles().into(),
            height: state.height,
            weight: state.weight,
        }
    }
}

/// Outcome of a PUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBody {
    pub status: String,
    pub message: String,
}

type PutResponse = (StatusCode, Json<StatusBody>);

/// Create bed routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_bed))
        .route("/angles", get(get_angles).put(put_angles))
        .route("/height", get(get_height).put(put_height))
        .route("/weight", get(get_weight).put(put_weight))
}

/// GET /api/v1/reanimation-bed
async fn get_bed(State(state): State<AppState>) -> Json<BedBody> {
    Json(state.device.get().await.into())
}

/// GET /api/v1/reanimation-bed/angles
async fn get_angles(State(state): State<AppState>) -> Json<AnglesBody> {
    Json(state.device.get().await.angles().into())
}

/// GET /api/v1/reanimation-bed/height
async fn get_height(State(state): State<AppState>) -> Json<HeightBody> {
    let height = state.device.get().await.height;
    Json(HeightBody { height })
}

/// GET /api/v1/reanimation-bed/weight
async fn get_weight(State(state): State<AppState>) -> Json<WeightBody> {
    let weight = state.device.get().await.weight;
    Json(WeightBody { weight })
}

/// PUT /api/v1/reanimation-bed/angles
async fn put_angles(State(state): State<AppState>, Json(body): Json<AnglesBody>) -> PutResponse {
    let result = state.device.set_angles(body.into()).await;
    respond("Bed angles", result)
}

/// PUT /api/v1/reanimation-bed/height
async fn put_height(State(state): State<AppState>, Json(body): Json<HeightBody>) -> PutResponse {
    let result = state.device.set_height(body.height).await;
    respond("Bed height", result)
}

/// PUT /api/v1/reanimation-bed/weight
async fn put_weight(State(state): State<AppState>, Json(body): Json<WeightBody>) -> PutResponse {
    let result = state.device.set_weight(body.weight).await;
    respond("Patient weight", result)
}

fn respond<T>(subject: &str, result: Result<T, DeviceError>) -> PutResponse {
    match result {
        Ok(_) => (
            StatusCode::OK,
            Json(StatusBody {
                status: "success".to_string(),
                message: format!("{subject} changed"),
            }),
        ),
        Err(e) => {
            warn!("{} not changed: {}", subject, e);
            let status = match &e {
                DeviceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DeviceError::Persist { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (
                status,
                Json(StatusBody {
                    status: "error".to_string(),
                    message: format!("{subject} not changed: {e}"),
                }),
            )
        }
    }
}
