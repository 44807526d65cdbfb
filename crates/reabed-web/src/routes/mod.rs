//! HTTP route handlers.

pub mod bed;

use crate::AppState;
use axum::{extract::State, response::Json, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Base path of the bed API.
pub const API_BASE: &str = "/api/v1/reanimation-bed";

/// Create the main Axum router with all routes.
///
/// Routes are organized as:
/// - `/` - Discovery document
/// - `/api/v1/reanimation-bed` - Bed state and setters
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(discovery_handler))
        .nest(API_BASE, bed::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Handler for `/` discovery endpoint.
///
/// Lists the REST endpoints and the two TCP protocol ports.
async fn discovery_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "endpoints": {
            "state": API_BASE,
            "angles": format!("{API_BASE}/angles"),
            "height": format!("{API_BASE}/height"),
            "weight": format!("{API_BASE}/weight"),
        },
        "tcp": {
            "command": state.config.command_port,
            "notification": state.config.notify_port,
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use reabed_core::BedConfig;
    use reabed_server::Device;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_discovery_lists_ports() {
        let dir = tempfile::TempDir::new().unwrap();
        let device = Arc::new(Device::new(dir.path().join("device.csv")));
        let config = BedConfig {
            command_port: 9000,
            notify_port: 9001,
            ..BedConfig::default()
        };
        let app = create_router(Arc::new(crate::WebState::new(device, config)));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(doc["tcp"]["command"], 9000);
        assert_eq!(doc["tcp"]["notification"], 9001);
        assert_eq!(doc["endpoints"]["angles"], "/api/v1/reanimation-bed/angles");
    }
}
