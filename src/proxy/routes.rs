//! axum routes for the proxy.

use crate::proxy::models::{BusLocation, StopsResponse, route_15g_stops};
use crate::proxy::upstream::{UpstreamClient, UpstreamReply, map_bus_location};
use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

pub struct AppState {
    pub upstream: UpstreamClient,
}

type SharedState = Arc<AppState>;

/// JSON error response in the `{"detail": ...}` shape the dashboard expects.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_gateway(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/api/bus/{vehicle_id}", get(get_bus_location))
        .route("/api/route/1672/stops", get(get_route_stops))
        .route("/api/route/{route_id}/points/raw", get(get_route_points_raw))
        .layer(middleware::from_fn(cors))
        .with_state(state)
}

/// Binds the proxy on `0.0.0.0:port` and serves until shutdown.
pub async fn serve(port: u16, base_url: String) -> Result<()> {
    let state = Arc::new(AppState {
        upstream: UpstreamClient::new(base_url)?,
    });
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!(port, "Proxy listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Live location for one vehicle, proxied from the upstream trip details
/// endpoint. An upstream 403 yields the documented static mock instead of an
/// error so the demo works without valid upstream credentials.
async fn get_bus_location(
    Path(vehicle_id): Path<i64>,
    State(state): State<SharedState>,
) -> Result<Response, ApiError> {
    match state.upstream.vehicle_trip_details(vehicle_id).await {
        Err(e) => {
            error!(error = %e, vehicle_id, "Upstream request failed");
            Err(ApiError::bad_gateway(format!(
                "error contacting upstream API: {e}"
            )))
        }
        Ok(UpstreamReply::Forbidden) => {
            info!(vehicle_id, "Upstream returned 403, serving mock location");
            Ok(Json(BusLocation::mock(vehicle_id)).into_response())
        }
        Ok(UpstreamReply::Failed { status, body }) => Err(ApiError::bad_gateway(format!(
            "upstream API returned {status}: {body}"
        ))),
        Ok(UpstreamReply::Json(data)) => match map_bus_location(&data, vehicle_id) {
            Ok(location) => Ok(Json(location).into_response()),
            Err(e) => Err(ApiError::internal(e.to_string())),
        },
    }
}

/// Static stop list for the one hard-coded demo route.
async fn get_route_stops() -> Json<StopsResponse> {
    Json(route_15g_stops())
}

/// Passthrough of the upstream route-points payload, for debugging and map
/// exploration.
async fn get_route_points_raw(
    Path(route_id): Path<i64>,
    State(state): State<SharedState>,
) -> Result<Response, ApiError> {
    match state.upstream.route_points(route_id).await {
        Err(e) => {
            error!(error = %e, route_id, "Upstream request failed");
            Err(ApiError::bad_gateway(format!(
                "error contacting upstream API: {e}"
            )))
        }
        Ok(UpstreamReply::Forbidden) => {
            Err(ApiError::bad_gateway("upstream API returned 403".to_string()))
        }
        Ok(UpstreamReply::Failed { status, body }) => Err(ApiError::bad_gateway(format!(
            "upstream API returned {status}: {body}"
        ))),
        Ok(UpstreamReply::Json(data)) => Ok(Json(data).into_response()),
    }
}

// The dashboard is served from another origin; keep CORS fully open.
async fn cors(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
    resp
}
