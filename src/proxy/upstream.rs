//! Client for the upstream transit API.

use crate::fetch::{BasicClient, HttpClient, post_json};
use crate::proxy::models::BusLocation;
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://bmtcmobileapi.karnataka.gov.in/WebAPI";

/// Upstream requests that hang are cut off after this long.
const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(8);

/// How much of an upstream error body is carried into our own error message.
const BODY_SNIPPET_CHARS: usize = 200;

/// Outcome of one upstream call, classified for the proxy's error policy.
#[derive(Debug)]
pub enum UpstreamReply {
    /// 200 with a JSON body.
    Json(Value),
    /// 403: the upstream denied the request; callers may fall back to mocks.
    Forbidden,
    /// Any other status, with a truncated body for the gateway error.
    Failed { status: u16, body: String },
}

pub struct UpstreamClient {
    client: Box<dyn HttpClient>,
    base_url: String,
}

impl UpstreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(
            Box::new(BasicClient::with_timeout(UPSTREAM_TIMEOUT)?),
            base_url,
        ))
    }

    pub fn with_client(client: Box<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Live trip details for one vehicle.
    pub async fn vehicle_trip_details(&self, vehicle_id: i64) -> Result<UpstreamReply> {
        self.post("VehicleTripDetails_v2", json!({ "vehicleId": vehicle_id }))
            .await
    }

    /// Raw route geometry for one route.
    pub async fn route_points(&self, route_id: i64) -> Result<UpstreamReply> {
        self.post("RoutePoints", json!({ "routeid": route_id })).await
    }

    async fn post(&self, endpoint: &str, payload: Value) -> Result<UpstreamReply> {
        let url = format!("{}/{}", self.base_url, endpoint);
        debug!(url, "Calling upstream");

        let resp = post_json(&self.client, &url, app_headers(), &payload).await?;
        let status = resp.status();

        if status.as_u16() == 403 {
            return Ok(UpstreamReply::Forbidden);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Ok(UpstreamReply::Failed {
                status: status.as_u16(),
                body: truncate(&body, BODY_SNIPPET_CHARS),
            });
        }

        Ok(UpstreamReply::Json(resp.json().await?))
    }
}

/// Headers matching the upstream's own mobile app; the API rejects plain
/// client requests without them.
fn app_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Content-Type", HeaderValue::from_static("application/json"));
    headers.insert("Accept", HeaderValue::from_static("*/*"));
    headers.insert(
        "Accept-Encoding",
        HeaderValue::from_static("gzip, deflate, br"),
    );
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("en-US,en-IN;q=0.9"),
    );
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));
    headers.insert(
        "Origin",
        HeaderValue::from_static("https://nammabmtcapp.karnataka.gov.in"),
    );
    headers.insert(
        "Referer",
        HeaderValue::from_static("https://nammabmtcapp.karnataka.gov.in/"),
    );
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Linux; Android 13; SM-M326B) \
             AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/112.0.0.0 Mobile Safari/537.36",
        ),
    );
    headers.insert("X-Requested-With", HeaderValue::from_static("com.kar.bmtc"));
    headers
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// Maps the upstream trip-details payload (`RouteDetails[0]` plus
/// `LiveLocation[0]`) into a [`BusLocation`].
///
/// # Errors
///
/// Fails when either array is missing or empty, or when no usable
/// coordinates are present.
pub fn map_bus_location(data: &Value, vehicle_id: i64) -> Result<BusLocation> {
    let route_details = data
        .get("RouteDetails")
        .and_then(|v| v.get(0))
        .ok_or_else(|| anyhow::anyhow!("unexpected upstream response format"))?;
    let live = data
        .get("LiveLocation")
        .and_then(|v| v.get(0))
        .ok_or_else(|| anyhow::anyhow!("unexpected upstream response format"))?;

    let lat = field_f64(live, "latitude")
        .or_else(|| field_f64(live, "currlatitude"))
        .ok_or_else(|| anyhow::anyhow!("upstream live location has no latitude"))?;
    let lng = field_f64(live, "longitude")
        .or_else(|| field_f64(live, "currlongitude"))
        .ok_or_else(|| anyhow::anyhow!("upstream live location has no longitude"))?;

    Ok(BusLocation {
        lat,
        lng,
        heading: Some(field_f64(live, "heading").unwrap_or(0.0)),
        next_stop: field_str(live, "nextstop"),
        previous_stop: field_str(live, "previousstop"),
        last_updated: field_str(live, "lastrefreshon")
            .or_else(|| field_str(route_details, "lastupdatedat")),
        route_id: field_i64(route_details, "routeid"),
        route_no: field_str(route_details, "routeno"),
        vehicle_id: field_i64(route_details, "vehicleid").unwrap_or(vehicle_id),
        vehicle_no: field_str(route_details, "busno")
            .or_else(|| field_str(live, "vehiclenumber")),
        trip_status: field_str(route_details, "tripstatus"),
        eta: field_str(route_details, "etastatus"),
    })
}

// The upstream serializes numbers inconsistently, sometimes as strings.
fn field_f64(obj: &Value, key: &str) -> Option<f64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_i64(obj: &Value, key: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn field_str(obj: &Value, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
