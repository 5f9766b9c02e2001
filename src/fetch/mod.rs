mod basic;
mod client;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use reqwest::header::HeaderMap;

/// Sends a JSON POST with the given headers and returns the raw response.
/// Status handling is left to the caller.
pub async fn post_json<C: HttpClient>(
    client: &C,
    url: &str,
    headers: HeaderMap,
    payload: &serde_json::Value,
) -> Result<reqwest::Response> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut().extend(headers);
    *req.body_mut() = Some(serde_json::to_vec(payload)?.into());

    Ok(client.execute(req).await?)
}
