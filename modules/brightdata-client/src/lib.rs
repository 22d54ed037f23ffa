pub mod error;
pub mod types;

pub use error::{BrightDataError, Result};
pub use types::{OrganicResult, SerpResponse, UnlockedPage};

use std::time::Duration;

use types::ProxyRequest;

const BASE_URL: &str = "https://api.brightdata.com/request";

/// Client for the Bright Data SERP zone. Issues a Google query through the
/// proxy and parses the structured JSON rendering of the result page.
pub struct SerpClient {
    client: reqwest::Client,
    api_key: String,
    zone: String,
}

impl SerpClient {
    pub fn new(api_key: &str, zone: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.to_string(),
            zone: zone.to_string(),
        }
    }

    /// Run one search. `gl` is the Google country code for localization.
    pub async fn search(&self, query: &str, gl: &str, num: usize) -> Result<SerpResponse> {
        tracing::info!(query, gl, "SERP search");

        let target = format!(
            "https://www.google.com/search?q={}&gl={}&num={}&brd_json=1",
            urlencode(query),
            gl,
            num
        );
        let body = ProxyRequest {
            zone: &self.zone,
            url: &target,
            format: "raw",
        };

        let resp = self
            .client
            .post(BASE_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await?;
        let parsed: SerpResponse = serde_json::from_str(&text)?;
        tracing::info!(query, count = parsed.organic.len(), "SERP search complete");
        Ok(parsed)
    }
}

/// Client for the Bright Data Web Unlocker zone. Fetches pages from domains
/// that block plain HTTP clients, with the proxy handling the anti-bot layer.
pub struct UnlockerClient {
    client: reqwest::Client,
    api_key: String,
    zone: String,
}

impl UnlockerClient {
    pub fn new(api_key: &str, zone: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.to_string(),
            zone: zone.to_string(),
        }
    }

    /// Fetch one URL through the unlocker. The upstream status code arrives
    /// in the `x-brd-status-code` response header.
    pub async fn fetch(&self, url: &str) -> Result<UnlockedPage> {
        tracing::info!(url, "Unlocker fetch");

        let body = ProxyRequest {
            zone: &self.zone,
            url,
            format: "raw",
        };

        let resp = self
            .client
            .post(BASE_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(BrightDataError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let upstream_status = resp
            .headers()
            .get("x-brd-status-code")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(200);

        let body = resp.text().await?;
        tracing::info!(url, upstream_status, bytes = body.len(), "Unlocker fetch complete");

        Ok(UnlockedPage {
            body,
            status: upstream_status,
        })
    }
}

/// Percent-encode a query for the target search URL.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
