use serde::{Deserialize, Serialize};

/// Request body for the Bright Data /request endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct ProxyRequest<'a> {
    pub zone: &'a str,
    pub url: &'a str,
    pub format: &'a str,
}

/// Parsed SERP JSON (Google via the SERP zone with brd_json=1).
/// Enrichment blocks are kept as raw JSON; only organic results are typed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SerpResponse {
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
    #[serde(default)]
    pub ai_overview: Option<serde_json::Value>,
    #[serde(default)]
    pub knowledge: Option<serde_json::Value>,
    #[serde(default)]
    pub featured_snippet: Option<serde_json::Value>,
    #[serde(default)]
    pub people_also_ask: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OrganicResult {
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, alias = "description")]
    pub snippet: String,
    #[serde(default)]
    pub rank: usize,
}

/// Body and upstream status returned by the Web Unlocker.
#[derive(Debug, Clone)]
pub struct UnlockedPage {
    pub body: String,
    pub status: u16,
}
