use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use winescout_common::{FetchStatus, QueryType, SerpPayload};

/// The four logical cache tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Search,
    Page,
    Extraction,
    UrlMeta,
}

impl CacheKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Search => "search",
            CacheKind::Page => "page",
            CacheKind::Extraction => "extraction",
            CacheKind::UrlMeta => "url_meta",
        }
    }
}

/// Entry lifecycle status. Staleness is derived from `expires_at`, not stored:
/// a stale entry keeps its last status and is retained for revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Valid,
    Error,
    Gone,
}

/// Tagged cache payload, one variant per kind. Serialized explicitly at the
/// store boundary rather than passed around as loose JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachePayload {
    SearchResults {
        query_type: QueryType,
        query_params: serde_json::Value,
        payload: SerpPayload,
    },
    PageContent {
        url: String,
        content: String,
        fetch_status: FetchStatus,
        status_code: Option<u16>,
        error_message: Option<String>,
    },
    Extraction {
        wine_id: String,
        content_hash: String,
        extraction_type: String,
        extracted_ratings: serde_json::Value,
        extracted_windows: serde_json::Value,
        tasting_notes: Option<String>,
        model_version: String,
    },
    UrlMetadata {
        url: String,
        content_type: Option<String>,
        byte_size: i64,
        fetch_count: i64,
        status: String,
    },
}

impl CachePayload {
    /// Domain the payload refers to, when it carries a URL. Used by the TTL
    /// policy for per-domain short-TTL overrides.
    pub fn domain(&self) -> Option<String> {
        match self {
            CachePayload::PageContent { url, .. } | CachePayload::UrlMetadata { url, .. } => {
                Some(winescout_common::extract_domain(url))
            }
            _ => None,
        }
    }

    /// Fetch classification, when the payload is a page.
    pub fn fetch_status(&self) -> Option<FetchStatus> {
        match self {
            CachePayload::PageContent { fetch_status, .. } => Some(*fetch_status),
            _ => None,
        }
    }
}

/// One stored cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: CachePayload,
    pub status: EntryStatus,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A `get` result: the entry plus whether its TTL has lapsed.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub is_stale: bool,
}

/// Optional write parameters. Validators only apply to URL-metadata entries.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    pub ttl_hours_override: Option<i64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}
