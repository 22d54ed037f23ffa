use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::entry::{CacheEntry, CacheHit, CacheKind, CachePayload, EntryStatus, PutOptions};
use crate::error::Result;
use crate::ttl::TtlPolicy;

/// Storage seam behind the cache store. The Postgres backend persists the
/// four cache tables; the memory backend serves tests and cache-less runs.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>>;
    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> Result<()>;
    async fn touch(&self, kind: CacheKind, key: &str, expires_at: DateTime<Utc>) -> Result<()>;
}

/// Keyed, TTL-based cache over search results, page content, extraction
/// results, and URL metadata. One instance per process, shared by reference
/// across concurrent requests; entries for independent keys never contend.
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
    ttl: TtlPolicy,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: TtlPolicy) -> Self {
        Self { backend, ttl }
    }

    /// In-memory store with default TTLs, for tests and cache-less runs.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()), TtlPolicy::default())
    }

    /// Look up an entry. Expired entries are returned only under
    /// `include_stale`, flagged so callers can attempt conditional
    /// revalidation instead of a full refetch.
    pub async fn get(&self, kind: CacheKind, key: &str, include_stale: bool) -> Option<CacheHit> {
        let entry = match self.backend.get(kind, key).await {
            Ok(found) => found?,
            Err(e) => {
                warn!(kind = kind.as_str(), key, error = %e, "Cache read failed");
                return None;
            }
        };

        let is_stale = entry.is_expired(Utc::now());
        if is_stale && !include_stale {
            return None;
        }

        debug!(kind = kind.as_str(), key, is_stale, "Cache hit");
        Some(CacheHit { entry, is_stale })
    }

    /// Write an entry. TTL comes from the override, else the status/domain
    /// policy, else the kind default. Write failures are logged, not
    /// propagated: a lost cache write must never fail the request.
    pub async fn put(
        &self,
        kind: CacheKind,
        key: &str,
        payload: CachePayload,
        status: EntryStatus,
        opts: PutOptions,
    ) {
        let domain = payload.domain();
        let ttl_hours = opts.ttl_hours_override.unwrap_or_else(|| {
            self.ttl
                .resolve(kind, domain.as_deref(), payload.fetch_status())
        });

        let now = Utc::now();
        let entry = CacheEntry {
            key: key.to_string(),
            payload,
            status,
            fetched_at: now,
            expires_at: now + Duration::hours(ttl_hours),
            etag: opts.etag,
            last_modified: opts.last_modified,
        };

        if let Err(e) = self.backend.put(kind, entry).await {
            warn!(kind = kind.as_str(), key, error = %e, "Cache write failed");
        }
    }

    /// Refresh an entry's expiry without rewriting its payload. Used after a
    /// 304 Not Modified revalidation.
    pub async fn touch(&self, kind: CacheKind, key: &str) {
        let ttl_hours = self.ttl.resolve(kind, None, None);
        let expires_at = Utc::now() + Duration::hours(ttl_hours);
        if let Err(e) = self.backend.touch(kind, key, expires_at).await {
            warn!(kind = kind.as_str(), key, error = %e, "Cache touch failed");
        }
    }
}

/// HashMap-backed cache backend.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<(CacheKind, String), CacheEntry>>,
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(&(kind, key.to_string())).cloned())
    }

    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert((kind, entry.key.clone()), entry);
        Ok(())
    }

    async fn touch(&self, kind: CacheKind, key: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(&(kind, key.to_string())) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winescout_common::FetchStatus;

    fn page_payload(url: &str, content: &str, status: FetchStatus) -> CachePayload {
        CachePayload::PageContent {
            url: url.to_string(),
            content: content.to_string(),
            fetch_status: status,
            status_code: Some(200),
            error_message: None,
        }
    }

    #[tokio::test]
    async fn round_trip_returns_payload_unchanged() {
        let store = CacheStore::in_memory();
        let payload = page_payload("https://decanter.com/w", "tasting note body", FetchStatus::Success);
        store
            .put(CacheKind::Page, "k1", payload, EntryStatus::Valid, PutOptions::default())
            .await;

        let hit = store.get(CacheKind::Page, "k1", false).await.expect("hit");
        assert!(!hit.is_stale);
        match hit.entry.payload {
            CachePayload::PageContent { content, .. } => assert_eq!(content, "tasting note body"),
            other => panic!("expected PageContent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expired_entry_hidden_unless_stale_requested() {
        let store = CacheStore::in_memory();
        let payload = page_payload("https://decanter.com/w", "body", FetchStatus::Success);
        store
            .put(
                CacheKind::Page,
                "k1",
                payload,
                EntryStatus::Valid,
                PutOptions {
                    ttl_hours_override: Some(-1),
                    ..Default::default()
                },
            )
            .await;

        assert!(store.get(CacheKind::Page, "k1", false).await.is_none());

        let hit = store.get(CacheKind::Page, "k1", true).await.expect("stale hit");
        assert!(hit.is_stale);
    }

    #[tokio::test]
    async fn touch_refreshes_expiry_without_rewriting_payload() {
        let store = CacheStore::in_memory();
        let payload = page_payload("https://decanter.com/w", "original", FetchStatus::Success);
        store
            .put(
                CacheKind::Page,
                "k1",
                payload,
                EntryStatus::Valid,
                PutOptions {
                    ttl_hours_override: Some(-1),
                    ..Default::default()
                },
            )
            .await;
        assert!(store.get(CacheKind::Page, "k1", false).await.is_none());

        store.touch(CacheKind::Page, "k1").await;

        let hit = store.get(CacheKind::Page, "k1", false).await.expect("fresh again");
        assert!(!hit.is_stale);
        match hit.entry.payload {
            CachePayload::PageContent { content, .. } => assert_eq!(content, "original"),
            other => panic!("expected PageContent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn kinds_do_not_collide() {
        let store = CacheStore::in_memory();
        let payload = page_payload("https://decanter.com/w", "body", FetchStatus::Success);
        store
            .put(CacheKind::Page, "same-key", payload, EntryStatus::Valid, PutOptions::default())
            .await;

        assert!(store.get(CacheKind::Search, "same-key", false).await.is_none());
        assert!(store.get(CacheKind::Page, "same-key", false).await.is_some());
    }

    #[tokio::test]
    async fn blocked_page_gets_short_ttl() {
        let store = CacheStore::in_memory();
        let payload = page_payload("https://vivino.com/w", "", FetchStatus::Blocked);
        store
            .put(CacheKind::Page, "k1", payload, EntryStatus::Error, PutOptions::default())
            .await;

        let hit = store.get(CacheKind::Page, "k1", false).await.expect("hit");
        let ttl = hit.entry.expires_at - hit.entry.fetched_at;
        assert!(ttl < Duration::hours(24));
    }
}
