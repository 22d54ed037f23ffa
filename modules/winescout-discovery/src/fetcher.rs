use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brightdata_client::UnlockerClient;
use tracing::{info, warn};

use winescout_cache::{CacheKind, CachePayload, CacheStore, EntryStatus, PutOptions};
use winescout_common::{
    cache_key, extract_domain, is_document_url, sanitize_url, Config, FetchStatus,
};

use crate::breaker::CircuitBreaker;
use crate::budget::Budget;
use crate::dedup::Deduplicator;
use crate::sources;
use crate::spa;

/// Content shorter than this is useless to extraction tiers.
const MIN_CONTENT_LENGTH: usize = 200;
/// Blocked/consent interstitials are short; only bodies under this length
/// are candidates for block classification.
const BLOCKED_BODY_MAX: usize = 500;
/// Keyword set that marks an anti-bot or consent interstitial.
const BLOCKED_KEYWORDS: &[&str] = &[
    "captcha",
    "consent",
    "verify",
    "cloudflare",
    "access denied",
    "access-denied",
];

/// One HTTP response as seen by the fetcher, from either transport path.
#[derive(Debug, Clone)]
pub struct HttpPage {
    pub status: u16,
    pub body: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    /// True for a 304 against the validators we sent.
    pub not_modified: bool,
}

/// Conditional-GET validators from a previous fetch of the same URL.
#[derive(Debug, Clone, Default)]
pub struct Validators {
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

/// Transport seam: direct HTTP and the unlocker proxy.
#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn fetch_direct(&self, url: &str, validators: Option<Validators>)
        -> anyhow::Result<HttpPage>;
    async fn fetch_unlocked(&self, url: &str) -> anyhow::Result<HttpPage>;
}

/// Production transport: plain reqwest for cooperative domains, the Bright
/// Data unlocker for domains that block direct clients.
pub struct ReqwestTransport {
    http: reqwest::Client,
    unlocker: UnlockerClient,
}

impl ReqwestTransport {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.fetch_timeout_secs))
                .user_agent("Mozilla/5.0 (compatible; winescout/0.1)")
                .build()
                .expect("Failed to build HTTP client"),
            unlocker: UnlockerClient::new(
                &config.brightdata_api_key,
                &config.unlocker_zone,
                Duration::from_secs(config.unlock_timeout_secs),
            ),
        }
    }
}

#[async_trait]
impl PageTransport for ReqwestTransport {
    async fn fetch_direct(
        &self,
        url: &str,
        validators: Option<Validators>,
    ) -> anyhow::Result<HttpPage> {
        let mut req = self.http.get(url);
        if let Some(v) = &validators {
            if let Some(etag) = &v.etag {
                req = req.header("If-None-Match", etag);
            }
            if let Some(lm) = &v.last_modified {
                req = req.header("If-Modified-Since", lm);
            }
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let etag = header("etag");
        let last_modified = header("last-modified");
        let content_type = header("content-type");

        if status == 304 {
            return Ok(HttpPage {
                status,
                body: String::new(),
                etag,
                last_modified,
                content_type,
                not_modified: true,
            });
        }

        let body = resp.text().await?;
        Ok(HttpPage {
            status,
            body,
            etag,
            last_modified,
            content_type,
            not_modified: false,
        })
    }

    async fn fetch_unlocked(&self, url: &str) -> anyhow::Result<HttpPage> {
        let page = self.unlocker.fetch(url).await?;
        Ok(HttpPage {
            status: page.status,
            body: page.body,
            etag: None,
            last_modified: None,
            content_type: None,
            not_modified: false,
        })
    }
}

/// Result of one page fetch. Failures are values; nothing here throws past
/// programmer errors.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub url: String,
    pub content: String,
    pub success: bool,
    pub status: FetchStatus,
    pub blocked: bool,
    pub error: Option<String>,
    pub from_cache: bool,
    pub revalidated: bool,
}

impl FetchOutcome {
    fn failure(url: &str, status: FetchStatus, error: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            content: String::new(),
            success: false,
            status,
            blocked: status == FetchStatus::Blocked,
            error: Some(error.into()),
            from_cache: false,
            revalidated: false,
        }
    }

    fn skipped(url: &str, reason: &str) -> Self {
        Self {
            url: url.to_string(),
            content: String::new(),
            success: false,
            status: FetchStatus::Error,
            blocked: false,
            error: Some(reason.to_string()),
            from_cache: false,
            revalidated: false,
        }
    }
}

/// Retrieves and normalizes page content under budget, breaker, cache, and
/// dedup control. Every terminal branch writes a cache entry so retries are
/// TTL-paced rather than unconditional.
pub struct PageFetcher {
    inner: Arc<FetcherInner>,
    dedup: Deduplicator<FetchOutcome>,
}

struct FetcherInner {
    transport: Arc<dyn PageTransport>,
    cache: Arc<CacheStore>,
    breaker: Arc<CircuitBreaker>,
    unlock_domains: Vec<String>,
    direct_timeout: Duration,
    unlock_timeout: Duration,
}

impl PageFetcher {
    pub fn new(
        transport: Arc<dyn PageTransport>,
        cache: Arc<CacheStore>,
        breaker: Arc<CircuitBreaker>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(FetcherInner {
                transport,
                cache,
                breaker,
                unlock_domains: config.unlock_domains.clone(),
                direct_timeout: Duration::from_secs(config.fetch_timeout_secs),
                unlock_timeout: Duration::from_secs(config.unlock_timeout_secs),
            }),
            dedup: Deduplicator::new(),
        }
    }

    pub async fn fetch(&self, url: &str, max_length: usize, budget: &Arc<Budget>) -> FetchOutcome {
        let clean_url = sanitize_url(url);
        let key = cache_key("page", &[("url", &clean_url)]);

        let inner = self.inner.clone();
        let budget = budget.clone();
        let run_key = key.clone();
        self.dedup
            .run(&run_key, move || async move {
                inner.fetch_uncached(&clean_url, &key, max_length, &budget).await
            })
            .await
    }
}

impl FetcherInner {
    async fn fetch_uncached(
        &self,
        url: &str,
        key: &str,
        max_length: usize,
        budget: &Budget,
    ) -> FetchOutcome {
        // Cache lookup, stale entries included so they can drive
        // conditional revalidation.
        let cached = self.cache.get(CacheKind::Page, key, true).await;
        if let Some(hit) = &cached {
            if !hit.is_stale {
                return outcome_from_payload(url, &hit.entry.payload, false);
            }
        }
        let stale = cached.map(|hit| hit.entry.payload);

        if is_document_url(url) {
            return self.fetch_document(url, key, max_length, budget).await;
        }

        let domain = extract_domain(url);

        if self.breaker.is_open(&domain) {
            // Circuit open: serve stale content if we have it, otherwise skip.
            if let Some(payload) = &stale {
                info!(url, domain, "Circuit open, serving stale cache");
                return outcome_from_payload(url, payload, false);
            }
            info!(url, domain, "Circuit open, skipping fetch");
            return FetchOutcome::skipped(url, "circuit_open");
        }

        let use_unlocker = sources::requires_unlock(&domain, &self.unlock_domains);
        let validators = if use_unlocker {
            None
        } else {
            self.load_validators(url).await
        };

        let (timeout, result) = if use_unlocker {
            let fut = self.transport.fetch_unlocked(url);
            (
                self.unlock_timeout,
                tokio::time::timeout(self.unlock_timeout, fut).await,
            )
        } else {
            let fut = self.transport.fetch_direct(url, validators);
            (
                self.direct_timeout,
                tokio::time::timeout(self.direct_timeout, fut).await,
            )
        };

        let page = match result {
            Err(_) => {
                warn!(url, timeout_secs = timeout.as_secs(), "Fetch timed out");
                self.breaker.record_failure(&domain);
                self.write_page_entry(url, key, "", FetchStatus::Timeout, None, Some("timeout"))
                    .await;
                return FetchOutcome::failure(url, FetchStatus::Timeout, "timeout");
            }
            Ok(Err(e)) => {
                warn!(url, error = %e, "Fetch failed");
                self.breaker.record_failure(&domain);
                self.write_page_entry(url, key, "", FetchStatus::Error, None, Some(&e.to_string()))
                    .await;
                return FetchOutcome::failure(url, FetchStatus::Error, e.to_string());
            }
            Ok(Ok(page)) => page,
        };

        // 304: the cached body is still good. Refresh expiry, keep payload.
        if page.not_modified {
            self.breaker.record_success(&domain);
            self.cache.touch(CacheKind::Page, key).await;
            self.touch_url_meta(url).await;
            if let Some(payload) = &stale {
                let mut outcome = outcome_from_payload(url, payload, false);
                outcome.revalidated = true;
                info!(url, "Revalidated via 304");
                return outcome;
            }
            return FetchOutcome::skipped(url, "not_modified_without_cache");
        }

        self.classify_and_store(url, key, &domain, page, max_length, budget)
            .await
    }

    async fn classify_and_store(
        &self,
        url: &str,
        key: &str,
        domain: &str,
        page: HttpPage,
        max_length: usize,
        budget: &Budget,
    ) -> FetchOutcome {
        match page.status {
            404 | 410 => {
                self.breaker.record_success(domain);
                self.write_page_entry(url, key, "", FetchStatus::Gone, Some(page.status), None)
                    .await;
                return FetchOutcome::failure(url, FetchStatus::Gone, format!("http {}", page.status));
            }
            403 | 429 | 500..=599 => {
                self.breaker.record_failure(domain);
                self.write_page_entry(
                    url,
                    key,
                    "",
                    FetchStatus::Error,
                    Some(page.status),
                    Some(&format!("http {}", page.status)),
                )
                .await;
                return FetchOutcome::failure(url, FetchStatus::Error, format!("http {}", page.status));
            }
            _ => {}
        }

        // SPA hydration payload first, generic tag-stripping otherwise.
        let text = if sources::is_spa_domain(domain) {
            spa::extract_hydration_text(&page.body)
                .unwrap_or_else(|| html_to_text(&page.body))
        } else {
            html_to_text(&page.body)
        };

        if is_blocked_body(&text) {
            warn!(url, domain, "Blocked or consent page detected");
            self.breaker.record_failure(domain);
            self.write_page_entry(url, key, "", FetchStatus::Blocked, Some(page.status), None)
                .await;
            return FetchOutcome::failure(url, FetchStatus::Blocked, "blocked");
        }

        if !budget.reserve_bytes(text.len() as u64) {
            return FetchOutcome::skipped(url, "byte_budget_exhausted");
        }

        let content = truncate_at_boundary(text, max_length);

        if content.len() < MIN_CONTENT_LENGTH {
            self.breaker.record_success(domain);
            self.write_page_entry(
                url,
                key,
                &content,
                FetchStatus::Insufficient,
                Some(page.status),
                None,
            )
            .await;
            return FetchOutcome::failure(url, FetchStatus::Insufficient, "content too short");
        }

        self.breaker.record_success(domain);
        info!(url, bytes = content.len(), "Fetched successfully");
        self.write_page_entry(url, key, &content, FetchStatus::Success, Some(page.status), None)
            .await;
        self.write_url_meta(url, &page, content.len() as i64).await;

        FetchOutcome {
            url: url.to_string(),
            content,
            success: true,
            status: FetchStatus::Success,
            blocked: false,
            error: None,
            from_cache: false,
            revalidated: false,
        }
    }

    /// Document downloads (pdf/doc/xls) consume the document-fetch budget and
    /// skip the HTML pipeline.
    async fn fetch_document(
        &self,
        url: &str,
        key: &str,
        max_length: usize,
        budget: &Budget,
    ) -> FetchOutcome {
        if !budget.reserve_document_fetch() {
            return FetchOutcome::skipped(url, "document_budget_exhausted");
        }

        let domain = extract_domain(url);
        if self.breaker.is_open(&domain) {
            info!(url, domain, "Circuit open, skipping document fetch");
            return FetchOutcome::skipped(url, "circuit_open");
        }

        let result = tokio::time::timeout(
            self.direct_timeout,
            self.transport.fetch_direct(url, None),
        )
        .await;

        let page = match result {
            Err(_) => {
                self.breaker.record_failure(&domain);
                self.write_page_entry(url, key, "", FetchStatus::Timeout, None, Some("timeout"))
                    .await;
                return FetchOutcome::failure(url, FetchStatus::Timeout, "timeout");
            }
            Ok(Err(e)) => {
                self.breaker.record_failure(&domain);
                self.write_page_entry(url, key, "", FetchStatus::Error, None, Some(&e.to_string()))
                    .await;
                return FetchOutcome::failure(url, FetchStatus::Error, e.to_string());
            }
            Ok(Ok(page)) => page,
        };

        if !(200..300).contains(&page.status) {
            self.breaker.record_failure(&domain);
            self.write_page_entry(
                url,
                key,
                "",
                FetchStatus::Error,
                Some(page.status),
                Some(&format!("http {}", page.status)),
            )
            .await;
            return FetchOutcome::failure(url, FetchStatus::Error, format!("http {}", page.status));
        }

        if !budget.reserve_bytes(page.body.len() as u64) {
            return FetchOutcome::skipped(url, "byte_budget_exhausted");
        }

        self.breaker.record_success(&domain);
        let content = truncate_at_boundary(page.body, max_length);
        let status = if content.len() < MIN_CONTENT_LENGTH {
            FetchStatus::Insufficient
        } else {
            FetchStatus::Success
        };
        self.write_page_entry(url, key, &content, status, Some(page.status), None)
            .await;

        FetchOutcome {
            url: url.to_string(),
            success: status == FetchStatus::Success,
            content,
            status,
            blocked: false,
            error: None,
            from_cache: false,
            revalidated: false,
        }
    }

    async fn load_validators(&self, url: &str) -> Option<Validators> {
        let meta_key = cache_key("url_meta", &[("url", url)]);
        let hit = self.cache.get(CacheKind::UrlMeta, &meta_key, true).await?;
        if hit.entry.etag.is_none() && hit.entry.last_modified.is_none() {
            return None;
        }
        Some(Validators {
            etag: hit.entry.etag,
            last_modified: hit.entry.last_modified,
        })
    }

    async fn write_page_entry(
        &self,
        url: &str,
        key: &str,
        content: &str,
        fetch_status: FetchStatus,
        status_code: Option<u16>,
        error_message: Option<&str>,
    ) {
        let entry_status = match fetch_status {
            FetchStatus::Success => EntryStatus::Valid,
            FetchStatus::Gone => EntryStatus::Gone,
            _ => EntryStatus::Error,
        };
        self.cache
            .put(
                CacheKind::Page,
                key,
                CachePayload::PageContent {
                    url: url.to_string(),
                    content: content.to_string(),
                    fetch_status,
                    status_code,
                    error_message: error_message.map(String::from),
                },
                entry_status,
                PutOptions::default(),
            )
            .await;
    }

    async fn write_url_meta(&self, url: &str, page: &HttpPage, byte_size: i64) {
        let meta_key = cache_key("url_meta", &[("url", url)]);
        self.cache
            .put(
                CacheKind::UrlMeta,
                &meta_key,
                CachePayload::UrlMetadata {
                    url: url.to_string(),
                    content_type: page.content_type.clone(),
                    byte_size,
                    fetch_count: 1,
                    status: FetchStatus::Success.as_str().to_string(),
                },
                EntryStatus::Valid,
                PutOptions {
                    etag: page.etag.clone(),
                    last_modified: page.last_modified.clone(),
                    ..Default::default()
                },
            )
            .await;
    }

    async fn touch_url_meta(&self, url: &str) {
        let meta_key = cache_key("url_meta", &[("url", url)]);
        self.cache.touch(CacheKind::UrlMeta, &meta_key).await;
    }
}

fn outcome_from_payload(url: &str, payload: &CachePayload, revalidated: bool) -> FetchOutcome {
    match payload {
        CachePayload::PageContent {
            content,
            fetch_status,
            error_message,
            ..
        } => FetchOutcome {
            url: url.to_string(),
            content: content.clone(),
            success: *fetch_status == FetchStatus::Success,
            status: *fetch_status,
            blocked: *fetch_status == FetchStatus::Blocked,
            error: error_message.clone(),
            from_cache: true,
            revalidated,
        },
        _ => FetchOutcome::skipped(url, "cache_kind_mismatch"),
    }
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100).unwrap_or_default()
}

/// Short bodies containing anti-bot keywords are interstitials, not content.
fn is_blocked_body(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.len() >= BLOCKED_BODY_MAX {
        return false;
    }
    let lower = trimmed.to_lowercase();
    BLOCKED_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn truncate_at_boundary(s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
