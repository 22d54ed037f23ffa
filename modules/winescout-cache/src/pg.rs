// Postgres persistence for the four cache tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use winescout_common::{FetchStatus, QueryType, SerpPayload};

use crate::entry::{CacheEntry, CacheKind, CachePayload, EntryStatus};
use crate::error::Result;
use crate::store::CacheBackend;

pub struct PgBackend {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct SearchRow {
    cache_key: String,
    query_type: String,
    query_params: serde_json::Value,
    results: serde_json::Value,
    status: String,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct PageRow {
    url_hash: String,
    url: String,
    content: String,
    fetch_status: String,
    status_code: Option<i32>,
    error_message: Option<String>,
    status: String,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ExtractionRow {
    cache_key: String,
    wine_id: String,
    content_hash: String,
    extraction_type: String,
    extracted_ratings: serde_json::Value,
    extracted_windows: serde_json::Value,
    tasting_notes: Option<String>,
    model_version: String,
    status: String,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct UrlMetaRow {
    cache_key: String,
    url: String,
    etag: Option<String>,
    last_modified: Option<String>,
    content_type: Option<String>,
    byte_size: i64,
    fetch_count: i64,
    status: String,
    fetched_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::error::CacheError::Database(e.into()))?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for PgBackend {
    async fn get(&self, kind: CacheKind, key: &str) -> Result<Option<CacheEntry>> {
        match kind {
            CacheKind::Search => {
                let row = sqlx::query_as::<_, SearchRow>(
                    "SELECT cache_key, query_type, query_params, results, status, fetched_at, expires_at \
                     FROM search_cache WHERE cache_key = $1",
                )
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
                row.map(search_row_to_entry).transpose()
            }
            CacheKind::Page => {
                let row = sqlx::query_as::<_, PageRow>(
                    "SELECT url_hash, url, content, fetch_status, status_code, error_message, status, fetched_at, expires_at \
                     FROM page_cache WHERE url_hash = $1",
                )
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
                row.map(page_row_to_entry).transpose()
            }
            CacheKind::Extraction => {
                let row = sqlx::query_as::<_, ExtractionRow>(
                    "SELECT cache_key, wine_id, content_hash, extraction_type, extracted_ratings, \
                            extracted_windows, tasting_notes, model_version, status, fetched_at, expires_at \
                     FROM extraction_cache WHERE cache_key = $1",
                )
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
                Ok(row.map(extraction_row_to_entry))
            }
            CacheKind::UrlMeta => {
                let row = sqlx::query_as::<_, UrlMetaRow>(
                    "SELECT cache_key, url, etag, last_modified, content_type, byte_size, fetch_count, status, fetched_at, expires_at \
                     FROM public_url_cache WHERE cache_key = $1",
                )
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
                Ok(row.map(url_meta_row_to_entry))
            }
        }
    }

    async fn put(&self, kind: CacheKind, entry: CacheEntry) -> Result<()> {
        match (&kind, &entry.payload) {
            (
                CacheKind::Search,
                CachePayload::SearchResults {
                    query_type,
                    query_params,
                    payload,
                },
            ) => {
                sqlx::query(
                    "INSERT INTO search_cache \
                         (cache_key, query_type, query_params, results, result_count, status, fetched_at, expires_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                     ON CONFLICT (cache_key) DO UPDATE SET \
                         query_type = $2, query_params = $3, results = $4, result_count = $5, \
                         status = $6, fetched_at = $7, expires_at = $8",
                )
                .bind(&entry.key)
                .bind(query_type.to_string())
                .bind(query_params)
                .bind(serde_json::to_value(payload)?)
                .bind(payload.organic.len() as i32)
                .bind(status_str(entry.status))
                .bind(entry.fetched_at)
                .bind(entry.expires_at)
                .execute(&self.pool)
                .await?;
            }
            (
                CacheKind::Page,
                CachePayload::PageContent {
                    url,
                    content,
                    fetch_status,
                    status_code,
                    error_message,
                },
            ) => {
                sqlx::query(
                    "INSERT INTO page_cache \
                         (url_hash, url, content, content_length, fetch_status, status_code, error_message, status, fetched_at, expires_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
                     ON CONFLICT (url_hash) DO UPDATE SET \
                         url = $2, content = $3, content_length = $4, fetch_status = $5, \
                         status_code = $6, error_message = $7, status = $8, fetched_at = $9, expires_at = $10",
                )
                .bind(&entry.key)
                .bind(url)
                .bind(content)
                .bind(content.len() as i32)
                .bind(fetch_status.as_str())
                .bind(status_code.map(|c| c as i32))
                .bind(error_message)
                .bind(status_str(entry.status))
                .bind(entry.fetched_at)
                .bind(entry.expires_at)
                .execute(&self.pool)
                .await?;
            }
            (
                CacheKind::Extraction,
                CachePayload::Extraction {
                    wine_id,
                    content_hash,
                    extraction_type,
                    extracted_ratings,
                    extracted_windows,
                    tasting_notes,
                    model_version,
                },
            ) => {
                sqlx::query(
                    "INSERT INTO extraction_cache \
                         (cache_key, wine_id, content_hash, extraction_type, extracted_ratings, \
                          extracted_windows, tasting_notes, model_version, status, fetched_at, expires_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
                     ON CONFLICT (cache_key) DO UPDATE SET \
                         extracted_ratings = $5, extracted_windows = $6, tasting_notes = $7, \
                         model_version = $8, status = $9, fetched_at = $10, expires_at = $11",
                )
                .bind(&entry.key)
                .bind(wine_id)
                .bind(content_hash)
                .bind(extraction_type)
                .bind(extracted_ratings)
                .bind(extracted_windows)
                .bind(tasting_notes)
                .bind(model_version)
                .bind(status_str(entry.status))
                .bind(entry.fetched_at)
                .bind(entry.expires_at)
                .execute(&self.pool)
                .await?;
            }
            (
                CacheKind::UrlMeta,
                CachePayload::UrlMetadata {
                    url,
                    content_type,
                    byte_size,
                    status,
                    ..
                },
            ) => {
                sqlx::query(
                    "INSERT INTO public_url_cache \
                         (cache_key, url, etag, last_modified, content_type, byte_size, fetch_count, status, fetched_at, expires_at) \
                     VALUES ($1, $2, $3, $4, $5, $6, 1, $7, $8, $9) \
                     ON CONFLICT (url) DO UPDATE SET \
                         etag = $3, last_modified = $4, content_type = $5, byte_size = $6, \
                         fetch_count = public_url_cache.fetch_count + 1, status = $7, \
                         fetched_at = $8, expires_at = $9",
                )
                .bind(&entry.key)
                .bind(url)
                .bind(&entry.etag)
                .bind(&entry.last_modified)
                .bind(content_type)
                .bind(byte_size)
                .bind(status)
                .bind(entry.fetched_at)
                .bind(entry.expires_at)
                .execute(&self.pool)
                .await?;
            }
            (kind, payload) => {
                return Err(crate::error::CacheError::Other(anyhow::anyhow!(
                    "payload {payload:?} does not match cache kind {kind:?}"
                )));
            }
        }
        Ok(())
    }

    async fn touch(&self, kind: CacheKind, key: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let (table, key_col) = match kind {
            CacheKind::Search => ("search_cache", "cache_key"),
            CacheKind::Page => ("page_cache", "url_hash"),
            CacheKind::Extraction => ("extraction_cache", "cache_key"),
            CacheKind::UrlMeta => ("public_url_cache", "cache_key"),
        };
        let sql = format!("UPDATE {table} SET expires_at = $1 WHERE {key_col} = $2");
        sqlx::query(&sql)
            .bind(expires_at)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn status_str(status: EntryStatus) -> &'static str {
    match status {
        EntryStatus::Valid => "valid",
        EntryStatus::Error => "error",
        EntryStatus::Gone => "gone",
    }
}

fn parse_status(s: &str) -> EntryStatus {
    match s {
        "error" => EntryStatus::Error,
        "gone" => EntryStatus::Gone,
        _ => EntryStatus::Valid,
    }
}

fn parse_query_type(s: &str) -> QueryType {
    match s {
        "broad" => QueryType::Broad,
        "producer" => QueryType::Producer,
        "document" => QueryType::Document,
        "variant" => QueryType::Variant,
        _ => QueryType::Targeted,
    }
}

fn parse_fetch_status(s: &str) -> FetchStatus {
    match s {
        "blocked" => FetchStatus::Blocked,
        "timeout" => FetchStatus::Timeout,
        "error" => FetchStatus::Error,
        "insufficient" => FetchStatus::Insufficient,
        "gone" => FetchStatus::Gone,
        _ => FetchStatus::Success,
    }
}

fn search_row_to_entry(row: SearchRow) -> Result<CacheEntry> {
    let payload: SerpPayload = serde_json::from_value(row.results)?;
    Ok(CacheEntry {
        key: row.cache_key,
        payload: CachePayload::SearchResults {
            query_type: parse_query_type(&row.query_type),
            query_params: row.query_params,
            payload,
        },
        status: parse_status(&row.status),
        fetched_at: row.fetched_at,
        expires_at: row.expires_at,
        etag: None,
        last_modified: None,
    })
}

fn page_row_to_entry(row: PageRow) -> Result<CacheEntry> {
    Ok(CacheEntry {
        key: row.url_hash,
        payload: CachePayload::PageContent {
            url: row.url,
            content: row.content,
            fetch_status: parse_fetch_status(&row.fetch_status),
            status_code: row.status_code.map(|c| c as u16),
            error_message: row.error_message,
        },
        status: parse_status(&row.status),
        fetched_at: row.fetched_at,
        expires_at: row.expires_at,
        etag: None,
        last_modified: None,
    })
}

fn extraction_row_to_entry(row: ExtractionRow) -> CacheEntry {
    CacheEntry {
        key: row.cache_key,
        payload: CachePayload::Extraction {
            wine_id: row.wine_id,
            content_hash: row.content_hash,
            extraction_type: row.extraction_type,
            extracted_ratings: row.extracted_ratings,
            extracted_windows: row.extracted_windows,
            tasting_notes: row.tasting_notes,
            model_version: row.model_version,
        },
        status: parse_status(&row.status),
        fetched_at: row.fetched_at,
        expires_at: row.expires_at,
        etag: None,
        last_modified: None,
    }
}

fn url_meta_row_to_entry(row: UrlMetaRow) -> CacheEntry {
    CacheEntry {
        key: row.cache_key,
        payload: CachePayload::UrlMetadata {
            url: row.url,
            content_type: row.content_type,
            byte_size: row.byte_size,
            fetch_count: row.fetch_count,
            status: row.status,
        },
        status: EntryStatus::Valid,
        fetched_at: row.fetched_at,
        expires_at: row.expires_at,
        etag: row.etag,
        last_modified: row.last_modified,
    }
}
