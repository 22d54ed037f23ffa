// Bridge to the structured-extraction service. The model call itself is an
// opaque collaborator; this module owns prompt construction and the
// extraction cache in front of it.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use winescout_cache::{CacheKind, CachePayload, CacheStore, EntryStatus, PutOptions};
use winescout_common::{cache_key, content_hash, WineIdentity};

/// Opaque structured-extraction collaborator: prompt + raw text in,
/// JSON-shaped records out.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract(&self, prompt: &str, text: &str) -> anyhow::Result<serde_json::Value>;
    fn model_version(&self) -> &str;
}

/// Prompt for pulling rating records out of fetched page text.
pub fn ratings_prompt(wine: &WineIdentity) -> String {
    let mut prompt = format!(
        "Extract every rating, score, medal, or award for the wine \"{}\" from the text below.\n",
        wine.display_name()
    );
    if let Some(region) = &wine.region {
        prompt.push_str(&format!("The wine is from {region}.\n"));
    }
    if let Some(variety) = &wine.variety {
        prompt.push_str(&format!("Grape variety: {variety}.\n"));
    }
    prompt.push_str(
        "Return a JSON array of objects with fields: source, score, scale, \
         medal, vintage, reviewer, quote. Use null for unknown fields. \
         Ignore ratings that clearly refer to a different wine or vintage.",
    );
    prompt
}

/// Extraction wrapper that consults the extraction cache by
/// (wine id, content hash) before invoking the collaborator.
pub struct CachedExtractor {
    inner: Arc<dyn StructuredExtractor>,
    cache: Arc<CacheStore>,
}

impl CachedExtractor {
    pub fn new(inner: Arc<dyn StructuredExtractor>, cache: Arc<CacheStore>) -> Self {
        Self { inner, cache }
    }

    pub async fn extract_ratings(
        &self,
        wine_id: &str,
        wine: &WineIdentity,
        content: &str,
    ) -> anyhow::Result<serde_json::Value> {
        let hash = content_hash(content);
        let key = cache_key(
            "extraction",
            &[("wine_id", wine_id), ("content_hash", &hash), ("type", "ratings")],
        );

        if let Some(hit) = self.cache.get(CacheKind::Extraction, &key, false).await {
            if let CachePayload::Extraction {
                extracted_ratings, ..
            } = hit.entry.payload
            {
                info!(wine_id, "Extraction cache hit");
                return Ok(extracted_ratings);
            }
        }

        let prompt = ratings_prompt(wine);
        let ratings = self.inner.extract(&prompt, content).await?;

        self.cache
            .put(
                CacheKind::Extraction,
                &key,
                CachePayload::Extraction {
                    wine_id: wine_id.to_string(),
                    content_hash: hash,
                    extraction_type: "ratings".into(),
                    extracted_ratings: ratings.clone(),
                    extracted_windows: serde_json::Value::Array(Vec::new()),
                    tasting_notes: None,
                    model_version: self.inner.model_version().to_string(),
                },
                EntryStatus::Valid,
                PutOptions::default(),
            )
            .await;

        Ok(ratings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubExtractor {
        calls: AtomicU32,
    }

    #[async_trait]
    impl StructuredExtractor for StubExtractor {
        async fn extract(&self, _prompt: &str, _text: &str) -> anyhow::Result<serde_json::Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(serde_json::json!([{"source": "IWSC", "medal": "gold"}]))
        }

        fn model_version(&self) -> &str {
            "stub-1"
        }
    }

    fn wine() -> WineIdentity {
        WineIdentity {
            producer: "Bodega Ejemplo".into(),
            range: Some("Crianza".into()),
            variety: Some("Tempranillo".into()),
            country: Some("Spain".into()),
            region: Some("Rioja".into()),
            wine_type: None,
            vintage: Some(2020),
        }
    }

    #[test]
    fn prompt_names_the_wine() {
        let prompt = ratings_prompt(&wine());
        assert!(prompt.contains("Bodega Ejemplo Crianza 2020"));
        assert!(prompt.contains("Rioja"));
        assert!(prompt.contains("JSON"));
    }

    #[tokio::test]
    async fn repeated_extraction_hits_cache() {
        let inner = Arc::new(StubExtractor {
            calls: AtomicU32::new(0),
        });
        let extractor = CachedExtractor::new(inner.clone(), Arc::new(CacheStore::in_memory()));

        let first = extractor
            .extract_ratings("wine-1", &wine(), "page text about the crianza")
            .await
            .unwrap();
        let second = extractor
            .extract_ratings("wine-1", &wine(), "page text about the crianza")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_content_extracts_again() {
        let inner = Arc::new(StubExtractor {
            calls: AtomicU32::new(0),
        });
        let extractor = CachedExtractor::new(inner.clone(), Arc::new(CacheStore::in_memory()));

        extractor
            .extract_ratings("wine-1", &wine(), "first page")
            .await
            .unwrap();
        extractor
            .extract_ratings("wine-1", &wine(), "second page")
            .await
            .unwrap();

        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }
}
