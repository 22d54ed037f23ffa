use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use winescout_common::{QueryType, SearchResult, SerpPayload, WineIdentity};

use crate::budget::Budget;
use crate::search::SearchClient;

/// What the producer micro-search collected before finishing or being
/// cancelled. Partial results are normal, not an error.
#[derive(Debug, Clone, Default)]
pub struct ProducerHits {
    pub results: Vec<SearchResult>,
    pub payloads: Vec<SerpPayload>,
    pub cancelled: bool,
}

/// Narrow, cancellable search for the wine's first-party site and documents.
///
/// The orchestrator cancels it once the targeted arms produce enough
/// confidence; cancellation is cooperative, checked between queries, and the
/// partial result is returned rather than discarded.
#[derive(Clone)]
pub struct ProducerSearch {
    search: Arc<SearchClient>,
}

impl ProducerSearch {
    pub fn new(search: Arc<SearchClient>) -> Self {
        Self { search }
    }

    pub async fn run(
        &self,
        wine: &WineIdentity,
        budget: &Arc<Budget>,
        locale: &str,
        cancel: CancellationToken,
    ) -> ProducerHits {
        let mut hits = ProducerHits::default();

        for (query, query_type) in producer_queries(wine) {
            if cancel.is_cancelled() {
                hits.cancelled = true;
                info!(collected = hits.results.len(), "Producer search cancelled");
                return hits;
            }

            let outcome = self
                .search
                .search(&query, &[], query_type, budget, locale)
                .await;

            if outcome.skipped {
                // Search budget is gone; later queries will fare no better.
                break;
            }
            hits.results.extend(outcome.payload.organic.iter().cloned());
            hits.payloads.push(outcome.payload);

            // Cancellation may have arrived while the query was in flight.
            if cancel.is_cancelled() {
                hits.cancelled = true;
                info!(collected = hits.results.len(), "Producer search cancelled mid-loop");
                return hits;
            }
        }

        info!(collected = hits.results.len(), "Producer search complete");
        hits
    }
}

/// The producer-site query plus explicit document-type queries.
fn producer_queries(wine: &WineIdentity) -> Vec<(String, QueryType)> {
    let producer = wine.producer.trim();
    let name = wine.display_name();

    let mut queries = vec![(
        format!("{producer} winery official website"),
        QueryType::Producer,
    )];
    queries.push((
        format!("\"{producer}\" {name} technical sheet filetype:pdf"),
        QueryType::Document,
    ));
    queries.push((
        format!("\"{producer}\" {name} tasting notes filetype:doc"),
        QueryType::Document,
    ));
    queries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SerpProvider;
    use async_trait::async_trait;
    use brightdata_client::{OrganicResult, SerpResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use winescout_cache::CacheStore;

    struct CancellingProvider {
        calls: AtomicU32,
        cancel: CancellationToken,
        cancel_after: u32,
    }

    #[async_trait]
    impl SerpProvider for CancellingProvider {
        async fn serp(&self, _query: &str, _gl: &str, _num: usize) -> anyhow::Result<SerpResponse> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call >= self.cancel_after {
                self.cancel.cancel();
            }
            Ok(SerpResponse {
                organic: vec![OrganicResult {
                    link: format!("https://bodega.example/doc{call}.pdf"),
                    title: "Technical sheet".into(),
                    snippet: "producer document".into(),
                    rank: 1,
                }],
                ..Default::default()
            })
        }
    }

    fn wine() -> WineIdentity {
        WineIdentity {
            producer: "Bodega Ejemplo".into(),
            range: Some("Crianza".into()),
            variety: None,
            country: Some("Spain".into()),
            region: None,
            wine_type: None,
            vintage: Some(2020),
        }
    }

    fn budget() -> Arc<Budget> {
        Arc::new(Budget::with_caps(10, 2, 1_000_000, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn pre_cancelled_token_returns_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let provider = Arc::new(CancellingProvider {
            calls: AtomicU32::new(0),
            cancel: CancellationToken::new(),
            cancel_after: u32::MAX,
        });
        let search = Arc::new(SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory())));

        let hits = ProducerSearch::new(search)
            .run(&wine(), &budget(), "es", cancel)
            .await;

        assert!(hits.cancelled);
        assert!(hits.results.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mid_loop_cancellation_keeps_partial_results() {
        let cancel = CancellationToken::new();
        let provider = Arc::new(CancellingProvider {
            calls: AtomicU32::new(0),
            cancel: cancel.clone(),
            cancel_after: 1,
        });
        let search = Arc::new(SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory())));

        let hits = ProducerSearch::new(search)
            .run(&wine(), &budget(), "es", cancel)
            .await;

        // The first query's results survive; the remaining queries never run.
        assert!(hits.cancelled);
        assert_eq!(hits.results.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn uncancelled_run_issues_all_queries() {
        let provider = Arc::new(CancellingProvider {
            calls: AtomicU32::new(0),
            cancel: CancellationToken::new(),
            cancel_after: u32::MAX,
        });
        let search = Arc::new(SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory())));

        let hits = ProducerSearch::new(search)
            .run(&wine(), &budget(), "es", CancellationToken::new())
            .await;

        assert!(!hits.cancelled);
        assert_eq!(hits.results.len(), 3);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_ends_the_loop_quietly() {
        let provider = Arc::new(CancellingProvider {
            calls: AtomicU32::new(0),
            cancel: CancellationToken::new(),
            cancel_after: u32::MAX,
        });
        let search = Arc::new(SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory())));
        let budget = Arc::new(Budget::with_caps(1, 0, 1_000_000, Duration::from_secs(60)));

        let hits = ProducerSearch::new(search)
            .run(&wine(), &budget, "es", CancellationToken::new())
            .await;

        assert!(!hits.cancelled);
        assert_eq!(hits.results.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
