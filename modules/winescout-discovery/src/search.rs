use std::sync::Arc;

use async_trait::async_trait;
use brightdata_client::{SerpClient, SerpResponse};
use tracing::{info, warn};

use winescout_cache::{CacheKind, CachePayload, CacheStore, EntryStatus, PutOptions};
use winescout_common::{cache_key, QueryType, SearchResult, SerpPayload};

use crate::budget::Budget;
use crate::dedup::Deduplicator;

/// Most domains a single query may be restricted to via site: operators.
const MAX_SITE_OPERATORS: usize = 10;
/// Organic results requested per query.
const RESULTS_PER_QUERY: usize = 10;

/// Seam over the SERP proxy so the client logic tests without a network.
#[async_trait]
pub trait SerpProvider: Send + Sync {
    async fn serp(&self, query: &str, gl: &str, num: usize) -> anyhow::Result<SerpResponse>;
}

pub struct BrightDataSerp {
    client: SerpClient,
}

impl BrightDataSerp {
    pub fn new(client: SerpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SerpProvider for BrightDataSerp {
    async fn serp(&self, query: &str, gl: &str, num: usize) -> anyhow::Result<SerpResponse> {
        Ok(self.client.search(query, gl, num).await?)
    }
}

/// Outcome of one search operation. Failures are values, not errors, so
/// deduplicated callers all observe the same result.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    pub payload: SerpPayload,
    pub from_cache: bool,
    /// True when the search-call budget was exhausted and no query ran.
    pub skipped: bool,
    pub error: Option<String>,
}

impl SearchOutcome {
    pub fn results(&self) -> &[SearchResult] {
        &self.payload.organic
    }
}

/// Cache-first search client. On a miss it reserves a search-call budget
/// unit, restricts the query to the given domains, and retries once with
/// operators stripped when an operator-bearing query comes back empty.
/// Identical (query, domains, locale) calls collapse into one engine call.
pub struct SearchClient {
    provider: Arc<dyn SerpProvider>,
    cache: Arc<CacheStore>,
    dedup: Deduplicator<SearchOutcome>,
}

impl SearchClient {
    pub fn new(provider: Arc<dyn SerpProvider>, cache: Arc<CacheStore>) -> Self {
        Self {
            provider,
            cache,
            dedup: Deduplicator::new(),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        domains: &[&str],
        query_type: QueryType,
        budget: &Arc<Budget>,
        locale: &str,
    ) -> SearchOutcome {
        let composed = compose_query(query, domains);
        let domains_key = domains.join(",");
        let key = cache_key(
            "search",
            &[("q", query), ("domains", &domains_key), ("locale", locale)],
        );

        let provider = self.provider.clone();
        let cache = self.cache.clone();
        let budget = budget.clone();
        let locale = locale.to_string();
        let query_params = serde_json::json!({
            "q": query,
            "domains": domains,
            "locale": locale,
        });

        let run_key = key.clone();
        self.dedup
            .run(&run_key, move || {
                async move {
                    // Cache first.
                    if let Some(hit) = cache.get(CacheKind::Search, &key, false).await {
                        if let CachePayload::SearchResults { payload, .. } = hit.entry.payload {
                            return SearchOutcome {
                                payload,
                                from_cache: true,
                                ..Default::default()
                            };
                        }
                    }

                    if !budget.reserve_search_call() {
                        return SearchOutcome {
                            skipped: true,
                            ..Default::default()
                        };
                    }

                    let mut response =
                        match provider.serp(&composed, &locale, RESULTS_PER_QUERY).await {
                            Ok(resp) => resp,
                            Err(e) => {
                                warn!(query = %composed, error = %e, "Search failed");
                                return SearchOutcome {
                                    error: Some(e.to_string()),
                                    ..Default::default()
                                };
                            }
                        };

                    // Operator-bearing queries that find nothing get one
                    // plain retry: quoted phrases and filetype filters often
                    // over-constrain.
                    if response.organic.is_empty() && has_strippable_operators(&composed) {
                        let stripped = strip_operators(&composed);
                        info!(query = %composed, stripped = %stripped, "Zero results, retrying without operators");
                        if budget.reserve_search_call() {
                            match provider.serp(&stripped, &locale, RESULTS_PER_QUERY).await {
                                Ok(resp) => response = resp,
                                Err(e) => {
                                    warn!(query = %stripped, error = %e, "Operator-stripped retry failed");
                                }
                            }
                        }
                    }

                    let payload = to_serp_payload(response);
                    cache
                        .put(
                            CacheKind::Search,
                            &key,
                            CachePayload::SearchResults {
                                query_type,
                                query_params,
                                payload: payload.clone(),
                            },
                            EntryStatus::Valid,
                            PutOptions::default(),
                        )
                        .await;

                    SearchOutcome {
                        payload,
                        ..Default::default()
                    }
                }
            })
            .await
    }
}

/// Restrict a query to the given domains with site: operators, capped at 10.
fn compose_query(query: &str, domains: &[&str]) -> String {
    match domains.len() {
        0 => query.to_string(),
        1 => format!("{query} site:{}", domains[0]),
        _ => {
            let sites: Vec<String> = domains
                .iter()
                .take(MAX_SITE_OPERATORS)
                .map(|d| format!("site:{d}"))
                .collect();
            format!("{query} ({})", sites.join(" OR "))
        }
    }
}

/// Operators worth stripping on a zero-result retry. Site restrictions stay:
/// removing them would change what the query means.
fn has_strippable_operators(query: &str) -> bool {
    query.contains('"') || query.contains("filetype:")
}

fn strip_operators(query: &str) -> String {
    let no_filetype: String = query
        .split_whitespace()
        .filter(|w| !w.starts_with("filetype:"))
        .collect::<Vec<_>>()
        .join(" ");
    no_filetype.replace('"', "")
}

fn to_serp_payload(resp: SerpResponse) -> SerpPayload {
    let organic = resp
        .organic
        .into_iter()
        .enumerate()
        .map(|(i, r)| SearchResult {
            url: r.link,
            title: r.title,
            snippet: r.snippet,
            position: if r.rank > 0 { r.rank } else { i + 1 },
        })
        .collect();

    SerpPayload {
        organic,
        ai_overview: resp.ai_overview,
        knowledge_graph: resp.knowledge,
        featured_snippet: resp.featured_snippet,
        people_also_ask: resp.people_also_ask,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use brightdata_client::OrganicResult;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct StubProvider {
        calls: AtomicU32,
        /// Queries that return results; everything else comes back empty.
        matching: Vec<&'static str>,
    }

    impl StubProvider {
        fn new(matching: Vec<&'static str>) -> Self {
            Self {
                calls: AtomicU32::new(0),
                matching,
            }
        }
    }

    #[async_trait]
    impl SerpProvider for StubProvider {
        async fn serp(&self, query: &str, _gl: &str, _num: usize) -> anyhow::Result<SerpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let organic = if self.matching.iter().any(|m| query.contains(m)) {
                vec![OrganicResult {
                    link: "https://iwsc.net/result".into(),
                    title: "Gold medal".into(),
                    snippet: "Awarded gold".into(),
                    rank: 1,
                }]
            } else {
                Vec::new()
            };
            Ok(SerpResponse {
                organic,
                ..Default::default()
            })
        }
    }

    fn budget() -> Arc<Budget> {
        Arc::new(Budget::with_caps(10, 2, 1_000_000, Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn second_identical_search_hits_cache() {
        let provider = Arc::new(StubProvider::new(vec!["rioja"]));
        let client = SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory()));
        let budget = budget();

        let first = client
            .search("rioja gran reserva", &["iwsc.net"], QueryType::Targeted, &budget, "es")
            .await;
        assert!(!first.from_cache);
        assert_eq!(first.results().len(), 1);

        let second = client
            .search("rioja gran reserva", &["iwsc.net"], QueryType::Targeted, &budget, "es")
            .await;
        assert!(second.from_cache);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert_eq!(budget.search_calls_used(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_skips_without_error() {
        let provider = Arc::new(StubProvider::new(vec!["rioja"]));
        let client = SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory()));
        let budget = Arc::new(Budget::with_caps(0, 0, 0, Duration::from_secs(60)));

        let outcome = client
            .search("rioja", &[], QueryType::Broad, &budget, "es")
            .await;
        assert!(outcome.skipped);
        assert!(outcome.error.is_none());
        assert!(outcome.results().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn operator_query_retries_stripped_once() {
        // Stub matches only the stripped form (no quotes).
        let provider = Arc::new(StubProvider::new(vec!["tech sheet pdf"]));
        let client = SearchClient::new(provider.clone(), Arc::new(CacheStore::in_memory()));
        let budget = budget();

        let outcome = client
            .search(
                "\"tech sheet\" pdf filetype:pdf",
                &[],
                QueryType::Document,
                &budget,
                "us",
            )
            .await;

        assert_eq!(outcome.results().len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
        assert_eq!(budget.search_calls_used(), 2);
    }

    #[tokio::test]
    async fn concurrent_identical_searches_collapse() {
        let provider = Arc::new(StubProvider::new(vec!["rioja"]));
        let client = Arc::new(SearchClient::new(
            provider.clone(),
            Arc::new(CacheStore::in_memory()),
        ));
        let budget = budget();

        let a = {
            let client = client.clone();
            let budget = budget.clone();
            tokio::spawn(async move {
                client
                    .search("rioja", &["iwsc.net"], QueryType::Targeted, &budget, "es")
                    .await
            })
        };
        let b = {
            let client = client.clone();
            let budget = budget.clone();
            tokio::spawn(async move {
                client
                    .search("rioja", &["iwsc.net"], QueryType::Targeted, &budget, "es")
                    .await
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.results().len(), 1);
        assert_eq!(b.results().len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn compose_query_forms() {
        assert_eq!(compose_query("q", &[]), "q");
        assert_eq!(compose_query("q", &["a.com"]), "q site:a.com");
        assert_eq!(
            compose_query("q", &["a.com", "b.com"]),
            "q (site:a.com OR site:b.com)"
        );
    }

    #[test]
    fn compose_query_caps_domains() {
        let domains: Vec<String> = (0..15).map(|i| format!("d{i}.com")).collect();
        let refs: Vec<&str> = domains.iter().map(String::as_str).collect();
        let composed = compose_query("q", &refs);
        assert_eq!(composed.matches("site:").count(), MAX_SITE_OPERATORS);
    }

    #[test]
    fn strip_operators_removes_quotes_and_filetype() {
        assert_eq!(
            strip_operators("\"gran reserva\" sheet filetype:pdf"),
            "gran reserva sheet"
        );
        assert!(!has_strippable_operators("plain query site:a.com"));
        assert!(has_strippable_operators("\"quoted\""));
    }
}
