use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use winescout_common::{
    sanitize_url, Config, Lens, QueryType, SearchResult, SerpPayload, WineIdentity,
};

use crate::breaker::CircuitBreaker;
use crate::budget::Budget;
use crate::confidence::{aggregate_confidence, CONFIDENCE_THRESHOLD};
use crate::metrics::CoverageMetrics;
use crate::producer::{ProducerHits, ProducerSearch};
use crate::scoring::{self, Candidate};
use crate::search::SearchClient;
use crate::sources;
use crate::tokens::{name_variants, IdentityTokens};

/// Below this many unique URLs after the targeted arms, the broad sweep runs.
const BROAD_TRIGGER_HITS: usize = 6;
/// Below this many unique URLs, variant retries run (wall clock permitting).
const VARIANT_TRIGGER_HITS: usize = 5;
/// Final candidate list length handed to the extraction tiers.
const MAX_RANKED_CANDIDATES: usize = 10;

/// Everything one discovery run produced: the ranked candidate list, the
/// coverage counters, and the raw SERP payloads for later extraction tiers.
#[derive(Debug, Clone, serde::Serialize)]
pub struct DiscoveryOutcome {
    pub candidates: Vec<Candidate>,
    pub metrics: CoverageMetrics,
    pub serp_payloads: Vec<SerpPayload>,
}

/// One multi-strategy retrieval run per wine:
/// targeted + producer in parallel, a confidence check that cancels the
/// producer early, a conditional broad sweep, budget-gated variant retries,
/// then dedup, score, rank, cap.
///
/// A fully failed run returns an empty candidate list plus counters, never
/// an error.
pub struct DiscoveryEngine {
    config: Config,
    search: Arc<SearchClient>,
    breaker: Arc<CircuitBreaker>,
    producer: ProducerSearch,
}

impl DiscoveryEngine {
    pub fn new(config: Config, search: Arc<SearchClient>, breaker: Arc<CircuitBreaker>) -> Self {
        let producer = ProducerSearch::new(search.clone());
        Self {
            config,
            search,
            breaker,
            producer,
        }
    }

    pub async fn discover(&self, wine: &WineIdentity) -> DiscoveryOutcome {
        let request_id = Uuid::new_v4();
        let market = wine.market();
        let locale = market.locale();
        let query = wine.display_name();
        info!(%request_id, wine = %query, %market, "Discovery starting");

        let tokens = IdentityTokens::derive(wine);
        let budget = Arc::new(Budget::new(&self.config));

        // The producer micro-search runs alongside the targeted arms and is
        // the only operation subject to mid-flight cancellation.
        let cancel = CancellationToken::new();
        let producer_task = {
            let producer = self.producer.clone();
            let wine = wine.clone();
            let budget = budget.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { producer.run(&wine, &budget, locale, cancel).await })
        };

        // Targeted per-source searches, all at once.
        let mut skipped_by_breaker = 0usize;
        let mut arms = Vec::new();
        for source in sources::sources_for_market(market) {
            if self.breaker.is_open(source.id) {
                info!(source = source.id, "Skipping source, circuit open");
                skipped_by_breaker += 1;
                continue;
            }
            let q = query.clone();
            let budget = budget.clone();
            arms.push(async move {
                let outcome = self
                    .search
                    .search(&q, &[source.domain], QueryType::Targeted, &budget, locale)
                    .await;
                (source, outcome)
            });
        }
        let targeted = join_all(arms).await;

        let mut payloads: Vec<SerpPayload> = Vec::new();
        let mut pool: Vec<(SearchResult, bool)> = Vec::new();
        let mut covered: HashSet<&'static str> = HashSet::new();
        let mut scored: Vec<(f32, Lens)> = Vec::new();
        let mut targeted_hits = 0usize;

        for (source, outcome) in &targeted {
            covered.insert(source.domain);
            if let Some(error) = &outcome.error {
                warn!(source = source.id, error = %error, "Targeted search failed");
                self.breaker.record_failure(source.id);
                continue;
            }
            if outcome.skipped {
                continue;
            }
            self.breaker.record_success(source.id);
            targeted_hits += outcome.payload.organic.len();
            for result in &outcome.payload.organic {
                let text = format!("{} {}", result.title, result.snippet);
                scored.push((tokens.precision_overlap(&text), source.lens));
                pool.push((result.clone(), false));
            }
            payloads.push(outcome.payload.clone());
        }

        // Good-enough check: strong targeted coverage means the producer
        // search is not worth waiting on.
        let confidence = aggregate_confidence(&scored);
        if confidence >= CONFIDENCE_THRESHOLD {
            info!(confidence, "Confidence threshold cleared, cancelling producer search");
            cancel.cancel();
        }

        let producer_hits = producer_task.await.unwrap_or_else(|e| {
            warn!(error = %e, "Producer search task failed");
            ProducerHits::default()
        });
        let producer_count = producer_hits.results.len();
        for result in &producer_hits.results {
            pool.push((result.clone(), true));
        }
        payloads.extend(producer_hits.payloads.iter().cloned());

        // Broad sweep over catalog domains no targeted arm covered.
        let mut broad_hits = 0usize;
        if unique_urls(&pool) < BROAD_TRIGGER_HITS && budget.has_wall_clock_budget() {
            let uncovered: Vec<&str> = sources::CATALOG
                .iter()
                .map(|s| s.domain)
                .filter(|d| !covered.contains(d))
                .collect();
            if !uncovered.is_empty() {
                let outcome = self
                    .search
                    .search(&query, &uncovered, QueryType::Broad, &budget, locale)
                    .await;
                if outcome.error.is_none() && !outcome.skipped {
                    broad_hits = outcome.payload.organic.len();
                    for result in &outcome.payload.organic {
                        pool.push((result.clone(), false));
                    }
                    payloads.push(outcome.payload);
                }
            }
        }

        // Name-variant retries, budget-gated.
        let mut variant_hits = 0usize;
        for variant in name_variants(wine) {
            if unique_urls(&pool) >= VARIANT_TRIGGER_HITS || !budget.has_wall_clock_budget() {
                break;
            }
            let outcome = self
                .search
                .search(&variant, &[], QueryType::Variant, &budget, locale)
                .await;
            if outcome.error.is_some() || outcome.skipped {
                continue;
            }
            variant_hits += outcome.payload.organic.len();
            for result in &outcome.payload.organic {
                pool.push((result.clone(), false));
            }
            payloads.push(outcome.payload);
        }

        // Dedup by sanitized URL, then score, rank, cap.
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for (result, from_producer) in &pool {
            let clean = sanitize_url(&result.url);
            if clean.is_empty() || !seen.insert(clean.clone()) {
                continue;
            }
            let mut deduped = result.clone();
            deduped.url = clean;
            candidates.push(scoring::build_candidate(
                &deduped,
                &tokens,
                &self.config.unlock_domains,
                *from_producer,
            ));
        }
        let unique_candidates = candidates.len();

        let mut ranked = scoring::rank_candidates(candidates, market, wine);
        ranked.truncate(MAX_RANKED_CANDIDATES);

        let metrics = CoverageMetrics {
            targeted_hits,
            broad_hits,
            variant_hits,
            producer_hits: producer_count,
            producer_cancelled: producer_hits.cancelled,
            sources_skipped_by_breaker: skipped_by_breaker,
            unique_candidates,
            ranked_candidates: ranked.len(),
            confidence,
            search_calls_used: budget.search_calls_used(),
            document_fetches_used: budget.document_fetches_used(),
            bytes_used: budget.bytes_used(),
            elapsed_ms: budget.elapsed().as_millis() as u64,
        };
        budget.log_status();
        metrics.log_summary();

        DiscoveryOutcome {
            candidates: ranked,
            metrics,
            serp_payloads: payloads,
        }
    }
}

fn unique_urls(pool: &[(SearchResult, bool)]) -> usize {
    pool.iter()
        .map(|(r, _)| sanitize_url(&r.url))
        .collect::<HashSet<_>>()
        .len()
}
