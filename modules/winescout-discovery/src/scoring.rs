use std::collections::HashMap;

use serde::Serialize;

use winescout_common::{extract_domain, Lens, Market, SearchResult, WineIdentity};

use crate::legacy;
use crate::sources::{self, GLOBAL_CANDIDATE_CAP};
use crate::tokens::IdentityTokens;

/// Candidates with a precision-token overlap below this are not about the
/// target wine, whatever their fetch priority says.
pub const IDENTITY_VALID_THRESHOLD: f32 = 0.4;

/// A unique URL surviving dedup, scored once and never mutated after.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: String,
    pub source_id: String,
    pub lens: Lens,
    pub credibility: f32,
    pub position: usize,
    pub identity_score: f32,
    pub identity_valid: bool,
    pub fetch_priority: f32,
    pub discovery_score: f32,
}

/// Score one search result into a candidate. `assume_producer` marks results
/// that came from the producer micro-search, whose unknown domains are the
/// producer's own site rather than random aggregators.
pub fn build_candidate(
    result: &SearchResult,
    tokens: &IdentityTokens,
    unlock_domains: &[String],
    assume_producer: bool,
) -> Candidate {
    let domain = extract_domain(&result.url);

    let (source_id, lens, credibility) = match sources::source_for_domain(&domain) {
        Some(s) => (s.id.to_string(), s.lens, s.credibility),
        None if is_producer_domain(&domain, tokens) => (domain.clone(), Lens::Producer, 0.8),
        None if assume_producer => (domain.clone(), Lens::Producer, 0.6),
        None => (domain.clone(), Lens::Aggregator, 0.3),
    };

    let text = format!("{} {} {}", result.title, result.snippet, result.url);
    let identity_score = tokens.precision_overlap(&text);
    let discovery_score = tokens.discovery_overlap(&text);
    let fetch_priority = fetch_priority(&domain, result.position, tokens, unlock_domains);

    Candidate {
        url: result.url.clone(),
        title: result.title.clone(),
        snippet: result.snippet.clone(),
        domain,
        source_id,
        lens,
        credibility,
        position: result.position,
        identity_score,
        identity_valid: identity_score >= IDENTITY_VALID_THRESHOLD,
        fetch_priority,
        discovery_score,
    }
}

/// Ordering score among already-valid candidates: favor authoritative,
/// easy-to-fetch sources.
fn fetch_priority(
    domain: &str,
    position: usize,
    tokens: &IdentityTokens,
    unlock_domains: &[String],
) -> f32 {
    let mut priority = 0.0;

    if sources::is_authoritative_domain(domain) {
        priority += 2.0;
    }
    if is_producer_domain(domain, tokens) {
        priority += 1.5;
    }
    if sources::is_competition_domain(domain) {
        priority += 1.5;
    }
    if sources::requires_unlock(domain, unlock_domains) {
        priority -= 1.0;
    }

    // Small reward for ranking near the top of the result page.
    priority += match position {
        1..=3 => 0.5,
        4..=6 => 0.25,
        _ => 0.0,
    };

    priority
}

/// Does the domain look like it belongs to the producer?
fn is_producer_domain(domain: &str, tokens: &IdentityTokens) -> bool {
    if tokens.producer_token.len() < 4 {
        return false;
    }
    domain.replace('-', "").contains(&tokens.producer_token)
}

/// Gate, sort, and cap the candidate pool for a market.
///
/// Candidates failing the identity gate are dropped before sorting. If the
/// gate rejects everything, the legacy single-score relevance heuristic ranks
/// the full pool instead, so the pipeline still returns its best guesses.
pub fn rank_candidates(
    candidates: Vec<Candidate>,
    market: Market,
    wine: &WineIdentity,
) -> Vec<Candidate> {
    let mut valid: Vec<Candidate> = candidates
        .iter()
        .filter(|c| c.identity_valid)
        .cloned()
        .collect();

    if valid.is_empty() {
        return legacy::rank_by_relevance(candidates, wine);
    }

    valid.sort_by(|a, b| {
        b.identity_score
            .total_cmp(&a.identity_score)
            .then(b.fetch_priority.total_cmp(&a.fetch_priority))
            .then(b.discovery_score.total_cmp(&a.discovery_score))
    });

    apply_lens_caps(valid, market)
}

/// Per-lens market caps plus the global cap keep one noisy lens from
/// crowding out the rest.
fn apply_lens_caps(sorted: Vec<Candidate>, market: Market) -> Vec<Candidate> {
    let caps = sources::lens_caps(market);
    let mut counts: HashMap<Lens, usize> = HashMap::new();
    let mut selected = Vec::new();

    for candidate in sorted {
        if selected.len() >= GLOBAL_CANDIDATE_CAP {
            break;
        }
        let count = counts.entry(candidate.lens).or_insert(0);
        if *count < caps.cap_for(candidate.lens) {
            *count += 1;
            selected.push(candidate);
        }
    }

    selected
}
