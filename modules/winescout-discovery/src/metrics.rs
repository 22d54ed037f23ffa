use serde::Serialize;
use tracing::info;

/// Coverage counters for one discovery run, returned to the caller and
/// logged at run end.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoverageMetrics {
    pub targeted_hits: usize,
    pub broad_hits: usize,
    pub variant_hits: usize,
    pub producer_hits: usize,
    pub producer_cancelled: bool,
    pub sources_skipped_by_breaker: usize,
    pub unique_candidates: usize,
    pub ranked_candidates: usize,
    pub confidence: f32,
    pub search_calls_used: u64,
    pub document_fetches_used: u64,
    pub bytes_used: u64,
    pub elapsed_ms: u64,
}

impl CoverageMetrics {
    pub fn log_summary(&self) {
        info!(
            targeted = self.targeted_hits,
            broad = self.broad_hits,
            variant = self.variant_hits,
            producer = self.producer_hits,
            producer_cancelled = self.producer_cancelled,
            breaker_skips = self.sources_skipped_by_breaker,
            unique = self.unique_candidates,
            ranked = self.ranked_candidates,
            confidence = self.confidence,
            search_calls = self.search_calls_used,
            elapsed_ms = self.elapsed_ms,
            "Discovery run complete"
        );
    }
}
