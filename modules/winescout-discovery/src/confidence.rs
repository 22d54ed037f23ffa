use winescout_common::Lens;

use crate::sources::lens_trust;

/// Aggregate confidence above this cancels the producer micro-search: the
/// targeted arms already found enough. Empirically tuned, not load-bearing.
pub const CONFIDENCE_THRESHOLD: f32 = 0.7;

/// How many results the aggregate is normalized over.
const TOP_N: usize = 5;

/// Weighted mean of per-result relevance scaled by lens trust, normalized
/// over the top five results. Fewer than five results dilute the aggregate,
/// so thin coverage reads as low confidence.
pub fn aggregate_confidence(scored: &[(f32, Lens)]) -> f32 {
    if scored.is_empty() {
        return 0.0;
    }

    let mut weighted: Vec<f32> = scored
        .iter()
        .map(|(relevance, lens)| (relevance * lens_trust(*lens)).clamp(0.0, 1.0))
        .collect();
    weighted.sort_by(|a, b| b.total_cmp(a));
    weighted.truncate(TOP_N);

    weighted.iter().sum::<f32>() / TOP_N as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_results_have_zero_confidence() {
        assert_eq!(aggregate_confidence(&[]), 0.0);
    }

    #[test]
    fn five_strong_trusted_results_clear_threshold() {
        let scored = vec![
            (0.9, Lens::Producer),
            (0.8, Lens::Competition),
            (0.8, Lens::Critic),
            (0.7, Lens::Panel),
            (0.7, Lens::Critic),
        ];
        assert!(aggregate_confidence(&scored) >= CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn thin_coverage_stays_below_threshold() {
        let scored = vec![(0.9, Lens::Producer), (0.8, Lens::Competition)];
        assert!(aggregate_confidence(&scored) < CONFIDENCE_THRESHOLD);
    }

    #[test]
    fn community_results_weigh_less() {
        let community: Vec<(f32, Lens)> = (0..5).map(|_| (0.8, Lens::Community)).collect();
        let critics: Vec<(f32, Lens)> = (0..5).map(|_| (0.8, Lens::Critic)).collect();
        assert!(aggregate_confidence(&community) < aggregate_confidence(&critics));
    }

    #[test]
    fn only_top_five_count() {
        let mut scored: Vec<(f32, Lens)> = (0..5).map(|_| (0.9, Lens::Critic)).collect();
        let base = aggregate_confidence(&scored);
        // Ten weak trailing results must not drag the aggregate down.
        scored.extend((0..10).map(|_| (0.05, Lens::Community)));
        assert!((aggregate_confidence(&scored) - base).abs() < f32::EPSILON);
    }
}
