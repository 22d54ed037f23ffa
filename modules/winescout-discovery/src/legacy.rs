// Pre-gate relevance heuristic, kept as the fallback ranking when the
// identity gate rejects an entire pool.

use winescout_common::WineIdentity;

use crate::scoring::Candidate;
use crate::sources::GLOBAL_CANDIDATE_CAP;

/// Product-line qualifier terms, longest first so detection prefers the most
/// specific match ("gran reserva" before "reserva").
const QUALIFIER_TERMS: &[&str] = &[
    "gran selezione",
    "vieilles vignes",
    "single vineyard",
    "limited edition",
    "grand reserve",
    "gran reserva",
    "premier cru",
    "grand cru",
    "riserva",
    "reserva",
    "reserve",
];

const EXACT_PHRASE_BONUS: f32 = 2.0;
const VINTAGE_BONUS: f32 = 1.5;
const QUALIFIER_MATCH_BONUS: f32 = 1.25;
const QUALIFIER_MISS_PENALTY: f32 = 0.75;
const TITLE_WORD_SCORE: f32 = 1.0;
const SNIPPET_WORD_SCORE: f32 = 0.5;
const FUZZY_PREFIX_SCORE: f32 = 0.4;

/// Sort candidates by the legacy relevance score and keep the global cap.
pub fn rank_by_relevance(mut candidates: Vec<Candidate>, wine: &WineIdentity) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        relevance_score(b, wine).total_cmp(&relevance_score(a, wine))
    });
    candidates.truncate(GLOBAL_CANDIDATE_CAP);
    candidates
}

/// Single-score keyword relevance: title/snippet word counts, fuzzy prefix
/// matches, an exact-phrase bonus, a vintage-match bonus, and a qualifier
/// bonus/penalty so "Reserve" does not pass for "Grand Reserve".
pub fn relevance_score(candidate: &Candidate, wine: &WineIdentity) -> f32 {
    let title = candidate.title.to_lowercase();
    let snippet = candidate.snippet.to_lowercase();
    let text = format!("{title} {snippet}");
    let name = wine.display_name().to_lowercase();

    let mut score = 0.0;

    for word in name.split_whitespace().filter(|w| w.len() >= 3) {
        if title.contains(word) {
            score += TITLE_WORD_SCORE;
        } else if snippet.contains(word) {
            score += SNIPPET_WORD_SCORE;
        } else if word.len() >= 5 && word.is_char_boundary(4) && title.contains(&word[..4]) {
            score += FUZZY_PREFIX_SCORE;
        }
    }

    if text.contains(&name) {
        score += EXACT_PHRASE_BONUS;
    }

    if let Some(vintage) = wine.vintage {
        if text.contains(&vintage.to_string()) {
            score += VINTAGE_BONUS;
        }
    }

    score += qualifier_delta(&text, wine);

    score
}

/// Positive when the candidate names the wine's own qualifier, negative when
/// it names a different one.
fn qualifier_delta(text: &str, wine: &WineIdentity) -> f32 {
    let wine_text = wine.display_name().to_lowercase();
    let wine_qualifier = detect_qualifier(&wine_text);
    let candidate_qualifier = detect_qualifier(text);

    match (wine_qualifier, candidate_qualifier) {
        (Some(w), Some(c)) if w == c => QUALIFIER_MATCH_BONUS,
        (Some(_), Some(_)) => -QUALIFIER_MISS_PENALTY,
        (Some(_), None) => 0.0,
        (None, Some(_)) => -QUALIFIER_MISS_PENALTY,
        (None, None) => 0.0,
    }
}

fn detect_qualifier(text: &str) -> Option<&'static str> {
    QUALIFIER_TERMS.iter().find(|q| text.contains(*q)).copied()
}
