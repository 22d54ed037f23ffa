use std::collections::BTreeSet;

use winescout_common::WineIdentity;

/// Generic wine-trade words that identify nothing on their own.
const STOPWORDS: &[&str] = &[
    "wine", "wines", "winery", "estate", "estates", "cellars", "vineyard", "vineyards",
    "bodega", "bodegas", "domaine", "chateau", "château", "weingut", "cantina", "tenuta",
    "vina", "viña", "vinedos", "viñedos", "maison", "casa", "quinta", "the", "and", "of",
    "de", "del", "della", "di", "da", "la", "le", "les", "el", "los", "das", "der",
];

/// Token sets derived once per request from the wine's descriptive fields.
///
/// The discovery set is loose and feeds query construction; the precision set
/// is strict and gates candidate validity. Both are immutable for the
/// request's lifetime.
#[derive(Debug, Clone)]
pub struct IdentityTokens {
    pub discovery: Vec<String>,
    pub precision: Vec<String>,
    /// The most distinctive producer word, ascii-folded, for matching
    /// producer-owned domains ("marques" → marquesderiscal.com).
    pub producer_token: String,
}

impl IdentityTokens {
    pub fn derive(wine: &WineIdentity) -> Self {
        let producer_words = significant_words(&wine.producer);
        let range_words = wine
            .range
            .as_deref()
            .map(significant_words)
            .unwrap_or_default();

        // Precision: the words that distinguish this wine from every other.
        let mut precision: BTreeSet<String> = BTreeSet::new();
        precision.extend(producer_words.iter().cloned());
        precision.extend(range_words.iter().cloned());
        if let Some(v) = wine.vintage {
            precision.insert(v.to_string());
        }

        // Discovery: everything above plus the broader descriptors.
        let mut discovery = precision.clone();
        for field in [&wine.variety, &wine.region, &wine.wine_type] {
            if let Some(value) = field {
                discovery.extend(significant_words(value));
            }
        }

        let producer_token = producer_words
            .iter()
            .max_by_key(|w| w.len())
            .map(|w| ascii_fold(w))
            .unwrap_or_default();

        Self {
            discovery: discovery.into_iter().collect(),
            precision: precision.into_iter().collect(),
            producer_token,
        }
    }

    /// Fraction of precision tokens present in `text`. The identity gate.
    pub fn precision_overlap(&self, text: &str) -> f32 {
        overlap(&self.precision, text)
    }

    /// Fraction of discovery tokens present in `text`. Tiebreaker only.
    pub fn discovery_overlap(&self, text: &str) -> f32 {
        overlap(&self.discovery, text)
    }
}

/// Alternate query names for the retry stage when the full name finds too
/// little: drop the range, swap in the variety, drop the vintage.
pub fn name_variants(wine: &WineIdentity) -> Vec<String> {
    let full = wine.display_name();
    let mut variants = Vec::new();

    if wine.range.is_some() {
        let mut v = wine.producer.clone();
        if let Some(vintage) = wine.vintage {
            v.push(' ');
            v.push_str(&vintage.to_string());
        }
        variants.push(v);
    }
    if let (Some(range), Some(_)) = (&wine.range, wine.vintage) {
        variants.push(format!("{} {}", wine.producer, range));
    }
    if let Some(variety) = &wine.variety {
        let mut v = format!("{} {}", wine.producer, variety);
        if let Some(vintage) = wine.vintage {
            v.push(' ');
            v.push_str(&vintage.to_string());
        }
        variants.push(v);
    }

    variants.retain(|v| *v != full);
    variants.dedup();
    variants
}

fn overlap(tokens: &[String], text: &str) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let folded = ascii_fold(&text.to_lowercase());
    let matched = tokens
        .iter()
        .filter(|t| folded.contains(ascii_fold(t).as_str()))
        .count();
    matched as f32 / tokens.len() as f32
}

/// Lowercased words of at least three characters, stopwords removed.
/// Vintage-style digit runs survive via the length rule.
fn significant_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(String::from)
        .collect()
}

/// Fold common accented characters to ascii so token matching survives
/// domains and titles that drop diacritics.
fn ascii_fold(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ñ' => 'n',
            'ç' => 'c',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wine() -> WineIdentity {
        WineIdentity {
            producer: "Bodegas Marqués de Riscal".into(),
            range: Some("Gran Reserva".into()),
            variety: Some("Tempranillo".into()),
            country: Some("Spain".into()),
            region: Some("Rioja".into()),
            wine_type: Some("red".into()),
            vintage: Some(2016),
        }
    }

    #[test]
    fn precision_keeps_distinctive_words_only() {
        let tokens = IdentityTokens::derive(&wine());
        assert!(tokens.precision.contains(&"marqués".to_string()));
        assert!(tokens.precision.contains(&"riscal".to_string()));
        assert!(tokens.precision.contains(&"gran".to_string()));
        assert!(tokens.precision.contains(&"reserva".to_string()));
        assert!(tokens.precision.contains(&"2016".to_string()));
        assert!(!tokens.precision.contains(&"bodegas".to_string()));
    }

    #[test]
    fn discovery_is_a_superset_with_descriptors() {
        let tokens = IdentityTokens::derive(&wine());
        assert!(tokens.discovery.contains(&"tempranillo".to_string()));
        assert!(tokens.discovery.contains(&"rioja".to_string()));
        for t in &tokens.precision {
            assert!(tokens.discovery.contains(t));
        }
    }

    #[test]
    fn producer_token_is_ascii_folded() {
        let tokens = IdentityTokens::derive(&wine());
        assert_eq!(tokens.producer_token, "marques");
    }

    #[test]
    fn overlap_handles_accent_free_text() {
        let tokens = IdentityTokens::derive(&wine());
        let score = tokens.precision_overlap("Marques de Riscal Gran Reserva 2016 review");
        assert!((score - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn unrelated_text_scores_zero() {
        let tokens = IdentityTokens::derive(&wine());
        assert_eq!(tokens.precision_overlap("Pinot Noir from Oregon"), 0.0);
    }

    #[test]
    fn name_variants_drop_range_and_swap_variety() {
        let variants = name_variants(&wine());
        assert!(variants.contains(&"Bodegas Marqués de Riscal 2016".to_string()));
        assert!(variants.contains(&"Bodegas Marqués de Riscal Gran Reserva".to_string()));
        assert!(variants.contains(&"Bodegas Marqués de Riscal Tempranillo 2016".to_string()));
        assert!(!variants.contains(&wine().display_name()));
    }

    #[test]
    fn name_variants_minimal_wine_has_few_variants() {
        let minimal = WineIdentity {
            producer: "Riverbend".into(),
            range: None,
            variety: None,
            country: None,
            region: None,
            wine_type: None,
            vintage: None,
        };
        assert!(name_variants(&minimal).is_empty());
    }
}
