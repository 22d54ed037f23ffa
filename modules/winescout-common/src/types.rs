use serde::{Deserialize, Serialize};

// --- Source categories ---

/// Source category used for diversity capping and credibility weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lens {
    Competition,
    Critic,
    Panel,
    Community,
    Aggregator,
    Producer,
}

impl std::fmt::Display for Lens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lens::Competition => write!(f, "competition"),
            Lens::Critic => write!(f, "critic"),
            Lens::Panel => write!(f, "panel"),
            Lens::Community => write!(f, "community"),
            Lens::Aggregator => write!(f, "aggregator"),
            Lens::Producer => write!(f, "producer"),
        }
    }
}

// --- Markets ---

/// Product origin market, resolved from the wine's country. Drives the
/// per-lens diversity cap table and source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Us,
    Uk,
    France,
    Italy,
    Spain,
    Germany,
    Australia,
    SouthAfrica,
    Other,
}

impl Market {
    /// Resolve a market from a free-text country name.
    pub fn from_country(country: &str) -> Self {
        match country.trim().to_lowercase().as_str() {
            "us" | "usa" | "united states" => Market::Us,
            "uk" | "united kingdom" | "england" => Market::Uk,
            "france" | "fr" => Market::France,
            "italy" | "it" | "italia" => Market::Italy,
            "spain" | "es" | "españa" | "espana" => Market::Spain,
            "germany" | "de" | "deutschland" => Market::Germany,
            "australia" | "au" => Market::Australia,
            "south africa" | "za" => Market::SouthAfrica,
            _ => Market::Other,
        }
    }

    /// Search locale (gl country code) for this market.
    pub fn locale(&self) -> &'static str {
        match self {
            Market::Us => "us",
            Market::Uk => "gb",
            Market::France => "fr",
            Market::Italy => "it",
            Market::Spain => "es",
            Market::Germany => "de",
            Market::Australia => "au",
            Market::SouthAfrica => "za",
            Market::Other => "us",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Market::Us => write!(f, "us"),
            Market::Uk => write!(f, "uk"),
            Market::France => write!(f, "france"),
            Market::Italy => write!(f, "italy"),
            Market::Spain => write!(f, "spain"),
            Market::Germany => write!(f, "germany"),
            Market::Australia => write!(f, "australia"),
            Market::SouthAfrica => write!(f, "south_africa"),
            Market::Other => write!(f, "other"),
        }
    }
}

// --- Wine identity ---

/// Descriptive fields of the target wine. Immutable input to a discovery run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WineIdentity {
    pub producer: String,
    /// Distinguishing range or cuvée name ("Gran Reserva", "Les Clos").
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub variety: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub wine_type: Option<String>,
    #[serde(default)]
    pub vintage: Option<u16>,
}

impl WineIdentity {
    /// Market resolved from the country field, defaulting to Other.
    pub fn market(&self) -> Market {
        self.country
            .as_deref()
            .map(Market::from_country)
            .unwrap_or(Market::Other)
    }

    /// Full display name: producer, range, vintage where present.
    pub fn display_name(&self) -> String {
        let mut name = self.producer.clone();
        if let Some(range) = &self.range {
            name.push(' ');
            name.push_str(range);
        }
        if let Some(v) = self.vintage {
            name.push(' ');
            name.push_str(&v.to_string());
        }
        name
    }
}

// --- Search results ---

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub snippet: String,
    /// 1-based position on the result page.
    #[serde(default)]
    pub position: usize,
}

/// Raw search-engine payload, retained for reuse by later extraction tiers.
/// Organic results are parsed; the enrichment blocks stay as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerpPayload {
    #[serde(default)]
    pub organic: Vec<SearchResult>,
    #[serde(default)]
    pub ai_overview: Option<serde_json::Value>,
    #[serde(default)]
    pub knowledge_graph: Option<serde_json::Value>,
    #[serde(default)]
    pub featured_snippet: Option<serde_json::Value>,
    #[serde(default)]
    pub people_also_ask: Vec<serde_json::Value>,
}

/// Terminal classification of a page fetch. Timeout and Blocked are
/// distinguishable from plain errors so cache TTLs can differ per cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Blocked,
    Timeout,
    Error,
    Insufficient,
    Gone,
}

impl FetchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStatus::Success => "success",
            FetchStatus::Blocked => "blocked",
            FetchStatus::Timeout => "timeout",
            FetchStatus::Error => "error",
            FetchStatus::Insufficient => "insufficient",
            FetchStatus::Gone => "gone",
        }
    }
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What kind of query produced a search-cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    Targeted,
    Broad,
    Producer,
    Document,
    Variant,
}

impl std::fmt::Display for QueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryType::Targeted => write!(f, "targeted"),
            QueryType::Broad => write!(f, "broad"),
            QueryType::Producer => write!(f, "producer"),
            QueryType::Document => write!(f, "document"),
            QueryType::Variant => write!(f, "variant"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_from_country_variants() {
        assert_eq!(Market::from_country("Spain"), Market::Spain);
        assert_eq!(Market::from_country("españa"), Market::Spain);
        assert_eq!(Market::from_country("FRANCE"), Market::France);
        assert_eq!(Market::from_country("Moldova"), Market::Other);
    }

    #[test]
    fn display_name_includes_range_and_vintage() {
        let wine = WineIdentity {
            producer: "Marqués de Riscal".into(),
            range: Some("Gran Reserva".into()),
            variety: Some("Tempranillo".into()),
            country: Some("Spain".into()),
            region: Some("Rioja".into()),
            wine_type: Some("red".into()),
            vintage: Some(2016),
        };
        assert_eq!(wine.display_name(), "Marqués de Riscal Gran Reserva 2016");
        assert_eq!(wine.market(), Market::Spain);
    }
}
