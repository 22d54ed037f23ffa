use winescout_common::{Lens, Market};

/// A curated third-party evidence source.
pub struct SourceProfile {
    pub id: &'static str,
    pub name: &'static str,
    pub domain: &'static str,
    pub lens: Lens,
    /// Static credibility weight in [0, 1].
    pub credibility: f32,
    /// Markets this source covers well; empty means worldwide.
    pub markets: &'static [Market],
    /// Direct fetches get blocked; route through the unlocker.
    pub requires_unlock: bool,
    /// Single-page app whose content lives in a hydration JSON payload.
    pub spa_hydration: bool,
}

/// The curated source catalog. Credibility weights are editorial judgment,
/// revised as sources prove out.
pub static CATALOG: &[SourceProfile] = &[
    // Competitions
    SourceProfile {
        id: "dwwa",
        name: "Decanter World Wine Awards",
        domain: "awards.decanter.com",
        lens: Lens::Competition,
        credibility: 0.95,
        markets: &[],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "iwsc",
        name: "International Wine & Spirit Competition",
        domain: "iwsc.net",
        lens: Lens::Competition,
        credibility: 0.9,
        markets: &[],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "iwc",
        name: "International Wine Challenge",
        domain: "internationalwinechallenge.com",
        lens: Lens::Competition,
        credibility: 0.9,
        markets: &[],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "cmb",
        name: "Concours Mondial de Bruxelles",
        domain: "concoursmondial.com",
        lens: Lens::Competition,
        credibility: 0.85,
        markets: &[],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "mundus-vini",
        name: "Mundus Vini",
        domain: "mundusvini.com",
        lens: Lens::Competition,
        credibility: 0.8,
        markets: &[Market::Germany, Market::Spain, Market::Italy],
        requires_unlock: false,
        spa_hydration: false,
    },
    // Critics
    SourceProfile {
        id: "robert-parker",
        name: "Robert Parker Wine Advocate",
        domain: "robertparker.com",
        lens: Lens::Critic,
        credibility: 0.95,
        markets: &[],
        requires_unlock: true,
        spa_hydration: false,
    },
    SourceProfile {
        id: "james-suckling",
        name: "James Suckling",
        domain: "jamessuckling.com",
        lens: Lens::Critic,
        credibility: 0.9,
        markets: &[],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "wine-spectator",
        name: "Wine Spectator",
        domain: "winespectator.com",
        lens: Lens::Critic,
        credibility: 0.9,
        markets: &[Market::Us, Market::France, Market::Italy],
        requires_unlock: true,
        spa_hydration: false,
    },
    SourceProfile {
        id: "jancis-robinson",
        name: "JancisRobinson.com",
        domain: "jancisrobinson.com",
        lens: Lens::Critic,
        credibility: 0.9,
        markets: &[Market::Uk, Market::France],
        requires_unlock: true,
        spa_hydration: false,
    },
    SourceProfile {
        id: "vinous",
        name: "Vinous",
        domain: "vinous.com",
        lens: Lens::Critic,
        credibility: 0.85,
        markets: &[Market::Us, Market::Italy, Market::France],
        requires_unlock: true,
        spa_hydration: false,
    },
    SourceProfile {
        id: "falstaff",
        name: "Falstaff",
        domain: "falstaff.com",
        lens: Lens::Critic,
        credibility: 0.8,
        markets: &[Market::Germany],
        requires_unlock: false,
        spa_hydration: false,
    },
    // Panels / guides
    SourceProfile {
        id: "guia-penin",
        name: "Guía Peñín",
        domain: "guiapenin.wine",
        lens: Lens::Panel,
        credibility: 0.9,
        markets: &[Market::Spain],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "gambero-rosso",
        name: "Gambero Rosso",
        domain: "gamberorosso.it",
        lens: Lens::Panel,
        credibility: 0.85,
        markets: &[Market::Italy],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "halliday",
        name: "Halliday Wine Companion",
        domain: "winecompanion.com.au",
        lens: Lens::Panel,
        credibility: 0.9,
        markets: &[Market::Australia],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "platters",
        name: "Platter's Wine Guide",
        domain: "wineonaplatter.com",
        lens: Lens::Panel,
        credibility: 0.85,
        markets: &[Market::SouthAfrica],
        requires_unlock: false,
        spa_hydration: false,
    },
    SourceProfile {
        id: "rvf",
        name: "La Revue du Vin de France",
        domain: "larvf.com",
        lens: Lens::Panel,
        credibility: 0.85,
        markets: &[Market::France],
        requires_unlock: false,
        spa_hydration: false,
    },
    // Community
    SourceProfile {
        id: "vivino",
        name: "Vivino",
        domain: "vivino.com",
        lens: Lens::Community,
        credibility: 0.6,
        markets: &[],
        requires_unlock: true,
        spa_hydration: true,
    },
    SourceProfile {
        id: "cellartracker",
        name: "CellarTracker",
        domain: "cellartracker.com",
        lens: Lens::Community,
        credibility: 0.7,
        markets: &[],
        requires_unlock: false,
        spa_hydration: true,
    },
    // Aggregators
    SourceProfile {
        id: "wine-searcher",
        name: "Wine-Searcher",
        domain: "wine-searcher.com",
        lens: Lens::Aggregator,
        credibility: 0.75,
        markets: &[],
        requires_unlock: true,
        spa_hydration: false,
    },
];

/// Sources worth querying for a wine from the given market.
pub fn sources_for_market(market: Market) -> Vec<&'static SourceProfile> {
    CATALOG
        .iter()
        .filter(|s| s.markets.is_empty() || s.markets.contains(&market))
        .collect()
}

/// Look a source up by its home domain.
pub fn source_for_domain(domain: &str) -> Option<&'static SourceProfile> {
    CATALOG.iter().find(|s| domain_matches(domain, s.domain))
}

/// Does the candidate domain belong to `source_domain` (exact or subdomain)?
fn domain_matches(candidate: &str, source_domain: &str) -> bool {
    candidate == source_domain || candidate.ends_with(&format!(".{source_domain}"))
}

/// Domains whose scores carry editorial authority; rewarded in fetch priority.
pub fn is_authoritative_domain(domain: &str) -> bool {
    source_for_domain(domain)
        .map(|s| matches!(s.lens, Lens::Critic | Lens::Panel) && s.credibility >= 0.85)
        .unwrap_or(false)
}

/// Competition domains get their own fetch-priority reward.
pub fn is_competition_domain(domain: &str) -> bool {
    source_for_domain(domain)
        .map(|s| s.lens == Lens::Competition)
        .unwrap_or(false)
}

/// Does this domain need the unlocker (catalog flag or configured override)?
pub fn requires_unlock(domain: &str, extra_unlock_domains: &[String]) -> bool {
    if source_for_domain(domain)
        .map(|s| s.requires_unlock)
        .unwrap_or(false)
    {
        return true;
    }
    extra_unlock_domains
        .iter()
        .any(|d| domain_matches(domain, d))
}

/// Is this a known SPA whose content hides in a hydration payload?
pub fn is_spa_domain(domain: &str) -> bool {
    source_for_domain(domain)
        .map(|s| s.spa_hydration)
        .unwrap_or(false)
}

/// Trust multiplier per lens, used by the confidence aggregate.
pub fn lens_trust(lens: Lens) -> f32 {
    match lens {
        Lens::Producer => 1.5,
        Lens::Competition | Lens::Critic | Lens::Panel => 1.2,
        Lens::Aggregator => 1.0,
        Lens::Community => 0.8,
    }
}

/// Per-lens survivor caps for the final candidate pool.
#[derive(Debug, Clone, Copy)]
pub struct LensCaps {
    pub competition: usize,
    pub critic: usize,
    pub panel: usize,
    pub community: usize,
    pub aggregator: usize,
    pub producer: usize,
}

impl LensCaps {
    pub fn cap_for(&self, lens: Lens) -> usize {
        match lens {
            Lens::Competition => self.competition,
            Lens::Critic => self.critic,
            Lens::Panel => self.panel,
            Lens::Community => self.community,
            Lens::Aggregator => self.aggregator,
            Lens::Producer => self.producer,
        }
    }
}

/// No single lens may crowd the pool past these counts.
pub const GLOBAL_CANDIDATE_CAP: usize = 8;

/// Cap table keyed by origin market. Markets with a strong national guide
/// give the panel lens more room; the US/UK lean on critics.
pub fn lens_caps(market: Market) -> LensCaps {
    match market {
        Market::Spain | Market::Italy | Market::France | Market::Germany
        | Market::Australia | Market::SouthAfrica => LensCaps {
            competition: 2,
            critic: 2,
            panel: 2,
            community: 1,
            aggregator: 1,
            producer: 1,
        },
        Market::Us | Market::Uk => LensCaps {
            competition: 2,
            critic: 3,
            panel: 1,
            community: 1,
            aggregator: 1,
            producer: 1,
        },
        Market::Other => LensCaps {
            competition: 2,
            critic: 2,
            panel: 1,
            community: 1,
            aggregator: 1,
            producer: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_filter_keeps_worldwide_sources() {
        let spain = sources_for_market(Market::Spain);
        assert!(spain.iter().any(|s| s.id == "guia-penin"));
        assert!(spain.iter().any(|s| s.id == "dwwa"));
        assert!(!spain.iter().any(|s| s.id == "halliday"));
    }

    #[test]
    fn domain_lookup_matches_subdomains() {
        assert_eq!(source_for_domain("vivino.com").unwrap().id, "vivino");
        assert_eq!(source_for_domain("fr.vivino.com").unwrap().id, "vivino");
        assert!(source_for_domain("notvivino.com").is_none());
    }

    #[test]
    fn authority_and_competition_sets_are_disjoint() {
        assert!(is_authoritative_domain("robertparker.com"));
        assert!(!is_authoritative_domain("vivino.com"));
        assert!(is_competition_domain("iwsc.net"));
        assert!(!is_competition_domain("robertparker.com"));
    }

    #[test]
    fn unlock_respects_config_overrides() {
        assert!(requires_unlock("wine-searcher.com", &[]));
        assert!(!requires_unlock("iwsc.net", &[]));
        assert!(requires_unlock("iwsc.net", &["iwsc.net".to_string()]));
    }

    #[test]
    fn caps_sum_covers_global_cap() {
        for market in [Market::Spain, Market::Us, Market::Other] {
            let caps = lens_caps(market);
            let total = caps.competition + caps.critic + caps.panel
                + caps.community + caps.aggregator + caps.producer;
            assert!(total >= GLOBAL_CANDIDATE_CAP);
        }
    }
}
