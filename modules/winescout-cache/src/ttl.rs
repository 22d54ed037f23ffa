use winescout_common::FetchStatus;

use crate::entry::CacheKind;

/// Per-kind default TTLs in hours.
const SEARCH_TTL_HOURS: i64 = 168; // 7 days
const PAGE_TTL_HOURS: i64 = 24;
const EXTRACTION_TTL_HOURS: i64 = 720; // 30 days
const URL_META_TTL_HOURS: i64 = 168;

/// Short TTLs for terminal failures, so retries happen soon but not
/// unconditionally.
const BLOCKED_TTL_HOURS: i64 = 4;
const TIMEOUT_TTL_HOURS: i64 = 2;
const ERROR_TTL_HOURS: i64 = 6;
const INSUFFICIENT_TTL_HOURS: i64 = 12;
const GONE_TTL_HOURS: i64 = 720;

/// Resolves a TTL for a cache write: per-domain overrides for failed fetches
/// first, then status-specific short TTLs, then the kind default.
#[derive(Debug, Clone, Default)]
pub struct TtlPolicy {
    /// (domain, hours) pairs for domains known to block or flake, applied to
    /// non-success page statuses only.
    short_ttl_domains: Vec<(String, i64)>,
}

impl TtlPolicy {
    pub fn new(short_ttl_domains: Vec<(String, i64)>) -> Self {
        Self { short_ttl_domains }
    }

    pub fn resolve(
        &self,
        kind: CacheKind,
        domain: Option<&str>,
        fetch_status: Option<FetchStatus>,
    ) -> i64 {
        if let Some(status) = fetch_status {
            if status != FetchStatus::Success {
                if let Some(domain) = domain {
                    for (d, hours) in &self.short_ttl_domains {
                        if domain.ends_with(d.as_str()) {
                            return *hours;
                        }
                    }
                }
                return match status {
                    FetchStatus::Blocked => BLOCKED_TTL_HOURS,
                    FetchStatus::Timeout => TIMEOUT_TTL_HOURS,
                    FetchStatus::Error => ERROR_TTL_HOURS,
                    FetchStatus::Insufficient => INSUFFICIENT_TTL_HOURS,
                    FetchStatus::Gone => GONE_TTL_HOURS,
                    FetchStatus::Success => unreachable!(),
                };
            }
        }

        match kind {
            CacheKind::Search => SEARCH_TTL_HOURS,
            CacheKind::Page => PAGE_TTL_HOURS,
            CacheKind::Extraction => EXTRACTION_TTL_HOURS,
            CacheKind::UrlMeta => URL_META_TTL_HOURS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_defaults_apply_on_success() {
        let policy = TtlPolicy::default();
        assert_eq!(policy.resolve(CacheKind::Search, None, None), 168);
        assert_eq!(
            policy.resolve(CacheKind::Page, Some("decanter.com"), Some(FetchStatus::Success)),
            24
        );
        assert_eq!(policy.resolve(CacheKind::Extraction, None, None), 720);
    }

    #[test]
    fn failure_statuses_get_short_ttls() {
        let policy = TtlPolicy::default();
        let blocked = policy.resolve(CacheKind::Page, Some("x.com"), Some(FetchStatus::Blocked));
        let timeout = policy.resolve(CacheKind::Page, Some("x.com"), Some(FetchStatus::Timeout));
        assert!(blocked < PAGE_TTL_HOURS);
        assert!(timeout < blocked);
    }

    #[test]
    fn domain_override_beats_status_ttl() {
        let policy = TtlPolicy::new(vec![("vivino.com".into(), 1)]);
        assert_eq!(
            policy.resolve(CacheKind::Page, Some("vivino.com"), Some(FetchStatus::Blocked)),
            1
        );
        // Other domains still get the status TTL.
        assert_eq!(
            policy.resolve(CacheKind::Page, Some("decanter.com"), Some(FetchStatus::Blocked)),
            BLOCKED_TTL_HOURS
        );
    }

    #[test]
    fn domain_override_ignored_on_success() {
        let policy = TtlPolicy::new(vec![("vivino.com".into(), 1)]);
        assert_eq!(
            policy.resolve(CacheKind::Page, Some("vivino.com"), Some(FetchStatus::Success)),
            PAGE_TTL_HOURS
        );
    }
}
