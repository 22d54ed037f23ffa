/// Strip tracking parameters from URLs so the same page deduplicates to the
/// same candidate regardless of which search surfaced it.
pub fn sanitize_url(url: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "fbclid",
        "gclid",
        "utm_source",
        "utm_medium",
        "utm_campaign",
        "utm_term",
        "utm_content",
        "ref",
        "mc_cid",
        "mc_eid",
        "srsltid",
    ];

    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.to_string();
    };

    if parsed.query().is_none() {
        return url.to_string();
    }

    let clean_pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if clean_pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
    }

    parsed.to_string()
}

/// Registrable host of a URL, lowercased, with a leading "www." removed.
/// Returns an empty string for unparseable input.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .map(|h| h.trim_start_matches("www.").to_string())
        .unwrap_or_default()
}

/// Does this URL point at a downloadable document rather than a page?
/// Document fetches consume their own budget.
pub fn is_document_url(url: &str) -> bool {
    const DOC_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xls", ".xlsx"];

    let path = url::Url::parse(url)
        .ok()
        .map(|u| u.path().to_lowercase())
        .unwrap_or_else(|| url.to_lowercase());

    DOC_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}
