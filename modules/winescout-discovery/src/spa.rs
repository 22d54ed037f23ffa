// Hydration-payload extraction for single-page-app rating sites.
//
// SPA pages ship their ratings inside an embedded JSON blob and render an
// almost-empty DOM, so tag-stripping yields nothing useful. Pulling the
// hydration payload out first recovers the structured content.

use serde_json::Value;

/// Upper bound on the flattened text, before the caller's own truncation.
const MAX_FLATTENED_LEN: usize = 20_000;

/// Extract and flatten the hydration JSON from a known SPA page.
/// Returns None when no parseable payload is present; callers then fall back
/// to generic tag-stripping.
pub fn extract_hydration_text(html: &str) -> Option<String> {
    let json = extract_next_data(html).or_else(|| extract_preloaded_state(html))?;
    let value: Value = serde_json::from_str(&json).ok()?;

    let mut out = String::new();
    flatten(&value, "", &mut out);
    let trimmed = out.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Next.js: <script id="__NEXT_DATA__" type="application/json">{...}</script>
fn extract_next_data(html: &str) -> Option<String> {
    let re = regex::Regex::new(
        r#"(?s)<script[^>]*id="__NEXT_DATA__"[^>]*>(.*?)</script>"#,
    )
    .expect("valid regex");
    re.captures(html).map(|c| c[1].to_string())
}

/// Redux-style: window.__PRELOADED_STATE__ = {...};
fn extract_preloaded_state(html: &str) -> Option<String> {
    let start = html.find("window.__PRELOADED_STATE__")?;
    let brace = html[start..].find('{')? + start;
    let json = balanced_json(&html[brace..])?;
    Some(json.to_string())
}

/// Slice out one balanced JSON object, string-aware.
fn balanced_json(s: &str) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                '\\' if !escaped => escaped = true,
                '"' if !escaped => in_string = false,
                _ => escaped = false,
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Flatten scalar leaves into "key: value" lines. Deep framework noise
/// (build manifests, route tables) contributes short tokens that the
/// identity scorer ignores.
fn flatten(value: &Value, key: &str, out: &mut String) {
    if out.len() >= MAX_FLATTENED_LEN {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten(v, k, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                flatten(item, key, out);
            }
        }
        Value::String(s) => {
            if s.len() >= 3 {
                push_line(out, key, s);
            }
        }
        Value::Number(n) => push_line(out, key, &n.to_string()),
        Value::Bool(_) | Value::Null => {}
    }
}

fn push_line(out: &mut String, key: &str, value: &str) {
    if key.is_empty() {
        out.push_str(value);
    } else {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
    }
    out.push('\n');
}
