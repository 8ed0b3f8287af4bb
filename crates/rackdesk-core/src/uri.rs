//! Base URI helpers shared by the generated configuration and the client cache

use reqwest::Url;

/// Canonical form of a base URI: scheme, host, port and path, no trailing slash.
///
/// Default ports are dropped and scheme/host are lowercased, so
/// `HTTP://Host:80/inv/` and `http://host/inv` are the same key. Strings that do
/// not parse as absolute URLs are only trimmed.
pub fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) if url.has_host() => {
            url.set_query(None);
            url.set_fragment(None);
            url.as_str().trim_end_matches('/').to_string()
        }
        _ => trimmed.trim_end_matches('/').to_string(),
    }
}

/// `<root>/<segment>` with exactly one slash between the parts
pub fn join_segment(root: &str, segment: &str) -> String {
    let root = root.trim_end_matches('/');
    let segment = segment.trim_matches('/');
    if segment.is_empty() {
        root.to_string()
    } else {
        format!("{}/{}", root, segment)
    }
}

/// Resolve a per-service base against an origin.
///
/// - `http(s)://...` is used unchanged
/// - `:port` or `:port/path` keeps the origin's host and swaps in the port
/// - anything else is joined onto the origin as a path
pub fn resolve_against_origin(origin: &Url, base: &str) -> Option<String> {
    let base = base.trim();

    if let Ok(url) = Url::parse(base) {
        if matches!(url.scheme(), "http" | "https") && url.has_host() {
            return Some(normalize_base_uri(url.as_str()));
        }
    }

    if let Some(rest) = base.strip_prefix(':') {
        let (port, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, ""),
        };
        let port: u16 = port.parse().ok()?;
        let mut url = origin.clone();
        url.set_port(Some(port)).ok()?;
        url.set_path(path);
        return Some(normalize_base_uri(url.as_str()));
    }

    let mut root = origin.clone();
    root.set_query(None);
    root.set_fragment(None);
    let root = root.as_str().trim_end_matches('/').to_string();
    Some(normalize_base_uri(&join_segment(&root, base)))
}
