//! URL helpers shared by the extraction engine

use url::Url;

/// Whether `candidate` starts with an RFC 3986 scheme (`http:`, `https:`, `data:`...)
fn has_scheme(candidate: &str) -> bool {
    let Some((scheme, _)) = candidate.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// `scheme://host[:port]` of a parsed URL
fn origin(base: &Url) -> String {
    let host = base.host_str().unwrap_or_default();
    match base.port() {
        Some(port) => format!("{}://{}:{}", base.scheme(), host, port),
        None => format!("{}://{}", base.scheme(), host),
    }
}

/// Base URL with its last path segment removed, without a trailing slash
fn directory(base: &Url) -> String {
    let segments: Vec<&str> = base
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    match segments.split_last() {
        Some((_, parents)) if !parents.is_empty() => {
            format!("{}/{}", origin(base), parents.join("/"))
        }
        _ => origin(base),
    }
}

/// Make `relative` absolute against the page it was found on
///
/// Absolute URLs are returned unchanged, root-relative paths are joined to the
/// base's scheme and host, and anything else is joined to the base's
/// directory (the base without its last path segment).
///
/// ```
/// use stream_finder::parser::resolve_url;
///
/// assert_eq!(resolve_url("https://site.com/phim/1/", "/phim/2/"), "https://site.com/phim/2/");
/// assert_eq!(resolve_url("https://site.com/phim/1/", "ep3"), "https://site.com/phim/ep3");
/// assert_eq!(resolve_url("https://site.com/phim/1/", "http://other.com/x"), "http://other.com/x");
/// ```
pub fn resolve_url(base: &str, relative: &str) -> String {
    let relative = relative.trim();
    if relative.is_empty() {
        return base.to_string();
    }
    if has_scheme(relative) {
        return relative.to_string();
    }

    let Ok(base_url) = Url::parse(base) else {
        tracing::debug!("Cannot resolve '{}' against unparsable base '{}'", relative, base);
        return relative.to_string();
    };

    if relative.starts_with("//") {
        format!("{}:{}", base_url.scheme(), relative)
    } else if relative.starts_with('/') {
        format!("{}{}", origin(&base_url), relative)
    } else {
        format!("{}/{}", directory(&base_url), relative)
    }
}

/// Short identifier of a page: the last non-empty path segment of its URL
///
/// Returns an empty string when the URL has no path segments.
pub fn extract_id(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        if parsed.has_host() {
            return parsed
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .unwrap_or_default()
                .to_string();
        }
    }

    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.trim_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// URL inside a CSS `url(...)`, as used by `background-image` posters
pub fn extract_url_from_style(style: &str) -> String {
    let Some(start) = style.find("url(") else {
        return String::new();
    };
    let rest = &style[start + 4..];
    let Some(end) = rest.find(')') else {
        return String::new();
    };
    rest[..end].trim().trim_matches(['\'', '"']).trim().to_string()
}
