//! Pure URL scoping and classification rules.
//!
//! These never perform I/O and never gate on crawl state; the orchestrator
//! and link discovery both filter through them.

use url::Url;

/// Paths that are system/admin surface rather than public content.
pub const SKIP_PREFIXES: &[&str] = &[
    "/admin",
    "/core",
    "/modules",
    "/themes",
    "/sites/default/files",
    "/user",
    "/update.php",
    "/install.php",
    "/cron",
    "/batch",
    "/search",
    "/node/add",
    "/media/add",
];

/// Extensions that never render as HTML pages.
pub const SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg",
    ".pdf", ".doc", ".docx", ".xls", ".xlsx",
    ".css", ".js", ".woff", ".woff2", ".ttf",
    ".zip", ".gz", ".tar",
];

/// True if the URL is out of audit scope by path prefix or file extension.
///
/// Accepts either an absolute URL or a bare path. Case-insensitive on the
/// path component.
pub fn should_skip(url: &str) -> bool {
    let path = Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string());
    let path = path.to_ascii_lowercase();

    SKIP_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
        || SKIP_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Derive a human-readable category from the first path segment.
pub fn categorise_path(path: &str) -> String {
    path.split('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
        .unwrap_or_else(|| "homepage".to_string())
}

/// True for links that stay on the base host and use a navigable scheme.
///
/// Relative links count as internal; absolute links must share the base
/// host exactly.
pub fn is_internal(href: &str, base: &str) -> bool {
    if href.is_empty() {
        return false;
    }
    if href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("javascript:")
        || href.starts_with('#')
    {
        return false;
    }

    match Url::parse(href) {
        Ok(parsed) => {
            let base_host = Url::parse(base)
                .ok()
                .and_then(|u| u.host_str().map(String::from));
            parsed.host_str().map(String::from) == base_host
        }
        // Relative reference, resolves against the base host.
        Err(_) => true,
    }
}

/// Trailing-slash-stripped form used as the visited-set equality key.
pub fn normalise_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Extract the path component from a URL, falling back to "/".
pub fn path_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() { "/".to_string() } else { path }
        })
        .unwrap_or_else(|| "/".to_string())
}

/// Filesystem-safe name derived from a URL path, for screenshot files.
pub fn safe_filename(path: &str) -> String {
    let cleaned: String = path
        .trim_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "root".to_string()
    } else {
        cleaned
    }
}
