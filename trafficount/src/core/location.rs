//! Camera location lookup
//!
//! Camera pages usually carry a descriptive `<title>`; when the video source
//! is such a page, its title makes a better report label than a hand-typed
//! one. Direct HLS playlists (`.m3u8`) have no title and are skipped.

use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

/// Timeout for the title lookup, kept short so startup isn't blocked
pub const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Branding prefixes removed from page titles
const TITLE_PREFIXES: &[&str] = &["EarthCam - "];

fn title_regex() -> &'static Regex {
    static TITLE: OnceLock<Regex> = OnceLock::new();
    TITLE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title pattern"))
}

/// Extracts a cleaned-up `<title>` from an HTML page
pub fn extract_title(html: &str) -> Option<String> {
    let raw = title_regex().captures(html)?.get(1)?.as_str();
    let mut title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    for prefix in TITLE_PREFIXES {
        if let Some(stripped) = title.strip_prefix(prefix) {
            title = stripped.to_string();
        }
    }

    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Whether a source URL points at a page worth fetching for a title
pub fn is_page_url(source: &str) -> bool {
    let lower = source.trim().to_ascii_lowercase();
    (lower.starts_with("http://") || lower.starts_with("https://")) && !lower.ends_with(".m3u8")
}

/// Fetches the page title of a camera page
pub async fn fetch_page_title(url: &str) -> Option<String> {
    if !is_page_url(url) {
        return None;
    }

    info!("Looking up location name from {}", url);
    let client = match reqwest::Client::builder().timeout(LOOKUP_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to create HTTP client for location lookup: {}", e);
            return None;
        }
    };

    let response = match client.get(url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            warn!("Location lookup returned {}", response.status());
            return None;
        }
        Err(e) => {
            warn!("Could not fetch location page: {}", e);
            return None;
        }
    };

    match response.text().await {
        Ok(body) => extract_title(&body),
        Err(e) => {
            warn!("Could not read location page: {}", e);
            None
        }
    }
}

/// Resolves the report location label: the page title of `video_source` when
/// available, otherwise `fallback`
pub async fn resolve_location(video_source: Option<&str>, fallback: &str) -> String {
    if let Some(source) = video_source {
        if let Some(title) = fetch_page_title(source).await {
            info!("Detected location name: {}", title);
            return title;
        }
    }

    info!("Using configured location name: {}", fallback);
    fallback.to_string()
}
