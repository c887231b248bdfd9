//! Feed resolution: turn a listing URL or a saved listing file into stories.
//!
//! The source is a Reddit listing document (`/r/<sub>/top/.json`). It is
//! either fetched over HTTP(S) or read from a local file, which is handy for
//! replaying a saved listing without hitting Reddit.
//!
//! Items come back in listing order; the orchestrator relies on that order.

use crate::error::SlideGenError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};

/// Reddit rejects requests with generic or empty user agents.
const USER_AGENT: &str = concat!("storyslides/", env!("CARGO_PKG_VERSION"), " (slide generator)");

/// One fetched story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Stable identifier of the post; the ledger's dedup key.
    pub url: String,
    /// Raw self-text of the post.
    pub text: String,
}

impl FeedItem {
    pub fn new(url: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    url: String,
    #[serde(default)]
    selftext: String,
}

/// Check if the source string looks like a URL.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Fetch the feed from a URL or read it from a local file.
pub async fn fetch_feed(source: &str, timeout_secs: u64) -> Result<Vec<FeedItem>, SlideGenError> {
    let body = if is_url(source) {
        download(source, timeout_secs).await?
    } else {
        read_local(source).await?
    };
    let items = parse_listing(source, &body)?;
    info!("Feed returned {} items", items.len());
    Ok(items)
}

/// Parse a listing document into feed items, preserving order.
pub fn parse_listing(source_name: &str, body: &str) -> Result<Vec<FeedItem>, SlideGenError> {
    let listing: Listing =
        serde_json::from_str(body).map_err(|e| SlideGenError::FeedParseFailed {
            source_name: source_name.to_string(),
            detail: e.to_string(),
        })?;

    Ok(listing
        .data
        .children
        .into_iter()
        .map(|c| FeedItem::new(c.data.url, c.data.selftext))
        .collect())
}

async fn read_local(path_str: &str) -> Result<String, SlideGenError> {
    let path = PathBuf::from(path_str);
    match tokio::fs::read_to_string(&path).await {
        Ok(body) => {
            debug!("Read feed from {}", path.display());
            Ok(body)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(SlideGenError::FeedFileNotFound { path })
        }
        Err(e) => Err(SlideGenError::FeedParseFailed {
            source_name: path_str.to_string(),
            detail: e.to_string(),
        }),
    }
}

async fn download(url: &str, timeout_secs: u64) -> Result<String, SlideGenError> {
    info!("Fetching feed: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| SlideGenError::FeedFetchFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_send_err = |e: reqwest::Error| {
        if e.is_timeout() {
            SlideGenError::FeedTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            SlideGenError::FeedFetchFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_send_err)?;

    if !response.status().is_success() {
        return Err(SlideGenError::FeedFetchFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let body = response.text().await.map_err(map_send_err)?;
    debug!("Feed body: {} bytes", body.len());
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_zzz",
            "children": [
                {"kind": "t3", "data": {"url": "https://www.reddit.com/r/pettyrevenge/comments/a1/", "selftext": "First story. It was great.", "score": 900}},
                {"kind": "t3", "data": {"url": "https://i.redd.it/pic.jpg", "selftext": ""}},
                {"kind": "t3", "data": {"url": "https://www.reddit.com/r/pettyrevenge/comments/c3/"}}
            ]
        }
    }"#;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://www.reddit.com/r/x/top/.json"));
        assert!(is_url("http://localhost:8080/listing.json"));
        assert!(!is_url("/tmp/listing.json"));
        assert!(!is_url("listing.json"));
        assert!(!is_url(""));
    }

    #[test]
    fn parse_keeps_order_and_defaults_missing_text() {
        let items = parse_listing("fixture", LISTING).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].url, "https://www.reddit.com/r/pettyrevenge/comments/a1/");
        assert_eq!(items[0].text, "First story. It was great.");
        assert_eq!(items[1].text, "");
        assert_eq!(items[2].text, "");
    }

    #[test]
    fn parse_rejects_non_listing() {
        let err = parse_listing("fixture", r#"{"error": 429}"#).unwrap_err();
        assert!(matches!(err, SlideGenError::FeedParseFailed { .. }));
    }

    #[tokio::test]
    async fn reads_local_listing() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("listing.json");
        std::fs::write(&path, LISTING).unwrap();
        let items = fetch_feed(path.to_str().unwrap(), 5).await.unwrap();
        assert_eq!(items.len(), 3);
    }

    #[tokio::test]
    async fn missing_local_listing_is_reported() {
        let err = fetch_feed("/definitely/not/here/listing.json", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, SlideGenError::FeedFileNotFound { .. }));
    }
}
