//! Error types for the storyslides library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`SlideGenError`] (**fatal**): the run cannot continue (feed unreachable,
//!   Chrome failed to start, translation failed under the `Abort` policy).
//!   Returned as `Err(SlideGenError)` from the top-level entry points.
//!
//! * [`SlideError`] (**non-fatal**): a single slide failed to render, crop or
//!   write. Stored inside [`crate::output::SlideResult`]; every other slide of
//!   the story and every other story still gets generated.
//!
//! Ledger absence or corruption is neither: it is treated as a first run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the storyslides library.
#[derive(Debug, Error)]
pub enum SlideGenError {
    // ── Feed errors ───────────────────────────────────────────────────────
    /// The feed request failed (DNS, TLS, non-2xx status).
    #[error("Failed to fetch feed '{url}': {reason}\nCheck your internet connection.")]
    FeedFetchFailed { url: String, reason: String },

    /// The feed request exceeded the configured timeout.
    #[error("Feed request timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    FeedTimeout { url: String, secs: u64 },

    /// The feed body was not a listing we understand.
    #[error("Feed '{source_name}' is not a valid listing: {detail}")]
    FeedParseFailed { source_name: String, detail: String },

    /// A local feed file was requested but does not exist.
    #[error("Feed file not found: '{path}'")]
    FeedFileNotFound { path: PathBuf },

    // ── Rendering errors ──────────────────────────────────────────────────
    /// Headless Chrome could not be started.
    #[error(
        "Failed to start headless Chrome: {0}\n\
Install Chrome/Chromium or point --chrome-path at an existing binary.\n\
Inside containers, try --no-sandbox."
    )]
    BrowserLaunchFailed(String),

    /// The configured slide template does not exist.
    #[error("Slide template not found: '{path}'")]
    TemplateNotFound { path: PathBuf },

    // ── Translation errors ────────────────────────────────────────────────
    /// Additional languages were requested but no translator could be built.
    #[error("Translator '{backend}' is not configured.\n{hint}")]
    TranslatorNotConfigured { backend: String, hint: String },

    /// Translation into a language failed after all retries.
    #[error("Translation to {language} failed: {detail}")]
    TranslationFailed { language: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// The ledger snapshot could not be written.
    #[error("Failed to write ledger '{path}': {source}")]
    LedgerWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A story folder or text file could not be written.
    #[error("Failed to write output '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Removing generated state failed.
    #[error("Failed to remove '{path}': {source}")]
    ResetFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single slide.
///
/// `slide` is the 0-based slide number, matching the `slide_<n>.png` name.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum SlideError {
    /// The renderer failed to produce a screenshot.
    #[error("Slide {slide}: render failed: {detail}")]
    RenderFailed { slide: usize, detail: String },

    /// The screenshot could not be decoded or cropped.
    #[error("Slide {slide}: crop failed: {detail}")]
    CropFailed { slide: usize, detail: String },

    /// The PNG could not be written to disk.
    #[error("Slide {slide}: write failed: {detail}")]
    WriteFailed { slide: usize, detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_failed_display() {
        let e = SlideGenError::TranslationFailed {
            language: "French".into(),
            detail: "quota exceeded".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("French"), "got: {msg}");
        assert!(msg.contains("quota exceeded"));
    }

    #[test]
    fn feed_timeout_display() {
        let e = SlideGenError::FeedTimeout {
            url: "https://www.reddit.com/r/x/top/.json".into(),
            secs: 30,
        };
        assert!(e.to_string().contains("30s"));
    }

    #[test]
    fn browser_launch_hint() {
        let e = SlideGenError::BrowserLaunchFailed("no binary".into());
        assert!(e.to_string().contains("--chrome-path"));
    }

    #[test]
    fn slide_error_display_names_slide() {
        let e = SlideError::RenderFailed {
            slide: 4,
            detail: "tab crashed".into(),
        };
        assert_eq!(e.to_string(), "Slide 4: render failed: tab crashed");
    }

    #[test]
    fn slide_error_serialises() {
        let e = SlideError::WriteFailed {
            slide: 0,
            detail: "disk full".into(),
        };
        let json = serde_json::to_string(&e).expect("serialise");
        assert!(json.contains("WriteFailed"));
    }
}
