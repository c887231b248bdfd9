//! Progress-callback trait for per-story and per-slide generation events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the feed.
//!
//! Callbacks are invoked from the single pipeline task, strictly in
//! processing order: story by story, slide by slide, language by language.
//!
//! # Example
//!
//! ```rust
//! use storyslides::{GenerationConfig, GenerationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl GenerationProgressCallback for CountingCallback {
//!     fn on_slide_rendered(&self, folder: &str, language: &str, slide_num: usize, total: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{language}/{folder}: slide {}/{}", slide_num + 1, total);
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { rendered: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each story.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. `Send + Sync` so the callback can be shared with a
/// progress-bar thread.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called once after the feed is fetched, before any story is examined.
    fn on_run_start(&self, total_items: usize) {
        let _ = total_items;
    }

    /// Called when a story is already in the ledger and is skipped.
    fn on_story_skipped(&self, url: &str) {
        let _ = url;
    }

    /// Called when a story has no complete sentence and produces no slides.
    /// It is not recorded and will be examined again next run.
    fn on_story_empty(&self, url: &str) {
        let _ = url;
    }

    /// Called when a new story has been segmented and assigned a folder.
    ///
    /// # Arguments
    /// * `url`: source URL of the story
    /// * `folder_name`: `story_<index>`
    /// * `slide_count`: slides produced by segmentation
    fn on_story_start(&self, url: &str, folder_name: &str, slide_count: usize) {
        let _ = (url, folder_name, slide_count);
    }

    /// Called after a slide PNG is written.
    ///
    /// `slide_num` is 0-based.
    fn on_slide_rendered(&self, folder_name: &str, language: &str, slide_num: usize, total: usize) {
        let _ = (folder_name, language, slide_num, total);
    }

    /// Called when a slide is skipped because it failed to render or write.
    fn on_slide_error(&self, folder_name: &str, language: &str, slide_num: usize, error: &str) {
        let _ = (folder_name, language, slide_num, error);
    }

    /// Called when the story is recorded in the ledger (after the primary
    /// language set is complete, before translations).
    fn on_story_recorded(&self, url: &str, folder_name: &str) {
        let _ = (url, folder_name);
    }

    /// Called once all feed items have been examined.
    ///
    /// # Arguments
    /// * `generated`: stories newly generated in this run
    /// * `skipped`  : stories already present in the ledger
    fn on_run_complete(&self, generated: usize, skipped: usize) {
        let _ = (generated, skipped);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
