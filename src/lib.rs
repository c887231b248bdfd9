//! # storyslides
//!
//! Turn the top posts of a subreddit into sets of fixed-size slide images,
//! ready to be laid over short-form video.
//!
//! ## Why this crate?
//!
//! Doing this by hand means copying a story, chopping it into screen-sized
//! pieces without cutting sentences in half, and screenshotting each piece,
//! then doing it all again for every language. This crate automates the whole
//! loop and remembers what it already did, so it can run from cron every day
//! and only ever produce slides for stories it has not seen.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Reddit top listing
//!  │
//!  ├─ 1. Feed      fetch `/r/<sub>/top/.json` (or read a saved listing)
//!  ├─ 2. Ledger    skip stories already recorded in processed_stories.json
//!  ├─ 3. Segment   clean text, pack whole sentences into ≤ N-char slides
//!  ├─ 4. Render    headless Chrome fills the HTML template (spawn_blocking)
//!  ├─ 5. Crop      266×720 PNG per slide → images/English/story_<n>/
//!  ├─ 6. Record    story saved to the ledger before any translation
//!  └─ 7. Translate optional extra languages (LLM or Google) → images/<Lang>/
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storyslides::{generate, GenerationConfig, Language};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Translator auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let config = GenerationConfig::builder()
//!         .language(Language::new("Ukrainian", "uk"))
//!         .language(Language::new("French", "fr"))
//!         .build()?;
//!     let report = generate(&config).await?;
//!     eprintln!("{} new stories, {} already done",
//!         report.stats.generated,
//!         report.stats.skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `storyslides` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! storyslides = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod ledger;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    GenerationConfig, GenerationConfigBuilder, Language, TopWindow, TranslationBackend,
    TranslationFailurePolicy,
};
pub use error::{SlideError, SlideGenError};
pub use generate::{
    generate, generate_sync, inspect_ledger, reset, resolve_translator, SlideGenerator,
};
pub use ledger::{LedgerState, LedgerStore, ProcessedStory};
pub use output::{
    LanguageOutput, ResetSummary, RunReport, RunStats, SlideResult, StoryOutcome, StoryStatus,
};
pub use pipeline::feed::{fetch_feed, FeedItem};
pub use pipeline::render::{ChromeRenderer, RenderError, SlideRenderer};
pub use pipeline::segment::split_into_slides;
pub use pipeline::translate::{GoogleTranslator, LlmTranslator, TranslateError, Translator};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{generate_feed_stream, generate_stream, StoryStream};
