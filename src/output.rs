//! Result types returned by a generation run.
//!
//! Everything here is `Serialize` so the CLI can print a run as JSON.

use crate::error::SlideError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of rendering one slide.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideResult {
    /// 0-based slide number; matches `slide_<n>.png`.
    pub slide_num: usize,
    /// Where the PNG was (or would have been) written.
    pub path: PathBuf,
    /// Length of the slide text in characters.
    pub chars: usize,
    pub duration_ms: u64,
    /// Set when the slide was skipped.
    pub error: Option<SlideError>,
}

/// Slides produced for one language folder of a story.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageOutput {
    /// Folder name under the output root, e.g. `English` or `French`.
    pub language: String,
    pub slides: Vec<SlideResult>,
    /// Set when translating into this language failed and the run went on.
    pub translation_error: Option<String>,
}

impl LanguageOutput {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            slides: Vec::new(),
            translation_error: None,
        }
    }

    pub fn rendered(&self) -> usize {
        self.slides.iter().filter(|s| s.error.is_none()).count()
    }

    pub fn failed(&self) -> usize {
        self.slides.iter().filter(|s| s.error.is_some()).count()
    }
}

/// What happened to one feed item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoryStatus {
    /// Already in the ledger; nothing was done.
    Skipped,
    /// No complete sentence in the text; nothing was written or recorded.
    Empty,
    /// A folder was allocated, slides were rendered and the story recorded.
    Generated,
}

/// Outcome for one feed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryOutcome {
    pub url: String,
    pub status: StoryStatus,
    /// `story_<n>` when generated.
    pub folder_name: Option<String>,
    /// Primary language first, then additional languages in config order.
    pub languages: Vec<LanguageOutput>,
}

impl StoryOutcome {
    pub fn skipped(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: StoryStatus::Skipped,
            folder_name: None,
            languages: Vec::new(),
        }
    }

    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status: StoryStatus::Empty,
            folder_name: None,
            languages: Vec::new(),
        }
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunStats {
    pub fetched: usize,
    pub skipped: usize,
    pub empty: usize,
    pub generated: usize,
    pub rendered_slides: usize,
    pub failed_slides: usize,
    /// Language folders completed through translation.
    pub translated_languages: usize,
    /// Language folders abandoned under the skip policy.
    pub failed_languages: usize,
    pub total_duration_ms: u64,
}

impl RunStats {
    /// Fold one story outcome into the counters.
    pub fn record(&mut self, outcome: &StoryOutcome, primary_language: &str) {
        match outcome.status {
            StoryStatus::Skipped => self.skipped += 1,
            StoryStatus::Empty => self.empty += 1,
            StoryStatus::Generated => self.generated += 1,
        }
        for lang in &outcome.languages {
            self.rendered_slides += lang.rendered();
            self.failed_slides += lang.failed();
            if lang.language != primary_language {
                if lang.translation_error.is_some() {
                    self.failed_languages += 1;
                } else {
                    self.translated_languages += 1;
                }
            }
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub stories: Vec<StoryOutcome>,
    pub stats: RunStats,
}

/// What `reset` removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetSummary {
    /// The output tree existed and was deleted.
    pub removed_output: bool,
    /// The ledger file existed and was deleted.
    pub removed_ledger: bool,
}
