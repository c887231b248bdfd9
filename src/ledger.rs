//! Processing ledger: which stories have been generated, and the next free
//! folder index.
//!
//! [`LedgerState`] is a plain value. Every operation takes the state and
//! returns the updated one; nothing is written until the caller invokes
//! [`LedgerStore::save`]. The orchestrator saves after each story so a crash
//! loses at most the story in flight.
//!
//! On disk the ledger is a single JSON document:
//!
//! ```json
//! {
//!   "folderIndex": 3,
//!   "processedStories": [
//!     { "url": "https://www.reddit.com/r/pettyrevenge/comments/abc/", "folderName": "story_1" },
//!     { "url": "https://www.reddit.com/r/pettyrevenge/comments/def/", "folderName": "story_2" }
//!   ]
//! }
//! ```

use crate::error::SlideGenError;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Prefix of every story folder name.
pub const FOLDER_PREFIX: &str = "story_";

/// Folder name for a folder index, e.g. `story_7`.
pub fn folder_name(index: u32) -> String {
    format!("{FOLDER_PREFIX}{index}")
}

/// One story that has been generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedStory {
    /// Source URL; the dedup key.
    pub url: String,
    /// Output folder, `story_<index>`.
    pub folder_name: String,
}

/// Snapshot of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerState {
    /// Next unused folder index. Always ≥ 1 and never handed out twice.
    #[serde(rename = "folderIndex")]
    pub next_folder_index: u32,
    /// Stories in the order they were recorded.
    pub processed_stories: Vec<ProcessedStory>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            next_folder_index: 1,
            processed_stories: Vec::new(),
        }
    }
}

impl LedgerState {
    /// True if a story with this URL has been recorded.
    pub fn is_processed(&self, url: &str) -> bool {
        self.processed_stories.iter().any(|s| s.url == url)
    }

    /// Append a processed story. The folder index is not touched.
    ///
    /// Recording a URL that is already present returns the state unchanged,
    /// so URLs stay unique.
    pub fn record_processed(mut self, url: impl Into<String>, folder_name: impl Into<String>) -> Self {
        let url = url.into();
        if self.is_processed(&url) {
            return self;
        }
        self.processed_stories.push(ProcessedStory {
            url,
            folder_name: folder_name.into(),
        });
        self
    }

    /// Hand out the next folder index and advance it by exactly one.
    pub fn allocate_folder_index(mut self) -> (u32, Self) {
        let index = self.next_folder_index;
        self.next_folder_index += 1;
        (index, self)
    }

    /// Highest `story_<n>` index among recorded stories, if any parse.
    fn highest_recorded_index(&self) -> Option<u32> {
        self.processed_stories
            .iter()
            .filter_map(|s| s.folder_name.strip_prefix(FOLDER_PREFIX))
            .filter_map(|n| n.parse::<u32>().ok())
            .max()
    }

    /// Raise the next index so it is ≥ 1 and above every recorded folder.
    /// Hand-edited or truncated files otherwise could hand out a folder twice.
    fn repaired(mut self) -> Self {
        let floor = self
            .highest_recorded_index()
            .map_or(1, |n| n.saturating_add(1))
            .max(1);
        if self.next_folder_index < floor {
            warn!(
                "Ledger folderIndex {} is below {}; raising it",
                self.next_folder_index, floor
            );
            self.next_folder_index = floor;
        }
        self
    }
}

/// File-backed ledger at a fixed path.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted state.
    ///
    /// A missing, unreadable or malformed file is treated as a first run and
    /// yields [`LedgerState::default`]. This never fails.
    pub fn load(&self) -> LedgerState {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No ledger at {}; starting fresh", self.path.display());
                return LedgerState::default();
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ledger unreadable; starting fresh"
                );
                return LedgerState::default();
            }
        };

        match serde_json::from_str::<LedgerState>(&raw) {
            Ok(state) => {
                let state = state.repaired();
                debug!(
                    "Loaded ledger: {} processed stories, next index {}",
                    state.processed_stories.len(),
                    state.next_folder_index
                );
                state
            }
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ledger is malformed; starting fresh"
                );
                LedgerState::default()
            }
        }
    }

    /// Atomically replace the persisted state with `state`.
    ///
    /// Writes a temp file next to the ledger, then renames it over the old
    /// one, so readers see either the previous or the new snapshot in full.
    pub fn save(&self, state: &LedgerState) -> Result<(), SlideGenError> {
        let write_err = |source: std::io::Error| SlideGenError::LedgerWriteFailed {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| SlideGenError::Internal(format!("ledger serialisation: {e}")))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(write_err)?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;

        debug!(
            "Saved ledger: {} stories, next index {}",
            state.processed_stories.len(),
            state.next_folder_index
        );
        Ok(())
    }

    /// Delete the ledger file. Returns whether a file was removed.
    pub fn remove(&self) -> Result<bool, SlideGenError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(SlideGenError::ResetFailed {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> LedgerStore {
        LedgerStore::new(dir.path().join("processed_stories.json"))
    }

    #[test]
    fn missing_file_is_first_run() {
        let dir = TempDir::new().unwrap();
        assert_eq!(store_in(&dir).load(), LedgerState::default());
    }

    #[test]
    fn corrupt_file_is_first_run() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), "{ this is not json").unwrap();
        let state = store.load();
        assert_eq!(state.next_folder_index, 1);
        assert!(state.processed_stories.is_empty());
    }

    #[test]
    fn wrong_shape_is_first_run() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"folderIndex": "three"}"#).unwrap();
        assert_eq!(store.load(), LedgerState::default());
    }

    #[test]
    fn directory_in_place_of_file_is_first_run() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::create_dir(store.path()).unwrap();
        assert_eq!(store.load(), LedgerState::default());
    }

    #[test]
    fn allocate_advances_by_one() {
        let (first, state) = LedgerState::default().allocate_folder_index();
        let (second, state) = state.allocate_folder_index();
        assert_eq!((first, second), (1, 2));
        assert_eq!(state.next_folder_index, 3);
    }

    #[test]
    fn record_does_not_touch_index() {
        let state = LedgerState::default().record_processed("https://a", "story_1");
        assert_eq!(state.next_folder_index, 1);
        assert!(state.is_processed("https://a"));
        assert!(!state.is_processed("https://b"));
    }

    #[test]
    fn duplicate_record_is_ignored() {
        let state = LedgerState::default()
            .record_processed("https://a", "story_1")
            .record_processed("https://a", "story_9");
        assert_eq!(state.processed_stories.len(), 1);
        assert_eq!(state.processed_stories[0].folder_name, "story_1");
    }

    #[test]
    fn save_uses_documented_field_names() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let (idx, state) = LedgerState::default().allocate_folder_index();
        let state = state.record_processed("https://a", folder_name(idx));
        store.save(&state).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["folderIndex"], 2);
        assert_eq!(value["processedStories"][0]["url"], "https://a");
        assert_eq!(value["processedStories"][0]["folderName"], "story_1");
        assert!(raw.contains("\n  \"folderIndex\""), "expected 2-space pretty JSON");
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let state = LedgerState {
            next_folder_index: 4,
            processed_stories: vec![
                ProcessedStory { url: "u1".into(), folder_name: "story_1".into() },
                ProcessedStory { url: "u3".into(), folder_name: "story_3".into() },
            ],
        };
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn save_replaces_previous_content() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let big = (1..=20).fold(LedgerState::default(), |s, i| {
            s.record_processed(format!("https://example.com/{i}"), folder_name(i))
        });
        store.save(&big).unwrap();
        store.save(&LedgerState::default()).unwrap();
        assert_eq!(store.load(), LedgerState::default());
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let store = LedgerStore::new(dir.path().join("state/nested/ledger.json"));
        store.save(&LedgerState::default()).unwrap();
        assert!(store.path().exists());
    }

    #[test]
    fn load_repairs_index_below_recorded_folders() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(
            store.path(),
            r#"{"folderIndex": 2, "processedStories": [
                {"url": "a", "folderName": "story_1"},
                {"url": "b", "folderName": "story_5"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(store.load().next_folder_index, 6);
    }

    #[test]
    fn load_repairs_zero_index() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), r#"{"folderIndex": 0, "processedStories": []}"#).unwrap();
        assert_eq!(store.load().next_folder_index, 1);
    }

    #[test]
    fn remove_reports_whether_file_existed() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        assert!(!store.remove().unwrap());
        store.save(&LedgerState::default()).unwrap();
        assert!(store.remove().unwrap());
        assert!(!store.path().exists());
    }
}
