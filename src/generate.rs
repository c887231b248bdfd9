//! Run orchestration: feed items → ledger check → slides on disk.
//!
//! [`SlideGenerator`] owns the ledger for the duration of a run and is the
//! only thing that mutates it. Stories are handled strictly one after
//! another, in feed order:
//!
//! ```text
//! Unseen ──▶ Allocated(n) ──▶ RenderedPrimary ──▶ Recorded ──▶ [Translating(lang)]*
//!   │
//!   └──▶ Skipped (already in the ledger; no side effects)
//! ```
//!
//! The story is recorded and the ledger saved as soon as the primary
//! language folder is complete, so translation failures never cause the
//! primary slides to be regenerated on the next run. A crash between
//! allocation and recording leaves the story unrecorded; it is picked up
//! again on restart under a fresh index, and the orphaned folder is kept.

use crate::config::{GenerationConfig, Language, TranslationBackend, TranslationFailurePolicy};
use crate::error::{SlideError, SlideGenError};
use crate::ledger::{folder_name, LedgerState, LedgerStore};
use crate::output::{
    LanguageOutput, ResetSummary, RunReport, RunStats, SlideResult, StoryOutcome, StoryStatus,
};
use crate::pipeline::clean::clean_story_text;
use crate::pipeline::crop::crop_to_slide;
use crate::pipeline::feed::{self, FeedItem};
use crate::pipeline::render::{ChromeRenderer, SlideRenderer};
use crate::pipeline::segment::split_into_slides;
use crate::pipeline::translate::{translate_with_retry, GoogleTranslator, LlmTranslator, Translator};
use crate::progress::ProgressCallback;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Model used when a provider is named without one.
const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Name of the full-text file written next to the slides.
pub const STORY_TEXT_FILE: &str = "story.txt";

/// Drives one run over a list of feed items.
pub struct SlideGenerator {
    config: GenerationConfig,
    renderer: Arc<dyn SlideRenderer>,
    translator: Option<Arc<dyn Translator>>,
    store: LedgerStore,
    state: LedgerState,
}

impl SlideGenerator {
    /// Load the ledger and prepare a run.
    ///
    /// # Errors
    /// [`SlideGenError::TranslatorNotConfigured`] when additional languages
    /// are configured but no translator is given.
    pub fn new(
        config: GenerationConfig,
        renderer: Arc<dyn SlideRenderer>,
        translator: Option<Arc<dyn Translator>>,
    ) -> Result<Self, SlideGenError> {
        if !config.languages.is_empty() && translator.is_none() {
            return Err(SlideGenError::TranslatorNotConfigured {
                backend: backend_name(config.translation_backend).to_string(),
                hint: "Additional languages need a translator.".to_string(),
            });
        }
        let store = LedgerStore::new(&config.ledger_path);
        let state = store.load();
        info!(
            "Ledger {}: {} processed stories, next folder {}",
            store.path().display(),
            state.processed_stories.len(),
            folder_name(state.next_folder_index)
        );
        Ok(Self {
            config,
            renderer,
            translator,
            store,
            state,
        })
    }

    /// Current in-memory ledger state.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// Process every item in order and collect a report.
    ///
    /// Stops at the first fatal error; stories finished before it stay
    /// recorded in the ledger.
    pub async fn run(&mut self, items: &[FeedItem]) -> Result<RunReport, SlideGenError> {
        let start = Instant::now();
        if let Some(cb) = self.progress() {
            cb.on_run_start(items.len());
        }

        let mut stats = RunStats {
            fetched: items.len(),
            ..Default::default()
        };
        let mut stories = Vec::with_capacity(items.len());
        for item in items {
            let outcome = self.process_story(item).await?;
            stats.record(&outcome, &self.config.primary_language);
            stories.push(outcome);
        }
        stats.total_duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Run complete: {} generated, {} skipped, {} empty, {} slides ({} failed), {}ms",
            stats.generated,
            stats.skipped,
            stats.empty,
            stats.rendered_slides,
            stats.failed_slides,
            stats.total_duration_ms
        );
        if let Some(cb) = self.progress() {
            cb.on_run_complete(stats.generated, stats.skipped);
        }

        Ok(RunReport { stories, stats })
    }

    /// Process a single feed item.
    pub async fn process_story(&mut self, item: &FeedItem) -> Result<StoryOutcome, SlideGenError> {
        // ── Step 1: Dedup ────────────────────────────────────────────────
        if self.state.is_processed(&item.url) {
            info!("Story already processed: {}", item.url);
            if let Some(cb) = self.progress() {
                cb.on_story_skipped(&item.url);
            }
            return Ok(StoryOutcome::skipped(&item.url));
        }

        // ── Step 2: Clean + segment ──────────────────────────────────────
        let text = clean_story_text(&item.text);
        let slides = split_into_slides(&text, self.config.max_chars_per_slide);
        if slides.is_empty() {
            warn!(url = %item.url, "Story has no complete sentence; not recording it");
            if let Some(cb) = self.progress() {
                cb.on_story_empty(&item.url);
            }
            return Ok(StoryOutcome::empty(&item.url));
        }

        // ── Step 3: Allocate a folder ────────────────────────────────────
        let folder = self.allocate_free_folder().await;
        info!(
            "Processing {} → {} ({} slides, {} chars)",
            item.url,
            folder,
            slides.len(),
            text.chars().count()
        );
        if let Some(cb) = self.progress() {
            cb.on_story_start(&item.url, &folder, slides.len());
        }

        // ── Step 4: Primary language ─────────────────────────────────────
        let primary = self.config.primary_language.clone();
        let dir = self.story_dir(&primary, &folder).await?;
        write_text(&dir.join(STORY_TEXT_FILE), &text).await?;
        let mut primary_out = LanguageOutput::new(&primary);
        for (i, slide) in slides.iter().enumerate() {
            let result = self
                .render_slide(&dir, &folder, &primary, i, slides.len(), slide)
                .await;
            primary_out.slides.push(result);
        }

        // ── Step 5: Record + save ────────────────────────────────────────
        if primary_out.rendered() == 0 {
            warn!(
                url = %item.url,
                folder = %folder,
                failed = primary_out.failed(),
                "Recording story with no rendered slides; it will not be regenerated"
            );
        }
        self.state = std::mem::take(&mut self.state).record_processed(&item.url, &folder);
        self.store.save(&self.state)?;
        if let Some(cb) = self.progress() {
            cb.on_story_recorded(&item.url, &folder);
        }

        // ── Step 6: Additional languages ─────────────────────────────────
        let mut languages = vec![primary_out];
        for lang in self.config.languages.clone() {
            let mut out = LanguageOutput::new(&lang.name);
            if let Err(e) = self.translate_language(&lang, &folder, &text, &slides, &mut out).await {
                match self.config.on_translation_error {
                    TranslationFailurePolicy::Abort => return Err(e),
                    TranslationFailurePolicy::SkipLanguage => {
                        warn!(
                            folder = %folder,
                            language = %lang.name,
                            error = %e,
                            "Skipping language"
                        );
                        out.translation_error = Some(e.to_string());
                    }
                }
            }
            languages.push(out);
        }

        Ok(StoryOutcome {
            url: item.url.clone(),
            status: StoryStatus::Generated,
            folder_name: Some(folder),
            languages,
        })
    }

    /// Allocate the next index whose primary folder does not exist yet.
    ///
    /// A run that died between allocation and saving the ledger leaves a
    /// folder behind under an index the ledger never advanced past. That
    /// output is left alone and the index is skipped.
    async fn allocate_free_folder(&mut self) -> String {
        loop {
            let (index, state) = std::mem::take(&mut self.state).allocate_folder_index();
            self.state = state;
            let folder = folder_name(index);
            let dir = self
                .config
                .output_dir
                .join(&self.config.primary_language)
                .join(&folder);
            if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                return folder;
            }
            warn!("Skipping orphaned folder {} from an unfinished run", dir.display());
        }
    }

    /// Translate the full text and every slide into `lang`, rendering each
    /// translated slide as soon as it is ready.
    async fn translate_language(
        &self,
        lang: &Language,
        folder: &str,
        text: &str,
        slides: &[String],
        out: &mut LanguageOutput,
    ) -> Result<(), SlideGenError> {
        let translator = self.translator.as_deref().ok_or_else(|| {
            SlideGenError::TranslatorNotConfigured {
                backend: backend_name(self.config.translation_backend).to_string(),
                hint: "Additional languages need a translator.".to_string(),
            }
        })?;
        info!("Translating {} into {} ({})", folder, lang.name, lang.code);

        let dir = self.story_dir(&lang.name, folder).await?;
        let full = self.translate(translator, text, lang).await?;
        write_text(&dir.join(STORY_TEXT_FILE), &full).await?;

        for (i, slide) in slides.iter().enumerate() {
            let translated = self.translate(translator, slide, lang).await?;
            let result = self
                .render_slide(&dir, folder, &lang.name, i, slides.len(), &translated)
                .await;
            out.slides.push(result);
        }
        Ok(())
    }

    async fn translate(
        &self,
        translator: &dyn Translator,
        text: &str,
        lang: &Language,
    ) -> Result<String, SlideGenError> {
        translate_with_retry(
            translator,
            text,
            &lang.name,
            &lang.code,
            self.config.max_retries,
            self.config.retry_backoff_ms,
        )
        .await
    }

    /// Render, crop and write one slide. Failures are returned in the result,
    /// never propagated.
    async fn render_slide(
        &self,
        dir: &Path,
        folder: &str,
        language: &str,
        slide_num: usize,
        total: usize,
        text: &str,
    ) -> SlideResult {
        let start = Instant::now();
        let path = dir.join(format!("slide_{slide_num}.png"));
        let error = self.try_render_slide(&path, slide_num, text).await.err();

        match &error {
            None => {
                info!("{}/{}: slide {}/{} written", language, folder, slide_num + 1, total);
                if let Some(cb) = self.progress() {
                    cb.on_slide_rendered(folder, language, slide_num, total);
                }
            }
            Some(e) => {
                warn!("{}/{}: {}", language, folder, e);
                if let Some(cb) = self.progress() {
                    cb.on_slide_error(folder, language, slide_num, &e.to_string());
                }
            }
        }

        SlideResult {
            slide_num,
            path,
            chars: text.chars().count(),
            duration_ms: start.elapsed().as_millis() as u64,
            error,
        }
    }

    async fn try_render_slide(&self, path: &Path, slide: usize, text: &str) -> Result<(), SlideError> {
        let capture = self
            .renderer
            .render(text)
            .await
            .map_err(|e| SlideError::RenderFailed {
                slide,
                detail: e.to_string(),
            })?;
        let png = crop_to_slide(&capture, self.config.slide_width, self.config.slide_height)
            .map_err(|e| SlideError::CropFailed {
                slide,
                detail: e.to_string(),
            })?;
        tokio::fs::write(path, &png)
            .await
            .map_err(|e| SlideError::WriteFailed {
                slide,
                detail: e.to_string(),
            })?;
        debug!("Wrote {} ({} bytes)", path.display(), png.len());
        Ok(())
    }

    /// `<output>/<language>/<folder>`, created if missing.
    async fn story_dir(&self, language: &str, folder: &str) -> Result<PathBuf, SlideGenError> {
        let dir = self.config.output_dir.join(language).join(folder);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| SlideGenError::OutputWriteFailed {
                path: dir.clone(),
                source,
            })?;
        Ok(dir)
    }

    fn progress(&self) -> Option<&ProgressCallback> {
        self.config.progress_callback.as_ref()
    }
}

async fn write_text(path: &Path, text: &str) -> Result<(), SlideGenError> {
    tokio::fs::write(path, text)
        .await
        .map_err(|source| SlideGenError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
}

// ── Entry points ─────────────────────────────────────────────────────────

/// Fetch the feed, start Chrome and generate slides for every new story.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(RunReport)` when every story was handled, even if some slides failed
/// (check `report.stats.failed_slides`).
///
/// # Errors
/// Returns `Err(SlideGenError)` only for fatal errors:
/// - Feed unreachable or unparseable
/// - Chrome failed to start
/// - Translation failed under [`TranslationFailurePolicy::Abort`]
/// - Ledger or output directory not writable
pub async fn generate(config: &GenerationConfig) -> Result<RunReport, SlideGenError> {
    let source = config.feed_source();
    info!("Starting run: {}", source);

    // ── Step 1: Fetch feed ───────────────────────────────────────────────
    let items = feed::fetch_feed(&source, config.download_timeout_secs).await?;

    // ── Step 2: Translator (before Chrome so config errors fail fast) ────
    let translator = resolve_translator(config)?;

    // ── Step 3: Browser ──────────────────────────────────────────────────
    let renderer: Arc<dyn SlideRenderer> = Arc::new(ChromeRenderer::launch(config).await?);

    // ── Step 4: Generate ─────────────────────────────────────────────────
    let mut generator = SlideGenerator::new(config.clone(), renderer, translator)?;
    generator.run(&items).await
}

/// Synchronous wrapper around [`generate`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(config: &GenerationConfig) -> Result<RunReport, SlideGenError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SlideGenError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate(config))
}

/// Delete the output tree and the ledger file.
///
/// Missing targets are not errors; the summary says what actually existed.
pub async fn reset(config: &GenerationConfig) -> Result<ResetSummary, SlideGenError> {
    let removed_output = match tokio::fs::remove_dir_all(&config.output_dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(source) => {
            return Err(SlideGenError::ResetFailed {
                path: config.output_dir.clone(),
                source,
            })
        }
    };
    let removed_ledger = LedgerStore::new(&config.ledger_path).remove()?;

    info!(
        "Reset: output {} ({}), ledger {} ({})",
        config.output_dir.display(),
        if removed_output { "removed" } else { "absent" },
        config.ledger_path.display(),
        if removed_ledger { "removed" } else { "absent" }
    );
    Ok(ResetSummary {
        removed_output,
        removed_ledger,
    })
}

/// Read the ledger without fetching or rendering anything.
pub fn inspect_ledger(config: &GenerationConfig) -> LedgerState {
    LedgerStore::new(&config.ledger_path).load()
}

// ── Translator resolution ────────────────────────────────────────────────

/// Build the translator a run needs, if any.
///
/// Returns `Ok(None)` when no additional language is configured. Otherwise
/// a pre-built `config.translator` wins, then the configured back end.
pub fn resolve_translator(
    config: &GenerationConfig,
) -> Result<Option<Arc<dyn Translator>>, SlideGenError> {
    if config.languages.is_empty() {
        return Ok(None);
    }
    if let Some(ref translator) = config.translator {
        return Ok(Some(Arc::clone(translator)));
    }

    match config.translation_backend {
        TranslationBackend::Llm => {
            let provider = resolve_provider(config)?;
            info!("Translating with an LLM provider");
            Ok(Some(Arc::new(LlmTranslator::new(provider, config))))
        }
        TranslationBackend::Google => {
            let key = config
                .google_api_key
                .clone()
                .or_else(|| std::env::var("GOOGLE_TRANSLATE_API_KEY").ok())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| SlideGenError::TranslatorNotConfigured {
                    backend: "google".to_string(),
                    hint: "Set GOOGLE_TRANSLATE_API_KEY or pass --google-api-key.".to_string(),
                })?;
            info!("Translating with Google Cloud Translation");
            Ok(Some(Arc::new(GoogleTranslator::new(key, config.api_timeout_secs)?)))
        }
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, SlideGenError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    // Prefer OpenAI when its key is present, even if other keys are too.
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| SlideGenError::TranslatorNotConfigured {
            backend: "llm".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or use --translator google.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, SlideGenError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        SlideGenError::TranslatorNotConfigured {
            backend: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

fn backend_name(backend: TranslationBackend) -> &'static str {
    match backend {
        TranslationBackend::Llm => "llm",
        TranslationBackend::Google => "google",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::RenderError;
    use async_trait::async_trait;
    use tempfile::TempDir;

    struct NoRender;

    #[async_trait]
    impl SlideRenderer for NoRender {
        async fn render(&self, _text: &str) -> Result<Vec<u8>, RenderError> {
            Err(RenderError("no browser in unit tests".into()))
        }
    }

    fn config_in(dir: &TempDir) -> GenerationConfig {
        GenerationConfig::builder()
            .output_dir(dir.path().join("images"))
            .ledger_path(dir.path().join("processed_stories.json"))
            .build()
            .unwrap()
    }

    #[test]
    fn languages_without_translator_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.languages.push(Language::new("French", "fr"));
        let err = SlideGenerator::new(config, Arc::new(NoRender), None).err().unwrap();
        assert!(matches!(err, SlideGenError::TranslatorNotConfigured { .. }));
    }

    #[test]
    fn no_languages_needs_no_translator() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        assert!(resolve_translator(&config).unwrap().is_none());
    }

    #[test]
    fn google_without_key_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.languages.push(Language::new("French", "fr"));
        config.translation_backend = TranslationBackend::Google;
        config.google_api_key = Some(String::new());
        // An empty explicit key falls through to the env var; only assert
        // when the environment does not provide one.
        if std::env::var("GOOGLE_TRANSLATE_API_KEY").map_or(true, |k| k.is_empty()) {
            let err = resolve_translator(&config).err().unwrap();
            assert!(err.to_string().contains("GOOGLE_TRANSLATE_API_KEY"));
        }
    }

    #[test]
    fn google_with_key_builds() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.languages.push(Language::new("French", "fr"));
        config.translation_backend = TranslationBackend::Google;
        config.google_api_key = Some("k".into());
        assert!(resolve_translator(&config).unwrap().is_some());
    }

    #[tokio::test]
    async fn failed_render_still_records_story() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let mut generator = SlideGenerator::new(config.clone(), Arc::new(NoRender), None).unwrap();

        let outcome = generator
            .process_story(&FeedItem::new("https://a", "One. Two."))
            .await
            .unwrap();

        assert_eq!(outcome.status, StoryStatus::Generated);
        assert_eq!(outcome.languages[0].failed(), 1);
        assert!(generator.state().is_processed("https://a"));
        let text = std::fs::read_to_string(
            config.output_dir.join("English/story_1").join(STORY_TEXT_FILE),
        )
        .unwrap();
        assert_eq!(text, "One. Two.");
    }

    #[tokio::test]
    async fn empty_story_is_not_recorded() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let mut generator = SlideGenerator::new(config.clone(), Arc::new(NoRender), None).unwrap();

        let outcome = generator
            .process_story(&FeedItem::new("https://img", ""))
            .await
            .unwrap();

        assert_eq!(outcome.status, StoryStatus::Empty);
        assert_eq!(generator.state().next_folder_index, 1);
        assert!(!config.ledger_path.exists());
    }

    #[tokio::test]
    async fn reset_reports_absent_targets() {
        let dir = TempDir::new().unwrap();
        let summary = reset(&config_in(&dir)).await.unwrap();
        assert_eq!(summary, ResetSummary::default());
    }
}
