//! Configuration types for slide generation.
//!
//! All run behaviour is controlled through [`GenerationConfig`], built via its
//! [`GenerationConfigBuilder`]. Keeping every knob in one struct makes it easy
//! to log the effective settings of a run and to diff two runs.

use crate::error::SlideGenError;
use crate::pipeline::translate::Translator;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// Upper bound for translation retries per call.
pub const MAX_RETRIES: u32 = 10;

/// Configuration for one generation run.
///
/// # Example
/// ```rust
/// use storyslides::{GenerationConfig, Language};
///
/// let config = GenerationConfig::builder()
///     .subreddit("tifu")
///     .limit(25)
///     .max_chars_per_slide(600)
///     .language(Language::new("French", "fr"))
///     .build()
///     .unwrap();
/// assert_eq!(config.feed_source(), "https://www.reddit.com/r/tifu/top/.json?t=year&limit=25");
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Explicit feed source: an HTTP(S) listing URL or a local listing JSON
    /// file. When `None` the URL is built from `subreddit`, `window`, `limit`.
    pub feed: Option<String>,

    /// Subreddit whose top listing is fetched. Default: `pettyrevenge`.
    pub subreddit: String,

    /// Time window of the top listing. Default: [`TopWindow::Year`].
    pub window: TopWindow,

    /// Number of posts requested. Range: 1–100 (Reddit's cap). Default: 10.
    pub limit: u32,

    /// Character budget per slide. Default: 1000.
    ///
    /// Sentences are never split, so a single sentence longer than this
    /// still becomes one (oversized) slide.
    pub max_chars_per_slide: usize,

    /// Slide width in CSS pixels. Default: 266 (one third of an 800 px frame).
    pub slide_width: u32,

    /// Slide height in CSS pixels. Default: 720 (full height of a 720p frame).
    pub slide_height: u32,

    /// Root of the output tree. Default: `images`.
    pub output_dir: PathBuf,

    /// Ledger file path. Default: `processed_stories.json`.
    pub ledger_path: PathBuf,

    /// Custom HTML slide template. Must contain a `.slide p` element.
    /// If None, the built-in template is used.
    pub template_path: Option<PathBuf>,

    /// Chrome/Chromium executable. If None, headless_chrome auto-detects.
    pub chrome_path: Option<PathBuf>,

    /// Run Chrome with its sandbox enabled. Default: true.
    pub sandbox: bool,

    /// Folder name of the untranslated slide set. Default: `English`.
    pub primary_language: String,

    /// Additional languages, processed in list order after the primary set.
    pub languages: Vec<Language>,

    /// Which translation back end to build when `translator` is None.
    pub translation_backend: TranslationBackend,

    /// Pre-constructed translator. Takes precedence over `translation_backend`.
    pub translator: Option<Arc<dyn Translator>>,

    /// What to do when translating into a language fails. Default: `Abort`.
    pub on_translation_error: TranslationFailurePolicy,

    /// LLM model identifier for the LLM back end. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// API key for the Google Cloud Translation back end.
    pub google_api_key: Option<String>,

    /// Sampling temperature for LLM translation. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per translation. Default: 4096.
    pub max_tokens: usize,

    /// Retry attempts on a transient translation failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Feed download timeout in seconds. Default: 30.
    pub download_timeout_secs: u64,

    /// Per-request timeout for the Google back end in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Per-slide navigation/render timeout in seconds. Default: 30.
    pub render_timeout_secs: u64,

    /// Optional progress events receiver.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            feed: None,
            subreddit: "pettyrevenge".to_string(),
            window: TopWindow::default(),
            limit: 10,
            max_chars_per_slide: 1000,
            slide_width: 266,
            slide_height: 720,
            output_dir: PathBuf::from("images"),
            ledger_path: PathBuf::from("processed_stories.json"),
            template_path: None,
            chrome_path: None,
            sandbox: true,
            primary_language: "English".to_string(),
            languages: Vec::new(),
            translation_backend: TranslationBackend::default(),
            translator: None,
            on_translation_error: TranslationFailurePolicy::default(),
            model: None,
            provider_name: None,
            provider: None,
            google_api_key: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            download_timeout_secs: 30,
            api_timeout_secs: 60,
            render_timeout_secs: 30,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("feed", &self.feed_source())
            .field("max_chars_per_slide", &self.max_chars_per_slide)
            .field("slide_width", &self.slide_width)
            .field("slide_height", &self.slide_height)
            .field("output_dir", &self.output_dir)
            .field("ledger_path", &self.ledger_path)
            .field("template_path", &self.template_path)
            .field("chrome_path", &self.chrome_path)
            .field("sandbox", &self.sandbox)
            .field("primary_language", &self.primary_language)
            .field("languages", &self.languages)
            .field("translation_backend", &self.translation_backend)
            .field("translator", &self.translator.as_ref().map(|_| "<dyn Translator>"))
            .field("on_translation_error", &self.on_translation_error)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("google_api_key", &self.google_api_key.as_ref().map(|_| "<redacted>"))
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The feed source this run reads: the explicit `feed`, or the top
    /// listing URL of `subreddit`.
    pub fn feed_source(&self) -> String {
        match &self.feed {
            Some(feed) => feed.clone(),
            None => format!(
                "https://www.reddit.com/r/{}/top/.json?t={}&limit={}",
                self.subreddit,
                self.window.as_str(),
                self.limit
            ),
        }
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn feed(mut self, source: impl Into<String>) -> Self {
        self.config.feed = Some(source.into());
        self
    }

    pub fn subreddit(mut self, name: impl Into<String>) -> Self {
        self.config.subreddit = name.into();
        self
    }

    pub fn window(mut self, window: TopWindow) -> Self {
        self.config.window = window;
        self
    }

    pub fn limit(mut self, n: u32) -> Self {
        self.config.limit = n.clamp(1, 100);
        self
    }

    pub fn max_chars_per_slide(mut self, n: usize) -> Self {
        self.config.max_chars_per_slide = n;
        self
    }

    pub fn slide_size(mut self, width: u32, height: u32) -> Self {
        self.config.slide_width = width;
        self.config.slide_height = height;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn ledger_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ledger_path = path.into();
        self
    }

    pub fn template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.template_path = Some(path.into());
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn sandbox(mut self, v: bool) -> Self {
        self.config.sandbox = v;
        self
    }

    pub fn primary_language(mut self, name: impl Into<String>) -> Self {
        self.config.primary_language = name.into();
        self
    }

    pub fn language(mut self, language: Language) -> Self {
        self.config.languages.push(language);
        self
    }

    pub fn languages(mut self, languages: Vec<Language>) -> Self {
        self.config.languages = languages;
        self
    }

    pub fn translation_backend(mut self, backend: TranslationBackend) -> Self {
        self.config.translation_backend = backend;
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.config.translator = Some(translator);
        self
    }

    pub fn on_translation_error(mut self, policy: TranslationFailurePolicy) -> Self {
        self.config.on_translation_error = policy;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn google_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.google_api_key = Some(key.into());
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n.min(MAX_RETRIES);
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, SlideGenError> {
        let c = &self.config;
        if c.max_chars_per_slide == 0 {
            return Err(SlideGenError::InvalidConfig(
                "max_chars_per_slide must be ≥ 1".into(),
            ));
        }
        if c.slide_width == 0 || c.slide_height == 0 {
            return Err(SlideGenError::InvalidConfig(format!(
                "slide size must be non-zero, got {}x{}",
                c.slide_width, c.slide_height
            )));
        }
        if c.feed.is_none() && c.subreddit.trim().is_empty() {
            return Err(SlideGenError::InvalidConfig(
                "either a feed source or a subreddit is required".into(),
            ));
        }
        if c.primary_language.trim().is_empty() {
            return Err(SlideGenError::InvalidConfig(
                "primary language name must not be empty".into(),
            ));
        }
        for (i, lang) in c.languages.iter().enumerate() {
            if lang.name == c.primary_language {
                return Err(SlideGenError::InvalidConfig(format!(
                    "language '{}' collides with the primary language folder",
                    lang.name
                )));
            }
            if c.languages[..i].iter().any(|prev| prev.name == lang.name) {
                return Err(SlideGenError::InvalidConfig(format!(
                    "language '{}' is listed more than once",
                    lang.name
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// A translation target: the folder name under the output root plus the
/// ISO-639 code sent to the translator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    pub name: String,
    pub code: String,
}

impl Language {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
        }
    }
}

impl FromStr for Language {
    type Err = SlideGenError;

    /// Parse `Name=code`, e.g. `Ukrainian=uk`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, code) = s.split_once('=').ok_or_else(|| {
            SlideGenError::InvalidConfig(format!("language '{s}' must look like Name=code"))
        })?;
        let (name, code) = (name.trim(), code.trim());
        if name.is_empty() || code.is_empty() {
            return Err(SlideGenError::InvalidConfig(format!(
                "language '{s}' has an empty name or code"
            )));
        }
        Ok(Language::new(name, code))
    }
}

/// Time window of a Reddit top listing (`t=` query parameter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TopWindow {
    Hour,
    Day,
    Week,
    Month,
    #[default]
    Year,
    All,
}

impl TopWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            TopWindow::Hour => "hour",
            TopWindow::Day => "day",
            TopWindow::Week => "week",
            TopWindow::Month => "month",
            TopWindow::Year => "year",
            TopWindow::All => "all",
        }
    }
}

/// Which service translates slides for the additional languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranslationBackend {
    /// Chat-completion LLM via edgequake-llm (provider auto-detected). (default)
    #[default]
    Llm,
    /// Google Cloud Translation v2 REST API (needs an API key).
    Google,
}

/// Behaviour when translating a story into one language fails.
///
/// The primary-language slides are recorded in the ledger before any
/// translation starts, so neither policy ever regenerates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TranslationFailurePolicy {
    /// Stop the whole run with [`SlideGenError::TranslationFailed`]. (default)
    #[default]
    Abort,
    /// Log the failure, record it on the language output, and move on to
    /// the next language.
    SkipLanguage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_feed_is_pettyrevenge_top_year() {
        let config = GenerationConfig::default();
        assert_eq!(
            config.feed_source(),
            "https://www.reddit.com/r/pettyrevenge/top/.json?t=year&limit=10"
        );
    }

    #[test]
    fn explicit_feed_wins() {
        let config = GenerationConfig::builder()
            .subreddit("tifu")
            .feed("fixtures/listing.json")
            .build()
            .unwrap();
        assert_eq!(config.feed_source(), "fixtures/listing.json");
    }

    #[test]
    fn limit_is_clamped() {
        let config = GenerationConfig::builder().limit(500).build().unwrap();
        assert_eq!(config.limit, 100);
        let config = GenerationConfig::builder().limit(0).build().unwrap();
        assert_eq!(config.limit, 1);
    }

    #[test]
    fn zero_budget_rejected() {
        let err = GenerationConfig::builder()
            .max_chars_per_slide(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, SlideGenError::InvalidConfig(_)));
    }

    #[test]
    fn language_colliding_with_primary_rejected() {
        let err = GenerationConfig::builder()
            .language(Language::new("English", "en"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("English"));
    }

    #[test]
    fn duplicate_language_rejected() {
        let err = GenerationConfig::builder()
            .language(Language::new("French", "fr"))
            .language(Language::new("Ukrainian", "uk"))
            .language(Language::new("French", "fr"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SlideGenError::InvalidConfig(_)));
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn max_retries_is_clamped() {
        let config = GenerationConfig::builder().max_retries(1000).build().unwrap();
        assert_eq!(config.max_retries, MAX_RETRIES);
        let config = GenerationConfig::builder().max_retries(2).build().unwrap();
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn parse_language_pair() {
        let lang: Language = "Ukrainian=uk".parse().unwrap();
        assert_eq!(lang, Language::new("Ukrainian", "uk"));
        let lang: Language = " French = fr ".parse().unwrap();
        assert_eq!(lang, Language::new("French", "fr"));
        assert!("French".parse::<Language>().is_err());
        assert!("=fr".parse::<Language>().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = GenerationConfig::builder()
            .google_api_key("secret-key")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("secret-key"));
        assert!(dbg.contains("<redacted>"));
    }
}
