//! CLI binary for storyslides.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storyslides::ledger::folder_name;
use storyslides::{
    generate, inspect_ledger, reset, GenerationConfig, GenerationProgressCallback, Language,
    ProgressCallback, RunReport, TopWindow, TranslationBackend, TranslationFailurePolicy,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over the feed items plus a log line
/// per slide, printed above the bar.
struct CliProgressCallback {
    bar: ProgressBar,
    slide_errors: AtomicUsize,
}

impl CliProgressCallback {
    /// The bar starts as a spinner; `on_run_start` sets the length once the
    /// feed has been fetched.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Fetching feed…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            slide_errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} stories  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Generating");
        self.bar.set_message("");
        self.bar.reset_eta();
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_items: usize) {
        self.activate_bar(total_items);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{total_items} stories in feed"))
        ));
    }

    fn on_story_skipped(&self, url: &str) {
        self.bar
            .println(format!("  {} {}", dim("↷"), dim(&format!("already processed: {url}"))));
        self.bar.inc(1);
    }

    fn on_story_empty(&self, url: &str) {
        self.bar
            .println(format!("  {} {}", dim("∅"), dim(&format!("no sentences: {url}"))));
        self.bar.inc(1);
    }

    fn on_story_start(&self, url: &str, folder_name: &str, slide_count: usize) {
        self.bar.println(format!(
            "{} {}  {}  {}",
            cyan("▸"),
            bold(folder_name),
            dim(&format!("{slide_count} slides")),
            dim(url)
        ));
        self.bar.set_message(folder_name.to_string());
    }

    fn on_slide_rendered(&self, _folder_name: &str, language: &str, slide_num: usize, total: usize) {
        self.bar.println(format!(
            "    {} {:<10} slide {:>2}/{:<2}",
            green("✓"),
            language,
            slide_num + 1,
            total
        ));
    }

    fn on_slide_error(&self, _folder_name: &str, language: &str, slide_num: usize, error: &str) {
        self.slide_errors.fetch_add(1, Ordering::SeqCst);
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "    {} {:<10} slide {:>2}  {}",
            red("✗"),
            language,
            slide_num + 1,
            red(&msg)
        ));
    }

    fn on_story_recorded(&self, _url: &str, _folder_name: &str) {
        self.bar.inc(1);
    }

    fn on_run_complete(&self, generated: usize, skipped: usize) {
        self.bar.finish_and_clear();
        let errors = self.slide_errors.load(Ordering::SeqCst);
        if errors == 0 {
            eprintln!(
                "{} {} new stories, {} already processed",
                green("✔"),
                bold(&generated.to_string()),
                skipped
            );
        } else {
            eprintln!(
                "{} {} new stories, {} already processed  ({} slides failed)",
                cyan("⚠"),
                bold(&generated.to_string()),
                skipped,
                red(&errors.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Top 10 posts of r/pettyrevenge from the past year → images/English/story_N/
  storyslides

  # Another subreddit, shorter slides
  storyslides --subreddit tifu --window month --limit 25 --max-chars 600

  # Add translated slide sets (LLM provider auto-detected)
  storyslides -l Ukrainian=uk -l French=fr

  # Translate with Google Cloud Translation instead
  GOOGLE_TRANSLATE_API_KEY=... storyslides --translator google -l French=fr

  # Keep going when one language fails
  storyslides -l French=fr --on-translation-error skip

  # Replay a saved listing, inside a container
  storyslides --feed listing.json --no-sandbox

  # What has been generated so far?
  storyslides --status

  # Start over: delete images/ and the ledger
  storyslides --reset

ENVIRONMENT VARIABLES:
  GOOGLE_TRANSLATE_API_KEY  Google Cloud Translation API key
  OPENAI_API_KEY            OpenAI API key (LLM translation)
  ANTHROPIC_API_KEY         Anthropic API key (LLM translation)
  EDGEQUAKE_LLM_PROVIDER    Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL           Override model ID
  RUST_LOG                  Log filter, e.g. storyslides=debug

Every flag can also be set through STORYSLIDES_<FLAG>, e.g. STORYSLIDES_LIMIT=25.
"#;

/// Turn top Reddit posts into slide images.
#[derive(Parser, Debug)]
#[command(
    name = "storyslides",
    version,
    about = "Turn top Reddit posts into slide images",
    long_about = "Fetch the top posts of a subreddit, split each story into slides of whole \
sentences, and render every slide to a PNG with headless Chrome. Stories already generated \
are remembered in a ledger file and skipped on later runs. Optional extra languages are \
translated with an LLM or Google Cloud Translation.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Listing URL or saved listing JSON file (overrides --subreddit).
    #[arg(long, env = "STORYSLIDES_FEED")]
    feed: Option<String>,

    /// Subreddit whose top posts are fetched.
    #[arg(long, env = "STORYSLIDES_SUBREDDIT", default_value = "pettyrevenge")]
    subreddit: String,

    /// Time window of the top listing.
    #[arg(long, env = "STORYSLIDES_WINDOW", value_enum, default_value = "year")]
    window: WindowArg,

    /// Number of posts to fetch (1–100).
    #[arg(long, env = "STORYSLIDES_LIMIT", default_value_t = 10,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    limit: u32,

    /// Character budget per slide.
    #[arg(long, env = "STORYSLIDES_MAX_CHARS", default_value_t = 1000)]
    max_chars: usize,

    /// Slide width in pixels.
    #[arg(long, env = "STORYSLIDES_WIDTH", default_value_t = 266)]
    width: u32,

    /// Slide height in pixels.
    #[arg(long, env = "STORYSLIDES_HEIGHT", default_value_t = 720)]
    height: u32,

    /// Root directory for generated slides.
    #[arg(short, long, env = "STORYSLIDES_OUTPUT_DIR", default_value = "images")]
    output_dir: PathBuf,

    /// Ledger file recording processed stories.
    #[arg(long, env = "STORYSLIDES_LEDGER", default_value = "processed_stories.json")]
    ledger: PathBuf,

    /// Custom HTML slide template (must contain a `.slide p` element).
    #[arg(long, env = "STORYSLIDES_TEMPLATE")]
    template: Option<PathBuf>,

    /// Chrome/Chromium executable (auto-detected if not set).
    #[arg(long, env = "STORYSLIDES_CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Disable the Chrome sandbox (needed in most containers).
    #[arg(long, env = "STORYSLIDES_NO_SANDBOX")]
    no_sandbox: bool,

    /// Folder name of the untranslated slide set.
    #[arg(long, env = "STORYSLIDES_PRIMARY_LANGUAGE", default_value = "English")]
    primary_language: String,

    /// Additional language as Name=code (repeatable), e.g. -l Ukrainian=uk.
    #[arg(short = 'l', long = "language", env = "STORYSLIDES_LANGUAGES",
          value_delimiter = ',', value_parser = parse_language)]
    languages: Vec<Language>,

    /// Translation back end for additional languages.
    #[arg(long, env = "STORYSLIDES_TRANSLATOR", value_enum, default_value = "llm")]
    translator: TranslatorArg,

    /// What to do when a translation fails.
    #[arg(long, env = "STORYSLIDES_ON_TRANSLATION_ERROR", value_enum, default_value = "abort")]
    on_translation_error: PolicyArg,

    /// LLM model ID for translation (e.g. gpt-4.1-nano).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Google Cloud Translation API key.
    #[arg(long, env = "GOOGLE_TRANSLATE_API_KEY", hide_env_values = true)]
    google_api_key: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "STORYSLIDES_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per translation.
    #[arg(long, env = "STORYSLIDES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per translation on failure (0-10).
    #[arg(long, env = "STORYSLIDES_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Feed download timeout in seconds.
    #[arg(long, env = "STORYSLIDES_DOWNLOAD_TIMEOUT", default_value_t = 30)]
    download_timeout: u64,

    /// Translation API timeout in seconds.
    #[arg(long, env = "STORYSLIDES_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Per-slide render timeout in seconds.
    #[arg(long, env = "STORYSLIDES_RENDER_TIMEOUT", default_value_t = 30)]
    render_timeout: u64,

    /// Delete the output directory and the ledger, then exit.
    #[arg(long, conflicts_with = "status")]
    reset: bool,

    /// Print the ledger, then exit.
    #[arg(long)]
    status: bool,

    /// Print the run report (or status) as JSON on stdout.
    #[arg(long, env = "STORYSLIDES_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "STORYSLIDES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "STORYSLIDES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "STORYSLIDES_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum WindowArg {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl From<WindowArg> for TopWindow {
    fn from(v: WindowArg) -> Self {
        match v {
            WindowArg::Hour => TopWindow::Hour,
            WindowArg::Day => TopWindow::Day,
            WindowArg::Week => TopWindow::Week,
            WindowArg::Month => TopWindow::Month,
            WindowArg::Year => TopWindow::Year,
            WindowArg::All => TopWindow::All,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum TranslatorArg {
    Llm,
    Google,
}

impl From<TranslatorArg> for TranslationBackend {
    fn from(v: TranslatorArg) -> Self {
        match v {
            TranslatorArg::Llm => TranslationBackend::Llm,
            TranslatorArg::Google => TranslationBackend::Google,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum PolicyArg {
    Abort,
    Skip,
}

impl From<PolicyArg> for TranslationFailurePolicy {
    fn from(v: PolicyArg) -> Self {
        match v {
            PolicyArg::Abort => TranslationFailurePolicy::Abort,
            PolicyArg::Skip => TranslationFailurePolicy::SkipLanguage,
        }
    }
}

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse::<Language>().map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Library INFO logs are suppressed while the progress bar is active;
    // the bar shows the same events.
    let oneshot = cli.reset || cli.status;
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !oneshot;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    // ── Reset ────────────────────────────────────────────────────────────
    if cli.reset {
        let summary = reset(&config).await.context("Reset failed")?;
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&summary).context("Failed to serialise summary")?
            );
        } else if !cli.quiet {
            let state = |removed: bool| if removed { green("removed") } else { dim("not present") };
            eprintln!("{}  {}", config.output_dir.display(), state(summary.removed_output));
            eprintln!("{}  {}", config.ledger_path.display(), state(summary.removed_ledger));
        }
        return Ok(());
    }

    // ── Status ───────────────────────────────────────────────────────────
    if cli.status {
        let ledger = inspect_ledger(&config);
        if cli.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&ledger).context("Failed to serialise ledger")?
            );
        } else {
            println!("Ledger:       {}", config.ledger_path.display());
            println!("Processed:    {}", ledger.processed_stories.len());
            println!("Next folder:  {}", folder_name(ledger.next_folder_index));
            for story in &ledger.processed_stories {
                println!("  {:<10} {}", story.folder_name, story.url);
            }
        }
        return Ok(());
    }

    // ── Run ──────────────────────────────────────────────────────────────
    let report = generate(&config).await.context("Generation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    } else if !cli.quiet && !show_progress {
        print_summary(&report, &config);
    }

    Ok(())
}

fn print_summary(report: &RunReport, config: &GenerationConfig) {
    let s = &report.stats;
    eprintln!(
        "{}  {} new, {} skipped, {} empty  ({} fetched)  {}ms  →  {}",
        if s.failed_slides == 0 && s.failed_languages == 0 {
            green("✔")
        } else {
            cyan("⚠")
        },
        s.generated,
        s.skipped,
        s.empty,
        s.fetched,
        s.total_duration_ms,
        bold(&config.output_dir.display().to_string()),
    );
    eprintln!(
        "   {} slides rendered  /  {} failed  /  {} languages translated",
        dim(&s.rendered_slides.to_string()),
        dim(&s.failed_slides.to_string()),
        dim(&s.translated_languages.to_string()),
    );
    if s.failed_languages > 0 {
        eprintln!("   {} language sets skipped", red(&s.failed_languages.to_string()));
    }
}

/// Map CLI args to `GenerationConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .subreddit(&cli.subreddit)
        .window(cli.window.clone().into())
        .limit(cli.limit)
        .max_chars_per_slide(cli.max_chars)
        .slide_size(cli.width, cli.height)
        .output_dir(&cli.output_dir)
        .ledger_path(&cli.ledger)
        .sandbox(!cli.no_sandbox)
        .primary_language(&cli.primary_language)
        .languages(cli.languages.clone())
        .translation_backend(cli.translator.clone().into())
        .on_translation_error(cli.on_translation_error.clone().into())
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .max_retries(cli.max_retries)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout)
        .render_timeout_secs(cli.render_timeout);

    if let Some(ref feed) = cli.feed {
        builder = builder.feed(feed);
    }
    if let Some(ref path) = cli.template {
        builder = builder.template_path(path);
    }
    if let Some(ref path) = cli.chrome_path {
        builder = builder.chrome_path(path);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref key) = cli.google_api_key {
        builder = builder.google_api_key(key);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
