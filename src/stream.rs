//! Streaming generation API: emit each story's outcome as it completes.
//!
//! ## Why stream?
//!
//! A run with translations takes minutes per story. A stream lets callers
//! show each finished story immediately, or stop early by dropping the
//! stream; every story yielded so far is already recorded in the ledger.
//!
//! Unlike [`crate::generate::generate`], which returns only after every
//! item is handled, [`generate_stream`] yields one [`StoryOutcome`] per feed
//! item, in feed order. A fatal error is yielded once and ends the stream.

use crate::config::GenerationConfig;
use crate::error::SlideGenError;
use crate::generate::{resolve_translator, SlideGenerator};
use crate::output::{StoryOutcome, StoryStatus};
use crate::pipeline::feed::{self, FeedItem};
use crate::pipeline::render::{ChromeRenderer, SlideRenderer};
use futures::stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::info;

/// A boxed stream of story outcomes.
pub type StoryStream = Pin<Box<dyn Stream<Item = Result<StoryOutcome, SlideGenError>> + Send>>;

/// Drive `generator` over `items`, yielding outcomes one story at a time.
///
/// `on_run_complete` fires once the last item has been handled; a stream
/// ended by a fatal error does not fire it.
///
/// # Example
/// ```rust,no_run
/// use storyslides::{generate_stream, FeedItem, GenerationConfig, SlideGenerator, ChromeRenderer};
/// use futures::StreamExt;
/// use std::sync::Arc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = GenerationConfig::default();
/// let renderer = Arc::new(ChromeRenderer::launch(&config).await?);
/// let generator = SlideGenerator::new(config, renderer, None)?;
/// let items = vec![FeedItem::new("https://example.com/1", "It began. It ended.")];
///
/// let mut stories = generate_stream(generator, items);
/// while let Some(story) = stories.next().await {
///     let story = story?;
///     println!("{} → {:?}", story.url, story.status);
/// }
/// # Ok(())
/// # }
/// ```
pub fn generate_stream(generator: SlideGenerator, items: Vec<FeedItem>) -> StoryStream {
    let state = StreamState {
        generator,
        items: items.into_iter(),
        generated: 0,
        skipped: 0,
    };
    let s = stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        let Some(item) = state.items.next() else {
            if let Some(cb) = state.generator.config().progress_callback.as_ref() {
                cb.on_run_complete(state.generated, state.skipped);
            }
            return None;
        };
        match state.generator.process_story(&item).await {
            Ok(outcome) => {
                match outcome.status {
                    StoryStatus::Generated => state.generated += 1,
                    StoryStatus::Skipped => state.skipped += 1,
                    StoryStatus::Empty => {}
                }
                Some((Ok(outcome), Some(state)))
            }
            Err(e) => Some((Err(e), None)),
        }
    });
    Box::pin(s)
}

struct StreamState {
    generator: SlideGenerator,
    items: std::vec::IntoIter<FeedItem>,
    generated: usize,
    skipped: usize,
}

/// Fetch the feed, start Chrome and stream outcomes for every item.
///
/// # Returns
/// - `Ok(StoryStream)`: one `Result<StoryOutcome, SlideGenError>` per item
/// - `Err(SlideGenError)`: fatal setup error (feed, translator, browser)
pub async fn generate_feed_stream(config: &GenerationConfig) -> Result<StoryStream, SlideGenError> {
    let source = config.feed_source();
    info!("Starting streaming run: {}", source);

    let items = feed::fetch_feed(&source, config.download_timeout_secs).await?;
    let translator = resolve_translator(config)?;
    let renderer: Arc<dyn SlideRenderer> = Arc::new(ChromeRenderer::launch(config).await?);
    let generator = SlideGenerator::new(config.clone(), renderer, translator)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(items.len());
    }
    Ok(generate_stream(generator, items))
}
