//! Pipeline stages for story-to-slide generation.
//!
//! Each submodule implements exactly one transformation step, so each is
//! testable on its own and the browser or translation back end can be
//! swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! feed ──▶ clean ──▶ segment ──▶ [translate] ──▶ render ──▶ crop
//! (listing)  (text)   (slides)     (LLM/Google)    (Chrome)    (PNG)
//! ```
//!
//! 1. [`feed`]      fetch the listing or read it from disk
//! 2. [`clean`]     decode entities and strip Markdown from self-text
//! 3. [`segment`]   greedy sentence packing under a character budget
//! 4. [`translate`] per-language translation with retry/backoff; the only
//!    stage besides `feed` with network I/O
//! 5. [`render`]    fill the HTML template in headless Chrome and screenshot
//!    it; runs in `spawn_blocking` because the DevTools client is synchronous
//! 6. [`crop`]      crop the capture to the fixed slide size

pub mod clean;
pub mod crop;
pub mod feed;
pub mod render;
pub mod segment;
pub mod translate;
