//! Slide rendering: fill the HTML template in headless Chrome and screenshot it.
//!
//! ## Why spawn_blocking?
//!
//! `headless_chrome` drives Chrome over a synchronous DevTools transport; every
//! call blocks the calling thread until Chrome answers. Running each render on
//! `tokio::task::spawn_blocking` keeps the runtime's worker threads free while
//! the pipeline awaits the result before moving to the next slide.
//!
//! The [`SlideRenderer`] trait is the seam the orchestrator talks to, so tests
//! and alternative back ends can render without a browser.

use crate::config::GenerationConfig;
use crate::error::SlideGenError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// Built-in slide template. The renderer writes the slide text into the
/// first `.slide p` element; custom templates must provide one.
pub const DEFAULT_SLIDE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<style>
  html, body { margin: 0; padding: 0; background: #111; }
  .slide {
    box-sizing: border-box;
    width: 266px;
    height: 720px;
    padding: 18px 16px;
    display: flex;
    align-items: center;
    background: linear-gradient(180deg, #1b1b1f 0%, #0d0d10 100%);
  }
  .slide p {
    margin: 0;
    color: #f4f4f4;
    font-family: "Segoe UI", "Helvetica Neue", Arial, sans-serif;
    font-size: 15px;
    line-height: 1.45;
    text-shadow: 0 1px 2px rgba(0, 0, 0, 0.6);
    overflow-wrap: break-word;
  }
</style>
</head>
<body>
  <div class="slide"><p></p></div>
</body>
</html>
"#;

/// A render failure for one slide. Non-fatal to the run.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct RenderError(pub String);

/// Renders slide text to image bytes.
#[async_trait]
pub trait SlideRenderer: Send + Sync {
    /// Render `text` and return the captured image as PNG bytes.
    async fn render(&self, text: &str) -> Result<Vec<u8>, RenderError>;
}

/// JavaScript that writes `text` into the template's `.slide p` element.
///
/// The text is embedded as a JSON string literal, which is also a valid JS
/// string literal, so quotes and backslashes in stories cannot break out.
pub fn fill_script(text: &str) -> String {
    let literal = serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string());
    format!(
        r#"(function() {{
            const el = document.querySelector('.slide p');
            if (!el) return false;
            el.textContent = {literal};
            return true;
        }})()"#
    )
}

/// Headless Chrome renderer.
pub struct ChromeRenderer {
    inner: Arc<ChromeInner>,
}

struct ChromeInner {
    browser: Browser,
    template_url: String,
    width: u32,
    height: u32,
    timeout: Duration,
    /// Holds the staged built-in template alive for the renderer's lifetime.
    _template_dir: Option<TempDir>,
}

impl ChromeRenderer {
    /// Start Chrome and stage the slide template.
    ///
    /// Failing to start the browser is fatal for the run.
    pub async fn launch(config: &GenerationConfig) -> Result<Self, SlideGenError> {
        let (template_path, template_dir) = stage_template(config.template_path.as_deref())?;
        let template_url = reqwest::Url::from_file_path(&template_path)
            .map_err(|_| {
                SlideGenError::Internal(format!(
                    "cannot build file URL for template {}",
                    template_path.display()
                ))
            })?
            .to_string();

        let width = config.slide_width;
        let height = config.slide_height;
        let chrome_path = config.chrome_path.clone();
        let sandbox = config.sandbox;

        let browser = tokio::task::spawn_blocking(move || {
            launch_browser(chrome_path, sandbox, width, height)
        })
        .await
        .map_err(|e| SlideGenError::Internal(format!("Browser launch task panicked: {e}")))??;

        info!("Headless Chrome ready; template {}", template_url);

        Ok(Self {
            inner: Arc::new(ChromeInner {
                browser,
                template_url,
                width,
                height,
                timeout: Duration::from_secs(config.render_timeout_secs),
                _template_dir: template_dir,
            }),
        })
    }
}

#[async_trait]
impl SlideRenderer for ChromeRenderer {
    async fn render(&self, text: &str) -> Result<Vec<u8>, RenderError> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        tokio::task::spawn_blocking(move || inner.render_blocking(&text))
            .await
            .map_err(|e| RenderError(format!("render task panicked: {e}")))?
    }
}

impl ChromeInner {
    fn render_blocking(&self, text: &str) -> Result<Vec<u8>, RenderError> {
        let start = Instant::now();
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| RenderError(format!("failed to open tab: {e}")))?;

        let result = self.capture(&tab, text);

        if let Err(e) = tab.close(true) {
            debug!("Failed to close tab: {e}");
        }

        if let Ok(ref png) = result {
            debug!(
                "Rendered slide ({} chars) → {} bytes in {:?}",
                text.chars().count(),
                png.len(),
                start.elapsed()
            );
        }
        result
    }

    fn capture(&self, tab: &Tab, text: &str) -> Result<Vec<u8>, RenderError> {
        tab.set_default_timeout(self.timeout);

        tab.navigate_to(&self.template_url)
            .map_err(|e| RenderError(format!("failed to load template: {e}")))?
            .wait_until_navigated()
            .map_err(|e| RenderError(format!("template navigation failed: {e}")))?;

        let filled = tab
            .evaluate(&fill_script(text), false)
            .map_err(|e| RenderError(format!("failed to fill template: {e}")))?
            .value
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !filled {
            return Err(RenderError(
                "template has no `.slide p` element".to_string(),
            ));
        }

        let screenshot = tab
            .call_method(Page::CaptureScreenshot {
                format: Some(Page::CaptureScreenshotFormatOption::Png),
                quality: None,
                clip: Some(Page::Viewport {
                    x: 0.0,
                    y: 0.0,
                    width: f64::from(self.width),
                    height: f64::from(self.height),
                    scale: 1.0,
                }),
                from_surface: Some(true),
                capture_beyond_viewport: Some(true),
                optimize_for_speed: Some(false),
            })
            .map_err(|e| RenderError(format!("screenshot failed: {e}")))?;

        STANDARD
            .decode(screenshot.data)
            .map_err(|e| RenderError(format!("failed to decode screenshot: {e}")))
    }
}

fn launch_browser(
    chrome_path: Option<PathBuf>,
    sandbox: bool,
    width: u32,
    height: u32,
) -> Result<Browser, SlideGenError> {
    let options = LaunchOptionsBuilder::default()
        .headless(true)
        .sandbox(sandbox)
        .window_size(Some((width, height)))
        .path(chrome_path)
        .build()
        .map_err(|e| SlideGenError::BrowserLaunchFailed(e.to_string()))?;
    Browser::new(options).map_err(|e| SlideGenError::BrowserLaunchFailed(e.to_string()))
}

/// Resolve the template to an absolute path, writing the built-in template
/// to a temp dir when no custom one is configured.
fn stage_template(custom: Option<&Path>) -> Result<(PathBuf, Option<TempDir>), SlideGenError> {
    if let Some(path) = custom {
        if !path.is_file() {
            return Err(SlideGenError::TemplateNotFound {
                path: path.to_path_buf(),
            });
        }
        let abs = path
            .canonicalize()
            .map_err(|_| SlideGenError::TemplateNotFound {
                path: path.to_path_buf(),
            })?;
        return Ok((abs, None));
    }

    let dir = TempDir::new().map_err(|e| SlideGenError::Internal(format!("tempdir: {e}")))?;
    let path = dir.path().join("slide.html");
    std::fs::write(&path, DEFAULT_SLIDE_TEMPLATE).map_err(|source| {
        SlideGenError::OutputWriteFailed {
            path: path.clone(),
            source,
        }
    })?;
    let abs = path
        .canonicalize()
        .map_err(|e| SlideGenError::Internal(format!("template path: {e}")))?;
    Ok((abs, Some(dir)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_script_escapes_text() {
        let script = fill_script(r#"She said "no" and left \ forever."#);
        assert!(script.contains(r#""She said \"no\" and left \\ forever.""#));
        assert!(script.contains(".slide p"));
    }

    #[test]
    fn fill_script_escapes_newlines_and_script_tags() {
        let script = fill_script("line one\nline two </script>");
        assert!(script.contains(r#""line one\nline two </script>""#));
        assert!(!script.contains("one\nline"));
    }

    #[test]
    fn default_template_has_target_element() {
        assert!(DEFAULT_SLIDE_TEMPLATE.contains(r#"<div class="slide"><p></p></div>"#));
        assert!(DEFAULT_SLIDE_TEMPLATE.contains("width: 266px"));
        assert!(DEFAULT_SLIDE_TEMPLATE.contains("height: 720px"));
    }

    #[test]
    fn stage_builtin_template() {
        let (path, dir) = stage_template(None).expect("stage");
        assert!(path.is_absolute());
        assert!(dir.is_some());
        let html = std::fs::read_to_string(&path).unwrap();
        assert_eq!(html, DEFAULT_SLIDE_TEMPLATE);
    }

    #[test]
    fn stage_missing_custom_template() {
        let err = stage_template(Some(Path::new("/no/such/slide.html"))).unwrap_err();
        assert!(matches!(err, SlideGenError::TemplateNotFound { .. }));
    }

    #[test]
    fn stage_custom_template_is_used_in_place() {
        let dir = TempDir::new().unwrap();
        let custom = dir.path().join("custom.html");
        std::fs::write(&custom, "<div class=\"slide\"><p></p></div>").unwrap();
        let (path, staged) = stage_template(Some(&custom)).expect("stage");
        assert!(staged.is_none());
        assert_eq!(path, custom.canonicalize().unwrap());
    }
}
