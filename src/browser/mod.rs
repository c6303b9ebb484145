//! The automation surface the crawler drives.
//!
//! Everything the crawl does to the page goes through [`Browser`], so the
//! state machines in this crate never see a WebDriver type.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::Result;

mod webdriver;

pub use webdriver::WebDriverBrowser;

/// Condition a selector wait resolves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// At least one match is in the DOM.
    Attached,
    /// At least one match is displayed.
    Visible,
    /// No match is displayed (or none exists).
    Hidden,
}

#[async_trait]
pub trait Browser: Send + Sync {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    async fn reload(&self) -> Result<()>;

    /// Resolves once `selector` satisfies `state`, or fails with
    /// [`crate::Error::Timeout`] after `timeout`.
    async fn wait_for(&self, selector: &str, state: Visibility, timeout: Duration) -> Result<()>;

    /// Evaluates `script` as a function body; `return` hands a value back.
    async fn evaluate(&self, script: &str) -> Result<Value>;

    async fn click(&self, selector: &str) -> Result<()>;

    async fn type_text(&self, selector: &str, text: &str) -> Result<()>;

    async fn select_option(&self, selector: &str, value: &str) -> Result<()>;

    async fn press_escape(&self) -> Result<()>;

    /// Text of the native dialog currently open, if any. Never blocks.
    async fn dialog_message(&self) -> Result<Option<String>>;

    async fn accept_dialog(&self) -> Result<()>;

    async fn screenshot(&self, path: &Path) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Evaluates `script` and reads the result as an optional string.
pub(crate) async fn evaluate_text(browser: &dyn Browser, script: &str) -> Result<Option<String>> {
    let value = browser.evaluate(script).await?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Null => None,
        other => Some(other.to_string()),
    })
}

/// Best-effort diagnostic capture. Failures are logged and dropped.
pub(crate) async fn capture(browser: &dyn Browser, path: &Path) {
    if let Err(err) = browser.screenshot(path).await {
        tracing::debug!(error = %err, "couldn't capture screenshot");
    }
}
