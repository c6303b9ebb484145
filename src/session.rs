use std::time::Duration;

use crate::browser::{self, Browser, Visibility};
use crate::dates::ReportDate;
use crate::model::Credentials;
use crate::retry::RetryPolicy;
use crate::{CrawlConfig, Result};

/// Everything one crawl step needs: the shared page handle, the knobs, who
/// is asking and which docket date is being read.
#[derive(Clone, Copy)]
pub struct Session<'a> {
    pub browser: &'a dyn Browser,
    pub config: &'a CrawlConfig,
    pub credentials: &'a Credentials,
    pub report_date: ReportDate,
}

impl<'a> Session<'a> {
    pub fn new(
        browser: &'a dyn Browser,
        config: &'a CrawlConfig,
        credentials: &'a Credentials,
        report_date: ReportDate,
    ) -> Self {
        Self {
            browser,
            config,
            credentials,
            report_date,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_attempts, self.config.delay())
    }

    pub async fn wait(&self, selector: &str, state: Visibility) -> Result<()> {
        self.browser
            .wait_for(selector, state, self.config.timeout())
            .await
    }

    pub async fn wait_within(&self, selector: &str, state: Visibility, timeout: Duration) -> Result<()> {
        self.browser.wait_for(selector, state, timeout).await
    }

    pub async fn pause(&self) {
        tokio::time::sleep(self.config.delay()).await;
    }

    /// Waits for `loader` to show up and go away again. A loader that never
    /// shows is fine; the page simply didn't need one.
    pub async fn settle(&self, loader: &str) {
        if self
            .wait_within(loader, Visibility::Visible, self.config.loader_timeout())
            .await
            .is_ok()
        {
            self.settle_hidden(loader).await;
        }
    }

    pub async fn settle_hidden(&self, loader: &str) {
        if let Err(err) = self.wait(loader, Visibility::Hidden).await {
            tracing::debug!(loader, error = %err, "loader never cleared");
        }
    }

    /// The landing page is where the portal drops unauthenticated visitors.
    pub async fn on_login_page(&self) -> Result<bool> {
        Ok(self.browser.current_url().await? == self.config.target_url)
    }

    pub async fn screenshot(&self) {
        browser::capture(self.browser, &self.config.screenshot_path).await;
    }
}
