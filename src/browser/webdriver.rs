use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{json, Map, Value};
use tokio::{fs::File, io::AsyncWriteExt};

use super::{Browser, Visibility};
use crate::{CrawlConfig, Error, Result};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// WebDriver code point for the Escape key.
const ESCAPE_KEY: &str = "\u{e00c}";

/// [`Browser`] backed by a WebDriver session (chromedriver or similar).
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    pub async fn connect(config: &CrawlConfig) -> Result<Self> {
        let mut args = vec![
            "--no-sandbox",
            "--disable-gpu",
            "--disable-site-isolation-trials",
            "--disable-dev-shm-usage",
            "--window-size=1920,1280",
        ];
        if config.headless {
            args.push("--headless=new");
        }

        let mut caps = Map::new();
        caps.insert("acceptInsecureCerts".into(), json!(true));
        caps.insert("goog:chromeOptions".into(), json!({ "args": args }));

        let mut builder = ClientBuilder::native();
        builder.capabilities(caps);
        let client = builder.connect(&config.webdriver_url).await?;
        client.set_window_size(1920, 1280).await?;

        Ok(Self { client })
    }

    async fn satisfies(&self, selector: &str, state: Visibility) -> Result<bool> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;
        if state == Visibility::Attached {
            return Ok(!elements.is_empty());
        }

        let mut displayed = false;
        for el in &elements {
            // Elements can detach between lookup and check; treat them as gone.
            if el.is_displayed().await.unwrap_or(false) {
                displayed = true;
                break;
            }
        }
        Ok(match state {
            Visibility::Visible => displayed,
            _ => !displayed,
        })
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn goto(&self, url: &str) -> Result<()> {
        self.client.goto(url).await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn reload(&self) -> Result<()> {
        self.client.refresh().await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, state: Visibility, timeout: Duration) -> Result<()> {
        let poll = async {
            loop {
                if self.satisfies(selector, state).await? {
                    return Ok::<_, Error>(());
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        };
        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| Error::Timeout {
                selector: selector.into(),
                timeout,
            })?
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        Ok(self.client.execute(script, Vec::new()).await?)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.client.find(Locator::Css(selector)).await?.click().await?;
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
        let el = self.client.find(Locator::Css(selector)).await?;
        el.click().await?;
        el.send_keys(text).await?;
        Ok(())
    }

    async fn select_option(&self, selector: &str, value: &str) -> Result<()> {
        self.client
            .find(Locator::Css(selector))
            .await?
            .select_by_value(value)
            .await?;
        Ok(())
    }

    async fn press_escape(&self) -> Result<()> {
        self.client
            .find(Locator::Css("body"))
            .await?
            .send_keys(ESCAPE_KEY)
            .await?;
        Ok(())
    }

    async fn dialog_message(&self) -> Result<Option<String>> {
        // WebDriver signals "no alert open" as an error.
        Ok(self.client.get_alert_text().await.ok())
    }

    async fn accept_dialog(&self) -> Result<()> {
        self.client.accept_alert().await?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<()> {
        let png = self.client.screenshot().await?;
        let mut file = File::create(path).await?;
        file.write_all(&png).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}
