use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::{header::CONTENT_TYPE, Client};

use crate::{Error, Result};

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A document body ready to be stored alongside its case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    pub content_type: String,
    pub base64: String,
}

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument>;
}

/// Downloads documents over plain HTTP(S), outside the browser session.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: Client,
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedDocument> {
        let fail = |reason: String| Error::UploadFetch {
            url: url.to_owned(),
            reason,
        };

        let res = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|res| res.error_for_status())
            .map_err(|e| fail(e.to_string()))?;

        let content_type = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_owned();
        let body = res.bytes().await.map_err(|e| fail(e.to_string()))?;

        Ok(FetchedDocument {
            content_type,
            base64: STANDARD.encode(&body),
        })
    }
}
