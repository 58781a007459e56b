//! Page source abstraction.
//!
//! The crawler mechanics live behind the `PageSource` trait: the pipeline
//! only ever asks for the raw content of one URL. The one-hop disclaimer
//! follow is an explicit second `fetch` in the pipeline, never recursion
//! inside the source.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::config::SourceConfig;
use crate::types::OracleError;

/// Abstraction over the page source.
///
/// Implementors return the raw content of one URL. Transport failures map
/// to `OracleError::Fetch` and are fatal for the run.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, OracleError>;
}

/// HTTP page source backed by reqwest.
pub struct HttpPageSource {
    http: Client,
}

impl HttpPageSource {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(cfg.request_timeout_secs))
            .user_agent(cfg.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for page source")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, url: &str) -> Result<String, OracleError> {
        let fetch_err = |message: String| OracleError::Fetch {
            url: url.to_string(),
            message,
        };

        debug!(%url, "Fetching page");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?
            .error_for_status()
            .map_err(|e| fetch_err(e.to_string()))?;

        response.text().await.map_err(|e| fetch_err(e.to_string()))
    }
}

/// Resolve a (possibly relative) disclaimer link against the page it was
/// found on. Failure to resolve is a fetch error, not a parse error.
pub fn resolve_redirect(base: &str, href: &str) -> Result<String, OracleError> {
    let base_url = url::Url::parse(base).map_err(|e| OracleError::Fetch {
        url: base.to_string(),
        message: format!("invalid base URL: {e}"),
    })?;
    let target = base_url.join(href).map_err(|e| OracleError::Fetch {
        url: base.to_string(),
        message: format!("cannot resolve redirect target `{href}`: {e}"),
    })?;
    Ok(target.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_redirect() {
        let target = resolve_redirect(
            "https://funds.example.com/uk/individual/en/products/307243/fund?x=1",
            "/uk/individual/en/products/307243/fund-detail",
        )
        .unwrap();
        assert_eq!(
            target,
            "https://funds.example.com/uk/individual/en/products/307243/fund-detail"
        );
    }

    #[test]
    fn test_resolve_absolute_redirect() {
        let target =
            resolve_redirect("https://funds.example.com/a", "https://other.example.com/b").unwrap();
        assert_eq!(target, "https://other.example.com/b");
    }

    #[test]
    fn test_resolve_bad_base_is_fetch_error() {
        let err = resolve_redirect("not a url", "/x").unwrap_err();
        assert!(matches!(err, OracleError::Fetch { .. }));
    }
}
