//! Logo download.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::header::{ACCEPT, CONTENT_TYPE};

use super::{FetchError, ImageFetcher};
use crate::config::FetchSettings;

/// Content type assumed when the server does not send one.
const DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Fetches images over HTTP(S) and inlines them as base64.
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_data_uri(&self, url: &str) -> Result<String, FetchError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(FetchError::Unsupported(url.to_string()));
        }

        let response = self.client.get(url).header(ACCEPT, "image/*").send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let bytes = response.bytes().await?;

        tracing::debug!(url, content_type = %content_type, size = bytes.len(), "fetched image");
        Ok(format!("data:{content_type};base64,{}", STANDARD.encode(&bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn fetcher() -> HttpImageFetcher {
        HttpImageFetcher::new(&FetchSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_inlines_image() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/logo.svg")
            .match_header("accept", "image/*")
            .with_status(200)
            .with_header("content-type", "image/svg+xml")
            .with_body("<svg/>")
            .create_async()
            .await;

        let uri = fetcher()
            .fetch_data_uri(&format!("{}/logo.svg", server.url()))
            .await
            .unwrap();

        assert_eq!(uri, format!("data:image/svg+xml;base64,{}", STANDARD.encode("<svg/>")));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_missing_content_type_defaults_to_png() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/raw")
            .with_status(200)
            .with_body([1u8, 2, 3])
            .create_async()
            .await;

        let uri = fetcher()
            .fetch_data_uri(&format!("{}/raw", server.url()))
            .await
            .unwrap();
        assert!(uri.starts_with("data:image/png;base64,"), "{uri}");
    }

    #[tokio::test]
    async fn test_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/gone.png")
            .with_status(404)
            .create_async()
            .await;

        let err = fetcher()
            .fetch_data_uri(&format!("{}/gone.png", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status(404)));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = fetcher().fetch_data_uri("ftp://host/logo.png").await.unwrap_err();
        assert!(matches!(err, FetchError::Unsupported(_)));
    }
}
