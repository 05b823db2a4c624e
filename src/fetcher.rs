use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

/// Terminal outcome of a single HTTP attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout(e.to_string());
        }
        match e.status() {
            Some(status) => FetchError::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => FetchError::Network(e.to_string()),
        }
    }
}

/// Anything that can hand back the raw bytes of detail page `id`.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, id: u32) -> Result<Vec<u8>, FetchError>;
}

pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(client)
}

pub fn page_url(base_url: &str, id: u32) -> String {
    format!("{}bd.php?id={}", base_url, id)
}

/// Fetches `{base_url}bd.php?id=<n>`. Non-2xx responses are errors.
pub struct HttpPageSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPageSource {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    async fn fetch(&self, id: u32) -> Result<Vec<u8>, FetchError> {
        let url = page_url(&self.base_url, id);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url,
            });
        }
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;

    use super::*;

    fn client() -> reqwest::Client {
        build_client(Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn page_url_appends_id_query() {
        assert_eq!(
            page_url("https://alleburgen.de/", 42),
            "https://alleburgen.de/bd.php?id=42"
        );
    }

    #[tokio::test]
    async fn fetches_page_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/bd.php")
            .match_query(Matcher::UrlEncoded("id".into(), "12".into()))
            .with_status(200)
            .with_body("<h1>Burg</h1>")
            .create_async()
            .await;

        let source = HttpPageSource::new(client(), format!("{}/", server.url()));
        let body = source.fetch(12).await.unwrap();

        assert_eq!(body, b"<h1>Burg</h1>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bd.php")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let source = HttpPageSource::new(client(), format!("{}/", server.url()));
        let err = source.fetch(1).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn connection_refused_is_a_network_error() {
        // Nothing listens on port 9 locally.
        let source = HttpPageSource::new(client(), "http://127.0.0.1:9/");
        let err = source.fetch(1).await.unwrap_err();

        assert!(matches!(err, FetchError::Network(_)));
    }
}
