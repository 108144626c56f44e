use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::HeaderMap, header::HeaderValue, Client, Response};
use url::Url;

use common::prelude::{DirectoryError, DirectoryKey, DirectoryService};

use super::error::HttpDirectoryError;
use crate::http_server::api::v0::directory::{GetValuesResponse, PutValueRequest};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

type Result<T> = std::result::Result<T, DirectoryError<HttpDirectoryError>>;

/// [`DirectoryService`] backed by a remote directory node
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    pub remote: Url,
    client: Client,
}

impl HttpDirectory {
    pub fn new(remote: &Url) -> std::result::Result<Self, HttpDirectoryError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(default_headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            remote: remote.clone(),
            client,
        })
    }

    /// Get the base URL for directory requests
    pub fn base_url(&self) -> &Url {
        &self.remote
    }

    fn key_url(&self, key: &DirectoryKey) -> Result<Url> {
        self.remote
            .join(&format!("v0/directory/{}", key))
            .map_err(|e| DirectoryError::Provider(e.into()))
    }
}

/// Unreachable or slow nodes are network errors, everything else is the node's
fn classify(err: reqwest::Error) -> DirectoryError<HttpDirectoryError> {
    if err.is_connect() || err.is_timeout() {
        DirectoryError::Network(err.to_string())
    } else {
        DirectoryError::Provider(err.into())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(DirectoryError::Network(format!(
            "directory node returned {}: {}",
            status, body
        )))
    } else {
        Err(DirectoryError::Provider(HttpDirectoryError::HttpStatus(
            status, body,
        )))
    }
}

#[async_trait]
impl DirectoryService for HttpDirectory {
    type Error = HttpDirectoryError;

    async fn put(&self, key: &DirectoryKey, value: String) -> Result<()> {
        let url = self.key_url(key)?;
        let response = self
            .client
            .put(url)
            .json(&PutValueRequest { value })
            .send()
            .await
            .map_err(classify)?;
        check_status(response).await?;
        Ok(())
    }

    async fn get(&self, key: &DirectoryKey) -> Result<Vec<String>> {
        let url = self.key_url(key)?;
        let response = self.client.get(url).send().await.map_err(classify)?;
        let body: GetValuesResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(classify)?;
        Ok(body.values)
    }
}
