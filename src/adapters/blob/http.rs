//! HTTP object endpoint blob store
//!
//! Objects are addressed as `{endpoint}/{container}/{key}` and read and
//! written with plain `GET` and `PUT` requests, optionally carrying a bearer
//! token. The container and every `/`-separated key segment are
//! percent-encoded.

use super::traits::{validate_container, BlobStore};
use crate::config::schema::HttpBlobConfig;
use crate::config::SecretString;
use crate::domain::{BlobError, BlobKey, FerryError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, RequestBuilder, StatusCode, Url};
use secrecy::ExposeSecret;
use std::time::Duration;

/// HTTP-backed [`BlobStore`]
pub struct HttpBlobStore {
    endpoint: Url,
    client: Client,
    token: Option<SecretString>,
}

impl HttpBlobStore {
    /// Create a store from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a base URL or the HTTP
    /// client cannot be built.
    pub fn new(config: &HttpBlobConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| FerryError::Configuration(format!("Invalid blob endpoint: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(FerryError::Configuration(format!(
                "Blob endpoint {endpoint} cannot carry object paths"
            )));
        }

        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(config.timeout_seconds.min(30)))
            .build()
            .map_err(|e| FerryError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint,
            client,
            token: config.token.clone(),
        })
    }

    fn object_url(&self, container: &str, key: &BlobKey) -> Result<Url> {
        validate_container(container)?;
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| {
                FerryError::Configuration(format!(
                    "Blob endpoint {} cannot carry object paths",
                    self.endpoint
                ))
            })?
            .pop_if_empty()
            .push(container)
            .extend(key.as_str().split('/'));
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => request.bearer_auth(token.expose_secret().as_ref()),
            None => request,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    fn backend_name(&self) -> &'static str {
        "http"
    }

    async fn get(&self, container: &str, key: &BlobKey) -> Result<Vec<u8>> {
        let url = self.object_url(container, key)?;
        tracing::debug!(url = %url, "Fetching blob");

        let resp = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|e| BlobError::ReadFailed(format!("{url}: {e}")))?;

        match resp.status() {
            status if status.is_success() => {
                let body = resp
                    .bytes()
                    .await
                    .map_err(|e| BlobError::ReadFailed(format!("{url}: {e}")))?;
                Ok(body.to_vec())
            }
            StatusCode::NOT_FOUND => Err(BlobError::NotFound(format!("{container}/{key}")).into()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(BlobError::AccessDenied(format!("{container}/{key}")).into())
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(BlobError::ReadFailed(format!("{url} returned {status}: {body}")).into())
            }
        }
    }

    async fn put(
        &self,
        container: &str,
        key: &BlobKey,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let url = self.object_url(container, key)?;
        let size = body.len();

        let resp = self
            .authorize(self.client.put(url.clone()))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| BlobError::WriteFailed(format!("{url}: {e}")))?;

        match resp.status() {
            status if status.is_success() => {
                tracing::debug!(url = %url, bytes = size, "Blob written");
                Ok(())
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                Err(BlobError::AccessDenied(format!("{container}/{key}")).into())
            }
            status => {
                let body = resp.text().await.unwrap_or_default();
                Err(BlobError::WriteFailed(format!("{url} returned {status}: {body}")).into())
            }
        }
    }
}
