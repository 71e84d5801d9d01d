//! REST adapter for a remote document store.
//!
//! Documents live at `{base}/{collection}/{key}`. Reads return
//! `{"key", "data", "version"}` objects, full writes send `{"data"}`, and
//! partial writes send `{"fields"}` with an optional `If-Match` version.

use std::time::Duration;

use async_trait::async_trait;
use gatekeep_application::{DirectoryStore, DocumentVersion, StoredDocument};
use gatekeep_core::{AppError, AppResult};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use url::Url;


/// Connection settings for [`HttpDirectoryStore`].
#[derive(Debug, Clone)]
pub struct HttpDirectoryStoreConfig {
    /// Root URL that collections are resolved against.
    pub base_url: Url,
    /// Bearer token sent with every request, if set.
    pub api_token: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// HTTP-based implementation of the directory store port.
pub struct HttpDirectoryStore {
    http_client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocumentPayload {
    key: String,
    #[serde(default)]
    data: Map<String, Value>,
    version: u64,
}

impl From<DocumentPayload> for StoredDocument {
    fn from(payload: DocumentPayload) -> Self {
        Self {
            key: payload.key,
            data: payload.data,
            version: DocumentVersion::new(payload.version),
        }
    }
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    data: &'a Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct PatchRequest<'a> {
    fields: &'a Map<String, Value>,
}

impl HttpDirectoryStore {
    /// Creates a store client from configuration.
    pub fn new(config: HttpDirectoryStoreConfig) -> AppResult<Self> {
        if config.base_url.cannot_be_a_base() {
            return Err(AppError::Validation(format!(
                "directory base URL '{}' cannot hold path segments",
                config.base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|error| {
                AppError::Internal(format!("failed to build directory HTTP client: {error}"))
            })?;

        Ok(Self {
            http_client,
            base_url: config.base_url,
            api_token: config.api_token,
        })
    }

    fn document_url(&self, collection: &str, key: Option<&str>) -> AppResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                AppError::Internal(format!(
                    "directory base URL '{}' cannot hold path segments",
                    self.base_url
                ))
            })?;
            segments.pop_if_empty().push(collection);
            if let Some(key) = key {
                segments.push(key);
            }
        }
        Ok(url)
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let builder = self.http_client.request(method, url);
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> AppResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|error| AppError::Store(format!("directory transport error: {error}")))
    }
}

/// Maps a non-success status to the error taxonomy.
fn status_error(status: StatusCode, key: &str, body: String) -> AppError {
    match status {
        StatusCode::NOT_FOUND => AppError::NotFound(format!("document '{key}' not found")),
        StatusCode::CONFLICT | StatusCode::PRECONDITION_FAILED => {
            AppError::Conflict(format!("document '{key}' changed concurrently"))
        }
        _ => AppError::Store(format!(
            "directory request for '{key}' failed with status {status}: {body}"
        )),
    }
}

async fn error_from_response(response: reqwest::Response, key: &str) -> AppError {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<response body unavailable>".to_owned());
    status_error(status, key, body)
}

async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|error| AppError::Store(format!("invalid directory response: {error}")))
}

#[async_trait]
impl DirectoryStore for HttpDirectoryStore {
    async fn get(&self, collection: &str, key: &str) -> AppResult<Option<StoredDocument>> {
        let url = self.document_url(collection, Some(key))?;
        debug!(%url, "directory get");

        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(error_from_response(response, key).await);
        }

        let payload: DocumentPayload = decode(response).await?;
        Ok(Some(payload.into()))
    }

    async fn put(&self, collection: &str, key: &str, data: Map<String, Value>) -> AppResult<()> {
        let url = self.document_url(collection, Some(key))?;
        debug!(%url, "directory put");

        let response = self
            .send(
                self.request(reqwest::Method::PUT, url)
                    .json(&PutRequest { data: &data }),
            )
            .await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, key).await);
        }

        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        key: &str,
        fields: Map<String, Value>,
        precondition: Option<DocumentVersion>,
    ) -> AppResult<()> {
        let url = self.document_url(collection, Some(key))?;
        debug!(%url, guarded = precondition.is_some(), "directory update");

        let mut builder = self
            .request(reqwest::Method::PATCH, url)
            .json(&PatchRequest { fields: &fields });
        if let Some(version) = precondition {
            builder = builder.header(reqwest::header::IF_MATCH, version.to_string());
        }

        let response = self.send(builder).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, key).await);
        }

        Ok(())
    }

    async fn list_collection(&self, collection: &str) -> AppResult<Vec<StoredDocument>> {
        let url = self.document_url(collection, None)?;
        debug!(%url, "directory list");

        let response = self.send(self.request(reqwest::Method::GET, url)).await?;
        if !response.status().is_success() {
            return Err(error_from_response(response, collection).await);
        }

        let payloads: Vec<DocumentPayload> = decode(response).await?;
        Ok(payloads.into_iter().map(StoredDocument::from).collect())
    }
}
