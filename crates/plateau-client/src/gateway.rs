//! Thin transport layer over the PLATEAU API.
//!
//! Every request goes through [`HttpGateway`], which builds the URL from the
//! configured base, sends exactly once, and maps failures into
//! [`PlateauApiError`]:
//!
//! | Failure | Error |
//! |---------|-------|
//! | connect/timeout/TLS | `Http { endpoint, source }` |
//! | non-2xx | `ApiError { endpoint, status, body }` |
//! | body does not parse | `Deserialization { endpoint, source }` |
//!
//! There are no retries here. Callers that need to react to a specific status
//! (the pack status probe treats 404 as an unknown job) use [`HttpGateway::get`]
//! and inspect the response before handing it to [`HttpGateway::read_json`].
//!
//! The API token is attached per request and only to URLs with the same
//! origin as the base URL.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::config::ConfigError;
use crate::error::PlateauApiError;

/// Shared HTTP transport for all sub-clients.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
    base_url: Url,
    auth: Option<HeaderValue>,
}

impl HttpGateway {
    pub(crate) fn new(http: reqwest::Client, base_url: Url, auth: Option<HeaderValue>) -> Self {
        Self {
            http,
            base_url,
            auth,
        }
    }

    /// Base URL all paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Add the `Authorization` header when `url` shares the base URL's origin.
    pub(crate) fn authorize(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(value) if url.origin() == self.base_url.origin() => {
                request.header(AUTHORIZATION, value.clone())
            }
            _ => request,
        }
    }

    /// Resolve path segments against the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, PlateauApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                PlateauApiError::Config(ConfigError::InvalidUrl(
                    "base_url".to_string(),
                    format!("{} cannot be a base", self.base_url),
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a GET and return the raw response, mapping only transport failures.
    pub async fn get(
        &self,
        endpoint: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, PlateauApiError> {
        tracing::debug!(endpoint, %url, "PLATEAU request");
        let resp = self
            .authorize(self.http.get(url.clone()), &url)
            .query(query)
            .send()
            .await
            .map_err(|e| PlateauApiError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        tracing::debug!(endpoint, status = resp.status().as_u16(), "PLATEAU response");
        Ok(resp)
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: Url,
        query: &[(&str, &str)],
    ) -> Result<T, PlateauApiError> {
        let resp = self.get(endpoint, url, query).await?;
        self.read_json(endpoint, resp).await
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B, T>(
        &self,
        endpoint: &str,
        url: Url,
        body: &B,
    ) -> Result<T, PlateauApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        tracing::debug!(endpoint, %url, "PLATEAU request");
        let resp = self
            .authorize(self.http.post(url.clone()), &url)
            .json(body)
            .send()
            .await
            .map_err(|e| PlateauApiError::Http {
                endpoint: endpoint.into(),
                source: e,
            })?;
        tracing::debug!(endpoint, status = resp.status().as_u16(), "PLATEAU response");
        self.read_json(endpoint, resp).await
    }

    /// Check the status of a response and decode its JSON body.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        resp: reqwest::Response,
    ) -> Result<T, PlateauApiError> {
        let resp = ensure_success(endpoint, resp).await?;
        resp.json().await.map_err(|e| PlateauApiError::Deserialization {
            endpoint: endpoint.into(),
            source: e,
        })
    }
}

/// Turn a non-2xx response into `ApiError`, keeping the body for diagnostics.
pub(crate) async fn ensure_success(
    endpoint: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, PlateauApiError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(PlateauApiError::ApiError {
        endpoint: endpoint.into(),
        status,
        body,
    })
}
