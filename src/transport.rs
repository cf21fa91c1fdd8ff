//! Shared JSON-over-HTTPS plumbing for the concrete service clients.

use crate::config::{ClientConfig, ServiceKind};
use crate::utils::error::{canonical_code, Error, Result};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl HttpTransport {
    /// A transport with a default HTTP client and no credentials, mostly
    /// useful against emulators and mock servers.
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            client: Client::new(),
            base_url: normalize_base(base_url)?,
            access_token: None,
        })
    }

    pub fn from_config(config: &ClientConfig, service: ServiceKind) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: normalize_base(&config.endpoint(service))?,
            access_token: config.access_token.clone(),
        })
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let request = self.request(Method::GET, path, query, None)?;
        self.send_json(request, Method::GET, path).await
    }

    pub async fn post<B, T>(&self, path: &str, query: &[(&str, String)], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, path, query, None)?.json(body);
        self.send_json(request, Method::POST, path).await
    }

    pub async fn put<B, T>(&self, path: &str, query: &[(&str, String)], body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PUT, path, query, None)?.json(body);
        self.send_json(request, Method::PUT, path).await
    }

    /// PATCH guarded by an optional etag (`If-Match`).
    pub async fn patch<B, T>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
        etag: Option<&str>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::PATCH, path, query, etag)?.json(body);
        self.send_json(request, Method::PATCH, path).await
    }

    /// POST whose response body is irrelevant.
    pub async fn post_empty<B>(&self, path: &str, query: &[(&str, String)], body: &B) -> Result<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, path, query, None)?.json(body);
        self.send(request, Method::POST, path).await.map(|_| ())
    }

    pub async fn delete(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        let request = self.request(Method::DELETE, path, query, None)?;
        self.send(request, Method::DELETE, path).await.map(|_| ())
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        etag: Option<&str>,
    ) -> Result<RequestBuilder> {
        let url = self.base_url.join(path)?;
        let mut request = self.client.request(method, url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        if let Some(etag) = etag.filter(|e| !e.is_empty()) {
            request = request.header(reqwest::header::IF_MATCH, etag);
        }
        Ok(request)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        method: Method,
        path: &str,
    ) -> Result<T> {
        let bytes = self.send(request, method, path).await?;
        if bytes.is_empty() {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn send(&self, request: RequestBuilder, method: Method, path: &str) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        tracing::debug!(%method, path, status = status.as_u16(), "request completed");

        let bytes = response.bytes().await?.to_vec();
        if status.is_success() {
            return Ok(bytes);
        }

        Err(api_error(status.as_u16(), &bytes))
    }
}

fn normalize_base(base_url: &str) -> Result<Url> {
    if base_url.ends_with('/') {
        Ok(Url::parse(base_url)?)
    } else {
        Ok(Url::parse(&format!("{}/", base_url))?)
    }
}

/// Builds an [`Error::Api`] from a Google JSON error body, falling back to
/// the raw body text when it is not one.
pub(crate) fn api_error(status: u16, body: &[u8]) -> Error {
    match serde_json::from_slice::<ErrorEnvelope>(body) {
        Ok(envelope) => Error::Api {
            status,
            code: if envelope.error.status.is_empty() {
                canonical_code(status).to_string()
            } else {
                envelope.error.status
            },
            message: envelope.error.message,
        },
        Err(_) => Error::Api {
            status,
            code: canonical_code(status).to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}
