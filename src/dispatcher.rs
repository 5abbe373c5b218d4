use std::sync::Arc;

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::Value;
use tracing::Instrument;
use ulid::Ulid;

use crate::config::{AuthPolicy, DispatcherConfig};
use crate::error::Error;
use crate::session::TokenSource;

/// Header carrying the per-request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Sends requests to one backend service.
///
/// Attaches the bearer token, enforces the configured timeout and maps a 401
/// to [`Error::Unauthenticated`]. It never touches the session itself: that is
/// the [`SessionGuard`](crate::SessionGuard)'s job. Holds no mutable state, so
/// one instance can serve any number of concurrent requests.
pub struct Dispatcher {
    config: DispatcherConfig,
    http: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: DispatcherConfig, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
            tokens,
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The configured timeout is still applied to every request.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// `GET path`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        let builder = self.request(Method::GET, path)?;
        self.send(Method::GET, path, json_header(builder)).await
    }

    /// `POST path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, Error> {
        self.with_json(Method::POST, path, body).await
    }

    /// `PUT path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, Error> {
        self.with_json(Method::PUT, path, body).await
    }

    /// `PATCH path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        self.with_json(Method::PATCH, path, body).await
    }

    /// `DELETE path` without a body.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn delete(&self, path: &str) -> Result<Value, Error> {
        let builder = self.request(Method::DELETE, path)?;
        self.send(Method::DELETE, path, json_header(builder)).await
    }

    /// `DELETE path` with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn delete_with<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        self.with_json(Method::DELETE, path, body).await
    }

    /// `POST path` with a multipart form, for uploads and bulk imports.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Value, Error> {
        let builder = self.request(Method::POST, path)?.multipart(form);
        self.send(Method::POST, path, builder).await
    }

    async fn with_json<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        let builder = self.request(method.clone(), path)?.json(body);
        self.send(method, path, builder).await
    }

    /// Request builder for `path` with the bearer token and timeout applied.
    ///
    /// For requests the typed helpers do not cover; finish with
    /// [`Dispatcher::send`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `path` does not form a valid URL.
    pub fn request(&self, method: Method, path: &str) -> Result<reqwest::RequestBuilder, Error> {
        let url = self.config.endpoint(path)?;
        let mut builder = self
            .http
            .request(method, url)
            .timeout(self.config.timeout);

        if self.config.auth == AuthPolicy::Bearer {
            if let Some(token) = self.tokens.access_token().filter(|t| !t.is_empty()) {
                builder = builder.bearer_auth(token.expose());
            }
        }
        Ok(builder)
    }

    /// Send a prepared request and decode the response body as JSON.
    ///
    /// An empty body decodes as `null` and a non-JSON body as a JSON string.
    ///
    /// # Errors
    ///
    /// - [`Error::Unauthenticated`] on 401
    /// - [`Error::Status`] on any other non-2xx status, with the body unmodified
    /// - [`Error::Timeout`] if the configured timeout elapses
    /// - [`Error::Http`] on network failure
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        builder: reqwest::RequestBuilder,
    ) -> Result<Value, Error> {
        let request_id = Ulid::new();
        let span = tracing::debug_span!(
            "dispatch",
            request_id = %request_id,
            method = %method,
            path,
        );
        let builder = builder.header(REQUEST_ID_HEADER, request_id.to_string());

        execute(builder).instrument(span).await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn execute(builder: reqwest::RequestBuilder) -> Result<Value, Error> {
    let response = builder.send().await.inspect_err(|e| {
        tracing::debug!(error = %e, "Request failed before a response arrived");
    })?;

    let status = response.status();
    if status.is_success() {
        tracing::debug!(status = status.as_u16(), "Request succeeded");
        let text = response.text().await?;
        return Ok(decode_body(text));
    }

    let body = decode_body(response.text().await.unwrap_or_default());
    if status == reqwest::StatusCode::UNAUTHORIZED {
        tracing::info!("Backend rejected credentials");
        return Err(Error::Unauthenticated { body });
    }
    tracing::debug!(status = status.as_u16(), "Backend returned an error status");
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

fn json_header(builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    builder.header(CONTENT_TYPE, "application/json")
}

fn decode_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}
