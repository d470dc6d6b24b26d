//! Minimal HTTP transport shared by the provider adapters
//!
//! Every call carries an explicit timeout. Network failures and timeouts come
//! back as [`TransportError`]; any HTTP status, including 404 and 5xx, comes
//! back as a normal [`HttpResponse`] so adapters can branch on it.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::error::TransportError;

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Extra request headers
    pub headers: Vec<(&'static str, String)>,
    /// Overrides the transport's default timeout
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A completed HTTP exchange
#[derive(Debug, Clone)]
pub struct HttpResponse<T> {
    pub status: StatusCode,
    pub data: T,
    pub headers: HeaderMap,
}

impl<T> HttpResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND
    }

    /// A response header as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// HTTP client with JSON and text coercion
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    timeout: Duration,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Transport {
    /// Create a transport whose requests time out after `timeout`
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .user_agent(concat!("horizons/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// GET, coercing the body to JSON (`Value::Null` when it is not JSON)
    pub async fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse<Value>, TransportError> {
        let request = self.request(Method::GET, url, options);
        self.send_json(url, request, options).await
    }

    /// GET, returning the raw body text
    pub async fn get_text(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> Result<HttpResponse<String>, TransportError> {
        let request = self.request(Method::GET, url, options);
        self.send_text(url, request, options).await
    }

    /// POST a JSON body
    pub async fn post<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<HttpResponse<Value>, TransportError> {
        let request = self
            .request(Method::POST, url, options)
            .header(CONTENT_TYPE, "application/json")
            .body(encode(url, body)?);
        self.send_json(url, request, options).await
    }

    /// POST a plain-text body
    pub async fn post_text(
        &self,
        url: &str,
        body: String,
        options: &RequestOptions,
    ) -> Result<HttpResponse<String>, TransportError> {
        let request = self
            .request(Method::POST, url, options)
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        self.send_text(url, request, options).await
    }

    /// PUT a JSON body
    pub async fn put<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
        options: &RequestOptions,
    ) -> Result<HttpResponse<Value>, TransportError> {
        let request = self
            .request(Method::PUT, url, options)
            .header(CONTENT_TYPE, "application/json")
            .body(encode(url, body)?);
        self.send_json(url, request, options).await
    }

    /// PUT a plain-text body
    pub async fn put_text(
        &self,
        url: &str,
        body: String,
        options: &RequestOptions,
    ) -> Result<HttpResponse<String>, TransportError> {
        let request = self
            .request(Method::PUT, url, options)
            .header(CONTENT_TYPE, "text/plain")
            .body(body);
        self.send_text(url, request, options).await
    }

    fn request(&self, method: Method, url: &str, options: &RequestOptions) -> RequestBuilder {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.insert(name, value);
            }
        }
        self.client
            .request(method, url)
            .headers(headers)
            .timeout(options.timeout.unwrap_or(self.timeout))
    }

    async fn send_text(
        &self,
        url: &str,
        request: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<HttpResponse<String>, TransportError> {
        let timeout = options.timeout.unwrap_or(self.timeout);
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url, timeout, e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let data = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::from_reqwest(url, timeout, e)
            } else {
                TransportError::Body {
                    url: url.to_string(),
                    source: e,
                }
            }
        })?;

        debug!("{} -> {}", url, status);
        Ok(HttpResponse {
            status,
            data,
            headers,
        })
    }

    async fn send_json(
        &self,
        url: &str,
        request: RequestBuilder,
        options: &RequestOptions,
    ) -> Result<HttpResponse<Value>, TransportError> {
        let response = self.send_text(url, request, options).await?;
        let data = serde_json::from_str(&response.data).unwrap_or(Value::Null);
        Ok(HttpResponse {
            status: response.status,
            data,
            headers: response.headers,
        })
    }
}

fn encode<B: Serialize + ?Sized>(url: &str, body: &B) -> Result<Vec<u8>, TransportError> {
    serde_json::to_vec(body).map_err(|source| TransportError::Encode {
        url: url.to_string(),
        source,
    })
}
