//! reqwest-backed fetcher.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

use super::Fetcher;
use crate::error::{FetchError, FetchResult};

/// User agent string for API requests.
const USER_AGENT_VALUE: &str = concat!("appflow/", env!("CARGO_PKG_VERSION"));

/// HTTP request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetcher talking to the app backend over HTTP.
///
/// Redirects are not followed: a `303` answer to a data save carries the
/// new data element id and is handled by the caller.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(language: &str) -> FetchResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        if let Ok(value) = HeaderValue::from_str(language) {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetchError::transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client })
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> FetchResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(e.to_string()))?;
        handle_response(response).await
    }
}

/// Check the status and parse the body.
///
/// Bodies that are not JSON (rule handlers are scripts) come back as a
/// JSON string; an empty body is `null`.
async fn handle_response(response: reqwest::Response) -> FetchResult<Value> {
    let status = response.status();
    let url = response.url().to_string();
    let text = response
        .text()
        .await
        .map_err(|e| FetchError::transport(e.to_string()))?;
    let body = parse_body(&text);

    if !status.is_success() {
        tracing::debug!(%url, status = status.as_u16(), "request rejected");
        return Err(FetchError::status(status.as_u16(), body));
    }
    Ok(body.unwrap_or(Value::Null))
}

fn parse_body(text: &str) -> Option<Value> {
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
}

impl Fetcher for HttpFetcher {
    fn get(&self, url: &str) -> impl Future<Output = FetchResult<Value>> + Send {
        tracing::trace!(url, "GET");
        self.send(self.client.get(url))
    }

    fn post(&self, url: &str, body: Option<&Value>) -> impl Future<Output = FetchResult<Value>> + Send {
        tracing::trace!(url, "POST");
        let mut request = self.client.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(request)
    }

    fn put(&self, url: &str, body: &Value) -> impl Future<Output = FetchResult<Value>> + Send {
        tracing::trace!(url, "PUT");
        self.send(self.client.put(url).json(body))
    }
}
