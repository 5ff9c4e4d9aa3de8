//! Fetch layer.
//!
//! Every backend call goes through [`Fetcher`], so tests can swap the HTTP
//! client for a scripted backend.

mod http;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

pub use http::HttpFetcher;

use crate::error::FetchResult;

/// JSON request methods used by the runtime.
///
/// A non-success answer rejects with a [`crate::FetchError`] carrying the
/// status and the parsed body.
pub trait Fetcher: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = FetchResult<Value>> + Send;

    fn post(&self, url: &str, body: Option<&Value>) -> impl Future<Output = FetchResult<Value>> + Send;

    fn put(&self, url: &str, body: &Value) -> impl Future<Output = FetchResult<Value>> + Send;
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn get(&self, url: &str) -> impl Future<Output = FetchResult<Value>> + Send {
        (**self).get(url)
    }

    fn post(&self, url: &str, body: Option<&Value>) -> impl Future<Output = FetchResult<Value>> + Send {
        (**self).post(url, body)
    }

    fn put(&self, url: &str, body: &Value) -> impl Future<Output = FetchResult<Value>> + Send {
        (**self).put(url, body)
    }
}
