//! Transport layer abstraction for platform calls.
//!
//! The resource client depends only on the [`HttpClient`] capability, so
//! the real network stack, an in-memory fake platform and scripted mocks
//! are interchangeable.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Ordered request headers.
pub type Headers = Vec<(String, String)>;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

/// A raw response: status, headers and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response without headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Adds a response header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Looks up a header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Errors are
/// returned as plain messages; the caller translates them.
pub trait HttpClient: Send + Sync {
    /// Sends a GET request.
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String>;

    /// Sends a POST request with an optional JSON body.
    fn post(&self, url: &str, headers: &Headers, body: Option<&str>)
        -> Result<HttpResponse, String>;

    /// Sends a DELETE request.
    fn delete(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String>;
}

impl<C: HttpClient + ?Sized> HttpClient for Arc<C> {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        (**self).get(url, headers)
    }

    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        (**self).post(url, headers, body)
    }

    fn delete(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        (**self).delete(url, headers)
    }
}

/// A request as seen by [`MockHttpClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Method.
    pub method: Method,
    /// Full URL.
    pub url: String,
    /// Headers sent.
    pub headers: Headers,
    /// Body sent, if any.
    pub body: Option<String>,
}

impl RecordedRequest {
    /// Looks up a sent header, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parses the sent body as JSON.
    pub fn json(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|b| serde_json::from_str(b).ok())
    }
}

/// A scripted transport for testing.
///
/// Responses are served in the order they were queued, regardless of the
/// request; every request is recorded.
#[derive(Debug, Default)]
pub struct MockHttpClient {
    responses: Mutex<VecDeque<Result<HttpResponse, String>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockHttpClient {
    /// Creates a mock with no queued responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push_response(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    /// Queues a fully built response.
    pub fn push_raw(&self, response: HttpResponse) -> &Self {
        self.responses.lock().push_back(Ok(response));
        self
    }

    /// Queues a transport failure.
    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        self.responses.lock().push_back(Err(message.into()));
        self
    }

    /// Returns every request seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests seen so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    fn respond(
        &self,
        method: Method,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            headers: headers.clone(),
            body: body.map(str::to_string),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(format!("no mock response queued for {url}")))
    }
}

impl HttpClient for MockHttpClient {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.respond(Method::Get, url, headers, None)
    }

    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        self.respond(Method::Post, url, headers, body)
    }

    fn delete(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.respond(Method::Delete, url, headers, None)
    }
}
