//! Blocking HTTP transport backed by reqwest.

use crate::error::{EngineError, EngineResult};
use crate::transport::{Headers, HttpClient, HttpResponse};
use reqwest::blocking::{Client, RequestBuilder};
use std::time::Duration;

/// Network transport used by the CLI.
#[derive(Debug, Clone)]
pub struct ReqwestClient {
    inner: Client,
}

impl ReqwestClient {
    /// Creates a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> EngineResult<Self> {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("poupon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EngineError::transport(e.to_string()))?;
        Ok(Self { inner })
    }

    fn send(&self, builder: RequestBuilder, headers: &Headers) -> Result<HttpResponse, String> {
        let builder = headers
            .iter()
            .fold(builder, |b, (name, value)| b.header(name.as_str(), value.as_str()));

        let response = builder.send().map_err(|e| e.to_string())?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().map_err(|e| e.to_string())?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.send(self.inner.get(url), headers)
    }

    fn post(
        &self,
        url: &str,
        headers: &Headers,
        body: Option<&str>,
    ) -> Result<HttpResponse, String> {
        let builder = self.inner.post(url);
        let builder = match body {
            Some(body) => builder.body(body.to_string()),
            None => builder,
        };
        self.send(builder, headers)
    }

    fn delete(&self, url: &str, headers: &Headers) -> Result<HttpResponse, String> {
        self.send(self.inner.delete(url), headers)
    }
}
