//! Shared HTTP client for page fetches, search backends and LLM calls.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::{resolve_user_agent, USER_AGENT};

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::COOKIE;
use reqwest::Client;
use tracing::debug;

/// Default timeout for page fetches and searches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for constructing an `HttpClient`.
pub struct HttpClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
}

impl HttpClientBuilder {
    /// Set the user agent string.
    /// - `"impersonate"`: Use random real browser user agent
    /// - Any other string: Use as-is
    /// - Not called: Use default sdscheck user agent
    pub fn user_agent(mut self, ua: &str) -> Self {
        self.user_agent = Some(ua.to_string());
        self
    }

    /// Build the `HttpClient`.
    pub fn build(self) -> Result<HttpClient, reqwest::Error> {
        let user_agent = resolve_user_agent(self.user_agent.as_deref());
        let client = Client::builder()
            .user_agent(&user_agent)
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(HttpClient {
            client,
            timeout: self.timeout,
        })
    }
}

/// Thin wrapper over `reqwest::Client` with a fixed timeout and user agent.
///
/// Requests are never retried; callers decide what a failure means.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    /// Create a builder with the given request timeout.
    pub fn builder(timeout: Duration) -> HttpClientBuilder {
        HttpClientBuilder {
            timeout,
            user_agent: None,
        }
    }

    /// Request timeout applied to every call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        Ok(HttpResponse::new(response))
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_query<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        query: &T,
    ) -> Result<HttpResponse, reqwest::Error> {
        debug!("GET {} (with query)", url);
        let response = self.client.get(url).query(query).send().await?;
        Ok(HttpResponse::new(response))
    }

    /// Make a POST request with form data and optional cookies.
    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
        cookies: &[(&str, &str)],
    ) -> Result<HttpResponse, reqwest::Error> {
        debug!("POST {}", url);
        let mut request = self.client.post(url).form(form);
        if !cookies.is_empty() {
            let cookie = cookies
                .iter()
                .map(|(name, value)| format!("{}={}", name, value))
                .collect::<Vec<_>>()
                .join("; ");
            request = request.header(COOKIE, cookie);
        }
        let response = request.send().await?;
        Ok(HttpResponse::new(response))
    }

    /// POST JSON request with custom headers.
    pub async fn post_json_with_headers<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        json: &T,
        headers: &HashMap<String, String>,
    ) -> Result<HttpResponse, reqwest::Error> {
        debug!("POST {} (json)", url);
        let mut request = self.client.post(url).json(json);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request.send().await?;
        Ok(HttpResponse::new(response))
    }
}
