//! Plain HTTP GET client used for policy and sitemap documents.

use anyhow::{Context, Result};
use std::time::Duration;

/// A fetched document.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL after redirects.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

/// Thin wrapper over a shared `reqwest::Client` with a fixed user agent.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    user_agent: String,
}

impl HttpClient {
    /// Build a client that identifies itself as `user_agent`.
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// GET a URL and read the full body.
    ///
    /// Non-2xx statuses are returned as responses, not errors. Transport
    /// failures and timeouts surface as the underlying `reqwest::Error`
    /// inside the `anyhow::Error`.
    pub async fn get(&self, url: &str, timeout_ms: u64) -> Result<HttpResponse> {
        let resp = self
            .client
            .get(url)
            .timeout(Duration::from_millis(timeout_ms))
            .send()
            .await?;

        let final_url = resp.url().to_string();
        let status = resp.status().as_u16();
        let body = resp.text().await?;

        Ok(HttpResponse {
            url: final_url,
            status,
            body,
        })
    }
}

/// Whether an error returned by [`HttpClient::get`] was a timeout.
pub fn is_timeout(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .map(|e| e.is_timeout())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_returns_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .and(header("user-agent", "TestBot/1.0"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi"))
            .mount(&server)
            .await;

        let client = HttpClient::new("TestBot/1.0").unwrap();
        let resp = client
            .get(&format!("{}/hello", server.uri()), 5_000)
            .await
            .unwrap();

        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "hi");
        assert_eq!(client.user_agent(), "TestBot/1.0");
    }

    #[tokio::test]
    async fn test_error_status_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = HttpClient::new("TestBot/1.0").unwrap();
        let resp = client.get(&server.uri(), 5_000).await.unwrap();
        assert_eq!(resp.status, 503);
    }

    #[tokio::test]
    async fn test_timeout_is_detected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::new("TestBot/1.0").unwrap();
        let err = client.get(&server.uri(), 50).await.unwrap_err();
        assert!(is_timeout(&err));
    }
}
