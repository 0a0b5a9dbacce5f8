use std::sync::Arc;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::{Client, Url};

use super::{ApiRequest, ApiResponse, HttpTransport};
use crate::config::ApiConfig;
use crate::error::TransportError;

/// `HttpTransport` over reqwest with a shared cookie jar.
///
/// Access and refresh credentials travel as cookies. The jar is filled by the
/// server's `Set-Cookie` headers (including the refresh endpoint's), so this
/// type never touches credential values itself.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns `TransportError::InvalidUrl` for a malformed base URL and
    /// `TransportError::Http` if the client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, TransportError> {
        let base_url =
            Url::parse(&config.base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url,
            jar,
        })
    }

    /// Seed the jar with a `name=value` cookie, e.g. credentials from a prior login.
    pub fn add_cookie(&self, cookie: &str) {
        self.jar.add_cookie_str(cookie, &self.base_url);
    }

    fn resolve(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::InvalidUrl(format!("{path}: {e}")))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.resolve(&request.path)?;
        let mut builder = self.client.request(request.method.clone(), url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.text().await.map_err(classify)?;
        Ok(ApiResponse { status, body })
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Http(err)
    }
}
