use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use bytes::Bytes;
use http::Uri;
use opentelemetry_http::HttpClient;
use url::Url;

use crate::error::SamplerError;

/// How much of an error response body is kept for diagnostics.
const BODY_EXCERPT_LEN: usize = 128;

/// Retrieves the raw strategy document for a service.
///
/// The default implementation speaks HTTP to a jaeger agent or an
/// OpenTelemetry collector; replace it to fetch strategies from a file, to
/// add authentication headers, or to script responses in tests.
#[async_trait]
pub trait StrategyFetcher: fmt::Debug + Send + Sync {
    /// Performs one request and returns the raw response body.
    async fn fetch(&self, service_name: &str) -> Result<Bytes, SamplerError>;
}

/// [`StrategyFetcher`] issuing `GET {server_url}?service={service_name}`.
#[derive(Debug)]
pub struct HttpStrategyFetcher<C> {
    client: C,
    server_url: Url,
}

impl<C> HttpStrategyFetcher<C> {
    /// Creates a fetcher for the given sampling server URL.
    pub fn new(client: C, server_url: &str) -> Result<Self, SamplerError> {
        let server_url = Url::parse(server_url).map_err(|err| {
            SamplerError::InvalidConfig(format!(
                "invalid sampling server URL {server_url:?}: {err}"
            ))
        })?;
        Ok(HttpStrategyFetcher { client, server_url })
    }

    fn strategy_uri(&self, service_name: &str) -> Result<Uri, SamplerError> {
        let mut url = self.server_url.clone();
        url.query_pairs_mut().append_pair("service", service_name);
        Uri::from_str(url.as_str())
            .map_err(|err| SamplerError::Transport(format!("invalid request URI: {err}")))
    }
}

#[async_trait]
impl<C> StrategyFetcher for HttpStrategyFetcher<C>
where
    C: HttpClient + 'static,
{
    async fn fetch(&self, service_name: &str) -> Result<Bytes, SamplerError> {
        let request = http::Request::get(self.strategy_uri(service_name)?)
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Bytes::new())
            .map_err(|err| SamplerError::Transport(err.to_string()))?;

        let response = self
            .client
            .send_bytes(request)
            .await
            .map_err(|err| SamplerError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SamplerError::Http {
                status: response.status().as_u16(),
                body: excerpt(response.body()),
            });
        }
        Ok(response.into_body())
    }
}

fn excerpt(body: &Bytes) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .take(BODY_EXCERPT_LEN)
        .collect()
}
