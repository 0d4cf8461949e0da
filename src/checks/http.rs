//! HTTP access shared by the network based checks.

use std::time::Duration;

use reqwest::Client;
use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::config::CheckSection;
use crate::error::CheckError;
use crate::error::ConfigurationError;

/// Seconds a request may take unless configured otherwise.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// A client bound to one endpoint with a request timeout.
#[derive(Debug, Clone)]
pub struct Endpoint {
    client: Client,
    url: Url,
}

impl Endpoint {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ConfigurationError> {
        let url = Url::parse(url).map_err(|e| ConfigurationError::invalid("url", e))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigurationError::invalid("timeout", e))?;
        Ok(Self { client, url })
    }

    /// Read `url` and `timeout` from a section.
    pub fn from_section(section: &CheckSection, default_url: Option<&str>) -> Result<Self, ConfigurationError> {
        let url = match default_url {
            Some(default) => section.string_or("url", default)?,
            None => section.required_string("url")?,
        };
        let timeout = section.unsigned_or("timeout", DEFAULT_TIMEOUT_SECS)?;
        Self::new(&url, Duration::from_secs(timeout))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// GET the endpoint and return the raw body.
    pub async fn get_bytes(&self) -> Result<Vec<u8>, CheckError> {
        self.get(self.url.clone()).await
    }

    /// GET the endpoint with query parameters and decode the JSON reply.
    pub async fn get_json<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, CheckError> {
        let url = Url::parse_with_params(self.url.as_str(), params).map_err(CheckError::temporary)?;
        let body = self.get(url).await?;
        serde_json::from_slice(&body)
            .map_err(|e| CheckError::temporary(format!("Invalid reply from {}: {}", self.url, e)))
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>, CheckError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CheckError::temporary(format!("Request to {} failed: {}", self.url, e)))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| CheckError::temporary(format!("Reading reply from {} failed: {}", self.url, e)))?;
        Ok(body.to_vec())
    }
}
