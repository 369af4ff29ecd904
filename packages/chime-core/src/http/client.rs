//! One-shot request helpers.

use std::sync::Arc;

use super::headers::Header;
use super::response::Response;
use crate::config::HttpConfig;
use crate::error::HttpResult;
use crate::transport::{Connector, NetConnector};

/// Creates, connects and issues a request in one call.
///
/// Holds only configuration and a connector, so a single client can be
/// shared and used to produce many independent [`Response`]s.
#[derive(Clone)]
pub struct HttpClient {
    config: HttpConfig,
    connector: Arc<dyn Connector>,
}

impl HttpClient {
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        let connector = NetConnector::arc(&config);
        Self { config, connector }
    }

    #[must_use]
    pub fn with_connector(config: HttpConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    fn connected(&self, url: &str) -> HttpResult<Response> {
        let mut response = Response::new(self.config.clone(), self.connector.clone());
        response.connect(url, self.config.max_headers)?;
        Ok(response)
    }

    /// `GET url`, returning the response positioned at the body.
    pub fn get(&self, url: &str, headers: &[Header]) -> HttpResult<Response> {
        let mut response = self.connected(url)?;
        response.get(url, headers)?;
        Ok(response)
    }

    /// `POST url` with `body`.
    pub fn post(&self, url: &str, headers: &[Header], body: &[u8]) -> HttpResult<Response> {
        let mut response = self.connected(url)?;
        response.post(url, headers, body)?;
        Ok(response)
    }
}
