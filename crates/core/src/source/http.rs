use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use led_board_transit::{DataFetcher, Result, TransitError};
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::config::BoardConfig;

const USER_AGENT: &str = concat!("led-board/", env!("CARGO_PKG_VERSION"));

/// [`DataFetcher`] over a shared reqwest client. Responses are never cached.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|err| TransitError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    pub fn from_config(config: &BoardConfig) -> Result<Self> {
        Self::new(config.request_timeout())
    }
}

impl DataFetcher for HttpFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            debug!(url, "GET");
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|err| TransitError::Transport(err.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransitError::Upstream {
                    url: url.to_owned(),
                    status: status.as_u16(),
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|err| TransitError::Decode(err.to_string()))
        })
    }
}
