//! In-memory [`DataFetcher`] for tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use led_board_transit::{DataFetcher, Result, TransitError};
use serde_json::Value;
use tokio::sync::Semaphore;

#[derive(Clone, Debug)]
pub enum MockResponse {
    Json(Value),
    Status(u16),
}

/// Answers requests from URL-prefix routes; the first matching route wins.
/// Unrouted URLs answer 404.
#[derive(Default)]
pub struct MockFetcher {
    routes: Vec<(String, MockResponse)>,
    requests: Mutex<Vec<String>>,
    gate: Option<Arc<Semaphore>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, prefix: &str, value: Value) -> Self {
        self.routes.push((prefix.to_owned(), MockResponse::Json(value)));
        self
    }

    pub fn status(mut self, prefix: &str, status: u16) -> Self {
        self.routes.push((prefix.to_owned(), MockResponse::Status(status)));
        self
    }

    /// Every fetch waits for a permit of `gate` before answering.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested(&self, prefix: &str) -> bool {
        self.requests().iter().any(|url| url.starts_with(prefix))
    }
}

impl DataFetcher for MockFetcher {
    fn fetch_json<'a>(&'a self, url: &'a str) -> Pin<Box<dyn Future<Output = Result<Value>> + Send + 'a>> {
        Box::pin(async move {
            self.requests.lock().unwrap().push(url.to_owned());

            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }

            let route = self.routes.iter().find(|(prefix, _)| url.starts_with(prefix.as_str()));
            match route.map(|(_, response)| response) {
                Some(MockResponse::Json(value)) => Ok(value.clone()),
                Some(MockResponse::Status(status)) => Err(TransitError::Upstream {
                    url: url.to_owned(),
                    status: *status,
                }),
                None => Err(TransitError::Upstream {
                    url: url.to_owned(),
                    status: 404,
                }),
            }
        })
    }
}
