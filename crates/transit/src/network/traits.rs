//! Pluggable networking traits.
//!
//! External crates implement these to provide data fetching capabilities.

use std::future::Future;
use std::pin::Pin;

use crate::models::types::Result;

/// Fetch and decode a JSON document from a URL.
///
/// Implementations map non-success HTTP statuses to
/// [`TransitError::Upstream`](crate::models::types::TransitError::Upstream).
pub trait DataFetcher: Send + Sync {
    fn fetch_json<'a>(
        &'a self,
        url: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<serde_json::Value>> + Send + 'a>>;
}
