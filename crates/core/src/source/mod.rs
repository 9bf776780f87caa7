//! Departure data from the `transport.rest` endpoints.
//!
//! Endpoints are tried strictly in order. Within one endpoint the stop is
//! resolved first, then departures are fetched for every resolved stop
//! jointly. The first endpoint that produces departures wins.

pub mod debounce;
pub mod http;
pub mod suggest;

#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::sync::Arc;

use api_types::{DeparturesResponse, Location, RawDeparture};
use futures_util::future::join_all;
use led_board_transit::{
    DataFetcher, EndpointIdentifier, ResolvedStop, Result, StopIdentifier, TransitError,
};
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::BoardConfig;

pub use debounce::Debouncer;
pub use http::HttpFetcher;
pub use suggest::{SuggestionOutcome, Suggestions};

const STOP_RESULTS: &str = "5";
const SUGGESTION_RESULTS: &str = "8";
/// Suggestions are only looked up from this many characters on.
pub const MIN_SUGGESTION_CHARS: usize = 2;

/// Departures of the endpoint attempt that succeeded.
#[derive(Clone, Debug)]
pub struct DepartureBatch {
    pub stop: ResolvedStop,
    pub endpoint: EndpointIdentifier,
    pub departures: Vec<RawDeparture>,
}

/// Runs `attempt` against each endpoint in order and returns the first
/// non-empty result.
///
/// Errors and empty attempts are logged and skipped; later endpoints are not
/// contacted once one succeeds.
pub async fn first_non_empty<'e, T, F, Fut>(endpoints: &'e [EndpointIdentifier], mut attempt: F) -> Result<T>
where
    F: FnMut(&'e EndpointIdentifier) -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for endpoint in endpoints {
        match attempt(endpoint).await {
            Ok(Some(found)) => return Ok(found),
            Ok(None) => warn!(%endpoint, "endpoint returned no departures"),
            Err(err) => warn!(%endpoint, %err, "endpoint attempt failed"),
        }
    }
    Err(TransitError::AllSourcesFailed {
        attempted: endpoints.len(),
    })
}

pub struct DepartureSource {
    fetcher: Arc<dyn DataFetcher>,
    endpoints: Vec<EndpointIdentifier>,
    look_ahead_minutes: i64,
}

impl std::fmt::Debug for DepartureSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepartureSource")
            .field("endpoints", &self.endpoints)
            .field("look_ahead_minutes", &self.look_ahead_minutes)
            .finish_non_exhaustive()
    }
}

impl DepartureSource {
    pub fn new(fetcher: Arc<dyn DataFetcher>, endpoints: Vec<EndpointIdentifier>, look_ahead_minutes: i64) -> Self {
        Self {
            fetcher,
            endpoints,
            look_ahead_minutes,
        }
    }

    pub fn from_config(config: &BoardConfig, fetcher: Arc<dyn DataFetcher>) -> Self {
        Self::new(fetcher, config.endpoint_ids(), config.look_ahead_minutes)
    }

    pub fn endpoints(&self) -> &[EndpointIdentifier] {
        &self.endpoints
    }

    /// Most relevant stop for `name` on one endpoint.
    pub async fn resolve_stop(&self, name: &str, endpoint: &EndpointIdentifier) -> Result<Option<ResolvedStop>> {
        let query = name.trim();
        if query.is_empty() {
            return Err(TransitError::EmptyQuery);
        }

        let stops = self.search_locations(query, STOP_RESULTS, endpoint).await?;
        Ok(stops.into_iter().next())
    }

    pub async fn fetch_departures(
        &self,
        stop_id: &StopIdentifier,
        endpoint: &EndpointIdentifier,
    ) -> Result<Vec<RawDeparture>> {
        let mut url = endpoint_url(endpoint, &["stops", stop_id.as_str(), "departures"])?;
        url.query_pairs_mut()
            .append_pair("duration", &self.look_ahead_minutes.to_string())
            .append_pair("remarks", "false")
            .append_pair("subStops", "false")
            .append_pair("entrances", "false")
            .append_pair("pretty", "false");

        let value = self.fetcher.fetch_json(url.as_str()).await?;
        decode_departures(value)
    }

    /// Departures for `stop_name` from the first endpoint that has any.
    pub async fn load_departures(&self, stop_name: &str) -> Result<DepartureBatch> {
        if stop_name.trim().is_empty() {
            return Err(TransitError::EmptyQuery);
        }

        let batch = first_non_empty(&self.endpoints, |endpoint| self.attempt(stop_name, endpoint)).await?;
        info!(
            stop = %batch.stop.name,
            endpoint = %batch.endpoint,
            count = batch.departures.len(),
            "loaded departures"
        );
        Ok(batch)
    }

    async fn attempt(&self, stop_name: &str, endpoint: &EndpointIdentifier) -> Result<Option<DepartureBatch>> {
        let stops: Vec<ResolvedStop> = self.resolve_stop(stop_name, endpoint).await?.into_iter().collect();

        let fetches = stops.iter().map(|stop| self.fetch_departures(&stop.id, endpoint));
        let mut departures = Vec::new();
        for (stop, result) in stops.iter().zip(join_all(fetches).await) {
            match result {
                Ok(found) => departures.extend(found),
                Err(err) => warn!(%endpoint, stop = %stop.id, %err, "departure fetch failed"),
            }
        }

        let Some(stop) = stops.into_iter().next() else {
            return Ok(None);
        };
        if departures.is_empty() {
            return Ok(None);
        }
        Ok(Some(DepartureBatch {
            stop,
            endpoint: endpoint.clone(),
            departures,
        }))
    }

    /// Stop names matching a partial query, for autocomplete.
    ///
    /// Only asks the first endpoint. Failures yield an empty list.
    pub async fn search_suggestions(&self, query: &str) -> Vec<ResolvedStop> {
        let query = query.trim();
        if query.chars().count() < MIN_SUGGESTION_CHARS {
            return Vec::new();
        }
        let Some(endpoint) = self.endpoints.first() else {
            return Vec::new();
        };

        match self.search_locations(query, SUGGESTION_RESULTS, endpoint).await {
            Ok(stops) => stops,
            Err(err) => {
                warn!(%endpoint, %err, "suggestion lookup failed");
                Vec::new()
            }
        }
    }

    async fn search_locations(
        &self,
        query: &str,
        results: &str,
        endpoint: &EndpointIdentifier,
    ) -> Result<Vec<ResolvedStop>> {
        let mut url = endpoint_url(endpoint, &["locations"])?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("results", results)
            .append_pair("stops", "true")
            .append_pair("addresses", "false")
            .append_pair("poi", "false")
            .append_pair("fuzzy", "true")
            .append_pair("pretty", "false");

        let value = self.fetcher.fetch_json(url.as_str()).await?;
        Ok(decode_locations(value)
            .into_iter()
            .filter(Location::is_stop)
            .filter_map(|location| {
                let id = location.id?;
                Some(ResolvedStop::new(id, location.name.unwrap_or_else(|| query.to_owned())))
            })
            .collect())
    }
}

fn endpoint_url(endpoint: &EndpointIdentifier, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(endpoint.base_url())
        .map_err(|err| TransitError::Transport(format!("invalid endpoint {endpoint}: {err}")))?;
    url.path_segments_mut()
        .map_err(|()| TransitError::Transport(format!("endpoint {endpoint} cannot have a path")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

fn decode_locations(value: Value) -> Vec<Location> {
    let Value::Array(entries) = value else {
        debug!("location search did not return a list");
        return Vec::new();
    };
    entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect()
}

/// Decodes each record separately; entries that are not records are skipped.
fn decode_departures(value: Value) -> Result<Vec<RawDeparture>> {
    let response: DeparturesResponse<Value> =
        serde_json::from_value(value).map_err(|err| TransitError::Decode(err.to_string()))?;

    Ok(response
        .into_departures()
        .into_iter()
        .filter_map(|record| match serde_json::from_value::<RawDeparture>(record) {
            Ok(departure) => Some(departure),
            Err(err) => {
                debug!(%err, "skipping malformed departure record");
                None
            }
        })
        .collect())
}
