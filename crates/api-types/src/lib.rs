//! Wire types for the `transport.rest` family of public transit APIs.
//!
//! Upstream records are partial and come in several shapes depending on the
//! backing network, so every field here is optional and unknown fields are
//! ignored. A field of the wrong JSON type decodes as absent instead of
//! failing its record. Interpretation happens in `led-board-transit`.

use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};

/// `Option<T>` that maps a value of the wrong shape to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient<T> {
        Value(T),
        Mismatched(IgnoredAny),
    }

    Ok(match Option::<Lenient<T>>::deserialize(deserializer)? {
        Some(Lenient::Value(value)) => Some(value),
        Some(Lenient::Mismatched(_)) | None => None,
    })
}

/// Delay in seconds. Fractional values are rounded.
fn lenient_seconds<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Whole(i64),
        Fractional(f64),
    }

    Ok(lenient::<D, Seconds>(deserializer)?.and_then(|seconds| match seconds {
        Seconds::Whole(value) => Some(value),
        Seconds::Fractional(value) if value.is_finite() => Some(value.round() as i64),
        Seconds::Fractional(_) => None,
    }))
}

/// One entry of a `/locations` search.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

impl Location {
    pub fn is_stop(&self) -> bool {
        self.kind == "stop"
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStopRef {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Remarks are either bare strings or hint/warning objects.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRemark {
    Text(String),
    Entry {
        #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl RawRemark {
    pub fn text(&self) -> Option<&str> {
        match self {
            RawRemark::Text(text) => Some(text),
            RawRemark::Entry { text } => text.as_deref(),
        }
    }
}

/// Realtime freshness marker. Some backends send unix epoch numbers,
/// others RFC 3339 strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Epoch(i64),
    Text(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeparture {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub planned_when: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub line: Option<RawLine>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub destination: Option<RawStopRef>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub direction_id: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<bool>,
    #[serde(default, deserialize_with = "lenient_seconds", skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub remarks: Option<Vec<RawRemark>>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub realtime_data_updated_at: Option<RawTimestamp>,
}

/// `/stops/{id}/departures` answers with either a bare array or a wrapper
/// object, depending on the API version. Decoding into
/// `DeparturesResponse<serde_json::Value>` keeps one malformed record from
/// failing the whole list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeparturesResponse<T = RawDeparture> {
    List(Vec<T>),
    Wrapped { departures: Vec<T> },
}

impl<T> DeparturesResponse<T> {
    pub fn into_departures(self) -> Vec<T> {
        match self {
            DeparturesResponse::List(departures) => departures,
            DeparturesResponse::Wrapped { departures } => departures,
        }
    }
}
