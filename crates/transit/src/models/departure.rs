//! Normalization of heterogeneous upstream departure records.
//!
//! Upstream records are untrusted: any field may be missing, timestamps may
//! be malformed and destinations come under several names. Normalization
//! never fails. Malformed parts are logged and replaced by placeholders.

use api_types::{RawDeparture, RawLine, RawRemark, RawTimestamp};
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::types::{Result, TransitError};

/// Shown in the destination column when upstream names no destination.
pub const DIRECTION_PLACEHOLDER: &str = "—";

/// Epoch values above this are milliseconds, below it seconds.
const EPOCH_MILLIS_THRESHOLD: u64 = 1_000_000_000_000;

/// A departure in canonical form.
///
/// `direction` is never empty. `when` is only absent when upstream provided
/// neither a realtime nor a planned time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NormalizedDeparture {
    pub when: Option<DateTime<Utc>>,
    pub planned_when: Option<DateTime<Utc>>,
    pub line: String,
    pub direction: String,
    pub cancelled: bool,
    /// Seconds
    pub delay: i64,
    pub remarks: Vec<String>,
    pub realtime_updated_at: Option<DateTime<Utc>>,
}

impl NormalizedDeparture {
    pub fn from_raw(raw: &RawDeparture) -> Self {
        let planned_when = parse_optional("plannedWhen", raw.planned_when.as_deref());
        let when = parse_optional("when", raw.when.as_deref()).or(planned_when);

        let line = raw
            .line
            .as_ref()
            .and_then(|line| non_blank(line.name.as_deref()).or(non_blank(line.id.as_deref())))
            .unwrap_or_default()
            .to_owned();

        let direction = non_blank(raw.direction.as_deref())
            .or_else(|| non_blank(raw.destination.as_ref().and_then(|d| d.name.as_deref())))
            .or_else(|| non_blank(raw.direction_id.as_deref()))
            .unwrap_or(DIRECTION_PLACEHOLDER)
            .to_owned();

        let remarks = raw
            .remarks
            .iter()
            .flatten()
            .filter_map(RawRemark::text)
            .map(str::to_owned)
            .collect();

        let realtime_updated_at = raw.realtime_data_updated_at.as_ref().and_then(|stamp| {
            parse_realtime_stamp(stamp)
                .map_err(|err| debug!("ignoring realtime stamp: {err}"))
                .ok()
        });

        Self {
            when,
            planned_when,
            line,
            direction,
            cancelled: raw.cancelled.unwrap_or(false),
            delay: raw.delay.unwrap_or(0),
            remarks,
            realtime_updated_at,
        }
    }

    /// Canonical raw form. Normalizing it yields `self` again.
    pub fn to_raw(&self) -> RawDeparture {
        RawDeparture {
            when: self.when.map(|t| t.to_rfc3339()),
            planned_when: self.planned_when.map(|t| t.to_rfc3339()),
            line: (!self.line.is_empty()).then(|| RawLine {
                id: None,
                name: Some(self.line.clone()),
            }),
            direction: Some(self.direction.clone()),
            destination: None,
            direction_id: None,
            cancelled: Some(self.cancelled),
            delay: Some(self.delay),
            remarks: (!self.remarks.is_empty())
                .then(|| self.remarks.iter().cloned().map(RawRemark::Text).collect()),
            realtime_data_updated_at: self
                .realtime_updated_at
                .map(|t| RawTimestamp::Text(t.to_rfc3339())),
        }
    }
}

impl From<&RawDeparture> for NormalizedDeparture {
    fn from(raw: &RawDeparture) -> Self {
        Self::from_raw(raw)
    }
}

pub fn normalize(raw: &RawDeparture) -> NormalizedDeparture {
    NormalizedDeparture::from_raw(raw)
}

/// Parse an RFC 3339 timestamp as sent by upstream (`2024-05-01T12:04:00+02:00`).
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| TransitError::MalformedRecord(format!("timestamp {text:?}: {err}")))
}

fn parse_realtime_stamp(stamp: &RawTimestamp) -> Result<DateTime<Utc>> {
    match stamp {
        RawTimestamp::Text(text) => parse_timestamp(text),
        RawTimestamp::Epoch(value) => {
            let parsed = if value.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD {
                DateTime::from_timestamp_millis(*value)
            } else {
                DateTime::from_timestamp(*value, 0)
            };
            parsed.ok_or_else(|| TransitError::MalformedRecord(format!("epoch {value} out of range")))
        }
    }
}

fn parse_optional(field: &str, text: Option<&str>) -> Option<DateTime<Utc>> {
    let text = non_blank(text)?;
    parse_timestamp(text)
        .map_err(|err| debug!(field, "ignoring departure time: {err}"))
        .ok()
}

/// Whitespace-only strings count as missing.
fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|t| !t.trim().is_empty())
}
