//! Time and validity filtering of normalized departures.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::models::departure::NormalizedDeparture;

/// Remark fragments (matched case-insensitively) that mean the trip does not run.
pub const CANCELLATION_PHRASES: &[&str] = &[
    "cancelled",
    "cancellation",
    "ausfall",
    "entfällt",
    "not operating",
    "nicht in betrieb",
    "service suspended",
];

/// Why a departure was dropped from the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    MissingTime,
    Cancelled,
    BeyondLookAhead,
    AlreadyDeparted,
    StaleRealtime,
    CancellationRemark,
}

/// Thresholds for deciding which departures are worth showing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Forward horizon; later departures are dropped.
    pub look_ahead: TimeDelta,
    /// How far in the past a departure may be and still be shown,
    /// absorbing reporting lag.
    pub past_tolerance: TimeDelta,
    /// Realtime data older than this is only trusted for small deviations.
    pub stale_realtime_after: TimeDelta,
    /// Largest realtime/planned deviation accepted from stale realtime data.
    pub max_stale_deviation: TimeDelta,
    pub max_rows: usize,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            look_ahead: TimeDelta::minutes(60),
            past_tolerance: TimeDelta::minutes(5),
            stale_realtime_after: TimeDelta::minutes(10),
            max_stale_deviation: TimeDelta::minutes(15),
            max_rows: 5,
        }
    }
}

impl FilterPolicy {
    /// First rule the departure violates, checked in board order.
    pub fn rejection(&self, dep: &NormalizedDeparture, now: DateTime<Utc>) -> Option<Rejection> {
        let Some(when) = dep.when else {
            return Some(Rejection::MissingTime);
        };
        if dep.cancelled {
            return Some(Rejection::Cancelled);
        }
        // Windows reaching past the representable range are unbounded.
        if now.checked_add_signed(self.look_ahead).is_some_and(|horizon| when > horizon) {
            return Some(Rejection::BeyondLookAhead);
        }
        if now.checked_sub_signed(self.past_tolerance).is_some_and(|earliest| when < earliest) {
            return Some(Rejection::AlreadyDeparted);
        }

        if let Some(updated_at) = dep.realtime_updated_at {
            if now.signed_duration_since(updated_at) > self.stale_realtime_after {
                let planned = dep.planned_when.unwrap_or(when);
                if (when - planned).abs() > self.max_stale_deviation {
                    return Some(Rejection::StaleRealtime);
                }
            }
        }

        if dep.remarks.iter().any(|remark| is_cancellation_remark(remark)) {
            return Some(Rejection::CancellationRemark);
        }

        None
    }

    /// Drop invalid departures, sort by departure time and keep the first
    /// `max_rows`.
    pub fn apply(
        &self,
        departures: impl IntoIterator<Item = NormalizedDeparture>,
        now: DateTime<Utc>,
    ) -> Vec<NormalizedDeparture> {
        let mut kept: Vec<NormalizedDeparture> = departures
            .into_iter()
            .filter(|dep| match self.rejection(dep, now) {
                Some(reason) => {
                    debug!(line = %dep.line, direction = %dep.direction, ?reason, "dropping departure");
                    false
                }
                None => true,
            })
            .collect();

        kept.sort_by_key(|dep| dep.when);
        kept.truncate(self.max_rows);
        kept
    }
}

pub fn is_cancellation_remark(remark: &str) -> bool {
    let lowered = remark.to_lowercase();
    CANCELLATION_PHRASES.iter().any(|phrase| lowered.contains(phrase))
}

/// Whole minutes until `when`, rounded, never negative.
pub fn minutes_until(when: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let minutes = ((when - now).num_milliseconds() as f64 / 60_000.0).round();
    minutes.clamp(0.0, u32::MAX as f64) as u32
}
