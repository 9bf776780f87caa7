use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BoardPhase {
    #[default]
    Idle,
    Loading,
    Error,
}

/// Refresh lifecycle of a board: `Idle -> Loading -> {Idle, Error}`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BoardState {
    pub phase: BoardPhase,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

impl BoardState {
    pub fn is_loading(&self) -> bool {
        self.phase == BoardPhase::Loading
    }

    pub fn has_error(&self) -> bool {
        self.phase == BoardPhase::Error
    }

    pub(crate) fn begin_loading(&mut self) {
        self.phase = BoardPhase::Loading;
    }

    pub(crate) fn succeed(&mut self, now: DateTime<Utc>) {
        self.phase = BoardPhase::Idle;
        self.last_refresh_at = Some(now);
    }

    /// The last successful refresh time is kept.
    pub(crate) fn fail(&mut self) {
        self.phase = BoardPhase::Error;
    }
}
