use std::sync::Arc;
use std::time::Duration;

use led_board_transit::ResolvedStop;
use serde::Serialize;

use crate::config::BoardConfig;
use crate::source::{Debouncer, DepartureSource};

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SuggestionOutcome {
    /// A newer query replaced this one; `suggestions` is empty.
    pub superseded: bool,
    pub suggestions: Vec<ResolvedStop>,
}

/// Debounced stop-name autocomplete.
#[derive(Debug)]
pub struct Suggestions {
    source: Arc<DepartureSource>,
    debouncer: Debouncer,
}

impl Suggestions {
    pub fn new(source: Arc<DepartureSource>, delay: Duration) -> Self {
        Self {
            source,
            debouncer: Debouncer::new(delay),
        }
    }

    pub fn from_config(config: &BoardConfig, source: Arc<DepartureSource>) -> Self {
        Self::new(source, config.suggestion_debounce())
    }

    pub async fn suggest(&self, query: &str) -> SuggestionOutcome {
        match self.debouncer.run(|| self.source.search_suggestions(query)).await {
            Some(suggestions) => SuggestionOutcome {
                superseded: false,
                suggestions,
            },
            None => SuggestionOutcome {
                superseded: true,
                suggestions: Vec::new(),
            },
        }
    }
}
