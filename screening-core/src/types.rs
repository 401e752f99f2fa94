use serde::{Deserialize, Serialize};

/// One name variant of a sanctioned entity, as published on the list.
///
/// Structured name fields are frequently missing; `whole_name` is always
/// present once a row has passed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceAlias {
    pub entity_id: String,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub whole_name: String,
}

impl ReferenceAlias {
    /// Alias carrying only a whole name
    pub fn whole(entity_id: impl Into<String>, whole_name: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            last_name: None,
            first_name: None,
            middle_name: None,
            whole_name: whole_name.into(),
        }
    }

    pub fn with_last_name(mut self, last_name: impl Into<String>) -> Self {
        self.last_name = Some(last_name.into());
        self
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    pub fn with_middle_name(mut self, middle_name: impl Into<String>) -> Self {
        self.middle_name = Some(middle_name.into());
        self
    }
}

/// A person from the imported roster.
///
/// `match_count` and `matching_names` start empty and only change through
/// [`RosterEntry::apply_outcome`], which the owner of the roster calls with
/// the outcomes streamed by a screening run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub given_name: String,
    pub surname: String,
    pub identifier: String,
    pub address: String,
    pub match_count: u32,
    pub matching_names: Vec<String>,
}

impl RosterEntry {
    pub fn new(
        given_name: impl Into<String>,
        surname: impl Into<String>,
        identifier: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            given_name: given_name.into(),
            surname: surname.into(),
            identifier: identifier.into(),
            address: address.into(),
            match_count: 0,
            matching_names: Vec::new(),
        }
    }

    /// Name as written in the roster: surname(s) first, given name last
    pub fn display_name(&self) -> String {
        format!("{} {}", self.surname, self.given_name)
            .trim()
            .to_string()
    }

    /// Merge a screening outcome produced for this entry.
    pub fn apply_outcome(&mut self, outcome: &ScreeningOutcome) {
        if outcome.matched {
            self.match_count += 1;
            self.matching_names = outcome.matching_names.clone();
        }
    }
}

/// Score of one (roster entry, alias) pair. Never retained past a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchDecision {
    pub surname_score: f64,
    pub name_score: f64,
    pub is_match: bool,
    /// Weighted score, used for ranking only
    pub combined: f64,
}

impl MatchDecision {
    pub const NO_MATCH: MatchDecision = MatchDecision {
        surname_score: 0.0,
        name_score: 0.0,
        is_match: false,
        combined: 0.0,
    };
}

/// Result of screening one roster entry against the whole index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningOutcome {
    /// Position of the entry in the screened roster
    pub position: usize,
    pub matched: bool,
    /// Whole names of every alias of every implicated entity, in index order
    pub matching_names: Vec<String>,
    pub entity_ids: Vec<String>,
    /// Highest combined score among matching aliases
    pub best_score: f64,
}

impl ScreeningOutcome {
    pub fn clear(position: usize) -> Self {
        Self {
            position,
            matched: false,
            matching_names: Vec::new(),
            entity_ids: Vec::new(),
            best_score: 0.0,
        }
    }
}

/// Lifecycle of a screening run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled)
    }
}
