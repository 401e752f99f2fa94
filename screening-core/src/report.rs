//! Screening result report
//!
//! JSON rendition of a run: which roster entries matched, against which
//! names, and under which list version.

use crate::ingest::ListMetadata;
use crate::pipeline::RunSummary;
use crate::types::{RosterEntry, RunState};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// One matched roster entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub position: usize,
    pub name: String,
    pub identifier: String,
    pub address: String,
    pub matching_names: Vec<String>,
    pub entity_ids: Vec<String>,
    pub best_score: f64,
}

/// Report of one screening run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub report_id: Uuid,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// `fileGenerationDate` of the screened list, as published
    pub list_generation_date: Option<String>,
    pub list_date: Option<NaiveDate>,
    pub state: RunState,
    pub total_entries: usize,
    pub screened_entries: usize,
    pub total_matched: usize,
    pub matches: Vec<ReportEntry>,
}

impl ScreeningReport {
    /// Collect the matched entries of `summary` from the screened `roster`
    pub fn build(roster: &[RosterEntry], summary: &RunSummary, metadata: &ListMetadata) -> Self {
        let matches = summary
            .outcomes
            .iter()
            .filter(|outcome| outcome.matched)
            .filter_map(|outcome| match roster.get(outcome.position) {
                Some(entry) => Some(ReportEntry {
                    position: outcome.position,
                    name: entry.display_name(),
                    identifier: entry.identifier.clone(),
                    address: entry.address.clone(),
                    matching_names: outcome.matching_names.clone(),
                    entity_ids: outcome.entity_ids.clone(),
                    best_score: outcome.best_score,
                }),
                None => {
                    warn!("Outcome for position {} has no roster entry", outcome.position);
                    None
                }
            })
            .collect::<Vec<_>>();

        Self {
            report_id: Uuid::new_v4(),
            run_id: summary.run_id,
            generated_at: Utc::now(),
            list_generation_date: metadata.file_generation_date.clone(),
            list_date: metadata.generation_date(),
            state: summary.state,
            total_entries: summary.total,
            screened_entries: summary.processed,
            total_matched: matches.len(),
            matches,
        }
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write as pretty JSON, creating parent directories. Returns bytes written.
    pub fn write_json(&self, path: impl AsRef<Path>) -> crate::Result<u64> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = self.to_json()?;
        std::fs::write(path, json.as_bytes())?;

        info!(
            "Screening report {} written to {} ({} matches)",
            self.report_id,
            path.display(),
            self.total_matched
        );
        Ok(json.len() as u64)
    }
}
