//! Sanctions Screening Core
//!
//! Screens a roster of natural persons against the EU consolidated financial
//! sanctions list.
//!
//! # Architecture
//!
//! - **Retrieval**: one GET of the published CSV, stored as a local file
//! - **Ingestion**: natural-person, Latin-script aliases into an immutable index
//! - **Matching**: prefix fast path, token-set ratio fallback, whole-name fallback
//! - **Pipeline**: sequential roster walk on the blocking pool, events over a channel
//!
//! # Invariants
//!
//! - The reference index never changes once built
//! - A match needs a positive surname score and a positive given-name score
//! - `on_complete` is the last event of every run

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod ingest;
pub mod matcher;
pub mod normalize;
pub mod pipeline;
pub mod report;
pub mod retrieval;
pub mod roster;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, IngestError, Result, RetrievalError, RosterError};
pub use ingest::{ListMetadata, RawReferenceList, ReferenceIndex, ReferenceListIngestor};
pub use matcher::NameMatcher;
pub use normalize::normalize;
pub use pipeline::{
    spawn_screening, FnObserver, RunSummary, ScreeningEvent, ScreeningHandle, ScreeningObserver,
    ScreeningPipeline,
};
pub use report::ScreeningReport;
pub use retrieval::{spawn_download, DownloadedList, HttpListSource, ListSource, LocalListSource};
pub use roster::{spawn_import, RosterImport, RosterImporter};
pub use types::{MatchDecision, ReferenceAlias, RosterEntry, RunState, ScreeningOutcome};
