//! Reference list ingestion
//!
//! Turns the published semicolon-delimited list into an immutable
//! [`ReferenceIndex`]: natural persons only, whole names restricted to Latin
//! script, exact duplicates removed.

use crate::config::{delimiter_byte, IngestConfig};
use crate::error::IngestError;
use crate::matcher::PreparedAlias;
use crate::types::ReferenceAlias;
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

pub const COL_SUBJECT_TYPE: &str = "Entity_SubjectType";
pub const COL_ENTITY_ID: &str = "Entity_LogicalId";
pub const COL_LAST_NAME: &str = "NameAlias_LastName";
pub const COL_FIRST_NAME: &str = "NameAlias_FirstName";
pub const COL_MIDDLE_NAME: &str = "NameAlias_MiddleName";
pub const COL_WHOLE_NAME: &str = "NameAlias_WholeName";
pub const COL_GENERATION_DATE: &str = "fileGenerationDate";

const MANDATORY_COLUMNS: [&str; 3] = [COL_SUBJECT_TYPE, COL_ENTITY_ID, COL_WHOLE_NAME];

static LATIN_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[A-Za-z0-9\s.,'\-"()&;:!?čćšž]*$"#).expect("latin name pattern is valid")
});

/// Whole names outside Latin script (plus lower-case č ć š ž) are not screenable.
pub fn is_latin(text: &str) -> bool {
    LATIN_NAME.is_match(text)
}

/// The list as read from disk: headers plus untyped rows
#[derive(Debug, Clone, Default)]
pub struct RawReferenceList {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawReferenceList {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            headers: headers.iter().map(|h| normalize_header(h)).collect(),
            rows,
        }
    }

    /// Read a delimited list. Short rows are accepted; missing cells read as empty.
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self, IngestError> {
        let mut csv = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = csv.headers()?.iter().map(normalize_header).collect();
        let mut rows = Vec::new();
        for record in csv.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, rows })
    }

    pub fn from_path(path: impl AsRef<Path>, delimiter: u8) -> Result<Self, IngestError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file), delimiter)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

/// Facts about the published list itself
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadata {
    /// `fileGenerationDate` as published
    pub file_generation_date: Option<String>,
}

impl ListMetadata {
    /// Publication date, if the published value is a recognizable date
    pub fn generation_date(&self) -> Option<NaiveDate> {
        let raw = self.file_generation_date.as_deref()?.trim();
        let day = raw.split(['T', ' ']).next().unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(day, "%d/%m/%Y"))
            .ok()
    }
}

/// Row accounting for one index build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    pub rows_read: usize,
    pub person_rows: usize,
    pub rejected_script: usize,
    pub missing_entity: usize,
    pub duplicates: usize,
    pub aliases: usize,
    pub entities: usize,
}

#[derive(Debug, Clone)]
pub(crate) struct IndexedAlias {
    pub(crate) alias: ReferenceAlias,
    pub(crate) prepared: PreparedAlias,
}

/// Immutable, entity-grouped set of screenable aliases.
///
/// Shared read-only between concurrent readers once built.
#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    aliases: Vec<IndexedAlias>,
    by_entity: HashMap<String, Vec<usize>>,
    metadata: ListMetadata,
    stats: IngestStats,
}

impl ReferenceIndex {
    /// Index already-validated aliases, keeping their order.
    pub fn from_aliases(aliases: Vec<ReferenceAlias>, metadata: ListMetadata) -> Self {
        let mut by_entity: HashMap<String, Vec<usize>> = HashMap::new();
        let aliases: Vec<IndexedAlias> = aliases
            .into_iter()
            .enumerate()
            .map(|(position, alias)| {
                by_entity
                    .entry(alias.entity_id.clone())
                    .or_default()
                    .push(position);
                IndexedAlias {
                    prepared: PreparedAlias::new(&alias),
                    alias,
                }
            })
            .collect();

        let stats = IngestStats {
            aliases: aliases.len(),
            entities: by_entity.len(),
            ..IngestStats::default()
        };

        Self {
            aliases,
            by_entity,
            metadata,
            stats,
        }
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }

    pub fn aliases(&self) -> impl Iterator<Item = &ReferenceAlias> {
        self.aliases.iter().map(|indexed| &indexed.alias)
    }

    /// Every alias of one entity, in index order
    pub fn entity_aliases<'a>(&'a self, entity_id: &str) -> impl Iterator<Item = &'a ReferenceAlias> + 'a {
        self.by_entity
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .map(move |&position| &self.aliases[position].alias)
    }

    pub fn metadata(&self) -> &ListMetadata {
        &self.metadata
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    pub(crate) fn indexed(&self) -> &[IndexedAlias] {
        &self.aliases
    }
}

/// Builds a [`ReferenceIndex`] from a raw list
#[derive(Debug, Clone, Default)]
pub struct ReferenceListIngestor {
    config: IngestConfig,
}

impl ReferenceListIngestor {
    pub fn new(config: IngestConfig) -> Self {
        Self { config }
    }

    /// Read and index a list file in one go
    pub fn load(&self, path: impl AsRef<Path>) -> Result<ReferenceIndex, IngestError> {
        let path = path.as_ref();
        info!("Reading sanctions list from {}", path.display());
        let delimiter = delimiter_byte(self.config.delimiter)
            .ok_or(IngestError::InvalidDelimiter(self.config.delimiter))?;
        let raw = RawReferenceList::from_path(path, delimiter)?;
        self.build_index(&raw)
    }

    /// Filter, validate and deduplicate the raw rows into an index.
    pub fn build_index(&self, raw: &RawReferenceList) -> Result<ReferenceIndex, IngestError> {
        for column in MANDATORY_COLUMNS {
            if raw.column(column).is_none() {
                return Err(IngestError::MissingColumn(column.to_string()));
            }
        }

        let subject_col = raw.column(COL_SUBJECT_TYPE);
        let entity_col = raw.column(COL_ENTITY_ID);
        let whole_col = raw.column(COL_WHOLE_NAME);
        let last_col = raw.column(COL_LAST_NAME);
        let first_col = raw.column(COL_FIRST_NAME);
        let middle_col = raw.column(COL_MIDDLE_NAME);
        let date_col = raw.column(COL_GENERATION_DATE);

        let mut stats = IngestStats {
            rows_read: raw.len(),
            ..IngestStats::default()
        };
        let mut metadata = ListMetadata::default();
        let mut seen = HashSet::new();
        let mut aliases = Vec::new();

        for row in &raw.rows {
            if metadata.file_generation_date.is_none() {
                metadata.file_generation_date = cell(row, date_col);
            }

            if cell(row, subject_col).as_deref() != Some(self.config.person_subject_type.as_str()) {
                continue;
            }
            stats.person_rows += 1;

            let Some(whole_name) = cell(row, whole_col).filter(|name| is_latin(name)) else {
                stats.rejected_script += 1;
                continue;
            };

            let Some(entity_id) = cell(row, entity_col) else {
                stats.missing_entity += 1;
                continue;
            };

            let alias = ReferenceAlias {
                entity_id,
                last_name: cell(row, last_col),
                first_name: cell(row, first_col),
                middle_name: cell(row, middle_col),
                whole_name,
            };

            if seen.insert(alias.clone()) {
                aliases.push(alias);
            } else {
                stats.duplicates += 1;
            }
        }

        debug!(
            "Sanctions list filtering: {} rows, {} persons, {} rejected by script, {} without entity, {} duplicates",
            stats.rows_read, stats.person_rows, stats.rejected_script, stats.missing_entity, stats.duplicates
        );

        if aliases.is_empty() {
            return Err(IngestError::EmptyIndex);
        }

        let mut index = ReferenceIndex::from_aliases(aliases, metadata);
        stats.aliases = index.stats.aliases;
        stats.entities = index.stats.entities;
        index.stats = stats;

        info!(
            "Built reference index with {} aliases for {} entities (list date: {})",
            stats.aliases,
            stats.entities,
            index.metadata.file_generation_date.as_deref().unwrap_or("unknown")
        );

        Ok(index)
    }
}

/// Index a raw list with the default ingestion settings
pub fn build_index(raw: &RawReferenceList) -> Result<ReferenceIndex, IngestError> {
    ReferenceListIngestor::default().build_index(raw)
}

// Trimmed cell value; blank and out-of-range cells are absent.
fn cell(row: &[String], column: Option<usize>) -> Option<String> {
    let value = row.get(column?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
