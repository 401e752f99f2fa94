//! Configuration for the screening core
//!
//! Thresholds, list endpoint and file layouts are passed to the components at
//! construction instead of living in module constants, so tests can run the
//! same code with different tuning.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// EU consolidated financial sanctions list, CSV flavour 1.1
pub const DEFAULT_LIST_URL: &str = "https://webgate.ec.europa.eu/fsd/fsf/public/files/csvFullSanctionsList_1_1/content?token=dG9rZW4tMjAxNw";

/// Screening configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name matcher tuning
    pub matcher: MatcherConfig,

    /// Reference list parsing
    pub ingest: IngestConfig,

    /// List download
    pub retrieval: RetrievalConfig,

    /// Roster file layout
    pub roster: RosterConfig,

    /// Result report
    pub report: ReportConfig,
}

/// Name matcher thresholds and weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Minimum token-set ratio for a surname to count
    pub surname_threshold: f64,

    /// Minimum token-set ratio for given names on the fuzzy path
    pub name_threshold: f64,

    /// Minimum character similarity for a whole-name token to count
    pub token_similarity: f64,

    /// Shortest token allowed to take part in prefix and whole-name matching
    pub min_token_length: usize,

    /// Weight of the surname score in the combined ranking score
    pub surname_weight: f64,

    /// Weight of the given-name score in the combined ranking score
    pub name_weight: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            surname_threshold: 0.80,
            name_threshold: 0.70,
            token_similarity: 0.85,
            min_token_length: 3,
            surname_weight: 0.6,
            name_weight: 0.4,
        }
    }
}

/// Reference list parsing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Field delimiter of the published list
    pub delimiter: char,

    /// `Entity_SubjectType` value marking natural persons
    pub person_subject_type: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            delimiter: ';',
            person_subject_type: "P".to_string(),
        }
    }
}

/// List download
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Versioned endpoint serving the full list
    pub url: String,

    /// Request timeout (seconds)
    pub timeout_seconds: u64,

    /// Where downloaded lists are kept; system temp dir when unset
    pub download_dir: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LIST_URL.to_string(),
            timeout_seconds: 120,
            download_dir: None,
        }
    }
}

/// Roster file layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Field delimiter of CSV rosters
    pub delimiter: char,

    /// Column holding "surname(s) given-name"
    pub name_column: String,

    /// Column holding the personal identifier
    pub identifier_column: String,

    /// Column holding the address
    pub address_column: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            name_column: "IME".to_string(),
            identifier_column: "OIB".to_string(),
            address_column: "ADRESA".to_string(),
        }
    }
}

/// Result report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// JSON report destination; no report is written when unset
    pub output_path: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file. Sections and keys left out keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> crate::Result<Self> {
        Config::default().with_env_overrides()
    }

    /// Apply `SCREENING_*` environment overrides on top of `self`
    pub fn with_env_overrides(mut self) -> crate::Result<Self> {
        if let Ok(url) = std::env::var("SCREENING_LIST_URL") {
            self.retrieval.url = url;
        }

        if let Ok(value) = std::env::var("SCREENING_SURNAME_THRESHOLD") {
            self.matcher.surname_threshold = parse_env("SCREENING_SURNAME_THRESHOLD", &value)?;
        }

        if let Ok(value) = std::env::var("SCREENING_NAME_THRESHOLD") {
            self.matcher.name_threshold = parse_env("SCREENING_NAME_THRESHOLD", &value)?;
        }

        if let Ok(value) = std::env::var("SCREENING_HTTP_TIMEOUT_SECS") {
            self.retrieval.timeout_seconds = parse_env("SCREENING_HTTP_TIMEOUT_SECS", &value)?;
        }

        if let Ok(path) = std::env::var("SCREENING_REPORT_PATH") {
            self.report.output_path = Some(PathBuf::from(path));
        }

        self.validate()?;
        Ok(self)
    }

    /// Reject settings the matcher or parsers cannot work with
    pub fn validate(&self) -> crate::Result<()> {
        let m = &self.matcher;
        for (name, value) in [
            ("surname_threshold", m.surname_threshold),
            ("name_threshold", m.name_threshold),
            ("token_similarity", m.token_similarity),
            ("surname_weight", m.surname_weight),
            ("name_weight", m.name_weight),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(crate::Error::Config(format!(
                    "matcher.{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        if ((m.surname_weight + m.name_weight) - 1.0).abs() > 1e-9 {
            return Err(crate::Error::Config(format!(
                "matcher weights must sum to 1, got {} + {}",
                m.surname_weight, m.name_weight
            )));
        }

        for (name, delimiter) in [
            ("ingest.delimiter", self.ingest.delimiter),
            ("roster.delimiter", self.roster.delimiter),
        ] {
            if delimiter_byte(delimiter).is_none() {
                return Err(crate::Error::Config(format!(
                    "{} must be a single ASCII character, got {:?}",
                    name, delimiter
                )));
            }
        }

        if self.retrieval.url.trim().is_empty() {
            return Err(crate::Error::Config("retrieval.url is empty".to_string()));
        }

        Ok(())
    }
}

/// Single-byte form of a field delimiter; `None` unless the character is ASCII
pub fn delimiter_byte(delimiter: char) -> Option<u8> {
    u8::try_from(delimiter).ok().filter(u8::is_ascii)
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> crate::Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| crate::Error::Config(format!("Invalid {}={:?}: {}", key, value, e)))
}
