//! Name matching between a roster query and one reference alias.
//!
//! Scoring runs in stages, cheapest first:
//!
//! 1. surname token-set ratio against the alias last name
//! 2. given-name prefix fast path against the alias first name
//! 3. given-name token-set ratio against first + middle name
//! 4. whole-name token overlap, for aliases missing structured fields
//!
//! A pair matches only when both the surname and the given-name side score
//! above zero. The weighted `combined` score orders results; it never decides.

use crate::config::MatcherConfig;
use crate::normalize::{normalize, normalize_opt};
use crate::types::{MatchDecision, ReferenceAlias};
use rapidfuzz::distance::indel;
use std::collections::BTreeSet;

// Ratios are floating point; a ratio equal to its threshold must pass.
const THRESHOLD_TOLERANCE: f64 = 1e-9;

/// Roster side of a comparison, normalized once per entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQuery {
    given: String,
    surname: String,
    given_tokens: Vec<String>,
    all_tokens: BTreeSet<String>,
}

impl NameQuery {
    pub fn new(given_name: &str, surname: &str) -> Self {
        let given = normalize(given_name);
        let surname = normalize(surname);
        let given_tokens = given.split_whitespace().map(str::to_string).collect();
        let all_tokens = given
            .split_whitespace()
            .chain(surname.split_whitespace())
            .map(str::to_string)
            .collect();

        Self {
            given,
            surname,
            given_tokens,
            all_tokens,
        }
    }

    pub fn given(&self) -> &str {
        &self.given
    }

    pub fn surname(&self) -> &str {
        &self.surname
    }

    pub fn is_empty(&self) -> bool {
        self.given.is_empty() && self.surname.is_empty()
    }
}

/// Normalized view of a [`ReferenceAlias`], derived at index build time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAlias {
    last_name: Option<String>,
    first_name: Option<String>,
    /// First and middle name joined
    given_names: Option<String>,
    whole_tokens: Vec<String>,
}

impl PreparedAlias {
    pub fn new(alias: &ReferenceAlias) -> Self {
        let last_name = present(normalize_opt(alias.last_name.as_deref()));
        let first_name = present(normalize_opt(alias.first_name.as_deref()));
        let middle_name = present(normalize_opt(alias.middle_name.as_deref()));

        let given_names = match (&first_name, &middle_name) {
            (Some(first), Some(middle)) => Some(format!("{} {}", first, middle)),
            (Some(first), None) => Some(first.clone()),
            (None, Some(middle)) => Some(middle.clone()),
            (None, None) => None,
        };

        let whole_tokens = normalize(&alias.whole_name)
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Self {
            last_name,
            first_name,
            given_names,
            whole_tokens,
        }
    }

    fn lacks_structured_name(&self) -> bool {
        self.first_name.is_none() || self.last_name.is_none()
    }
}

fn present(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Multi-stage name matcher
#[derive(Debug, Clone, Default)]
pub struct NameMatcher {
    config: MatcherConfig,
}

impl NameMatcher {
    pub fn new(config: MatcherConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Score a raw query against a raw alias.
    ///
    /// Convenience over [`NameMatcher::score_prepared`]; the pipeline prepares
    /// both sides once instead.
    pub fn score(&self, query_given: &str, query_surname: &str, alias: &ReferenceAlias) -> MatchDecision {
        self.score_prepared(&NameQuery::new(query_given, query_surname), &PreparedAlias::new(alias))
    }

    pub fn score_prepared(&self, query: &NameQuery, alias: &PreparedAlias) -> MatchDecision {
        if query.is_empty() {
            return MatchDecision::NO_MATCH;
        }

        let mut surname_score = self.surname_score(query, alias);
        let mut name_score = self.name_score(query, alias);

        if alias.lacks_structured_name() && self.whole_name_overlaps(query, alias) {
            surname_score = 1.0;
            name_score = 1.0;
        }

        let is_match = surname_score > 0.0 && name_score > 0.0;
        let combined =
            self.config.surname_weight * surname_score + self.config.name_weight * name_score;

        MatchDecision {
            surname_score,
            name_score,
            is_match,
            combined,
        }
    }

    fn surname_score(&self, query: &NameQuery, alias: &PreparedAlias) -> f64 {
        let Some(last_name) = &alias.last_name else {
            return 0.0;
        };
        if query.surname.is_empty() {
            return 0.0;
        }

        let ratio = token_set_ratio(&query.surname, last_name);
        if passes(ratio, self.config.surname_threshold) {
            ratio
        } else {
            0.0
        }
    }

    fn name_score(&self, query: &NameQuery, alias: &PreparedAlias) -> f64 {
        if query.given_tokens.is_empty() {
            return 0.0;
        }

        if let Some(first_name) = &alias.first_name {
            let min_len = self.config.min_token_length;
            let prefix_hit = query.given_tokens.iter().any(|token| {
                is_prefix_match(token, first_name, min_len) || is_prefix_match(first_name, token, min_len)
            });
            if prefix_hit {
                return 1.0;
            }
        }

        let Some(given_names) = &alias.given_names else {
            return 0.0;
        };

        let ratio = token_set_ratio(&query.given, given_names);
        if passes(ratio, self.config.name_threshold) {
            ratio
        } else {
            0.0
        }
    }

    // Needs evidence from both sides of the query, otherwise an empty given
    // name could still match through two surname tokens.
    fn whole_name_overlaps(&self, query: &NameQuery, alias: &PreparedAlias) -> bool {
        if query.given.is_empty() || query.surname.is_empty() || alias.whole_tokens.is_empty() {
            return false;
        }

        let matched = query
            .all_tokens
            .iter()
            .filter(|token| token.chars().count() >= self.config.min_token_length)
            .filter(|token| {
                alias.whole_tokens.iter().any(|candidate| {
                    candidate == *token
                        || passes(char_ratio(token, candidate), self.config.token_similarity)
                })
            })
            .count();

        matched > 1
    }
}

/// `short` is a literal prefix of `long` and at least `min_len` characters
fn is_prefix_match(short: &str, long: &str, min_len: usize) -> bool {
    !short.is_empty() && short.chars().count() >= min_len && long.starts_with(short)
}

fn passes(score: f64, threshold: f64) -> bool {
    score + THRESHOLD_TOLERANCE >= threshold
}

/// Character-level similarity on the 0–1 scale (normalized Indel distance)
pub fn char_ratio(a: &str, b: &str) -> f64 {
    indel::normalized_similarity(a.chars(), b.chars())
}

/// Order- and duplicate-insensitive similarity of two token sets, 0–1.
///
/// Tokens are split on whitespace. The shared tokens and each side's leftovers
/// are sorted and joined; the score is the best [`char_ratio`] among
/// shared-vs-(shared + left), shared-vs-(shared + right) and
/// (shared + left)-vs-(shared + right). One side being a subset of the other
/// scores 1. An empty side scores 0.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    let left: BTreeSet<&str> = a.split_whitespace().collect();
    let right: BTreeSet<&str> = b.split_whitespace().collect();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }

    let shared = join(left.intersection(&right));
    let only_left = join(left.difference(&right));
    let only_right = join(right.difference(&left));

    if !shared.is_empty() && (only_left.is_empty() || only_right.is_empty()) {
        return 1.0;
    }

    let with_left = concat(&shared, &only_left);
    let with_right = concat(&shared, &only_right);

    let mut best = char_ratio(&with_left, &with_right);
    if !shared.is_empty() {
        best = best
            .max(char_ratio(&shared, &with_left))
            .max(char_ratio(&shared, &with_right));
    }
    best
}

fn join<S: AsRef<str>>(tokens: impl Iterator<Item = S>) -> String {
    tokens
        .map(|token| token.as_ref().to_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn concat(shared: &str, rest: &str) -> String {
    match (shared.is_empty(), rest.is_empty()) {
        (true, _) => rest.to_string(),
        (false, true) => shared.to_string(),
        (false, false) => format!("{} {}", shared, rest),
    }
}
