//! Run report: rejections, field degradations, and cluster diagnostics.
//!
//! A run produces either a complete registry plus this report, or a fatal
//! error. The report is how recovered problems become visible.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::scorer::MatchRule;
use crate::source::{SourceName, SourceRecordId};

/// Why a field value was discarded during normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// Value could not be parsed into the field's type.
    Malformed,
    /// Value parsed but lies outside the plausible range.
    OutOfRange,
    /// Location lies outside the configured envelope.
    OutOfBounds,
    /// Value is a known in-band stand-in for "missing".
    Placeholder,
    /// Only one half of a coordinate pair was supplied.
    Incomplete,
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed"),
            Self::OutOfRange => write!(f, "out_of_range"),
            Self::OutOfBounds => write!(f, "out_of_bounds"),
            Self::Placeholder => write!(f, "placeholder"),
            Self::Incomplete => write!(f, "incomplete"),
        }
    }
}

/// A field that failed its format or bound check and became absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDegradation {
    /// Record the field belongs to.
    pub record: SourceRecordId,
    /// Field name as reported.
    pub field: String,
    /// Raw value as received, rendered as text.
    pub raw: String,
    /// Check that failed.
    pub reason: DegradeReason,
}

/// A raw record excluded from the run because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// Source of the rejected row.
    pub source_name: SourceName,
    /// Position of the row within its record set.
    pub row: usize,
    /// Identifier, when one could be read before the failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    /// Rendered validation error.
    pub reason: String,
}

impl Rejection {
    /// Creates a rejection from a validation error.
    #[must_use]
    pub fn new(source_name: SourceName, row: usize, source_id: Option<String>, error: &ValidationError) -> Self {
        Self {
            source_name,
            row,
            source_id,
            reason: error.to_string(),
        }
    }
}

/// A multi-member cluster held together only by degraded-mode edges.
///
/// These are merged as usual; the warning exists so that a reviewer can
/// decide whether the chain of weak evidence is acceptable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakChain {
    /// Cluster members, sorted.
    pub members: Vec<SourceRecordId>,
}

/// A pairwise match that was not applied because it would have joined
/// records carrying two different parcel ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefusedMerge {
    /// Lower-ordered endpoint.
    pub left: SourceRecordId,
    /// Higher-ordered endpoint.
    pub right: SourceRecordId,
    /// Rule that proposed the match.
    pub rule: MatchRule,
}

/// Stage counts for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Raw rows across all record sets.
    pub input_rows: usize,
    /// Rows that survived normalization.
    pub normalized: usize,
    /// Blocks with two or more members.
    pub blocks: usize,
    /// Distinct pairs compared.
    pub candidate_pairs: usize,
    /// Distinct matching pairs.
    pub match_edges: usize,
    /// Clusters, singletons included.
    pub clusters: usize,
    /// Clusters with more than one member.
    pub merged_clusters: usize,
}

/// Everything recovered or noteworthy during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Stage counts.
    pub stats: RunStats,
    /// Unreadable rows.
    pub rejections: Vec<Rejection>,
    /// Fields dropped during normalization.
    pub degradations: Vec<FieldDegradation>,
    /// Clusters joined only by degraded-mode edges.
    pub weak_chains: Vec<WeakChain>,
    /// Matches refused by the parcel guard.
    pub refused_merges: Vec<RefusedMerge>,
}

impl RunReport {
    /// Creates an empty report stamped with the current time.
    #[must_use]
    pub fn start() -> Self {
        let now = Utc::now();
        Self {
            started_at: now,
            finished_at: now,
            stats: RunStats::default(),
            rejections: Vec::new(),
            degradations: Vec::new(),
            weak_chains: Vec::new(),
            refused_merges: Vec::new(),
        }
    }

    /// Stamps the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Returns true if nothing was rejected, degraded, or flagged.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
            && self.degradations.is_empty()
            && self.weak_chains.is_empty()
            && self.refused_merges.is_empty()
    }

    /// Degradations recorded for one field name.
    pub fn degradations_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldDegradation> + 'a {
        self.degradations.iter().filter(move |d| d.field == field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_carries_reason() {
        let err = ValidationError::MissingField {
            field: "source_id".to_string(),
        };
        let r = Rejection::new(SourceName::new("addition"), 7, None, &err);
        assert_eq!(r.row, 7);
        assert!(r.reason.contains("source_id"));
    }

    #[test]
    fn test_report_clean_until_something_recorded() {
        let mut report = RunReport::start();
        assert!(report.is_clean());

        report.degradations.push(FieldDegradation {
            record: SourceRecordId::new(SourceName::new("curated"), "1"),
            field: "year_built".to_string(),
            raw: "9999".to_string(),
            reason: DegradeReason::OutOfRange,
        });
        report.finish();
        assert!(!report.is_clean());
        assert_eq!(report.degradations_for("year_built").count(), 1);
        assert_eq!(report.degradations_for("parcel_id").count(), 0);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_degrade_reason_display() {
        assert_eq!(DegradeReason::OutOfBounds.to_string(), "out_of_bounds");
        assert_eq!(DegradeReason::Placeholder.to_string(), "placeholder");
    }
}
