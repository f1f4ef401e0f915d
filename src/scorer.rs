//! Pairwise match decisions.
//!
//! The decision is crisp (match or no-match), never a continuous score, so
//! that clustering works on a well-defined relation. Rules are evaluated in
//! precedence order and the first applicable rule decides.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::blocking::Block;
use crate::config::MatchThresholds;
use crate::record::SourceRecord;
use crate::similarity::text_similarity;

/// The rule that decided a pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    /// Both parcel ids present and equal.
    ParcelAgreement,
    /// Both parcel ids present and different.
    ParcelConflict,
    /// Both locations present; distance and year tolerance.
    Spatial,
    /// Name/address similarity only.
    Degraded,
}

impl MatchRule {
    /// Returns true for the weakest-evidence path.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded)
    }
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParcelAgreement => write!(f, "parcel_agreement"),
            Self::ParcelConflict => write!(f, "parcel_conflict"),
            Self::Spatial => write!(f, "spatial"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

/// Verdict for one pair plus the rule that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchDecision {
    /// Whether the pair denotes the same building.
    pub is_match: bool,
    /// Rule that settled the pair.
    pub rule: MatchRule,
}

impl MatchDecision {
    const fn new(is_match: bool, rule: MatchRule) -> Self {
        Self { is_match, rule }
    }
}

/// Undirected "same building" relation between two records, by index.
///
/// Always stored with `a < b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MatchEdge {
    /// Lower record index.
    pub a: usize,
    /// Higher record index.
    pub b: usize,
    /// Rule that produced the match.
    pub rule: MatchRule,
}

impl MatchEdge {
    /// Creates an edge, ordering the endpoints.
    #[must_use]
    pub fn new(x: usize, y: usize, rule: MatchRule) -> Self {
        Self {
            a: x.min(y),
            b: x.max(y),
            rule,
        }
    }
}

/// Pairwise identity rule set.
pub trait MatchRuleSet: Send + Sync {
    /// Name of the rule set (for logs).
    fn name(&self) -> &str;

    /// Decides whether two records describe the same building.
    fn decide(&self, a: &SourceRecord, b: &SourceRecord) -> MatchDecision;
}

/// The deterministic parcel → spatial → degraded rule set.
///
/// # Examples
///
/// ```
/// use building_registry::{MatchRuleSet, MatchThresholds, RuleBasedScorer, SourceName, SourceRecord, SourceRecordId};
///
/// let scorer = RuleBasedScorer::new(MatchThresholds::default());
/// let a = SourceRecord::new(SourceRecordId::new(SourceName::new("curated"), "1"), 30)
///     .with_address("233 Broadway");
/// let b = SourceRecord::new(SourceRecordId::new(SourceName::new("addition"), "9"), 20)
///     .with_address("233 BROADWAY");
/// assert!(scorer.decide(&a, &b).is_match);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RuleBasedScorer {
    thresholds: MatchThresholds,
}

impl RuleBasedScorer {
    /// Creates a scorer with the given thresholds.
    #[must_use]
    pub const fn new(thresholds: MatchThresholds) -> Self {
        Self { thresholds }
    }

    fn years_agree(&self, a: &SourceRecord, b: &SourceRecord) -> bool {
        match (a.year_built, b.year_built) {
            (Some(x), Some(y)) => x.abs_diff(y) <= self.thresholds.year_tolerance,
            _ => true,
        }
    }

    /// Every attribute comparable on both sides must reach the threshold,
    /// and at least one must be comparable.
    fn text_agrees(&self, a: &SourceRecord, b: &SourceRecord) -> bool {
        let pairs = [(&a.address, &b.address), (&a.name, &b.name)];
        let mut compared = 0;
        for (x, y) in pairs {
            if let (Some(x), Some(y)) = (x, y) {
                compared += 1;
                if text_similarity(x, y) < self.thresholds.similarity {
                    return false;
                }
            }
        }
        compared > 0
    }
}

impl MatchRuleSet for RuleBasedScorer {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn decide(&self, a: &SourceRecord, b: &SourceRecord) -> MatchDecision {
        if let (Some(pa), Some(pb)) = (&a.parcel_id, &b.parcel_id) {
            return if pa == pb {
                MatchDecision::new(true, MatchRule::ParcelAgreement)
            } else {
                MatchDecision::new(false, MatchRule::ParcelConflict)
            };
        }

        if let (Some(la), Some(lb)) = (&a.location, &b.location) {
            let close = la.distance_m(lb) <= self.thresholds.distance_m;
            return MatchDecision::new(close && self.years_agree(a, b), MatchRule::Spatial);
        }

        MatchDecision::new(self.text_agrees(a, b), MatchRule::Degraded)
    }
}

/// Scores every pair in a block, returning the matches.
pub fn score_block<S: MatchRuleSet + ?Sized>(scorer: &S, block: &Block, records: &[SourceRecord]) -> Vec<MatchEdge> {
    block
        .pairs()
        .filter_map(|(i, j)| {
            let decision = scorer.decide(&records[i], &records[j]);
            decision.is_match.then(|| MatchEdge::new(i, j, decision.rule))
        })
        .collect()
}
