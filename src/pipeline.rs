//! End-to-end registry construction.
//!
//! A run is a pure function of its record sets and configuration:
//! normalize, check identities, block, score blocks on a bounded worker
//! pool, cluster, merge. It yields a complete registry plus report, or an
//! error. There is no partial result.

use std::collections::BTreeSet;
use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info, warn};

use crate::blocking::{Block, BlockingIndex};
use crate::cluster::resolve;
use crate::config::RegistryConfig;
use crate::error::{MergeError, RegistryError, RegistryResult};
use crate::merge::merge_cluster;
use crate::normalize::{Normalizer, RecordSet};
use crate::record::SourceRecord;
use crate::registry::CanonicalRegistry;
use crate::report::{RefusedMerge, RunReport, WeakChain};
use crate::scorer::{score_block, MatchEdge, MatchRuleSet, RuleBasedScorer};

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct RegistryRun {
    /// The complete canonical registry.
    pub registry: CanonicalRegistry,
    /// What was rejected, degraded, or flagged along the way.
    pub report: RunReport,
}

/// Configured pipeline. Reusable across runs.
pub struct RegistryPipeline<S: MatchRuleSet = RuleBasedScorer> {
    config: RegistryConfig,
    scorer: S,
}

impl RegistryPipeline<RuleBasedScorer> {
    /// Creates a pipeline with the rule-based scorer.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Config` if the configuration is inconsistent.
    pub fn new(config: RegistryConfig) -> RegistryResult<Self> {
        let scorer = RuleBasedScorer::new(config.thresholds);
        Self::with_scorer(config, scorer)
    }
}

impl<S: MatchRuleSet> RegistryPipeline<S> {
    /// Creates a pipeline with a custom rule set.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::Config` if the configuration is inconsistent.
    pub fn with_scorer(config: RegistryConfig, scorer: S) -> RegistryResult<Self> {
        config.validate()?;
        Ok(Self { config, scorer })
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Builds a registry from the given record sets.
    ///
    /// # Errors
    ///
    /// - `RegistryError::Merge` if a `(source_name, source_id)` pair occurs
    ///   more than once across the input
    /// - `RegistryError::Internal` if the scoring pool fails
    pub fn run(&self, sets: &[RecordSet]) -> RegistryResult<RegistryRun> {
        let mut report = RunReport::start();
        let normalizer = Normalizer::new(&self.config);

        let mut records = Vec::new();
        for set in sets {
            let normalized = normalizer.normalize_set(set);
            report.stats.input_rows += set.rows.len();
            records.extend(normalized.records);
            report.rejections.extend(normalized.rejections);
            report.degradations.extend(normalized.degradations);
        }
        report.stats.normalized = records.len();
        info!(
            rows = report.stats.input_rows,
            normalized = records.len(),
            rejected = report.rejections.len(),
            degraded_fields = report.degradations.len(),
            "records normalized"
        );

        if let Err(err) = check_unique_ids(&records) {
            error!(error = %err, "aborting run");
            return Err(err.into());
        }

        let index = BlockingIndex::build(&records, &self.config);
        report.stats.blocks = index.len();
        report.stats.candidate_pairs = index.candidate_pairs().len();
        info!(
            blocks = index.len(),
            candidate_pairs = report.stats.candidate_pairs,
            "candidate blocks built"
        );

        let edges = score_blocks(&self.scorer, index.blocks(), &records, self.config.workers)?;
        report.stats.match_edges = edges.len();
        info!(scorer = self.scorer.name(), edges = edges.len(), "blocks scored");

        let resolution = resolve(&records, &edges);
        let clusters = resolution.clusters;
        report.stats.clusters = clusters.len();
        report.refused_merges = resolution
            .refused
            .iter()
            .map(|e| RefusedMerge {
                left: records[e.a].id.clone(),
                right: records[e.b].id.clone(),
                rule: e.rule,
            })
            .collect();

        let mut canonical = Vec::with_capacity(clusters.len());
        for cluster in &clusters {
            if cluster.is_weak_chain() {
                let members: Vec<_> = cluster.members.iter().map(|&i| records[i].id.clone()).collect();
                warn!(
                    members = members.len(),
                    first = %members[0],
                    "cluster joined only by name/address similarity"
                );
                report.weak_chains.push(WeakChain { members });
            }
            if !cluster.is_singleton() {
                report.stats.merged_clusters += 1;
            }
            canonical.push(merge_cluster(cluster, &records)?);
        }

        let registry = CanonicalRegistry::new(canonical)?;
        report.finish();
        info!(
            canonical_records = registry.len(),
            merged_clusters = report.stats.merged_clusters,
            weak_chains = report.weak_chains.len(),
            refused_merges = report.refused_merges.len(),
            "registry built"
        );
        Ok(RegistryRun { registry, report })
    }
}

/// Builds a registry with the rule-based scorer.
///
/// # Errors
///
/// See [`RegistryPipeline::new`] and [`RegistryPipeline::run`].
pub fn build_registry(sets: &[RecordSet], config: &RegistryConfig) -> RegistryResult<RegistryRun> {
    RegistryPipeline::new(config.clone())?.run(sets)
}

/// Rejects any `(source_name, source_id)` pair seen twice.
fn check_unique_ids(records: &[SourceRecord]) -> Result<(), MergeError> {
    let mut ids: Vec<_> = records.iter().map(|r| &r.id).collect();
    ids.sort();
    match ids.windows(2).find(|w| w[0] == w[1]) {
        Some(dup) => Err(MergeError::ambiguous(dup[0])),
        None => Ok(()),
    }
}

/// Scores blocks on `workers` threads and returns the deduplicated edges,
/// sorted.
///
/// Blocks are independent; workers share only read access to the records.
fn score_blocks<S: MatchRuleSet>(
    scorer: &S,
    blocks: &[Block],
    records: &[SourceRecord],
    workers: usize,
) -> RegistryResult<Vec<MatchEdge>> {
    if blocks.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, blocks.len());
    let (job_tx, job_rx): (Sender<usize>, Receiver<usize>) = bounded(workers * 2);
    // Room for every reply, so workers never block on the way out.
    let (reply_tx, reply_rx) = bounded::<Vec<MatchEdge>>(blocks.len());

    thread::scope(|scope| -> RegistryResult<Vec<MatchEdge>> {
        for idx in 0..workers {
            let rx = job_rx.clone();
            let reply = reply_tx.clone();
            thread::Builder::new()
                .name(format!("registry-score-{idx}"))
                .spawn_scoped(scope, move || {
                    while let Ok(block) = rx.recv() {
                        let edges = score_block(scorer, &blocks[block], records);
                        debug!(block = %blocks[block].key, edges = edges.len(), "block scored");
                        if reply.send(edges).is_err() {
                            break;
                        }
                    }
                })
                .map_err(|e| RegistryError::internal(format!("failed to spawn scoring worker: {e}")))?;
        }
        drop(job_rx);
        drop(reply_tx);

        for block in 0..blocks.len() {
            job_tx
                .send(block)
                .map_err(|_| RegistryError::internal("scoring pool disconnected"))?;
        }
        // Close the queue: workers drain it, then exit.
        drop(job_tx);

        let mut edges = BTreeSet::new();
        let mut replies = 0;
        for batch in &reply_rx {
            replies += 1;
            edges.extend(batch);
        }
        if replies != blocks.len() {
            return Err(RegistryError::internal(format!(
                "scoring pool returned {replies} of {} blocks",
                blocks.len()
            )));
        }
        Ok(edges.into_iter().collect())
    })
}
