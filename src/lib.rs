//! # building-registry
//!
//! Assembles one authoritative registry of physical buildings from several
//! independently collected, partially overlapping record sets.
//!
//! The core problem is entity resolution: deciding which records describe the
//! same building, then merging each group into one canonical record that keeps
//! the most trustworthy value per attribute along with its lineage.
//!
//! ## Pipeline
//!
//! - **Normalize**: raw rows become [`SourceRecord`]s; bad field values become absent
//! - **Block**: records sharing a parcel id, grid neighborhood, or address are grouped
//! - **Score**: a deterministic [`MatchRuleSet`] decides match or no-match per pair
//! - **Cluster**: matches are closed transitively with union-find
//! - **Merge**: one [`CanonicalRecord`] per cluster, with [`Provenance`]
//!
//! ## Usage
//!
//! ```
//! use building_registry::{build_registry, RecordSet, RegistryConfig};
//! use serde_json::json;
//!
//! let curated = RecordSet::new("curated", vec![
//!     json!({ "source_id": "LP-1", "bbl": "1000010001", "name": "Alpha House" }),
//! ]);
//! let addition = RecordSet::new("addition", vec![
//!     json!({ "source_id": "7", "bbl": "1000010001", "name": "Alpha", "architect": "R. Hunt" }),
//! ]);
//!
//! let run = build_registry(&[curated, addition], &RegistryConfig::default())?;
//! assert_eq!(run.registry.len(), 1);
//! let record = &run.registry.records()[0];
//! assert_eq!(record.name.as_deref(), Some("Alpha House"));
//! assert_eq!(record.architect.as_deref(), Some("R. Hunt"));
//! # Ok::<(), building_registry::RegistryError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Identity and configuration
pub mod config;
pub mod error;
pub mod geo;
pub mod parcel;
pub mod record;
pub mod source;

// Resolution stages
pub mod blocking;
pub mod cluster;
pub mod merge;
pub mod normalize;
pub mod scorer;
pub mod similarity;

// Output
pub mod pipeline;
pub mod provenance;
pub mod registry;
pub mod report;

// Re-export primary types at crate root for convenience
pub use blocking::{Block, BlockKey, BlockingIndex};
pub use cluster::{resolve, BuildingCluster, Resolution, UnionFind};
pub use config::{MatchThresholds, RegistryConfig, SourcePriorities, YearRange};
pub use error::{ConfigError, MergeError, RegistryError, RegistryResult, ValidationError};
pub use geo::{GeoBounds, GeoPoint};
pub use merge::{canonical_id, merge_cluster};
pub use normalize::{Normalizer, RecordSet};
pub use parcel::{Bin, ParcelFormat, ParcelId, Region};
pub use pipeline::{build_registry, RegistryPipeline, RegistryRun};
pub use provenance::Provenance;
pub use record::{Attribute, SourceRecord};
pub use registry::{CanonicalRecord, CanonicalRegistry, CompletenessReport, RegistryRow};
pub use report::{DegradeReason, FieldDegradation, RefusedMerge, Rejection, RunReport, RunStats, WeakChain};
pub use scorer::{MatchDecision, MatchEdge, MatchRule, MatchRuleSet, RuleBasedScorer};
pub use source::{SourceName, SourceRecordId};
