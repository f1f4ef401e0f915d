//! Candidate generation by blocking.
//!
//! Records are grouped under cheap keys so that pairwise scoring only runs
//! inside small groups. A record may sit in several blocks; any two records
//! that could match share at least one.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::config::RegistryConfig;
use crate::geo::{Grid, GridCell};
use crate::parcel::ParcelId;
use crate::record::SourceRecord;
use crate::similarity::normalize_text;

/// Key a block was formed under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockKey {
    /// Records sharing one present parcel id.
    Parcel(ParcelId),
    /// Records whose home cell is this cell or one of its eight neighbors.
    Cell(GridCell),
    /// Records sharing one normalized address.
    Address(String),
    /// Records with neither parcel id nor location.
    Residual,
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parcel(id) => write!(f, "parcel:{id}"),
            Self::Cell(c) => write!(f, "cell:{},{}", c.row, c.col),
            Self::Address(a) => write!(f, "address:{a}"),
            Self::Residual => write!(f, "residual"),
        }
    }
}

/// A candidate group: indices into the record slice, ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Shared key that formed the block.
    pub key: BlockKey,
    /// Member record indices.
    pub members: Vec<usize>,
}

impl Block {
    /// All unordered member pairs `(i, j)` with `i < j`.
    pub fn pairs(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.members
            .iter()
            .enumerate()
            .flat_map(move |(n, &i)| self.members[n + 1..].iter().map(move |&j| (i, j)))
    }

    /// Number of pairs in the block.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        let n = self.members.len();
        n * n.saturating_sub(1) / 2
    }
}

/// Blocks over one record slice. Only blocks with two or more members are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockingIndex {
    blocks: Vec<Block>,
}

fn push_groups<K: Ord>(out: &mut Vec<Block>, groups: BTreeMap<K, Vec<usize>>, key: impl Fn(K) -> BlockKey) {
    for (k, members) in groups {
        if members.len() >= 2 {
            out.push(Block { key: key(k), members });
        }
    }
}

impl BlockingIndex {
    /// Builds every block for the records, in deterministic key order.
    #[must_use]
    pub fn build(records: &[SourceRecord], config: &RegistryConfig) -> Self {
        let grid = Grid::new(&config.bounds, config.grid_cell_m);

        let mut by_parcel: BTreeMap<ParcelId, Vec<usize>> = BTreeMap::new();
        let mut by_cell: BTreeMap<GridCell, Vec<usize>> = BTreeMap::new();
        let mut by_address: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut residual = Vec::new();

        for (idx, record) in records.iter().enumerate() {
            if let Some(parcel) = &record.parcel_id {
                by_parcel.entry(parcel.clone()).or_default().push(idx);
            }
            if let Some(point) = &record.location {
                by_cell.entry(grid.cell_of(point)).or_default().push(idx);
            }
            if let Some(address) = &record.address {
                let norm = normalize_text(address);
                if !norm.is_empty() {
                    by_address.entry(norm).or_default().push(idx);
                }
            }
            if record.lacks_strong_identity() {
                residual.push(idx);
            }
        }

        // Expand each occupied cell to its neighborhood so that true matches
        // straddling a cell edge still meet.
        let mut neighborhoods: BTreeMap<GridCell, Vec<usize>> = BTreeMap::new();
        for cell in by_cell.keys() {
            let mut members: Vec<usize> = cell
                .neighborhood()
                .iter()
                .filter_map(|n| by_cell.get(n))
                .flatten()
                .copied()
                .collect();
            members.sort_unstable();
            neighborhoods.insert(*cell, members);
        }

        let mut blocks = Vec::new();
        push_groups(&mut blocks, by_parcel, BlockKey::Parcel);
        push_groups(&mut blocks, neighborhoods, BlockKey::Cell);
        push_groups(&mut blocks, by_address, BlockKey::Address);
        if residual.len() >= 2 {
            blocks.push(Block {
                key: BlockKey::Residual,
                members: residual,
            });
        }

        debug!(records = records.len(), blocks = blocks.len(), "blocking index built");
        Self { blocks }
    }

    /// The blocks, parcel blocks first, then cells, addresses, residual.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if no block has two members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Distinct candidate pairs across all blocks.
    #[must_use]
    pub fn candidate_pairs(&self) -> BTreeSet<(usize, usize)> {
        self.blocks.iter().flat_map(Block::pairs).collect()
    }

    /// Returns true if some block holds both records.
    #[must_use]
    pub fn co_blocked(&self, a: usize, b: usize) -> bool {
        self.blocks
            .iter()
            .any(|blk| blk.members.binary_search(&a).is_ok() && blk.members.binary_search(&b).is_ok())
    }
}
