//! Transitive clustering of matched records.
//!
//! Clustering is the connected-components closure of the match relation:
//! if A matches B and B matches C, all three share a cluster even when A
//! and C were never compared directly.
//!
//! One union is refused: joining two components that already carry
//! different parcel ids. Parcel identity is authoritative, so a chain of
//! spatial or text matches may not bridge two parcels. Edges are applied
//! strongest rule first, so the refusal always falls on the weaker link.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::parcel::ParcelId;
use crate::record::SourceRecord;
use crate::scorer::MatchEdge;

/// Disjoint-set forest over record indices.
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.parent.len()
    }

    /// Returns true if there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parent.is_empty()
    }

    /// Root of the set holding `i`, compressing the path walked.
    pub fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut node = i;
        while self.parent[node] != root {
            let next = self.parent[node];
            self.parent[node] = root;
            node = next;
        }
        root
    }

    /// Joins the sets holding `a` and `b` and returns the new root.
    pub fn union(&mut self, a: usize, b: usize) -> usize {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return ra;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => {
                self.parent[ra] = rb;
                rb
            }
            std::cmp::Ordering::Greater => {
                self.parent[rb] = ra;
                ra
            }
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
                ra
            }
        }
    }
}

/// One building identity: a maximal connected component of records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildingCluster {
    /// Record indices, ascending.
    pub members: Vec<usize>,
    /// Edges internal to the cluster, strongest rule first.
    pub edges: Vec<MatchEdge>,
}

impl BuildingCluster {
    /// Number of member records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false for clusters produced by [`resolve`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Returns true for a record with no matches.
    #[must_use]
    pub fn is_singleton(&self) -> bool {
        self.members.len() == 1
    }

    /// A cluster of three or more records held together only by
    /// name/address similarity.
    #[must_use]
    pub fn is_weak_chain(&self) -> bool {
        self.members.len() >= 3 && self.edges.iter().all(|e| e.rule.is_degraded())
    }
}

/// Clusters plus the match edges that were not applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Clusters ordered by their smallest member.
    pub clusters: Vec<BuildingCluster>,
    /// Edges whose union would have joined two different parcel ids.
    pub refused: Vec<MatchEdge>,
}

/// Partitions the records into clusters under `edges`.
///
/// Every record lands in exactly one cluster. Edges referencing indices
/// outside the record slice are ignored.
#[must_use]
pub fn resolve(records: &[SourceRecord], edges: &[MatchEdge]) -> Resolution {
    let n = records.len();
    let mut ordered: Vec<MatchEdge> = edges
        .iter()
        .filter(|e| {
            let in_range = e.a < n && e.b < n;
            if !in_range {
                warn!(a = e.a, b = e.b, n, "ignoring edge outside the record range");
            }
            in_range
        })
        .copied()
        .collect();
    ordered.sort_by_key(|e| (e.rule, e.a, e.b));
    ordered.dedup();

    let mut forest = UnionFind::new(n);
    // Parcel id carried by each component, indexed by root.
    let mut parcel: Vec<Option<&ParcelId>> = records.iter().map(|r| r.parcel_id.as_ref()).collect();
    let mut accepted = Vec::with_capacity(ordered.len());
    let mut refused = Vec::new();

    for edge in ordered {
        let ra = forest.find(edge.a);
        let rb = forest.find(edge.b);
        if ra != rb {
            if let (Some(pa), Some(pb)) = (parcel[ra], parcel[rb]) {
                if pa != pb {
                    warn!(
                        a = %records[edge.a].id,
                        b = %records[edge.b].id,
                        rule = %edge.rule,
                        "match would join two parcels; not merged"
                    );
                    refused.push(edge);
                    continue;
                }
            }
            let carried = parcel[ra].or(parcel[rb]);
            let root = forest.union(ra, rb);
            parcel[root] = carried;
        }
        accepted.push(edge);
    }

    // Keyed by root; members arrive ascending because indices are walked in order.
    let mut by_root: BTreeMap<usize, BuildingCluster> = BTreeMap::new();
    for i in 0..n {
        let root = forest.find(i);
        by_root
            .entry(root)
            .or_insert_with(|| BuildingCluster {
                members: Vec::new(),
                edges: Vec::new(),
            })
            .members
            .push(i);
    }
    for edge in accepted {
        let root = forest.find(edge.a);
        if let Some(cluster) = by_root.get_mut(&root) {
            cluster.edges.push(edge);
        }
    }

    let mut clusters: Vec<BuildingCluster> = by_root.into_values().collect();
    clusters.sort_by_key(|c| c.members[0]);
    debug!(records = n, clusters = clusters.len(), refused = refused.len(), "clusters resolved");
    Resolution { clusters, refused }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parcel::ParcelFormat;
    use crate::scorer::MatchRule;
    use crate::source::{SourceName, SourceRecordId};

    fn plain(n: usize) -> Vec<SourceRecord> {
        (0..n)
            .map(|i| SourceRecord::new(SourceRecordId::new(SourceName::new("curated"), i.to_string()), 30))
            .collect()
    }

    fn parcel(s: &str) -> ParcelId {
        ParcelId::parse(s, &ParcelFormat::default(), &[]).unwrap()
    }

    fn edge(a: usize, b: usize) -> MatchEdge {
        MatchEdge::new(a, b, MatchRule::Spatial)
    }

    #[test]
    fn test_union_find_basics() {
        let mut uf = UnionFind::new(4);
        let r = uf.union(0, 1);
        assert_eq!(uf.union(1, 0), r);
        uf.union(2, 3);
        assert_ne!(uf.find(0), uf.find(2));
        uf.union(1, 3);
        assert_eq!(uf.find(0), uf.find(2));
        assert_eq!(uf.len(), 4);
    }

    #[test]
    fn test_singletons_without_edges() {
        let res = resolve(&plain(3), &[]);
        assert_eq!(res.clusters.len(), 3);
        assert!(res.clusters.iter().all(BuildingCluster::is_singleton));
        assert!(res.refused.is_empty());
    }

    #[test]
    fn test_transitive_closure() {
        // 0-1 and 1-2 matched; 0-2 never compared.
        let res = resolve(&plain(4), &[edge(0, 1), edge(1, 2)]);
        assert_eq!(res.clusters.len(), 2);
        assert_eq!(res.clusters[0].members, vec![0, 1, 2]);
        assert_eq!(res.clusters[0].edges.len(), 2);
        assert_eq!(res.clusters[1].members, vec![3]);
    }

    #[test]
    fn test_cluster_order_by_smallest_member() {
        let res = resolve(&plain(5), &[edge(3, 4), edge(1, 2)]);
        let firsts: Vec<_> = res.clusters.iter().map(|c| c.members[0]).collect();
        assert_eq!(firsts, vec![0, 1, 3]);
    }

    #[test]
    fn test_chain_may_not_bridge_two_parcels() {
        let mut records = plain(3);
        records[0].parcel_id = Some(parcel("1000010001"));
        records[2].parcel_id = Some(parcel("1000010002"));
        // 0 and 2 both sit spatially next to 1, which has no parcel.
        let res = resolve(&records, &[edge(0, 1), edge(1, 2)]);
        assert_eq!(res.clusters.len(), 2);
        assert_eq!(res.clusters[0].members, vec![0, 1]);
        assert_eq!(res.clusters[1].members, vec![2]);
        assert_eq!(res.refused, vec![edge(1, 2)]);
    }

    #[test]
    fn test_stronger_edge_applied_first() {
        let mut records = plain(3);
        records[1].parcel_id = Some(parcel("1000010001"));
        records[2].parcel_id = Some(parcel("1000010001"));
        records[0].parcel_id = Some(parcel("1000010002"));
        // The weak 0-1 edge is listed first but the parcel edge 1-2 wins.
        let res = resolve(
            &records,
            &[
                MatchEdge::new(0, 1, MatchRule::Degraded),
                MatchEdge::new(1, 2, MatchRule::ParcelAgreement),
            ],
        );
        assert_eq!(res.clusters[1].members, vec![1, 2]);
        assert_eq!(res.refused.len(), 1);
        assert_eq!(res.refused[0].rule, MatchRule::Degraded);
    }

    #[test]
    fn test_weak_chain_detection() {
        let degraded = |a, b| MatchEdge::new(a, b, MatchRule::Degraded);
        let res = resolve(&plain(3), &[degraded(0, 1), degraded(1, 2)]);
        assert!(res.clusters[0].is_weak_chain());

        let res = resolve(&plain(3), &[degraded(0, 1), edge(1, 2)]);
        assert!(!res.clusters[0].is_weak_chain());

        let res = resolve(&plain(2), &[degraded(0, 1)]);
        assert!(!res.clusters[0].is_weak_chain());
    }

    #[test]
    fn test_out_of_range_edge_ignored() {
        let res = resolve(&plain(2), &[edge(0, 5)]);
        assert_eq!(res.clusters.len(), 2);
    }

    #[test]
    fn test_long_chain_does_not_overflow() {
        let n = 20_000;
        let edges: Vec<_> = (1..n).map(|i| edge(i - 1, i)).collect();
        let res = resolve(&plain(n), &edges);
        assert_eq!(res.clusters.len(), 1);
        assert_eq!(res.clusters[0].len(), n);
    }
}
