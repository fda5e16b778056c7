//! Typed view of a validated configuration fragment
//!
//! A [`Fragment`] is what [`validate`](crate::validate) hands back once a raw
//! configuration object has passed every check. It only carries the entries
//! that still need work against the registry it was validated for, in the
//! order they were encountered in the source object.

use serde_json::{Map, Value};

/// A validated configuration fragment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    /// Cluster entries in encounter order
    pub clusters: Vec<ClusterEntry>,

    /// Repository entries not yet mapped, in encounter order
    pub repositories: Vec<RepositoryEntry>,
}

impl Fragment {
    /// Total number of new buckets declared across all clusters.
    pub fn bucket_count(&self) -> usize {
        self.clusters.iter().map(|c| c.buckets.len()).sum()
    }

    /// True when applying this fragment would change nothing.
    pub fn is_noop(&self) -> bool {
        self.repositories.is_empty()
            && self
                .clusters
                .iter()
                .all(|c| c.existing && c.buckets.is_empty())
    }
}

/// A cluster declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterEntry {
    pub name: String,

    /// Connection string as declared. Ignored when `existing` is set.
    pub connection_string: String,

    /// Opaque connector options. Empty when none were declared.
    pub options: Map<String, Value>,

    /// Whether the cluster was already known when the fragment was validated
    pub existing: bool,

    /// Buckets not yet present in the cluster
    pub buckets: Vec<BucketEntry>,
}

/// A bucket declaration within a cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketEntry {
    pub name: String,
    pub password: Option<String>,
}

/// A repository to bucket mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    pub name: String,
    pub cluster: String,
    pub bucket: String,
}
