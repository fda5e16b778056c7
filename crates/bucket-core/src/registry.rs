//! Resource registry for clusters, buckets and repository mappings
//!
//! The registry owns every record and hands out shared references. Records
//! are only ever added: each upsert is a no-op when the key already exists,
//! and no operation replaces or removes an individual record, so a later
//! configuration merge can never drop a live connection.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use bucket_meta::KnownResources;
use serde_json::{Map, Value};

/// A bucket within a cluster.
///
/// Created pending when its name is first seen. The handle is set exactly
/// once, when the connector resolves the open.
#[derive(Debug)]
pub struct BucketRecord<B> {
    name: String,
    cluster: String,
    handle: OnceLock<B>,
}

impl<B> BucketRecord<B> {
    pub(crate) fn pending(cluster: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cluster: cluster.into(),
            handle: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning cluster
    pub fn cluster(&self) -> &str {
        &self.cluster
    }

    /// The open connection, or `None` while pending.
    pub fn handle(&self) -> Option<&B> {
        self.handle.get()
    }

    pub fn is_pending(&self) -> bool {
        self.handle.get().is_none()
    }

    /// Set the handle. Returns false if it was already set.
    pub(crate) fn resolve(&self, handle: B) -> bool {
        self.handle.set(handle).is_ok()
    }
}

/// An open cluster and the buckets opened within it.
#[derive(Debug)]
pub struct ClusterRecord<K, B> {
    name: String,
    connection_string: String,
    options: Map<String, Value>,
    handle: Arc<K>,
    buckets: HashMap<String, Arc<BucketRecord<B>>>,
}

impl<K, B> ClusterRecord<K, B> {
    pub fn new(
        name: impl Into<String>,
        connection_string: impl Into<String>,
        options: Map<String, Value>,
        handle: K,
    ) -> Self {
        Self {
            name: name.into(),
            connection_string: connection_string.into(),
            options,
            handle: Arc::new(handle),
            buckets: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn handle(&self) -> &Arc<K> {
        &self.handle
    }

    pub fn bucket(&self, name: &str) -> Option<&Arc<BucketRecord<B>>> {
        self.buckets.get(name)
    }

    pub fn buckets(&self) -> impl Iterator<Item = &Arc<BucketRecord<B>>> {
        self.buckets.values()
    }

    /// Sorted bucket names
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.buckets.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Why a repository could not be mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    UnknownCluster,
    UnknownBucket,
}

/// Registry of clusters, buckets and repository mappings.
///
/// `K` is the connector's cluster handle type and `B` its bucket handle type.
///
/// # Example
///
/// ```
/// use bucket_core::{ClusterRecord, Registry};
/// use serde_json::Map;
///
/// let mut registry: Registry<(), u32> = Registry::new();
/// registry.upsert_cluster(ClusterRecord::new("main", "couchbase://localhost", Map::new(), ()));
/// let (users, created) = registry.upsert_bucket("main", "users").unwrap();
/// assert!(created && users.is_pending());
///
/// registry.upsert_repository("accounts", "main", "users").unwrap();
/// assert_eq!(registry.find_repository("accounts").unwrap().name(), "users");
/// ```
#[derive(Debug)]
pub struct Registry<K, B> {
    clusters: HashMap<String, ClusterRecord<K, B>>,
    repositories: HashMap<String, Arc<BucketRecord<B>>>,
}

impl<K, B> Default for Registry<K, B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, B> Registry<K, B> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            clusters: HashMap::new(),
            repositories: HashMap::new(),
        }
    }

    pub fn find_cluster(&self, name: &str) -> Option<&ClusterRecord<K, B>> {
        self.clusters.get(name)
    }

    pub fn find_bucket(&self, cluster: &str, name: &str) -> Option<&Arc<BucketRecord<B>>> {
        self.clusters.get(cluster).and_then(|c| c.bucket(name))
    }

    pub fn find_repository(&self, name: &str) -> Option<&Arc<BucketRecord<B>>> {
        self.repositories.get(name)
    }

    /// Insert a cluster unless one with the same name exists.
    ///
    /// # Returns
    ///
    /// The stored record. When the name was taken, this is the existing
    /// record, unchanged, and `record` is dropped.
    pub fn upsert_cluster(&mut self, record: ClusterRecord<K, B>) -> &ClusterRecord<K, B> {
        self.clusters.entry(record.name.clone()).or_insert(record)
    }

    /// Create a pending bucket in `cluster` unless it exists.
    ///
    /// # Returns
    ///
    /// The stored record and whether it was created by this call, or `None`
    /// if the cluster is unknown.
    pub fn upsert_bucket(
        &mut self,
        cluster: &str,
        name: &str,
    ) -> Option<(Arc<BucketRecord<B>>, bool)> {
        let record = self.clusters.get_mut(cluster)?;

        if let Some(existing) = record.buckets.get(name) {
            return Some((Arc::clone(existing), false));
        }

        let bucket = Arc::new(BucketRecord::pending(cluster, name));
        record.buckets.insert(name.to_string(), Arc::clone(&bucket));
        Some((bucket, true))
    }

    /// Map a repository to a bucket of this registry.
    ///
    /// An existing mapping wins regardless of the requested target.
    pub fn upsert_repository(
        &mut self,
        name: &str,
        cluster: &str,
        bucket: &str,
    ) -> Result<Arc<BucketRecord<B>>, MappingError> {
        if let Some(existing) = self.repositories.get(name) {
            return Ok(Arc::clone(existing));
        }

        let target = self
            .clusters
            .get(cluster)
            .ok_or(MappingError::UnknownCluster)?
            .bucket(bucket)
            .ok_or(MappingError::UnknownBucket)?;

        let target = Arc::clone(target);
        self.repositories.insert(name.to_string(), Arc::clone(&target));
        Ok(target)
    }

    /// Sorted cluster names
    pub fn cluster_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clusters.keys().cloned().collect();
        names.sort();
        names
    }

    /// Sorted repository names
    pub fn repository_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.repositories.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.clusters.values().map(|c| c.buckets.len()).sum()
    }

    pub fn repository_count(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty() && self.repositories.is_empty()
    }

    /// Remove every record at once, handing the clusters back for teardown.
    pub fn drain(&mut self) -> Vec<ClusterRecord<K, B>> {
        self.repositories.clear();
        self.clusters.drain().map(|(_, cluster)| cluster).collect()
    }
}

impl<K, B> KnownResources for Registry<K, B> {
    fn has_cluster(&self, name: &str) -> bool {
        self.clusters.contains_key(name)
    }

    fn has_bucket(&self, cluster: &str, bucket: &str) -> bool {
        self.find_bucket(cluster, bucket).is_some()
    }

    fn has_repository(&self, name: &str) -> bool {
        self.repositories.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster(name: &str, connection_string: &str) -> ClusterRecord<(), u32> {
        ClusterRecord::new(name, connection_string, Map::new(), ())
    }

    fn registry_with_bucket() -> Registry<(), u32> {
        let mut registry = Registry::new();
        registry.upsert_cluster(cluster("c1", "couchbase://a"));
        registry.upsert_bucket("c1", "b1").unwrap();
        registry
    }

    #[test]
    fn test_new_registry_is_empty() {
        let registry: Registry<(), u32> = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.cluster_count(), 0);
        assert_eq!(registry.bucket_count(), 0);
        assert_eq!(registry.repository_count(), 0);
    }

    #[test]
    fn test_upsert_cluster_keeps_existing() {
        let mut registry: Registry<(), u32> = Registry::new();
        registry.upsert_cluster(cluster("c1", "couchbase://a"));
        let stored = registry.upsert_cluster(cluster("c1", "couchbase://b"));

        assert_eq!(stored.connection_string(), "couchbase://a");
        assert_eq!(registry.cluster_count(), 1);
    }

    #[test]
    fn test_upsert_bucket_is_idempotent() {
        let mut registry = registry_with_bucket();

        let first = Arc::clone(registry.find_bucket("c1", "b1").unwrap());
        let (again, created) = registry.upsert_bucket("c1", "b1").unwrap();

        assert!(!created);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(registry.bucket_count(), 1);
    }

    #[test]
    fn test_upsert_bucket_unknown_cluster() {
        let mut registry: Registry<(), u32> = Registry::new();
        assert!(registry.upsert_bucket("nope", "b1").is_none());
    }

    #[test]
    fn test_new_bucket_is_pending_until_resolved() {
        let registry = registry_with_bucket();
        let bucket = registry.find_bucket("c1", "b1").unwrap();

        assert!(bucket.is_pending());
        assert_eq!(bucket.cluster(), "c1");
        assert!(bucket.resolve(7));
        assert!(!bucket.is_pending());
        assert_eq!(bucket.handle(), Some(&7));

        // The handle is set once
        assert!(!bucket.resolve(8));
        assert_eq!(bucket.handle(), Some(&7));
    }

    #[test]
    fn test_upsert_repository_fan_in() {
        let mut registry = registry_with_bucket();

        let a = registry.upsert_repository("a", "c1", "b1").unwrap();
        let b = registry.upsert_repository("b", "c1", "b1").unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.repository_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_upsert_repository_first_write_wins() {
        let mut registry = registry_with_bucket();
        registry.upsert_bucket("c1", "b2").unwrap();

        registry.upsert_repository("r", "c1", "b1").unwrap();
        let stored = registry.upsert_repository("r", "c1", "b2").unwrap();

        assert_eq!(stored.name(), "b1");
        assert_eq!(registry.find_repository("r").unwrap().name(), "b1");
    }

    #[test]
    fn test_upsert_repository_existing_name_skips_resolution() {
        let mut registry = registry_with_bucket();
        registry.upsert_repository("r", "c1", "b1").unwrap();

        assert!(registry.upsert_repository("r", "missing", "gone").is_ok());
    }

    #[test]
    fn test_upsert_repository_mapping_errors() {
        let mut registry = registry_with_bucket();

        assert_eq!(
            registry.upsert_repository("r", "missing", "b1").unwrap_err(),
            MappingError::UnknownCluster
        );
        assert_eq!(
            registry.upsert_repository("r", "c1", "missing").unwrap_err(),
            MappingError::UnknownBucket
        );
        assert!(registry.find_repository("r").is_none());
    }

    #[test]
    fn test_known_resources() {
        let mut registry = registry_with_bucket();
        registry.upsert_repository("r", "c1", "b1").unwrap();

        assert!(registry.has_cluster("c1"));
        assert!(!registry.has_cluster("c2"));
        assert!(registry.has_bucket("c1", "b1"));
        assert!(!registry.has_bucket("c1", "b2"));
        assert!(!registry.has_bucket("c2", "b1"));
        assert!(registry.has_repository("r"));
    }

    #[test]
    fn test_drain_empties_registry() {
        let mut registry = registry_with_bucket();
        registry.upsert_repository("r", "c1", "b1").unwrap();

        let drained = registry.drain();

        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].bucket_names(), vec!["b1"]);
        assert!(registry.is_empty());
        assert!(registry.find_repository("r").is_none());
    }
}
