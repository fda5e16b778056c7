//! Configuration fixtures.

use std::fs;
use std::path::PathBuf;

use serde_json::{Map, Value, json};
use tempfile::TempDir;

/// Builds configuration objects without hand-writing nested JSON.
///
/// # Example
///
/// ```rust
/// use bucket_test_utils::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .cluster("c1", "couchbase://a")
///     .bucket("c1", "b1")
///     .repository("r1", "c1", "b1")
///     .build();
/// assert_eq!(config["repositories"]["r1"]["bucket"], "b1");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    clusters: Map<String, Value>,
    repositories: Map<String, Value>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a cluster with an empty bucket table.
    pub fn cluster(mut self, name: &str, connection_string: &str) -> Self {
        self.clusters.insert(
            name.to_string(),
            json!({ "connectionString": connection_string, "buckets": {} }),
        );
        self
    }

    /// Set the `options` object of a declared cluster.
    pub fn options(mut self, cluster: &str, options: Value) -> Self {
        self.cluster_entry(cluster).insert("options".to_string(), options);
        self
    }

    pub fn bucket(self, cluster: &str, name: &str) -> Self {
        self.bucket_entry(cluster, name, json!({}))
    }

    pub fn bucket_with_password(self, cluster: &str, name: &str, password: &str) -> Self {
        self.bucket_entry(cluster, name, json!({ "password": password }))
    }

    pub fn repository(mut self, name: &str, cluster: &str, bucket: &str) -> Self {
        self.repositories.insert(
            name.to_string(),
            json!({ "cluster": cluster, "bucket": bucket }),
        );
        self
    }

    pub fn build(self) -> Value {
        json!({
            "clusters": self.clusters,
            "repositories": self.repositories,
        })
    }

    fn bucket_entry(mut self, cluster: &str, name: &str, conf: Value) -> Self {
        let buckets = self
            .cluster_entry(cluster)
            .entry("buckets")
            .or_insert_with(|| json!({}));
        buckets
            .as_object_mut()
            .expect("buckets must be an object")
            .insert(name.to_string(), conf);
        self
    }

    fn cluster_entry(&mut self, cluster: &str) -> &mut Map<String, Value> {
        self.clusters
            .get_mut(cluster)
            .and_then(Value::as_object_mut)
            .unwrap_or_else(|| panic!("cluster {cluster} must be declared first"))
    }
}

/// Write `contents` to `file_name` in a fresh temporary directory.
///
/// The directory lives as long as the returned [`TempDir`].
pub fn write_config(file_name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(file_name);
    fs::write(&path, contents).unwrap();
    (dir, path)
}
