//! Incremental merge of configuration into a registry
//!
//! [`merge`] applies one configuration object to a registry:
//!
//! 1. Validate the object against what the registry already holds
//! 2. Open every new cluster through the connector and record it
//! 3. Record every new bucket as pending and queue an [`OpenRequest`] for it
//! 4. Map every new repository name to its bucket record
//!
//! Existing clusters, buckets and repositories are never touched, so merging
//! the same configuration twice is a no-op. The first validation, mapping or
//! cluster failure stops the merge; whatever was recorded before it stays,
//! and the open requests queued so far are still returned.
//!
//! The engine does not publish events. It runs while the caller holds the
//! registry, and the caller publishes once the registry is released.

use std::sync::Arc;

use bucket_meta::{ClusterEntry, RepositoryEntry, validate};
use serde_json::Value;

use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::registry::{BucketRecord, ClusterRecord, MappingError, Registry};

/// Registry whose handle types come from connector `C`
pub type ConnectorRegistry<C> = Registry<<C as Connector>::Cluster, <C as Connector>::Bucket>;

/// A bucket waiting for the connector to open it.
pub struct OpenRequest<C: Connector> {
    pub cluster: Arc<C::Cluster>,
    pub bucket: Arc<BucketRecord<C::Bucket>>,
    pub password: Option<String>,
}

impl<C: Connector> OpenRequest<C> {
    /// Open the bucket and resolve its record.
    ///
    /// On failure the record stays pending.
    pub async fn run(self, connector: &C) -> Result<Arc<BucketRecord<C::Bucket>>> {
        let handle = connector
            .open_bucket(&self.cluster, self.bucket.name(), self.password.as_deref())
            .await
            .map_err(|source| Error::Connector {
                cluster: self.bucket.cluster().to_string(),
                bucket: Some(self.bucket.name().to_string()),
                source,
            })?;

        if !self.bucket.resolve(handle) {
            tracing::warn!(
                cluster = self.bucket.cluster(),
                bucket = self.bucket.name(),
                "Bucket was already open; keeping the first handle"
            );
        }
        Ok(self.bucket)
    }
}

/// Result of merging one configuration.
pub struct Merge<C: Connector> {
    /// Buckets created by this merge, to be opened
    pub opens: Vec<OpenRequest<C>>,

    /// `Ok` when every entry was processed
    pub outcome: Result<()>,
}

/// Merge `config` into `registry`.
pub fn merge<C: Connector>(
    registry: &mut ConnectorRegistry<C>,
    connector: &C,
    config: &Value,
) -> Merge<C> {
    let mut opens = Vec::new();
    let outcome = apply(registry, connector, config, &mut opens);
    Merge { opens, outcome }
}

fn apply<C: Connector>(
    registry: &mut ConnectorRegistry<C>,
    connector: &C,
    config: &Value,
    opens: &mut Vec<OpenRequest<C>>,
) -> Result<()> {
    let fragment = validate(config, &*registry)?;

    if fragment.is_noop() {
        tracing::debug!("Configuration adds nothing new");
        return Ok(());
    }

    for cluster in &fragment.clusters {
        merge_cluster(registry, connector, cluster, opens)?;
    }

    for repository in &fragment.repositories {
        map_repository(registry, repository)?;
    }

    Ok(())
}

fn merge_cluster<C: Connector>(
    registry: &mut ConnectorRegistry<C>,
    connector: &C,
    entry: &ClusterEntry,
    opens: &mut Vec<OpenRequest<C>>,
) -> Result<()> {
    let handle = match registry.find_cluster(&entry.name) {
        Some(existing) => Arc::clone(existing.handle()),
        None => {
            let handle = connector
                .open_cluster(&entry.connection_string, &entry.options)
                .map_err(|source| Error::Connector {
                    cluster: entry.name.clone(),
                    bucket: None,
                    source,
                })?;

            tracing::info!(cluster = %entry.name, "Opened cluster");
            let record = ClusterRecord::new(
                &entry.name,
                &entry.connection_string,
                entry.options.clone(),
                handle,
            );
            Arc::clone(registry.upsert_cluster(record).handle())
        }
    };

    for bucket in &entry.buckets {
        let Some((record, created)) = registry.upsert_bucket(&entry.name, &bucket.name) else {
            continue;
        };
        if !created {
            continue;
        }

        tracing::debug!(cluster = %entry.name, bucket = %bucket.name, "Queued bucket open");
        opens.push(OpenRequest {
            cluster: Arc::clone(&handle),
            bucket: record,
            password: bucket.password.clone(),
        });
    }

    Ok(())
}

fn map_repository<K, B>(registry: &mut Registry<K, B>, entry: &RepositoryEntry) -> Result<()> {
    registry
        .upsert_repository(&entry.name, &entry.cluster, &entry.bucket)
        .map_err(|e| match e {
            MappingError::UnknownCluster => Error::InvalidClusterMapping {
                repository: entry.name.clone(),
                cluster: entry.cluster.clone(),
            },
            MappingError::UnknownBucket => Error::InvalidBucketMapping {
                repository: entry.name.clone(),
                bucket: entry.bucket.clone(),
            },
        })?;

    tracing::info!(
        repository = %entry.name,
        cluster = %entry.cluster,
        bucket = %entry.bucket,
        "Mapped repository"
    );
    Ok(())
}
