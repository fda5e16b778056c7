//! Connector trait: the capability that actually talks to the data store

use async_trait::async_trait;
use serde_json::{Map, Value};

/// Opaque failure reported by a connector.
pub type ConnectorError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Opens clusters and buckets on behalf of the provisioning engine.
///
/// Cluster handles are assumed cheap to construct and are created
/// synchronously while a fragment is merged. Buckets are opened
/// asynchronously, one task per bucket. Retry and timeout policy, if any,
/// belongs to the implementation.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Handle to an open cluster
    type Cluster: Send + Sync + 'static;

    /// Handle to an open bucket
    type Bucket: Clone + Send + Sync + 'static;

    fn open_cluster(
        &self,
        connection_string: &str,
        options: &Map<String, Value>,
    ) -> Result<Self::Cluster, ConnectorError>;

    async fn open_bucket(
        &self,
        cluster: &Self::Cluster,
        name: &str,
        password: Option<&str>,
    ) -> Result<Self::Bucket, ConnectorError>;

    /// Release a bucket during teardown.
    async fn close_bucket(&self, _bucket: &Self::Bucket) -> Result<(), ConnectorError> {
        Ok(())
    }
}
