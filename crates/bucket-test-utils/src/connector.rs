//! [`MockConnector`]: an in-memory [`Connector`] with scripted failures.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bucket_core::{Connector, ConnectorError};
use serde_json::{Map, Value};
use tokio::sync::watch;

/// Cluster handle produced by [`MockConnector`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockCluster {
    pub connection_string: String,
    pub options: Map<String, Value>,
}

/// Bucket handle produced by [`MockConnector`].
///
/// `serial` counts opens across the connector, so two handles for the same
/// bucket name are still distinguishable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockBucket {
    pub connection_string: String,
    pub name: String,
    pub password: Option<String>,
    pub serial: usize,
}

/// A connector call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    OpenCluster { connection_string: String },
    OpenBucket { name: String, password: Option<String> },
    CloseBucket { name: String },
}

/// Connector double for manager tests.
///
/// # Example
///
/// ```rust,no_run
/// use bucket_test_utils::MockConnector;
///
/// let connector = MockConnector::new()
///     .fail_bucket("b1")
///     .fail_cluster("couchbase://down");
/// ```
#[derive(Debug, Default)]
pub struct MockConnector {
    failing_clusters: HashSet<String>,
    failing_buckets: HashSet<String>,
    failing_closes: HashSet<String>,
    gate: Option<watch::Sender<bool>>,
    calls: Mutex<Vec<Call>>,
    serial: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail `open_cluster` for this connection string.
    pub fn fail_cluster(mut self, connection_string: &str) -> Self {
        self.failing_clusters.insert(connection_string.to_string());
        self
    }

    /// Fail `open_bucket` for this bucket name.
    pub fn fail_bucket(mut self, name: &str) -> Self {
        self.failing_buckets.insert(name.to_string());
        self
    }

    /// Fail `close_bucket` for this bucket name.
    pub fn fail_close(mut self, name: &str) -> Self {
        self.failing_closes.insert(name.to_string());
        self
    }

    /// Hold every `open_bucket` until [`release`](Self::release) is called.
    pub fn gated(mut self) -> Self {
        self.gate = Some(watch::channel(false).0);
        self
    }

    /// Let held bucket opens proceed.
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.send_replace(true);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cluster_opens(&self) -> usize {
        self.count(|call| matches!(call, Call::OpenCluster { .. }))
    }

    pub fn bucket_opens(&self) -> usize {
        self.count(|call| matches!(call, Call::OpenBucket { .. }))
    }

    pub fn closes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::CloseBucket { name } => Some(name),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Cluster = MockCluster;
    type Bucket = MockBucket;

    fn open_cluster(
        &self,
        connection_string: &str,
        options: &Map<String, Value>,
    ) -> Result<MockCluster, ConnectorError> {
        self.record(Call::OpenCluster {
            connection_string: connection_string.to_string(),
        });
        if self.failing_clusters.contains(connection_string) {
            return Err(format!("cannot reach {connection_string}").into());
        }
        Ok(MockCluster {
            connection_string: connection_string.to_string(),
            options: options.clone(),
        })
    }

    async fn open_bucket(
        &self,
        cluster: &MockCluster,
        name: &str,
        password: Option<&str>,
    ) -> Result<MockBucket, ConnectorError> {
        self.record(Call::OpenBucket {
            name: name.to_string(),
            password: password.map(str::to_string),
        });

        if let Some(gate) = &self.gate {
            let mut rx = gate.subscribe();
            rx.wait_for(|open| *open).await?;
        }

        if self.failing_buckets.contains(name) {
            return Err(format!("authentication failed for bucket {name}").into());
        }
        Ok(MockBucket {
            connection_string: cluster.connection_string.clone(),
            name: name.to_string(),
            password: password.map(str::to_string),
            serial: self.serial.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn close_bucket(&self, bucket: &MockBucket) -> Result<(), ConnectorError> {
        self.record(Call::CloseBucket {
            name: bucket.name.clone(),
        });
        if self.failing_closes.contains(&bucket.name) {
            return Err(format!("bucket {} is busy", bucket.name).into());
        }
        Ok(())
    }
}
