//! `BucketManager`: the public façade over registry, engine and events
//!
//! ```text
//!   load(providers) ──► ConfigLoader ──┐
//!                                      ├──► engine::merge ──► OpenRequest ──► tokio task
//!   add(fragments) ──► deep_merge ─────┘         │                               │
//!                                                ▼                               ▼
//!                                     config / done / error              bucket / error
//! ```
//!
//! A manager is a cheap handle; clones share the same registry, listeners
//! and connector.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bucket_meta::{ConfigLoader, ConfigProvider};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::connector::Connector;
use crate::engine::{self, ConnectorRegistry, Merge, OpenRequest};
use crate::error::{Error, Result};
use crate::events::{Event, EventKind, Notifier};
use crate::registry::BucketRecord;

struct Inner<C: Connector> {
    connector: Arc<C>,
    registry: Mutex<ConnectorRegistry<C>>,
    notifier: Notifier<C::Bucket>,
    /// Abort handles of open tasks, used only by `shutdown`
    opens: Mutex<Vec<AbortHandle>>,
    /// Number of open tasks that have not finished
    outstanding: watch::Sender<usize>,
}

/// Counts one open task as outstanding until dropped, which also covers a
/// task aborted before it finished.
struct OpenGuard<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> OpenGuard<C> {
    fn new(inner: Arc<Inner<C>>) -> Self {
        inner.outstanding.send_modify(|n| *n += 1);
        Self { inner }
    }
}

impl<C: Connector> Drop for OpenGuard<C> {
    fn drop(&mut self) {
        self.inner
            .outstanding
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Maps repository names to bucket connections opened through `C`.
///
/// # Example
///
/// ```no_run
/// # async fn demo<C: bucket_core::Connector>(connector: C) -> bucket_core::Result<()> {
/// use bucket_core::{BucketManager, Event, EventKind};
/// use bucket_meta::{ConfigProvider, FileProvider};
///
/// let manager = BucketManager::new(connector);
/// manager.on(EventKind::Bucket, |event| {
///     if let Event::Bucket(record) = event {
///         println!("opened {}", record.name());
///     }
/// });
///
/// let providers: Vec<Box<dyn ConfigProvider>> = vec![Box::new(FileProvider::new("buckets.toml"))];
/// manager.load(&providers).await?;
/// let users = manager.get_bucket("users");
/// # Ok(())
/// # }
/// ```
pub struct BucketManager<C: Connector> {
    inner: Arc<Inner<C>>,
}

impl<C: Connector> Clone for BucketManager<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connector> fmt::Debug for BucketManager<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = lock(&self.inner.registry);
        f.debug_struct("BucketManager")
            .field("clusters", &registry.cluster_names())
            .field("repositories", &registry.repository_names())
            .field("notifier", &self.inner.notifier)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<C: Connector> BucketManager<C> {
    pub fn new(connector: C) -> Self {
        Self {
            inner: Arc::new(Inner {
                connector: Arc::new(connector),
                registry: Mutex::new(ConnectorRegistry::<C>::new()),
                notifier: Notifier::new(),
                opens: Mutex::new(Vec::new()),
                outstanding: watch::channel(0).0,
            }),
        }
    }

    pub fn connector(&self) -> &C {
        &self.inner.connector
    }

    /// Load configuration from `providers` and provision it.
    ///
    /// See [`load_with`](Self::load_with).
    pub async fn load(&self, providers: &[Box<dyn ConfigProvider>]) -> Result<&Self> {
        self.run_load(providers, ConfigLoader::new()).await
    }

    /// Load configuration from `providers` layered over `base`, then
    /// provision the merged result.
    ///
    /// Each provider's fragment is published as `config`. Loader, validation
    /// and mapping failures are published as `error` and also returned.
    /// Returning `Ok` means mapping is complete; buckets may still be
    /// opening.
    pub async fn load_with(
        &self,
        providers: &[Box<dyn ConfigProvider>],
        base: Value,
    ) -> Result<&Self> {
        if !base.is_object() {
            return Err(Error::invalid_argument(
                "Arg \"value\" must be an object",
            ));
        }
        self.run_load(providers, ConfigLoader::new().with_base(base)).await
    }

    async fn run_load(
        &self,
        providers: &[Box<dyn ConfigProvider>],
        loader: ConfigLoader,
    ) -> Result<&Self> {
        if providers.is_empty() {
            return Err(Error::invalid_argument(
                "Arg \"providers\" must list at least one provider",
            ));
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        let notifier = &self.inner.notifier;
        let loaded = loader
            .load(providers, |fragment| notifier.emit(&Event::Config(fragment)))
            .await;

        let config = match loaded {
            Ok(config) => config,
            Err(err) => {
                let err = Error::from(err);
                self.inner.notifier.emit(&Event::Error(&err));
                return Err(err);
            }
        };

        tracing::info!(providers = providers.len(), "Loaded bucket configuration");
        self.provision(&runtime, &config)?;
        Ok(self)
    }

    /// Merge configuration fragments that are already in hand.
    ///
    /// Array arguments are flattened one level, so `[a, [b, c]]` adds `a`,
    /// `b` and `c`. Fragments are deep-merged in order and provisioned as one
    /// configuration. Merge failures are only published as `error`; the
    /// return value covers the arguments and the runtime.
    pub fn add<I>(&self, fragments: I) -> Result<&Self>
    where
        I: IntoIterator<Item = Value>,
    {
        let fragments: Vec<Value> = fragments
            .into_iter()
            .flat_map(|fragment| match fragment {
                Value::Array(items) => items,
                other => vec![other],
            })
            .collect();

        if fragments.is_empty() {
            return Err(Error::invalid_argument(
                "Expected at least one configuration fragment",
            ));
        }
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;

        for fragment in &fragments {
            self.inner.notifier.emit(&Event::Config(fragment));
        }
        let config = ConfigLoader::new().append(&fragments);

        // Already published on `error`.
        let _ = self.provision(&runtime, &config);
        Ok(self)
    }

    fn provision(&self, runtime: &Handle, config: &Value) -> Result<()> {
        let Merge { opens, outcome } = {
            let mut registry = lock(&self.inner.registry);
            engine::merge(&mut registry, self.inner.connector.as_ref(), config)
        };

        for request in opens {
            self.spawn_open(runtime, request);
        }

        match outcome {
            Ok(()) => {
                self.inner.notifier.emit(&Event::Done(config));
                Ok(())
            }
            Err(err) => {
                self.inner.notifier.emit(&Event::Error(&err));
                Err(err)
            }
        }
    }

    fn spawn_open(&self, runtime: &Handle, request: OpenRequest<C>) {
        let guard = OpenGuard::new(Arc::clone(&self.inner));

        let task = runtime.spawn(async move {
            let inner = &guard.inner;
            match request.run(inner.connector.as_ref()).await {
                Ok(record) => {
                    tracing::info!(
                        cluster = record.cluster(),
                        bucket = record.name(),
                        "Opened bucket"
                    );
                    inner.notifier.emit(&Event::Bucket(&record));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "Bucket open failed");
                    inner.notifier.emit(&Event::Error(&err));
                }
            }
        });

        let mut opens = lock(&self.inner.opens);
        opens.retain(|open| !open.is_finished());
        opens.push(task.abort_handle());
    }

    /// Wait until every bucket open started so far has finished.
    ///
    /// Dropping the returned future leaves the opens running.
    pub async fn wait_for_opens(&self) {
        let mut outstanding = self.inner.outstanding.subscribe();
        // The sender lives in `inner`, so the channel cannot close here.
        let _ = outstanding.wait_for(|n| *n == 0).await;
    }

    /// The open bucket handle for `repository`.
    ///
    /// Fails with [`Error::BucketPending`] while the mapped bucket is still
    /// opening, or if opening it failed.
    pub fn get_bucket(&self, repository: &str) -> Result<C::Bucket> {
        let record = self.bucket(repository)?;
        record
            .handle()
            .cloned()
            .ok_or_else(|| Error::BucketPending {
                repository: repository.to_string(),
                bucket: record.name().to_string(),
            })
    }

    pub fn get_bucket_name(&self, repository: &str) -> Result<String> {
        Ok(self.bucket(repository)?.name().to_string())
    }

    /// The bucket record `repository` is mapped to, pending or not
    pub fn bucket(&self, repository: &str) -> Result<Arc<BucketRecord<C::Bucket>>> {
        self.with_registry(|registry| registry.find_repository(repository).cloned())
            .ok_or_else(|| Error::UnknownRepository {
                repository: repository.to_string(),
            })
    }

    /// Register a listener for `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: Fn(&Event<'_, C::Bucket>) + Send + Sync + 'static,
    {
        self.inner.notifier.subscribe(kind, listener);
        self
    }

    /// Register a listener by event name.
    pub fn on_named<F>(&self, name: &str, listener: F) -> Result<&Self>
    where
        F: Fn(&Event<'_, C::Bucket>) + Send + Sync + 'static,
    {
        let kind: EventKind = name.parse()?;
        Ok(self.on(kind, listener))
    }

    /// Inspect the registry. The registry is locked for the duration of `f`,
    /// so `f` must not call back into the manager.
    pub fn with_registry<R>(&self, f: impl FnOnce(&ConnectorRegistry<C>) -> R) -> R {
        f(&lock(&self.inner.registry))
    }

    /// Tear the manager down.
    ///
    /// Aborts bucket opens still in flight, empties the registry and closes
    /// every bucket that did open. Close failures are published as `error`;
    /// the first one is returned after all buckets have been tried.
    pub async fn shutdown(&self) -> Result<()> {
        let aborted = std::mem::take(&mut *lock(&self.inner.opens));
        for open in &aborted {
            open.abort();
        }
        self.wait_for_opens().await;

        let clusters = lock(&self.inner.registry).drain();
        tracing::info!(clusters = clusters.len(), "Shutting down bucket manager");

        let mut first_failure = None;
        for cluster in &clusters {
            for bucket in cluster.buckets() {
                let Some(handle) = bucket.handle() else {
                    continue;
                };
                if let Err(source) = self.inner.connector.close_bucket(handle).await {
                    let err = Error::Connector {
                        cluster: cluster.name().to_string(),
                        bucket: Some(bucket.name().to_string()),
                        source,
                    };
                    self.inner.notifier.emit(&Event::Error(&err));
                    first_failure.get_or_insert(err);
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
