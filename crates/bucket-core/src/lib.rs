//! Repository-to-bucket registry
//!
//! This crate maps logical repository names to live bucket connections,
//! implementing:
//!
//! - **Registry**: clusters, their buckets and repository mappings, only
//!   ever added to
//! - **Provisioning engine**: incremental, idempotent merge of configuration
//!   into the registry
//! - **Events**: `config`, `done`, `bucket` and `error` notifications
//! - **BucketManager**: the façade tying these together over a [`Connector`]
//!
//! # Architecture
//!
//! ```text
//!              application
//!                   |
//!             BucketManager ---- events ----> listeners
//!            /      |      \
//!     bucket-meta  engine  Connector (open_cluster / open_bucket)
//!                   |
//!                registry
//! ```
//!
//! Mapping is synchronous. Buckets open in background tasks, so a
//! repository may be mapped before its bucket is usable; `get_bucket`
//! reports that as [`Error::BucketPending`].

pub mod connector;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod manager;
pub mod registry;
pub mod shared;

pub use connector::{Connector, ConnectorError};
pub use engine::{ConnectorRegistry, Merge, OpenRequest, merge};
pub use error::{Error, Result};
pub use events::{Event, EventKind, Listener, Notifier};
pub use manager::BucketManager;
pub use registry::{BucketRecord, ClusterRecord, MappingError, Registry};
pub use shared::{clear_shared, set_shared};
