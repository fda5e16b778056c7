//! Configuration layer for the bucket registry.
//!
//! This crate knows nothing about live connections. It provides:
//!
//! - **Schema**: the typed [`Fragment`] produced once a configuration object
//!   has been validated
//! - **Validation**: fail-fast structural checks over raw JSON values
//! - **Merge**: deep merging of configuration fragments
//! - **Providers**: the [`ConfigProvider`] trait with in-memory and file
//!   implementations
//! - **Loader**: [`ConfigLoader`], which loads an ordered list of providers
//!   and folds them into a single configuration object
//!
//! # Configuration shape
//!
//! ```text
//! {
//!   "clusters": {
//!     "<cluster>": {
//!       "connectionString": "couchbase://127.0.0.1",
//!       "options": { ... },
//!       "buckets": { "<bucket>": { "password": "..." } }
//!     }
//!   },
//!   "repositories": {
//!     "<repository>": { "cluster": "<cluster>", "bucket": "<bucket>" }
//!   }
//! }
//! ```

pub mod error;
pub mod loader;
pub mod merge;
pub mod provider;
pub mod schema;
pub mod validation;

pub use error::{Error, Result};
pub use loader::ConfigLoader;
pub use merge::deep_merge;
pub use provider::{ConfigProvider, FileProvider, ValueProvider};
pub use schema::{BucketEntry, ClusterEntry, Fragment, RepositoryEntry};
pub use validation::{KnownResources, NoneKnown, ValidationError, validate};
