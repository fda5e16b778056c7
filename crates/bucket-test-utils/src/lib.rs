//! Shared test utilities for the bucket-registry workspace.
//!
//! This crate provides standardised fixtures for the crate test suites. It
//! is a dev-dependency only and never published.
//!
//! # Modules
//!
//! - [`connector`]: [`MockConnector`], a scriptable in-memory connector
//! - [`config`]: [`ConfigBuilder`] and on-disk config files
//! - [`recorder`]: [`EventRecorder`], which captures manager events in order

pub mod config;
pub mod connector;
pub mod recorder;

pub use config::{ConfigBuilder, write_config};
pub use connector::{Call, MockBucket, MockCluster, MockConnector};
pub use recorder::{EventRecorder, Recorded};
