//! Log output for bucket provisioning

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directives used when `RUST_LOG` is unset: provisioning events from the
/// bucket crates at info, everything else at warn.
pub const DEFAULT_DIRECTIVES: &str = "warn,bucket_core=info,bucket_meta=info";

/// Install a tracing subscriber for bucket provisioning logs.
///
/// The filter comes from `RUST_LOG`, falling back to [`DEFAULT_DIRECTIVES`].
/// Returns an error when a global subscriber is already installed.
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with(DEFAULT_DIRECTIVES)
}

/// Like [`init`], with `directives` as the fallback filter.
pub fn init_with(directives: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter_layer = filter(directives)?;

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .compact();

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

fn filter(directives: &str) -> Result<EnvFilter, Box<dyn std::error::Error + Send + Sync>> {
    Ok(EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives))?)
}
