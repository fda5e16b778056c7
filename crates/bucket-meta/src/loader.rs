//! Multi-provider configuration loading
//!
//! The `ConfigLoader` folds an ordered list of fragments into one
//! configuration object. Later fragments override earlier ones, with deep
//! merging for nested objects:
//!
//! 1. **Base value** - optional starting point supplied by the caller
//! 2. **Providers** - each provider's fragment in list order
//!
//! Every raw fragment is reported to the caller before it is merged, so a
//! façade can surface "fragment received" notifications.

use serde_json::{Map, Value};

use crate::merge::deep_merge;
use crate::provider::ConfigProvider;
use crate::{Error, Result};

/// Loads and merges configuration fragments.
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    base: Option<Value>,
}

impl ConfigLoader {
    /// Create a loader that starts from an empty object.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start merging from `base` instead of an empty object.
    pub fn with_base(mut self, base: Value) -> Self {
        self.base = Some(base);
        self
    }

    fn initial(&self) -> Value {
        self.base
            .clone()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// Load every provider in order and merge the results.
    ///
    /// # Arguments
    ///
    /// * `providers` - Providers to load, lowest precedence first
    /// * `on_fragment` - Called with each raw fragment as it arrives
    ///
    /// # Returns
    ///
    /// The merged configuration, or the first provider failure.
    pub async fn load<F>(
        &self,
        providers: &[Box<dyn ConfigProvider>],
        mut on_fragment: F,
    ) -> Result<Value>
    where
        F: FnMut(&Value) + Send,
    {
        let mut merged = self.initial();

        for provider in providers {
            let fragment = provider.load().await.map_err(|e| match e {
                Error::Provider { .. } => e,
                other => Error::Provider {
                    provider: provider.name().to_string(),
                    message: other.to_string(),
                },
            })?;

            tracing::debug!(provider = provider.name(), "Received config fragment");
            on_fragment(&fragment);
            deep_merge(&mut merged, &fragment);
        }

        Ok(merged)
    }

    /// Merge fragments that are already in hand, in order.
    pub fn append<'a, I>(&self, fragments: I) -> Value
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let mut merged = self.initial();
        for fragment in fragments {
            deep_merge(&mut merged, fragment);
        }
        merged
    }
}
