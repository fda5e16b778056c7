//! ConfigProvider trait and the built-in providers

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;

use crate::{Error, Result};

/// A source of raw configuration fragments.
///
/// Providers only fetch and parse. Merging and validation happen later, so a
/// provider may return any JSON value.
#[async_trait]
pub trait ConfigProvider: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    async fn load(&self) -> Result<Value>;
}

/// Provider that hands back a value it already holds.
#[derive(Debug, Clone)]
pub struct ValueProvider {
    name: String,
    value: Value,
}

impl ValueProvider {
    pub fn new(value: Value) -> Self {
        Self::named("value", value)
    }

    pub fn named(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

#[async_trait]
impl ConfigProvider for ValueProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Value> {
        Ok(self.value.clone())
    }
}

/// Provider that reads a configuration file.
///
/// Format is detected from file extension:
/// - `.toml` -> TOML
/// - `.json` -> JSON
/// - `.yaml`, `.yml` -> YAML
#[derive(Debug, Clone)]
pub struct FileProvider {
    name: String,
    path: PathBuf,
}

impl FileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigProvider for FileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load(&self) -> Result<Value> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| Error::Io {
                path: self.path.clone(),
                source,
            })?;

        tracing::debug!(path = ?self.path, bytes = content.len(), "Read config file");
        parse(&self.path, &content)
    }
}

fn parse(path: &Path, content: &str) -> Result<Value> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    let parse_error = |format: &str, message: String| Error::ConfigParse {
        path: path.to_path_buf(),
        format: format.into(),
        message,
    };

    match extension.to_lowercase().as_str() {
        "toml" => toml::from_str(content).map_err(|e| parse_error("TOML", e.to_string())),
        "json" => serde_json::from_str(content).map_err(|e| parse_error("JSON", e.to_string())),
        "yaml" | "yml" => {
            serde_yaml::from_str(content).map_err(|e| parse_error("YAML", e.to_string()))
        }
        _ => Err(Error::UnsupportedFormat {
            extension: extension.to_string(),
        }),
    }
}
