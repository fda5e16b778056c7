//! Structural validation of configuration fragments
//!
//! Validation is pure and fail-fast. Checks run in a fixed order: top-level
//! keys, then each cluster in encounter order together with its buckets, then
//! each repository in encounter order. The first failure is returned and
//! nothing from the fragment is applied.
//!
//! What already exists in the registry changes what is checked: buckets and
//! repositories already present are skipped entirely, and an existing cluster
//! may omit `buckets`. The registry exposes that knowledge through
//! [`KnownResources`].

use serde_json::{Map, Value};

use crate::schema::{BucketEntry, ClusterEntry, Fragment, RepositoryEntry};

/// Read-only view of the resources a fragment is validated against.
pub trait KnownResources {
    fn has_cluster(&self, name: &str) -> bool;
    fn has_bucket(&self, cluster: &str, bucket: &str) -> bool;
    fn has_repository(&self, name: &str) -> bool;
}

/// Validates against an empty registry.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneKnown;

impl KnownResources for NoneKnown {
    fn has_cluster(&self, _name: &str) -> bool {
        false
    }

    fn has_bucket(&self, _cluster: &str, _bucket: &str) -> bool {
        false
    }

    fn has_repository(&self, _name: &str) -> bool {
        false
    }
}

/// A malformed configuration fragment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Configs must be non-array objects")]
    NotAnObject,

    #[error("Config missing required \"clusters\" key")]
    ClustersMissing,

    #[error("Config \"clusters\" key must be a non-array object")]
    ClustersNotObject,

    #[error("No clusters were defined")]
    NoClusters,

    #[error("Config missing required \"repositories\" key")]
    RepositoriesMissing,

    #[error("Config \"repositories\" key must be a non-array object")]
    RepositoriesNotObject,

    #[error("No repositories were defined")]
    NoRepositories,

    #[error("Cluster \"{cluster}\" configuration must be an object")]
    ClusterNotObject { cluster: String },

    #[error("Cluster \"{cluster}\" \"connectionString\" must be a non-empty string")]
    ConnectionString { cluster: String },

    #[error("Cluster \"{cluster}\" \"options\" must be an object")]
    OptionsNotObject { cluster: String },

    #[error("Cluster \"{cluster}\" \"buckets\" is required")]
    BucketsMissing { cluster: String },

    #[error("Cluster \"{cluster}\" \"buckets\" must be a non-array object")]
    BucketsNotObject { cluster: String },

    #[error("No buckets were defined for cluster \"{cluster}\"")]
    NoBuckets { cluster: String },

    #[error("Bucket \"{bucket}\" in cluster \"{cluster}\" must be an object")]
    BucketNotObject { cluster: String, bucket: String },

    #[error("Bucket \"{bucket}\" in cluster \"{cluster}\" password must be a string")]
    PasswordNotString { cluster: String, bucket: String },

    #[error("Repository \"{repository}\" configuration is undefined")]
    RepositoryMissing { repository: String },

    #[error("Repository \"{repository}\" configuration must be an object")]
    RepositoryNotObject { repository: String },

    #[error("Repository \"{repository}\" key \"cluster\" must be a non-empty string")]
    RepositoryCluster { repository: String },

    #[error("Repository \"{repository}\" key \"bucket\" must be a non-empty string")]
    RepositoryBucket { repository: String },
}

/// Validate a raw configuration object against what is already known.
///
/// # Returns
///
/// The typed fragment holding only the entries that still need work, or
/// the first validation failure encountered.
pub fn validate(
    config: &Value,
    known: &impl KnownResources,
) -> Result<Fragment, ValidationError> {
    let root = config.as_object().ok_or(ValidationError::NotAnObject)?;

    let clusters = section(
        root,
        "clusters",
        ValidationError::ClustersMissing,
        ValidationError::ClustersNotObject,
    )?;
    let repositories = section(
        root,
        "repositories",
        ValidationError::RepositoriesMissing,
        ValidationError::RepositoriesNotObject,
    )?;

    if clusters.is_empty() {
        return Err(ValidationError::NoClusters);
    }
    if repositories.is_empty() {
        return Err(ValidationError::NoRepositories);
    }

    let clusters = clusters
        .iter()
        .map(|(name, conf)| validate_cluster(name, conf, known))
        .collect::<Result<Vec<_>, _>>()?;

    let repositories = repositories
        .iter()
        .filter(|(name, _)| !known.has_repository(name))
        .map(|(name, conf)| validate_repository(name, conf))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Fragment {
        clusters,
        repositories,
    })
}

fn section<'a>(
    root: &'a Map<String, Value>,
    key: &str,
    missing: ValidationError,
    not_object: ValidationError,
) -> Result<&'a Map<String, Value>, ValidationError> {
    match root.get(key) {
        None | Some(Value::Null) => Err(missing),
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(not_object),
    }
}

fn validate_cluster(
    name: &str,
    conf: &Value,
    known: &impl KnownResources,
) -> Result<ClusterEntry, ValidationError> {
    let cluster = || name.to_string();

    let conf = conf
        .as_object()
        .ok_or_else(|| ValidationError::ClusterNotObject { cluster: cluster() })?;

    let connection_string = match conf.get("connectionString") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(ValidationError::ConnectionString { cluster: cluster() }),
    };

    let options = match conf.get("options") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(options)) => options.clone(),
        Some(_) => return Err(ValidationError::OptionsNotObject { cluster: cluster() }),
    };

    let existing = known.has_cluster(name);
    let empty = Map::new();

    let buckets = match conf.get("buckets") {
        None | Some(Value::Null) if existing => &empty,
        None | Some(Value::Null) => {
            return Err(ValidationError::BucketsMissing { cluster: cluster() });
        }
        Some(Value::Object(buckets)) => buckets,
        Some(_) => return Err(ValidationError::BucketsNotObject { cluster: cluster() }),
    };

    if !existing && buckets.is_empty() {
        return Err(ValidationError::NoBuckets { cluster: cluster() });
    }

    let buckets = buckets
        .iter()
        .filter(|(bucket, _)| !(existing && known.has_bucket(name, bucket)))
        .map(|(bucket, conf)| validate_bucket(name, bucket, conf))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClusterEntry {
        name: name.to_string(),
        connection_string,
        options,
        existing,
        buckets,
    })
}

fn validate_bucket(cluster: &str, name: &str, conf: &Value) -> Result<BucketEntry, ValidationError> {
    let password = match conf {
        Value::Null => None,
        Value::Object(conf) => match conf.get("password") {
            None | Some(Value::Null) => None,
            Some(Value::String(password)) => Some(password.clone()),
            Some(_) => {
                return Err(ValidationError::PasswordNotString {
                    cluster: cluster.to_string(),
                    bucket: name.to_string(),
                });
            }
        },
        _ => {
            return Err(ValidationError::BucketNotObject {
                cluster: cluster.to_string(),
                bucket: name.to_string(),
            });
        }
    };

    Ok(BucketEntry {
        name: name.to_string(),
        password,
    })
}

fn validate_repository(name: &str, conf: &Value) -> Result<RepositoryEntry, ValidationError> {
    let repository = || name.to_string();

    let conf = match conf {
        Value::Null => return Err(ValidationError::RepositoryMissing { repository: repository() }),
        Value::Object(conf) => conf,
        _ => return Err(ValidationError::RepositoryNotObject { repository: repository() }),
    };

    let cluster = match conf.get("cluster") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(ValidationError::RepositoryCluster { repository: repository() }),
    };

    let bucket = match conf.get("bucket") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        _ => return Err(ValidationError::RepositoryBucket { repository: repository() }),
    };

    Ok(RepositoryEntry {
        name: name.to_string(),
        cluster,
        bucket,
    })
}
