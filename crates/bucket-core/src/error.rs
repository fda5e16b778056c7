//! Error types for bucket-core

use bucket_meta::ValidationError;

use crate::connector::ConnectorError;

/// Result type for bucket-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in bucket-core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A caller passed a malformed argument
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Configuration fragment failed structural validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Lookup of a repository that has no mapping
    #[error("The repository \"{repository}\" does not have an associated bucket")]
    UnknownRepository { repository: String },

    /// Repository references a cluster that does not exist
    #[error("The repository \"{repository}\" is referencing an unknown cluster \"{cluster}\"")]
    InvalidClusterMapping { repository: String, cluster: String },

    /// Repository references a bucket missing from its cluster
    #[error("The repository \"{repository}\" is referencing an unknown bucket \"{bucket}\"")]
    InvalidBucketMapping { repository: String, bucket: String },

    /// The connector failed to open or close a resource
    #[error("Connector failed for cluster \"{cluster}\"{}: {source}", bucket_suffix(.bucket))]
    Connector {
        cluster: String,
        bucket: Option<String>,
        #[source]
        source: ConnectorError,
    },

    /// The repository is mapped but its bucket has not finished opening
    #[error("The bucket \"{bucket}\" for repository \"{repository}\" is not open yet")]
    BucketPending { repository: String, bucket: String },

    /// Listener registration named an event that does not exist
    #[error("Arg \"eventName\" references an unknown event: \"{name}\"")]
    UnknownEvent { name: String },

    /// Provisioning was requested outside of a Tokio runtime
    #[error("Bucket provisioning requires a running Tokio runtime")]
    NoRuntime,

    /// Configuration loading error from bucket-meta
    #[error(transparent)]
    Meta(#[from] bucket_meta::Error),
}

fn bucket_suffix(bucket: &Option<String>) -> String {
    match bucket {
        Some(bucket) => format!(" bucket \"{bucket}\""),
        None => String::new(),
    }
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_repository_display() {
        let err = Error::UnknownRepository {
            repository: "users".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "The repository \"users\" does not have an associated bucket"
        );
    }

    #[test]
    fn test_mapping_errors_name_both_sides() {
        let err = Error::InvalidClusterMapping {
            repository: "r2".to_string(),
            cluster: "missing".to_string(),
        };
        assert!(err.to_string().contains("r2"));
        assert!(err.to_string().contains("missing"));

        let err = Error::InvalidBucketMapping {
            repository: "r3".to_string(),
            bucket: "gone".to_string(),
        };
        assert!(err.to_string().contains("r3"));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_connector_error_display() {
        let err = Error::Connector {
            cluster: "c1".to_string(),
            bucket: Some("b1".to_string()),
            source: "authentication failed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Connector failed for cluster \"c1\" bucket \"b1\": authentication failed"
        );

        let err = Error::Connector {
            cluster: "c1".to_string(),
            bucket: None,
            source: "bad connection string".into(),
        };
        assert_eq!(
            err.to_string(),
            "Connector failed for cluster \"c1\": bad connection string"
        );
    }

    #[test]
    fn test_validation_error_is_transparent() {
        let err = Error::from(ValidationError::NoRepositories);
        assert_eq!(err.to_string(), "No repositories were defined");
    }
}
