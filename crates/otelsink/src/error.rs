//! Error types for the sink.

use std::io;
use std::path::PathBuf;

/// Message returned to callers whenever persistence fails.
///
/// The underlying cause is only logged, so filesystem layout never reaches
/// the wire.
pub const WRITE_FAILED_MESSAGE: &str = "error writing data";

/// Errors that can occur while configuring, serving, or persisting.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error outside of entry persistence (e.g. binding the listener).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protobuf encoding error.
    #[error("failed to serialize message: {0}")]
    Encode(#[from] prost::EncodeError),

    /// The stream directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir {
        /// Directory that was being created.
        path: PathBuf,
        source: io::Error,
    },

    /// The entry file could not be written.
    #[error("failed to write file {}: {source}", path.display())]
    Write {
        /// Entry path that was being written.
        path: PathBuf,
        source: io::Error,
    },

    /// The blocking persistence task panicked or was cancelled.
    #[error("persistence task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// gRPC transport error.
    #[error("transport error: {0}")]
    Transport(#[from] tonic::transport::Error),
}

impl From<SinkError> for tonic::Status {
    fn from(_: SinkError) -> Self {
        Self::internal(WRITE_FAILED_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_hides_filesystem_details() {
        let err = SinkError::Write {
            path: PathBuf::from("/srv/otelsink/metrics/1700000000000000000"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/srv/otelsink/metrics"));

        let status = tonic::Status::from(err);
        assert_eq!(status.code(), tonic::Code::Internal);
        assert_eq!(status.message(), WRITE_FAILED_MESSAGE);
    }

    #[test]
    fn create_dir_error_names_directory() {
        let err = SinkError::CreateDir {
            path: PathBuf::from("data/logs"),
            source: io::Error::new(io::ErrorKind::Other, "not a directory"),
        };
        assert_eq!(
            err.to_string(),
            "failed to create directory data/logs: not a directory"
        );
    }
}
