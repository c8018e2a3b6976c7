//! Startup errors for the Kubernetes client.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to establish orchestrator credentials. Always fatal.
#[derive(Debug, Error)]
pub enum KubeConfigError {
    #[error("not running in a cluster: {0} is not set")]
    MissingEnv(&'static str),

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid cluster CA certificate: {0}")]
    Certificate(#[source] reqwest::Error),

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}
