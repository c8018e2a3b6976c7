use aws_sdk_autoscaling::error::ProvideErrorMetadata;

use aiops_core::BackendError;

/// Flatten an SDK failure into a transport error carrying the service
/// error code when there is one.
pub(crate) fn sdk_error<E: ProvideErrorMetadata>(call: &str, err: E) -> BackendError {
    BackendError::Transport(format!(
        "{call} failed ({}): {}",
        err.code().unwrap_or("unknown"),
        err.message().unwrap_or_default()
    ))
}
