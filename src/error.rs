use thiserror::Error;

/// Errors produced while configuring or operating the remote sampler.
///
/// Only [`SamplerError::InvalidConfig`] ever reaches the caller; every error
/// raised after construction is absorbed by the poller and reported through
/// the internal logs, so sampling decisions themselves are infallible.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SamplerError {
    /// The sampling strategy request could not be sent or completed.
    #[error("sampling strategy request failed: {0}")]
    Transport(String),

    /// The sampling server answered with a non-success status code.
    #[error("sampling server returned status {status}: {body}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
        /// Excerpt of the response body, for diagnostics.
        body: String,
    },

    /// The response body is not a recognizable sampling strategy document.
    #[error("invalid sampling strategy response: {0}")]
    Parse(String),

    /// A decoded strategy carried a semantically invalid field.
    #[error("invalid sampling strategy: {0}")]
    Validation(String),

    /// The sampler was misconfigured at construction time.
    #[error("invalid sampler configuration: {0}")]
    InvalidConfig(String),
}
