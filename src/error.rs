use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a reporter or tagger produced nothing this cycle.
///
/// None of these are fatal. The probe loop logs them and tries again on
/// the next tick.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The upstream could not be reached or answered with a non-2xx status.
    #[error("{endpoint} unavailable: {source}")]
    UpstreamUnavailable {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// The upstream answered, but not in the shape we expect.
    #[error("malformed response from {endpoint}: {source}")]
    MalformedUpstreamData {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    /// The inspection command could not be started, read, or exited
    /// abnormally.
    #[error("`{command}` failed: {source}")]
    InspectionFailure {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = ProbeError> = std::result::Result<T, E>;
