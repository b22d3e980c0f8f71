//! Host-side error types for the OneSDK host imports.
//!
//! `HostError` is the error type returned by [`HostApi`](crate::HostApi)
//! methods. A `HostError` never traps the core: it is handed to the core as
//! an `Err` import response carrying a [`HostFailure`] so the core decides
//! whether to retry or propagate it.

use onesdk_primitives::HostFailure;

/// Failure of a host effect requested by the core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// Transport-level failure talking to a provider.
    #[error("network error: {0}")]
    Network(String),

    /// The provider call did not finish within the configured timeout.
    #[error("request timed out after {0} ms")]
    Timeout(u64),

    /// The request was well-formed but cannot be carried out as given
    /// (unknown HTTP method, invalid header, oversized random request).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered with more bytes than the host or the core
    /// can take.
    #[error("response of {0} bytes is too large")]
    ResponseTooLarge(u64),

    #[error("asset not found: {0}")]
    AssetNotFound(String),

    /// The asset path escapes the assets location.
    #[error("asset path refused: {0}")]
    AssetRefused(String),

    /// An internal host error not caused by the request.
    #[error("internal host error: {0}")]
    Internal(String),
}

impl HostError {
    /// Stable machine-readable kind handed to the core.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Timeout(_) => "timeout",
            Self::InvalidRequest(_) => "invalid_request",
            Self::ResponseTooLarge(_) => "response_too_large",
            Self::AssetNotFound(_) => "asset_not_found",
            Self::AssetRefused(_) => "asset_refused",
            Self::Internal(_) => "internal",
        }
    }

    /// Convert to the payload of an `Err` import response.
    pub fn to_failure(&self) -> HostFailure {
        HostFailure {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        let cases = [
            (HostError::Network("refused".into()), "network"),
            (HostError::Timeout(30_000), "timeout"),
            (HostError::InvalidRequest("method".into()), "invalid_request"),
            (HostError::ResponseTooLarge(1 << 30), "response_too_large"),
            (HostError::AssetNotFound("x".into()), "asset_not_found"),
            (HostError::AssetRefused("../x".into()), "asset_refused"),
            (HostError::Internal("disk".into()), "internal"),
        ];
        for (err, code) in cases {
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn test_to_failure() {
        let failure = HostError::Timeout(1500).to_failure();
        assert_eq!(failure.code, "timeout");
        assert_eq!(failure.message, "request timed out after 1500 ms");
    }
}
