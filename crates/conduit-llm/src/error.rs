use http::StatusCode;
use thiserror::Error;

/// Errors that can occur while proxying to an upstream provider
#[derive(Debug, Error)]
pub enum LlmError {
    /// No provider is configured under the requested route name
    #[error("provider not found: {provider}")]
    ProviderNotFound { provider: String },

    /// Upstream provider answered with a non-success status
    #[error("provider returned {status}: {body}")]
    Upstream {
        /// HTTP status returned by the provider
        status: u16,
        /// Raw response body, usually the provider's error envelope
        body: String,
    },

    /// Request never produced an upstream response
    #[error("upstream request failed: {0}")]
    Transport(String),

    /// Error while reading a streaming response
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Client sent a malformed or invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl LlmError {
    /// HTTP status returned to the downstream caller
    ///
    /// Client errors reported by the provider pass through unchanged so
    /// callers can tell a bad key from a broken upstream.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProviderNotFound { .. } => StatusCode::NOT_FOUND,
            Self::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(StatusCode::is_client_error)
                .unwrap_or(StatusCode::BAD_GATEWAY),
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
            Self::Streaming(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Machine-readable error type for the `error.type` field
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::ProviderNotFound { .. } => "not_found_error",
            Self::Upstream { status: 401 | 403, .. } => "authentication_error",
            Self::Upstream { status: 429, .. } => "rate_limit_error",
            Self::Upstream { .. } | Self::Transport(_) => "upstream_error",
            Self::Streaming(_) => "streaming_error",
            Self::InvalidRequest(_) => "invalid_request_error",
            Self::Internal(_) => "internal_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_client_errors_pass_through() {
        let err = LlmError::Upstream {
            status: 401,
            body: String::new(),
        };
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.error_type(), "authentication_error");

        let err = LlmError::Upstream {
            status: 429,
            body: String::new(),
        };
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.error_type(), "rate_limit_error");
    }

    #[test]
    fn upstream_server_errors_become_bad_gateway() {
        let err = LlmError::Upstream {
            status: 503,
            body: "overloaded".to_owned(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.error_type(), "upstream_error");
        assert_eq!(err.to_string(), "provider returned 503: overloaded");
    }

    #[test]
    fn routing_errors() {
        let err = LlmError::ProviderNotFound {
            provider: "nope".to_owned(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "provider not found: nope");
    }
}
