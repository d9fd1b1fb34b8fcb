//! Terminal error taxonomy for the progress stream.

use reqwest::StatusCode;

/// Boxed error carried by transport failures, so the pump stays generic
/// over its chunk source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The ways a progress stream can end in failure. Per-payload decode
/// problems are deliberately absent: they fall back to
/// [`shared::events::RunEvent::Raw`] and the stream keeps going.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The backend answered with a non-success status before any
    /// streaming began. `body` is the plain-text error detail.
    #[error("HTTP {status}: {body}")]
    Http { status: StatusCode, body: String },

    /// Reading the next chunk from the response body failed.
    #[error("stream read error: {0}")]
    Transport(BoxError),

    /// The transport cannot expose the body incrementally. The reqwest
    /// path never produces this (its bodies always stream); callers
    /// pumping other sources see the full taxonomy.
    #[error("response body does not support incremental reads")]
    Unsupported,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_carries_body_text() {
        let err = StreamError::Http {
            status: StatusCode::BAD_REQUEST,
            body: "bad request".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 400 Bad Request: bad request");
    }

    #[test]
    fn test_transport_error_message() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        let err = StreamError::Transport(inner.into());
        assert_eq!(err.to_string(), "stream read error: connection reset");
    }
}
