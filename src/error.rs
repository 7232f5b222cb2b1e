//! Error taxonomy for calls into the message relay.

/// Failure of a relay call.
///
/// Poll paths absorb every variant (log and keep the previous state);
/// user-initiated actions hand it back to the front end.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The relay could not be reached or did not answer in time.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The relay answered with a non-success status.
    #[error("relay rejected request ({status}): {body}")]
    RemoteRejection { status: u16, body: String },

    /// The response did not decode into the expected shape.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),
}

impl RelayError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { .. } => true,
            Self::RemoteRejection { status, .. } => *status == 429 || *status >= 500,
            Self::MalformedSnapshot(_) => false,
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            return Self::MalformedSnapshot(e.to_string());
        }
        Self::Transport {
            message: e.to_string(),
            source: Some(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RelayError::transport("timed out").is_transient());
        assert!(RelayError::RemoteRejection { status: 429, body: String::new() }.is_transient());
        assert!(RelayError::RemoteRejection { status: 503, body: String::new() }.is_transient());
        assert!(!RelayError::RemoteRejection { status: 401, body: String::new() }.is_transient());
        assert!(!RelayError::MalformedSnapshot("missing id".into()).is_transient());
    }

    #[test]
    fn test_error_messages() {
        let err = RelayError::RemoteRejection {
            status: 404,
            body: "Unknown Channel".into(),
        };
        assert_eq!(err.to_string(), "relay rejected request (404): Unknown Channel");
    }
}
