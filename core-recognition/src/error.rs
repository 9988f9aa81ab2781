//! # Recognition Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Failures on the recognition path.
///
/// An explicit "no match" is not an error; it is a
/// [`RecognitionOutcome`](bridge_traits::RecognitionOutcome) variant.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecognitionError {
    /// The request never reached the service.
    #[error("Recognition network error: {0}")]
    Network(String),

    /// The service answered with a failure or an unusable response.
    #[error("Recognition service error: {0}")]
    Service(String),

    /// No audio could be captured for the attempt.
    #[error("Snippet unavailable: {0}")]
    SnippetUnavailable(String),
}

impl RecognitionError {
    pub fn is_network(&self) -> bool {
        matches!(self, RecognitionError::Network(_))
    }
}

impl From<BridgeError> for RecognitionError {
    fn from(err: BridgeError) -> Self {
        if err.is_network() {
            RecognitionError::Network(err.to_string())
        } else {
            RecognitionError::Service(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, RecognitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_errors_keep_network_apart() {
        let network: RecognitionError = BridgeError::Network("dns".into()).into();
        assert!(network.is_network());

        let io: RecognitionError =
            BridgeError::Io(std::io::Error::new(std::io::ErrorKind::TimedOut, "read")).into();
        assert!(io.is_network());

        let service: RecognitionError = BridgeError::Service("quota".into()).into();
        assert!(matches!(service, RecognitionError::Service(_)));

        let unavailable: RecognitionError = BridgeError::NotAvailable("sdk".into()).into();
        assert!(matches!(unavailable, RecognitionError::Service(_)));
    }
}
