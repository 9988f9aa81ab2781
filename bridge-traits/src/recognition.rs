//! Recognition service boundary.
//!
//! The fingerprinting itself is owned by an external service (ACRCloud,
//! AcoustID, a vendor SDK). The core submits a snippet and receives either
//! matched metadata or an explicit "no match". Transport and service failures
//! surface as [`BridgeError::Network`](crate::BridgeError::Network) and
//! [`BridgeError::Service`](crate::BridgeError::Service) respectively and are
//! never folded into the no-match outcome.

use crate::error::Result;
use crate::sampling::AudioSnippet;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier attached to each submission so it can be cancelled later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecognitionRequestId(Uuid);

impl RecognitionRequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecognitionRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecognitionRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata of a matched recording as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTrack {
    pub title: String,
    pub artist: Option<String>,
    pub album: Option<String>,
    /// Service-side identifier of the recording.
    pub external_id: Option<String>,
    /// Match confidence in `[0, 1]`.
    pub confidence: f64,
}

/// Outcome of a successful round trip to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecognitionOutcome {
    Matched(MatchedTrack),
    NoMatch,
}

/// External fingerprint recognition service.
#[async_trait::async_trait]
pub trait RecognitionService: Send + Sync {
    /// Submit a snippet. The future resolves with the service's verdict.
    async fn submit(
        &self,
        request_id: RecognitionRequestId,
        snippet: AudioSnippet,
    ) -> Result<RecognitionOutcome>;

    /// Ask the service to abandon a submission. Advisory: a response for the
    /// request may still arrive afterwards.
    async fn cancel(&self, request_id: RecognitionRequestId) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::sampling::SnippetWindow;
    use bytes::Bytes;
    use mockall::mock;
    use mockall::predicate::*;
    use std::time::Duration;

    mock! {
        pub Service {}

        #[async_trait::async_trait]
        impl RecognitionService for Service {
            async fn submit(
                &self,
                request_id: RecognitionRequestId,
                snippet: AudioSnippet,
            ) -> Result<RecognitionOutcome>;
            async fn cancel(&self, request_id: RecognitionRequestId) -> Result<()>;
        }
    }

    fn snippet() -> AudioSnippet {
        AudioSnippet::new(
            Bytes::from_static(&[0, 0, 1, 0]),
            44_100,
            1,
            SnippetWindow::new(Duration::ZERO, Duration::from_secs(8)),
        )
    }

    #[tokio::test]
    async fn no_match_is_an_outcome_not_an_error() {
        let mut service = MockService::new();
        service
            .expect_submit()
            .times(1)
            .returning(|_, _| Ok(RecognitionOutcome::NoMatch));

        let outcome = service
            .submit(RecognitionRequestId::new(), snippet())
            .await
            .unwrap();
        assert_eq!(outcome, RecognitionOutcome::NoMatch);
    }

    #[tokio::test]
    async fn network_and_service_failures_stay_distinct() {
        let id = RecognitionRequestId::new();
        let mut service = MockService::new();
        service
            .expect_cancel()
            .with(eq(id))
            .returning(|_| Err(BridgeError::Network("offline".into())));
        service
            .expect_submit()
            .returning(|_, _| Err(BridgeError::Service("quota exceeded".into())));

        let cancel_err = service.cancel(id).await.unwrap_err();
        assert!(cancel_err.is_network());

        let submit_err = service.submit(id, snippet()).await.unwrap_err();
        assert!(!submit_err.is_network());
        assert!(matches!(submit_err, BridgeError::Service(_)));
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RecognitionRequestId::new(), RecognitionRequestId::new());
    }
}
