//! # Recognition Client
//!
//! Adapter between the session state machine and the host's
//! [`RecognitionService`]. It tags every submission with a request id,
//! normalizes service failures into [`RecognitionError`] and applies the
//! confidence threshold. It never retries; retry is the caller's policy.

use crate::error::{RecognitionError, Result};
use bridge_traits::{AudioSnippet, RecognitionOutcome, RecognitionRequestId, RecognitionService};
use core_runtime::config::RecognitionConfig;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

#[derive(Clone)]
pub struct RecognitionClient {
    service: Arc<dyn RecognitionService>,
    min_confidence: f64,
}

impl RecognitionClient {
    pub fn new(service: Arc<dyn RecognitionService>) -> Self {
        Self {
            service,
            min_confidence: 0.0,
        }
    }

    pub fn from_config(service: Arc<dyn RecognitionService>, config: &RecognitionConfig) -> Self {
        Self::new(service).with_min_confidence(config.min_confidence)
    }

    /// Matches scoring below `min_confidence` are reported as no match.
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence.clamp(0.0, 1.0);
        self
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    /// Submit a snippet and wait for the verdict.
    ///
    /// # Errors
    /// - `SnippetUnavailable` for an empty snippet (nothing is sent)
    /// - `Network` when the service could not be reached
    /// - `Service` when it failed the request or reported a confidence
    ///   outside `[0, 1]`
    #[instrument(skip(self, snippet), fields(request_id = %request_id))]
    pub async fn submit(
        &self,
        request_id: RecognitionRequestId,
        snippet: AudioSnippet,
    ) -> Result<RecognitionOutcome> {
        if snippet.is_empty() {
            return Err(RecognitionError::SnippetUnavailable(
                "captured snippet is empty".to_string(),
            ));
        }

        debug!(
            bytes = snippet.pcm.len(),
            sample_rate = snippet.sample_rate,
            "Submitting snippet"
        );
        let outcome = self.service.submit(request_id, snippet).await?;

        match outcome {
            RecognitionOutcome::Matched(matched) => {
                if !(0.0..=1.0).contains(&matched.confidence) {
                    return Err(RecognitionError::Service(format!(
                        "confidence {} outside [0, 1]",
                        matched.confidence
                    )));
                }
                if matched.title.trim().is_empty() {
                    return Err(RecognitionError::Service(
                        "match without a title".to_string(),
                    ));
                }
                if matched.confidence < self.min_confidence {
                    debug!(
                        confidence = matched.confidence,
                        threshold = self.min_confidence,
                        "Match below confidence threshold"
                    );
                    return Ok(RecognitionOutcome::NoMatch);
                }
                Ok(RecognitionOutcome::Matched(matched))
            }
            RecognitionOutcome::NoMatch => Ok(RecognitionOutcome::NoMatch),
        }
    }

    /// Ask the service to drop a submission. Failures are logged only.
    pub async fn cancel(&self, request_id: RecognitionRequestId) {
        if let Err(e) = self.service.cancel(request_id).await {
            warn!(%request_id, error = %e, "Recognition cancel failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{BridgeError, MatchedTrack, SnippetWindow};
    use bytes::Bytes;
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Service {}

        #[async_trait::async_trait]
        impl RecognitionService for Service {
            async fn submit(
                &self,
                request_id: RecognitionRequestId,
                snippet: AudioSnippet,
            ) -> bridge_traits::error::Result<RecognitionOutcome>;
            async fn cancel(&self, request_id: RecognitionRequestId) -> bridge_traits::error::Result<()>;
        }
    }

    fn snippet() -> AudioSnippet {
        AudioSnippet::new(
            Bytes::from_static(&[0, 1, 0, 1]),
            8_000,
            1,
            SnippetWindow::new(Duration::ZERO, Duration::from_secs(5)),
        )
    }

    fn matched(confidence: f64) -> RecognitionOutcome {
        RecognitionOutcome::Matched(MatchedTrack {
            title: "Song".to_string(),
            artist: Some("Band".to_string()),
            album: None,
            external_id: None,
            confidence,
        })
    }

    fn client_returning(outcome: bridge_traits::error::Result<RecognitionOutcome>) -> RecognitionClient {
        let mut service = MockService::new();
        let mut outcome = Some(outcome);
        service
            .expect_submit()
            .times(1)
            .returning(move |_, _| outcome.take().unwrap_or(Ok(RecognitionOutcome::NoMatch)));
        RecognitionClient::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_match_passes_through() {
        let client = client_returning(Ok(matched(0.8)));
        let outcome = client.submit(RecognitionRequestId::new(), snippet()).await;
        assert_eq!(outcome, Ok(matched(0.8)));
    }

    #[tokio::test]
    async fn test_low_confidence_is_no_match() {
        let client = client_returning(Ok(matched(0.4))).with_min_confidence(0.5);
        let outcome = client.submit(RecognitionRequestId::new(), snippet()).await;
        assert_eq!(outcome, Ok(RecognitionOutcome::NoMatch));
    }

    #[tokio::test]
    async fn test_out_of_range_confidence_is_service_error() {
        let client = client_returning(Ok(matched(1.2)));
        let outcome = client.submit(RecognitionRequestId::new(), snippet()).await;
        assert!(matches!(outcome, Err(RecognitionError::Service(_))));
    }

    #[tokio::test]
    async fn test_transport_failure_is_network_error() {
        let client = client_returning(Err(BridgeError::Network("offline".into())));
        let outcome = client.submit(RecognitionRequestId::new(), snippet()).await;
        assert!(matches!(outcome, Err(RecognitionError::Network(_))));
    }

    #[tokio::test]
    async fn test_empty_snippet_is_not_submitted() {
        let mut service = MockService::new();
        service.expect_submit().times(0);
        let client = RecognitionClient::new(Arc::new(service));

        let empty = AudioSnippet::new(
            Bytes::new(),
            8_000,
            1,
            SnippetWindow::new(Duration::ZERO, Duration::from_secs(5)),
        );
        let outcome = client.submit(RecognitionRequestId::new(), empty).await;
        assert!(matches!(outcome, Err(RecognitionError::SnippetUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cancel_failure_is_swallowed() {
        let mut service = MockService::new();
        service
            .expect_cancel()
            .times(1)
            .returning(|_| Err(BridgeError::Service("unknown request".into())));
        let client = RecognitionClient::new(Arc::new(service));

        client.cancel(RecognitionRequestId::new()).await;
    }

    #[test]
    fn test_threshold_from_config() {
        let config = RecognitionConfig {
            min_confidence: 0.7,
            ..RecognitionConfig::default()
        };
        let client = RecognitionClient::from_config(Arc::new(MockService::new()), &config);
        assert_eq!(client.min_confidence(), 0.7);
    }
}
