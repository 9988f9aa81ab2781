//! Audio snapshot capture for recognition.
//!
//! Recognition services want a short PCM sample of what is playing. Hosts
//! usually have one at hand already (the engine's decode buffer, a tap on the
//! output mix), so the core asks for it through [`AudioSampler`] instead of
//! decoding audio on its own.

use crate::error::Result;
use crate::playback::AudioSource;
use bytes::Bytes;
use std::time::Duration;

/// Window within a source that should be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnippetWindow {
    /// Offset from the start of the source.
    pub offset: Duration,
    /// Length of the capture.
    pub duration: Duration,
}

impl SnippetWindow {
    pub fn new(offset: Duration, duration: Duration) -> Self {
        Self { offset, duration }
    }
}

/// Captured PCM snippet ready to be submitted for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSnippet {
    /// Interleaved signed 16-bit little-endian PCM.
    pub pcm: Bytes,
    /// Sample rate in hertz.
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
    /// Window the samples were taken from.
    pub window: SnippetWindow,
}

impl AudioSnippet {
    pub fn new(pcm: Bytes, sample_rate: u32, channels: u16, window: SnippetWindow) -> Self {
        Self {
            pcm,
            sample_rate,
            channels,
            window,
        }
    }

    /// Duration actually covered by the PCM payload.
    pub fn captured_duration(&self) -> Duration {
        let bytes_per_second = self.sample_rate as u64 * self.channels as u64 * 2;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(self.pcm.len() as u64 * 1_000_000 / bytes_per_second)
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }
}

/// Host hook that captures a PCM snapshot of a source.
#[async_trait::async_trait]
pub trait AudioSampler: Send + Sync {
    /// Capture `window` from `source`. Implementations may return fewer
    /// samples than requested when the source is shorter than the window.
    async fn capture(&self, source: &AudioSource, window: SnippetWindow) -> Result<AudioSnippet>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_duration_from_payload() {
        // one second of 16-bit stereo at 8 kHz
        let pcm = Bytes::from(vec![0u8; 8_000 * 2 * 2]);
        let window = SnippetWindow::new(Duration::ZERO, Duration::from_secs(5));
        let snippet = AudioSnippet::new(pcm, 8_000, 2, window);
        assert_eq!(snippet.captured_duration(), Duration::from_secs(1));
        assert!(!snippet.is_empty());
    }

    #[test]
    fn zero_rate_snippet_has_no_duration() {
        let window = SnippetWindow::new(Duration::ZERO, Duration::from_secs(5));
        let snippet = AudioSnippet::new(Bytes::from_static(&[1, 2]), 0, 1, window);
        assert_eq!(snippet.captured_duration(), Duration::ZERO);
    }
}
