//! Integration tests for the logging helpers and configuration surface

use bridge_traits::time::LogLevel;
use core_runtime::config::CoreConfig;
use core_runtime::logging::{redact_if_sensitive, strip_path, LogFormat, LoggingConfig};
use std::time::Duration;

#[test]
fn test_logging_config_chaining() {
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Warn)
        .with_pii_redaction(false)
        .with_spans(false)
        .with_target(false)
        .with_thread_info(true);

    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.level, LogLevel::Warn);
    assert!(!config.redact_pii);
    assert!(!config.enable_spans);
    assert!(!config.display_target);
    assert!(config.display_thread_info);
}

#[test]
fn test_redaction_of_service_credentials() {
    assert_eq!(redact_if_sensitive("api_key", "ak_live_123"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("access_token", "ya29.x"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "s"), "[REDACTED]");

    // Identifiers and titles pass through unchanged
    assert_eq!(redact_if_sensitive("track_id", "12345"), "12345");
    assert_eq!(redact_if_sensitive("title", "Song Name"), "Song Name");
}

#[test]
fn test_locator_stripping() {
    assert_eq!(strip_path("/storage/emulated/0/Music/song.mp3"), "song.mp3");
    assert_eq!(strip_path("D:\\data\\file.flac"), "file.flac");
    assert_eq!(strip_path("filename.ogg"), "filename.ogg");
}

#[test]
fn test_config_round_trips_through_json() {
    let config = CoreConfig::builder()
        .database_path("/data/earmark.db")
        .recognition_timeout(Duration::from_secs(12))
        .position_poll_interval(None)
        .build()
        .unwrap();

    let json = serde_json::to_string(&config).unwrap();
    let restored: CoreConfig = serde_json::from_str(&json).unwrap();

    assert_eq!(restored, config);
    assert!(restored.validate().is_ok());
}
