// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use framepipe::backends::RuntimeBackend;
use framepipe::{PipelineConfig, PipelineError, PixelFormat};
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = PipelineConfig::default();

    assert!(config.validate().is_ok(), "Default config should be valid");
    assert_eq!(config.video_input, None, "Webcam is the default source");
    assert_eq!(config.capture_format, PixelFormat::Rgb);
    assert_eq!(config.pull_timeout(), Duration::from_secs(1));
}

#[test]
fn test_config_webcam_defaults() {
    let caps = PipelineConfig::default().webcam;
    assert_eq!(caps.media_type, "image/jpeg");
    assert_eq!((caps.min_width, caps.max_width), (640, 1280));
    assert_eq!((caps.min_framerate, caps.max_framerate), (10, 30));
}

#[test]
fn test_config_partial_json_takes_defaults() {
    let config = PipelineConfig::from_json(
        r#"{ "video_input": "clip.mp4", "backend": "Synthetic", "capture_format": "BGRA" }"#,
    )
    .unwrap();

    assert_eq!(config.video_input.as_deref(), Some("clip.mp4"));
    assert_eq!(config.backend, RuntimeBackend::Synthetic);
    assert_eq!(config.capture_format, PixelFormat::Bgra);
    assert_eq!(config.title, "framepipe");
    assert_eq!(config.synthetic.width, 640);
}

#[test]
fn test_config_json_round_trip() {
    let mut config = PipelineConfig::default();
    config.webcam_device = Some("/dev/video2".to_string());
    config.synthetic.frame_limit = Some(5);

    let json = config.to_json().unwrap();
    assert_eq!(PipelineConfig::from_json(&json).unwrap(), config);
}

#[test]
fn test_config_rejects_inverted_width_range() {
    let mut config = PipelineConfig::default();
    config.webcam.min_width = 1920;

    assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
}

#[test]
fn test_config_rejects_empty_input_and_zero_timeout() {
    let mut config = PipelineConfig::default();
    config.video_input = Some(String::new());
    assert!(config.validate().is_err());

    let mut config = PipelineConfig::default();
    config.pull_timeout_ms = 0;
    assert!(config.validate().is_err());

    let mut config = PipelineConfig::default();
    config.synthetic.framerate = 0;
    assert!(config.validate().is_err());
}

#[test]
fn test_config_rejects_malformed_json() {
    assert!(PipelineConfig::from_json("{ not json").is_err());
    assert!(PipelineConfig::from_json(r#"{ "capture_format": "NV12" }"#).is_err());
}

#[test]
fn test_config_load_from_file() {
    let path = std::env::temp_dir().join(format!("framepipe-config-{}.json", std::process::id()));
    std::fs::write(&path, r#"{ "title": "preview", "pull_timeout_ms": 250 }"#).unwrap();

    let config = PipelineConfig::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.title, "preview");
    assert_eq!(config.pull_timeout(), Duration::from_millis(250));
}

#[test]
fn test_config_load_missing_file() {
    let err = PipelineConfig::load("/nonexistent/framepipe.json").unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}
