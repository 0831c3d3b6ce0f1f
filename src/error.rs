//! Error types for dvfeed.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeederError {
    // Mode / configuration errors
    #[error("Unsupported feeder mode: {mode} (expected train, test or infer)")]
    UnsupportedMode { mode: String },

    #[error("Train mode requires a data subset (e.g. train, validation)")]
    MissingDataType,

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio input errors
    #[error("Failed to read WAV file {path}: {message}")]
    Wav { path: String, message: String },

    #[error("Unsupported audio format in {path}: {message}")]
    AudioFormat { path: String, message: String },

    // Feature cache errors
    #[error("Malformed feature cache entry {id}: {message}")]
    CacheFormat { id: String, message: String },

    #[error("Feature cache serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No speakers found in feature cache {path}")]
    EmptyRoster { path: String },

    #[error("No speaker in {path} has the {required} utterances a batch needs")]
    NoValidSpeakers { path: String, required: usize },

    #[error("No test WAV pairs found in {path}")]
    NoTestPairs { path: String },

    // Windowing errors
    #[error("No usable windows: {total_frames} frames is shorter than a {window_frames}-frame window")]
    NoUsableWindows {
        total_frames: usize,
        window_frames: usize,
    },

    #[error(
        "Utterance {id} has {total_frames} frames, fewer than the {window_frames}-frame crop length"
    )]
    UtteranceTooShort {
        id: String,
        total_frames: usize,
        window_frames: usize,
    },

    #[error("Tensor shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    // Producer / consumer errors
    #[error("Producer exhausted: no more items will be produced")]
    Exhausted,

    #[error("Producer failed: {message}")]
    ProducerFailed { message: String },

    #[error("Producer stopped")]
    Stopped,

    #[error("Operation needs a {expected} feeder, this one is in {actual} mode")]
    WrongMode {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Mode {mode} has no background producer")]
    NoProducer { mode: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FeederError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_unsupported_mode_display() {
        let error = FeederError::UnsupportedMode {
            mode: "eval".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Unsupported feeder mode: eval (expected train, test or infer)"
        );
    }

    #[test]
    fn test_config_invalid_value_display() {
        let error = FeederError::ConfigInvalidValue {
            key: "overlap_ratio".to_string(),
            message: "must be in [0, 1)".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for overlap_ratio: must be in [0, 1)"
        );
    }

    #[test]
    fn test_no_usable_windows_display() {
        let error = FeederError::NoUsableWindows {
            total_frames: 90,
            window_frames: 160,
        };
        assert_eq!(
            error.to_string(),
            "No usable windows: 90 frames is shorter than a 160-frame window"
        );
    }

    #[test]
    fn test_utterance_too_short_display() {
        let error = FeederError::UtteranceTooShort {
            id: "id10001_abc_00001".to_string(),
            total_frames: 120,
            window_frames: 160,
        };
        assert!(error.to_string().contains("id10001_abc_00001"));
        assert!(error.to_string().contains("120 frames"));
    }

    #[test]
    fn test_wrong_mode_display() {
        let error = FeederError::WrongMode {
            expected: "train",
            actual: "infer",
        };
        assert_eq!(
            error.to_string(),
            "Operation needs a train feeder, this one is in infer mode"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: FeederError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: FeederError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error: FeederError = json_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<FeederError>();
        assert_sync::<FeederError>();
    }
}
