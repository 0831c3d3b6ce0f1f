//! dvfeed - training-data feeder for d-vector speaker embeddings
//!
//! Turns per-utterance feature caches into speaker-balanced batches and raw
//! WAV pairs into fixed-length feature windows, delivered by a background
//! producer over a bounded queue.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod features;
pub mod feeder;
pub mod pipeline;
pub mod preprocess;
pub mod sampler;

// Collaborator traits
pub use audio::vad::VoiceClassifier;
pub use cache::FeatureStore;

// Orchestration
pub use feeder::{Feeder, Mode};
pub use pipeline::producer::{FeederHandle, Producer, ProducerRunner};
pub use pipeline::types::{FeederItem, TestPair, TrainBatch};

// Error handling
pub use error::{FeederError, Result};

// Config
pub use config::FeederConfig;

// Producer error classification
pub use pipeline::error::{ErrorReporter, StationError};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_has_hash_suffix_only_with_git_hash() {
        let ver = version_string();
        match option_env!("GIT_HASH") {
            Some(hash) if !hash.is_empty() => assert_eq!(ver.split('+').nth(1), Some(hash)),
            _ => assert_eq!(ver, env!("CARGO_PKG_VERSION")),
        }
    }
}
