use crate::defaults;
use crate::error::{FeederError, Result};
use crate::features::num_window_frames;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration for a feeder instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeederConfig {
    /// Window duration in seconds.
    pub segment_length: f64,
    /// Fractional overlap between consecutive windows, in [0, 1).
    pub overlap_ratio: f64,
    pub num_spk_per_batch: usize,
    pub num_utt_per_batch: usize,
    /// Feature cache root; train mode reads `<in_dir>/<data_type>`.
    pub in_dir: PathBuf,
    /// Directory of `*.wav` files for test mode.
    pub test_dir: PathBuf,
    pub vad: VadSettings,
    pub queue: QueueSettings,
}

/// Voice activity segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VadSettings {
    pub aggressiveness: u8,
    pub frame_ms: u32,
    pub padding_ms: u32,
}

/// Producer queue sizing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueSettings {
    pub train_high_water: usize,
    pub test_high_water: usize,
    pub poll_interval_ms: u64,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            segment_length: defaults::SEGMENT_LENGTH_SECS,
            overlap_ratio: defaults::OVERLAP_RATIO,
            num_spk_per_batch: defaults::NUM_SPK_PER_BATCH,
            num_utt_per_batch: defaults::NUM_UTT_PER_BATCH,
            in_dir: PathBuf::from("data/features"),
            test_dir: PathBuf::from("data/test"),
            vad: VadSettings::default(),
            queue: QueueSettings::default(),
        }
    }
}

impl Default for VadSettings {
    fn default() -> Self {
        Self {
            aggressiveness: defaults::VAD_AGGRESSIVENESS,
            frame_ms: defaults::VAD_FRAME_MS,
            padding_ms: defaults::VAD_PADDING_MS,
        }
    }
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            train_high_water: defaults::TRAIN_HIGH_WATER,
            test_high_water: defaults::TEST_HIGH_WATER,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl FeederConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: FeederConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if the file doesn't exist
    ///
    /// Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DVFEED_IN_DIR → in_dir
    /// - DVFEED_TEST_DIR → test_dir
    /// - DVFEED_SEGMENT_LENGTH → segment_length (ignored if not a number)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var("DVFEED_IN_DIR")
            && !dir.is_empty()
        {
            self.in_dir = PathBuf::from(dir);
        }

        if let Ok(dir) = std::env::var("DVFEED_TEST_DIR")
            && !dir.is_empty()
        {
            self.test_dir = PathBuf::from(dir);
        }

        if let Ok(secs) = std::env::var("DVFEED_SEGMENT_LENGTH")
            && let Ok(secs) = secs.parse::<f64>()
        {
            self.segment_length = secs;
        }

        self
    }

    /// Default configuration file path (`~/.config/dvfeed/config.toml` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("dvfeed").join("config.toml"))
    }

    /// Number of feature frames in one window.
    pub fn window_frames(&self) -> usize {
        num_window_frames(self.segment_length)
    }

    /// Rejects values that would make batching or windowing ill-defined.
    pub fn validate(&self) -> Result<()> {
        if !self.segment_length.is_finite() || self.window_frames() == 0 {
            return Err(invalid(
                "segment_length",
                format!("{} s yields no frames", self.segment_length),
            ));
        }
        if !(0.0..1.0).contains(&self.overlap_ratio) {
            return Err(invalid(
                "overlap_ratio",
                format!("{} is outside [0, 1)", self.overlap_ratio),
            ));
        }
        if self.num_spk_per_batch == 0 {
            return Err(invalid("num_spk_per_batch", "must be at least 1"));
        }
        if self.num_utt_per_batch == 0 {
            return Err(invalid("num_utt_per_batch", "must be at least 1"));
        }
        if self.vad.aggressiveness as usize >= defaults::VAD_RMS_THRESHOLDS.len() {
            return Err(invalid(
                "vad.aggressiveness",
                format!("{} is outside 0..=3", self.vad.aggressiveness),
            ));
        }
        if self.vad.frame_ms == 0 {
            return Err(invalid("vad.frame_ms", "must be positive"));
        }
        if self.vad.padding_ms < self.vad.frame_ms {
            return Err(invalid(
                "vad.padding_ms",
                "must be at least one VAD frame long",
            ));
        }
        if self.queue.train_high_water == 0 || self.queue.test_high_water == 0 {
            return Err(invalid("queue", "high-water marks must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(key: &str, message: impl Into<String>) -> FeederError {
    FeederError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.into(),
    }
}
