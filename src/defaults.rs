//! Default configuration constants for dvfeed.
//!
//! Shared by the config layer, the feature pipeline and the producer loop so
//! that every component agrees on frame geometry and queue sizing.

/// Feature frame rate in frames per second (10 ms frame step).
pub const FRAME_RATE_HZ: f64 = 100.0;

/// Number of log-mel filterbank channels per frame.
pub const NUM_FILTERS: usize = 40;

/// Analysis window length for the filterbank, in seconds.
pub const FBANK_WINDOW_SECS: f64 = 0.025;

/// Analysis hop length for the filterbank, in seconds.
pub const FBANK_STEP_SECS: f64 = 0.01;

/// Minimum FFT size for the filterbank.
pub const FBANK_MIN_NFFT: usize = 512;

/// Pre-emphasis filter coefficient.
pub const PREEMPHASIS: f64 = 0.97;

/// Default segment (window) length in seconds.
///
/// 1.6 s at 100 frames/s gives 160-frame windows.
pub const SEGMENT_LENGTH_SECS: f64 = 1.6;

/// Default fractional overlap between consecutive windows.
pub const OVERLAP_RATIO: f64 = 0.5;

/// Default number of speakers per training batch.
pub const NUM_SPK_PER_BATCH: usize = 64;

/// Default number of utterances sampled per speaker per training batch.
pub const NUM_UTT_PER_BATCH: usize = 10;

/// Duration of a single VAD classification frame in milliseconds.
pub const VAD_FRAME_MS: u32 = 30;

/// Hangover window for the VAD collector in milliseconds.
///
/// Brief pauses shorter than this do not split a speech run, and short voiced
/// bursts surrounded by silence never fill it enough to trigger.
pub const VAD_PADDING_MS: u32 = 300;

/// Default VAD aggressiveness (0 = least, 3 = most aggressive at rejecting non-speech).
pub const VAD_AGGRESSIVENESS: u8 = 1;

/// RMS speech thresholds indexed by aggressiveness.
pub const VAD_RMS_THRESHOLDS: [f32; 4] = [0.005, 0.01, 0.02, 0.03];

/// Fraction of the padding ring that must agree before the collector changes state.
pub const VAD_TRIGGER_RATIO: f32 = 0.9;

/// Queue high-water mark for training batches.
pub const TRAIN_HIGH_WATER: usize = 10;

/// Queue high-water mark for test pairs.
pub const TEST_HIGH_WATER: usize = 100;

/// How often a blocked producer re-checks its stop flag, in milliseconds.
pub const POLL_INTERVAL_MS: u64 = 100;

/// File extension of feature cache entries.
pub const CACHE_EXTENSION: &str = "json";

/// File extension of raw test waveforms.
pub const WAV_EXTENSION: &str = "wav";
