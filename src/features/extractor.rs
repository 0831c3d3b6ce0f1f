//! Waveform → speech-only log-mel features → fixed-length windows.

use crate::audio::vad::VoiceActivitySegmenter;
use crate::audio::wav::{Waveform, bytes_to_samples};
use crate::config::FeederConfig;
use crate::defaults;
use crate::error::Result;
use crate::features::fbank::LogMelFilterbank;
use crate::features::window::windowize;
use ndarray::{Array2, Array3};
use std::path::Path;
use tracing::debug;

/// Converts waveforms into d-vector input windows.
#[derive(Clone)]
pub struct FeatureExtractor {
    segmenter: VoiceActivitySegmenter,
    window_frames: usize,
    overlap_ratio: f64,
    num_filters: usize,
}

impl FeatureExtractor {
    /// Creates an extractor from the feeder configuration.
    pub fn new(config: &FeederConfig) -> Result<Self> {
        Ok(Self {
            segmenter: VoiceActivitySegmenter::from_settings(&config.vad)?,
            window_frames: config.window_frames(),
            overlap_ratio: config.overlap_ratio,
            num_filters: defaults::NUM_FILTERS,
        })
    }

    /// Replaces the voice activity segmenter.
    pub fn with_segmenter(mut self, segmenter: VoiceActivitySegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn window_frames(&self) -> usize {
        self.window_frames
    }

    /// Speech-only log-mel features for an in-memory waveform.
    ///
    /// Non-speech audio is discarded before feature extraction, so a waveform
    /// with no detected speech yields a zero-row matrix.
    pub fn log_mel(&self, wave: &Waveform) -> Result<Array2<f32>> {
        let speech = self
            .segmenter
            .segment(&wave.to_pcm_bytes(), wave.sample_rate)?;
        let samples = bytes_to_samples(&speech);
        let fbank = LogMelFilterbank::new(wave.sample_rate, self.num_filters)?;
        Ok(fbank.compute(&samples))
    }

    /// Speech-only log-mel features for a WAV file.
    pub fn extract(&self, path: &Path) -> Result<Array2<f32>> {
        let wave = Waveform::open(path)?;
        self.log_mel(&wave)
    }

    /// Fixed-length, optionally overlapping windows for a WAV file,
    /// shaped `[windows, window_frames, filters]`.
    pub fn dvectors(&self, path: &Path) -> Result<Array3<f32>> {
        let features = self.extract(path)?;
        let windows = windowize(features.view(), self.window_frames, self.overlap_ratio)?;
        debug!(
            path = %path.display(),
            frames = features.nrows(),
            windows = windows.len_of(ndarray::Axis(0)),
            "Extracted d-vector windows"
        );
        Ok(windows)
    }
}
