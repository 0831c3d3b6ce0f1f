//! Voice Activity Detection (VAD) segmentation.
//!
//! Splits a 16-bit PCM waveform into fixed-duration frames, classifies each
//! frame as voiced or not, and collects voiced runs into speech segments using
//! a padded ring buffer so that short pauses do not fragment a run and short
//! voiced bursts in silence are dropped.

use crate::audio::wav::bytes_to_samples;
use crate::config::VadSettings;
use crate::defaults;
use crate::error::{FeederError, Result};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;

/// Frame-level voice / non-voice decision.
///
/// Implementations are treated as black boxes by the segmenter.
pub trait VoiceClassifier: Send + Sync {
    /// Returns true if the frame contains speech.
    fn is_speech(&self, samples: &[i16], sample_rate: u32) -> Result<bool>;
}

/// RMS-energy classifier with webrtc-style aggressiveness levels.
#[derive(Debug, Clone, Copy)]
pub struct EnergyClassifier {
    threshold: f32,
}

impl EnergyClassifier {
    /// Creates a classifier for aggressiveness 0 (least) to 3 (most aggressive).
    pub fn new(aggressiveness: u8) -> Result<Self> {
        let threshold = defaults::VAD_RMS_THRESHOLDS
            .get(aggressiveness as usize)
            .copied()
            .ok_or_else(|| FeederError::ConfigInvalidValue {
                key: "vad.aggressiveness".to_string(),
                message: format!("{} is outside 0..=3", aggressiveness),
            })?;
        Ok(Self { threshold })
    }

    /// Creates a classifier with an explicit RMS threshold (0.0 to 1.0).
    pub fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl VoiceClassifier for EnergyClassifier {
    fn is_speech(&self, samples: &[i16], _sample_rate: u32) -> Result<bool> {
        Ok(calculate_rms(samples) > self.threshold)
    }
}

/// Calculates the Root Mean Square (RMS) of audio samples.
///
/// # Returns
/// Normalized RMS value (0.0 to 1.0), where:
/// - 0.0 represents silence
/// - ~0.707 represents a full-scale sine wave
/// - 1.0 represents maximum amplitude
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

/// One fixed-duration slice of PCM bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame<'a> {
    pub bytes: &'a [u8],
    /// Start time in seconds.
    pub timestamp: f64,
    /// Duration in seconds.
    pub duration: f64,
}

/// Splits PCM bytes into whole frames of `frame_ms`. A trailing partial frame is dropped.
pub fn frames(pcm: &[u8], sample_rate: u32, frame_ms: u32) -> Vec<Frame<'_>> {
    let frame_bytes = (sample_rate as usize * frame_ms as usize / 1000) * 2;
    if frame_bytes == 0 {
        return Vec::new();
    }
    let duration = (frame_bytes / 2) as f64 / sample_rate as f64;

    pcm.chunks_exact(frame_bytes)
        .enumerate()
        .map(|(i, bytes)| Frame {
            bytes,
            timestamp: i as f64 * duration,
            duration,
        })
        .collect()
}

/// A contiguous run of speech.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Little-endian 16-bit PCM bytes.
    pub pcm: Vec<u8>,
}

/// Splits waveforms into speech-only audio.
#[derive(Clone)]
pub struct VoiceActivitySegmenter {
    classifier: Arc<dyn VoiceClassifier>,
    frame_ms: u32,
    padding_ms: u32,
}

impl VoiceActivitySegmenter {
    /// Creates a segmenter with an explicit classifier.
    pub fn new(classifier: Arc<dyn VoiceClassifier>, frame_ms: u32, padding_ms: u32) -> Self {
        Self {
            classifier,
            frame_ms,
            padding_ms,
        }
    }

    /// Creates a segmenter with the energy classifier at the configured aggressiveness.
    pub fn from_settings(settings: &VadSettings) -> Result<Self> {
        let classifier = EnergyClassifier::new(settings.aggressiveness)?;
        Ok(Self::new(
            Arc::new(classifier),
            settings.frame_ms,
            settings.padding_ms,
        ))
    }

    /// Returns every retained speech segment in temporal order.
    pub fn segments(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<SpeechSegment>> {
        let ring_len = ((self.padding_ms / self.frame_ms.max(1)) as usize).max(1);
        let trigger = defaults::VAD_TRIGGER_RATIO * ring_len as f32;

        let mut ring: VecDeque<(Frame<'_>, bool)> = VecDeque::with_capacity(ring_len);
        let mut voiced: Vec<Frame<'_>> = Vec::new();
        let mut triggered = false;
        let mut segments = Vec::new();

        for frame in frames(pcm, sample_rate, self.frame_ms) {
            let is_speech = self
                .classifier
                .is_speech(&bytes_to_samples(frame.bytes), sample_rate)?;

            if ring.len() == ring_len {
                ring.pop_front();
            }
            if triggered {
                voiced.push(frame.clone());
            }
            ring.push_back((frame, is_speech));

            if !triggered {
                let num_voiced = ring.iter().filter(|(_, speech)| *speech).count();
                if num_voiced as f32 > trigger {
                    triggered = true;
                    voiced.extend(ring.drain(..).map(|(f, _)| f));
                }
            } else {
                let num_unvoiced = ring.iter().filter(|(_, speech)| !*speech).count();
                if num_unvoiced as f32 > trigger {
                    triggered = false;
                    segments.push(join_frames(&voiced));
                    voiced.clear();
                    ring.clear();
                }
            }
        }

        if !voiced.is_empty() {
            segments.push(join_frames(&voiced));
        }

        trace!(
            segments = segments.len(),
            sample_rate, "VAD collected speech segments"
        );
        Ok(segments)
    }

    /// Concatenates all retained speech into one continuous waveform.
    ///
    /// Returns an empty buffer when no speech is retained.
    pub fn segment(&self, pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
        let segments = self.segments(pcm, sample_rate)?;
        Ok(segments.into_iter().flat_map(|s| s.pcm).collect())
    }
}

fn join_frames(frames: &[Frame<'_>]) -> SpeechSegment {
    let start = frames.first().map(|f| f.timestamp).unwrap_or(0.0);
    let end = frames
        .last()
        .map(|f| f.timestamp + f.duration)
        .unwrap_or(start);
    let pcm = frames.iter().flat_map(|f| f.bytes.iter().copied()).collect();
    SpeechSegment { start, end, pcm }
}
