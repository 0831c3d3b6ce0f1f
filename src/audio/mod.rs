//! Raw waveform input and voice activity segmentation.

pub mod vad;
pub mod wav;

pub use vad::{EnergyClassifier, SpeechSegment, VoiceActivitySegmenter, VoiceClassifier};
pub use wav::Waveform;
