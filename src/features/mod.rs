//! Log-mel feature extraction and fixed-length windowing.

pub mod extractor;
pub mod fbank;
pub mod window;

pub use extractor::FeatureExtractor;
pub use fbank::LogMelFilterbank;
pub use window::{num_window_frames, random_crop, window_count, windowize};
