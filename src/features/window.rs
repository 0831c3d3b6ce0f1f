//! Fixed-length windowing of feature matrices.

use crate::defaults;
use crate::error::{FeederError, Result};
use ndarray::{Array2, Array3, ArrayView2, s};
use rand::Rng;

/// Number of frames in a window of `segment_length` seconds.
pub fn num_window_frames(segment_length: f64) -> usize {
    (segment_length * defaults::FRAME_RATE_HZ).round() as usize
}

/// Number of full windows that fit in `total_frames`.
///
/// `floor((total - overlap) / (window - overlap))` with
/// `overlap = window * overlap_ratio`; zero when the input is shorter than one window.
pub fn window_count(total_frames: usize, window_frames: usize, overlap_ratio: f64) -> usize {
    if window_frames == 0 || total_frames < window_frames {
        return 0;
    }
    let overlap = window_frames as f64 * overlap_ratio;
    let stride = window_frames as f64 - overlap;
    if stride <= 0.0 {
        return 0;
    }
    ((total_frames as f64 - overlap) / stride).floor() as usize
}

/// Start offsets of each window.
pub fn window_starts(total_frames: usize, window_frames: usize, overlap_ratio: f64) -> Vec<usize> {
    let stride = window_frames as f64 - window_frames as f64 * overlap_ratio;
    (0..window_count(total_frames, window_frames, overlap_ratio))
        .map(|i| (stride * i as f64) as usize)
        .collect()
}

/// Slices `features` into `[count, window_frames, channels]` overlapping windows.
///
/// A trailing partial window is dropped. Fails with `NoUsableWindows` when not
/// even one full window fits.
pub fn windowize(
    features: ArrayView2<'_, f32>,
    window_frames: usize,
    overlap_ratio: f64,
) -> Result<Array3<f32>> {
    let (total_frames, channels) = features.dim();
    let starts = window_starts(total_frames, window_frames, overlap_ratio);
    if starts.is_empty() {
        return Err(FeederError::NoUsableWindows {
            total_frames,
            window_frames,
        });
    }

    let mut windows = Array3::<f32>::zeros((starts.len(), window_frames, channels));
    for (i, &start) in starts.iter().enumerate() {
        windows
            .slice_mut(s![i, .., ..])
            .assign(&features.slice(s![start..start + window_frames, ..]));
    }
    Ok(windows)
}

/// Copies one uniformly placed `window_frames` crop out of `features`.
///
/// Start offsets are drawn from `0..=total - window`. Returns `None` when the
/// matrix is shorter than the crop.
pub fn random_crop<R: Rng>(
    features: ArrayView2<'_, f32>,
    window_frames: usize,
    rng: &mut R,
) -> Option<Array2<f32>> {
    let total_frames = features.nrows();
    if window_frames == 0 || total_frames < window_frames {
        return None;
    }
    let start = rng.gen_range(0..=total_frames - window_frames);
    Some(
        features
            .slice(s![start..start + window_frames, ..])
            .to_owned(),
    )
}
