//! Log-mel filterbank features.
//!
//! Produces a `[frames, filters]` matrix at a fixed 100 frames/s from 16-bit
//! PCM at any sample rate: pre-emphasis, 25 ms rectangular frames with a 10 ms
//! hop, power spectrum, triangular mel filters, natural log.

use crate::defaults;
use crate::error::{FeederError, Result};
use ndarray::Array2;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use std::sync::Arc;
use tracing::debug;

/// Log-mel filterbank for one sample rate.
pub struct LogMelFilterbank {
    sample_rate: u32,
    frame_len: usize,
    frame_step: usize,
    nfft: usize,
    /// Triangular filters, `[num_filters, nfft / 2 + 1]`.
    filters: Array2<f64>,
    fft: Arc<dyn Fft<f64>>,
}

impl LogMelFilterbank {
    /// Creates a filterbank with `num_filters` channels for `sample_rate`.
    pub fn new(sample_rate: u32, num_filters: usize) -> Result<Self> {
        if sample_rate == 0 || num_filters == 0 {
            return Err(FeederError::ConfigInvalidValue {
                key: "filterbank".to_string(),
                message: format!(
                    "sample_rate ({}) and num_filters ({}) must be positive",
                    sample_rate, num_filters
                ),
            });
        }

        let frame_len = round_half_up(defaults::FBANK_WINDOW_SECS * sample_rate as f64);
        let frame_step = round_half_up(defaults::FBANK_STEP_SECS * sample_rate as f64).max(1);
        let nfft = frame_len.next_power_of_two().max(defaults::FBANK_MIN_NFFT);
        let filters = mel_filters(num_filters, nfft, sample_rate);
        let fft = FftPlanner::new().plan_fft_forward(nfft);

        debug!(
            sample_rate,
            frame_len, frame_step, nfft, num_filters, "Log-mel filterbank initialized"
        );

        Ok(Self {
            sample_rate,
            frame_len,
            frame_step,
            nfft,
            filters,
            fft,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn num_filters(&self) -> usize {
        self.filters.nrows()
    }

    /// Number of frames produced for `num_samples` input samples.
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            0
        } else if num_samples <= self.frame_len {
            1
        } else {
            1 + (num_samples - self.frame_len).div_ceil(self.frame_step)
        }
    }

    /// Computes the log-mel matrix. Empty input yields a zero-row matrix.
    pub fn compute(&self, samples: &[i16]) -> Array2<f32> {
        let num_frames = self.num_frames(samples.len());
        let num_bins = self.nfft / 2 + 1;
        if num_frames == 0 {
            return Array2::zeros((0, self.num_filters()));
        }

        let emphasized = preemphasis(samples);
        let mut power = Array2::<f64>::zeros((num_frames, num_bins));
        let mut buffer = vec![Complex::new(0.0, 0.0); self.nfft];
        let mut scratch = vec![Complex::new(0.0, 0.0); self.fft.get_inplace_scratch_len()];

        for frame_idx in 0..num_frames {
            let start = frame_idx * self.frame_step;
            // Frames past the end of the signal are zero padded
            for (i, slot) in buffer.iter_mut().enumerate() {
                let value = if i < self.frame_len {
                    emphasized.get(start + i).copied().unwrap_or(0.0)
                } else {
                    0.0
                };
                *slot = Complex::new(value, 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (bin, c) in buffer.iter().take(num_bins).enumerate() {
                power[[frame_idx, bin]] = c.norm_sqr() / self.nfft as f64;
            }
        }

        power
            .dot(&self.filters.t())
            .mapv(|energy| {
                if energy <= 0.0 {
                    f64::EPSILON.ln() as f32
                } else {
                    energy.ln() as f32
                }
            })
    }
}

fn round_half_up(value: f64) -> usize {
    (value + 0.5).floor() as usize
}

fn preemphasis(samples: &[i16]) -> Vec<f64> {
    let mut out = Vec::with_capacity(samples.len());
    let mut previous = 0.0;
    for (i, &s) in samples.iter().enumerate() {
        let current = s as f64;
        out.push(if i == 0 {
            current
        } else {
            current - defaults::PREEMPHASIS * previous
        });
        previous = current;
    }
    out
}

fn hz_to_mel(hz: f64) -> f64 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f64) -> f64 {
    700.0 * (10f64.powf(mel / 2595.0) - 1.0)
}

/// Triangular mel filters spanning 0 Hz to Nyquist.
fn mel_filters(num_filters: usize, nfft: usize, sample_rate: u32) -> Array2<f64> {
    let num_bins = nfft / 2 + 1;
    let high_mel = hz_to_mel(sample_rate as f64 / 2.0);
    let bins: Vec<usize> = (0..num_filters + 2)
        .map(|i| {
            let mel = high_mel * i as f64 / (num_filters + 1) as f64;
            ((nfft + 1) as f64 * mel_to_hz(mel) / sample_rate as f64).floor() as usize
        })
        .collect();

    let mut filters = Array2::<f64>::zeros((num_filters, num_bins));
    for j in 0..num_filters {
        let (left, center, right) = (bins[j], bins[j + 1], bins[j + 2]);
        for i in left..center.min(num_bins) {
            filters[[j, i]] = (i - left) as f64 / (center - left) as f64;
        }
        for i in center..right.min(num_bins) {
            filters[[j, i]] = (right - i) as f64 / (right - center) as f64;
        }
    }
    filters
}
