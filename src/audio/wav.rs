//! WAV file input for test and inference waveforms.

use crate::error::{FeederError, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A decoded 16-bit PCM waveform at its native sample rate.
///
/// No resampling happens here; the sample rate is carried through to the
/// VAD and filterbank stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl Waveform {
    /// Opens and decodes a WAV file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FeederError::Wav {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file), &path.display().to_string())
    }

    /// Decodes WAV data from any reader. `label` names the source in errors.
    pub fn from_reader<R: Read>(reader: R, label: &str) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| FeederError::Wav {
            path: label.to_string(),
            message: format!("Failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(FeederError::AudioFormat {
                path: label.to_string(),
                message: format!(
                    "expected 16-bit integer PCM, got {}-bit {:?}",
                    spec.bits_per_sample, spec.sample_format
                ),
            });
        }

        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| FeederError::Wav {
                path: label.to_string(),
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        // Downmix stereo to mono
        let samples = match spec.channels {
            1 => raw_samples,
            2 => raw_samples
                .chunks_exact(2)
                .map(|pair| ((pair[0] as i32 + pair[1] as i32) / 2) as i16)
                .collect(),
            n => {
                return Err(FeederError::AudioFormat {
                    path: label.to_string(),
                    message: format!("expected mono audio, got {} channels", n),
                });
            }
        };

        Ok(Self {
            samples,
            sample_rate: spec.sample_rate,
        })
    }

    /// Little-endian PCM bytes of the waveform.
    pub fn to_pcm_bytes(&self) -> Vec<u8> {
        samples_to_bytes(&self.samples)
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Encodes 16-bit samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Decodes little-endian bytes into 16-bit samples. A trailing odd byte is dropped.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
