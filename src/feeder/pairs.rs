//! Verification pairs: enumeration, extraction, and the test-mode producer.

use crate::defaults;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::pipeline::{Producer, StationError, TestPair};
use crate::sampler::same_speaker;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Sorted `*.wav` files directly inside `dir`.
pub fn list_wavs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut wavs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(defaults::WAV_EXTENSION));
        if is_wav && path.is_file() {
            wavs.push(path);
        }
    }
    wavs.sort();
    Ok(wavs)
}

/// Every unordered pair of distinct files, in lexicographic order.
pub fn unordered_pairs(files: &[PathBuf]) -> Vec<(PathBuf, PathBuf)> {
    files
        .iter()
        .enumerate()
        .flat_map(|(i, a)| files[i + 1..].iter().map(move |b| (a.clone(), b.clone())))
        .collect()
}

/// Extracts windows for both files and derives the match flag from their names.
pub fn extract_pair(extractor: &FeatureExtractor, first: &Path, second: &Path) -> Result<TestPair> {
    let first_windows = extractor.dvectors(first)?;
    let second_windows = extractor.dvectors(second)?;
    let is_match = same_speaker(first, second);

    debug!(
        first = %first.display(),
        second = %second.display(),
        first_shape = ?first_windows.dim(),
        second_shape = ?second_windows.dim(),
        is_match,
        "Extracted test pair"
    );

    Ok(TestPair {
        first: first_windows,
        second: second_windows,
        is_match,
        paths: (first.to_path_buf(), second.to_path_buf()),
    })
}

/// Pops one pair per call until none remain.
pub struct TestPairProducer {
    pairs: VecDeque<(PathBuf, PathBuf)>,
    extractor: FeatureExtractor,
}

impl TestPairProducer {
    pub fn new(pairs: Vec<(PathBuf, PathBuf)>, extractor: FeatureExtractor) -> Self {
        Self {
            pairs: pairs.into(),
            extractor,
        }
    }

    /// Pairs not yet produced.
    pub fn remaining(&self) -> usize {
        self.pairs.len()
    }
}

impl Producer for TestPairProducer {
    type Output = TestPair;

    fn produce(&mut self) -> std::result::Result<Option<TestPair>, StationError> {
        let Some((first, second)) = self.pairs.pop_front() else {
            info!("All test pairs produced");
            return Ok(None);
        };

        // A bad pair is dropped; the remaining pairs are still evaluated
        extract_pair(&self.extractor, &first, &second)
            .map(Some)
            .map_err(|e| {
                StationError::Recoverable(format!(
                    "skipping pair {} / {}: {}",
                    first.display(),
                    second.display(),
                    e
                ))
            })
    }

    fn name(&self) -> &'static str {
        "test"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FeederConfig;
    use tempfile::TempDir;

    fn write_wav(dir: &Path, name: &str, samples: &[i16]) -> PathBuf {
        let path = dir.join(name);
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn speech(secs: f64) -> Vec<i16> {
        (0..(16000.0 * secs) as usize)
            .map(|i| if (i / 20) % 2 == 0 { 4000 } else { -4000 })
            .collect()
    }

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&FeederConfig::default()).unwrap()
    }

    #[test]
    fn list_wavs_is_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.wav"), b"").unwrap();
        fs::write(dir.path().join("a.wav"), b"").unwrap();
        fs::write(dir.path().join("c.txt"), b"").unwrap();
        fs::create_dir(dir.path().join("d.wav")).unwrap();

        let names: Vec<String> = list_wavs(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn unordered_pairs_are_n_choose_2() {
        let files: Vec<PathBuf> = ["a", "b", "c", "d"].iter().map(PathBuf::from).collect();
        let pairs = unordered_pairs(&files);

        assert_eq!(pairs.len(), 6);
        assert_eq!(pairs[0], (PathBuf::from("a"), PathBuf::from("b")));
        assert_eq!(pairs[5], (PathBuf::from("c"), PathBuf::from("d")));
        assert!(unordered_pairs(&files[..1]).is_empty());
    }

    #[test]
    fn match_flag_follows_speaker_prefix() {
        let dir = TempDir::new().unwrap();
        let a = write_wav(dir.path(), "id10001_abc_00001.wav", &speech(2.0));
        let b = write_wav(dir.path(), "id10001_xyz_00002.wav", &speech(2.0));
        let c = write_wav(dir.path(), "id10002_abc_00001.wav", &speech(2.0));

        let extractor = extractor();
        assert!(extract_pair(&extractor, &a, &b).unwrap().is_match);
        assert!(!extract_pair(&extractor, &a, &c).unwrap().is_match);
    }

    #[test]
    fn producer_skips_bad_pairs_then_exhausts() {
        let dir = TempDir::new().unwrap();
        let a = write_wav(dir.path(), "id1_a_00001.wav", &speech(2.0));
        let b = write_wav(dir.path(), "id1_b_00001.wav", &speech(2.0));
        let silent = write_wav(dir.path(), "id2_a_00001.wav", &vec![0i16; 32000]);

        let mut producer = TestPairProducer::new(
            vec![(a.clone(), silent), (a.clone(), b.clone())],
            extractor(),
        );
        assert_eq!(producer.remaining(), 2);

        assert!(matches!(producer.produce(), Err(StationError::Recoverable(_))));
        let pair = producer.produce().unwrap().unwrap();
        assert_eq!(pair.paths, (a, b));
        assert!(producer.produce().unwrap().is_none());
    }
}
