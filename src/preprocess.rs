//! Offline cache builder: a directory of WAV files → a feature store.

use crate::cache::DirFeatureStore;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::feeder::list_wavs;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of a preprocessing run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PreprocessSummary {
    pub written: usize,
    /// Files whose VAD output was empty; nothing is cached for them.
    pub empty: Vec<String>,
    /// Files with speech shorter than one window; train mode could not crop them.
    pub short: Vec<String>,
    pub failed: Vec<String>,
}

/// Extracts speech-only log-mel features for every WAV in `wav_dir` and
/// caches them in `store` under the file stem.
///
/// Files with less speech than one `window_frames` crop are not cached.
/// Unreadable files are logged and listed in the summary; the run continues.
pub fn build_cache(
    extractor: &FeatureExtractor,
    wav_dir: &Path,
    store: &DirFeatureStore,
) -> Result<PreprocessSummary> {
    let mut summary = PreprocessSummary::default();

    for path in list_wavs(wav_dir)? {
        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            continue;
        };

        match extractor.extract(&path) {
            Ok(features) if features.nrows() == 0 => {
                warn!(id, "No speech detected, not cached");
                summary.empty.push(id.to_string());
            }
            Ok(features) if features.nrows() < extractor.window_frames() => {
                warn!(
                    id,
                    frames = features.nrows(),
                    window_frames = extractor.window_frames(),
                    "Speech shorter than one window, not cached"
                );
                summary.short.push(id.to_string());
            }
            Ok(features) => {
                store.save(id, &features)?;
                summary.written += 1;
            }
            Err(e) => {
                warn!(id, error = %e, "Feature extraction failed");
                summary.failed.push(id.to_string());
            }
        }
    }

    info!(
        written = summary.written,
        empty = summary.empty.len(),
        short = summary.short.len(),
        failed = summary.failed.len(),
        out_dir = %store.root().display(),
        "Feature cache built"
    );
    Ok(summary)
}
