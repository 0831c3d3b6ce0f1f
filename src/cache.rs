//! Feature cache: utterance id → precomputed log-mel matrix.
//!
//! The directory-backed store keeps one JSON file per utterance,
//! `<speaker>_<video>_<index>.json`, holding `{"features": [[f32; F]; T]}`.

use crate::defaults;
use crate::error::{FeederError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

/// Read access to cached utterance features.
pub trait FeatureStore: Send {
    /// Lists every utterance id in the store.
    fn list(&self) -> Result<Vec<String>>;

    /// Loads the `[frames, filters]` feature matrix of one utterance.
    fn load(&self, id: &str) -> Result<Array2<f32>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(alias = "LogMel_Features")]
    features: Vec<Vec<f32>>,
}

/// Directory of JSON cache files.
#[derive(Debug, Clone)]
pub struct DirFeatureStore {
    root: PathBuf,
}

impl DirFeatureStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", id, defaults::CACHE_EXTENSION))
    }

    /// Writes one cache entry, creating the directory if needed.
    pub fn save(&self, id: &str, features: &Array2<f32>) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let entry = CacheEntry {
            features: features.rows().into_iter().map(|r| r.to_vec()).collect(),
        };
        let file = fs::File::create(self.path_for(id))?;
        serde_json::to_writer(BufWriter::new(file), &entry)?;
        Ok(())
    }
}

impl FeatureStore for DirFeatureStore {
    fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(defaults::CACHE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<Array2<f32>> {
        let file = fs::File::open(self.path_for(id))?;
        let entry: CacheEntry =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| FeederError::CacheFormat {
                id: id.to_string(),
                message: e.to_string(),
            })?;
        rows_to_matrix(id, entry.features)
    }
}

fn rows_to_matrix(id: &str, rows: Vec<Vec<f32>>) -> Result<Array2<f32>> {
    let num_rows = rows.len();
    let num_cols = rows.first().map_or(defaults::NUM_FILTERS, Vec::len);
    if let Some(bad) = rows.iter().position(|r| r.len() != num_cols) {
        return Err(FeederError::CacheFormat {
            id: id.to_string(),
            message: format!(
                "row {} has {} values, expected {}",
                bad,
                rows[bad].len(),
                num_cols
            ),
        });
    }
    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((num_rows, num_cols), flat)?)
}
