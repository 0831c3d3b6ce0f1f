//! Items handed from the producer to the training or evaluation loop.

use ndarray::{Array1, Array3, Axis};
use std::path::PathBuf;

/// One speaker-balanced training batch.
///
/// `inputs` is `[rows, window_frames, filters]`; `labels[r]` is the
/// batch-local index of the speaker that contributed row `r`. Rows come in
/// blocks of `num_utt_per_batch` per contributing speaker, in speaker order.
#[derive(Debug, Clone)]
pub struct TrainBatch {
    pub inputs: Array3<f32>,
    pub labels: Array1<i64>,
    /// Contributing speakers; `speakers[i]` carries label `i`.
    pub speakers: Vec<String>,
    /// Speakers drawn for this batch but excluded for having too few utterances.
    pub skipped: Vec<String>,
}

impl TrainBatch {
    /// Number of rows (cropped utterances) in the batch.
    pub fn len(&self) -> usize {
        self.inputs.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Two waveforms' windows and whether they share a speaker.
#[derive(Debug, Clone)]
pub struct TestPair {
    pub first: Array3<f32>,
    pub second: Array3<f32>,
    /// Derived from the file names' speaker prefixes only.
    pub is_match: bool,
    pub paths: (PathBuf, PathBuf),
}

/// Anything a feeder queue can carry.
#[derive(Debug, Clone)]
pub enum FeederItem {
    Train(TrainBatch),
    Test(TestPair),
}

impl FeederItem {
    pub fn into_train(self) -> Option<TrainBatch> {
        match self {
            FeederItem::Train(batch) => Some(batch),
            FeederItem::Test(_) => None,
        }
    }

    pub fn into_test(self) -> Option<TestPair> {
        match self {
            FeederItem::Test(pair) => Some(pair),
            FeederItem::Train(_) => None,
        }
    }
}

impl From<TrainBatch> for FeederItem {
    fn from(batch: TrainBatch) -> Self {
        FeederItem::Train(batch)
    }
}

impl From<TestPair> for FeederItem {
    fn from(pair: TestPair) -> Self {
        FeederItem::Test(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_batch_len_counts_rows() {
        let batch = TrainBatch {
            inputs: Array3::zeros((6, 160, 40)),
            labels: Array1::from(vec![0, 0, 0, 1, 1, 1]),
            speakers: vec!["id1".to_string(), "id2".to_string()],
            skipped: Vec::new(),
        };
        assert_eq!(batch.len(), 6);
        assert!(!batch.is_empty());
    }

    #[test]
    fn feeder_item_unwraps_to_matching_variant() {
        let pair = TestPair {
            first: Array3::zeros((1, 160, 40)),
            second: Array3::zeros((2, 160, 40)),
            is_match: true,
            paths: (PathBuf::from("a.wav"), PathBuf::from("b.wav")),
        };
        let item = FeederItem::from(pair);
        assert!(item.clone().into_train().is_none());
        assert!(item.into_test().is_some_and(|p| p.is_match));
    }
}
