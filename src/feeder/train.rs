//! Speaker-balanced training batch producer.

use crate::cache::FeatureStore;
use crate::config::FeederConfig;
use crate::defaults;
use crate::error::{FeederError, Result};
use crate::features::random_crop;
use crate::pipeline::{ErrorReporter, LogReporter, Producer, StationError, TrainBatch};
use crate::sampler::SpeakerRoundRobinSampler;
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use tracing::debug;

const STATION: &str = "train";

/// Builds one `TrainBatch` per call from a feature store.
///
/// Owns the speaker rotation; nothing outside the producer thread touches it.
/// Each skipped speaker is reported once per batch it was drawn for.
pub struct TrainBatchProducer<S> {
    sampler: SpeakerRoundRobinSampler,
    store: S,
    num_spk_per_batch: usize,
    window_frames: usize,
    rng: StdRng,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl<S: FeatureStore> TrainBatchProducer<S> {
    /// Creates a producer over `utterance_ids`, all of which must be loadable from `store`.
    pub fn new(store: S, utterance_ids: Vec<String>, config: &FeederConfig) -> Self {
        Self {
            sampler: SpeakerRoundRobinSampler::new(utterance_ids, config.num_utt_per_batch),
            store,
            num_spk_per_batch: config.num_spk_per_batch,
            window_frames: config.window_frames(),
            rng: StdRng::from_entropy(),
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Replaces the reporter that receives skipped-speaker notices.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Fixes the random source, for reproducible tests.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn sampler(&self) -> &SpeakerRoundRobinSampler {
        &self.sampler
    }

    /// Draws the next speaker batch and assembles its tensor and labels.
    ///
    /// Speakers with fewer than `num_utt_per_batch` utterances are skipped
    /// and not replaced, so the batch may hold fewer speaker blocks than
    /// requested. Labels are numbered over contributing speakers only.
    pub fn build_batch(&mut self) -> Result<TrainBatch> {
        let num_utt = self.sampler.num_utt_per_batch();
        let drawn = self.sampler.next_speaker_batch(self.num_spk_per_batch);

        let mut speakers = Vec::with_capacity(drawn.len());
        let mut skipped = Vec::new();
        let mut crops: Vec<Array2<f32>> = Vec::with_capacity(drawn.len() * num_utt);

        for speaker in drawn {
            if self.sampler.is_invalid_speaker(&speaker) {
                let notice = StationError::Recoverable(format!(
                    "skipping speaker {}: {} utterances, {} required",
                    speaker,
                    self.sampler.utterances_of(&speaker).len(),
                    num_utt
                ));
                self.error_reporter.report(STATION, &notice);
                skipped.push(speaker);
                continue;
            }

            for id in self.sampler.sample_utterances(&speaker, &mut self.rng) {
                let features = self.store.load(&id)?;
                let crop = random_crop(features.view(), self.window_frames, &mut self.rng)
                    .ok_or_else(|| FeederError::UtteranceTooShort {
                        id: id.clone(),
                        total_frames: features.nrows(),
                        window_frames: self.window_frames,
                    })?;
                crops.push(crop);
            }
            speakers.push(speaker);
        }

        let labels: Array1<i64> = (0..speakers.len())
            .flat_map(|label| std::iter::repeat_n(label as i64, num_utt))
            .collect();

        let inputs = if crops.is_empty() {
            Array3::zeros((0, self.window_frames, defaults::NUM_FILTERS))
        } else {
            let views: Vec<ArrayView2<'_, f32>> = crops.iter().map(|c| c.view()).collect();
            ndarray::stack(Axis(0), &views)?
        };

        debug!(
            rows = inputs.len_of(Axis(0)),
            speakers = speakers.len(),
            skipped = skipped.len(),
            "Built train batch"
        );

        Ok(TrainBatch {
            inputs,
            labels,
            speakers,
            skipped,
        })
    }
}

impl<S: FeatureStore + 'static> Producer for TrainBatchProducer<S> {
    type Output = TrainBatch;

    fn produce(&mut self) -> std::result::Result<Option<TrainBatch>, StationError> {
        match self.build_batch() {
            Ok(batch) => Ok(Some(batch)),
            // A cache file that can't be read costs one batch
            Err(e @ (FeederError::Io(_) | FeederError::CacheFormat { .. })) => {
                Err(StationError::Recoverable(e.to_string()))
            }
            Err(e) => Err(StationError::Fatal(e.to_string())),
        }
    }

    fn name(&self) -> &'static str {
        STATION
    }
}
