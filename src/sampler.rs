//! Speaker-balanced sampling over a feature cache listing.
//!
//! Utterance ids follow `<speaker>_<video>_<index>`; the speaker is everything
//! before the first underscore and is never stored separately.

use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

/// Speaker identity of an utterance id or file name.
pub fn speaker_id(utterance: &str) -> &str {
    utterance.split('_').next().unwrap_or(utterance)
}

/// Speaker identity parsed from a file path's base name.
pub fn speaker_of_path(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str()).map(speaker_id)
}

/// True when both files' base names share the same speaker prefix.
pub fn same_speaker(a: &Path, b: &Path) -> bool {
    match (speaker_of_path(a), speaker_of_path(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Fixed set of speakers visited in rotation.
///
/// The speaker list never changes after construction; a cursor marks the
/// head of the rotation and wraps modulo the roster length.
#[derive(Debug, Clone)]
pub struct SpeakerRoster {
    speakers: Vec<String>,
    cursor: usize,
}

impl SpeakerRoster {
    /// Builds the roster of distinct speakers, sorted by id.
    pub fn from_utterances<I, S>(utterances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let speakers: BTreeSet<String> = utterances
            .into_iter()
            .map(|u| speaker_id(u.as_ref()).to_string())
            .collect();
        Self {
            speakers: speakers.into_iter().collect(),
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speakers.is_empty()
    }

    /// Current rotation order, head first.
    pub fn order(&self) -> impl Iterator<Item = &str> {
        let (tail, head) = self.speakers.split_at(self.cursor);
        head.iter().chain(tail.iter()).map(String::as_str)
    }

    /// Returns the next `k` speakers (at most the roster size) and moves them
    /// to the back of the rotation.
    pub fn next_batch(&mut self, k: usize) -> Vec<String> {
        if self.speakers.is_empty() {
            return Vec::new();
        }
        let take = k.min(self.speakers.len());
        let batch: Vec<String> = self.order().take(take).map(str::to_string).collect();
        self.cursor = (self.cursor + take) % self.speakers.len();
        batch
    }
}

/// Builds speaker batches and draws utterances for them.
#[derive(Debug, Clone)]
pub struct SpeakerRoundRobinSampler {
    roster: SpeakerRoster,
    utterances: HashMap<String, Vec<String>>,
    num_utt_per_batch: usize,
}

impl SpeakerRoundRobinSampler {
    /// Indexes `utterance_ids` by speaker.
    pub fn new(utterance_ids: Vec<String>, num_utt_per_batch: usize) -> Self {
        let roster = SpeakerRoster::from_utterances(&utterance_ids);
        let mut utterances: HashMap<String, Vec<String>> = HashMap::new();
        for id in utterance_ids {
            utterances
                .entry(speaker_id(&id).to_string())
                .or_default()
                .push(id);
        }
        Self {
            roster,
            utterances,
            num_utt_per_batch,
        }
    }

    pub fn roster(&self) -> &SpeakerRoster {
        &self.roster
    }

    pub fn num_utt_per_batch(&self) -> usize {
        self.num_utt_per_batch
    }

    /// Next `k` speakers in round-robin order.
    pub fn next_speaker_batch(&mut self, k: usize) -> Vec<String> {
        self.roster.next_batch(k)
    }

    /// Utterance ids belonging to `speaker`.
    pub fn utterances_of(&self, speaker: &str) -> &[String] {
        self.utterances
            .get(speaker)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True when the speaker has fewer utterances than one batch needs.
    pub fn is_invalid_speaker(&self, speaker: &str) -> bool {
        self.utterances_of(speaker).len() < self.num_utt_per_batch
    }

    /// True when at least one rostered speaker can fill a batch block.
    pub fn has_valid_speaker(&self) -> bool {
        self.roster
            .order()
            .any(|speaker| !self.is_invalid_speaker(speaker))
    }

    /// Draws `num_utt_per_batch` utterances of `speaker` uniformly with replacement.
    pub fn sample_utterances<R: Rng>(&self, speaker: &str, rng: &mut R) -> Vec<String> {
        let pool = self.utterances_of(speaker);
        (0..self.num_utt_per_batch)
            .filter_map(|_| pool.choose(&mut *rng).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ids(spec: &[(&str, usize)]) -> Vec<String> {
        spec.iter()
            .flat_map(|(spk, n)| (0..*n).map(move |i| format!("{}_vid_{:05}", spk, i)))
            .collect()
    }

    #[test]
    fn speaker_id_is_prefix_before_first_underscore() {
        assert_eq!(speaker_id("id10001_abc_00001"), "id10001");
        assert_eq!(speaker_id("id10001_x_y_z.wav"), "id10001");
        assert_eq!(speaker_id("nounderscore"), "nounderscore");
    }

    #[test]
    fn same_speaker_uses_base_name() {
        assert!(same_speaker(
            Path::new("/a/id10001_abc_00001.wav"),
            Path::new("/b/id10001_xyz_00002.wav")
        ));
        assert!(!same_speaker(
            Path::new("/a/id10001_abc_00001.wav"),
            Path::new("/a/id10002_abc_00001.wav")
        ));
    }

    #[test]
    fn roster_has_distinct_sorted_speakers() {
        let roster = SpeakerRoster::from_utterances(ids(&[("id3", 2), ("id1", 1), ("id2", 4)]));
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.order().collect::<Vec<_>>(), vec!["id1", "id2", "id3"]);
    }

    #[test]
    fn next_batch_rotates_taken_speakers_to_back() {
        let mut roster =
            SpeakerRoster::from_utterances(ids(&[("a", 1), ("b", 1), ("c", 1), ("d", 1), ("e", 1)]));

        assert_eq!(roster.next_batch(2), vec!["a", "b"]);
        assert_eq!(
            roster.order().collect::<Vec<_>>(),
            vec!["c", "d", "e", "a", "b"]
        );
        assert_eq!(roster.next_batch(2), vec!["c", "d"]);
        assert_eq!(roster.next_batch(2), vec!["e", "a"]);
        assert_eq!(roster.next_batch(2), vec!["b", "c"]);
    }

    #[test]
    fn batch_larger_than_roster_returns_each_once() {
        let mut roster = SpeakerRoster::from_utterances(ids(&[("a", 1), ("b", 1), ("c", 1)]));
        roster.next_batch(1);
        assert_eq!(roster.next_batch(10), vec!["b", "c", "a"]);
        assert_eq!(roster.order().next(), Some("b"));
    }

    #[test]
    fn empty_roster_yields_empty_batches() {
        let mut roster = SpeakerRoster::from_utterances(Vec::<String>::new());
        assert!(roster.is_empty());
        assert!(roster.next_batch(4).is_empty());
    }

    #[test]
    fn round_robin_is_fair() {
        let speakers: Vec<(String, usize)> = (0..7).map(|i| (format!("spk{}", i), 1)).collect();
        let spec: Vec<(&str, usize)> = speakers.iter().map(|(s, n)| (s.as_str(), *n)).collect();
        let mut roster = SpeakerRoster::from_utterances(ids(&spec));
        let (draws, k) = (23, 3);

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..draws {
            for spk in roster.next_batch(k) {
                *counts.entry(spk).or_default() += 1;
            }
        }

        let floor = draws * k / roster.len();
        assert_eq!(counts.len(), 7);
        assert!(counts.values().all(|&c| c >= floor), "{:?}", counts);
    }

    #[test]
    fn invalid_speaker_has_too_few_utterances() {
        let sampler = SpeakerRoundRobinSampler::new(ids(&[("id1", 5), ("id2", 2)]), 3);
        assert!(!sampler.is_invalid_speaker("id1"));
        assert!(sampler.is_invalid_speaker("id2"));
        assert!(sampler.is_invalid_speaker("unknown"));
    }

    #[test]
    fn has_valid_speaker_needs_one_full_pool() {
        let sampler = SpeakerRoundRobinSampler::new(ids(&[("id1", 2), ("id2", 2)]), 3);
        assert!(!sampler.has_valid_speaker());

        let sampler = SpeakerRoundRobinSampler::new(ids(&[("id1", 2), ("id2", 3)]), 3);
        assert!(sampler.has_valid_speaker());
    }

    #[test]
    fn speaker_prefix_does_not_leak_into_longer_ids() {
        // "id1" must not count utterances of "id10"
        let sampler = SpeakerRoundRobinSampler::new(ids(&[("id1", 1), ("id10", 5)]), 3);
        assert_eq!(sampler.utterances_of("id1").len(), 1);
        assert!(sampler.is_invalid_speaker("id1"));
    }

    #[test]
    fn sampling_is_with_replacement_from_own_utterances() {
        let sampler = SpeakerRoundRobinSampler::new(ids(&[("id1", 2), ("id2", 3)]), 8);
        let mut rng = StdRng::seed_from_u64(42);

        let drawn = sampler.sample_utterances("id1", &mut rng);
        assert_eq!(drawn.len(), 8);
        assert!(drawn.iter().all(|u| speaker_id(u) == "id1"));
        // 8 draws from 2 utterances must repeat
        let distinct: BTreeSet<_> = drawn.iter().collect();
        assert!(distinct.len() <= 2);
    }
}
