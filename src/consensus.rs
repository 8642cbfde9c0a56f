//! Exact-match consensus over scale samples.
//!
//! Samples vote with their full ordered text tuple. Only byte-identical tuples land in
//! the same group; there is no fuzzy matching. A reading is accepted when one group
//! reaches the quorum, and its confidences are averaged over that group alone.

use std::collections::HashMap;

use crate::sampler::ScaleSample;

/// Samples that produced exactly the same ordered texts.
#[derive(Clone, Debug, PartialEq)]
pub struct ConsensusGroup {
    pub texts: Vec<String>,
    /// One confidence vector per member sample.
    pub members: Vec<Vec<f32>>,
}

impl ConsensusGroup {
    pub fn votes(&self) -> usize {
        self.members.len()
    }

    /// Per-field arithmetic mean over the members.
    pub fn averaged_confidences(&self) -> Vec<f32> {
        let votes = self.members.len() as f32;
        (0..self.texts.len())
            .map(|field| {
                self.members
                    .iter()
                    .map(|confs| confs.get(field).copied().unwrap_or(0.0))
                    .sum::<f32>()
                    / votes
            })
            .collect()
    }
}

/// An accepted reading.
#[derive(Clone, Debug, PartialEq)]
pub struct Reading {
    pub texts: Vec<String>,
    pub confidences: Vec<f32>,
    pub votes: usize,
}

impl Reading {
    pub fn mean_confidence(&self) -> f32 {
        mean(&self.confidences)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ConsensusResolver {
    needed_occurrences: usize,
}

impl ConsensusResolver {
    pub fn new(needed_occurrences: usize) -> Self {
        Self { needed_occurrences }
    }

    pub fn needed_occurrences(&self) -> usize {
        self.needed_occurrences
    }

    /// Partition samples by exact text tuple, in order of first appearance.
    pub fn group(samples: &[ScaleSample]) -> Vec<ConsensusGroup> {
        let mut index: HashMap<&[String], usize> = HashMap::new();
        let mut groups: Vec<ConsensusGroup> = Vec::new();
        for sample in samples {
            match index.get(sample.texts.as_slice()) {
                Some(&slot) => groups[slot].members.push(sample.confidences.clone()),
                None => {
                    index.insert(sample.texts.as_slice(), groups.len());
                    groups.push(ConsensusGroup {
                        texts: sample.texts.clone(),
                        members: vec![sample.confidences.clone()],
                    });
                }
            }
        }
        groups
    }

    /// Accept a reading when some group has at least `needed_occurrences` members.
    ///
    /// When several groups qualify, the one with the highest mean averaged confidence
    /// wins; ties go to the group seen first.
    pub fn resolve(&self, samples: &[ScaleSample]) -> Option<Reading> {
        if samples.len() < self.needed_occurrences {
            return None;
        }

        let mut best: Option<Reading> = None;
        for group in Self::group(samples) {
            if group.votes() < self.needed_occurrences {
                continue;
            }
            let candidate = Reading {
                confidences: group.averaged_confidences(),
                votes: group.votes(),
                texts: group.texts,
            };
            let better = match &best {
                Some(current) => candidate.mean_confidence() > current.mean_confidence(),
                None => true,
            };
            if better {
                best = Some(candidate);
            }
        }
        best
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(texts: &[&str], confidences: &[f32]) -> ScaleSample {
        ScaleSample {
            factor: 1.0,
            texts: texts.iter().map(|t| t.to_string()).collect(),
            confidences: confidences.to_vec(),
        }
    }

    #[test]
    fn majority_group_wins_with_group_only_average() {
        let samples = vec![
            sample(&["12345678", "09876543"], &[0.9, 0.8]),
            sample(&["12345678", "09876543"], &[0.7, 0.6]),
            sample(&["12345670", "09876543"], &[0.1, 0.1]),
            sample(&["12345678", "09876543"], &[0.8, 1.0]),
            sample(&["12345678", "09876543"], &[1.0, 0.6]),
        ];
        let reading = ConsensusResolver::new(4).resolve(&samples).expect("quorum");
        assert_eq!(reading.texts, vec!["12345678", "09876543"]);
        assert_eq!(reading.votes, 4);
        assert!((reading.confidences[0] - 0.85).abs() < 1e-6);
        assert!((reading.confidences[1] - 0.75).abs() < 1e-6);
    }

    #[test]
    fn too_few_samples_never_resolve() {
        let samples = vec![sample(&["1"], &[1.0]); 3];
        assert!(ConsensusResolver::new(4).resolve(&samples).is_none());
        assert!(ConsensusResolver::new(4).resolve(&[]).is_none());
    }

    #[test]
    fn split_vote_fails() {
        let samples = vec![
            sample(&["1"], &[1.0]),
            sample(&["1"], &[1.0]),
            sample(&["1"], &[1.0]),
            sample(&["7"], &[1.0]),
            sample(&["7"], &[1.0]),
        ];
        assert!(ConsensusResolver::new(4).resolve(&samples).is_none());
    }

    #[test]
    fn field_order_matters() {
        let samples = vec![
            sample(&["1", "2"], &[1.0, 1.0]),
            sample(&["2", "1"], &[1.0, 1.0]),
        ];
        let groups = ConsensusResolver::group(&samples);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn tie_break_prefers_higher_confidence_then_first_seen() {
        let samples = vec![
            sample(&["11"], &[0.5]),
            sample(&["22"], &[0.9]),
            sample(&["11"], &[0.5]),
            sample(&["22"], &[0.9]),
        ];
        let reading = ConsensusResolver::new(2).resolve(&samples).unwrap();
        assert_eq!(reading.texts, vec!["22"]);

        let samples = vec![
            sample(&["11"], &[0.9]),
            sample(&["22"], &[0.9]),
            sample(&["22"], &[0.9]),
            sample(&["11"], &[0.9]),
        ];
        let reading = ConsensusResolver::new(2).resolve(&samples).unwrap();
        assert_eq!(reading.texts, vec!["11"]);
    }

    #[test]
    fn grouping_ignores_sample_order() {
        let mut samples = vec![
            sample(&["5"], &[0.2]),
            sample(&["5"], &[0.4]),
            sample(&["6"], &[0.9]),
            sample(&["5"], &[0.6]),
        ];
        let forward = ConsensusResolver::new(3).resolve(&samples).unwrap();
        samples.reverse();
        let backward = ConsensusResolver::new(3).resolve(&samples).unwrap();
        assert_eq!(forward.texts, backward.texts);
        assert!((forward.confidences[0] - backward.confidences[0]).abs() < 1e-6);
    }
}
