//! # Viterbi Decoding
//!
//! Finds the best BIO tag sequence given per-token emission scores, with
//! invalid transitions (for example `O -> I-TASTE`) ruled out entirely.

use crate::error::{Result, UmamiError};
use crate::ner::bio_tags::BioTag;

/// Viterbi decoder for BIO tag sequences over a fixed label count.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    num_labels: usize,
    valid_start: Vec<bool>,
    valid_transitions: Vec<Vec<bool>>,
}

impl ViterbiDecoder {
    /// Create a new decoder, pre-computing the transition constraint mask.
    pub fn new(num_labels: usize) -> Self {
        let tags = BioTag::all_tags(num_labels);
        let valid_start = tags.iter().map(|&tag| BioTag::is_valid_start(tag)).collect();
        let valid_transitions = tags
            .iter()
            .map(|&prev| {
                tags.iter()
                    .map(|&curr| BioTag::is_valid_transition(prev, curr))
                    .collect()
            })
            .collect();

        Self {
            num_labels,
            valid_start,
            valid_transitions,
        }
    }

    pub fn num_tags(&self) -> usize {
        BioTag::num_tags(self.num_labels)
    }

    /// Decode the optimal tag sequence.
    ///
    /// # Arguments
    /// * `emission_scores` - Matrix of shape [seq_len, num_tags], usually log-probabilities
    ///
    /// # Returns
    /// The optimal tag sequence.
    pub fn decode(&self, emission_scores: &[Vec<f32>]) -> Result<Vec<BioTag>> {
        let seq_len = emission_scores.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        let num_tags = self.num_tags();
        if let Some(row) = emission_scores.iter().find(|row| row.len() != num_tags) {
            return Err(UmamiError::CandleError(format!(
                "Emission score dimension mismatch: expected {}, got {}",
                num_tags,
                row.len()
            )));
        }

        // DP table
        let mut dp: Vec<Vec<f32>> = vec![vec![f32::NEG_INFINITY; num_tags]; seq_len];
        let mut backptr: Vec<Vec<Option<usize>>> = vec![vec![None; num_tags]; seq_len];

        // Initialize
        for tag in 0..num_tags {
            if self.valid_start[tag] {
                dp[0][tag] = emission_scores[0][tag];
            }
        }

        // Forward pass with constraints
        for pos in 1..seq_len {
            for curr_tag in 0..num_tags {
                let mut best_score = f32::NEG_INFINITY;
                let mut best_prev = None;

                for prev_tag in 0..num_tags {
                    if !self.valid_transitions[prev_tag][curr_tag] {
                        continue;
                    }

                    let score = dp[pos - 1][prev_tag] + emission_scores[pos][curr_tag];
                    if score > best_score {
                        best_score = score;
                        best_prev = Some(prev_tag);
                    }
                }

                dp[pos][curr_tag] = best_score;
                backptr[pos][curr_tag] = best_prev;
            }
        }

        // Backtrack
        let mut best_final_tag = 0;
        let mut best_final_score = f32::NEG_INFINITY;
        for tag in 0..num_tags {
            if dp[seq_len - 1][tag] > best_final_score {
                best_final_score = dp[seq_len - 1][tag];
                best_final_tag = tag;
            }
        }

        let mut path = vec![best_final_tag];
        let mut curr_tag = best_final_tag;

        for pos in (1..seq_len).rev() {
            curr_tag = backptr[pos][curr_tag].unwrap_or(0);
            path.push(curr_tag);
        }

        path.reverse();
        path.into_iter()
            .map(|idx| {
                BioTag::from_index(idx, self.num_labels).ok_or_else(|| {
                    UmamiError::CandleError(format!("Invalid tag index: {}", idx))
                })
            })
            .collect()
    }
}
