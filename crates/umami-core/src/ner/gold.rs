//! Alignment of character-offset annotations onto token-level BIO tags.

use tracing::warn;

use crate::error::{Result, UmamiError};
use crate::example::Example;
use crate::ner::bio_tags::BioTag;
use crate::tokenizer::Token;

/// Token-level supervision for one example.
///
/// `tags[i]` is `None` when token `i` is covered by an annotation that does
/// not line up with token boundaries; such tokens are left out of the loss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoldTags {
    pub tags: Vec<Option<BioTag>>,
}

impl GoldTags {
    /// Validate `example` and align its annotations with `tokens`.
    ///
    /// # Errors
    ///
    /// Data-validation errors for malformed offsets, and
    /// `UmamiError::UnknownLabel` for labels missing from `labels`.
    pub fn align(example: &Example, tokens: &[Token], labels: &[String]) -> Result<Self> {
        example.validate()?;

        let mut tags = vec![Some(BioTag::Outside); tokens.len()];

        for ann in &example.entities {
            let label = labels
                .iter()
                .position(|l| *l == ann.label)
                .ok_or_else(|| UmamiError::UnknownLabel(ann.label.clone()))?;

            let covered: Vec<usize> = tokens
                .iter()
                .filter(|t| t.start < ann.end && ann.start < t.end)
                .map(|t| t.index)
                .collect();

            let aligned = match (covered.first(), covered.last()) {
                (Some(&first), Some(&last)) => {
                    tokens[first].start == ann.start && tokens[last].end == ann.end
                }
                _ => false,
            };

            if !aligned {
                warn!(
                    start = ann.start,
                    end = ann.end,
                    label = %ann.label,
                    text = %example.text,
                    "annotation does not align with token boundaries; tokens left unsupervised"
                );
                for idx in covered {
                    tags[idx] = None;
                }
                continue;
            }

            for (n, idx) in covered.into_iter().enumerate() {
                tags[idx] = Some(if n == 0 {
                    BioTag::Begin(label)
                } else {
                    BioTag::Inside(label)
                });
            }
        }

        Ok(Self { tags })
    }

    /// `(token index, tag index)` of every supervised token.
    pub fn supervised(&self) -> Vec<(u32, u32)> {
        self.tags
            .iter()
            .enumerate()
            .filter_map(|(i, tag)| tag.map(|tag| (i as u32, tag.index() as u32)))
            .collect()
    }
}
