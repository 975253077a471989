//! # BIO Tags for Named Entity Recognition
//!
//! Tag set for sequence labeling of review text. Labels are registered at
//! runtime, so tags refer to labels by their registration index.
//!
//! Tag indices are laid out as `O, B-0, I-0, B-1, I-1, ...`. Labels are only
//! ever appended, which keeps existing indices stable when a label is added.

/// BIO tag for one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BioTag {
    /// First token of an entity with the given label index.
    Begin(usize),
    /// Continuation of an entity with the given label index.
    Inside(usize),
    /// Outside (irrelevant token)
    Outside,
}

impl BioTag {
    /// Number of distinct tags for `num_labels` labels.
    pub fn num_tags(num_labels: usize) -> usize {
        1 + 2 * num_labels
    }

    /// Get all possible tags in index order.
    pub fn all_tags(num_labels: usize) -> Vec<BioTag> {
        (0..Self::num_tags(num_labels))
            .filter_map(|idx| Self::from_index(idx, num_labels))
            .collect()
    }

    /// Get the tag index for tensor operations.
    pub fn index(&self) -> usize {
        match self {
            BioTag::Outside => 0,
            BioTag::Begin(label) => 1 + 2 * label,
            BioTag::Inside(label) => 2 + 2 * label,
        }
    }

    /// Get tag from index.
    pub fn from_index(idx: usize, num_labels: usize) -> Option<Self> {
        if idx >= Self::num_tags(num_labels) {
            return None;
        }
        Some(match idx {
            0 => BioTag::Outside,
            i if i % 2 == 1 => BioTag::Begin((i - 1) / 2),
            i => BioTag::Inside((i - 2) / 2),
        })
    }

    /// Check if this is an "Inside" tag.
    pub fn is_inside(&self) -> bool {
        matches!(self, BioTag::Inside(_))
    }

    /// Label index carried by this tag.
    pub fn label(&self) -> Option<usize> {
        match self {
            BioTag::Begin(label) | BioTag::Inside(label) => Some(*label),
            BioTag::Outside => None,
        }
    }

    /// Whether a sequence may open with this tag.
    pub fn is_valid_start(tag: BioTag) -> bool {
        !tag.is_inside()
    }

    /// Check if transitioning from `from` tag to `to` tag is valid.
    pub fn is_valid_transition(from: BioTag, to: BioTag) -> bool {
        match to {
            // I-x only continues B-x or I-x
            BioTag::Inside(label) => from.label() == Some(label),
            BioTag::Begin(_) | BioTag::Outside => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_index_roundtrip() {
        for num_labels in 0..4 {
            for tag in BioTag::all_tags(num_labels) {
                let recovered = BioTag::from_index(tag.index(), num_labels).unwrap();
                assert_eq!(tag, recovered);
            }
        }
        assert_eq!(BioTag::from_index(3, 1), None);
    }

    #[test]
    fn test_indices_stable_when_labels_appended() {
        assert_eq!(BioTag::Begin(0).index(), 1);
        assert_eq!(BioTag::Inside(0).index(), 2);
        assert_eq!(BioTag::from_index(1, 1), BioTag::from_index(1, 5));
        assert_eq!(BioTag::Begin(1).index(), 3);
    }

    #[test]
    fn test_valid_transitions() {
        assert!(BioTag::is_valid_transition(BioTag::Begin(0), BioTag::Inside(0)));
        assert!(BioTag::is_valid_transition(BioTag::Inside(0), BioTag::Inside(0)));
        assert!(BioTag::is_valid_transition(BioTag::Outside, BioTag::Begin(1)));
        assert!(BioTag::is_valid_transition(BioTag::Inside(1), BioTag::Outside));
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(!BioTag::is_valid_transition(BioTag::Outside, BioTag::Inside(0)));
        assert!(!BioTag::is_valid_transition(BioTag::Begin(0), BioTag::Inside(1)));
        assert!(!BioTag::is_valid_transition(BioTag::Inside(1), BioTag::Inside(0)));
        assert!(!BioTag::is_valid_start(BioTag::Inside(0)));
    }
}
