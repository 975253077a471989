//! Annotated training examples.

use serde::{Deserialize, Serialize};

use crate::error::{Result, UmamiError};

/// One labelled entity span, in character offsets (half-open).
///
/// Serialized as a `[start, end, label]` triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(usize, usize, String)", into = "(usize, usize, String)")]
pub struct Annotation {
    pub start: usize,
    pub end: usize,
    pub label: String,
}

impl Annotation {
    pub fn new(start: usize, end: usize, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }
}

impl From<(usize, usize, String)> for Annotation {
    fn from((start, end, label): (usize, usize, String)) -> Self {
        Self { start, end, label }
    }
}

impl From<Annotation> for (usize, usize, String) {
    fn from(ann: Annotation) -> Self {
        (ann.start, ann.end, ann.label)
    }
}

/// Reject labels that are empty or carry surrounding whitespace. Labels are
/// matched exactly everywhere, so `"TASTE "` and `"TASTE"` would never meet.
pub fn check_label(label: &str) -> Result<()> {
    if label.is_empty() || label.trim() != label {
        return Err(UmamiError::InvalidLabel(label.to_string()));
    }
    Ok(())
}

/// A raw text and the entities annotated on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub text: String,
    #[serde(default)]
    pub entities: Vec<Annotation>,
}

impl Example {
    /// Build an example, rejecting malformed offsets.
    ///
    /// # Errors
    ///
    /// Returns `UmamiError::InvalidSpan` for reversed, empty or out-of-range
    /// offsets and `UmamiError::OverlappingSpans` when two annotations share
    /// characters.
    pub fn new(text: impl Into<String>, entities: Vec<Annotation>) -> Result<Self> {
        let example = Self::unchecked(text, entities);
        example.validate()?;
        Ok(example)
    }

    /// Build an example without validating it. Training validates again
    /// before every update, so bad offsets still surface there.
    pub fn unchecked(text: impl Into<String>, entities: Vec<Annotation>) -> Self {
        Self {
            text: text.into(),
            entities,
        }
    }

    /// Check every annotation against the text.
    pub fn validate(&self) -> Result<()> {
        let len = self.text.chars().count();

        for ann in &self.entities {
            check_label(&ann.label)?;
            if ann.start >= ann.end || ann.end > len {
                return Err(UmamiError::InvalidSpan {
                    start: ann.start,
                    end: ann.end,
                    label: ann.label.clone(),
                    len,
                });
            }
        }

        let mut sorted: Vec<&Annotation> = self.entities.iter().collect();
        sorted.sort_by_key(|ann| (ann.start, ann.end));
        for pair in sorted.windows(2) {
            if pair[1].start < pair[0].end {
                return Err(UmamiError::OverlappingSpans {
                    first_start: pair[0].start,
                    first_end: pair[0].end,
                    second_start: pair[1].start,
                    second_end: pair[1].end,
                });
            }
        }

        Ok(())
    }

    /// Distinct labels used by this example, in order of first appearance.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = Vec::new();
        for ann in &self.entities {
            if !labels.contains(&ann.label.as_str()) {
                labels.push(&ann.label);
            }
        }
        labels
    }

    /// Text covered by an annotation, if its offsets are in range.
    pub fn span_text(&self, ann: &Annotation) -> Option<String> {
        if ann.start >= ann.end {
            return None;
        }
        let text: String = self
            .text
            .chars()
            .skip(ann.start)
            .take(ann.end - ann.start)
            .collect();
        (text.chars().count() == ann.end - ann.start).then_some(text)
    }
}
