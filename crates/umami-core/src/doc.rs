//! Processed documents and the entity spans attached to them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::tokenizer::Token;

/// An extracted entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Text covered by the entity, sliced from the original input.
    pub text: String,
    pub label: String,
    /// Character offset of the first character.
    pub start: usize,
    /// Character offset one past the last character.
    pub end: usize,
    /// Index of the first token.
    pub start_token: usize,
    /// Index one past the last token.
    pub end_token: usize,
}

/// IOB position of a token relative to the document's entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntIob {
    Begin,
    Inside,
    Outside,
}

impl fmt::Display for EntIob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntIob::Begin => write!(f, "B"),
            EntIob::Inside => write!(f, "I"),
            EntIob::Outside => write!(f, "O"),
        }
    }
}

/// A tokenized text plus whatever the enabled stages annotated on it.
#[derive(Debug, Clone)]
pub struct Doc {
    text: String,
    tokens: Vec<Token>,
    shapes: Vec<Option<String>>,
    sent_starts: Vec<bool>,
    ents: Vec<Span>,
}

impl Doc {
    pub fn new(text: impl Into<String>, tokens: Vec<Token>) -> Self {
        let n = tokens.len();
        Self {
            text: text.into(),
            tokens,
            shapes: vec![None; n],
            sent_starts: vec![false; n],
            ents: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Detected entities, left to right.
    ///
    /// The iterator is lazy and `Clone`, so it can be restarted freely; calling
    /// `ents()` again also yields the same sequence.
    pub fn ents(&self) -> std::slice::Iter<'_, Span> {
        self.ents.iter()
    }

    /// `(text, label)` pairs of all entities, the shape the review tools print.
    pub fn ent_pairs(&self) -> Vec<(String, String)> {
        self.ents
            .iter()
            .map(|span| (span.text.clone(), span.label.clone()))
            .collect()
    }

    /// Build a span over tokens `[start_token, end_token)`.
    pub fn make_span(&self, start_token: usize, end_token: usize, label: &str) -> Option<Span> {
        if start_token >= end_token || end_token > self.tokens.len() {
            return None;
        }
        let first = &self.tokens[start_token];
        let last = &self.tokens[end_token - 1];
        Some(Span {
            text: self.text[first.byte_start..last.byte_end].to_string(),
            label: label.to_string(),
            start: first.start,
            end: last.end,
            start_token,
            end_token,
        })
    }

    /// Replace the entities. Spans are kept sorted by start token.
    pub fn set_ents(&mut self, mut ents: Vec<Span>) {
        ents.sort_by_key(|span| (span.start_token, span.end_token));
        self.ents = ents;
    }

    pub fn shape(&self, index: usize) -> Option<&str> {
        self.shapes.get(index).and_then(|s| s.as_deref())
    }

    pub fn set_shape(&mut self, index: usize, shape: String) {
        if let Some(slot) = self.shapes.get_mut(index) {
            *slot = Some(shape);
        }
    }

    pub fn is_sent_start(&self, index: usize) -> bool {
        self.sent_starts.get(index).copied().unwrap_or(false)
    }

    pub fn set_sent_start(&mut self, index: usize, value: bool) {
        if let Some(slot) = self.sent_starts.get_mut(index) {
            *slot = value;
        }
    }

    /// Number of sentences marked by a sentence-boundary stage.
    pub fn sent_count(&self) -> usize {
        self.sent_starts.iter().filter(|&&start| start).count()
    }

    /// IOB code and entity label of a token.
    pub fn ent_iob(&self, index: usize) -> (EntIob, Option<&str>) {
        for span in &self.ents {
            if span.start_token == index {
                return (EntIob::Begin, Some(span.label.as_str()));
            }
            if span.start_token < index && index < span.end_token {
                return (EntIob::Inside, Some(span.label.as_str()));
            }
        }
        (EntIob::Outside, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;

    fn doc(text: &str) -> Doc {
        let tokens = Tokenizer::new().unwrap().tokenize(text);
        Doc::new(text, tokens)
    }

    #[test]
    fn test_make_span_slices_original_text() {
        let doc = doc("The food is uniformly exceptional, with");
        let span = doc.make_span(3, 5, "TASTE").unwrap();

        assert_eq!(span.text, "uniformly exceptional");
        assert_eq!((span.start, span.end), (12, 33));
        assert!(doc.make_span(2, 2, "TASTE").is_none());
        assert!(doc.make_span(4, 40, "TASTE").is_none());
    }

    #[test]
    fn test_ents_are_ordered_and_restartable() {
        let mut doc = doc("Great food, fantastic service");
        let late = doc.make_span(3, 4, "TASTE").unwrap();
        let early = doc.make_span(0, 1, "TASTE").unwrap();
        doc.set_ents(vec![late, early]);

        let iter = doc.ents();
        let first_pass: Vec<_> = iter.clone().map(|s| s.text.as_str()).collect();
        let second_pass: Vec<_> = iter.map(|s| s.text.as_str()).collect();
        assert_eq!(first_pass, ["Great", "fantastic"]);
        assert_eq!(first_pass, second_pass);
    }

    #[test]
    fn test_ent_iob() {
        let mut doc = doc("it was pretty good and huge");
        let span = doc.make_span(2, 4, "TASTE").unwrap();
        doc.set_ents(vec![span]);

        assert_eq!(doc.ent_iob(1), (EntIob::Outside, None));
        assert_eq!(doc.ent_iob(2), (EntIob::Begin, Some("TASTE")));
        assert_eq!(doc.ent_iob(3), (EntIob::Inside, Some("TASTE")));
        assert_eq!(doc.ent_iob(4).0.to_string(), "O");
    }
}
