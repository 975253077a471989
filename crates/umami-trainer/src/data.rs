//! Data loading for annotated review examples.
//!
//! Files are either a JSON array of examples or JSON Lines with one example
//! per line:
//!
//! ```text
//! {"text": "The pickles were great addition.", "entities": [[17, 22, "TASTE"]]}
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use umami_core::Example;

/// Generic review set with `TASTE` spans, used by `train-ner`.
const REVIEWS_BASIC: &str = include_str!("../data/reviews_basic.jsonl");

/// Larger `TASTE` set used by `train-new-entity`.
const REVIEWS_TASTE: &str = include_str!("../data/reviews_taste.jsonl");

/// Unlabelled sentences used to eyeball a trained model.
const PROBE_TEXTS: &str = include_str!("../data/probe_texts.json");

/// Parse examples from a JSON array or JSON Lines string.
pub fn parse_examples(content: &str) -> Result<Vec<Example>> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("invalid JSON example array");
    }

    let mut examples = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let example: Example = serde_json::from_str(line)
            .with_context(|| format!("invalid example on line {}", lineno + 1))?;
        examples.push(example);
    }
    Ok(examples)
}

/// Load examples from a file.
pub fn load_examples<P: AsRef<Path>>(path: P) -> Result<Vec<Example>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read training data {}", path.display()))?;
    parse_examples(&content).with_context(|| format!("in {}", path.display()))
}

pub fn basic_reviews() -> Result<Vec<Example>> {
    parse_examples(REVIEWS_BASIC)
}

pub fn taste_reviews() -> Result<Vec<Example>> {
    parse_examples(REVIEWS_TASTE)
}

pub fn probe_texts() -> Result<Vec<String>> {
    serde_json::from_str(PROBE_TEXTS).context("invalid bundled probe texts")
}

/// Distinct labels used across `examples`, in order of first appearance.
pub fn collect_labels(examples: &[Example]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for example in examples {
        for label in example.labels() {
            if !labels.iter().any(|l| l == label) {
                labels.push(label.to_string());
            }
        }
    }
    labels
}
