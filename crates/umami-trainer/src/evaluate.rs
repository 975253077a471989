//! Span-level evaluation against annotated examples.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use anyhow::Result;
use serde::Serialize;
use umami_core::{Example, Pipeline};

/// Match counts for one label, or for all labels together.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PrfCounts {
    pub tp: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl PrfCounts {
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn f_score(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 { 0.0 } else { 2.0 * p * r / (p + r) }
    }

    fn add(&mut self, other: &PrfCounts) {
        self.tp += other.tp;
        self.fp += other.fp;
        self.fn_ += other.fn_;
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Precision, recall and F over exact `(start, end, label)` matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scores {
    pub per_label: BTreeMap<String, PrfCounts>,
    pub examples: usize,
}

impl Scores {
    pub fn total(&self) -> PrfCounts {
        let mut total = PrfCounts::default();
        for counts in self.per_label.values() {
            total.add(counts);
        }
        total
    }

    pub fn precision(&self) -> f64 {
        self.total().precision()
    }

    pub fn recall(&self) -> f64 {
        self.total().recall()
    }

    pub fn f_score(&self) -> f64 {
        self.total().f_score()
    }
}

impl fmt::Display for Scores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<12} {:>6} {:>6} {:>6}", "label", "P", "R", "F")?;
        for (label, c) in &self.per_label {
            writeln!(
                f,
                "{:<12} {:>6.3} {:>6.3} {:>6.3}",
                label,
                c.precision(),
                c.recall(),
                c.f_score()
            )?;
        }
        write!(
            f,
            "{:<12} {:>6.3} {:>6.3} {:>6.3}",
            "overall",
            self.precision(),
            self.recall(),
            self.f_score()
        )
    }
}

/// Run `nlp` over each example's text and compare predicted spans with the
/// gold annotations. Offsets are character offsets, as in [`Example`].
pub fn evaluate(nlp: &Pipeline, examples: &[Example]) -> Result<Scores> {
    let mut scores = Scores {
        examples: examples.len(),
        ..Default::default()
    };

    for example in examples {
        let doc = nlp.process(&example.text)?;
        let predicted: HashSet<(usize, usize, &str)> =
            doc.ents().map(|s| (s.start, s.end, s.label.as_str())).collect();
        let gold: HashSet<(usize, usize, &str)> = example
            .entities
            .iter()
            .map(|a| (a.start, a.end, a.label.as_str()))
            .collect();

        for &(_, _, label) in predicted.intersection(&gold) {
            scores.per_label.entry(label.to_string()).or_default().tp += 1;
        }
        for &(_, _, label) in predicted.difference(&gold) {
            scores.per_label.entry(label.to_string()).or_default().fp += 1;
        }
        for &(_, _, label) in gold.difference(&predicted) {
            scores.per_label.entry(label.to_string()).or_default().fn_ += 1;
        }
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_math() {
        let c = PrfCounts { tp: 3, fp: 1, fn_: 2 };
        assert!((c.precision() - 0.75).abs() < 1e-9);
        assert!((c.recall() - 0.6).abs() < 1e-9);
        assert!((c.f_score() - 2.0 * 0.75 * 0.6 / 1.35).abs() < 1e-9);
        assert_eq!(PrfCounts::default().f_score(), 0.0);
    }

    #[test]
    fn test_untrained_pipeline_has_zero_recall() {
        let nlp = Pipeline::with_defaults("en").unwrap();
        let examples = vec![
            Example::new(
                "The pickles were great addition.",
                vec![umami_core::Annotation::new(17, 22, "TASTE")],
            )
            .unwrap(),
        ];

        let scores = evaluate(&nlp, &examples).unwrap();
        assert_eq!(scores.examples, 1);
        assert_eq!(scores.per_label["TASTE"], PrfCounts { tp: 0, fp: 0, fn_: 1 });
        assert_eq!(scores.recall(), 0.0);
        assert!(scores.to_string().contains("overall"));
    }
}
