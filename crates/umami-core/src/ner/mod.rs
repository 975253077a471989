//! # Entity Recognizer
//!
//! The trainable pipeline stage. Owns the label registry, the feature
//! extractor, the candle model and the constrained BIO decoder.

pub mod bio_tags;
pub mod features;
pub mod gold;
pub mod model;
pub mod viterbi;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use candle_nn::AdamW;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::doc::{Doc, Span};
use crate::error::{Result, UmamiError};
use crate::example::{Example, check_label};

pub use bio_tags::BioTag;
pub use features::{FEATURES_PER_TOKEN, FeatureExtractor};
pub use gold::GoldTags;
pub use model::EntityModel;
pub use viterbi::ViterbiDecoder;

/// Name the entity recognizer is registered under in a pipeline.
pub const NER_STAGE: &str = "ner";

const CFG_FILE: &str = "cfg.json";
const MODEL_FILE: &str = "model.safetensors";

/// Accumulated loss per stage name, e.g. `{"ner": 12.5}`.
pub type Losses = BTreeMap<String, f32>;

/// Construction settings for an [`EntityRecognizer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NerConfig {
    /// Rows of the hashed feature table.
    pub n_buckets: usize,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self { n_buckets: 1 << 16 }
    }
}

impl NerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buckets(mut self, n_buckets: usize) -> Self {
        self.n_buckets = n_buckets.max(1);
        self
    }
}

/// On-disk description of the recognizer, `ner/cfg.json`.
#[derive(Debug, Serialize, Deserialize)]
struct NerState {
    labels: Vec<String>,
    n_buckets: usize,
    features_per_token: usize,
}

/// Optimizer state for one training run.
///
/// Holds the AdamW moments and the drop-out generator. Both persist across
/// every update of the run.
pub struct NerOptimizer {
    adam: AdamW,
    rng: oorandom::Rand32,
    generation: u64,
}

impl NerOptimizer {
    pub fn learning_rate(&self) -> f64 {
        use candle_nn::Optimizer as _;
        self.adam.learning_rate()
    }
}

/// Named-entity recognition stage.
pub struct EntityRecognizer {
    config: NerConfig,
    labels: Vec<String>,
    features: FeatureExtractor,
    model: EntityModel,
    decoder: ViterbiDecoder,
    /// Bumped whenever the model variables are replaced.
    generation: u64,
}

impl EntityRecognizer {
    /// Create a recognizer with no labels.
    pub fn new(config: NerConfig) -> Result<Self> {
        let model = EntityModel::new(config.n_buckets, BioTag::num_tags(0))?;
        Ok(Self {
            features: FeatureExtractor::new(config.n_buckets),
            config,
            labels: Vec::new(),
            model,
            decoder: ViterbiDecoder::new(0),
            generation: 0,
        })
    }

    pub fn config(&self) -> &NerConfig {
        &self.config
    }

    /// Registered labels, in registration order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Register a label. Returns `false` if it was already present.
    ///
    /// Labels are stored verbatim; empty or untrimmed ones are rejected with
    /// `UmamiError::InvalidLabel`, the same rule [`Example::validate`] applies.
    ///
    /// Adding a label grows the model, so any optimizer created earlier must
    /// be recreated with [`EntityRecognizer::create_optimizer`].
    pub fn add_label(&mut self, label: &str) -> Result<bool> {
        check_label(label)?;
        if self.has_label(label) {
            return Ok(false);
        }

        self.labels.push(label.to_string());
        self.model.resize(BioTag::num_tags(self.labels.len()))?;
        self.decoder = ViterbiDecoder::new(self.labels.len());
        self.generation += 1;
        debug!(label, n_labels = self.labels.len(), "registered entity label");
        Ok(true)
    }

    /// Start optimizer state over the current weights. Existing weights are
    /// kept, so this also resumes training of a loaded model.
    pub fn create_optimizer(
        &self,
        learn_rate: f64,
        weight_decay: f64,
        seed: u64,
    ) -> Result<NerOptimizer> {
        Ok(NerOptimizer {
            adam: self.model.optimizer(learn_rate, weight_decay)?,
            rng: oorandom::Rand32::new(seed),
            generation: self.generation,
        })
    }

    /// One gradient step on a single example.
    ///
    /// `doc` must be the tokenized text of `example`. Returns the example's
    /// loss, which is also added to `losses["ner"]`.
    ///
    /// # Errors
    ///
    /// Data-validation errors for malformed annotations (weights untouched),
    /// `UmamiError::InvalidConfig` for a drop-out outside `[0, 1)` or an
    /// optimizer created before the latest label was added.
    pub fn update(
        &mut self,
        example: &Example,
        doc: &Doc,
        drop: f32,
        sgd: &mut NerOptimizer,
        losses: &mut Losses,
    ) -> Result<f32> {
        if !(0.0..1.0).contains(&drop) {
            return Err(UmamiError::InvalidConfig(format!(
                "drop-out must be in [0, 1), got {drop}"
            )));
        }
        if sgd.generation != self.generation {
            return Err(UmamiError::InvalidConfig(
                "optimizer was created before the label set changed; create a new one".into(),
            ));
        }

        let gold = GoldTags::align(example, doc.tokens(), &self.labels)?;
        let supervised = gold.supervised();
        let entry = losses.entry(NER_STAGE.to_string()).or_insert(0.0);
        if supervised.is_empty() {
            debug!(text = %example.text, "no supervised tokens; skipping gradient");
            return Ok(0.0);
        }

        let feature_ids = self.features.extract(doc.tokens());
        let keep_mask = (drop > 0.0).then(|| {
            let scale = 1.0 / (1.0 - drop);
            (0..feature_ids.len())
                .map(|_| if sgd.rng.rand_float() < drop { 0.0 } else { scale })
                .collect::<Vec<f32>>()
        });

        let logits = self.model.forward(&feature_ids, keep_mask)?;
        let loss = self.model.loss(&logits, &supervised)?;
        let value = loss.to_scalar::<f32>()?;
        EntityModel::step(&mut sgd.adam, &loss)?;

        *entry += value;
        Ok(value)
    }

    /// Best tag per token.
    pub fn predict_tags(&self, doc: &Doc) -> Result<Vec<BioTag>> {
        if doc.is_empty() {
            return Ok(Vec::new());
        }
        if self.labels.is_empty() {
            return Ok(vec![BioTag::Outside; doc.len()]);
        }
        let feature_ids = self.features.extract(doc.tokens());
        let scores = self.model.log_probs(&feature_ids)?;
        self.decoder.decode(&scores)
    }

    /// Entity spans for a document, left to right, non-overlapping.
    pub fn predict(&self, doc: &Doc) -> Result<Vec<Span>> {
        let tags = self.predict_tags(doc)?;
        let mut spans = Vec::new();
        let mut open: Option<(usize, usize)> = None;

        let mut close = |open: &mut Option<(usize, usize)>, end: usize| {
            if let Some((start, label)) = open.take() {
                if let Some(span) = doc.make_span(start, end, &self.labels[label]) {
                    spans.push(span);
                }
            }
        };

        for (i, tag) in tags.iter().enumerate() {
            match *tag {
                BioTag::Begin(label) => {
                    close(&mut open, i);
                    open = Some((i, label));
                }
                BioTag::Inside(label) if open.is_some_and(|(_, l)| l == label) => {}
                _ => close(&mut open, i),
            }
        }
        close(&mut open, tags.len());

        Ok(spans)
    }

    /// Set the document's entities.
    pub fn process(&self, doc: &mut Doc) -> Result<()> {
        let spans = self.predict(doc)?;
        doc.set_ents(spans);
        Ok(())
    }

    /// Write `cfg.json` and `model.safetensors` into `dir`.
    pub fn to_disk(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let state = NerState {
            labels: self.labels.clone(),
            n_buckets: self.config.n_buckets,
            features_per_token: FEATURES_PER_TOKEN,
        };
        fs::write(dir.join(CFG_FILE), serde_json::to_string_pretty(&state)?)?;
        self.model.save(&dir.join(MODEL_FILE))
    }

    /// Read a recognizer written by [`EntityRecognizer::to_disk`].
    pub fn from_disk(dir: &Path) -> Result<Self> {
        let cfg_path = dir.join(CFG_FILE);
        if !cfg_path.exists() {
            return Err(UmamiError::SnapshotNotFound(cfg_path));
        }
        let state: NerState = serde_json::from_str(&fs::read_to_string(&cfg_path)?)?;
        if state.features_per_token != FEATURES_PER_TOKEN {
            return Err(UmamiError::IncompatibleSnapshot(format!(
                "snapshot uses {} features per token, this build uses {}",
                state.features_per_token, FEATURES_PER_TOKEN
            )));
        }

        let model = EntityModel::load(
            &dir.join(MODEL_FILE),
            state.n_buckets,
            BioTag::num_tags(state.labels.len()),
        )?;

        Ok(Self {
            config: NerConfig {
                n_buckets: state.n_buckets,
            },
            features: FeatureExtractor::new(state.n_buckets),
            decoder: ViterbiDecoder::new(state.labels.len()),
            labels: state.labels,
            model,
            generation: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example::Annotation;
    use crate::tokenizer::Tokenizer;

    fn doc(text: &str) -> Doc {
        Doc::new(text, Tokenizer::new().unwrap().tokenize(text))
    }

    fn small() -> EntityRecognizer {
        EntityRecognizer::new(NerConfig::new().with_buckets(1 << 12)).unwrap()
    }

    #[test]
    fn test_add_label_is_idempotent() {
        let mut ner = small();
        assert!(ner.add_label("TASTE").unwrap());
        assert!(!ner.add_label("TASTE").unwrap());
        assert_eq!(ner.labels(), ["TASTE"]);
        assert!(ner.add_label("  ").is_err());
        assert!(matches!(ner.add_label("TASTE "), Err(UmamiError::InvalidLabel(_))));
        assert_eq!(ner.labels(), ["TASTE"]);
    }

    #[test]
    fn test_untrained_predicts_nothing() {
        let mut ner = small();
        let d = doc("The pickles were great addition.");
        assert!(ner.predict(&d).unwrap().is_empty());

        ner.add_label("TASTE").unwrap();
        assert_eq!(ner.predict_tags(&d).unwrap().len(), d.len());
    }

    #[test]
    fn test_update_learns_single_example() {
        let mut ner = small();
        ner.add_label("TASTE").unwrap();
        let example = Example::new(
            "The pickles were great addition.",
            vec![Annotation::new(17, 22, "TASTE")],
        )
        .unwrap();
        let d = doc(&example.text);
        let mut sgd = ner.create_optimizer(0.05, 0.0, 7).unwrap();

        let mut losses = Losses::new();
        for _ in 0..30 {
            ner.update(&example, &d, 0.0, &mut sgd, &mut losses).unwrap();
        }

        let spans = ner.predict(&d).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].text, "great");
        assert_eq!(spans[0].label, "TASTE");
        assert!(losses["ner"] > 0.0);
    }

    #[test]
    fn test_update_rejects_malformed_offsets() {
        let mut ner = small();
        ner.add_label("TASTE").unwrap();
        let example = Example::unchecked("0123456789", vec![Annotation::new(5, 3, "TASTE")]);
        let mut sgd = ner.create_optimizer(0.05, 0.0, 7).unwrap();

        let err = ner
            .update(&example, &doc(&example.text), 0.0, &mut sgd, &mut Losses::new())
            .unwrap_err();
        assert!(err.is_data_validation());
    }

    #[test]
    fn test_stale_optimizer_rejected() {
        let mut ner = small();
        ner.add_label("TASTE").unwrap();
        let mut sgd = ner.create_optimizer(0.05, 0.0, 7).unwrap();
        assert_eq!(sgd.learning_rate(), 0.05);
        ner.add_label("SERVICE").unwrap();

        let example = Example::new("Great food", vec![Annotation::new(0, 5, "TASTE")]).unwrap();
        let err = ner
            .update(&example, &doc(&example.text), 0.0, &mut sgd, &mut Losses::new())
            .unwrap_err();
        assert!(matches!(err, UmamiError::InvalidConfig(_)));
    }

    #[test]
    fn test_invalid_dropout_rejected() {
        let mut ner = small();
        ner.add_label("TASTE").unwrap();
        let mut sgd = ner.create_optimizer(0.05, 0.0, 7).unwrap();
        let example = Example::new("Great food", vec![]).unwrap();

        assert!(ner
            .update(&example, &doc(&example.text), 1.0, &mut sgd, &mut Losses::new())
            .is_err());
    }

    #[test]
    fn test_disk_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut ner = small();
        ner.add_label("TASTE").unwrap();
        let example = Example::new("Great food here", vec![Annotation::new(0, 5, "TASTE")]).unwrap();
        let d = doc(&example.text);
        let mut sgd = ner.create_optimizer(0.05, 0.0, 1).unwrap();
        for _ in 0..20 {
            ner.update(&example, &d, 0.0, &mut sgd, &mut Losses::new()).unwrap();
        }

        ner.to_disk(dir.path()).unwrap();
        let loaded = EntityRecognizer::from_disk(dir.path()).unwrap();

        assert_eq!(loaded.labels(), ner.labels());
        assert_eq!(loaded.predict(&d).unwrap(), ner.predict(&d).unwrap());
    }
}
