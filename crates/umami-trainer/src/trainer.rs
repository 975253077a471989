//! Training loop for the entity recognizer.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use tracing::{debug, info};
use umami_core::{Example, Losses, NER_STAGE, NerConfig, Pipeline, UmamiError};

/// Settings for one training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Number of passes over the examples.
    pub n_iter: usize,
    /// Drop-out probability applied to feature contributions, in `[0, 1)`.
    pub dropout: f32,
    pub learn_rate: f64,
    pub weight_decay: f64,
    /// Fixes shuffling and drop-out. `None` seeds from the clock.
    pub seed: Option<u64>,
    /// Labels registered before training, on top of those used by the data.
    pub labels: Vec<String>,
    /// Used only when the pipeline has no entity recognizer yet.
    pub ner: NerConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            n_iter: 20,
            dropout: 0.35,
            learn_rate: 0.01,
            weight_decay: 0.0,
            seed: None,
            labels: Vec::new(),
            ner: NerConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_dropout(mut self, dropout: f32) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_learn_rate(mut self, learn_rate: f64) -> Self {
        self.learn_rate = learn_rate;
        self
    }

    pub fn with_weight_decay(mut self, weight_decay: f64) -> Self {
        self.weight_decay = weight_decay;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_ner(mut self, ner: NerConfig) -> Self {
        self.ner = ner;
        self
    }

    /// Reject settings the training loop cannot run with.
    pub fn validate(&self) -> Result<(), UmamiError> {
        if self.n_iter == 0 {
            return Err(UmamiError::InvalidConfig("n_iter must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(UmamiError::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.learn_rate > 0.0) {
            return Err(UmamiError::InvalidConfig(format!(
                "learn_rate must be positive, got {}",
                self.learn_rate
            )));
        }
        Ok(())
    }
}

/// Outcome of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub losses: Losses,
    /// Gradient updates performed in this epoch.
    pub updates: usize,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingReport {
    pub epochs: Vec<EpochReport>,
    pub seed: u64,
}

impl TrainingReport {
    pub fn total_updates(&self) -> usize {
        self.epochs.iter().map(|e| e.updates).sum()
    }

    pub fn final_loss(&self) -> Option<f32> {
        self.epochs
            .last()
            .and_then(|e| e.losses.get(NER_STAGE).copied())
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// Fisher-Yates over presentation order; examples themselves are untouched.
fn shuffle(order: &mut [usize], rng: &mut oorandom::Rand64) {
    for i in (1..order.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        order.swap(i, j);
    }
}

/// Trains the `ner` stage of a pipeline.
pub struct Trainer {
    config: TrainConfig,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Train without a per-epoch callback.
    pub fn train(&self, nlp: &mut Pipeline, examples: &[Example]) -> Result<TrainingReport> {
        self.train_with(nlp, examples, |_| {})
    }

    /// Ensure the `ner` stage and labels exist, then run `n_iter` shuffled
    /// epochs of single-example updates with every other stage disabled.
    ///
    /// `on_epoch` sees each epoch's report as soon as it finishes.
    ///
    /// # Errors
    ///
    /// Fails before any epoch on an empty example set or invalid config, and
    /// aborts on the first example that fails to update. Disabled stages are
    /// re-enabled in every case.
    pub fn train_with<F>(
        &self,
        nlp: &mut Pipeline,
        examples: &[Example],
        mut on_epoch: F,
    ) -> Result<TrainingReport>
    where
        F: FnMut(&EpochReport),
    {
        if examples.is_empty() {
            return Err(UmamiError::EmptyTrainingSet.into());
        }
        self.config.validate()?;

        let seed = self.config.seed.unwrap_or_else(clock_seed);
        let ner = nlp.ensure_entity_recognizer(self.config.ner.clone())?;
        let data_labels = crate::data::collect_labels(examples);
        for label in self.config.labels.iter().chain(&data_labels) {
            if ner.add_label(label)? {
                info!(label = %label, "added entity label");
            }
        }
        let mut sgd = ner.create_optimizer(self.config.learn_rate, self.config.weight_decay, seed)?;
        let mut rng = oorandom::Rand64::new(u128::from(seed));

        info!(
            examples = examples.len(),
            n_iter = self.config.n_iter,
            dropout = self.config.dropout,
            learn_rate = sgd.learning_rate(),
            seed,
            "starting entity recognizer training"
        );

        let mut only_ner = nlp.select_stages(&[NER_STAGE]);
        let mut report = TrainingReport {
            epochs: Vec::with_capacity(self.config.n_iter),
            seed,
        };
        let mut order: Vec<usize> = (0..examples.len()).collect();

        for epoch in 1..=self.config.n_iter {
            shuffle(&mut order, &mut rng);
            let mut losses = Losses::new();
            let mut updates = 0;

            for &idx in &order {
                let loss = only_ner.update(&examples[idx], self.config.dropout, &mut sgd, &mut losses)?;
                updates += 1;
                debug!(epoch, example = idx, loss, "update");
            }

            info!(epoch, n_iter = self.config.n_iter, ?losses, "epoch complete");
            let epoch_report = EpochReport {
                epoch,
                losses,
                updates,
            };
            on_epoch(&epoch_report);
            report.epochs.push(epoch_report);
        }

        Ok(report)
    }
}

impl Default for Trainer {
    fn default() -> Self {
        Self::new(TrainConfig::default())
    }
}
