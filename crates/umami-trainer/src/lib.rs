//! # Umami Trainer
//!
//! Incremental label training for the `ner` stage of an umami pipeline,
//! plus the dataset loaders, span evaluation and shared CLI plumbing used
//! by the `train-ner`, `train-new-entity` and `ner-test` tools.

pub mod cli;
pub mod data;
pub mod evaluate;
pub mod trainer;

pub use data::{collect_labels, load_examples, parse_examples};
pub use evaluate::{PrfCounts, Scores, evaluate};
pub use trainer::{EpochReport, TrainConfig, Trainer, TrainingReport};
