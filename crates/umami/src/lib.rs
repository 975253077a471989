//! # Umami
//!
//! Teach an entity recognizer new labels, such as `TASTE` mentions in
//! restaurant reviews, from a handful of annotated examples.
//!
//! This crate re-exports [`umami_core`] (tokenizer, pipeline, entity
//! recognizer, persistence) and [`umami_trainer`] (training loop, datasets,
//! evaluation).
//!
//! ```rust,no_run
//! use umami::{Pipeline, TrainConfig, Trainer, data};
//!
//! let examples = data::taste_reviews().unwrap();
//! let mut nlp = Pipeline::with_defaults("en").unwrap();
//! Trainer::new(TrainConfig::new().with_label("TASTE"))
//!     .train(&mut nlp, &examples)
//!     .unwrap();
//! nlp.to_disk("models/en_rev_taste").unwrap();
//! ```

pub use umami_core::*;
pub use umami_trainer::{
    EpochReport, PrfCounts, Scores, TrainConfig, Trainer, TrainingReport, cli, data, evaluate,
};
