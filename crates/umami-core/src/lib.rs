//! # Umami Core
//!
//! Tokenizer, stage pipeline and trainable entity recognizer used to learn
//! custom entity labels (such as `TASTE`) from a handful of annotated
//! restaurant reviews.
//!
//! ## Quick Start
//!
//! ```rust
//! use umami_core::{Annotation, Example, Losses, NerConfig, Pipeline};
//!
//! let mut nlp = Pipeline::with_defaults("en").unwrap();
//! let ner = nlp.ensure_entity_recognizer(NerConfig::default()).unwrap();
//! ner.add_label("TASTE").unwrap();
//! let mut sgd = ner.create_optimizer(0.05, 0.0, 42).unwrap();
//!
//! let example = Example::new(
//!     "The pickles were great addition.",
//!     vec![Annotation::new(17, 22, "TASTE")],
//! )
//! .unwrap();
//!
//! let mut losses = Losses::new();
//! {
//!     let mut only_ner = nlp.select_stages(&["ner"]);
//!     for _ in 0..20 {
//!         only_ner.update(&example, 0.0, &mut sgd, &mut losses).unwrap();
//!     }
//! }
//!
//! let doc = nlp.process("The pickles were great addition.").unwrap();
//! assert_eq!(doc.ent_pairs(), [("great".to_string(), "TASTE".to_string())]);
//! ```
pub mod doc;
pub mod error;
pub mod example;
pub mod ner;
pub mod pipeline;
pub mod tokenizer;

// Re-export primary API
pub use doc::{Doc, EntIob, Span};
pub use error::{ErrorKind, Result, UmamiError};
pub use example::{Annotation, Example};
pub use ner::{BioTag, EntityRecognizer, Losses, NER_STAGE, NerConfig, NerOptimizer};
pub use pipeline::persist::is_snapshot;
pub use pipeline::{Component, ComponentKind, DisabledStages, Meta, Pipeline};
pub use tokenizer::{Token, Tokenizer};
