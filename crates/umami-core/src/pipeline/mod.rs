//! # Pipeline
//!
//! A tokenizer followed by an ordered list of named stages. Stages can be
//! switched off for a scope with [`Pipeline::disable_stages`] or
//! [`Pipeline::select_stages`].
//!
//! ```rust
//! use umami_core::pipeline::Pipeline;
//!
//! let mut nlp = Pipeline::with_defaults("en").unwrap();
//! assert_eq!(nlp.stage_names(), ["sentencizer", "shaper"]);
//!
//! {
//!     let only_ner = nlp.select_stages(&[]);
//!     assert!(only_ner.enabled_stage_names().is_empty());
//! }
//! assert_eq!(nlp.enabled_stage_names(), ["sentencizer", "shaper"]);
//! ```

pub mod components;
pub mod disable;
pub mod persist;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::doc::Doc;
use crate::error::{Result, UmamiError};
use crate::example::Example;
use crate::ner::{EntityRecognizer, Losses, NER_STAGE, NerConfig, NerOptimizer};
use crate::tokenizer::Tokenizer;

pub use components::{Component, ComponentKind, Sentencizer, Shaper};
pub use disable::DisabledStages;

/// Descriptive metadata written to `meta.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    pub lang: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
}

impl Meta {
    fn new(lang: &str) -> Self {
        Self {
            name: "pipeline".to_string(),
            lang: lang.to_string(),
            version: "0.0.0".to_string(),
            description: String::new(),
        }
    }
}

/// Stage names double as snapshot subdirectory names, so they must be a
/// single plain path component that cannot shadow `meta.json`.
pub(crate) fn check_stage_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name == persist::META_FILE
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(UmamiError::InvalidConfig(format!(
            "stage name {name:?} is not a plain directory name"
        )));
    }
    Ok(())
}

struct Stage {
    name: String,
    component: Component,
    enabled: bool,
}

/// Tokenizer plus processing stages.
pub struct Pipeline {
    meta: Meta,
    tokenizer: Tokenizer,
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Pipeline without any stages.
    pub fn blank(lang: &str) -> Result<Self> {
        Ok(Self {
            meta: Meta::new(lang),
            tokenizer: Tokenizer::new()?,
            stages: Vec::new(),
        })
    }

    /// Pipeline with the default non-trainable stages, `sentencizer` and
    /// `shaper`. This is the base for training from scratch.
    pub fn with_defaults(lang: &str) -> Result<Self> {
        let mut nlp = Self::blank(lang)?;
        nlp.add_stage("sentencizer", Component::Sentencizer(Sentencizer::default()))?;
        nlp.add_stage("shaper", Component::Shaper(Shaper::default()))?;
        Ok(nlp)
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn meta_mut(&mut self) -> &mut Meta {
        &mut self.meta
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    /// Append a stage.
    ///
    /// # Errors
    ///
    /// `UmamiError::InvalidConfig` for names that are not a single plain
    /// directory name, `UmamiError::DuplicateStage` if the name is taken.
    pub fn add_stage(&mut self, name: &str, component: Component) -> Result<()> {
        check_stage_name(name)?;
        if self.has_stage(name) {
            return Err(UmamiError::DuplicateStage(name.to_string()));
        }
        self.stages.push(Stage {
            name: name.to_string(),
            component,
            enabled: true,
        });
        Ok(())
    }

    /// Remove a stage and return its component.
    pub fn remove_stage(&mut self, name: &str) -> Result<Component> {
        let pos = self
            .stages
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| UmamiError::UnknownStage(name.to_string()))?;
        Ok(self.stages.remove(pos).component)
    }

    pub fn has_stage(&self, name: &str) -> bool {
        self.stages.iter().any(|s| s.name == name)
    }

    /// All stage names in order, enabled or not.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Names of the stages that currently run.
    pub fn enabled_stage_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.stages.iter().find(|s| s.name == name).map(|s| s.enabled)
    }

    pub fn get_stage(&self, name: &str) -> Result<&Component> {
        self.stages
            .iter()
            .find(|s| s.name == name)
            .map(|s| &s.component)
            .ok_or_else(|| UmamiError::UnknownStage(name.to_string()))
    }

    pub fn get_stage_mut(&mut self, name: &str) -> Result<&mut Component> {
        self.stages
            .iter_mut()
            .find(|s| s.name == name)
            .map(|s| &mut s.component)
            .ok_or_else(|| UmamiError::UnknownStage(name.to_string()))
    }

    /// The `ner` stage.
    pub fn entity_recognizer(&self) -> Result<&EntityRecognizer> {
        match self.get_stage(NER_STAGE)? {
            Component::EntityRecognizer(ner) => Ok(ner),
            other => Err(UmamiError::IncompatibleSnapshot(format!(
                "stage {NER_STAGE:?} is a {} component",
                other.kind()
            ))),
        }
    }

    pub fn entity_recognizer_mut(&mut self) -> Result<&mut EntityRecognizer> {
        match self.get_stage_mut(NER_STAGE)? {
            Component::EntityRecognizer(ner) => Ok(ner),
            other => Err(UmamiError::IncompatibleSnapshot(format!(
                "stage {NER_STAGE:?} is a {} component",
                other.kind()
            ))),
        }
    }

    /// Reuse the `ner` stage, or create one with `config` and append it last.
    pub fn ensure_entity_recognizer(&mut self, config: NerConfig) -> Result<&mut EntityRecognizer> {
        if !self.has_stage(NER_STAGE) {
            info!(n_buckets = config.n_buckets, "adding entity recognizer to pipeline");
            self.add_stage(NER_STAGE, Component::entity_recognizer(config)?)?;
        }
        self.entity_recognizer_mut()
    }

    /// Switch a stage on or off. Returns whether its state changed.
    pub(crate) fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.stages.iter_mut().find(|s| s.name == name) {
            Some(stage) if stage.enabled != enabled => {
                stage.enabled = enabled;
                true
            }
            _ => false,
        }
    }

    /// Disable the named stages until the returned guard is dropped.
    ///
    /// # Errors
    ///
    /// Returns `UmamiError::UnknownStage` if any name is not in the pipeline;
    /// nothing is disabled in that case.
    pub fn disable_stages(&mut self, names: &[&str]) -> Result<DisabledStages<'_>> {
        if let Some(missing) = names.iter().find(|n| !self.has_stage(n)) {
            return Err(UmamiError::UnknownStage(missing.to_string()));
        }
        let names = names.iter().map(|n| n.to_string()).collect();
        Ok(DisabledStages::new(self, names))
    }

    /// Disable every stage except the named ones until the guard is dropped.
    pub fn select_stages(&mut self, keep: &[&str]) -> DisabledStages<'_> {
        let names = self
            .stages
            .iter()
            .filter(|s| !keep.contains(&s.name.as_str()))
            .map(|s| s.name.clone())
            .collect();
        DisabledStages::new(self, names)
    }

    /// Tokenize `text` and run it through a prefix of the enabled stages.
    fn run_stages(&self, text: &str, until_ner: bool) -> Result<Doc> {
        let tokens = self.tokenizer.tokenize(text);
        let mut doc = Doc::new(text, tokens);
        for stage in self.stages.iter().filter(|s| s.enabled) {
            if until_ner && stage.name == NER_STAGE {
                break;
            }
            stage.component.process(&mut doc)?;
        }
        Ok(doc)
    }

    /// Run every enabled stage over `text`.
    pub fn process(&self, text: &str) -> Result<Doc> {
        self.run_stages(text, false)
    }

    /// Process several texts in order.
    pub fn pipe<'t, I>(&'t self, texts: I) -> impl Iterator<Item = Result<Doc>> + 't
    where
        I: IntoIterator<Item = &'t str>,
        I::IntoIter: 't,
    {
        texts.into_iter().map(move |text| self.process(text))
    }

    /// One training step of the `ner` stage on a single example.
    ///
    /// Enabled stages ahead of `ner` run first; disabled ones are skipped.
    pub fn update(
        &mut self,
        example: &Example,
        drop: f32,
        sgd: &mut NerOptimizer,
        losses: &mut Losses,
    ) -> Result<f32> {
        if self.is_enabled(NER_STAGE) == Some(false) {
            return Err(UmamiError::InvalidConfig(format!(
                "stage {NER_STAGE:?} is disabled and cannot be updated"
            )));
        }
        let doc = self.run_stages(&example.text, true)?;
        self.entity_recognizer_mut()?
            .update(example, &doc, drop, sgd, losses)
    }
}
