//! Saving and loading pipelines.
//!
//! Snapshot layout:
//!
//! ```text
//! <dir>/
//!   meta.json          name, lang, version, stage order
//!   sentencizer/cfg.json
//!   shaper/cfg.json
//!   ner/cfg.json
//!   ner/model.safetensors
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, UmamiError};
use crate::pipeline::{Component, ComponentKind, Meta, Pipeline, Stage, check_stage_name};
use crate::tokenizer::Tokenizer;

pub(crate) const META_FILE: &str = "meta.json";

/// Bumped when the snapshot layout changes incompatibly.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct StageEntry {
    name: String,
    kind: ComponentKind,
    enabled: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetaFile {
    format_version: u32,
    #[serde(flatten)]
    meta: Meta,
    pipeline: Vec<StageEntry>,
}

/// Whether `dir` holds a pipeline snapshot.
pub fn is_snapshot(dir: impl AsRef<Path>) -> bool {
    dir.as_ref().join(META_FILE).is_file()
}

impl Pipeline {
    /// Write the full pipeline state into `dir`, creating it if needed.
    pub fn to_disk(&self, dir: impl AsRef<Path>) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        for stage in &self.stages {
            stage.component.to_disk(&dir.join(&stage.name))?;
        }

        let meta = MetaFile {
            format_version: FORMAT_VERSION,
            meta: self.meta.clone(),
            pipeline: self
                .stages
                .iter()
                .map(|s| StageEntry {
                    name: s.name.clone(),
                    kind: s.component.kind(),
                    enabled: s.enabled,
                })
                .collect(),
        };
        // meta.json goes last so a half-written snapshot is not recognised
        fs::write(dir.join(META_FILE), serde_json::to_string_pretty(&meta)?)?;

        info!(path = %dir.display(), stages = ?self.stage_names(), "saved pipeline");
        Ok(())
    }

    /// Load a pipeline written by [`Pipeline::to_disk`].
    ///
    /// # Errors
    ///
    /// `UmamiError::SnapshotNotFound` if `dir` has no `meta.json`;
    /// `UmamiError::IncompatibleSnapshot` for other format versions.
    pub fn from_disk(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let meta_path = dir.join(META_FILE);
        if !meta_path.is_file() {
            return Err(UmamiError::SnapshotNotFound(dir.to_path_buf()));
        }

        let file: MetaFile = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        if file.format_version != FORMAT_VERSION {
            return Err(UmamiError::IncompatibleSnapshot(format!(
                "format version {} (expected {})",
                file.format_version, FORMAT_VERSION
            )));
        }

        let mut stages: Vec<Stage> = Vec::with_capacity(file.pipeline.len());
        for entry in file.pipeline {
            check_stage_name(&entry.name)?;
            if stages.iter().any(|s| s.name == entry.name) {
                return Err(UmamiError::DuplicateStage(entry.name));
            }
            let component = Component::from_disk(entry.kind, &dir.join(&entry.name))?;
            stages.push(Stage {
                name: entry.name,
                component,
                enabled: entry.enabled,
            });
        }

        let nlp = Self {
            meta: file.meta,
            tokenizer: Tokenizer::new()?,
            stages,
        };
        info!(path = %dir.display(), stages = ?nlp.stage_names(), "loaded pipeline");
        Ok(nlp)
    }
}
