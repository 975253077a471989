//! Shared pieces of the command-line tools.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;
use tracing_subscriber::EnvFilter;
use umami_core::{Doc, Example, Pipeline};

use crate::data;
use crate::trainer::TrainConfig;

/// Where trained snapshots go unless told otherwise.
pub const DEFAULT_OUTPUT_DIR: &str = "models/en_rev_taste";

/// Options accepted by every training tool.
#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    /// Continue from a saved snapshot. Without it a fresh pipeline is built
    #[arg(short, long, env = "UMAMI_MODEL")]
    pub model: Option<PathBuf>,

    /// Directory the trained snapshot is written to
    #[arg(short, long, env = "UMAMI_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output_dir: PathBuf,

    /// Number of training epochs
    #[arg(short, long, env = "UMAMI_N_ITER")]
    pub n_iter: Option<usize>,

    /// JSON or JSONL training file (defaults to the bundled reviews)
    #[arg(short, long, env = "UMAMI_DATA")]
    pub data: Option<PathBuf>,

    /// Seed for shuffling and drop-out
    #[arg(long, env = "UMAMI_SEED")]
    pub seed: Option<u64>,

    /// Drop-out probability, in [0, 1)
    #[arg(long)]
    pub dropout: Option<f32>,
}

impl TrainArgs {
    /// Merge the flags over a tool's own defaults.
    pub fn train_config(&self, defaults: TrainConfig) -> TrainConfig {
        let mut config = defaults;
        if let Some(n_iter) = self.n_iter {
            config.n_iter = n_iter;
        }
        if let Some(dropout) = self.dropout {
            config.dropout = dropout;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config
    }

    /// Examples from `--data`, or from `bundled` when the flag is absent.
    pub fn examples(&self, bundled: fn() -> Result<Vec<Example>>) -> Result<Vec<Example>> {
        match &self.data {
            Some(path) => data::load_examples(path),
            None => bundled(),
        }
    }
}

/// Install the `fmt` subscriber. `RUST_LOG` overrides the `info` default.
///
/// Call once, at the top of `main`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load the snapshot at `model`, or build a fresh `en` pipeline.
pub fn load_or_create_pipeline(model: Option<&Path>) -> Result<Pipeline> {
    match model {
        Some(path) => {
            let nlp = Pipeline::from_disk(path)
                .with_context(|| format!("failed to load model from {}", path.display()))?;
            println!("Loaded model '{}'", path.display());
            Ok(nlp)
        }
        None => {
            let nlp = Pipeline::with_defaults("en")?;
            println!("Created blank 'en' model");
            Ok(nlp)
        }
    }
}

pub fn save_pipeline(nlp: &Pipeline, dir: &Path) -> Result<()> {
    nlp.to_disk(dir)
        .with_context(|| format!("failed to save model to {}", dir.display()))?;
    println!("Saved model to {}", dir.display());
    Ok(())
}

/// Reload a saved snapshot for a final check.
pub fn reload_pipeline(dir: &Path) -> Result<Pipeline> {
    println!("Loading from {}", dir.display());
    let nlp = Pipeline::from_disk(dir)
        .with_context(|| format!("failed to load model from {}", dir.display()))?;
    info!(name = %nlp.meta().name, stages = ?nlp.stage_names(), "reloaded snapshot");
    Ok(nlp)
}

/// Format a document's entities as `[("text", "LABEL"), ...]`.
pub fn format_entities(doc: &Doc) -> String {
    let pairs: Vec<String> = doc
        .ents()
        .map(|s| format!("({:?}, {:?})", s.text, s.label))
        .collect();
    format!("[{}]", pairs.join(", "))
}

/// One line per token: text, IOB code, entity type, shape, sentence start.
pub fn format_tokens(doc: &Doc) -> String {
    let mut lines = Vec::with_capacity(doc.len());
    for token in doc.tokens() {
        let (iob, label) = doc.ent_iob(token.index);
        lines.push(format!(
            "{:<16} {} {:<8} {:<8} {}",
            token.text,
            iob,
            label.unwrap_or("-"),
            doc.shape(token.index).unwrap_or("-"),
            if doc.is_sent_start(token.index) { "sent_start" } else { "" }
        ));
    }
    lines.join("\n")
}
