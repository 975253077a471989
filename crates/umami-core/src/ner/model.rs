//! Hashed-feature linear tagger built on candle.
//!
//! Each token's emission scores are the sum of the weight rows selected by its
//! hashed features plus a per-tag bias. Training minimises token-level cross
//! entropy; decoding applies BIO constraints on top of the log-softmax.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{D, DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer as _, ParamsAdamW};

use crate::error::{Result, UmamiError};
use crate::ner::features::FEATURES_PER_TOKEN;

const WEIGHTS: &str = "weights";
const BIAS: &str = "bias";

/// Weights of the entity recognizer.
pub struct EntityModel {
    weights: Var, // [n_buckets, n_tags]
    bias: Var,    // [n_tags]
    n_buckets: usize,
    n_tags: usize,
    device: Device,
}

impl EntityModel {
    /// Zero-initialised model.
    pub fn new(n_buckets: usize, n_tags: usize) -> Result<Self> {
        let device = Device::Cpu;
        Ok(Self {
            weights: Var::zeros((n_buckets, n_tags), DType::F32, &device)?,
            bias: Var::zeros(n_tags, DType::F32, &device)?,
            n_buckets,
            n_tags,
            device,
        })
    }

    pub fn n_tags(&self) -> usize {
        self.n_tags
    }

    pub fn n_buckets(&self) -> usize {
        self.n_buckets
    }

    /// Grow the tag dimension to `n_tags`, keeping learned columns. New
    /// columns start at zero.
    ///
    /// Replaces the underlying variables: optimizers created before the call
    /// no longer track this model.
    pub fn resize(&mut self, n_tags: usize) -> Result<()> {
        if n_tags <= self.n_tags {
            return Ok(());
        }
        let extra = n_tags - self.n_tags;

        let pad_w = Tensor::zeros((self.n_buckets, extra), DType::F32, &self.device)?;
        let weights = Tensor::cat(&[self.weights.as_tensor(), &pad_w], 1)?;
        let pad_b = Tensor::zeros(extra, DType::F32, &self.device)?;
        let bias = Tensor::cat(&[self.bias.as_tensor(), &pad_b], 0)?;

        self.weights = Var::from_tensor(&weights)?;
        self.bias = Var::from_tensor(&bias)?;
        self.n_tags = n_tags;
        Ok(())
    }

    /// Emission logits of shape `[seq_len, n_tags]`.
    ///
    /// `keep_mask`, when given, holds one scaling factor per (token, feature)
    /// pair and implements drop-out on the feature contributions.
    pub fn forward(&self, feature_ids: &[u32], keep_mask: Option<Vec<f32>>) -> Result<Tensor> {
        let seq_len = feature_ids.len() / FEATURES_PER_TOKEN;
        let ids = Tensor::from_vec(feature_ids.to_vec(), feature_ids.len(), &self.device)?;

        let rows = self
            .weights
            .as_tensor()
            .index_select(&ids, 0)?
            .reshape((seq_len, FEATURES_PER_TOKEN, self.n_tags))?;

        let rows = match keep_mask {
            Some(mask) => {
                let mask = Tensor::from_vec(mask, (seq_len, FEATURES_PER_TOKEN, 1), &self.device)?;
                rows.broadcast_mul(&mask)?
            }
            None => rows,
        };

        Ok(rows.sum(1)?.broadcast_add(self.bias.as_tensor())?)
    }

    /// Per-token log-probabilities, `[seq_len][n_tags]`.
    pub fn log_probs(&self, feature_ids: &[u32]) -> Result<Vec<Vec<f32>>> {
        if feature_ids.is_empty() {
            return Ok(Vec::new());
        }
        let logits = self.forward(feature_ids, None)?;
        Ok(candle_nn::ops::log_softmax(&logits, D::Minus1)?.to_vec2::<f32>()?)
    }

    /// Mean cross entropy over the supervised tokens.
    pub fn loss(&self, logits: &Tensor, supervised: &[(u32, u32)]) -> Result<Tensor> {
        let (rows, targets): (Vec<u32>, Vec<u32>) = supervised.iter().copied().unzip();
        let n = rows.len();
        let rows = Tensor::from_vec(rows, n, &self.device)?;
        let targets = Tensor::from_vec(targets, n, &self.device)?;
        let selected = logits.index_select(&rows, 0)?;
        Ok(candle_nn::loss::cross_entropy(&selected, &targets)?)
    }

    /// AdamW over this model's current variables.
    pub fn optimizer(&self, learn_rate: f64, weight_decay: f64) -> Result<AdamW> {
        let params = ParamsAdamW {
            lr: learn_rate,
            weight_decay,
            ..Default::default()
        };
        Ok(AdamW::new(
            vec![self.weights.clone(), self.bias.clone()],
            params,
        )?)
    }

    /// Write weights to a safetensors file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let tensors = HashMap::from([
            (WEIGHTS.to_string(), self.weights.as_tensor().clone()),
            (BIAS.to_string(), self.bias.as_tensor().clone()),
        ]);
        candle_core::safetensors::save(&tensors, path)?;
        Ok(())
    }

    /// Read weights written by [`EntityModel::save`], checking their shape.
    pub fn load(path: &Path, n_buckets: usize, n_tags: usize) -> Result<Self> {
        let device = Device::Cpu;
        let mut tensors = candle_core::safetensors::load(path, &device)?;

        let mut take = |name: &str| {
            tensors.remove(name).ok_or_else(|| {
                UmamiError::IncompatibleSnapshot(format!("tensor {name:?} missing from {}", path.display()))
            })
        };
        let weights = take(WEIGHTS)?;
        let bias = take(BIAS)?;

        if weights.dims() != [n_buckets, n_tags] || bias.dims() != [n_tags] {
            return Err(UmamiError::IncompatibleSnapshot(format!(
                "expected weights [{n_buckets}, {n_tags}] and bias [{n_tags}], found {:?} and {:?}",
                weights.dims(),
                bias.dims()
            )));
        }

        Ok(Self {
            weights: Var::from_tensor(&weights.to_dtype(DType::F32)?)?,
            bias: Var::from_tensor(&bias.to_dtype(DType::F32)?)?,
            n_buckets,
            n_tags,
            device,
        })
    }

    /// Run one optimizer step on `loss`.
    pub fn step(optimizer: &mut AdamW, loss: &Tensor) -> Result<()> {
        optimizer.backward_step(loss)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tokens: usize, bucket: u32) -> Vec<u32> {
        (0..tokens * FEATURES_PER_TOKEN)
            .map(|i| (i as u32 + bucket) % 32)
            .collect()
    }

    #[test]
    fn test_forward_shape() {
        let model = EntityModel::new(32, 3).unwrap();
        let logits = model.forward(&ids(4, 0), None).unwrap();
        assert_eq!(logits.dims(), [4, 3]);
    }

    #[test]
    fn test_resize_keeps_columns() {
        let mut model = EntityModel::new(32, 3).unwrap();
        let mut opt = model.optimizer(0.1, 0.0).unwrap();
        let feature_ids = ids(2, 5);
        let logits = model.forward(&feature_ids, None).unwrap();
        let loss = model.loss(&logits, &[(0, 1), (1, 0)]).unwrap();
        EntityModel::step(&mut opt, &loss).unwrap();

        let before = model.forward(&feature_ids, None).unwrap().to_vec2::<f32>().unwrap();
        model.resize(5).unwrap();
        let after = model.forward(&feature_ids, None).unwrap().to_vec2::<f32>().unwrap();

        assert_eq!(model.n_tags(), 5);
        for (b, a) in before.iter().zip(&after) {
            assert_eq!(&a[..3], &b[..]);
            assert_eq!(&a[3..], &[0.0, 0.0]);
        }
    }

    #[test]
    fn test_step_reduces_loss() {
        let model = EntityModel::new(32, 3).unwrap();
        let mut opt = model.optimizer(0.05, 0.0).unwrap();
        let feature_ids = ids(3, 1);
        let gold = [(0, 0), (1, 1), (2, 2)];

        let first = model.loss(&model.forward(&feature_ids, None).unwrap(), &gold).unwrap();
        let first_value = first.to_scalar::<f32>().unwrap();
        EntityModel::step(&mut opt, &first).unwrap();
        for _ in 0..5 {
            let loss = model.loss(&model.forward(&feature_ids, None).unwrap(), &gold).unwrap();
            EntityModel::step(&mut opt, &loss).unwrap();
        }
        let last = model.loss(&model.forward(&feature_ids, None).unwrap(), &gold).unwrap();

        assert!(last.to_scalar::<f32>().unwrap() < first_value);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = EntityModel::new(16, 3).unwrap();
        model.save(&path).unwrap();

        let loaded = EntityModel::load(&path, 16, 3).unwrap();
        assert_eq!(loaded.n_tags(), 3);
        assert!(matches!(
            EntityModel::load(&path, 16, 5),
            Err(UmamiError::IncompatibleSnapshot(_))
        ));
    }
}
