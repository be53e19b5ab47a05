//! Serialized classifier artifacts and their forward pass.
//!
//! An artifact is a JSON document describing a small dense network over the
//! 40-coefficient feature vector: class names in model order, input
//! standardization vectors, and a stack of dense layers. `validate()`
//! checks every dimension before the registry admits a model, so a
//! shape-inconsistent artifact is a load failure rather than a latent
//! inference bug.

pub mod registry;

use serde::{Deserialize, Serialize};

use crate::features::FEATURE_COEFFS;

/// Artifact schema revision accepted by this build.
pub const ARTIFACT_SCHEMA_VERSION: i64 = 1;

/// A loaded, validated classifier ready for inference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierModel {
    /// Schema revision of the serialized document.
    pub schema_version: i64,
    /// Class labels in model output order, lowercase.
    pub classes: Vec<String>,
    /// Expected feature-vector width.
    pub input_len: usize,
    /// Per-coefficient standardization mean.
    pub feature_mean: Vec<f32>,
    /// Per-coefficient standardization deviation.
    pub feature_std: Vec<f32>,
    /// Dense layers applied in order.
    pub layers: Vec<DenseLayer>,
}

/// One dense layer: `out = activation(weights * in + bias)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Row-major weights, `bias.len()` rows by input-width columns.
    pub weights: Vec<f32>,
    /// One bias per output unit.
    pub bias: Vec<f32>,
    /// Activation applied to the affine output.
    pub activation: Activation,
}

/// Activation functions the artifact format supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// Rectified linear unit.
    Relu,
    /// Softmax over the layer output; produces probability-like scores.
    Softmax,
    /// Identity.
    Linear,
}

impl ClassifierModel {
    /// Check the declared shape end to end.
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version != ARTIFACT_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema_version {} (expected {ARTIFACT_SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        if self.classes.is_empty() {
            return Err("artifact declares no classes".to_string());
        }
        if self.input_len != FEATURE_COEFFS {
            return Err(format!(
                "unsupported input_len {} (expected {FEATURE_COEFFS})",
                self.input_len
            ));
        }
        if self.feature_mean.len() != self.input_len {
            return Err("feature_mean length mismatch".to_string());
        }
        if self.feature_std.len() != self.input_len {
            return Err("feature_std length mismatch".to_string());
        }
        if self.layers.is_empty() {
            return Err("artifact declares no layers".to_string());
        }
        let mut width = self.input_len;
        for (idx, layer) in self.layers.iter().enumerate() {
            let outputs = layer.bias.len();
            if outputs == 0 {
                return Err(format!("layer {idx} has no output units"));
            }
            if layer.weights.len() != outputs * width {
                return Err(format!("layer {idx} weights length mismatch"));
            }
            width = outputs;
        }
        if width != self.classes.len() {
            return Err(format!(
                "final layer width {width} does not match {} classes",
                self.classes.len()
            ));
        }
        Ok(())
    }

    /// Standardize the input and run the forward pass, returning one score
    /// per class in model order. Assumes a validated shape.
    pub fn score(&self, features: &[f32]) -> Vec<f32> {
        let mut current: Vec<f32> = features
            .iter()
            .zip(self.feature_mean.iter().zip(self.feature_std.iter()))
            .map(|(&value, (&mean, &std))| (value - mean) / std.max(1e-6))
            .collect();

        for layer in &self.layers {
            let inputs = current.len();
            let outputs = layer.bias.len();
            let mut next = vec![0.0_f32; outputs];
            for (row, out) in next.iter_mut().enumerate() {
                let mut sum = layer.bias[row];
                let base = row * inputs;
                for (col, &value) in current.iter().enumerate() {
                    sum += layer.weights[base + col] * value;
                }
                *out = sum;
            }
            match layer.activation {
                Activation::Relu => {
                    for value in next.iter_mut() {
                        *value = value.max(0.0);
                    }
                }
                Activation::Softmax => softmax_in_place(&mut next),
                Activation::Linear => {}
            }
            current = next;
        }
        current
    }
}

/// Numerically stable softmax.
pub(crate) fn softmax_in_place(values: &mut [f32]) {
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        let uniform = 1.0 / values.len().max(1) as f32;
        for value in values.iter_mut() {
            *value = uniform;
        }
        return;
    }
    let mut total = 0.0_f32;
    for value in values.iter_mut() {
        *value = (*value - max).exp();
        total += *value;
    }
    if total > 0.0 {
        for value in values.iter_mut() {
            *value /= total;
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Single-layer model whose scores depend only on the bias, useful when a
    /// test needs a known winner regardless of audio content.
    pub(crate) fn bias_only_model(classes: &[&str], bias: &[f32]) -> ClassifierModel {
        ClassifierModel {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            classes: classes.iter().map(|c| c.to_string()).collect(),
            input_len: FEATURE_COEFFS,
            feature_mean: vec![0.0; FEATURE_COEFFS],
            feature_std: vec![1.0; FEATURE_COEFFS],
            layers: vec![DenseLayer {
                weights: vec![0.0; classes.len() * FEATURE_COEFFS],
                bias: bias.to_vec(),
                activation: Activation::Softmax,
            }],
        }
    }
}
