use std::path::{Path, PathBuf};

use sonavis::audio::SAMPLE_RATE;
use sonavis::features::FEATURE_COEFFS;
use sonavis::model::{ARTIFACT_SCHEMA_VERSION, Activation, ClassifierModel, DenseLayer};

pub const CLASSES: [&str; 3] = ["drone", "airplane", "helicopter"];

/// Classifier whose bias keeps "drone" winning with confidence above 0.5
/// regardless of audio content, so end-to-end runs have a known outcome.
pub fn drone_leaning_model() -> ClassifierModel {
    bias_model(&[2.0, 0.3, 0.2])
}

/// Classifier whose scores genuinely depend on the feature vector, for
/// determinism and interleaving checks.
pub fn content_sensitive_model() -> ClassifierModel {
    let mut model = bias_model(&[0.1, 0.2, 0.3]);
    let weights = &mut model.layers[0].weights;
    for row in 0..CLASSES.len() {
        for col in 0..FEATURE_COEFFS {
            let sign = if col % 2 == 0 { 1.0 } else { -1.0 };
            weights[row * FEATURE_COEFFS + col] = 0.02 * (row + 1) as f32 * sign;
        }
    }
    model
}

pub fn bias_model(bias: &[f32]) -> ClassifierModel {
    ClassifierModel {
        schema_version: ARTIFACT_SCHEMA_VERSION,
        classes: CLASSES.iter().map(|c| c.to_string()).collect(),
        input_len: FEATURE_COEFFS,
        feature_mean: vec![0.0; FEATURE_COEFFS],
        feature_std: vec![1.0; FEATURE_COEFFS],
        layers: vec![DenseLayer {
            weights: vec![0.0; CLASSES.len() * FEATURE_COEFFS],
            bias: bias.to_vec(),
            activation: Activation::Softmax,
        }],
    }
}

pub fn write_artifact(path: &Path, model: &ClassifierModel) {
    std::fs::write(path, serde_json::to_string(model).expect("serialize artifact"))
        .expect("write artifact");
}

/// Write a catalog listing (id, artifact filename) pairs and return its path.
pub fn write_catalog(dir: &Path, entries: &[(&str, &str)]) -> PathBuf {
    let mut text = String::new();
    for (id, file) in entries {
        text.push_str(&format!("[models.\"{id}\"]\npath = \"{file}\"\n\n"));
    }
    let path = dir.join("catalog.toml");
    std::fs::write(&path, text).expect("write catalog");
    path
}

pub fn tone_samples(freq: f32, seconds: f32) -> Vec<f32> {
    let len = (seconds * SAMPLE_RATE as f32) as usize;
    (0..len)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            0.4 * (2.0 * std::f32::consts::PI * freq * t).sin()
        })
        .collect()
}

pub fn wav_bytes(samples: &[f32]) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create wav writer");
        for &sample in samples {
            writer.write_sample(sample).expect("write wav sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

pub fn pcm_chunk(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let quantized = (sample.clamp(-1.0, 1.0) * 32_767.0) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }
    bytes
}
