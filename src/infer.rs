//! Forward pass and label selection.

use crate::error::ClassifyError;
use crate::features::FeatureVector;
use crate::model::ClassifierModel;

/// One classification: winning label, its score, and the full score row.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Winning class label, lowercase, from the model's class list.
    pub label: String,
    /// Score of the winning class, in [0, 1] for softmax-terminated models.
    pub confidence: f32,
    /// Per-class scores in model order.
    pub scores: Vec<f32>,
}

/// Run the model on one feature vector and select the winning label.
///
/// The winner is the maximum score; exact ties resolve to the lowest class
/// index so repeated runs agree. Shape violations are inference errors:
/// they indicate a programming or configuration bug, not bad user input.
pub fn infer(
    model: &ClassifierModel,
    features: &FeatureVector,
) -> Result<Classification, ClassifyError> {
    if model.input_len != features.as_slice().len() {
        return Err(ClassifyError::Inference {
            reason: format!(
                "model expects {} inputs, feature vector has {}",
                model.input_len,
                features.as_slice().len()
            ),
        });
    }
    if model.classes.is_empty() {
        return Err(ClassifyError::Inference {
            reason: "model declares no classes".into(),
        });
    }

    let scores = model.score(features.as_slice());
    if scores.len() != model.classes.len() {
        return Err(ClassifyError::Inference {
            reason: format!(
                "model produced {} scores for {} classes",
                scores.len(),
                model.classes.len()
            ),
        });
    }
    if scores.iter().any(|score| !score.is_finite()) {
        return Err(ClassifyError::Inference {
            reason: "model produced a non-finite score".into(),
        });
    }

    let mut best = 0usize;
    let mut best_score = f32::NEG_INFINITY;
    for (idx, &score) in scores.iter().enumerate() {
        if score > best_score {
            best_score = score;
            best = idx;
        }
    }

    Ok(Classification {
        label: model.classes[best].clone(),
        confidence: best_score,
        scores,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{FEATURE_COEFFS, extract};
    use crate::model::test_support::bias_only_model;
    use crate::audio::{CanonicalWaveform, SAMPLE_RATE};

    fn any_features() -> FeatureVector {
        let samples: Vec<f32> = (0..SAMPLE_RATE as usize)
            .map(|i| (i as f32 * 0.05).sin())
            .collect();
        extract(&CanonicalWaveform::from_canonical_mono(samples)).unwrap()
    }

    #[test]
    fn selects_class_with_maximum_score() {
        let model = bias_only_model(&["drone", "airplane", "helicopter"], &[0.0, 2.0, 0.0]);
        let result = infer(&model, &any_features()).unwrap();
        assert_eq!(result.label, "airplane");
        assert_eq!(result.scores.len(), 3);
        assert!((result.confidence - result.scores[1]).abs() < 1e-6);
    }

    #[test]
    fn exact_ties_resolve_to_lowest_index() {
        let model = bias_only_model(&["drone", "airplane", "helicopter"], &[1.0, 1.0, 0.0]);
        let result = infer(&model, &any_features()).unwrap();
        assert_eq!(result.label, "drone");
    }

    #[test]
    fn shape_mismatch_is_an_inference_error() {
        let mut model = bias_only_model(&["drone"], &[0.0]);
        model.input_len = FEATURE_COEFFS + 1;
        let err = infer(&model, &any_features()).unwrap_err();
        assert!(matches!(err, ClassifyError::Inference { .. }));
    }

    #[test]
    fn confidence_is_a_probability_for_softmax_models() {
        let model = bias_only_model(&["drone", "airplane", "helicopter"], &[3.0, 0.0, 0.0]);
        let result = infer(&model, &any_features()).unwrap();
        assert!(result.confidence > 0.5 && result.confidence <= 1.0);
        let total: f32 = result.scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
