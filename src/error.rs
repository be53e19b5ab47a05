//! Error taxonomy for the classification pipeline.
//!
//! Every failure a classification request can surface is one of the kinds
//! below, tagged with the pipeline stage it originated from. Callers match
//! on the kind; clients receive the stable `code()` string.

use thiserror::Error;

/// Stage of the classification pipeline at which a failure originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    /// Container decode and waveform normalization.
    Normalize,
    /// Feature extraction.
    Extract,
    /// Model registry resolution.
    Resolve,
    /// Model forward pass.
    Infer,
    /// Taxonomy category lookup.
    Taxonomy,
}

impl PipelineStage {
    /// Stable lowercase name used in logs and client responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Normalize => "normalize",
            PipelineStage::Extract => "extract",
            PipelineStage::Resolve => "resolve",
            PipelineStage::Infer => "infer",
            PipelineStage::Taxonomy => "taxonomy",
        }
    }
}

/// Failure kinds for one-shot and streaming classification.
///
/// Nothing escapes the pipeline unclassified: stage-local failures are
/// converted into exactly one of these kinds at the stage boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    /// The container could not be demuxed or holds no audio stream.
    #[error("unsupported audio container: {reason}")]
    UnsupportedFormat {
        /// Decoder-reported cause.
        reason: String,
    },
    /// The container was recognized but its sample data is truncated or invalid.
    #[error("corrupt audio data: {reason}")]
    CorruptAudio {
        /// Decoder-reported cause.
        reason: String,
    },
    /// The waveform yielded no usable analysis frames.
    #[error("feature extraction failed: {reason}")]
    FeatureExtraction {
        /// Extractor-reported cause.
        reason: String,
    },
    /// The model id is outside the configured catalog.
    #[error("unknown model id \"{id}\"")]
    UnknownModel {
        /// The rejected identifier.
        id: String,
    },
    /// The model artifact is missing or failed to deserialize. Never cached;
    /// a later resolve retries the load.
    #[error("model \"{id}\" failed to load: {reason}")]
    ModelLoad {
        /// Catalog id of the artifact.
        id: String,
        /// Loader-reported cause.
        reason: String,
    },
    /// The model rejected the input. A shape mismatch here is a programming
    /// or configuration bug, not a user-input problem.
    #[error("inference rejected input: {reason}")]
    Inference {
        /// Contract violation description.
        reason: String,
    },
    /// The winning label has no persisted category in the taxonomy.
    #[error("no taxonomy category for label \"{label}\"")]
    TaxonomyMismatch {
        /// The unmapped classification label.
        label: String,
    },
}

impl ClassifyError {
    /// Pipeline stage this failure originated from.
    pub fn stage(&self) -> PipelineStage {
        match self {
            ClassifyError::UnsupportedFormat { .. } | ClassifyError::CorruptAudio { .. } => {
                PipelineStage::Normalize
            }
            ClassifyError::FeatureExtraction { .. } => PipelineStage::Extract,
            ClassifyError::UnknownModel { .. } | ClassifyError::ModelLoad { .. } => {
                PipelineStage::Resolve
            }
            ClassifyError::Inference { .. } => PipelineStage::Infer,
            ClassifyError::TaxonomyMismatch { .. } => PipelineStage::Taxonomy,
        }
    }

    /// Stable machine-readable code, one per kind.
    pub fn code(&self) -> &'static str {
        match self {
            ClassifyError::UnsupportedFormat { .. } => "unsupported_format",
            ClassifyError::CorruptAudio { .. } => "corrupt_audio",
            ClassifyError::FeatureExtraction { .. } => "feature_extraction_error",
            ClassifyError::UnknownModel { .. } => "unknown_model",
            ClassifyError::ModelLoad { .. } => "model_load_failure",
            ClassifyError::Inference { .. } => "inference_error",
            ClassifyError::TaxonomyMismatch { .. } => "taxonomy_mismatch",
        }
    }
}
