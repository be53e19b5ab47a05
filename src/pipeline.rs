//! One-shot and streaming classification entry points.
//!
//! Both paths run the same stage sequence (normalize, extract, resolve,
//! infer, record) and both guarantee that every failure leaves as a typed
//! [`ClassifyError`] with its originating stage, and that no temporary
//! artifact survives the call. Calls are independent: the registry cache is
//! the only shared state, so identical inputs classify identically no
//! matter how calls interleave.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{info, warn};

use crate::audio::{CanonicalWaveform, Normalizer};
use crate::error::ClassifyError;
use crate::features;
use crate::infer;
use crate::model::registry::ModelRegistry;
use crate::sink::{RecognitionRecord, RecognitionSink, SourceKind};
use crate::taxonomy::{CategoryId, TaxonomyLookup};

/// One-shot classification request: an uploaded container.
#[derive(Debug, Clone, Copy)]
pub struct FileRequest<'a> {
    /// Raw upload bytes.
    pub bytes: &'a [u8],
    /// Declared file extension, with or without the leading dot.
    pub extension: &'a str,
    /// Catalog id of the model to run.
    pub model_id: &'a str,
    /// Requesting user, forwarded to the recognition sink.
    pub user_id: i64,
}

/// Streaming classification request: one canonical PCM chunk.
///
/// The chunk carries 16-bit little-endian signed mono samples at the
/// canonical rate; no container probe is applied.
#[derive(Debug, Clone, Copy)]
pub struct ChunkRequest<'a> {
    /// Raw PCM chunk bytes.
    pub pcm: &'a [u8],
    /// Catalog id of the model to run.
    pub model_id: &'a str,
    /// Requesting user, forwarded to the recognition sink.
    pub user_id: i64,
}

/// Assembled classification response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Catalog id of the model that produced the result.
    pub model_id: String,
    /// Winning class label, lowercase.
    pub label: String,
    /// Confidence fraction in [0, 1].
    pub confidence: f32,
    /// Confidence on the 0-100 scale, rounded to two decimals.
    pub confidence_percent: f32,
    /// Persisted category id of the winning label. Always present for
    /// one-shot results; best-effort for streaming results.
    pub category_id: Option<CategoryId>,
    /// Per-class scores in model order.
    pub scores: Vec<f32>,
    /// Wall-clock processing time of this request.
    pub processing_ms: u64,
}

/// Composes the classification stages over injected collaborators.
pub struct Pipeline {
    normalizer: Normalizer,
    registry: Arc<ModelRegistry>,
    taxonomy: Arc<dyn TaxonomyLookup>,
    sink: Arc<dyn RecognitionSink>,
}

impl Pipeline {
    /// Pipeline over the given registry and collaborators.
    pub fn new(
        registry: Arc<ModelRegistry>,
        taxonomy: Arc<dyn TaxonomyLookup>,
        sink: Arc<dyn RecognitionSink>,
    ) -> Self {
        Self {
            normalizer: Normalizer::new(),
            registry,
            taxonomy,
            sink,
        }
    }

    /// Replace the default normalizer, e.g. to spool uploads on a specific
    /// volume.
    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Classify one uploaded audio container.
    ///
    /// Runs normalize, extract, resolve, infer in sequence, then attaches
    /// the winning label's persisted category id; a label the taxonomy does
    /// not know is a [`ClassifyError::TaxonomyMismatch`]. Spool files are
    /// removed before returning on every path.
    pub fn classify_file(
        &self,
        request: FileRequest<'_>,
    ) -> Result<ClassificationReport, ClassifyError> {
        let started = Instant::now();
        let result = self.run_file(request, started);
        self.observe(request.model_id, &result);
        result
    }

    /// Classify one canonical PCM chunk.
    ///
    /// No container probe and no cross-call state: each chunk is decoded,
    /// bounded to the canonical clip length, and classified independently,
    /// so the call completes in time bounded by the fixed clip contract.
    /// The taxonomy join is best-effort here; an unmapped label skips the
    /// recognition record instead of failing the classification.
    pub fn classify_chunk(
        &self,
        request: ChunkRequest<'_>,
    ) -> Result<ClassificationReport, ClassifyError> {
        let started = Instant::now();
        let result = self.run_chunk(request, started);
        self.observe(request.model_id, &result);
        result
    }

    fn run_file(
        &self,
        request: FileRequest<'_>,
        started: Instant,
    ) -> Result<ClassificationReport, ClassifyError> {
        let waveform = self.normalizer.normalize(request.bytes, request.extension)?;
        let features = features::extract(&waveform)?;
        let model = self.registry.resolve(request.model_id)?;
        let classification = infer::infer(&model, &features)?;

        let category_id = match self.taxonomy.find_category_id(&classification.label) {
            Ok(Some(id)) => id,
            Ok(None) => {
                return Err(ClassifyError::TaxonomyMismatch {
                    label: classification.label,
                });
            }
            Err(err) => {
                warn!(label = %classification.label, error = %err, "taxonomy lookup failed");
                return Err(ClassifyError::TaxonomyMismatch {
                    label: classification.label,
                });
            }
        };

        let processing_ms = started.elapsed().as_millis() as u64;
        self.record(RecognitionRecord {
            user_id: request.user_id,
            category_id,
            confidence: classification.confidence,
            processing_ms,
            source: SourceKind::File,
        });
        Ok(assemble_report(
            request.model_id,
            classification,
            Some(category_id),
            processing_ms,
        ))
    }

    fn run_chunk(
        &self,
        request: ChunkRequest<'_>,
        started: Instant,
    ) -> Result<ClassificationReport, ClassifyError> {
        let samples = decode_pcm_chunk(request.pcm)?;
        let waveform = CanonicalWaveform::from_canonical_mono(samples);
        let features = features::extract(&waveform)?;
        let model = self.registry.resolve(request.model_id)?;
        let classification = infer::infer(&model, &features)?;

        let category_id = match self.taxonomy.find_category_id(&classification.label) {
            Ok(Some(id)) => Some(id),
            Ok(None) => {
                warn!(label = %classification.label, "no taxonomy category; skipping recognition record");
                None
            }
            Err(err) => {
                warn!(label = %classification.label, error = %err, "taxonomy lookup failed; skipping recognition record");
                None
            }
        };

        let processing_ms = started.elapsed().as_millis() as u64;
        if let Some(category_id) = category_id {
            self.record(RecognitionRecord {
                user_id: request.user_id,
                category_id,
                confidence: classification.confidence,
                processing_ms,
                source: SourceKind::Realtime,
            });
        }
        Ok(assemble_report(
            request.model_id,
            classification,
            category_id,
            processing_ms,
        ))
    }

    fn record(&self, record: RecognitionRecord) {
        match self.sink.record(&record) {
            Ok(log_id) => {
                info!(log_id, source = record.source.as_str(), "recognition recorded");
            }
            Err(err) => {
                warn!(error = %err, "recognition sink failed; classification result unaffected");
            }
        }
    }

    fn observe(&self, model_id: &str, result: &Result<ClassificationReport, ClassifyError>) {
        match result {
            Ok(report) => info!(
                model = model_id,
                label = %report.label,
                confidence = report.confidence,
                processing_ms = report.processing_ms,
                "classification complete"
            ),
            Err(err) => warn!(
                model = model_id,
                stage = err.stage().as_str(),
                code = err.code(),
                error = %err,
                "classification failed"
            ),
        }
    }
}

fn assemble_report(
    model_id: &str,
    classification: infer::Classification,
    category_id: Option<CategoryId>,
    processing_ms: u64,
) -> ClassificationReport {
    ClassificationReport {
        model_id: model_id.to_string(),
        label: classification.label,
        confidence: classification.confidence,
        confidence_percent: percent_rounded(classification.confidence),
        category_id,
        scores: classification.scores,
        processing_ms,
    }
}

fn percent_rounded(fraction: f32) -> f32 {
    ((fraction as f64) * 10_000.0).round() as f32 / 100.0
}

fn decode_pcm_chunk(bytes: &[u8]) -> Result<Vec<f32>, ClassifyError> {
    if bytes.is_empty() {
        return Err(ClassifyError::CorruptAudio {
            reason: "PCM chunk holds no samples".into(),
        });
    }
    if bytes.len() % 2 != 0 {
        return Err(ClassifyError::CorruptAudio {
            reason: "PCM chunk byte count is not a whole number of 16-bit samples".into(),
        });
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32_768.0)
        .collect())
}
