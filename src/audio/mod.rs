//! Canonical waveform normalization for classification input.
//!
//! Every classification request is reduced to the same decodable form
//! before feature extraction: mono `f32` PCM at [`SAMPLE_RATE`], capped at
//! [`MAX_CLIP_SECONDS`]. Uploads are spooled to a scoped temporary file for
//! decoding; the file is removed on every exit path.

mod decode;

use std::io::Write;
use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::error::ClassifyError;

/// Fixed sample rate of every canonical waveform.
pub const SAMPLE_RATE: u32 = 22_050;
/// Maximum clip duration retained for analysis.
pub const MAX_CLIP_SECONDS: f32 = 5.0;
/// Maximum canonical sample count (`MAX_CLIP_SECONDS` x `SAMPLE_RATE`).
pub const MAX_SAMPLES: usize = (SAMPLE_RATE as usize) * 5;

/// Extension of the canonical raw PCM container, decoded without a demuxer probe.
pub const CANONICAL_EXTENSION: &str = "wav";

/// Mono PCM at [`SAMPLE_RATE`], at most [`MAX_SAMPLES`] samples.
///
/// The invariant is enforced by construction: both constructors downmix,
/// resample, and truncate, so holders never re-check rate or length.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalWaveform {
    samples: Vec<f32>,
}

impl CanonicalWaveform {
    /// Canonicalize interleaved decoder output at an arbitrary rate and layout.
    pub fn from_interleaved(samples: &[f32], sample_rate: u32, channels: u16) -> Self {
        let mono = downmix_to_mono(samples, channels);
        let mut resampled = resample_linear(&mono, sample_rate, SAMPLE_RATE);
        resampled.truncate(MAX_SAMPLES);
        Self { samples: resampled }
    }

    /// Wrap samples that are already mono at [`SAMPLE_RATE`], truncating and
    /// sanitizing. Used by the streaming chunk path.
    pub fn from_canonical_mono(mut samples: Vec<f32>) -> Self {
        samples.truncate(MAX_SAMPLES);
        for sample in samples.iter_mut() {
            *sample = sanitize_sample(*sample);
        }
        Self { samples }
    }

    /// Canonical mono samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of canonical samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the waveform holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Clip duration in seconds at the canonical rate.
    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / SAMPLE_RATE as f32
    }
}

/// Container normalizer: raw upload bytes in, canonical waveform out.
#[derive(Debug, Default, Clone)]
pub struct Normalizer {
    temp_dir: Option<PathBuf>,
}

impl Normalizer {
    /// Normalizer spooling into the system temp directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizer spooling into a caller-owned directory. Useful when the
    /// host wants upload spill files on a specific volume.
    pub fn with_temp_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(dir.into()),
        }
    }

    /// Decode an uploaded container into the canonical waveform.
    ///
    /// The declared extension selects the decode path: the canonical raw PCM
    /// container is read directly, anything else goes through the demuxer
    /// probe. The spooled temporary file is removed before returning on
    /// every path, including failure.
    pub fn normalize(
        &self,
        bytes: &[u8],
        declared_extension: &str,
    ) -> Result<CanonicalWaveform, ClassifyError> {
        let extension = declared_extension
            .trim()
            .trim_start_matches('.')
            .to_ascii_lowercase();
        let spool = self.spool(bytes, &extension)?;
        let decoded = if extension == CANONICAL_EXTENSION {
            decode::decode_canonical_container(spool.path())?
        } else {
            decode::decode_compressed_container(spool.path(), &extension)?
        };
        Ok(CanonicalWaveform::from_interleaved(
            &decoded.samples,
            decoded.sample_rate,
            decoded.channels,
        ))
    }

    fn spool(&self, bytes: &[u8], extension: &str) -> Result<NamedTempFile, ClassifyError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("sonavis-upload-");
        let suffix = format!(".{extension}");
        if !extension.is_empty() {
            builder.suffix(&suffix);
        }
        let mut spool = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(spool_error)?;
        spool.write_all(bytes).map_err(spool_error)?;
        spool.flush().map_err(spool_error)?;
        Ok(spool)
    }
}

// A spool failure is request-scoped and retryable, so it reports on the
// ingestion stage rather than inventing an error kind outside the taxonomy.
fn spool_error(err: std::io::Error) -> ClassifyError {
    ClassifyError::CorruptAudio {
        reason: format!("failed to spool upload to temporary storage: {err}"),
    }
}

fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    if channels == 1 {
        return samples.iter().copied().map(sanitize_sample).collect();
    }
    let frames = samples.len() / channels;
    let mut mono = Vec::with_capacity(frames);
    for frame in 0..frames {
        let start = frame * channels;
        let mut sum = 0.0_f32;
        for &sample in &samples[start..start + channels] {
            sum += sanitize_sample(sample);
        }
        mono.push(sum / channels as f32);
    }
    mono
}

fn resample_linear(samples: &[f32], input_rate: u32, output_rate: u32) -> Vec<f32> {
    let input_rate = input_rate.max(1);
    let output_rate = output_rate.max(1);
    if samples.is_empty() || input_rate == output_rate {
        return samples.to_vec();
    }
    let duration_seconds = samples.len() as f64 / input_rate as f64;
    let out_len = (duration_seconds * output_rate as f64).round().max(1.0) as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = (i as f64 / output_rate as f64) * input_rate as f64;
        out.push(lerp_sample(samples, pos));
    }
    out
}

fn lerp_sample(samples: &[f32], pos: f64) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let idx0 = pos.floor().max(0.0) as usize;
    let frac = (pos - idx0 as f64).clamp(0.0, 1.0) as f32;
    let idx1 = idx0.saturating_add(1).min(samples.len().saturating_sub(1));
    let a = samples.get(idx0).copied().unwrap_or(0.0);
    let b = samples.get(idx1).copied().unwrap_or(a);
    a + (b - a) * frac
}

fn sanitize_sample(sample: f32) -> f32 {
    if sample.is_finite() {
        sample.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
