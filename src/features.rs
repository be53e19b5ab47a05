//! Fixed-length MFCC feature extraction.
//!
//! A canonical waveform is reduced to exactly [`FEATURE_COEFFS`] mean
//! cepstral coefficients: Hann-windowed frames, power spectrum, mel
//! filterbank, DCT-II, then an arithmetic mean over the time axis. The
//! computation is pure and bit-for-bit reproducible for the same input.

use std::sync::LazyLock;

use crate::audio::{CanonicalWaveform, SAMPLE_RATE};
use crate::dsp::{Complex, MelFilterBank, fft_in_place, hann_window};
use crate::error::ClassifyError;

/// Number of cepstral coefficients in every feature vector.
pub const FEATURE_COEFFS: usize = 40;
/// Analysis frame length in samples.
pub const FRAME_SIZE: usize = 2048;
/// Hop between successive analysis frames.
pub const HOP_SIZE: usize = 512;

const MEL_BANDS: usize = 128;
const MEL_F_MIN_HZ: f32 = 20.0;

// The canonical rate and frame size are fixed, so one filterbank serves
// every extraction for the process lifetime.
static FILTER_BANK: LazyLock<MelFilterBank> = LazyLock::new(|| {
    MelFilterBank::new(
        SAMPLE_RATE,
        FRAME_SIZE,
        MEL_BANDS,
        FEATURE_COEFFS,
        MEL_F_MIN_HZ,
        SAMPLE_RATE as f32 * 0.5,
    )
});

/// Exactly [`FEATURE_COEFFS`] coefficients, in band order.
///
/// The fixed-size array carries the length invariant; no holder re-checks it.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    coeffs: [f32; FEATURE_COEFFS],
}

impl FeatureVector {
    /// The coefficients in band order.
    pub fn coeffs(&self) -> &[f32; FEATURE_COEFFS] {
        &self.coeffs
    }

    /// The coefficients as a plain slice for model input.
    pub fn as_slice(&self) -> &[f32] {
        &self.coeffs
    }
}

/// Extract the mean-MFCC feature vector from a canonical waveform.
///
/// Fails with the feature-extraction kind when the waveform is empty or has
/// zero energy throughout, which callers report differently from a decode
/// failure.
pub fn extract(waveform: &CanonicalWaveform) -> Result<FeatureVector, ClassifyError> {
    let samples = waveform.samples();
    if samples.is_empty() {
        return Err(ClassifyError::FeatureExtraction {
            reason: "waveform holds no samples".into(),
        });
    }
    if samples.iter().all(|&sample| sample == 0.0) {
        return Err(ClassifyError::FeatureExtraction {
            reason: "waveform has zero energy throughout".into(),
        });
    }

    let window = hann_window(FRAME_SIZE);
    let mut frame = vec![Complex::default(); FRAME_SIZE];
    let mut power = vec![0.0_f32; FRAME_SIZE / 2 + 1];
    let mut sums = [0.0_f64; FEATURE_COEFFS];
    let mut frame_count = 0usize;

    let mut start = 0usize;
    while start < samples.len() {
        fill_windowed(&mut frame, samples, start, &window);
        fft_in_place(&mut frame).map_err(|reason| ClassifyError::FeatureExtraction { reason })?;
        for (bin, cell) in power.iter_mut().enumerate() {
            *cell = frame[bin].power().max(0.0);
        }
        let cepstra = FILTER_BANK.cepstra_from_power(&power);
        for (sum, value) in sums.iter_mut().zip(cepstra.iter()) {
            *sum += *value as f64;
        }
        frame_count += 1;
        if samples.len() <= FRAME_SIZE {
            break;
        }
        start += HOP_SIZE;
    }

    let mut coeffs = [0.0_f32; FEATURE_COEFFS];
    for (out, sum) in coeffs.iter_mut().zip(sums.iter()) {
        *out = (*sum / frame_count as f64) as f32;
    }
    Ok(FeatureVector { coeffs })
}

fn fill_windowed(frame: &mut [Complex], samples: &[f32], start: usize, window: &[f32]) {
    for (i, cell) in frame.iter_mut().enumerate() {
        let sample = samples.get(start + i).copied().unwrap_or(0.0);
        *cell = Complex::new(sample * window[i], 0.0);
    }
}
