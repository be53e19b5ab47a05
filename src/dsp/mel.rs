//! Triangular mel filterbank with a cepstral (DCT-II) projection.

const LOG_FLOOR: f64 = 1e-12;

/// Precomputed mel filterbank and DCT basis for a fixed FFT configuration.
pub(crate) struct MelFilterBank {
    filters: Vec<TriFilter>,
    // dct_basis[k][m] = cos(pi * k * (m + 0.5) / bands)
    dct_basis: Vec<Vec<f64>>,
}

struct TriFilter {
    first_bin: usize,
    weights: Vec<f32>,
}

impl MelFilterBank {
    pub(crate) fn new(
        sample_rate: u32,
        fft_len: usize,
        bands: usize,
        coeffs: usize,
        f_min: f32,
        f_max: f32,
    ) -> Self {
        let edges = band_edge_bins(sample_rate, fft_len, bands, f_min, f_max);
        let filters = (0..bands)
            .map(|band| {
                let left = edges[band];
                let center = edges[band + 1];
                let right = edges[band + 2].max(center + 1);
                TriFilter::build(left, center, right)
            })
            .collect();
        Self {
            filters,
            dct_basis: dct_ii_basis(bands, coeffs),
        }
    }

    pub(crate) fn coeff_count(&self) -> usize {
        self.dct_basis.len()
    }

    /// Project one power spectrum onto the filterbank and return cepstral
    /// coefficients in band order.
    pub(crate) fn cepstra_from_power(&self, power: &[f32]) -> Vec<f32> {
        let log_energies: Vec<f64> = self
            .filters
            .iter()
            .map(|filter| filter.apply(power).max(LOG_FLOOR).ln())
            .collect();
        self.dct_basis
            .iter()
            .map(|row| {
                let mut acc = 0.0_f64;
                for (basis, energy) in row.iter().zip(log_energies.iter()) {
                    acc += basis * energy;
                }
                acc as f32
            })
            .collect()
    }
}

impl TriFilter {
    fn build(left: usize, center: usize, right: usize) -> Self {
        let mut weights = Vec::with_capacity(right.saturating_sub(left) + 1);
        for bin in left..=right {
            let w = if bin < center {
                if center == left {
                    0.0
                } else {
                    (bin - left) as f32 / (center - left) as f32
                }
            } else if right == center {
                0.0
            } else {
                (right - bin) as f32 / (right - center) as f32
            };
            weights.push(w);
        }
        Self {
            first_bin: left,
            weights,
        }
    }

    fn apply(&self, power: &[f32]) -> f64 {
        let mut acc = 0.0_f64;
        for (offset, &weight) in self.weights.iter().enumerate() {
            if weight <= 0.0 {
                continue;
            }
            let value = power
                .get(self.first_bin + offset)
                .copied()
                .unwrap_or(0.0)
                .max(0.0);
            acc += value as f64 * weight as f64;
        }
        acc
    }
}

fn band_edge_bins(
    sample_rate: u32,
    fft_len: usize,
    bands: usize,
    f_min: f32,
    f_max: f32,
) -> Vec<usize> {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let f_max = f_max.min(nyquist).max(f_min);
    let mel_min = hz_to_mel(f_min);
    let mel_max = hz_to_mel(f_max);
    (0..bands + 2)
        .map(|i| {
            let t = i as f32 / (bands + 1) as f32;
            let hz = mel_to_hz(mel_min + (mel_max - mel_min) * t);
            freq_to_bin(hz, sample_rate, fft_len)
        })
        .collect()
}

fn freq_to_bin(freq_hz: f32, sample_rate: u32, fft_len: usize) -> usize {
    let nyquist = sample_rate.max(1) as f32 * 0.5;
    let freq = freq_hz.clamp(0.0, nyquist);
    (((freq * fft_len as f32) / sample_rate.max(1) as f32).floor() as usize).min(fft_len / 2)
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0_f32 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0_f32 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

fn dct_ii_basis(bands: usize, coeffs: usize) -> Vec<Vec<f64>> {
    let n = bands.max(1) as f64;
    (0..coeffs)
        .map(|k| {
            (0..bands)
                .map(|m| (std::f64::consts::PI * k as f64 * (m as f64 + 0.5) / n).cos())
                .collect()
        })
        .collect()
}
