//! Iterative radix-2 FFT and Hann windowing.

use std::f32::consts::PI;
use std::ops::{Add, Mul, Sub};

/// Single-precision complex value used by the in-place FFT.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Complex {
    pub(crate) re: f32,
    pub(crate) im: f32,
}

impl Complex {
    pub(crate) fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }

    /// Squared magnitude, i.e. the power of this spectral bin.
    pub(crate) fn power(self) -> f32 {
        self.re * self.re + self.im * self.im
    }
}

impl Add for Complex {
    type Output = Complex;

    fn add(self, rhs: Complex) -> Complex {
        Complex::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex {
    type Output = Complex;

    fn sub(self, rhs: Complex) -> Complex {
        Complex::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex {
    type Output = Complex;

    fn mul(self, rhs: Complex) -> Complex {
        Complex::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Periodic-symmetric Hann window of the given length.
pub(crate) fn hann_window(length: usize) -> Vec<f32> {
    if length <= 1 {
        return vec![1.0_f32; length.max(1)];
    }
    let denom = (length - 1) as f32;
    (0..length)
        .map(|n| 0.5_f32 * (1.0 - (2.0 * PI * n as f32 / denom).cos()))
        .collect()
}

/// In-place decimation-in-time FFT. The buffer length must be a power of two.
pub(crate) fn fft_in_place(buffer: &mut [Complex]) -> Result<(), String> {
    let n = buffer.len();
    if n == 0 || !n.is_power_of_two() {
        return Err(format!("FFT length must be a power of two, got {n}"));
    }
    permute_bit_reversed(buffer);

    let mut span = 2usize;
    while span <= n {
        let half = span / 2;
        let step = -2.0_f32 * PI / span as f32;
        for block in (0..n).step_by(span) {
            for k in 0..half {
                let theta = step * k as f32;
                let (sin, cos) = theta.sin_cos();
                let twiddle = Complex::new(cos, sin);
                let even = buffer[block + k];
                let odd = buffer[block + k + half] * twiddle;
                buffer[block + k] = even + odd;
                buffer[block + k + half] = even - odd;
            }
        }
        span *= 2;
    }
    Ok(())
}

fn permute_bit_reversed(buffer: &mut [Complex]) {
    let n = buffer.len();
    let mut j = 0usize;
    for i in 1..n {
        let mut bit = n >> 1;
        while j & bit != 0 {
            j ^= bit;
            bit >>= 1;
        }
        j ^= bit;
        if i < j {
            buffer.swap(i, j);
        }
    }
}
