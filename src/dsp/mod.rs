//! Signal-processing primitives shared by feature extraction.

mod fft;
mod mel;

pub(crate) use fft::{Complex, fft_in_place, hann_window};
pub(crate) use mel::MelFilterBank;
