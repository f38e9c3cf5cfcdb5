//! Voicing decision: zero-crossing rate, energy, and spectral flatness.

use crate::lph::frame::frame_energy;
use crate::spectral::Fft;
use crate::Sample;

/// Round `n` up to the next power of two, for FFT sizing. The reference
/// hands its frame size straight to an FFT that only accepts powers of
/// two (`FRAME_SIZE=60` at 8 kHz is not one, so that call would in fact
/// fail there); this crate zero-pads the analysis window to the next
/// valid size instead of reproducing that dead path.
pub fn next_pow2(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let mut p = 1usize;
    while p < n {
        p <<= 1;
    }
    p
}

/// Zero-crossing rate, normalised to `frame.len()`.
fn zero_crossing_rate(frame: &[Sample]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] > 0 && w[1] < 0) || (w[0] < 0 && w[1] > 0))
        .count();
    crossings as f32 / frame.len() as f32
}

/// Geometric-mean / arithmetic-mean ratio of the magnitude spectrum,
/// over bins `[1, fft.size()/2)` (DC and Nyquist excluded).
fn spectral_flatness(frame: &[Sample], fft: &dyn Fft) -> f32 {
    let size = fft.size();
    let mut buf = vec![0.0f32; 2 * size];
    for (i, &s) in frame.iter().enumerate() {
        buf[2 * i] = s as f32 / 32768.0;
    }
    fft.forward(&mut buf);

    let half = size / 2;
    if half < 2 {
        return 0.0;
    }
    let mut geo_sum = 0.0f32;
    let mut arith_sum = 0.0f32;
    for k in 1..half {
        let re = buf[2 * k];
        let im = buf[2 * k + 1];
        let mag = (re * re + im * im).sqrt();
        geo_sum += (mag + 1e-6).ln();
        arith_sum += mag;
    }
    let count = (half - 1) as f32;
    let geo_mean = (geo_sum / count).exp();
    let arith_mean = arith_sum / count;
    if arith_mean < 1e-6 {
        0.0
    } else {
        geo_mean / arith_mean
    }
}

/// Decide whether `frame` is unvoiced, by zero-crossing rate, energy
/// and spectral flatness. Returns `(is_unvoiced, spectral_flatness)`.
pub fn is_unvoiced(frame: &[Sample], fft: &dyn Fft) -> (bool, f32) {
    let zcr = zero_crossing_rate(frame);
    let energy = frame_energy(frame);
    let flatness = spectral_flatness(frame, fft);

    let high_zcr = zcr > 0.25;
    let low_energy = energy < 800.0;
    let flat_spectrum = flatness > 0.6;

    (high_zcr && (low_energy || flat_spectrum), flatness)
}
