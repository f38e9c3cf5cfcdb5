//! Analysis window and its safe inverse.
//!
//! The reference computes its own Hanning window by hand
//! (`0.5 - 0.5*cos(2*pi*i/(N-1))`); this crate gets the same window from
//! `apodize`, the windowing crate the surrounding codebase already
//! depends on for exactly this purpose.

/// A Hanning analysis window of length `n`, as `f32`.
pub fn hanning(n: usize) -> Vec<f32> {
    apodize::hanning_iter(n).map(|x| x as f32).collect()
}

/// Undo a Hanning window applied before a forward FFT, without dividing
/// by the (exactly zero) first and last samples.
///
/// `noise_shaping`'s inverse step in the reference divides the
/// reconstructed time-domain signal by the same window used going in;
/// a Hanning window is zero at both endpoints, so a literal division
/// would produce `inf`/`NaN` there. Those two samples carry negligible
/// energy in a single non-overlapped analysis frame, so this leaves
/// them unscaled (equivalent to a one-sided limit of the division)
/// instead of dividing by zero.
pub fn synthesis_divide(samples: &mut [f32], window: &[f32]) {
    debug_assert_eq!(samples.len(), window.len());
    let n = samples.len();
    if n == 0 {
        return;
    }
    for i in 1..n.saturating_sub(1) {
        if window[i] > 1e-6 {
            samples[i] /= window[i];
        }
    }
}
