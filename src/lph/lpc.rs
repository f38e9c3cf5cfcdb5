//! Dynamic-order LPC analysis for the hybrid concealer.

use crate::config::{MAX_LPC_ORDER, MIN_LPC_ORDER};
use crate::spectral::{autocorrelate, levinson_durbin};
use crate::Sample;

/// Normalised residual-energy threshold for fixing the order: looser for
/// unvoiced frames (noise-like spectra never converge as tightly).
fn order_threshold(is_unvoiced: bool) -> f32 {
    if is_unvoiced {
        0.10
    } else {
        0.05
    }
}

/// Autocorrelation + Levinson-Durbin with dynamic order selection.
///
/// Returns `(coeffs, order)` where `coeffs[0] == 1.0` and the rest are
/// zero-padded to `MAX_LPC_ORDER + 1`.
pub fn compute_lpc(samples: &[Sample], is_unvoiced: bool) -> ([f32; MAX_LPC_ORDER + 1], usize) {
    let floats: Vec<f32> = samples.iter().map(|&s| s as f32).collect();
    let autocorr = autocorrelate(&floats, MAX_LPC_ORDER);

    let mut coeffs = [0.0f32; MAX_LPC_ORDER + 1];
    if autocorr[0] < 1e-6 {
        coeffs[0] = 1.0;
        return (coeffs, MIN_LPC_ORDER);
    }

    let threshold = order_threshold(is_unvoiced);
    let (solved, order) = levinson_durbin(&autocorr, MAX_LPC_ORDER, |i, norm_error| {
        i >= MIN_LPC_ORDER && norm_error < threshold
    });
    coeffs[..solved.len()].copy_from_slice(&solved);
    (coeffs, order)
}

/// Predict `pcm[i]` from the `order` preceding samples of `history`,
/// zero for indices before the start of `history`. This is the LPC
/// whitening filter run in synthesis (prediction) direction.
pub fn predict(coeffs: &[f32; MAX_LPC_ORDER + 1], order: usize, history: &[Sample], i: usize) -> f32 {
    let mut pred = 0.0f32;
    for k in 1..=order {
        if i >= k {
            pred += coeffs[k] * history[i - k] as f32;
        }
    }
    pred
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_returns_minimum_order_identity_filter() {
        let samples = vec![0i16; 60];
        let (coeffs, order) = compute_lpc(&samples, false);
        assert_eq!(order, MIN_LPC_ORDER);
        assert_eq!(coeffs[0], 1.0);
        assert!(coeffs[1..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn periodic_tone_yields_bounded_order() {
        let samples: Vec<i16> = (0..60)
            .map(|i| (8000.0 * (i as f32 * 0.2).sin()) as i16)
            .collect();
        let (_, order) = compute_lpc(&samples, false);
        assert!(order >= MIN_LPC_ORDER && order <= MAX_LPC_ORDER);
    }

    #[test]
    fn unvoiced_threshold_is_looser_than_voiced() {
        assert!(order_threshold(true) > order_threshold(false));
    }
}
