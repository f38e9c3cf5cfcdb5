//! Pitch period estimation for the hybrid concealer.
//!
//! A single-pass pre-emphasised cross-correlation search, smoothed in
//! the log domain and blended with the previous estimate — simpler than
//! C1's coarse/fine search, but cheap enough to run on every frame
//! rather than only at erasure onset.

use crate::Sample;

/// Pre-emphasise `samples` with the fixed one-tap filter
/// `x'[i] = x[i] - 0.97*x[i-1]` (`x[-1]` taken as zero).
fn pre_emphasis(samples: &[Sample]) -> Vec<f32> {
    let mut out = Vec::with_capacity(samples.len());
    let mut prev = 0.0f32;
    for &s in samples {
        let cur = s as f32;
        out.push(cur - 0.97 * prev);
        prev = cur;
    }
    out
}

/// Estimate the pitch period of `samples`, blending with `prev_period`
/// for temporal smoothness.
///
/// `pitch_min`/`pitch_max` bound the search (inclusive); the final
/// estimate is `round(0.7*best + 0.3*prev_period)` and is not clamped
/// to that range, matching the reference.
pub fn find_pitch_period(
    samples: &[Sample],
    prev_period: usize,
    pitch_min: usize,
    pitch_max: usize,
) -> usize {
    let pre = pre_emphasis(samples);
    let n = pre.len();

    let span = pitch_max - pitch_min + 1;
    let mut corr = vec![0.0f32; span];
    for (idx, p) in (pitch_min..=pitch_max).enumerate() {
        let mut c = 0.0f32;
        for i in 0..n.saturating_sub(p) {
            c += pre[i] * pre[i + p];
        }
        corr[idx] = c;
    }

    let mut log_corr: Vec<f32> = corr.iter().map(|&c| (c.abs() + 1e-6).ln()).collect();

    if span >= 3 {
        let original = log_corr.clone();
        for idx in 1..span - 1 {
            log_corr[idx] = 0.3 * original[idx - 1] + 0.4 * original[idx] + 0.3 * original[idx + 1];
        }
    }

    let mut best_idx = 0usize;
    let mut best_val = f32::NEG_INFINITY;
    for (idx, &v) in log_corr.iter().enumerate() {
        if v > best_val {
            best_val = v;
            best_idx = idx;
        }
    }
    let best_period = pitch_min + best_idx;

    (0.7 * best_period as f32 + 0.3 * prev_period as f32).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pure_tone_estimate_tracks_true_period() {
        let period = 40usize;
        let samples: Vec<i16> = (0..60)
            .map(|i| (10000.0 * (2.0 * std::f32::consts::PI * i as f32 / period as f32).sin()) as i16)
            .collect();
        let estimate = find_pitch_period(&samples, period, 20, 160);
        assert!((estimate as i64 - period as i64).abs() <= 6);
    }

    #[test]
    fn blends_toward_previous_period() {
        let samples = vec![0i16; 60];
        // Silence has no correlation peak; the result should still be a
        // finite blend involving prev_period, never panicking on the
        // degenerate all-zero correlation vector.
        let estimate = find_pitch_period(&samples, 100, 20, 160);
        assert!(estimate > 0);
    }
}
