//! Comfort-noise generation, its fixed-order LPC model, and the
//! perceptual weighting filter that shares that same model.
//!
//! The reference keeps `cng.lpc_coeff` fresh by re-analysing every good
//! frame (`lpc_analysis` in `g711plc_addtohistory`) and spends it two
//! ways: shaping synthesised erasure frames while the burst is still
//! short (`apply_perceptual_weight`, adaptive-pitch builds only) and,
//! once an erasure outlives `fading_count`, colouring white noise with
//! it instead of outputting silence.

use rand::Rng;

use crate::config::{PSC_LPC_ORDER, NOISE_HISTORY};
use crate::spectral::{autocorrelate, levinson_durbin};
use crate::Sample;

/// LPC-driven background-noise model for long erasures (§3's PSC state
/// table). `lpc_coeff[0]` is unused (kept at `0.0`) so that coefficient
/// indices line up 1:1 with the reference's `1..=LPC_ORDER` loop bound
/// without the off-by-one out-of-bounds read the reference has at
/// `j == LPC_ORDER` (its `lpc_coeff` array only holds `LPC_ORDER`
/// entries, indices `0..LPC_ORDER`).
#[derive(Debug, Clone)]
pub struct ComfortNoiseGenerator {
    /// Whitening-filter coefficients, indices `1..=PSC_LPC_ORDER` valid.
    pub lpc_coeff: [f32; PSC_LPC_ORDER + 1],
    /// Rolling log-energy history, written once per erasure onset.
    pub energy_history: [f32; NOISE_HISTORY],
    /// Noise amplitude floor, fixed at construction (variant-dependent).
    pub noise_floor: f32,
    /// Write cursor into `energy_history`.
    pub hist_index: usize,
}

impl ComfortNoiseGenerator {
    /// A freshly constructed generator for a given variant's noise floor.
    pub fn new(noise_floor: f32) -> Self {
        Self {
            lpc_coeff: [0.0; PSC_LPC_ORDER + 1],
            energy_history: [0.0; NOISE_HISTORY],
            noise_floor,
            hist_index: 0,
        }
    }
}

/// Fixed-order (`PSC_LPC_ORDER`) autocorrelation LPC analysis, run on
/// every good frame to keep the comfort-noise/perceptual-weighting
/// model current. Unlike [`crate::lph::lpc::compute_lpc`] this never
/// stops early — it is cheap enough (order 8, one frame) to always run
/// to completion.
pub fn lpc_analysis(frame: &[Sample]) -> [f32; PSC_LPC_ORDER + 1] {
    let floats: Vec<f32> = frame.iter().map(|&s| s as f32).collect();
    let autocorr = autocorrelate(&floats, PSC_LPC_ORDER);

    let mut coeffs = [0.0f32; PSC_LPC_ORDER + 1];
    if autocorr[0] < 1e-6 {
        coeffs[0] = 1.0;
        return coeffs;
    }
    let (solved, _) = levinson_durbin(&autocorr, PSC_LPC_ORDER, |_, _| false);
    coeffs[..solved.len()].copy_from_slice(&solved);
    coeffs
}

/// Smooth `prev_alpha` towards a target set by the current/previous
/// frame energy pair, moving at most `0.05` per frame.
pub fn compute_dynamic_alpha(current_energy: f32, prev_energy: f32, prev_alpha: f32) -> f32 {
    let target_alpha = if current_energy < -30.0 && prev_energy < -30.0 {
        0.65
    } else if current_energy > -10.0 && prev_energy > -10.0 {
        0.85
    } else {
        0.75
    };

    if (target_alpha - prev_alpha).abs() > 0.05 {
        if target_alpha > prev_alpha {
            prev_alpha + 0.05
        } else {
            prev_alpha - 0.05
        }
    } else {
        target_alpha
    }
}

/// Forward LPC weighting filter `W(z) = 1/(1 - alpha*A(z))`, applied in
/// place to a synthesised erasure frame.
pub fn apply_perceptual_weight(frame: &mut [Sample], lpc_coeff: &[f32; PSC_LPC_ORDER + 1], alpha: f32) {
    for i in 0..frame.len() {
        let mut weighted = frame[i] as f32;
        for j in 1..=PSC_LPC_ORDER {
            if i >= j {
                weighted -= alpha * lpc_coeff[j] * frame[i - j] as f32;
            }
        }
        frame[i] = weighted.clamp(-32768.0, 32767.0) as i16;
    }
}

/// White noise, coloured by `cng.lpc_coeff`, written over `out`.
///
/// The reference re-derives `lpc_coeff` from whatever happens to be in
/// its output buffer at the moment comfort noise kicks in (stale data
/// from a previous call, since nothing has written a current frame
/// yet); rather than carry that over, `cng.lpc_coeff` here always holds
/// the model from the last real good frame (kept current by
/// `PitchSynchronousConcealer::add_to_history`), which is what the
/// reference's own design intent ("LPC-driven comfort noise") clearly
/// calls for.
pub fn generate_comfort_noise(cng: &mut ComfortNoiseGenerator, out: &mut [Sample], rng: &mut impl Rng) {
    use crate::config::CNG_GAIN_SCALE;

    for i in 0..out.len() {
        let mut noise = (rng.gen::<f32>() * 2.0 - 1.0) * cng.noise_floor;
        // One tap short of `apply_perceptual_weight`'s `1..=PSC_LPC_ORDER`:
        // the reference's own `generate_comfort_noise` loop is `j <
        // LPC_ORDER`, not `<=`, for this filter specifically.
        for j in 1..PSC_LPC_ORDER {
            if i >= j {
                noise += cng.lpc_coeff[j] * out[i - j] as f32;
            }
        }
        out[i] = (noise * CNG_GAIN_SCALE).clamp(-32768.0, 32767.0) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn lpc_analysis_of_silence_is_the_identity_filter() {
        let frame = vec![0i16; 60];
        let coeffs = lpc_analysis(&frame);
        assert_eq!(coeffs[0], 1.0);
        assert!(coeffs[1..].iter().all(|&c| c == 0.0));
    }

    #[test]
    fn dynamic_alpha_clamps_step_size() {
        let next = compute_dynamic_alpha(-5.0, -40.0, 0.65);
        assert!((next - 0.70).abs() < 1e-6);
    }

    #[test]
    fn comfort_noise_is_deterministic_for_a_fixed_seed() {
        let mut cng_a = ComfortNoiseGenerator::new(300.0);
        let mut cng_b = ComfortNoiseGenerator::new(300.0);
        let mut rng_a = StdRng::seed_from_u64(7);
        let mut rng_b = StdRng::seed_from_u64(7);

        let mut out_a = vec![0i16; 60];
        let mut out_b = vec![0i16; 60];
        generate_comfort_noise(&mut cng_a, &mut out_a, &mut rng_a);
        generate_comfort_noise(&mut cng_b, &mut out_b, &mut rng_b);
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn comfort_noise_stays_within_sample_range() {
        let mut cng = ComfortNoiseGenerator::new(3000.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut out = vec![0i16; 120];
        generate_comfort_noise(&mut cng, &mut out, &mut rng);
        assert!(out.iter().all(|&s| (-32768..=32767).contains(&s)));
    }
}
