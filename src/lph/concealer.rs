//! The LPC/pitch hybrid concealer itself: blends LPC synthesis with a
//! pitch-period copy, weighted by how long the current erasure has run.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::config::{CROSSFADE_LEN, LphFeatures, LphParams, PlcVariant, PostFilter};
use crate::error::Result;
use crate::lph::frame::{frame_energy, AudioFrame};
use crate::lph::lpc::{compute_lpc, predict};
use crate::lph::noise::{add_comfort_noise, noise_shaping};
use crate::lph::pitch::find_pitch_period;
use crate::lph::voicing::{is_unvoiced, next_pow2};
use crate::spectral::{self, Fft};
use crate::Sample;

/// The frame a caller hands to [`LpcPitchHybridConcealer::process`] for
/// a given decode slot: either the samples that actually arrived, or a
/// marker that this slot was lost. Folding `is_lost`/`incoming` into one
/// enum makes "lost but also carrying samples" or "not lost but with no
/// samples" unrepresentable, instead of a runtime precondition a caller
/// could violate.
#[derive(Debug, Clone, Copy)]
pub enum FrameInput<'a> {
    /// The frame decoded successfully; these are its samples.
    Good(&'a [Sample]),
    /// The frame was lost; synthesise a replacement from `history`.
    Lost,
}

/// LPC/pitch hybrid concealer (C2).
///
/// Unlike [`crate::psc::PitchSynchronousConcealer`], this concealer
/// holds no per-stream history itself: the caller owns the `history`
/// and `output` frames and passes both to every call, along with an
/// externally maintained loss counter (see the crate's external
/// interfaces notes). The only state this struct owns is its
/// configuration, its FFT plan, and (when comfort noise is enabled) an
/// RNG seeded once at construction for deterministic replay.
pub struct LpcPitchHybridConcealer {
    params: LphParams,
    features: LphFeatures,
    fft: Box<dyn Fft>,
    rng: StdRng,
}

impl std::fmt::Debug for LpcPitchHybridConcealer {
    /// `Fft` plans aren't `Debug` themselves (a `dyn Fft` trait object
    /// has no blanket `Debug` impl even though `Fft: Debug` is a
    /// supertrait); print the plan's size instead of the plan.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LpcPitchHybridConcealer")
            .field("params", &self.params)
            .field("features", &self.features)
            .field("fft_size", &self.fft.size())
            .field("rng", &self.rng)
            .finish()
    }
}

impl LpcPitchHybridConcealer {
    /// Build a concealer tuned for `variant`.
    pub fn construct(variant: PlcVariant, features: LphFeatures) -> Result<Self> {
        let params = variant.lph_params();
        let fft = spectral::fft::build(next_pow2(params.framesz), features.fft_backend)?;
        let rng = match features.comfort_noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            params,
            features,
            fft,
            rng,
        })
    }

    /// Process one frame: [`FrameInput::Good`] passes the carried frame
    /// through (while refreshing its derived fields); [`FrameInput::Lost`]
    /// synthesises a replacement from `history`. `loss_count` is the
    /// number of consecutive erasures up to and including this one,
    /// maintained by the caller.
    pub fn process(&mut self, history: &AudioFrame, input: FrameInput<'_>, loss_count: u32) -> AudioFrame {
        match input {
            FrameInput::Good(incoming) => {
                let pcm = incoming.to_vec();
                let (unvoiced, _) = is_unvoiced(&pcm, self.fft.as_ref());
                let pitch_period = find_pitch_period(&pcm, history.pitch_period, self.params.pitch_min, self.params.pitch_max);
                let energy = frame_energy(&pcm);
                trace!(pitch_period, unvoiced, "lph good frame");
                let (lpc_coeffs, _) = compute_lpc(&pcm, unvoiced);
                AudioFrame {
                    pcm,
                    lpc_coeffs,
                    pitch_period,
                    is_unvoiced: unvoiced,
                    energy,
                }
            }
            FrameInput::Lost => self.conceal_lost_frame(history, loss_count),
        }
    }

    fn conceal_lost_frame(&mut self, history: &AudioFrame, loss_count: u32) -> AudioFrame {
        let framesz = self.params.framesz;
        let (unvoiced, _) = is_unvoiced(&history.pcm, self.fft.as_ref());
        let energy = history.energy * 0.9f32.powi(loss_count as i32);

        let (lpc_coeffs, lpc_order) = compute_lpc(&history.pcm, unvoiced);
        let pitch_period = find_pitch_period(&history.pcm, history.pitch_period, self.params.pitch_min, self.params.pitch_max);

        let lpc_synth: Vec<f32> = (0..framesz)
            .map(|i| predict(&lpc_coeffs, lpc_order, &history.pcm, i))
            .collect();

        let period = pitch_period.max(1);
        let pitch_copy: Vec<Sample> = (0..framesz)
            .map(|i| {
                let pos = (i as i64 - period as i64).rem_euclid(framesz as i64) as usize;
                history.pcm[pos]
            })
            .collect();

        let w_voiced = if unvoiced { 0.7 } else { 0.3 };
        let weight = (w_voiced - 0.1 * loss_count as f32).clamp(0.2, 0.8);
        debug!(loss_count, weight, unvoiced, "lph conceal_lost_frame");

        let mut pcm: Vec<Sample> = (0..framesz)
            .map(|i| {
                let mixed = weight * lpc_synth[i] + (1.0 - weight) * pitch_copy[i] as f32;
                mixed.clamp(i16::MIN as f32, i16::MAX as f32) as i16
            })
            .collect();

        let fade_len = CROSSFADE_LEN.min(framesz).min(history.pcm.len());
        for i in 0..fade_len {
            let alpha = i as f32 / fade_len as f32;
            let history_pos = history.pcm.len() - fade_len + i;
            let blended = pcm[i] as f32 * alpha + history.pcm[history_pos] as f32 * (1.0 - alpha);
            pcm[i] = blended.clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        }

        if let Some(post_filter) = self.features.post_filter {
            let run_comfort_noise = match post_filter {
                PostFilter::ComfortNoise => true,
                PostFilter::NoiseShaping => false,
                PostFilter::VoicingAdaptive => unvoiced,
            };
            if run_comfort_noise {
                add_comfort_noise(&mut pcm, history, self.fft.as_ref(), self.params.sample_rate_hz, &mut self.rng);
            } else {
                noise_shaping(&mut pcm, self.fft.as_ref(), self.params.sample_rate_hz);
            }
        }

        AudioFrame {
            pcm,
            lpc_coeffs,
            pitch_period,
            is_unvoiced: unvoiced,
            energy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LphFeatures;

    fn tone_frame(framesz: usize, period: usize, phase: usize) -> Vec<Sample> {
        (0..framesz)
            .map(|i| {
                (10000.0 * (2.0 * std::f32::consts::PI * (i + phase) as f32 / period as f32).sin()) as i16
            })
            .collect()
    }

    #[test]
    fn good_frame_pass_through_updates_derived_fields() {
        let mut concealer = LpcPitchHybridConcealer::construct(PlcVariant::Cvsd8k, LphFeatures::default()).unwrap();
        let history = AudioFrame::silence(60);
        let incoming = tone_frame(60, 30, 0);
        let out = concealer.process(&history, FrameInput::Good(&incoming), 0);
        assert_eq!(out.pcm, incoming);
    }

    #[test]
    fn concealment_produces_a_full_frame_without_panicking() {
        let mut concealer = LpcPitchHybridConcealer::construct(PlcVariant::Cvsd8k, LphFeatures::default()).unwrap();
        let mut history = AudioFrame::silence(60);
        history.pcm = tone_frame(60, 30, 0);
        history.pitch_period = 30;
        history.energy = frame_energy(&history.pcm);

        let out = concealer.process(&history, FrameInput::Lost, 1);
        assert_eq!(out.pcm.len(), 60);
    }

    #[test]
    fn concealment_weight_decays_toward_pitch_copy_with_loss_count() {
        let mut concealer = LpcPitchHybridConcealer::construct(PlcVariant::Msbc16k, LphFeatures::default()).unwrap();
        let mut history = AudioFrame::silence(120);
        history.pcm = tone_frame(120, 60, 0);
        history.pitch_period = 60;
        history.energy = frame_energy(&history.pcm);

        let early = concealer.process(&history, FrameInput::Lost, 1);
        let late = concealer.process(&history, FrameInput::Lost, 8);
        // Both synthesise a full frame; a long burst should have decayed
        // energy relative to a short one under the 0.9^loss_count model.
        assert!(late.energy <= early.energy);
    }
}
