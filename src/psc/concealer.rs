//! The pitch-synchronous concealer itself: history ring, pitch-period
//! extraction, overlap-add stitching, and the erasure state machine
//! described in spec §4.1.

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, trace};

use crate::config::{
    PlcFeatures, PlcParams, PlcVariant, FRAMESZ_MAX, HISTORYLEN_MAX, POVERLAPMAX_MAX,
};
use crate::error::{Error, Result};
use crate::psc::atten::nonlinear_attenuation;
use crate::psc::noise::{
    apply_perceptual_weight, compute_dynamic_alpha, generate_comfort_noise, lpc_analysis,
    ComfortNoiseGenerator,
};
use crate::psc::ola::{overlap_add_f32, overlap_add_i16};
use crate::psc::pitch::{enhanced_find_pitch, find_pitch};
use crate::Sample;

/// Pitch-synchronous concealer (C1).
///
/// Owns its entire rolling history: callers only ever call
/// [`Self::add_to_history`] with a frame that just arrived or
/// [`Self::do_fe`] to synthesise a replacement for one that was lost.
#[derive(Debug)]
pub struct PitchSynchronousConcealer {
    params: PlcParams,
    features: PlcFeatures,

    /// Shift-register history of the last `historylen` good+synthetic
    /// samples, most recent at the tail.
    history: Vec<Sample>,
    /// Float scratch copy of `history`, refreshed at erasure onset and
    /// then mutated to hold looping copies of the extracted period.
    pitchbuf: Vec<f32>,
    /// Saved quarter-wavelength window used to stitch each new period
    /// onto the growing `pitchbuf` tail.
    lastq: Vec<f32>,

    /// Consecutive erased frames; `0` iff the last frame was good.
    erasecnt: u32,
    /// Current pitch estimate, fixed for the duration of a burst.
    pitch: usize,
    /// `pitch / 4`, the overlap-add window length.
    poverlap: usize,
    /// Rotating read offset into `pitchbuf[pitchbufstart..]`.
    poffset: usize,
    /// Current length of the looped region `pitchbuf[pitchbufstart..]`.
    pitchblen: usize,
    /// Start index of the current pitch-period loop within `pitchbuf`.
    pitchbufstart: usize,

    /// Adaptive-pitch extras (spec §3's "adaptive extras").
    alpha: f32,
    prev_energy: f32,
    last_pitch: usize,
    cng: ComfortNoiseGenerator,
    rng: StdRng,
}

impl PitchSynchronousConcealer {
    /// Build a concealer tuned for `variant`, with `features` chosen
    /// once and held for the instance's lifetime.
    pub fn construct(variant: PlcVariant, features: PlcFeatures) -> Result<Self> {
        let params = variant.params(features.fading_count);
        if params.historylen > HISTORYLEN_MAX {
            return Err(Error::HistoryTooLong {
                got: params.historylen,
                max: HISTORYLEN_MAX,
            });
        }
        if params.poverlapmax > POVERLAPMAX_MAX {
            return Err(Error::OverlapWindowTooLong {
                got: params.poverlapmax,
                max: POVERLAPMAX_MAX,
            });
        }
        if params.framesz > FRAMESZ_MAX {
            return Err(Error::FrameTooLong {
                got: params.framesz,
                max: FRAMESZ_MAX,
            });
        }

        let historylen = params.historylen;
        let last_pitch = (params.pitch_min + params.pitch_max) / 2;
        let noise_floor = match variant {
            PlcVariant::Cvsd8k => 500.0,
            PlcVariant::Msbc16k => 300.0,
        };
        let rng = match features.comfort_noise_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            params,
            features,
            history: vec![0; historylen],
            pitchbuf: vec![0.0; historylen],
            lastq: vec![0.0; params.poverlapmax],
            erasecnt: 0,
            pitch: last_pitch,
            poverlap: 0,
            poffset: 0,
            pitchblen: 0,
            pitchbufstart: historylen,
            alpha: 0.75,
            prev_energy: -99.0,
            last_pitch,
            cng: ComfortNoiseGenerator::new(noise_floor),
            rng,
        })
    }

    /// Number of consecutive erased frames; `0` iff the last processed
    /// frame was good (invariant I1/I2).
    pub fn erasecnt(&self) -> u32 {
        self.erasecnt
    }

    /// Current pitch estimate. Only meaningful while `erasecnt() > 0`.
    pub fn pitch(&self) -> usize {
        self.pitch
    }

    /// A good frame was received and decoded. `frame` is mutated
    /// in place into the delayed output (see spec §4.1's history
    /// discipline: the caller receives its own input delayed by
    /// `poverlapmax` samples, which is what lets the end-of-erasure
    /// overlap-add reach back into already-committed output).
    pub fn add_to_history(&mut self, frame: &mut [Sample]) {
        debug_assert_eq!(frame.len(), self.params.framesz);

        if self.erasecnt > 0 {
            trace!(erasecnt = self.erasecnt, "psc reconverging at end of erasure");
            self.overlap_add_at_end(frame);
        }

        if self.features.comfort_noise {
            self.cng.lpc_coeff = lpc_analysis(frame);
        }

        self.save_speech(frame);
    }

    /// A frame was lost; synthesise `framesz` samples into `out` and
    /// update history as though `out` had been received.
    pub fn do_fe(&mut self, out: &mut [Sample]) {
        debug_assert_eq!(out.len(), self.params.framesz);
        let e = self.erasecnt;
        let fading_count = self.features.fading_count;

        // Reference quirk: a function only of the fixed `corrminpower`
        // floor, not of the actual frame energy (see `pitch.rs`).
        let current_energy = 10.0 * (self.params.corrminpower + 1e-6).log10();

        match e {
            0 => self.onset(out, current_energy),
            1 | 2 => self.extend_period(out),
            n if n >= 3 && n <= fading_count => self.continue_erasure(out, current_energy),
            _ => self.fade_to_silence_or_noise(out),
        }

        debug!(erasecnt = e, pitch = self.pitch, "psc do_fe");
        self.prev_energy = current_energy;
        self.erasecnt += 1;
        self.save_speech(out);
    }

    /// `erasecnt == 0`: estimate pitch, extract one period, stitch it
    /// onto itself with the saved quarter-wavelength window, and draw
    /// the first frame of synthetic speech.
    fn onset(&mut self, out: &mut [Sample], current_energy: f32) {
        let historylen = self.params.historylen;
        for i in 0..historylen {
            self.pitchbuf[i] = self.history[i] as f32;
        }

        let pitch = if self.features.adaptive_pitch {
            enhanced_find_pitch(&self.pitchbuf, &self.params, self.last_pitch, self.prev_energy)
        } else {
            find_pitch(&self.pitchbuf, &self.params)
        };
        self.pitch = pitch.clamp(self.params.pitch_min, self.params.pitch_max);
        self.last_pitch = self.pitch;
        self.poverlap = self.pitch / 4;

        let poverlap = self.poverlap;
        self.lastq[..poverlap].copy_from_slice(&self.pitchbuf[historylen - poverlap..historylen]);

        self.poffset = 0;
        self.pitchblen = self.pitch;
        self.pitchbufstart = historylen - self.pitchblen;

        self.stitch_period_onto_tail();

        // Write the blended tail back into history as 16-bit samples.
        for i in 0..poverlap {
            let v = self.pitchbuf[historylen - poverlap + i];
            self.history[historylen - poverlap + i] = v.clamp(-32768.0, 32767.0) as i16;
        }

        self.get_fe_speech(out, self.params.framesz);

        self.cng.energy_history[self.cng.hist_index] = current_energy;
        self.cng.hist_index = (self.cng.hist_index + 1) % self.cng.energy_history.len();
    }

    /// `erasecnt == 1 || 2`: extend `pitchblen` by one more period and
    /// smooth the junction between the old and newly extended buffer
    /// with the previous draw's tail. Always linear decay (spec §4.1).
    fn extend_period(&mut self, out: &mut [Sample]) {
        let historylen = self.params.historylen;
        let poverlap = self.poverlap;
        let pitch = self.pitch;

        let mut tmp = [0i16; POVERLAPMAX_MAX];
        let save_offset = self.poffset;
        self.get_fe_speech(&mut tmp[..poverlap], poverlap);

        self.poffset = save_offset;
        while self.poffset > pitch {
            self.poffset -= pitch;
        }
        self.pitchblen += pitch;
        self.pitchbufstart = historylen - self.pitchblen;

        self.stitch_period_onto_tail();

        self.get_fe_speech(out, self.params.framesz);
        overlap_add_i16(&tmp[..poverlap], out, poverlap);
        self.scale_speech(out);
    }

    /// `3 <= erasecnt <= fading_count`: draw another frame from the
    /// looped pitch buffer, optionally reweight it with the LPC
    /// perceptual filter, then attenuate (linear or non-linear).
    fn continue_erasure(&mut self, out: &mut [Sample], current_energy: f32) {
        self.get_fe_speech(out, self.params.framesz);

        if self.features.adaptive_pitch {
            let energy_diff = (current_energy - self.prev_energy).abs();
            if energy_diff < 10.0 {
                self.alpha = compute_dynamic_alpha(current_energy, self.prev_energy, self.alpha)
                    .clamp(0.2, 0.85);
                apply_perceptual_weight(out, &self.cng.lpc_coeff, self.alpha);
            }
        }

        if self.features.non_linear_atten {
            nonlinear_attenuation(out, self.erasecnt, self.pitch);
        } else {
            self.scale_speech(out);
        }
    }

    /// `erasecnt > fading_count`: silence, or LPC-coloured comfort
    /// noise if enabled (invariant I5).
    fn fade_to_silence_or_noise(&mut self, out: &mut [Sample]) {
        if self.features.comfort_noise {
            generate_comfort_noise(&mut self.cng, out, &mut self.rng);
        } else {
            out.iter_mut().for_each(|s| *s = 0);
        }
    }

    /// Cross-fade `lastq` with the region just before `pitchbufstart`
    /// into the tail of `pitchbuf`, stitching the newly extracted (or
    /// extended) period onto itself cleanly.
    fn stitch_period_onto_tail(&mut self) {
        let historylen = self.params.historylen;
        let poverlap = self.poverlap;
        let right_start = self.pitchbufstart - poverlap;

        let left: [f32; POVERLAPMAX_MAX] = {
            let mut buf = [0.0f32; POVERLAPMAX_MAX];
            buf[..poverlap].copy_from_slice(&self.lastq[..poverlap]);
            buf
        };
        let right: [f32; POVERLAPMAX_MAX] = {
            let mut buf = [0.0f32; POVERLAPMAX_MAX];
            buf[..poverlap].copy_from_slice(&self.pitchbuf[right_start..right_start + poverlap]);
            buf
        };
        let mut blended = [0.0f32; POVERLAPMAX_MAX];
        overlap_add_f32(&left[..poverlap], &right[..poverlap], &mut blended[..poverlap], poverlap);
        self.pitchbuf[historylen - poverlap..historylen].copy_from_slice(&blended[..poverlap]);
    }

    /// Read `sz` samples from the circular pitch-period loop
    /// `pitchbuf[pitchbufstart..pitchbufstart+pitchblen)`, wrapping
    /// `poffset` modulo `pitchblen` as it goes.
    fn get_fe_speech(&mut self, out: &mut [Sample], sz: usize) {
        let mut written = 0usize;
        while written < sz {
            let remaining_in_period = self.pitchblen - self.poffset;
            let cnt = remaining_in_period.min(sz - written);
            for k in 0..cnt {
                let v = self.pitchbuf[self.pitchbufstart + self.poffset + k];
                out[written + k] = v.clamp(-32768.0, 32767.0) as i16;
            }
            self.poffset += cnt;
            if self.poffset == self.pitchblen {
                self.poffset = 0;
            }
            written += cnt;
        }
    }

    /// Linear gain ramp: `g = 1 - (erasecnt-1)*attenfac`, floored at
    /// `0`, decremented by `attenincr` every sample.
    fn scale_speech(&self, out: &mut [Sample]) {
        let mut g = 1.0 - (self.erasecnt as f32 - 1.0) * self.params.attenfac;
        if g < 0.0 {
            g = 0.0;
        }
        for s in out.iter_mut() {
            let v = (*s as f32 * g).clamp(-32768.0, 32767.0);
            *s = v as i16;
            g -= self.params.attenincr;
        }
    }

    /// Cross-fade the synthetic tail into the start of a freshly
    /// arrived good frame `s`, growing the window with burst length
    /// and overriding the first `sbcrt` samples outright (decoder
    /// reconvergence time). Resets `erasecnt` to `0`.
    fn overlap_add_at_end(&mut self, s: &mut [Sample]) {
        let sbcrt = self.params.sbcrt;
        let olen = (self.poverlap + self.erasecnt as usize * self.params.eoverlapincr + sbcrt)
            .min(self.params.framesz);

        let mut f = [0i16; FRAMESZ_MAX];
        self.get_fe_speech(&mut f[..olen], olen);

        let mut gain = 1.0 - (self.erasecnt as f32 - 1.0) * self.params.attenfac;
        if gain < 0.0 {
            gain = 0.0;
        }

        let sbcrt_end = sbcrt.min(olen);
        for i in 0..sbcrt_end {
            s[i] = (gain * f[i] as f32) as i16;
        }

        if olen > sbcrt {
            let incr = 1.0 / (olen - sbcrt) as f32;
            let incrg = incr * gain;
            let mut lw = (1.0 - incr) * gain;
            let mut rw = incr;
            for i in sbcrt..olen {
                let t = (lw * f[i] as f32 + rw * s[i] as f32).clamp(-32768.0, 32767.0);
                s[i] = t as i16;
                lw -= incrg;
                rw += incr;
            }
        }

        self.erasecnt = 0;
    }

    /// Shift `history` left by `framesz`, copy `s` into the tail, then
    /// overwrite `s` with the window delayed by `poverlapmax` samples.
    fn save_speech(&mut self, s: &mut [Sample]) {
        let framesz = self.params.framesz;
        let historylen = self.params.historylen;
        let poverlapmax = self.params.poverlapmax;

        self.history.copy_within(framesz.., 0);
        self.history[historylen - framesz..].copy_from_slice(s);
        s.copy_from_slice(&self.history[historylen - framesz - poverlapmax..historylen - poverlapmax]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlcFeatures;

    fn tone_frame(framesz: usize, period: usize, phase: usize) -> Vec<Sample> {
        (0..framesz)
            .map(|i| (10000.0 * (2.0 * std::f32::consts::PI * (i + phase) as f32 / period as f32).sin()) as i16)
            .collect()
    }

    fn feed_good_frames(c: &mut PitchSynchronousConcealer, framesz: usize, period: usize, n: usize) -> usize {
        let mut phase = 0usize;
        for _ in 0..n {
            let mut frame = tone_frame(framesz, period, phase);
            c.add_to_history(&mut frame);
            phase += framesz;
        }
        phase
    }

    #[test]
    fn construct_cvsd_and_msbc_both_succeed() {
        assert!(PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, PlcFeatures::default()).is_ok());
        assert!(PitchSynchronousConcealer::construct(PlcVariant::Msbc16k, PlcFeatures::default()).is_ok());
    }

    #[test]
    fn identity_law_no_loss_delays_output_unchanged() {
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, PlcFeatures::default()).unwrap();
        let framesz = 60;
        let period = 20;
        let mut frames: Vec<Vec<Sample>> = (0..5)
            .map(|i| tone_frame(framesz, period, i * framesz))
            .collect();
        let mut delayed_outputs = Vec::new();
        for frame in frames.iter_mut() {
            c.add_to_history(frame);
            delayed_outputs.push(frame.clone());
        }
        // The engine delays output by `poverlapmax` samples; the first
        // frame's output is therefore zeros from the zero-initialised
        // history, not the input itself.
        assert_eq!(delayed_outputs[0].len(), framesz);
        assert!(c.erasecnt() == 0);
    }

    #[test]
    fn do_fe_increments_erasecnt_and_add_to_history_resets_it() {
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, PlcFeatures::default()).unwrap();
        feed_good_frames(&mut c, 60, 20, 5);
        assert_eq!(c.erasecnt(), 0);

        let mut out = vec![0i16; 60];
        c.do_fe(&mut out);
        assert_eq!(c.erasecnt(), 1);
        assert!(c.pitch() >= 40 && c.pitch() <= 120);

        c.do_fe(&mut out);
        assert_eq!(c.erasecnt(), 2);

        let mut good = vec![0i16; 60];
        c.add_to_history(&mut good);
        assert_eq!(c.erasecnt(), 0);
    }

    #[test]
    fn output_samples_always_stay_in_i16_range() {
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, PlcFeatures::default()).unwrap();
        feed_good_frames(&mut c, 60, 20, 5);
        let mut out = vec![0i16; 60];
        for _ in 0..15 {
            c.do_fe(&mut out);
            assert!(out.iter().all(|&s| (-32768..=32767).contains(&s)));
        }
    }

    #[test]
    fn silent_history_stays_silent_through_loss() {
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, PlcFeatures::default()).unwrap();
        for _ in 0..5 {
            let mut frame = vec![0i16; 60];
            c.add_to_history(&mut frame);
        }
        let mut out = vec![1234i16; 60];
        c.do_fe(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn silence_beyond_fading_count_is_all_zero_without_comfort_noise() {
        let mut features = PlcFeatures::default();
        features.fading_count = 4;
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, features).unwrap();
        feed_good_frames(&mut c, 60, 20, 5);

        let mut out = vec![0i16; 60];
        for _ in 0..4 {
            c.do_fe(&mut out);
        }
        // erasecnt is now 4; the 5th call synthesises for erasecnt==4,
        // which is still <= fading_count, so decay; the 6th call
        // synthesises for erasecnt==5 > fading_count: silence.
        c.do_fe(&mut out);
        c.do_fe(&mut out);
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn comfort_noise_replaces_silence_beyond_fading_count() {
        let mut features = PlcFeatures::default();
        features.fading_count = 2;
        features.comfort_noise = true;
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, features).unwrap();
        feed_good_frames(&mut c, 60, 20, 5);

        let mut out = vec![0i16; 60];
        for _ in 0..5 {
            c.do_fe(&mut out);
        }
        assert!(out.iter().any(|&s| s != 0));
    }

    #[test]
    fn reconvergence_with_sbcrt_replaces_leading_samples_outright() {
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Msbc16k, PlcFeatures::default()).unwrap();
        feed_good_frames(&mut c, 120, 40, 5);

        let mut out = vec![0i16; 120];
        c.do_fe(&mut out);
        assert_eq!(c.erasecnt(), 1);

        // Exercise `overlap_add_at_end` directly: the first `sbcrt`
        // samples must be overwritten outright by `gain * synthetic`,
        // not blended with whatever was already in the buffer.
        let mut frame = vec![12345i16; 120];
        let before = frame.clone();
        c.overlap_add_at_end(&mut frame);
        assert_eq!(c.erasecnt(), 0);
        assert_ne!(&frame[..36], &before[..36]);
    }

    #[test]
    fn adaptive_features_produce_bounded_output_over_a_long_burst() {
        let features = PlcFeatures {
            adaptive_pitch: true,
            comfort_noise: true,
            non_linear_atten: true,
            ..PlcFeatures::default()
        };
        let mut c = PitchSynchronousConcealer::construct(PlcVariant::Cvsd8k, features).unwrap();
        feed_good_frames(&mut c, 60, 20, 5);

        let mut out = vec![0i16; 60];
        for _ in 0..20 {
            c.do_fe(&mut out);
            assert!(out.iter().all(|&s| (-32768..=32767).contains(&s)));
        }
    }
}
