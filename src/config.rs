//! Runtime configuration for the two concealers.
//!
//! The reference implementation selects behaviour with preprocessor
//! toggles (`G711_ADAPTIVE_PLC`, `COMFORT_NOISE`, `NONLINEAR_ATTEN`,
//! `USE_ARM_DSP_FFT`) and a pair of hand-written constructors
//! (`msbc_g711plc_construct`, `cvsd_g711plc_construct`). Here those
//! become plain values chosen once, at construction, and carried as a
//! field of the concealer instance.

use serde::{Deserialize, Serialize};

/// Compile-time ceiling for `historylen` (3 * max pitch_max + its overlap).
pub const HISTORYLEN_MAX: usize = 780;
/// Compile-time ceiling for `poverlapmax`.
pub const POVERLAPMAX_MAX: usize = 60;
/// Compile-time ceiling for `framesz`.
pub const FRAMESZ_MAX: usize = 120;
/// Default number of 7.5 ms frames of decay before an erasure goes silent.
pub const DEFAULT_FADING_COUNT: u32 = 10;

/// LPC/pitch hybrid concealer: maximum analysis order.
pub const MAX_LPC_ORDER: usize = 12;
/// LPC/pitch hybrid concealer: minimum analysis order (dynamic-order
/// search never returns less than this).
pub const MIN_LPC_ORDER: usize = 4;
/// LPC/pitch hybrid concealer: head-of-frame crossfade length, in samples.
pub const CROSSFADE_LEN: usize = 10;
/// LPC/pitch hybrid concealer: comfort-noise synthesis gain.
pub const CNG_GAIN_SCALE: f32 = 0.2;

/// Pitch-synchronous concealer: fixed LPC order used by the comfort
/// noise generator's perceptual-weighting filter and residual model.
/// Distinct from, and much smaller than, `MAX_LPC_ORDER` (C2's
/// dynamic-order full-frame analysis) — C1's LPC use is a cheap
/// per-10ms background-noise colouring, not a synthesis predictor.
pub const PSC_LPC_ORDER: usize = 8;
/// Pitch-synchronous concealer: length of the comfort noise
/// generator's rolling energy history, in frames.
pub const NOISE_HISTORY: usize = 32;

/// Which SCO codec/sample-rate pairing the pitch-synchronous concealer
/// is tuned for.
///
/// Selecting a variant fixes every scalar in §3's PSC state table in one
/// step; callers never assemble `pitch_min`/`pitch_max`/`attenfac`/etc.
/// by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlcVariant {
    /// Narrowband CVSD at 8 kHz, 60-sample (7.5 ms) frames.
    Cvsd8k,
    /// Wideband mSBC at 16 kHz, 120-sample (7.5 ms) frames.
    Msbc16k,
}

/// Derived scalar parameters for one [`PlcVariant`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlcParams {
    /// Minimum admissible pitch period, in samples.
    pub pitch_min: usize,
    /// Maximum admissible pitch period, in samples.
    pub pitch_max: usize,
    /// `pitch_max - pitch_min`.
    pub pitchdiff: usize,
    /// `pitch_max / 4`: maximum overlap-add window.
    pub poverlapmax: usize,
    /// `3 * pitch_max + poverlapmax`.
    pub historylen: usize,
    /// Coarse-search decimation stride.
    pub ndec: usize,
    /// Correlation analysis length (20 ms).
    pub corrlen: usize,
    /// `corrlen + pitch_max`.
    pub corrbuflen: usize,
    /// Floor applied to the coarse/fine search energy term.
    pub corrminpower: f32,
    /// End-of-erasure OLA window growth per erased frame.
    pub eoverlapincr: usize,
    /// Frame size in samples (7.5 ms).
    pub framesz: usize,
    /// Per-10ms-frame attenuation factor.
    pub attenfac: f32,
    /// Per-sample attenuation increment (`attenfac / framesz`).
    pub attenincr: f32,
    /// Reconvergence delay, in samples, applied at an erasure's end.
    pub sbcrt: usize,
}

impl PlcVariant {
    /// Derive the full scalar parameter set for this variant.
    ///
    /// `fading_count` is the caller-chosen number of 10ms-equivalent
    /// frames of decay (`G711_ATT_FADE_COUNT` in the reference,
    /// default 10); it only affects `attenfac` for the CVSD variant,
    /// which is fixed at `1/fading_count`, while mSBC uses a fixed
    /// `0.2` regardless of `fading_count`.
    pub fn params(self, fading_count: u32) -> PlcParams {
        match self {
            PlcVariant::Cvsd8k => {
                let pitch_min = 40;
                let pitch_max = 120;
                let framesz = 60;
                let attenfac = 1.0 / fading_count as f32;
                PlcParams {
                    pitch_min,
                    pitch_max,
                    pitchdiff: pitch_max - pitch_min,
                    poverlapmax: pitch_max / 4,
                    historylen: pitch_max * 3 + pitch_max / 4,
                    ndec: 2,
                    corrlen: 160,
                    corrbuflen: 160 + pitch_max,
                    corrminpower: 250.0,
                    eoverlapincr: 24,
                    framesz,
                    attenfac,
                    attenincr: attenfac / framesz as f32,
                    sbcrt: 0,
                }
            }
            PlcVariant::Msbc16k => {
                let pitch_min = 80;
                let pitch_max = 240;
                let framesz = 120;
                let attenfac = 0.2;
                PlcParams {
                    pitch_min,
                    pitch_max,
                    pitchdiff: pitch_max - pitch_min,
                    poverlapmax: pitch_max / 4,
                    historylen: pitch_max * 3 + pitch_max / 4,
                    ndec: 2,
                    corrlen: 320,
                    corrbuflen: 320 + pitch_max,
                    corrminpower: 500.0,
                    eoverlapincr: 48,
                    framesz,
                    attenfac,
                    attenincr: attenfac / framesz as f32,
                    sbcrt: 36,
                }
            }
        }
    }
}

/// Derived scalar parameters for the LPC/pitch hybrid concealer (C2).
///
/// The reference only ever instantiates this module at 8 kHz
/// (`PITCH_MIN=20`, `PITCH_MAX=160`, `FRAME_SIZE=60`); the 16 kHz row
/// scales both the frame size and the pitch bounds by the same factor
/// of two, keeping the admissible pitch range at the same 50-400 Hz in
/// either variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LphParams {
    /// Frame size in samples.
    pub framesz: usize,
    /// Minimum admissible pitch period, in samples.
    pub pitch_min: usize,
    /// Maximum admissible pitch period, in samples.
    pub pitch_max: usize,
    /// Sample rate, in Hz (used only to map FFT bins to Bark bands).
    pub sample_rate_hz: f32,
}

impl PlcVariant {
    /// Derive the LPC/pitch hybrid concealer's scalar parameters for
    /// this variant.
    pub fn lph_params(self) -> LphParams {
        match self {
            PlcVariant::Cvsd8k => LphParams {
                framesz: 60,
                pitch_min: 20,
                pitch_max: 160,
                sample_rate_hz: 8000.0,
            },
            PlcVariant::Msbc16k => LphParams {
                framesz: 120,
                pitch_min: 40,
                pitch_max: 320,
                sample_rate_hz: 16000.0,
            },
        }
    }
}

/// Optional behaviour toggles for the pitch-synchronous concealer (C1).
///
/// Mirrors the reference's `G711_ADAPTIVE_PLC` / `COMFORT_NOISE` /
/// `NONLINEAR_ATTEN` preprocessor switches, plus the FFT backend choice
/// that the comfort-noise path needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlcFeatures {
    /// Multi-candidate adaptive pitch search with history continuity.
    pub adaptive_pitch: bool,
    /// LPC-driven comfort noise once an erasure exceeds `fading_count`.
    pub comfort_noise: bool,
    /// Segmented non-linear attenuation instead of the linear ramp.
    pub non_linear_atten: bool,
    /// FFT implementation backing the comfort-noise generator.
    pub fft_backend: FftBackend,
    /// Number of erased frames before attenuation bottoms out (and, if
    /// `comfort_noise` is off, output goes silent).
    pub fading_count: u32,
    /// Seed for the comfort-noise RNG. `None` draws a seed from OS
    /// entropy once at construction (not per frame); `Some(seed)` makes
    /// replay with the same input trace reproduce identical output
    /// (law L2).
    pub comfort_noise_seed: Option<u64>,
}

impl Default for PlcFeatures {
    fn default() -> Self {
        Self {
            adaptive_pitch: false,
            comfort_noise: false,
            non_linear_atten: false,
            fft_backend: FftBackend::Native,
            fading_count: DEFAULT_FADING_COUNT,
            comfort_noise_seed: Some(0x5343_4f5f_504c_43),
        }
    }
}

/// Which FFT implementation backs the spectral utilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FftBackend {
    /// In-crate radix-2 decimation-in-time FFT with a precomputed
    /// twiddle table (ported from the reference's native fallback).
    Native,
    /// `rustfft`-backed planner (the reference's ARM CMSIS-DSP path,
    /// generalised to any platform).
    External,
}

/// Behaviour toggles for the LPC/pitch hybrid concealer (C2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LphFeatures {
    /// Optional post-filter applied after the crossfade mix. `None` by
    /// default: the reference guards this stage with `#if 0`.
    pub post_filter: Option<PostFilter>,
    /// FFT implementation backing the post-filter, when enabled.
    pub fft_backend: FftBackend,
    /// Seed for comfort-noise phase synthesis, same semantics as
    /// [`PlcFeatures::comfort_noise_seed`].
    pub comfort_noise_seed: Option<u64>,
}

impl Default for LphFeatures {
    fn default() -> Self {
        Self {
            post_filter: None,
            fft_backend: FftBackend::Native,
            comfort_noise_seed: Some(0x5343_4f5f_4c50_48),
        }
    }
}

/// Which optional psychoacoustic post-stage to run after the LPC/pitch
/// mix, chosen per frame by voicing (unvoiced -> comfort noise, voiced
/// -> noise shaping) when enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostFilter {
    /// Always run the masking-threshold noise-shaping filter.
    NoiseShaping,
    /// Always run LPC-residual comfort noise.
    ComfortNoise,
    /// Pick per-frame: comfort noise for unvoiced frames, noise shaping
    /// for voiced frames (the reference's commented-out behaviour).
    VoicingAdaptive,
}
