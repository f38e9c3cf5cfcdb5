//! # Packet loss concealment for Bluetooth SCO speech
//!
//! `sco-plc` synthesises a replacement frame when a narrowband SCO voice
//! packet (CVSD or mSBC, 8 kHz or 16 kHz mono, 7.5 ms frames) is lost, so
//! a listener hears a plausible continuation instead of silence or a
//! click, and re-converges smoothly once packets resume.
//!
//! Two independent concealers implement the same frame-in/frame-out
//! contract and share no state:
//!
//! - [`psc`]: pitch-synchronous concealment derived from the ITU-T
//!   G.711 Appendix I reference, with an optional adaptive pitch search,
//!   non-linear attenuation and LPC comfort noise.
//! - [`lph`]: an LPC/pitch hybrid concealer that blends full-frame LPC
//!   synthesis with a pitch-period copy and crossfades into the next
//!   good frame.
//!
//! Both are built from [`spectral`]'s FFT and Levinson-Durbin utilities.
//!
//! The crate is strictly single-threaded and non-blocking: no operation
//! in the hot path suspends, allocates per frame, or can fail. Decoding
//! the SCO bitstream itself, CVSD encode/decode, 8x interpolation and
//! playback are all out of scope — this crate only turns
//! `(frame, is_lost)` into an output frame.

pub mod config;
pub mod error;
pub mod lph;
pub mod psc;
pub mod spectral;

pub use error::{Error, Result};

/// A single PCM sample, as carried over the SCO link.
pub type Sample = i16;

/// Commonly used types, re-exported for `use sco_plc::prelude::*;`.
pub mod prelude {
    pub use crate::config::{FftBackend, LphFeatures, PlcFeatures, PlcVariant, PostFilter};
    pub use crate::error::{Error, Result};
    pub use crate::lph::{AudioFrame, FrameInput, LpcPitchHybridConcealer};
    pub use crate::psc::PitchSynchronousConcealer;
    pub use crate::Sample;
}
