//! FFT, Bark-band psychoacoustics and LPC primitives shared by both
//! concealers.

pub mod bark;
pub mod fft;
pub mod lpc;
pub mod window;

pub use bark::{masking_threshold, BARK_BANDS};
pub use fft::Fft;
pub use lpc::{autocorrelate, levinson_durbin};
pub use window::hanning;
