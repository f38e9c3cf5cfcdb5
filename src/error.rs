//! Error types for the PLC core.

use thiserror::Error;

/// Result type for PLC construction.
pub type Result<T> = std::result::Result<T, Error>;

/// Construction-time validation failures.
///
/// Per-frame operations (`do_fe`, `add_to_history`, `conceal_lost_frame`)
/// never fail at runtime: a degraded input produces degraded but defined
/// output. Only building a concealer or FFT plan can fail.
#[derive(Debug, Error)]
pub enum Error {
    /// `historylen` exceeded the compile-time maximum for the fixed
    /// history buffer.
    #[error("history length {got} exceeds maximum {max}")]
    HistoryTooLong {
        /// Requested length.
        got: usize,
        /// Compile-time ceiling.
        max: usize,
    },

    /// `poverlapmax` exceeded the compile-time maximum for the fixed
    /// overlap-add scratch buffer.
    #[error("overlap window {got} exceeds maximum {max}")]
    OverlapWindowTooLong {
        /// Requested length.
        got: usize,
        /// Compile-time ceiling.
        max: usize,
    },

    /// `framesz` exceeded the compile-time maximum frame size.
    #[error("frame size {got} exceeds maximum {max}")]
    FrameTooLong {
        /// Requested length.
        got: usize,
        /// Compile-time ceiling.
        max: usize,
    },

    /// The native radix-2 FFT requires a power-of-two transform size.
    #[error("FFT size {0} is not a power of two")]
    FftSizeNotPowerOfTwo(usize),
}
