//! Bark-band mapping and psychoacoustic masking threshold.
//!
//! Ported from the reference's `bark_bands`/`hearing_threshold` tables
//! and `get_bark_band`/`noise_shaping` masking computation.

/// Number of critical bands.
pub const BARK_BANDS: usize = 24;

/// Bark band boundaries, in Hz. `bark_bands[b]..bark_bands[b+1]` is band
/// `b`'s half-open interval.
pub const BARK_BAND_EDGES_HZ: [f32; BARK_BANDS + 1] = [
    0.0, 100.0, 200.0, 300.0, 400.0, 510.0, 630.0, 770.0, 920.0, 1080.0, 1270.0, 1480.0, 1720.0,
    2000.0, 2320.0, 2700.0, 3150.0, 3700.0, 4400.0, 5300.0, 6400.0, 7700.0, 9500.0, 12000.0,
    15500.0,
];

/// Absolute hearing threshold per band, in dB SPL.
pub const HEARING_THRESHOLD_DB: [f32; BARK_BANDS] = [
    30.0, 20.0, 15.0, 10.0, 5.0, 0.0, -5.0, -5.0, -5.0, -5.0, -5.0, -5.0, 0.0, 5.0, 10.0, 15.0,
    20.0, 25.0, 30.0, 35.0, 40.0, 45.0, 50.0, 55.0,
];

/// Map a frequency in Hz to its enclosing Bark band, clamped to
/// `[0, BARK_BANDS - 1]`.
pub fn get_bark_band(hz: f32) -> usize {
    for b in 0..BARK_BANDS {
        if hz >= BARK_BAND_EDGES_HZ[b] && hz < BARK_BAND_EDGES_HZ[b + 1] {
            return b;
        }
    }
    BARK_BANDS - 1
}

/// Compute the per-band linear masking threshold from per-band energy.
///
/// For each source band `b`, its level spreads into every other band
/// `b_adj` at `2 dB/Bark` below band 10 and `4 dB/Bark` at or above it,
/// then is corrected by the absolute hearing threshold and accumulated
/// in the power domain. The caller pre-averages `band_energy` over the
/// bins that fell in each band (zero for empty bands).
pub fn masking_threshold(band_energy: &[f32; BARK_BANDS]) -> [f32; BARK_BANDS] {
    let mut threshold_power = [0.0f32; BARK_BANDS];
    for b in 0..BARK_BANDS {
        if band_energy[b] <= 0.0 {
            continue;
        }
        let band_db = 10.0 * (band_energy[b] + 1e-12).log10();
        let spread_factor = if b < 10 { 2.0 } else { 4.0 };

        for (b_adj, threshold) in threshold_power.iter_mut().enumerate() {
            let dist = (b as f32 - b_adj as f32).abs();
            let spread_db = -spread_factor * dist;
            *threshold += 10f32.powf((band_db + spread_db - HEARING_THRESHOLD_DB[b_adj]) / 10.0);
        }
    }

    let mut threshold = [0.0f32; BARK_BANDS];
    for b in 0..BARK_BANDS {
        threshold[b] = (threshold_power[b] + 1e-12).sqrt();
    }
    threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_boundaries_are_monotonic() {
        for w in BARK_BAND_EDGES_HZ.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn get_bark_band_matches_known_points() {
        assert_eq!(get_bark_band(0.0), 0);
        assert_eq!(get_bark_band(99.0), 0);
        assert_eq!(get_bark_band(100.0), 1);
        assert_eq!(get_bark_band(20000.0), BARK_BANDS - 1);
    }

    #[test]
    fn masking_threshold_is_nonnegative() {
        let mut energy = [0.0f32; BARK_BANDS];
        energy[5] = 100.0;
        energy[12] = 10.0;
        let threshold = masking_threshold(&energy);
        for t in threshold {
            assert!(t >= 0.0);
        }
    }
}
