//! Optional post-filters: masking-threshold noise shaping and
//! LPC-residual comfort noise. Both are disabled unless
//! [`crate::config::LphFeatures::post_filter`] selects them.

use rand::Rng;

use crate::config::CNG_GAIN_SCALE;
use crate::lph::frame::AudioFrame;
use crate::lph::lpc::{compute_lpc, predict};
use crate::spectral::bark::{get_bark_band, masking_threshold, BARK_BANDS};
use crate::spectral::{hanning, window};
use crate::spectral::Fft;
use crate::Sample;

/// Limit `frame`'s spectrum to the psychoacoustic masking threshold
/// derived from its own Bark-band energy.
pub fn noise_shaping(frame: &mut [Sample], fft: &dyn Fft, sample_rate_hz: f32) {
    let framesz = frame.len();
    let size = fft.size();
    let win = hanning(framesz);

    let mut buf = vec![0.0f32; 2 * size];
    for i in 0..framesz {
        buf[2 * i] = win[i] * (frame[i] as f32 / 32768.0);
    }
    fft.forward(&mut buf);

    let half = size / 2;
    if half < 2 {
        return;
    }
    let bin_hz = (sample_rate_hz / 2.0) / half as f32;

    let mut magnitude = vec![0.0f32; half];
    let mut band_energy = [0.0f32; BARK_BANDS];
    let mut band_count = [0usize; BARK_BANDS];
    for k in 0..half {
        let re = buf[2 * k];
        let im = buf[2 * k + 1];
        let mag = (re * re + im * im).sqrt();
        magnitude[k] = mag;
        let band = get_bark_band(k as f32 * bin_hz);
        band_energy[band] += mag * mag;
        band_count[band] += 1;
    }
    for b in 0..BARK_BANDS {
        if band_count[b] > 0 {
            band_energy[b] /= band_count[b] as f32;
        }
    }
    let threshold = masking_threshold(&band_energy);

    for k in 0..half {
        let band = get_bark_band(k as f32 * bin_hz);
        let th = threshold[band];
        if magnitude[k] > th && magnitude[k] > 0.0 {
            let gain = th / magnitude[k];
            buf[2 * k] *= gain;
            buf[2 * k + 1] *= gain;
        }
    }

    fft.inverse(&mut buf);

    let mut samples: Vec<f32> = (0..framesz).map(|i| buf[2 * i]).collect();
    window::synthesis_divide(&mut samples, &win);
    for (i, slot) in frame.iter_mut().enumerate() {
        let recovered = (samples[i] * 32767.0).clamp(-32768.0, 32767.0);
        *slot = recovered as i16;
    }
}

/// Add LPC-residual-matched comfort noise to `frame`, with spectrum
/// shaped to `history`'s Bark-band residual energy and uniform-random
/// phase drawn from `rng`.
pub fn add_comfort_noise(
    frame: &mut [Sample],
    history: &AudioFrame,
    fft: &dyn Fft,
    sample_rate_hz: f32,
    rng: &mut impl Rng,
) {
    let framesz = history.pcm.len();
    let (lpc_coeffs, lpc_order) = compute_lpc(&history.pcm, history.is_unvoiced);

    let residual: Vec<i16> = (0..framesz)
        .map(|i| {
            let pred = predict(&lpc_coeffs, lpc_order, &history.pcm, i);
            history.pcm[i].saturating_sub(pred as i16)
        })
        .collect();

    let size = fft.size();
    let half = size / 2;
    if half < 2 {
        return;
    }
    let bin_hz = (sample_rate_hz / 2.0) / half as f32;

    let mut buf = vec![0.0f32; 2 * size];
    for i in 0..framesz {
        buf[2 * i] = residual[i] as f32 / 32768.0;
    }
    fft.forward(&mut buf);

    let mut noise_spectrum = [0.0f32; BARK_BANDS];
    let mut band_count = [0usize; BARK_BANDS];
    for k in 0..half {
        let re = buf[2 * k];
        let im = buf[2 * k + 1];
        let mag = (re * re + im * im).sqrt();
        let band = get_bark_band(k as f32 * bin_hz);
        noise_spectrum[band] += mag * mag;
        band_count[band] += 1;
    }
    for b in 0..BARK_BANDS {
        if band_count[b] > 0 {
            noise_spectrum[b] /= band_count[b] as f32;
        }
    }

    let mut noise_fft = vec![0.0f32; 2 * size];
    for k in 0..half {
        let band = get_bark_band(k as f32 * bin_hz);
        let amp = (noise_spectrum[band] * CNG_GAIN_SCALE).sqrt();
        let phase = 2.0 * std::f32::consts::PI * rng.gen::<f32>();
        noise_fft[2 * k] = amp * phase.cos();
        noise_fft[2 * k + 1] = amp * phase.sin();
    }
    for k in (half + 1)..size {
        let mirror = size - k;
        noise_fft[2 * k] = noise_fft[2 * mirror];
        noise_fft[2 * k + 1] = -noise_fft[2 * mirror + 1];
    }

    fft.inverse(&mut noise_fft);
    for (i, slot) in frame.iter_mut().enumerate() {
        let added = (*slot as f32) + (noise_fft[2 * i] * 32767.0).clamp(-32768.0, 32767.0);
        *slot = added.clamp(-32768.0, 32767.0) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spectral::fft::NativeFft;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn noise_shaping_preserves_frame_length_on_silence() {
        let fft = NativeFft::new(64).unwrap();
        let mut frame = vec![0i16; 60];
        noise_shaping(&mut frame, &fft, 8000.0);
        assert_eq!(frame.len(), 60);
    }

    #[test]
    fn comfort_noise_is_deterministic_for_a_fixed_seed() {
        let fft = NativeFft::new(64).unwrap();
        let history = AudioFrame::silence(60);
        let mut rng_a = StdRng::seed_from_u64(42);
        let mut rng_b = StdRng::seed_from_u64(42);

        let mut frame_a = vec![0i16; 60];
        let mut frame_b = vec![0i16; 60];
        add_comfort_noise(&mut frame_a, &history, &fft, 8000.0, &mut rng_a);
        add_comfort_noise(&mut frame_b, &history, &fft, 8000.0, &mut rng_b);

        assert_eq!(frame_a, frame_b);
    }
}
