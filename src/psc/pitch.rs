//! Pitch period estimation at the onset of an erasure burst.
//!
//! Two searches: [`find_pitch`] is the reference G.711 Appendix I
//! coarse/fine normalised-correlation search; [`enhanced_find_pitch`]
//! is the optional adaptive variant with multi-candidate NCCF scoring
//! and history-continuity overrides (§4.1's open question: only the
//! dynamic-tolerance continuity pass is implemented, not the duplicated
//! fixed-5% pass the reference runs immediately before it).

use crate::config::PlcParams;

/// Coarse decimated search over the admissible pitch range followed by
/// a full-stride refinement around the coarse winner.
///
/// `pitchbuf` is the full history-length float scratch buffer; `l` (the
/// most recent `corrlen` samples) and `r` (the `corrbuflen` samples
/// ending where `l` begins) are taken from its tail.
pub fn find_pitch(pitchbuf: &[f32], params: &PlcParams) -> usize {
    let historylen = pitchbuf.len();
    let l = &pitchbuf[historylen - params.corrlen..];
    let r = &pitchbuf[historylen - params.corrbuflen..];
    let ndec = params.ndec;
    let corrlen = params.corrlen;

    let coarse_score = |j: usize| -> f32 {
        let mut energy = 0.0f32;
        let mut corr = 0.0f32;
        let mut i = 0;
        while i < corrlen {
            energy += r[j + i] * r[j + i];
            corr += r[j + i] * l[i];
            i += ndec;
        }
        let scale = energy.max(params.corrminpower);
        corr / scale.sqrt()
    };

    let mut best_j = 0usize;
    let mut best_score = coarse_score(0);
    let mut j = ndec;
    while j <= params.pitchdiff {
        let score = coarse_score(j);
        if score >= best_score {
            best_score = score;
            best_j = j;
        }
        j += ndec;
    }

    let fine_score = |j: usize| -> f32 {
        let mut energy = 0.0f32;
        let mut corr = 0.0f32;
        for i in 0..corrlen {
            energy += r[j + i] * r[j + i];
            corr += r[j + i] * l[i];
        }
        let scale = energy.max(params.corrminpower);
        corr / scale.sqrt()
    };

    let fine_lo = best_j.saturating_sub(ndec.saturating_sub(1));
    let fine_hi = (best_j + ndec.saturating_sub(1)).min(params.pitchdiff);

    let mut best_match = fine_lo;
    let mut best_fine_score = fine_score(fine_lo);
    for j in (fine_lo + 1)..=fine_hi {
        let score = fine_score(j);
        if score > best_fine_score {
            best_fine_score = score;
            best_match = j;
        }
    }

    params.pitch_max - best_match
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    nccf: f32,
    index: usize,
}

const NO_CANDIDATE: Candidate = Candidate {
    nccf: f32::NEG_INFINITY,
    index: 0,
};

/// Multi-candidate squared-NCCF pitch search with a history-continuity
/// override.
///
/// Returns the chosen pitch period; the caller is responsible for
/// clamping it to `[pitch_min, pitch_max]` and updating `last_pitch`.
pub fn enhanced_find_pitch(
    pitchbuf: &[f32],
    params: &PlcParams,
    last_pitch: usize,
    prev_energy: f32,
) -> usize {
    let historylen = pitchbuf.len();
    let l = &pitchbuf[historylen - params.corrlen..];
    let r = &pitchbuf[historylen - params.corrbuflen..];
    let corrlen = params.corrlen;

    let nccf = |j: usize| -> f32 {
        let mut energy = 0.0f32;
        let mut corr = 0.0f32;
        for i in 0..corrlen {
            energy += r[j + i] * r[j + i];
            corr += r[j + i] * l[i];
        }
        (corr * corr) / (energy + 1e-6)
    };

    let mut candidates = [NO_CANDIDATE; 3];
    let mut j = 0usize;
    while j <= params.pitchdiff {
        let score = nccf(j);
        if score > candidates[0].nccf {
            candidates[2] = candidates[1];
            candidates[1] = candidates[0];
            candidates[0] = Candidate { nccf: score, index: j };
        } else if score > candidates[1].nccf {
            candidates[2] = candidates[1];
            candidates[1] = Candidate { nccf: score, index: j };
        } else if score > candidates[2].nccf {
            candidates[2] = Candidate { nccf: score, index: j };
        }
        j += params.ndec;
    }

    let ndec = params.ndec;
    let fine_lo = candidates[0].index.saturating_sub(ndec.saturating_sub(1));
    let fine_hi = (candidates[0].index + ndec.saturating_sub(1)).min(params.pitchdiff);
    let mut best_match = candidates[0].index;
    let mut best_score = candidates[0].nccf;
    for j in fine_lo..=fine_hi {
        let score = nccf(j);
        if score > best_score {
            best_score = score;
            best_match = j;
        }
    }

    let mut final_pitch = params.pitch_max - best_match;

    // Reference quirk: `current_energy` here is a function only of the
    // fixed `corrminpower` floor, not of the actual frame — carried
    // over from `enhanced_findpitch` in the reference rather than
    // invented, per the crate's grounding discipline.
    let current_energy = 10.0 * (params.corrminpower + 1e-6).log10();
    let energy_diff = (current_energy - prev_energy).abs();
    let threshold = if energy_diff > 10.0 { 0.15 } else { 0.05 };

    for candidate in &candidates {
        let candidate_pitch = params.pitch_max - candidate.index;
        let delta = (candidate_pitch as f32 - last_pitch as f32).abs();
        if delta < threshold * last_pitch as f32 {
            final_pitch = candidate_pitch;
            break;
        }
    }

    final_pitch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlcVariant;

    fn tone_pitchbuf(historylen: usize, period: usize) -> Vec<f32> {
        (0..historylen)
            .map(|i| 10000.0 * (2.0 * std::f32::consts::PI * i as f32 / period as f32).sin())
            .collect()
    }

    #[test]
    fn pure_tone_pitch_matches_period_within_one_sample() {
        let params = PlcVariant::Cvsd8k.params(10);
        let period = 80usize; // within [40, 120]
        let buf = tone_pitchbuf(params.historylen, period);
        let pitch = find_pitch(&buf, &params);
        assert!((pitch as i64 - period as i64).abs() <= 1);
    }

    #[test]
    fn pitch_is_always_within_admissible_range() {
        let params = PlcVariant::Msbc16k.params(10);
        let buf = tone_pitchbuf(params.historylen, 150);
        let pitch = find_pitch(&buf, &params);
        assert!(pitch >= params.pitch_min && pitch <= params.pitch_max);
    }

    #[test]
    fn enhanced_search_stays_in_range_and_updates_toward_candidate() {
        let params = PlcVariant::Cvsd8k.params(10);
        let buf = tone_pitchbuf(params.historylen, 80);
        let pitch = enhanced_find_pitch(&buf, &params, 80, -99.0);
        assert!(pitch >= params.pitch_min && pitch <= params.pitch_max);
    }
}
