//! Overlap-add helpers shared by pitch-period stitching and end-of-erasure
//! reconvergence.
//!
//! Both ramps use the same shape: a left-weight `lw` starting just below
//! `1.0` and a right-weight `rw` starting just above `0.0`, moving
//! linearly towards each other over `cnt` samples, so that sample 0 is
//! almost all `l` and the last sample is almost all `r`.

/// Cross-fade `l` into `r`, writing `cnt` samples into `o`.
///
/// Used to stitch a freshly extracted pitch period onto the tail of the
/// float scratch buffer (`lastq` against the sample just before the new
/// period). All three slices must have length `>= cnt`.
pub fn overlap_add_f32(l: &[f32], r: &[f32], o: &mut [f32], cnt: usize) {
    if cnt == 0 {
        return;
    }
    let incr = 1.0 / cnt as f32;
    let mut lw = 1.0 - incr;
    let mut rw = incr;
    for i in 0..cnt {
        let t = (lw * l[i] + rw * r[i]).clamp(-32768.0, 32767.0);
        o[i] = t;
        lw -= incr;
        rw += incr;
    }
}

/// Same cross-fade over `i16` samples, with `l` crossed into `io` in
/// place: each `io[i]` is read as the right-hand side and overwritten
/// with the blended result before it is needed again.
pub fn overlap_add_i16(l: &[i16], io: &mut [i16], cnt: usize) {
    if cnt == 0 {
        return;
    }
    let incr = 1.0 / cnt as f32;
    let mut lw = 1.0 - incr;
    let mut rw = incr;
    for i in 0..cnt {
        let t = (lw * l[i] as f32 + rw * io[i] as f32).clamp(-32768.0, 32767.0);
        io[i] = t as i16;
        lw -= incr;
        rw += incr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlap_add_f32_starts_near_l_and_ends_near_r() {
        let l = [100.0f32; 10];
        let r = [0.0f32; 10];
        let mut o = [0.0f32; 10];
        overlap_add_f32(&l, &r, &mut o, 10);
        assert!(o[0] > o[9]);
        assert!(o[0] < 100.0);
    }

    #[test]
    fn overlap_add_i16_clamps_to_sample_range() {
        let l = [32767i16; 4];
        let mut io = [32767i16; 4];
        overlap_add_i16(&l, &mut io, 4);
        assert!(io.iter().all(|&s| s <= 32767 && s >= -32768));
    }
}
