//! Pairwise fragment aligner used by repair.

use bio::alphabets::dna;
use strsim::{damerau_levenshtein, hamming};

use crate::classify::Orientation;
use crate::error::{GraphError, Result};
use crate::ovl_message::{OverlapMessage, OverlapType};

/// Fixed alignment parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignParams {
    /// Maximum error rate of a reported overlap.
    pub error_rate: f32,
    /// Minimum overlap length in bases.
    pub min_overlap: usize,
}

impl AlignParams {
    pub fn standard() -> Self {
        Self {
            error_rate: 0.06,
            min_overlap: 40,
        }
    }
}

/// One side of an alignment request.
#[derive(Debug, Clone, Copy)]
pub struct AlignInput<'a> {
    pub iid: u32,
    pub sequence: &'a str,
}

pub trait Aligner {
    /// Look for an overlap between `a` and `b`. With `opposite`, `b` is
    /// compared reverse complemented. Records are reported in proper form:
    /// the container, or the fragment that starts first, is `afr`.
    fn align(
        &self,
        a: AlignInput<'_>,
        b: AlignInput<'_>,
        opposite: bool,
        params: &AlignParams,
    ) -> Result<Option<OverlapMessage>>;
}

/// Ungapped offset scan scored by Damerau-Levenshtein distance over the
/// overlapping windows.
#[derive(Debug, Clone, Copy)]
pub struct EditDistanceAligner {
    /// Offsets whose Hamming mismatch rate exceeds this are not scored.
    pub prefilter_rate: f32,
}

impl Default for EditDistanceAligner {
    fn default() -> Self {
        Self {
            prefilter_rate: 0.3,
        }
    }
}

struct Placement {
    offset: i64,
    end_delta: i64,
    length: usize,
    distance: usize,
}

impl EditDistanceAligner {
    fn best_placement(&self, a: &str, b: &str, params: &AlignParams) -> Option<Placement> {
        let (la, lb) = (a.len() as i64, b.len() as i64);
        let min = params.min_overlap.max(1) as i64;
        let mut best: Option<Placement> = None;
        for offset in (min - lb)..=(la - min) {
            let start = offset.max(0);
            let stop = la.min(offset + lb);
            let length = (stop - start) as usize;
            if (length as i64) < min {
                continue;
            }
            let a_window = &a[start as usize..stop as usize];
            let b_window = &b[(start - offset) as usize..(stop - offset) as usize];
            let mismatches = hamming(a_window, b_window).ok()?;
            if mismatches as f32 / length as f32 > self.prefilter_rate.max(params.error_rate) {
                continue;
            }
            let distance = damerau_levenshtein(a_window, b_window);
            if distance as f32 / length as f32 > params.error_rate {
                continue;
            }
            let better = match &best {
                None => true,
                Some(current) => {
                    let rate = distance as f32 / length as f32;
                    let current_rate = current.distance as f32 / current.length as f32;
                    rate < current_rate || (rate == current_rate && length > current.length)
                }
            };
            if better {
                best = Some(Placement {
                    offset,
                    end_delta: offset + lb - la,
                    length,
                    distance,
                });
            }
        }
        best
    }
}

fn message(
    a_iid: u32,
    b_iid: u32,
    orientation: Orientation,
    overlap_type: OverlapType,
    a_hang: i64,
    b_hang: i64,
    quality: f32,
) -> OverlapMessage {
    OverlapMessage {
        a_iid,
        b_iid,
        orientation,
        overlap_type,
        a_hang: a_hang as i32,
        b_hang: b_hang as i32,
        quality,
        min_offset: a_hang as i32,
        max_offset: a_hang as i32,
        polymorphism_count: 0,
        delta: Vec::new(),
    }
}

impl Aligner for EditDistanceAligner {
    fn align(
        &self,
        a: AlignInput<'_>,
        b: AlignInput<'_>,
        opposite: bool,
        params: &AlignParams,
    ) -> Result<Option<OverlapMessage>> {
        if !a.sequence.is_ascii() || !b.sequence.is_ascii() {
            return Err(GraphError::Aligner(format!(
                "non-ASCII sequence in fragment {} or {}",
                a.iid, b.iid
            )));
        }
        let b_seq = if opposite {
            String::from_utf8(dna::revcomp(b.sequence.as_bytes()))
                .map_err(|e| GraphError::Aligner(e.to_string()))?
        } else {
            b.sequence.to_string()
        };
        let Some(found) = self.best_placement(a.sequence, &b_seq, params) else {
            return Ok(None);
        };
        let quality = found.distance as f32 / found.length as f32;
        let (o, e) = (found.offset, found.end_delta);
        let dovetail = (o > 0 && e > 0) || (o < 0 && e < 0);
        let kind = if dovetail {
            OverlapType::Dovetail
        } else {
            OverlapType::Containment
        };
        let a_contains_b = o >= 0 && e <= 0;
        let reported = match (opposite, dovetail) {
            (false, true) if o > 0 => message(a.iid, b.iid, Orientation::Normal, kind, o, e, quality),
            (false, true) => message(b.iid, a.iid, Orientation::Normal, kind, -o, -e, quality),
            (false, false) if a_contains_b => {
                message(a.iid, b.iid, Orientation::Normal, kind, o, e, quality)
            }
            (false, false) => message(b.iid, a.iid, Orientation::Normal, kind, -o, -e, quality),
            (true, true) if o > 0 => message(a.iid, b.iid, Orientation::Innie, kind, o, e, quality),
            (true, true) => message(a.iid, b.iid, Orientation::Outtie, kind, -e, -o, quality),
            (true, false) if a_contains_b => {
                message(a.iid, b.iid, Orientation::Innie, kind, o, e, quality)
            }
            (true, false) => message(b.iid, a.iid, Orientation::Innie, kind, e, o, quality),
        };
        log::debug!(
            "Aligned {} {}: {} {} ahg {} bhg {} erate {:.4}",
            a.iid,
            b.iid,
            reported.orientation.code(),
            reported.overlap_type.code(),
            reported.a_hang,
            reported.b_hang,
            quality
        );
        Ok(Some(reported))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_dna(len: usize, seed: u64) -> String {
        let mut rng = StdRng::seed_from_u64(seed);
        let bases = b"ACGT";
        (0..len).map(|_| bases[rng.gen_range(0..4)] as char).collect()
    }

    fn revcomp(s: &str) -> String {
        String::from_utf8(dna::revcomp(s.as_bytes())).unwrap()
    }

    fn input(iid: u32, sequence: &str) -> AlignInput<'_> {
        AlignInput { iid, sequence }
    }

    #[test]
    fn forward_dovetail_reported_from_first_fragment() {
        let genome = random_dna(300, 42);
        let a = &genome[0..150];
        let b = &genome[100..250];
        let aligner = EditDistanceAligner::default();
        let params = AlignParams::standard();

        let ovl = aligner.align(input(1, a), input(2, b), false, &params).unwrap().unwrap();
        assert_eq!((ovl.a_iid, ovl.b_iid), (1, 2));
        assert_eq!(ovl.orientation, Orientation::Normal);
        assert_eq!(ovl.overlap_type, OverlapType::Dovetail);
        assert_eq!((ovl.a_hang, ovl.b_hang), (100, 100));
        assert_eq!(ovl.quality, 0.0);

        let ovl = aligner.align(input(2, b), input(1, a), false, &params).unwrap().unwrap();
        assert_eq!((ovl.a_iid, ovl.b_iid), (1, 2));
        assert_eq!((ovl.a_hang, ovl.b_hang), (100, 100));
    }

    #[test]
    fn opposite_strand_overlaps() {
        let genome = random_dna(300, 7);
        let a = &genome[0..150];
        let b_rc = revcomp(&genome[100..250]);
        let aligner = EditDistanceAligner::default();
        let params = AlignParams::standard();

        let ovl = aligner.align(input(1, a), input(2, &b_rc), true, &params).unwrap().unwrap();
        assert_eq!(ovl.orientation, Orientation::Innie);
        assert_eq!((ovl.a_hang, ovl.b_hang), (100, 100));

        let a_late = &genome[100..250];
        let b_early_rc = revcomp(&genome[0..150]);
        let ovl = aligner
            .align(input(3, a_late), input(4, &b_early_rc), true, &params)
            .unwrap()
            .unwrap();
        assert_eq!(ovl.orientation, Orientation::Outtie);
        assert_eq!((ovl.a_iid, ovl.b_iid), (3, 4));
        assert_eq!((ovl.a_hang, ovl.b_hang), (100, 100));
    }

    #[test]
    fn containment_names_container_first() {
        let genome = random_dna(300, 11);
        let outer = &genome[0..200];
        let inner = &genome[50..150];
        let aligner = EditDistanceAligner::default();
        let params = AlignParams::standard();
        let ovl = aligner
            .align(input(5, inner), input(6, outer), false, &params)
            .unwrap()
            .unwrap();
        assert_eq!(ovl.overlap_type, OverlapType::Containment);
        assert_eq!((ovl.a_iid, ovl.b_iid), (6, 5));
        assert_eq!((ovl.a_hang, ovl.b_hang), (50, -50));
    }

    #[test]
    fn unrelated_sequences_do_not_align() {
        let aligner = EditDistanceAligner::default();
        let a = random_dna(150, 1);
        let b = random_dna(150, 2);
        let found = aligner
            .align(input(1, &a), input(2, &b), false, &AlignParams::standard())
            .unwrap();
        assert!(found.is_none());
    }
}
