//! Normalization of raw pairwise overlap records into canonical edges.
//!
//! Both ingestion formats (text `OVL` messages and binary overlap-store
//! records) are first turned into a [`RawOverlap`] and then classified here,
//! so the graph only ever sees one edge shape.

use crate::edge::{ContainmentKind, Edge, EdgeEnd, EdgeKind, EdgeLabel, FragEnd, VertexId};

/// Relative orientation of the two fragments in an overlap record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// A forward, B forward.
    Normal,
    /// A forward, B reverse.
    Innie,
    /// A reverse, B forward.
    Outtie,
    /// A reverse, B reverse.
    Anti,
    Unknown,
}

impl Orientation {
    pub fn from_code(code: char) -> Self {
        match code {
            'N' => Orientation::Normal,
            'I' => Orientation::Innie,
            'O' => Orientation::Outtie,
            'A' => Orientation::Anti,
            _ => Orientation::Unknown,
        }
    }

    pub fn code(self) -> char {
        match self {
            Orientation::Normal => 'N',
            Orientation::Innie => 'I',
            Orientation::Outtie => 'O',
            Orientation::Anti => 'A',
            Orientation::Unknown => 'U',
        }
    }
}

/// An overlap record as it arrives from either wire format.
#[derive(Debug, Clone, PartialEq)]
pub struct RawOverlap {
    pub a_iid: u32,
    pub b_iid: u32,
    pub a_hang: i32,
    pub b_hang: i32,
    pub orientation: Orientation,
    /// Error rate of the alignment.
    pub quality: f32,
    pub blessed: bool,
}

impl RawOverlap {
    pub fn new(a_iid: u32, b_iid: u32, a_hang: i32, b_hang: i32, orientation: Orientation) -> Self {
        Self {
            a_iid,
            b_iid,
            a_hang,
            b_hang,
            orientation,
            quality: 0.0,
            blessed: false,
        }
    }

    /// Both hangs point the "wrong" way; the record describes the overlap
    /// with the fragment roles exchanged.
    pub fn is_improper(&self) -> bool {
        let (ahg, bhg) = (self.a_hang, self.b_hang);
        (ahg < 0 && bhg < 0) || (ahg == 0 && bhg < 0) || (ahg < 0 && bhg == 0)
    }
}

/// Kind of an overlap judged purely from its (proper) hangs.
pub fn hang_kind(a_hang: i32, b_hang: i32) -> EdgeKind {
    if a_hang > 0 && b_hang > 0 {
        EdgeKind::Dovetail
    } else if a_hang < 0 || (a_hang == 0 && b_hang > 0) {
        EdgeKind::Containment(ContainmentKind::FromContained)
    } else if b_hang < 0 || (b_hang == 0 && a_hang > 0) {
        EdgeKind::Containment(ContainmentKind::ToContained)
    } else {
        EdgeKind::Containment(ContainmentKind::Degenerate)
    }
}

/// A proper overlap with resolved fragment ends, not yet directed.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedOverlap {
    pub a: EdgeEnd,
    pub b: EdgeEnd,
    pub quality: f32,
    pub blessed: bool,
}

impl NormalizedOverlap {
    pub fn kind(&self) -> EdgeKind {
        hang_kind(self.a.hang, self.b.hang)
    }

    /// Hangs must stay strictly inside both fragments.
    pub fn fits_lengths(&self, a_len: u32, b_len: u32) -> bool {
        let (aln, bln) = (a_len as i64, b_len as i64);
        let (ahg, bhg) = (self.a.hang as i64, self.b.hang as i64);
        !(aln <= ahg || bln <= bhg || aln <= -bhg || bln <= -ahg)
    }

    /// Direct the overlap. Dovetails keep the a to b direction; containments
    /// leave the container, with the lower vertex id as the container when
    /// both hangs are zero.
    pub fn into_edge(self) -> Edge {
        let kind = self.kind();
        let (src, dst) = match kind {
            EdgeKind::Dovetail => (self.a, self.b),
            EdgeKind::Containment(ContainmentKind::ToContained) => (self.a, self.b),
            EdgeKind::Containment(ContainmentKind::FromContained) => (self.b, self.a),
            EdgeKind::Containment(ContainmentKind::Degenerate) => {
                if self.a.vertex <= self.b.vertex {
                    (self.a, self.b)
                } else {
                    (self.b, self.a)
                }
            }
        };
        Edge {
            src,
            dst,
            kind,
            quality: self.quality,
            blessed: self.blessed,
            reflected: false,
            grangered: false,
            label: EdgeLabel::Unlabeled,
        }
    }
}

/// Resolve the fragment ends of `raw` and undo an improper record.
///
/// `a` and `b` are the vertices already resolved for `raw.a_iid` and
/// `raw.b_iid`. Returns `None` when the orientation is unknown or a hang
/// has no negation in `i32`.
pub fn normalize(raw: &RawOverlap, a: VertexId, b: VertexId) -> Option<NormalizedOverlap> {
    use Orientation::*;
    let ori = raw.orientation;
    if ori == Unknown {
        return None;
    }
    // both hangs are negated by the improper swap or the granger mate
    let neg_a = raw.a_hang.checked_neg()?;
    let neg_b = raw.b_hang.checked_neg()?;
    let improper = raw.is_improper();
    let a_suffix = improper ^ matches!(ori, Normal | Innie);
    let b_suffix = a_suffix ^ !matches!(ori, Innie | Outtie);

    let a_end = EdgeEnd {
        vertex: a,
        end: FragEnd::from_suffix(a_suffix),
        hang: raw.a_hang,
    };
    let b_end = EdgeEnd {
        vertex: b,
        end: FragEnd::from_suffix(b_suffix),
        hang: raw.b_hang,
    };
    let (a_end, b_end) = if improper {
        (
            EdgeEnd {
                hang: neg_b,
                ..b_end
            },
            EdgeEnd {
                hang: neg_a,
                ..a_end
            },
        )
    } else {
        (a_end, b_end)
    };
    Some(NormalizedOverlap {
        a: a_end,
        b: b_end,
        quality: raw.quality,
        blessed: raw.blessed,
    })
}

/// Classify a raw record into its canonical directed edge.
pub fn classify(raw: &RawOverlap, a: VertexId, b: VertexId) -> Option<Edge> {
    normalize(raw, a, b).map(NormalizedOverlap::into_edge)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ends(edge: &Edge) -> ((VertexId, FragEnd), (VertexId, FragEnd)) {
        (
            (edge.src.vertex, edge.src.end),
            (edge.dst.vertex, edge.dst.end),
        )
    }

    #[test]
    fn improper_record_matches_proper_record() {
        let improper = RawOverlap::new(1, 2, -3, -5, Orientation::Normal);
        let proper = RawOverlap::new(2, 1, 5, 3, Orientation::Normal);
        let e1 = classify(&improper, VertexId(1), VertexId(2)).unwrap();
        let e2 = classify(&proper, VertexId(2), VertexId(1)).unwrap();
        assert_eq!(e1, e2);
        assert_eq!(e1.kind, EdgeKind::Dovetail);
        assert_eq!(e1.src.vertex, VertexId(2));
        assert_eq!(e1.src.hang, 5);
        assert_eq!(e1.dst.hang, 3);
    }

    #[test]
    fn fragment_ends_follow_orientation() {
        let cases = [
            (Orientation::Normal, FragEnd::Suffix, FragEnd::Prefix),
            (Orientation::Innie, FragEnd::Suffix, FragEnd::Suffix),
            (Orientation::Outtie, FragEnd::Prefix, FragEnd::Prefix),
            (Orientation::Anti, FragEnd::Prefix, FragEnd::Suffix),
        ];
        for (ori, a_end, b_end) in cases {
            let raw = RawOverlap::new(10, 20, 7, 9, ori);
            let edge = classify(&raw, VertexId(0), VertexId(1)).unwrap();
            assert_eq!(edge.src.end, a_end, "{ori:?}");
            assert_eq!(edge.dst.end, b_end, "{ori:?}");
        }
    }

    #[test]
    fn swapped_roles_give_congruent_edges() {
        let orientations = [
            Orientation::Normal,
            Orientation::Innie,
            Orientation::Outtie,
            Orientation::Anti,
        ];
        let hangs = [(5, 3), (4, -2), (-6, 8), (0, 0), (0, 7), (9, 0)];
        for ori in orientations {
            for (ahg, bhg) in hangs {
                let forward = RawOverlap::new(1, 2, ahg, bhg, ori);
                let swapped = RawOverlap::new(2, 1, -ahg, -bhg, ori);
                let e1 = classify(&forward, VertexId(1), VertexId(2)).unwrap();
                let e2 = classify(&swapped, VertexId(2), VertexId(1)).unwrap();
                assert_eq!(e1.kind.class(), e2.kind.class(), "{ori:?} {ahg} {bhg}");
                let (s1, d1) = ends(&e1);
                let (s2, d2) = ends(&e2);
                if e1.kind == EdgeKind::Dovetail {
                    assert_eq!((s1, d1), (s2, d2), "{ori:?} {ahg} {bhg}");
                } else {
                    let mut p1 = [s1.0, d1.0];
                    let mut p2 = [s2.0, d2.0];
                    p1.sort();
                    p2.sort();
                    assert_eq!(p1, p2, "{ori:?} {ahg} {bhg}");
                }
            }
        }
    }

    #[test]
    fn kinds_follow_hang_signs() {
        use ContainmentKind::*;
        assert_eq!(hang_kind(5, 3), EdgeKind::Dovetail);
        assert_eq!(hang_kind(-2, 6), EdgeKind::Containment(FromContained));
        assert_eq!(hang_kind(0, 6), EdgeKind::Containment(FromContained));
        assert_eq!(hang_kind(4, -1), EdgeKind::Containment(ToContained));
        assert_eq!(hang_kind(4, 0), EdgeKind::Containment(ToContained));
        assert_eq!(hang_kind(0, 0), EdgeKind::Containment(Degenerate));
    }

    #[test]
    fn containment_leaves_the_container() {
        // b inside a
        let raw = RawOverlap::new(1, 2, 10, -5, Orientation::Normal);
        let edge = classify(&raw, VertexId(4), VertexId(9)).unwrap();
        assert_eq!(edge.src.vertex, VertexId(4));
        // a inside b
        let raw = RawOverlap::new(1, 2, -10, 5, Orientation::Normal);
        let edge = classify(&raw, VertexId(4), VertexId(9)).unwrap();
        assert_eq!(edge.src.vertex, VertexId(9));
        assert_eq!(edge.src.hang, 5);
        assert_eq!(edge.dst.hang, -10);
    }

    #[test]
    fn degenerate_container_is_lower_vertex() {
        let raw = RawOverlap::new(1, 2, 0, 0, Orientation::Normal);
        let edge = classify(&raw, VertexId(7), VertexId(3)).unwrap();
        assert_eq!(edge.src.vertex, VertexId(3));
        let edge = classify(&raw, VertexId(3), VertexId(7)).unwrap();
        assert_eq!(edge.src.vertex, VertexId(3));
    }

    #[test]
    fn unknown_orientation_is_unclassifiable() {
        let raw = RawOverlap::new(1, 2, 5, 3, Orientation::Unknown);
        assert!(classify(&raw, VertexId(0), VertexId(1)).is_none());
    }

    #[test]
    fn minimum_hang_is_unclassifiable() {
        let improper = RawOverlap::new(1, 2, -1, i32::MIN, Orientation::Normal);
        assert!(improper.is_improper());
        assert!(normalize(&improper, VertexId(0), VertexId(1)).is_none());
        let proper = RawOverlap::new(1, 2, i32::MIN + 1, 7, Orientation::Outtie);
        assert!(normalize(&proper, VertexId(0), VertexId(1)).is_some());
    }

    #[test]
    fn length_check_rejects_overhanging_hangs() {
        let raw = RawOverlap::new(1, 2, 120, 40, Orientation::Normal);
        let norm = normalize(&raw, VertexId(0), VertexId(1)).unwrap();
        assert!(!norm.fits_lengths(100, 100));
        assert!(norm.fits_lengths(150, 100));
    }
}
