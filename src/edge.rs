//! Canonical edge representation over fragment ends.

use std::fmt;

/// Stable handle of a fragment vertex (its position in the fragment table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VertexId(pub u32);

/// Stable handle of a slot in the edge arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EdgeId(pub u32);

impl VertexId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl EdgeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// One of the two logical ends of a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FragEnd {
    Prefix,
    Suffix,
}

impl FragEnd {
    pub fn from_suffix(suffix: bool) -> Self {
        if suffix {
            FragEnd::Suffix
        } else {
            FragEnd::Prefix
        }
    }

    pub fn is_suffix(self) -> bool {
        self == FragEnd::Suffix
    }

    pub fn opposite(self) -> Self {
        match self {
            FragEnd::Prefix => FragEnd::Suffix,
            FragEnd::Suffix => FragEnd::Prefix,
        }
    }

    pub fn index(self) -> usize {
        match self {
            FragEnd::Prefix => 0,
            FragEnd::Suffix => 1,
        }
    }

    pub const BOTH: [FragEnd; 2] = [FragEnd::Prefix, FragEnd::Suffix];
}

/// Sub-kind of a containment overlap, named from the unnormalized record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainmentKind {
    /// The a fragment lies inside the b fragment.
    FromContained,
    /// The b fragment lies inside the a fragment.
    ToContained,
    /// Both hangs zero: the fragments span the same interval.
    Degenerate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Dovetail,
    Containment(ContainmentKind),
}

/// Which bounded adjacency list an edge lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeClass {
    Dovetail,
    Containment,
}

impl EdgeClass {
    pub fn index(self) -> usize {
        match self {
            EdgeClass::Dovetail => 0,
            EdgeClass::Containment => 1,
        }
    }

    pub const BOTH: [EdgeClass; 2] = [EdgeClass::Dovetail, EdgeClass::Containment];
}

impl EdgeKind {
    pub fn class(self) -> EdgeClass {
        match self {
            EdgeKind::Dovetail => EdgeClass::Dovetail,
            EdgeKind::Containment(_) => EdgeClass::Containment,
        }
    }
}

/// Repair annotation carried by an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeLabel {
    #[default]
    Unlabeled,
    MarkedByBreaker,
    RemovedByBreaker,
}

/// A fragment end together with the hang measured from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEnd {
    pub vertex: VertexId,
    pub end: FragEnd,
    pub hang: i32,
}

/// A directed overlap edge leaving `src` and entering `dst`.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub src: EdgeEnd,
    pub dst: EdgeEnd,
    pub kind: EdgeKind,
    /// Error rate of the underlying alignment.
    pub quality: f32,
    pub blessed: bool,
    /// This is the mirror view of the overlap, generated from the other side.
    pub reflected: bool,
    /// This is the granger companion of a containment edge.
    pub grangered: bool,
    pub label: EdgeLabel,
}

impl Edge {
    pub fn a_hang(&self) -> i32 {
        self.src.hang
    }

    pub fn b_hang(&self) -> i32 {
        self.dst.hang
    }

    /// The same overlap seen from the target fragment.
    pub fn reflect(&self) -> Edge {
        Edge {
            src: self.dst,
            dst: self.src,
            reflected: !self.reflected,
            ..self.clone()
        }
    }

    /// Complement companion of a containment edge: roles swapped, both
    /// ends flipped and both hangs negated.
    pub fn granger(&self) -> Edge {
        Edge {
            src: EdgeEnd {
                vertex: self.dst.vertex,
                end: self.dst.end.opposite(),
                hang: -self.dst.hang,
            },
            dst: EdgeEnd {
                vertex: self.src.vertex,
                end: self.src.end.opposite(),
                hang: -self.src.hang,
            },
            grangered: !self.grangered,
            ..self.clone()
        }
    }

    /// Does this edge join exactly these two fragment ends in this direction?
    pub fn joins(&self, src: (VertexId, FragEnd), dst: (VertexId, FragEnd)) -> bool {
        (self.src.vertex, self.src.end) == src && (self.dst.vertex, self.dst.end) == dst
    }
}
