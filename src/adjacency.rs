//! Bounded per-fragment-end adjacency lists over a growable edge arena.
//!
//! Every (vertex, end, class) slot owns a singly linked list of arena
//! indices. The list is kept ordered least favorable first, so the head is
//! always the element a better candidate displaces. Arena slots are never
//! freed: eviction overwrites slot contents in place.

use std::cmp::Ordering;

use crate::config::EdgeOrdering;
use crate::edge::{Edge, EdgeClass, EdgeId, FragEnd, VertexId};

impl EdgeOrdering {
    /// `Less` means `a` is the more favorable edge to keep.
    pub fn compare(self, a: &Edge, b: &Edge) -> Ordering {
        let blessed = match self {
            EdgeOrdering::Strong => b.blessed.cmp(&a.blessed),
            EdgeOrdering::Weak => Ordering::Equal,
        };
        let tail = blessed
            .then(a.a_hang().cmp(&b.a_hang()))
            .then(b.b_hang().cmp(&a.b_hang()))
            .then(a.dst.vertex.cmp(&b.dst.vertex))
            .then(a.dst.end.cmp(&b.dst.end));
        match self {
            EdgeOrdering::Strong => tail.then(a.reflected.cmp(&b.reflected)),
            EdgeOrdering::Weak => tail,
        }
    }
}

/// Address of one bounded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub vertex: VertexId,
    pub end: FragEnd,
    pub class: EdgeClass,
}

impl SlotKey {
    pub fn new(vertex: VertexId, end: FragEnd, class: EdgeClass) -> Self {
        Self { vertex, end, class }
    }

    fn offset(self) -> usize {
        self.vertex.index() * 4 + self.end.index() * 2 + self.class.index()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ListHead {
    head: Option<EdgeId>,
    degree: u32,
}

/// Result of offering one candidate edge to a bounded list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// A new arena slot was appended and linked.
    pub linked: Option<EdgeId>,
    /// Arena slot the candidate finally landed in, if it was kept.
    pub placed: Option<EdgeId>,
}

impl Admission {
    pub fn retained(&self) -> bool {
        self.placed.is_some()
    }
}

#[derive(Debug, Default)]
pub struct AdjacencyIndex {
    edges: Vec<Edge>,
    next: Vec<Option<EdgeId>>,
    lists: Vec<ListHead>,
}

impl AdjacencyIndex {
    pub fn new(num_vertices: usize) -> Self {
        Self {
            edges: Vec::new(),
            next: Vec::new(),
            lists: vec![ListHead::default(); num_vertices * 4],
        }
    }

    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.index()]
    }

    pub fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        &mut self.edges[id.index()]
    }

    pub fn degree(&self, key: SlotKey) -> u32 {
        self.lists[key.offset()].degree
    }

    /// Append an edge to the arena without linking it into any list.
    pub fn insert_unbounded(&mut self, edge: Edge) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(edge);
        self.next.push(None);
        id
    }

    /// Offer `candidate` to the list at `key`.
    ///
    /// While the list has room the candidate is appended and linked at the
    /// head. Then, whether or not it was linked, the candidate is sunk into
    /// the list from the head: every element it beats is shifted one place
    /// toward the head, and it is written into the last vacated slot. A full
    /// list therefore drops its least favorable element when a better one
    /// arrives.
    pub fn admit(
        &mut self,
        key: SlotKey,
        candidate: Edge,
        threshold: u32,
        ordering: EdgeOrdering,
    ) -> Admission {
        let offset = key.offset();
        let mut linked = None;
        if self.lists[offset].degree < threshold {
            let old_head = self.lists[offset].head;
            let id = self.insert_unbounded(candidate.clone());
            self.next[id.index()] = old_head;
            self.lists[offset].head = Some(id);
            self.lists[offset].degree += 1;
            linked = Some(id);
        }

        let Some(mut cursor) = self.lists[offset].head else {
            return Admission {
                linked,
                placed: None,
            };
        };
        if ordering.compare(&candidate, &self.edges[cursor.index()]) == Ordering::Greater {
            return Admission {
                linked,
                placed: None,
            };
        }
        while let Some(next) = self.next[cursor.index()] {
            if ordering.compare(&candidate, &self.edges[next.index()]) == Ordering::Less {
                self.edges[cursor.index()] = self.edges[next.index()].clone();
                cursor = next;
            } else {
                break;
            }
        }
        self.edges[cursor.index()] = candidate;
        Admission {
            linked,
            placed: Some(cursor),
        }
    }

    /// Edge ids of one list, least favorable first.
    pub fn list(&self, key: SlotKey) -> ListIter<'_> {
        ListIter {
            index: self,
            cursor: self.lists[key.offset()].head,
        }
    }

    /// Grow the slot table for vertices added after construction.
    pub fn reserve_vertices(&mut self, num_vertices: usize) {
        if self.lists.len() < num_vertices * 4 {
            self.lists.resize(num_vertices * 4, ListHead::default());
        }
    }
}

pub struct ListIter<'a> {
    index: &'a AdjacencyIndex,
    cursor: Option<EdgeId>,
}

impl<'a> Iterator for ListIter<'a> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<EdgeId> {
        let current = self.cursor?;
        self.cursor = self.index.next[current.index()];
        Some(current)
    }
}
