//! Fragment vertices and the iid to vertex mapping.

use std::collections::HashMap;

use crate::edge::{FragEnd, VertexId};
use crate::error::{GraphError, Result};
use crate::fragment_store::{FragmentRecord, FragmentStore};

/// Fragment-level breaker annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentLabel {
    #[default]
    Unlabeled,
    MarkedBreaker,
    RemovedBreaker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub iid: u32,
    pub length: u32,
    pub deleted: bool,
    pub label: FragmentLabel,
    pub spur: bool,
    pub contained: bool,
    blessed: [bool; 2],
    raw_dovetail_count: [u32; 2],
    raw_from_contained_count: u32,
    raw_to_contained_count: u32,
}

impl Fragment {
    pub fn new(iid: u32, length: u32) -> Self {
        Self {
            iid,
            length,
            deleted: false,
            label: FragmentLabel::Unlabeled,
            spur: false,
            contained: false,
            blessed: [false; 2],
            raw_dovetail_count: [0; 2],
            raw_from_contained_count: 0,
            raw_to_contained_count: 0,
        }
    }

    pub fn is_blessed(&self, end: FragEnd) -> bool {
        self.blessed[end.index()]
    }

    /// Overlaps touching this fragment are ignored at ingestion.
    pub fn is_excluded(&self) -> bool {
        self.deleted || self.label == FragmentLabel::RemovedBreaker
    }

    /// Dovetail admissions attempted at `end`, kept or not.
    pub fn raw_dovetail_count(&self, end: FragEnd) -> u32 {
        self.raw_dovetail_count[end.index()]
    }

    pub fn raw_from_contained_count(&self) -> u32 {
        self.raw_from_contained_count
    }

    pub fn raw_to_contained_count(&self) -> u32 {
        self.raw_to_contained_count
    }
}

impl From<&FragmentRecord> for Fragment {
    fn from(record: &FragmentRecord) -> Self {
        Fragment {
            deleted: record.deleted,
            ..Fragment::new(record.iid, record.length)
        }
    }
}

/// All fragment vertices, created once by a bulk preload.
#[derive(Debug, Default)]
pub struct FragmentTable {
    fragments: Vec<Fragment>,
    by_iid: HashMap<u32, VertexId>,
}

impl FragmentTable {
    pub fn from_records<'a, I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a FragmentRecord>,
    {
        let mut table = FragmentTable::default();
        for record in records {
            table.push(Fragment::from(record))?;
        }
        Ok(table)
    }

    pub fn from_store(store: &dyn FragmentStore) -> Result<Self> {
        let records = store.records()?;
        let table = Self::from_records(records.iter())?;
        log::info!("Loaded {} fragments", table.len());
        Ok(table)
    }

    fn push(&mut self, fragment: Fragment) -> Result<VertexId> {
        let vid = VertexId(self.fragments.len() as u32);
        if self.by_iid.insert(fragment.iid, vid).is_some() {
            return Err(GraphError::DuplicateFragment { iid: fragment.iid });
        }
        self.fragments.push(fragment);
        Ok(vid)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn vertex_of(&self, iid: u32) -> Option<VertexId> {
        self.by_iid.get(&iid).copied()
    }

    pub fn get(&self, vid: VertexId) -> &Fragment {
        &self.fragments[vid.index()]
    }

    pub fn get_mut(&mut self, vid: VertexId) -> &mut Fragment {
        &mut self.fragments[vid.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (VertexId, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, f)| (VertexId(i as u32), f))
    }

    pub fn set_blessed(&mut self, vid: VertexId, end: FragEnd, blessed: bool) {
        self.fragments[vid.index()].blessed[end.index()] = blessed;
    }

    pub(crate) fn count_dovetail_attempt(&mut self, vid: VertexId, end: FragEnd) {
        self.fragments[vid.index()].raw_dovetail_count[end.index()] += 1;
    }

    pub(crate) fn count_containment(&mut self, container: VertexId, contained: VertexId) {
        self.fragments[contained.index()].raw_from_contained_count += 1;
        self.fragments[container.index()].raw_to_contained_count += 1;
    }
}
