//! The overlap graph: fragment vertices plus bounded adjacency lists.
//!
//! All overlap evidence enters through [`OverlapGraphStore::add_overlap`].
//! Vertices must be preloaded; an overlap naming an unknown fragment is a
//! caller bug and is reported as an error, while records whose hangs do not
//! fit the fragments are logged and skipped.

use log::{debug, info, warn};

use crate::adjacency::{AdjacencyIndex, Admission, ListIter, SlotKey};
use crate::classify::{normalize, Orientation, RawOverlap};
use crate::config::{GraphConfig, Thresholds};
use crate::edge::{Edge, EdgeClass, EdgeId, EdgeKind, FragEnd, VertexId};
use crate::error::{GraphError, Result};
use crate::fragment::{Fragment, FragmentLabel, FragmentTable};
use crate::fragment_store::FragmentStore;
use crate::ovl_message::OverlapMessage;
use crate::ovl_store::StoreRecord;

/// Why a record was dropped without touching the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownOrientation,
    HangExceedsLength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Dovetail,
    Containment,
    /// An endpoint is deleted or removed by a breaker.
    Excluded,
    Skipped(SkipReason),
}

/// What one `add_overlap` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddOutcome {
    pub disposition: Disposition,
    /// Admissions offered to a list.
    pub attempted: u32,
    /// Admissions whose edge is now in a list.
    pub retained: u32,
    /// Admissions withheld by the spur or blessed rules.
    pub suppressed: u32,
    /// New arena slots linked.
    pub linked: u32,
}

impl AddOutcome {
    fn new(disposition: Disposition) -> Self {
        Self {
            disposition,
            attempted: 0,
            retained: 0,
            suppressed: 0,
            linked: 0,
        }
    }

    fn record(&mut self, admission: Admission) {
        self.attempted += 1;
        if admission.retained() {
            self.retained += 1;
        }
        if admission.linked.is_some() {
            self.linked += 1;
        }
    }
}

/// Totals over one ingestion pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestStats {
    pub records: u64,
    pub dovetail: u64,
    pub containment: u64,
    pub excluded: u64,
    pub skipped: u64,
    /// Records rejected by the error-rate or record-type filters.
    pub filtered: u64,
    pub suppressed: u64,
    pub linked: u64,
}

impl IngestStats {
    pub fn absorb(&mut self, outcome: &AddOutcome) {
        self.records += 1;
        match outcome.disposition {
            Disposition::Dovetail => self.dovetail += 1,
            Disposition::Containment => self.containment += 1,
            Disposition::Excluded => self.excluded += 1,
            Disposition::Skipped(_) => self.skipped += 1,
        }
        self.suppressed += outcome.suppressed as u64;
        self.linked += outcome.linked as u64;
    }

    fn log_summary(&self, source: &str) {
        info!(
            "{}: {} records, {} dovetail, {} containment, {} excluded, {} skipped, {} filtered, {} edges linked",
            source,
            self.records,
            self.dovetail,
            self.containment,
            self.excluded,
            self.skipped,
            self.filtered,
            self.linked
        );
    }
}

pub struct OverlapGraphStore {
    config: GraphConfig,
    fragments: FragmentTable,
    adjacency: AdjacencyIndex,
}

impl OverlapGraphStore {
    pub fn new(fragments: FragmentTable, config: GraphConfig) -> Result<Self> {
        config.validate()?;
        let adjacency = AdjacencyIndex::new(fragments.len());
        Ok(Self {
            config,
            fragments,
            adjacency,
        })
    }

    pub fn from_store(store: &dyn FragmentStore, config: GraphConfig) -> Result<Self> {
        Self::new(FragmentTable::from_store(store)?, config)
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn fragments(&self) -> &FragmentTable {
        &self.fragments
    }

    pub fn fragment(&self, vid: VertexId) -> &Fragment {
        self.fragments.get(vid)
    }

    pub fn vertex_of(&self, iid: u32) -> Option<VertexId> {
        self.fragments.vertex_of(iid)
    }

    fn require_vertex(&self, iid: u32) -> Result<VertexId> {
        self.vertex_of(iid)
            .ok_or(GraphError::UnknownFragment { iid })
    }

    pub fn num_edges(&self) -> usize {
        self.adjacency.num_edges()
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        self.adjacency.edge(id)
    }

    pub(crate) fn edge_mut(&mut self, id: EdgeId) -> &mut Edge {
        self.adjacency.edge_mut(id)
    }

    /// Edges of one list, least favorable first.
    pub fn adjacency(&self, vid: VertexId, end: FragEnd, class: EdgeClass) -> ListIter<'_> {
        self.adjacency.list(SlotKey::new(vid, end, class))
    }

    pub fn degree(&self, vid: VertexId, end: FragEnd, class: EdgeClass) -> u32 {
        self.adjacency.degree(SlotKey::new(vid, end, class))
    }

    /// Every edge leaving `end` of `vid`, dovetails first.
    pub fn edges_at(&self, vid: VertexId, end: FragEnd) -> Vec<EdgeId> {
        EdgeClass::BOTH
            .iter()
            .flat_map(|&class| self.adjacency(vid, end, class))
            .collect()
    }

    pub fn bless_end(&mut self, iid: u32, end: FragEnd) -> Result<()> {
        let vid = self.require_vertex(iid)?;
        self.fragments.set_blessed(vid, end, true);
        Ok(())
    }

    pub fn set_spur(&mut self, iid: u32, spur: bool) -> Result<()> {
        let vid = self.require_vertex(iid)?;
        self.fragments.get_mut(vid).spur = spur;
        Ok(())
    }

    pub fn set_contained(&mut self, iid: u32, contained: bool) -> Result<()> {
        let vid = self.require_vertex(iid)?;
        self.fragments.get_mut(vid).contained = contained;
        Ok(())
    }

    pub(crate) fn set_label(&mut self, vid: VertexId, label: FragmentLabel) {
        self.fragments.get_mut(vid).label = label;
    }

    /// Add one overlap record to the graph.
    pub fn add_overlap(
        &mut self,
        raw: &RawOverlap,
        thresholds: Thresholds,
        intrude_with_non_blessed: bool,
    ) -> Result<AddOutcome> {
        let a = self.require_vertex(raw.a_iid)?;
        let b = self.require_vertex(raw.b_iid)?;
        if a == b {
            return Err(GraphError::SelfOverlap { iid: raw.a_iid });
        }
        if self.fragments.get(a).is_excluded() || self.fragments.get(b).is_excluded() {
            return Ok(AddOutcome::new(Disposition::Excluded));
        }

        if raw.orientation == Orientation::Unknown {
            warn!(
                "Skipping overlap {} {}: unknown orientation",
                raw.a_iid, raw.b_iid
            );
            return Ok(AddOutcome::new(Disposition::Skipped(
                SkipReason::UnknownOrientation,
            )));
        }
        let Some(normalized) = normalize(raw, a, b) else {
            warn!(
                "Skipping overlap {} {}: hangs {} {} out of range",
                raw.a_iid, raw.b_iid, raw.a_hang, raw.b_hang
            );
            return Ok(AddOutcome::new(Disposition::Skipped(
                SkipReason::HangExceedsLength,
            )));
        };
        let a_len = self.fragments.get(normalized.a.vertex).length;
        let b_len = self.fragments.get(normalized.b.vertex).length;
        if !normalized.fits_lengths(a_len, b_len) {
            warn!(
                "Skipping overlap {} {}: hangs {} {} do not fit lengths {} {}",
                raw.a_iid, raw.b_iid, raw.a_hang, raw.b_hang, a_len, b_len
            );
            return Ok(AddOutcome::new(Disposition::Skipped(
                SkipReason::HangExceedsLength,
            )));
        }

        let edge = normalized.into_edge();
        match edge.kind {
            EdgeKind::Dovetail => {
                let mut outcome = AddOutcome::new(Disposition::Dovetail);
                let mirror = edge.reflect();
                self.offer_dovetail(edge, thresholds.dovetail, intrude_with_non_blessed, &mut outcome);
                if !self.config.assume_symmetric_input {
                    self.offer_dovetail(
                        mirror,
                        thresholds.dovetail,
                        intrude_with_non_blessed,
                        &mut outcome,
                    );
                }
                Ok(outcome)
            }
            EdgeKind::Containment(_) => {
                let mut outcome = AddOutcome::new(Disposition::Containment);
                self.fragments
                    .count_containment(edge.src.vertex, edge.dst.vertex);
                let mate = edge.granger();
                self.offer_containment(
                    edge,
                    thresholds.containment,
                    intrude_with_non_blessed,
                    &mut outcome,
                );
                self.offer_containment(
                    mate,
                    thresholds.containment,
                    intrude_with_non_blessed,
                    &mut outcome,
                );
                Ok(outcome)
            }
        }
    }

    fn blessing_blocks(&self, edge: &Edge, intrude_with_non_blessed: bool) -> bool {
        !intrude_with_non_blessed
            && !edge.blessed
            && self.fragments.get(edge.dst.vertex).is_blessed(edge.dst.end)
    }

    fn offer_dovetail(
        &mut self,
        edge: Edge,
        threshold: u32,
        intrude_with_non_blessed: bool,
        outcome: &mut AddOutcome,
    ) {
        if self.fragments.get(edge.dst.vertex).spur
            || self.blessing_blocks(&edge, intrude_with_non_blessed)
        {
            debug!("Suppressed dovetail {:?} -> {:?}", edge.src, edge.dst);
            outcome.suppressed += 1;
            return;
        }
        let (vertex, end) = (edge.src.vertex, edge.src.end);
        let key = SlotKey::new(vertex, end, EdgeClass::Dovetail);
        let admission = self
            .adjacency
            .admit(key, edge, threshold, self.config.dovetail_ordering);
        self.fragments.count_dovetail_attempt(vertex, end);
        outcome.record(admission);
    }

    fn offer_containment(
        &mut self,
        edge: Edge,
        threshold: u32,
        intrude_with_non_blessed: bool,
        outcome: &mut AddOutcome,
    ) {
        if self.blessing_blocks(&edge, intrude_with_non_blessed) {
            debug!("Suppressed containment {:?} -> {:?}", edge.src, edge.dst);
            outcome.suppressed += 1;
            return;
        }
        let key = SlotKey::new(edge.src.vertex, edge.src.end, EdgeClass::Containment);
        let admission = self
            .adjacency
            .admit(key, edge, threshold, self.config.containment_ordering);
        outcome.record(admission);
    }

    /// Add every record with the configured thresholds.
    pub fn ingest<I>(&mut self, records: I) -> Result<IngestStats>
    where
        I: IntoIterator<Item = RawOverlap>,
    {
        let mut stats = IngestStats::default();
        for raw in records {
            let outcome = self.add_overlap(
                &raw,
                self.config.thresholds,
                self.config.intrude_with_non_blessed,
            )?;
            stats.absorb(&outcome);
        }
        stats.log_summary("overlaps");
        Ok(stats)
    }

    /// Ingest text `OVL` messages, keeping dovetail and containment records
    /// under the overlap error threshold.
    pub fn ingest_messages<I>(&mut self, messages: I) -> Result<IngestStats>
    where
        I: IntoIterator<Item = OverlapMessage>,
    {
        let mut stats = IngestStats::default();
        for message in messages {
            if !message.overlap_type.is_graph_edge()
                || message.quality >= self.config.overlap_error_threshold
            {
                stats.filtered += 1;
                continue;
            }
            let outcome = self.add_overlap(
                &message.to_raw(),
                self.config.thresholds,
                self.config.intrude_with_non_blessed,
            )?;
            stats.absorb(&outcome);
        }
        stats.log_summary("OVL messages");
        Ok(stats)
    }

    /// Ingest binary overlap-store records. The store carries both
    /// directions of every overlap, so from-contained containments are
    /// dropped here and regenerated as granger companions.
    pub fn ingest_store_records<I>(&mut self, records: I) -> Result<IngestStats>
    where
        I: IntoIterator<Item = StoreRecord>,
    {
        let mut stats = IngestStats::default();
        for record in records {
            if record.corrected_error_rate() > self.config.overlap_error_threshold
                || record.original_error_rate() > self.config.consensus_error_threshold
                || record.is_from_contained()
            {
                stats.filtered += 1;
                continue;
            }
            let outcome = self.add_overlap(
                &record.to_raw(),
                self.config.thresholds,
                self.config.intrude_with_non_blessed,
            )?;
            stats.absorb(&outcome);
        }
        stats.log_summary("overlap store");
        Ok(stats)
    }

    /// Count dovetail edges whose mirror is missing from the other endpoint.
    pub fn check_symmetry(&self) -> usize {
        let mut missing = 0;
        for (vid, _) in self.fragments.iter() {
            for end in FragEnd::BOTH {
                for id in self.adjacency(vid, end, EdgeClass::Dovetail) {
                    let edge = self.edge(id);
                    let src = (edge.src.vertex, edge.src.end);
                    let dst = (edge.dst.vertex, edge.dst.end);
                    let found = self
                        .adjacency(dst.0, dst.1, EdgeClass::Dovetail)
                        .any(|other| self.edge(other).joins(dst, src));
                    if !found {
                        missing += 1;
                    }
                }
            }
        }
        if missing > 0 {
            warn!("{missing} dovetail edges have no mirror");
        }
        missing
    }
}
