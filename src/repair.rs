//! Breaker-driven graph repair.
//!
//! Every pattern implicates one fragment end (the first fragment of the
//! pattern's s unitig). Modes 1 and 2 label that fragment and all of its
//! edges. Modes 3 and 4 first try to realign the fragment against the
//! neighbouring unitigs; overlaps found are added to the graph and only
//! fragments without them are labelled.

use std::io::Write;
use std::num::NonZeroUsize;
use std::sync::Arc;

use log::{debug, info, warn};
use lru::LruCache;

use crate::align::{AlignInput, AlignParams, Aligner};
use crate::breakers::{BreakerCatalog, BreakerKind, BreakerPattern, Role};
use crate::classify::Orientation;
use crate::edge::{Edge, EdgeKind, EdgeLabel, FragEnd};
use crate::error::{GraphError, Result};
use crate::fragment::FragmentLabel;
use crate::fragment_store::FragmentStore;
use crate::ovl_message::{write_message, OverlapMessage, OverlapType};
use crate::store::{Disposition, OverlapGraphStore};
use crate::unitig::{FragmentPlacement, UnitigLayout};

const SEQUENCE_CACHE_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairMode {
    MarkAll,
    RemoveAll,
    AddOrMark,
    AddOrRemove,
}

impl RepairMode {
    pub fn from_selector(selector: u8) -> Result<Self> {
        match selector {
            1 => Ok(RepairMode::MarkAll),
            2 => Ok(RepairMode::RemoveAll),
            3 => Ok(RepairMode::AddOrMark),
            4 => Ok(RepairMode::AddOrRemove),
            other => Err(GraphError::InvalidRepairMode(other)),
        }
    }

    pub fn searches_overlaps(self) -> bool {
        matches!(self, RepairMode::AddOrMark | RepairMode::AddOrRemove)
    }

    pub fn labels(self) -> (FragmentLabel, EdgeLabel) {
        match self {
            RepairMode::MarkAll | RepairMode::AddOrMark => {
                (FragmentLabel::MarkedBreaker, EdgeLabel::MarkedByBreaker)
            }
            RepairMode::RemoveAll | RepairMode::AddOrRemove => {
                (FragmentLabel::RemovedBreaker, EdgeLabel::RemovedByBreaker)
            }
        }
    }
}

/// A fragment end to label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentEndRef {
    pub iid: u32,
    pub suffix: bool,
}

/// Everything repair decided, before it touches the graph.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RepairPlan {
    pub overlaps: Vec<OverlapMessage>,
    pub fragment_ends: Vec<FragmentEndRef>,
    /// Patterns whose s unitig has no fragments.
    pub skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RepairStats {
    pub overlaps_added: usize,
    /// Failed the output filter, or the graph refused them.
    pub overlaps_rejected: usize,
    pub fragments_labeled: usize,
    pub edges_labeled: usize,
}

/// How a single fragment-to-fragment alignment affects the chunk walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkStep {
    NoOverlap,
    /// Keep walking; the overlap found so far is kept provisionally.
    Intermediate,
    Final,
}

/// Aligns a fragment against the fragments of a unitig.
pub struct Realigner<'a> {
    fragments: &'a dyn FragmentStore,
    aligner: &'a dyn Aligner,
    params: AlignParams,
    cache: LruCache<u32, Arc<str>>,
}

impl<'a> Realigner<'a> {
    pub fn new(fragments: &'a dyn FragmentStore, aligner: &'a dyn Aligner) -> Self {
        Self::with_params(fragments, aligner, AlignParams::standard())
    }

    pub fn with_params(
        fragments: &'a dyn FragmentStore,
        aligner: &'a dyn Aligner,
        params: AlignParams,
    ) -> Self {
        let capacity = NonZeroUsize::new(SEQUENCE_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            fragments,
            aligner,
            params,
            cache: LruCache::new(capacity),
        }
    }

    fn sequence(&mut self, iid: u32) -> Result<Arc<str>> {
        if let Some(seq) = self.cache.get(&iid) {
            return Ok(Arc::clone(seq));
        }
        let seq: Arc<str> = Arc::from(&*self.fragments.sequence(iid)?);
        self.cache.put(iid, Arc::clone(&seq));
        Ok(seq)
    }

    fn overlap_fragments(
        &mut self,
        frag: u32,
        frag_suffix: bool,
        other: &FragmentPlacement,
        other_suffix: bool,
        found: &mut Vec<OverlapMessage>,
    ) -> Result<WalkStep> {
        let seq1 = self.sequence(frag)?;
        let seq2 = self.sequence(other.ident)?;
        let opposite = frag_suffix == other_suffix;
        let ovl = self.aligner.align(
            AlignInput {
                iid: frag,
                sequence: &seq1,
            },
            AlignInput {
                iid: other.ident,
                sequence: &seq2,
            },
            opposite,
            &self.params,
        )?;
        let Some(ovl) = ovl else {
            return Ok(WalkStep::NoOverlap);
        };

        let step = if ovl.overlap_type == OverlapType::Containment {
            if ovl.b_iid == frag {
                WalkStep::Final
            } else {
                WalkStep::Intermediate
            }
        } else {
            let expected = match (frag_suffix, other_suffix) {
                (true, true) => ovl.orientation == Orientation::Innie,
                (true, false) => {
                    (ovl.orientation == Orientation::Normal && ovl.a_iid == frag)
                        || (ovl.orientation == Orientation::Anti && ovl.b_iid == frag)
                }
                (false, true) => {
                    (ovl.orientation == Orientation::Normal && ovl.b_iid == frag)
                        || (ovl.orientation == Orientation::Anti && ovl.a_iid == frag)
                }
                (false, false) => ovl.orientation == Orientation::Outtie,
            };
            if expected {
                WalkStep::Final
            } else {
                WalkStep::Intermediate
            }
        };
        found.push(ovl);
        Ok(step)
    }

    /// Walk the non-contained fragments of `chunk` from the end named by
    /// `chunk_suffix`, aligning each to `frag`. Returns the overlaps up to and
    /// including the first final one, or nothing if the walk fails.
    pub fn chunk_overlaps(
        &mut self,
        frag: u32,
        frag_suffix: bool,
        chunk: &UnitigLayout,
        chunk_suffix: bool,
    ) -> Result<Vec<OverlapMessage>> {
        let order: Box<dyn Iterator<Item = &FragmentPlacement> + '_> = if chunk_suffix {
            Box::new(chunk.fragments.iter().rev())
        } else {
            Box::new(chunk.fragments.iter())
        };
        let mut local = Vec::new();
        for placement in order.filter(|p| !p.is_contained()) {
            let other_suffix = chunk_suffix == placement.is_forward();
            match self.overlap_fragments(frag, frag_suffix, placement, other_suffix, &mut local)? {
                WalkStep::NoOverlap => return Ok(Vec::new()),
                WalkStep::Final => return Ok(local),
                WalkStep::Intermediate => {}
            }
        }
        Ok(Vec::new())
    }
}

fn first_fragment(pattern: &BreakerPattern) -> Option<u32> {
    pattern
        .role(Role::S)
        .unitig
        .as_ref()
        .and_then(|u| u.fragments.first())
        .map(|f| f.ident)
}

pub struct GraphRepairEngine<'a> {
    mode: RepairMode,
    realigner: Option<Realigner<'a>>,
}

impl<'a> GraphRepairEngine<'a> {
    pub fn new(mode: RepairMode) -> Self {
        Self {
            mode,
            realigner: None,
        }
    }

    pub fn with_realigner(mut self, realigner: Realigner<'a>) -> Self {
        self.realigner = Some(realigner);
        self
    }

    pub fn mode(&self) -> RepairMode {
        self.mode
    }

    /// Decide the overlaps to add and the fragment ends to label.
    pub fn plan(
        &mut self,
        chimeras: Option<&BreakerCatalog>,
        spurs: Option<&BreakerCatalog>,
    ) -> Result<RepairPlan> {
        let mut plan = RepairPlan::default();
        for catalog in [chimeras, spurs].into_iter().flatten() {
            for pattern in catalog.patterns() {
                let Some(frag) = first_fragment(pattern) else {
                    warn!("{} pattern with empty s unitig skipped", catalog.kind().name());
                    plan.skipped += 1;
                    continue;
                };
                if self.mode.searches_overlaps() {
                    self.search_pattern(pattern, frag, &mut plan)?;
                } else {
                    let s_suffix = pattern.role(Role::S).suffix;
                    let suffix = match pattern.kind {
                        BreakerKind::Chimera => s_suffix,
                        BreakerKind::Spur => !s_suffix,
                    };
                    plan.fragment_ends.push(FragmentEndRef { iid: frag, suffix });
                }
            }
        }
        info!(
            "Repair plan: {} overlaps, {} fragment ends, {} patterns skipped",
            plan.overlaps.len(),
            plan.fragment_ends.len(),
            plan.skipped
        );
        Ok(plan)
    }

    fn search_pattern(
        &mut self,
        pattern: &BreakerPattern,
        frag: u32,
        plan: &mut RepairPlan,
    ) -> Result<()> {
        let realigner = self.realigner.as_mut().ok_or_else(|| {
            GraphError::InvalidConfig("overlap search needs a fragment store and aligner".into())
        })?;
        let chunk = |role: Role| {
            let slot = pattern.role(role);
            slot.unitig
                .as_ref()
                .map(|u| (u, slot.suffix))
                .ok_or(GraphError::IncompleteUnitigCrossReference {
                    expected: pattern.slots().len(),
                    found: pattern.slots().iter().filter(|s| s.unitig.is_some()).count(),
                })
        };

        match pattern.kind {
            BreakerKind::Chimera => {
                let (d, d_suffix) = chunk(Role::D)?;
                let sd = realigner.chunk_overlaps(frag, true, d, d_suffix)?;
                if sd.is_empty() {
                    debug!("No s-d overlap for fragment {frag}");
                    plan.fragment_ends.push(FragmentEndRef {
                        iid: frag,
                        suffix: true,
                    });
                    return Ok(());
                }
                let (a, a_suffix) = chunk(Role::A)?;
                let sa = realigner.chunk_overlaps(frag, false, a, a_suffix)?;
                if sa.is_empty() {
                    debug!("No s-a overlap for fragment {frag}");
                    plan.fragment_ends.push(FragmentEndRef {
                        iid: frag,
                        suffix: false,
                    });
                    return Ok(());
                }
                plan.overlaps.extend(sd);
                plan.overlaps.extend(sa);
            }
            BreakerKind::Spur => {
                let s_end = !pattern.role(Role::S).suffix;
                let (d, d_suffix) = chunk(Role::D)?;
                let sd = realigner.chunk_overlaps(frag, s_end, d, d_suffix)?;
                if sd.is_empty() {
                    debug!("No s-d overlap for spur fragment {frag}");
                    plan.fragment_ends.push(FragmentEndRef {
                        iid: frag,
                        suffix: s_end,
                    });
                } else {
                    plan.overlaps.extend(sd);
                }
            }
        }
        Ok(())
    }

    /// Add the planned overlaps, then label the planned fragment ends.
    pub fn apply(&self, plan: &RepairPlan, graph: &mut OverlapGraphStore) -> Result<RepairStats> {
        let mut stats = RepairStats::default();
        let config = *graph.config();
        for ovl in &plan.overlaps {
            if !ovl.passes_output_filter() {
                stats.overlaps_rejected += 1;
                continue;
            }
            let outcome = graph.add_overlap(
                &ovl.to_raw(),
                config.thresholds,
                config.intrude_with_non_blessed,
            )?;
            match outcome.disposition {
                Disposition::Dovetail | Disposition::Containment => stats.overlaps_added += 1,
                Disposition::Excluded | Disposition::Skipped(_) => {
                    debug!("Planned overlap {} {} not added", ovl.a_iid, ovl.b_iid);
                    stats.overlaps_rejected += 1;
                }
            }
        }
        for end in &plan.fragment_ends {
            stats.edges_labeled += label_fragment(graph, end.iid, self.mode)?;
            stats.fragments_labeled += 1;
        }
        info!(
            "Repair applied: {} overlaps added, {} fragments and {} edges labelled",
            stats.overlaps_added, stats.fragments_labeled, stats.edges_labeled
        );
        Ok(stats)
    }
}

/// The companion stored at the other endpoint: the reflection of a
/// dovetail, the granger mate of a containment.
fn companion(edge: &Edge) -> Edge {
    match edge.kind {
        EdgeKind::Dovetail => edge.reflect(),
        EdgeKind::Containment(_) => edge.granger(),
    }
}

/// Label a fragment, every edge at either of its ends, and the companion of
/// each of those edges. Returns the number of edges labelled.
pub fn label_fragment(graph: &mut OverlapGraphStore, iid: u32, mode: RepairMode) -> Result<usize> {
    let (fragment_label, edge_label) = mode.labels();
    let p = graph
        .vertex_of(iid)
        .ok_or(GraphError::UnknownFragment { iid })?;
    graph.set_label(p, fragment_label);

    let mut labeled = 0;
    for end in FragEnd::BOTH {
        for id in graph.edges_at(p, end) {
            graph.edge_mut(id).label = edge_label;
            labeled += 1;

            let mate = companion(graph.edge(id));
            let (src, dst) = ((mate.src.vertex, mate.src.end), (mate.dst.vertex, mate.dst.end));
            // parallel edges each claim a distinct companion
            let found = graph
                .adjacency(src.0, src.1, mate.kind.class())
                .find(|&other| {
                    let other = graph.edge(other);
                    other.joins(src, dst) && other.label != edge_label
                });
            match found {
                Some(other) => {
                    graph.edge_mut(other).label = edge_label;
                    labeled += 1;
                }
                None => debug!("No companion for edge {:?} of fragment {iid}", id),
            }
        }
    }
    Ok(labeled)
}

/// Write overlaps in `OVL` form, dropping records that fail the output
/// filter. Returns (written, rejected).
pub fn write_overlap_file<W: Write>(out: &mut W, overlaps: &[OverlapMessage]) -> Result<(usize, usize)> {
    let mut written = 0;
    let mut rejected = 0;
    for ovl in overlaps {
        if ovl.passes_output_filter() {
            write_message(out, ovl)?;
            written += 1;
        } else {
            warn!(
                "Not writing overlap {} {}: type {} orientation {} quality {}",
                ovl.a_iid,
                ovl.b_iid,
                ovl.overlap_type.code(),
                ovl.orientation.code(),
                ovl.quality
            );
            rejected += 1;
        }
    }
    Ok((written, rejected))
}

pub fn write_fragment_end_file<W: Write>(out: &mut W, ends: &[FragmentEndRef]) -> Result<()> {
    for end in ends {
        writeln!(out, "{:>10} {}", end.iid, u8::from(end.suffix))?;
    }
    Ok(())
}
