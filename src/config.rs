//! Runtime configuration for graph construction and breaker handling.

use crate::error::{GraphError, Result};

/// Adjacency-list bounds, one per edge class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    /// Maximum dovetail edges kept per fragment end.
    pub dovetail: u32,
    /// Maximum containment edges kept per fragment end.
    pub containment: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            dovetail: 100,
            containment: 100,
        }
    }
}

/// How candidates are ranked when an adjacency list decides what to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOrdering {
    /// Blessed first, then ascending a_hang, descending b_hang, target
    /// vertex, target end and finally the reflected flag.
    Strong,
    /// Ascending a_hang, descending b_hang, target vertex and end.
    Weak,
}

/// Configuration options that govern overlap graph construction.
#[derive(Debug, Clone, Copy)]
pub struct GraphConfig {
    pub thresholds: Thresholds,
    /// Let non-blessed edges into fragment ends that already carry a blessed edge.
    pub intrude_with_non_blessed: bool,
    /// The input already carries both directions of every dovetail, so the
    /// reflected edge is not generated.
    pub assume_symmetric_input: bool,
    pub dovetail_ordering: EdgeOrdering,
    pub containment_ordering: EdgeOrdering,
    /// Maximum (corrected) error rate accepted at ingestion.
    pub overlap_error_threshold: f32,
    /// Maximum original error rate accepted from binary overlap-store records.
    pub consensus_error_threshold: f32,
    /// Drop breaker patterns whose role fragment ids are not pairwise distinct.
    pub validate_breakers: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            intrude_with_non_blessed: false,
            assume_symmetric_input: false,
            dovetail_ordering: EdgeOrdering::Strong,
            containment_ordering: EdgeOrdering::Strong,
            overlap_error_threshold: 0.06,
            consensus_error_threshold: 0.06,
            validate_breakers: true,
        }
    }
}

impl GraphConfig {
    pub fn validate(&self) -> Result<()> {
        if self.thresholds.dovetail == 0 || self.thresholds.containment == 0 {
            return Err(GraphError::InvalidConfig(
                "adjacency thresholds must be at least 1".to_string(),
            ));
        }
        for (name, value) in [
            ("overlap error threshold", self.overlap_error_threshold),
            ("consensus error threshold", self.consensus_error_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(GraphError::InvalidConfig(format!(
                    "{name} {value} outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}
