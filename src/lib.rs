//! fragment_graph library
//!
//! Builds the overlap graph of a fragment assembler: overlap records are
//! classified into directed dovetail and containment edges, kept in bounded
//! per-end adjacency lists, and later repaired using chimera and spur
//! breaker patterns found in unitig layouts.

pub mod adjacency;
pub mod align;
pub mod breakers;
pub mod classify;
pub mod config;
pub mod edge;
pub mod error;
pub mod fragment;
pub mod fragment_store;
pub mod ovl_message;
pub mod ovl_store;
pub mod repair;
pub mod store;
pub mod unitig;

pub use adjacency::{Admission, AdjacencyIndex, SlotKey};
pub use align::{AlignInput, AlignParams, Aligner, EditDistanceAligner};
pub use breakers::{populate_catalogs, BreakerCatalog, BreakerKind, BreakerPattern, Role};
pub use classify::{classify, normalize, Orientation, RawOverlap};
pub use config::{EdgeOrdering, GraphConfig, Thresholds};
pub use edge::{Edge, EdgeClass, EdgeId, EdgeKind, EdgeLabel, FragEnd, VertexId};
pub use error::{GraphError, Result};
pub use fragment::{Fragment, FragmentLabel, FragmentTable};
pub use fragment_store::{
    load_sequence_file, FragmentRecord, FragmentStore, FragmentStoreError, InMemoryFragmentStore,
};
pub use ovl_message::{read_messages, write_message, MessageReader, OverlapMessage, OverlapType};
pub use ovl_store::{OverlapStoreFile, StoreRecord};
pub use repair::{
    label_fragment, write_fragment_end_file, write_overlap_file, FragmentEndRef,
    GraphRepairEngine, Realigner, RepairMode, RepairPlan, RepairStats,
};
pub use store::{AddOutcome, Disposition, IngestStats, OverlapGraphStore, SkipReason};
pub use unitig::{open_unitig_file, FragmentPlacement, UnitigLayout, UnitigReader};
