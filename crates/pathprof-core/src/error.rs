//! Error type for auxiliary-graph construction, encoding, and decoding.

use pathprof_cfg::{BlockId, CfgError};
use thiserror::Error;

use crate::graph::{AuxNode, EdgeId};

/// Everything that can go wrong while building an auxiliary graph, numbering
/// its paths, or decoding a path id back into blocks.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The underlying program model rejected a query (missing entry block,
    /// unknown block id, ...).
    #[error("cfg error: {0}")]
    Cfg(#[from] CfgError),

    /// `segment` got an edge handle this graph never minted.
    #[error("unknown edge handle {edge:?}")]
    UnknownEdge { edge: EdgeId },

    /// `segment` was asked to unlink an edge that is not linked: the handle
    /// appeared twice in one batch, or its edge was never in an adjacency
    /// list.
    #[error("edge not linked: {src} -> {tgt}")]
    EdgeNotFound { src: AuxNode, tgt: AuxNode },

    /// `segment` was asked to split an edge that was already split. The
    /// graph may be partially rewritten at this point and must be discarded.
    #[error("edge already segmented: {src} -> {tgt}")]
    AlreadySegmented { src: AuxNode, tgt: AuxNode },

    /// Segmentation left a cycle behind, so paths cannot be numbered. Would
    /// indicate a hole in the encoder's split-edge collection.
    #[error("cycle survived segmentation at {src} -> {tgt}")]
    ResidualCycle { src: AuxNode, tgt: AuxNode },

    /// A path id at or above the function's path count was decoded.
    #[error("path id {id} out of range: function has {total} paths")]
    PathIdOutOfRange { id: u128, total: u128 },

    /// The decoder got stuck: no outgoing edge fits the remaining budget.
    /// Indicates a profile that does not match the encoded function.
    #[error("no edge out of block {block} fits remaining budget {remaining}")]
    NoViableEdge { block: BlockId, remaining: u128 },
}
