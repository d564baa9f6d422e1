//! Function bodies as control-flow graphs.
//!
//! [`Function`] owns a `StableGraph` of [`Block`] nodes connected by
//! [`Branch`] edges. The graph is private; all mutation goes through builder
//! methods so the entry-block contract stays enforced, and all successor
//! queries come back in branch-index order rather than graph-internal edge
//! order (petgraph iterates outgoing edges most-recent-first, which would
//! make the profile encoding depend on construction order).

use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::EdgeRef;
use petgraph::{Directed, Direction};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::block::Block;
use crate::error::CfgError;
use crate::id::BlockId;

/// Control-flow edge payload: which branch arm this successor is.
///
/// `index` 0 is the fall-through/then arm, 1 the else arm, and so on for
/// switch-like terminators. Successor iteration sorts by this index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    /// Branch arm position among the source block's successors.
    pub index: u16,
}

/// A function body: named, with an entry block and a block-level CFG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    /// Function name, used in reports and summaries.
    name: String,
    /// The control-flow graph. Blocks are never removed, so `BlockId`s stay
    /// valid for the life of the function.
    graph: StableGraph<Block, Branch, Directed, u32>,
    /// The designated entry block. Must be set before any traversal.
    entry: Option<BlockId>,
}

impl Function {
    /// Creates an empty function with no blocks and no entry.
    pub fn new(name: &str) -> Self {
        Function {
            name: name.to_string(),
            graph: StableGraph::new(),
            entry: None,
        }
    }

    /// Returns the function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Builder methods
    // -----------------------------------------------------------------------

    /// Adds a block and returns its ID. The first block added does NOT
    /// implicitly become the entry; call [`Function::set_entry`].
    pub fn add_block(&mut self, block: Block) -> BlockId {
        BlockId::from(self.graph.add_node(block))
    }

    /// Designates the entry block.
    ///
    /// Errors if the block does not exist, an entry was already set, or the
    /// block already has incoming branches. The entry must stay
    /// predecessor-free: a function that loops back to its first statements
    /// needs a header block after the entry.
    pub fn set_entry(&mut self, block: BlockId) -> Result<(), CfgError> {
        if !self.contains(block) {
            return Err(CfgError::BlockNotFound { id: block });
        }
        if self.entry.is_some() {
            return Err(CfgError::EntryAlreadySet {
                function: self.name.clone(),
            });
        }
        if self
            .graph
            .edges_directed(block.into(), Direction::Incoming)
            .next()
            .is_some()
        {
            return Err(CfgError::EntryHasPredecessors {
                function: self.name.clone(),
            });
        }
        self.entry = Some(block);
        Ok(())
    }

    /// Adds a branch from `from` to `to` with the next free branch index
    /// (one past the largest index already present on `from`).
    pub fn add_branch(&mut self, from: BlockId, to: BlockId) -> Result<(), CfgError> {
        let next = self
            .branches(from)?
            .iter()
            .map(|(branch, _)| branch.index + 1)
            .max()
            .unwrap_or(0);
        self.add_branch_at(from, to, next)
    }

    /// Adds a branch from `from` to `to` with an explicit branch index.
    ///
    /// Parallel branches to the same target are legal (a switch may send two
    /// cases to one block); they stay distinguishable by index. The entry
    /// block may not be a branch target.
    pub fn add_branch_at(
        &mut self,
        from: BlockId,
        to: BlockId,
        index: u16,
    ) -> Result<(), CfgError> {
        if !self.contains(from) {
            return Err(CfgError::BlockNotFound { id: from });
        }
        if !self.contains(to) {
            return Err(CfgError::BlockNotFound { id: to });
        }
        if self.entry == Some(to) {
            return Err(CfgError::EntryHasPredecessors {
                function: self.name.clone(),
            });
        }
        self.graph.add_edge(from.into(), to.into(), Branch { index });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Query methods
    // -----------------------------------------------------------------------

    /// Read-only access to the underlying graph, for analyses that need
    /// whole-graph algorithms (dominators).
    pub fn graph(&self) -> &StableGraph<Block, Branch, Directed, u32> {
        &self.graph
    }

    /// Returns the entry block, or an error if it was never set.
    pub fn entry(&self) -> Result<BlockId, CfgError> {
        self.entry.ok_or_else(|| CfgError::EntryNotSet {
            function: self.name.clone(),
        })
    }

    /// Returns `true` if the block exists in this function.
    pub fn contains(&self, block: BlockId) -> bool {
        self.graph.node_weight(block.into()).is_some()
    }

    /// Looks up a block's payload.
    pub fn block(&self, block: BlockId) -> Option<&Block> {
        self.graph.node_weight(block.into())
    }

    /// Returns all block IDs in insertion order.
    pub fn blocks(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.graph.node_indices().map(BlockId::from)
    }

    /// Returns the number of blocks.
    pub fn block_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of branches.
    pub fn branch_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns the successors of a block in branch-index order.
    pub fn successors(&self, block: BlockId) -> Result<SmallVec<[BlockId; 4]>, CfgError> {
        Ok(self.branches(block)?.into_iter().map(|(_, to)| to).collect())
    }

    /// Returns the predecessors of a block in edge insertion order.
    pub fn predecessors(&self, block: BlockId) -> Result<SmallVec<[BlockId; 4]>, CfgError> {
        if !self.contains(block) {
            return Err(CfgError::BlockNotFound { id: block });
        }
        let mut preds: SmallVec<[BlockId; 4]> = self
            .graph
            .edges_directed(block.into(), Direction::Incoming)
            .map(|e| BlockId::from(e.source()))
            .collect();
        preds.reverse();
        Ok(preds)
    }

    /// Returns `true` if the block has no outgoing branches (a return/abort
    /// block).
    pub fn is_exit(&self, block: BlockId) -> Result<bool, CfgError> {
        Ok(self.branches(block)?.is_empty())
    }

    /// Returns the outgoing branches of a block sorted by branch index.
    /// Branches sharing an index keep their insertion order.
    fn branches(&self, block: BlockId) -> Result<SmallVec<[(Branch, BlockId); 4]>, CfgError> {
        if !self.contains(block) {
            return Err(CfgError::BlockNotFound { id: block });
        }
        let idx: NodeIndex<u32> = block.into();
        let mut out: SmallVec<[(Branch, BlockId); 4]> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (*e.weight(), BlockId::from(e.target())))
            .collect();
        // petgraph yields most-recent-first; restore insertion order so the
        // stable sort below keeps it among equal indices.
        out.reverse();
        out.sort_by_key(|(branch, _)| branch.index);
        Ok(out)
    }
}
