//! Natural-loop detection.
//!
//! The path encoder must know, for any two blocks, whether they live in the
//! same loop nest. [`LoopForest::analyze`] answers that: it finds natural
//! loops from dominance back edges (an edge latch -> header where the header
//! dominates the latch), builds each body by walking predecessors backward
//! from the latches until the header stops the walk, merges loops that share
//! a header, and derives nesting from body containment (distinct-header
//! natural loops are either disjoint or nested).

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::dominators::{self, Dominators};
use petgraph::graph::NodeIndex;
use smallvec::SmallVec;

use crate::error::CfgError;
use crate::function::Function;
use crate::id::BlockId;

/// Index of a loop within its [`LoopForest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub u32);

/// One natural loop: header, latches, member blocks, and the enclosing loop.
#[derive(Debug, Clone)]
pub struct NaturalLoop {
    header: BlockId,
    latches: SmallVec<[BlockId; 2]>,
    blocks: IndexSet<BlockId>,
    parent: Option<LoopId>,
}

impl NaturalLoop {
    /// The loop header: the single entry point that dominates every member.
    pub fn header(&self) -> BlockId {
        self.header
    }

    /// Blocks with a back edge to the header. More than one latch means
    /// several continue/loop-end edges were merged into this loop.
    pub fn latches(&self) -> &[BlockId] {
        &self.latches
    }

    /// All member blocks, header included.
    pub fn blocks(&self) -> &IndexSet<BlockId> {
        &self.blocks
    }

    /// Returns `true` if `block` belongs to this loop.
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }

    /// The immediately enclosing loop, if any.
    pub fn parent(&self) -> Option<LoopId> {
        self.parent
    }
}

/// All natural loops of one function, with innermost-membership lookup.
#[derive(Debug, Clone, Default)]
pub struct LoopForest {
    loops: Vec<NaturalLoop>,
    innermost: HashMap<BlockId, LoopId>,
}

impl LoopForest {
    /// Detects the natural loops of `f`.
    ///
    /// Only blocks reachable from the entry participate; an edge from an
    /// unreachable block never creates or extends a loop.
    pub fn analyze(f: &Function) -> Result<Self, CfgError> {
        let entry = f.entry()?;
        let doms = dominators::simple_fast(f.graph(), entry.into());

        // Dominance back edges, grouped by header so same-header loops merge.
        let mut latches_by_header: IndexMap<BlockId, SmallVec<[BlockId; 2]>> = IndexMap::new();
        for block in f.blocks() {
            if !reachable(&doms, block) {
                continue;
            }
            for succ in f.successors(block)? {
                if dominates(&doms, succ, block) {
                    latches_by_header.entry(succ).or_default().push(block);
                }
            }
        }

        let mut loops = Vec::with_capacity(latches_by_header.len());
        for (header, latches) in latches_by_header {
            let mut blocks = IndexSet::new();
            blocks.insert(header);
            let mut stack: Vec<BlockId> = latches.to_vec();
            while let Some(block) = stack.pop() {
                if blocks.insert(block) {
                    for pred in f.predecessors(block)? {
                        if reachable(&doms, pred) {
                            stack.push(pred);
                        }
                    }
                }
            }
            loops.push(NaturalLoop {
                header,
                latches,
                blocks,
                parent: None,
            });
        }

        // Nesting: the parent of a loop is the smallest strictly larger loop
        // containing its header.
        for i in 0..loops.len() {
            let mut parent: Option<usize> = None;
            for (j, candidate) in loops.iter().enumerate() {
                if j == i
                    || candidate.blocks.len() <= loops[i].blocks.len()
                    || !candidate.contains(loops[i].header)
                {
                    continue;
                }
                if parent.map_or(true, |p| candidate.blocks.len() < loops[p].blocks.len()) {
                    parent = Some(j);
                }
            }
            loops[i].parent = parent.map(|p| LoopId(p as u32));
        }

        // Innermost membership: assign largest loops first so smaller
        // (inner) loops overwrite.
        let mut by_size: Vec<usize> = (0..loops.len()).collect();
        by_size.sort_by_key(|&i| std::cmp::Reverse(loops[i].blocks.len()));
        let mut innermost = HashMap::new();
        for i in by_size {
            for &block in &loops[i].blocks {
                innermost.insert(block, LoopId(i as u32));
            }
        }

        Ok(LoopForest { loops, innermost })
    }

    /// The innermost loop containing `block`, or `None` for non-loop blocks.
    pub fn innermost(&self, block: BlockId) -> Option<LoopId> {
        self.innermost.get(&block).copied()
    }

    /// Looks up a loop by ID.
    pub fn get(&self, id: LoopId) -> Option<&NaturalLoop> {
        self.loops.get(id.0 as usize)
    }

    /// Returns the number of loops.
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    /// Returns `true` if the function has no loops.
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Iterates all loops with their IDs.
    pub fn iter(&self) -> impl Iterator<Item = (LoopId, &NaturalLoop)> {
        self.loops
            .iter()
            .enumerate()
            .map(|(i, l)| (LoopId(i as u32), l))
    }
}

fn reachable(doms: &Dominators<NodeIndex<u32>>, block: BlockId) -> bool {
    doms.dominators(block.into()).is_some()
}

/// Returns `true` if `a` dominates `b` (reflexively).
fn dominates(doms: &Dominators<NodeIndex<u32>>, a: BlockId, b: BlockId) -> bool {
    let a_idx: NodeIndex<u32> = a.into();
    match doms.dominators(b.into()) {
        Some(mut chain) => chain.any(|d| d == a_idx),
        None => false,
    }
}
