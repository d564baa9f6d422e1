//! Depth-first CFG traversals: postorder and back-edge discovery.
//!
//! Both walks use an explicit stack instead of recursion so block count, not
//! call-stack depth, is the only limit. Both visit successors in branch-index
//! order and only touch blocks reachable from the entry, so their output is a
//! deterministic function of the CFG shape.

use std::collections::HashSet;

use indexmap::IndexSet;

use crate::error::CfgError;
use crate::function::Function;
use crate::id::BlockId;

enum Frame {
    Enter(BlockId),
    Exit(BlockId),
}

/// Returns the reachable blocks of `f` in DFS postorder (entry last).
///
/// Every successor of a block appears before the block itself, except across
/// retreating edges; on an acyclic CFG the reverse of this order is a
/// topological order.
pub fn postorder(f: &Function) -> Result<Vec<BlockId>, CfgError> {
    let entry = f.entry()?;
    let mut order = Vec::with_capacity(f.block_count());
    let mut visited: HashSet<BlockId> = HashSet::new();
    let mut stack = vec![Frame::Enter(entry)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(block) => {
                if !visited.insert(block) {
                    continue;
                }
                stack.push(Frame::Exit(block));
                // Reverse so the first successor is explored first.
                for succ in f.successors(block)?.iter().rev() {
                    if !visited.contains(succ) {
                        stack.push(Frame::Enter(*succ));
                    }
                }
            }
            Frame::Exit(block) => order.push(block),
        }
    }

    Ok(order)
}

/// Returns the back edges of `f`: edges whose target is on the DFS spine at
/// the moment the source is expanded (loop continuations, self-loops
/// included). Insertion order of the returned set follows the DFS.
pub fn back_edges(f: &Function) -> Result<IndexSet<(BlockId, BlockId)>, CfgError> {
    let entry = f.entry()?;
    let mut edges = IndexSet::new();
    let mut visited: HashSet<BlockId> = HashSet::new();
    let mut on_spine: HashSet<BlockId> = HashSet::new();
    let mut stack = vec![Frame::Enter(entry)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(block) => {
                if visited.contains(&block) {
                    continue;
                }
                visited.insert(block);
                on_spine.insert(block);
                stack.push(Frame::Exit(block));
                for succ in f.successors(block)?.iter().rev() {
                    if on_spine.contains(succ) {
                        edges.insert((block, *succ));
                    } else if !visited.contains(succ) {
                        stack.push(Frame::Enter(*succ));
                    }
                }
            }
            Frame::Exit(block) => {
                on_spine.remove(&block);
            }
        }
    }

    Ok(edges)
}
