//! Path numbering: assign every entry-to-exit path a unique, dense id.
//!
//! The classic Ball-Larus scheme, run on the auxiliary graph. Loop edges and
//! edges that cross a loop-nest boundary are segmented first, leaving an
//! acyclic graph. Walking it in postorder then assigns each node the number
//! of paths from it to the virtual exit, and each edge the running prefix
//! sum of its earlier siblings' targets. Summing edge weights along any
//! entry-to-exit walk produces ids `0..num_paths(entry)` with no gaps and no
//! collisions.
//!
//! Path counts explode combinatorially, so they are carried as `u128` with
//! checked arithmetic. A function whose path space does not fit is reported
//! as not instrumentable rather than aborting the whole module.

use std::collections::HashSet;

use indexmap::IndexMap;
use pathprof_cfg::{back_edges, BlockId, Function, LoopForest};
use smallvec::SmallVec;

use crate::error::CoreError;
use crate::graph::{AuxGraph, AuxNode, EdgeId};

/// A path's number. Dense per function: `0..num_paths(entry)`.
pub type PathId = u128;

/// The result of numbering one function's paths: the weighted auxiliary
/// graph plus the per-node path-count table.
#[derive(Debug, Clone)]
pub struct Encoding {
    entry: BlockId,
    graph: AuxGraph,
    num_paths: IndexMap<AuxNode, PathId>,
}

impl Encoding {
    /// The function's entry block.
    pub fn entry(&self) -> BlockId {
        self.entry
    }

    /// The weighted, segmented auxiliary graph.
    pub fn graph(&self) -> &AuxGraph {
        &self.graph
    }

    /// Total number of paths through the function. Zero means the function
    /// cannot be instrumented (its path space overflowed the counter).
    pub fn num_paths(&self) -> PathId {
        self.num_paths_from(AuxNode::Block(self.entry))
    }

    /// Number of paths from `node` to the virtual exit. Unknown nodes
    /// count zero.
    pub fn num_paths_from(&self, node: AuxNode) -> PathId {
        self.num_paths.get(&node).copied().unwrap_or_default()
    }

    /// `false` when the path space overflowed and the function must be
    /// skipped by instrumentation and reporting.
    pub fn is_instrumentable(&self) -> bool {
        self.num_paths() != 0
    }

    /// Real edges with non-zero weight: the counter-increment sites.
    pub fn weights(&self) -> Vec<(EdgeId, u128)> {
        self.graph.weights()
    }

    /// Segmented edges and their fake halves: the counter-log sites.
    pub fn segments(&self) -> &IndexMap<EdgeId, (EdgeId, EdgeId)> {
        self.graph.segments()
    }

    /// Graphviz rendering of the weighted, segmented graph. `f` must be the
    /// function this encoding was built from; it supplies the block labels.
    pub fn to_dot(&self, f: &Function) -> String {
        self.graph.to_dot(f)
    }
}

/// Numbers the paths of `f`.
///
/// Segments every back edge and every edge whose endpoints sit in different
/// innermost loops, then weights the remaining acyclic graph bottom-up. On
/// counter overflow the returned encoding has `num_paths() == 0`; the
/// auxiliary graph is still returned for inspection.
pub fn encode(f: &Function) -> Result<Encoding, CoreError> {
    let entry = f.entry()?;
    let mut graph = AuxGraph::init(f)?;

    // Collect the edges to segment: loop continuations and loop-boundary
    // crossings, visited in node postorder so the batch's order is stable.
    // Handles carry identity, so parallel loop edges each land in the batch.
    let retreating = back_edges(f)?;
    let forest = LoopForest::analyze(f)?;
    let mut split: Vec<EdgeId> = Vec::new();
    for &node in graph.nodes() {
        let block = match node {
            AuxNode::Block(b) => b,
            AuxNode::Exit => continue,
        };
        for &id in graph.succs(node) {
            let succ = match graph.edge(id).tgt {
                AuxNode::Block(b) => b,
                AuxNode::Exit => continue,
            };
            if retreating.contains(&(block, succ))
                || forest.innermost(block) != forest.innermost(succ)
            {
                split.push(id);
            }
        }
    }
    graph.segment(&split)?;

    // Bottom-up weighting. Only the virtual exit has no out-edges, so it
    // seeds the table with one path (itself).
    let order = aux_postorder(&graph)?;
    let mut num_paths: IndexMap<AuxNode, PathId> = IndexMap::new();
    for &node in &order {
        let succs: SmallVec<[EdgeId; 4]> = SmallVec::from_slice(graph.succs(node));
        let mut path_count: PathId = if succs.is_empty() { 1 } else { 0 };
        for id in succs {
            graph[id] = path_count;
            let tgt = graph.edge(id).tgt;
            let from_tgt = num_paths.get(&tgt).copied().unwrap_or_default();
            path_count = match path_count.checked_add(from_tgt) {
                Some(total) => total,
                None => {
                    // Path space wider than the counter. Drop the table so
                    // the function reads as having zero paths.
                    return Ok(Encoding {
                        entry,
                        graph,
                        num_paths: IndexMap::new(),
                    });
                }
            };
        }
        num_paths.insert(node, path_count);
    }

    Ok(Encoding {
        entry,
        graph,
        num_paths,
    })
}

/// DFS postorder of the segmented auxiliary graph, starting at the virtual
/// entry. Errors if any edge retreats to a node still on the DFS spine,
/// which would mean segmentation left a cycle behind.
fn aux_postorder(graph: &AuxGraph) -> Result<Vec<AuxNode>, CoreError> {
    enum Frame {
        Enter(AuxNode),
        Leave(AuxNode),
    }

    let mut order = Vec::with_capacity(graph.node_count());
    let Some(start) = graph.virtual_entry() else {
        return Ok(order);
    };

    let mut visited: HashSet<AuxNode> = HashSet::new();
    let mut on_spine: HashSet<AuxNode> = HashSet::new();
    let mut stack = vec![Frame::Enter(start)];

    while let Some(frame) = stack.pop() {
        match frame {
            Frame::Enter(node) => {
                if visited.contains(&node) {
                    continue;
                }
                visited.insert(node);
                on_spine.insert(node);
                stack.push(Frame::Leave(node));
                for &id in graph.succs(node).iter().rev() {
                    let tgt = graph.edge(id).tgt;
                    if on_spine.contains(&tgt) {
                        return Err(CoreError::ResidualCycle { src: node, tgt });
                    }
                    if !visited.contains(&tgt) {
                        stack.push(Frame::Enter(tgt));
                    }
                }
            }
            Frame::Leave(node) => {
                on_spine.remove(&node);
                order.push(node);
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use pathprof_cfg::Block;

    use super::*;

    fn triangle() -> (Function, [BlockId; 3]) {
        let mut f = Function::new("triangle");
        let entry = f.add_block(Block::new("entry"));
        let a = f.add_block(Block::new("a"));
        let exit = f.add_block(Block::new("exit"));
        f.set_entry(entry).unwrap();
        f.add_branch(entry, exit).unwrap();
        f.add_branch(entry, a).unwrap();
        f.add_branch(a, exit).unwrap();
        (f, [entry, a, exit])
    }

    fn diamond() -> (Function, [BlockId; 4]) {
        let mut f = Function::new("diamond");
        let entry = f.add_block(Block::new("entry"));
        let a = f.add_block(Block::new("a"));
        let b = f.add_block(Block::new("b"));
        let exit = f.add_block(Block::new("exit"));
        f.set_entry(entry).unwrap();
        f.add_branch(entry, a).unwrap();
        f.add_branch(entry, b).unwrap();
        f.add_branch(a, exit).unwrap();
        f.add_branch(b, exit).unwrap();
        (f, [entry, a, b, exit])
    }

    fn single_loop() -> (Function, [BlockId; 4]) {
        let mut f = Function::new("loop");
        let entry = f.add_block(Block::new("entry"));
        let header = f.add_block(Block::new("header"));
        let body = f.add_block(Block::new("body"));
        let exit = f.add_block(Block::new("exit"));
        f.set_entry(entry).unwrap();
        f.add_branch(entry, header).unwrap();
        f.add_branch(header, body).unwrap();
        f.add_branch(header, exit).unwrap();
        f.add_branch(body, header).unwrap();
        (f, [entry, header, body, exit])
    }

    #[test]
    fn triangle_has_two_paths() {
        let (f, [entry, a, exit]) = triangle();
        let enc = encode(&f).unwrap();

        assert_eq!(enc.num_paths(), 2);
        assert!(enc.is_instrumentable());

        let g = enc.graph();
        let entry_exit = g.exists(AuxNode::Block(entry), AuxNode::Block(exit), true).unwrap();
        let entry_a = g.exists(AuxNode::Block(entry), AuxNode::Block(a), true).unwrap();
        let a_exit = g.exists(AuxNode::Block(a), AuxNode::Block(exit), true).unwrap();
        assert_eq!(g[entry_exit], 0);
        assert_eq!(g[entry_a], 1);
        assert_eq!(g[a_exit], 0);

        // Only the single non-zero real edge needs an increment.
        assert_eq!(enc.weights(), vec![(entry_a, 1)]);
        assert!(enc.segments().is_empty());
    }

    #[test]
    fn diamond_has_two_paths() {
        let (f, [entry, a, b, _]) = diamond();
        let enc = encode(&f).unwrap();

        assert_eq!(enc.num_paths(), 2);
        let g = enc.graph();
        let entry_a = g.exists(AuxNode::Block(entry), AuxNode::Block(a), true).unwrap();
        let entry_b = g.exists(AuxNode::Block(entry), AuxNode::Block(b), true).unwrap();
        assert_eq!(g[entry_a], 0);
        assert_eq!(g[entry_b], 1);
    }

    #[test]
    fn loop_is_segmented_and_numbered() {
        let (f, [entry, header, body, exit]) = single_loop();
        let enc = encode(&f).unwrap();

        // Latch, loop exit, and loop entry all split.
        assert_eq!(enc.segments().len(), 3);

        // Path fragments: continue/exit from the header, resume at the
        // header after either split, leave through the real exit, plus the
        // entry-side stub.
        assert_eq!(enc.num_paths(), 6);
        assert_eq!(enc.num_paths_from(AuxNode::Block(header)), 2);
        assert_eq!(enc.num_paths_from(AuxNode::Block(body)), 1);
        assert_eq!(enc.num_paths_from(AuxNode::Block(exit)), 1);
        assert_eq!(enc.num_paths_from(AuxNode::Exit), 1);

        // All real survivors carry weight zero, so no increments at all;
        // this function is profiled purely through its log sites.
        assert!(enc.weights().is_empty());

        // The virtual entry's fake fan-out carries the fragment offsets.
        let g = enc.graph();
        let entry_weights: Vec<u128> = g
            .succs(AuxNode::Block(entry))
            .iter()
            .map(|&id| g[id])
            .collect();
        assert_eq!(entry_weights, vec![0, 2, 3, 4]);
    }

    #[test]
    fn self_loop_is_segmented_and_numbered() {
        let mut f = Function::new("self");
        let entry = f.add_block(Block::new("entry"));
        let spin = f.add_block(Block::new("spin"));
        let exit = f.add_block(Block::new("exit"));
        f.set_entry(entry).unwrap();
        f.add_branch(entry, spin).unwrap();
        f.add_branch(spin, spin).unwrap();
        f.add_branch(spin, exit).unwrap();

        let enc = encode(&f).unwrap();
        assert_eq!(enc.segments().len(), 3);
        assert_eq!(enc.num_paths(), 6);
        assert_eq!(enc.num_paths_from(AuxNode::Block(spin)), 2);
    }

    #[test]
    fn function_without_return_still_encodes() {
        let mut f = Function::new("spin_forever");
        let entry = f.add_block(Block::new("entry"));
        let spin = f.add_block(Block::new("spin"));
        f.set_entry(entry).unwrap();
        f.add_branch(entry, spin).unwrap();
        f.add_branch(spin, spin).unwrap();

        let enc = encode(&f).unwrap();
        assert!(enc.is_instrumentable());
        assert_eq!(enc.num_paths(), 3);
        // No block has zero successors, so no real edge reaches the virtual
        // exit and every path fragment ends in a fake edge.
        assert!(enc.weights().is_empty());
    }

    #[test]
    fn single_block_function_has_one_path() {
        let mut f = Function::new("one");
        let b = f.add_block(Block::new("entry"));
        f.set_entry(b).unwrap();

        let enc = encode(&f).unwrap();
        assert_eq!(enc.num_paths(), 1);
        assert!(enc.is_instrumentable());
        assert!(enc.weights().is_empty());
    }

    #[test]
    fn unreachable_blocks_do_not_count() {
        let (mut f, [_, _, _, exit]) = diamond();
        let island = f.add_block(Block::new("island"));
        f.add_branch(island, exit).unwrap();

        let enc = encode(&f).unwrap();
        assert_eq!(enc.num_paths(), 2);
        assert_eq!(enc.num_paths_from(AuxNode::Block(island)), 0);
    }

    #[test]
    fn path_space_overflow_disables_the_function() {
        // A chain of two-way splits doubles the path count per stage;
        // 130 stages blow through any 128-bit counter.
        let mut f = Function::new("wide");
        let entry = f.add_block(Block::new("entry"));
        f.set_entry(entry).unwrap();
        let mut tail = entry;
        for i in 0..130 {
            let a = f.add_block(Block::new(&format!("a{i}")));
            let b = f.add_block(Block::new(&format!("b{i}")));
            let join = f.add_block(Block::new(&format!("join{i}")));
            f.add_branch(tail, a).unwrap();
            f.add_branch(tail, b).unwrap();
            f.add_branch(a, join).unwrap();
            f.add_branch(b, join).unwrap();
            tail = join;
        }

        let enc = encode(&f).unwrap();
        assert_eq!(enc.num_paths(), 0);
        assert!(!enc.is_instrumentable());
    }

    #[test]
    fn dot_shows_assigned_weights() {
        let (f, _) = triangle();
        let enc = encode(&f).unwrap();
        insta::assert_snapshot!(enc.to_dot(&f), @r###"
        digraph "triangle" {
          label="triangle";
          NExit [shape=record, label="virtual exit"];
          N2 [shape=record, label="exit"];
          N1 [shape=record, label="a"];
          N0 [shape=record, label="entry"];
          N2 -> NExit [style=solid, label="0"];
          N1 -> N2 [style=solid, label="0"];
          N0 -> N2 [style=solid, label="0"];
          N0 -> N1 [style=solid, label="1"];
        }
        "###);
    }

    #[test]
    fn parallel_loop_edges_segment_independently() {
        // A second latch branch: same (src, tgt) pair, distinct identity.
        // Both copies must segment, and each gets its own resume fragment.
        let (mut f, [_, header, body, _]) = single_loop();
        f.add_branch(body, header).unwrap();

        let enc = encode(&f).unwrap();
        assert_eq!(enc.segments().len(), 4);
        assert_eq!(enc.num_paths_from(AuxNode::Block(body)), 2);
        assert_eq!(enc.num_paths(), 11);
    }

    #[test]
    fn encode_requires_an_entry() {
        let f = Function::new("no_entry");
        assert!(matches!(encode(&f), Err(CoreError::Cfg(_))));
    }
}
