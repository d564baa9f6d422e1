//! The weighted auxiliary multigraph that path encoding runs on.
//!
//! [`AuxGraph`] starts as a copy of a function's CFG edges (all marked
//! *real*) with two virtual endpoints: a virtual exit that every
//! zero-successor block points at, and the entry block doubling as the
//! virtual entry. Loop edges are then *segmented*: the edge `A -> B` is
//! unlinked and replaced by the fake pair `A -> virtual-exit` and
//! `virtual-entry -> B`, which leaves an acyclic graph whose entry-to-exit
//! paths can be numbered.
//!
//! Edges live in a grow-only arena and are addressed by [`EdgeId`], so a
//! segmented edge keeps its identity (and its slot in the segment map) even
//! though it no longer appears in any adjacency list. Parallel edges between
//! the same pair of nodes are distinct arena entries.

use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::ops::{Index, IndexMut};

use indexmap::IndexMap;
use pathprof_cfg::{postorder, BlockId, Function};
use smallvec::SmallVec;

use crate::error::CoreError;

/// A node of the auxiliary graph: a CFG block or the virtual exit.
///
/// The virtual entry needs no variant of its own; the function's entry block
/// plays that role (it is predecessor-free, so fake edges out of it can never
/// close a cycle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuxNode {
    /// A real basic block.
    Block(BlockId),
    /// The virtual exit all paths drain into.
    Exit,
}

impl fmt::Display for AuxNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuxNode::Block(b) => write!(f, "block {b}"),
            AuxNode::Exit => write!(f, "virtual exit"),
        }
    }
}

/// Arena handle for one auxiliary edge. Only valid for the graph that
/// minted it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeId(pub(crate) u32);

/// One auxiliary edge. Real edges mirror CFG branches (plus the
/// block-to-virtual-exit links); fake edges are segmentation halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    /// Source node.
    pub src: AuxNode,
    /// Target node.
    pub tgt: AuxNode,
    /// `true` for CFG-derived edges, `false` for segmentation halves.
    pub real: bool,
    weight: u128,
}

impl Edge {
    /// The path-numbering weight assigned by the encoder (zero until then).
    pub fn weight(&self) -> u128 {
        self.weight
    }
}

/// The auxiliary multigraph: nodes, an edge arena, per-node adjacency, and
/// the record of which edges were segmented into which fake pairs.
#[derive(Debug, Clone, Default)]
pub struct AuxGraph {
    /// Virtual exit first, then the blocks in CFG postorder (entry last).
    nodes: Vec<AuxNode>,
    /// Every edge ever added, segmented originals included.
    edges: Vec<Edge>,
    /// Out-edges per node, in insertion order. Segmentation removes entries
    /// here without touching the arena.
    adjacency: HashMap<AuxNode, SmallVec<[EdgeId; 4]>>,
    /// Segmented edge -> its (to-virtual-exit, from-virtual-entry) fake pair.
    segments: IndexMap<EdgeId, (EdgeId, EdgeId)>,
}

impl AuxGraph {
    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    /// Builds the auxiliary graph for `f`: one node per reachable block plus
    /// the virtual exit, one real edge per branch between reachable blocks,
    /// and one real edge to the virtual exit per zero-successor block.
    ///
    /// No edges are segmented yet; the result mirrors the CFG.
    pub fn init(f: &Function) -> Result<Self, CoreError> {
        f.entry()?;
        let order = postorder(f)?;

        // The postorder puts the entry block last, which makes it the
        // virtual entry; the virtual exit goes in front.
        let mut graph = AuxGraph::default();
        graph.nodes.push(AuxNode::Exit);
        graph.nodes.extend(order.iter().map(|&b| AuxNode::Block(b)));

        for &block in &order {
            let succs = f.successors(block)?;
            if succs.is_empty() {
                graph.add(AuxNode::Block(block), AuxNode::Exit, true);
            } else {
                for succ in succs {
                    graph.add(AuxNode::Block(block), AuxNode::Block(succ), true);
                }
            }
        }

        #[cfg(debug_assertions)]
        graph.assert_consistency();

        Ok(graph)
    }

    /// Adds an edge and returns its arena handle. The weight starts at zero.
    pub fn add(&mut self, src: AuxNode, tgt: AuxNode, real: bool) -> EdgeId {
        let id = EdgeId(self.edges.len() as u32);
        self.edges.push(Edge {
            src,
            tgt,
            real,
            weight: 0,
        });
        self.adjacency.entry(src).or_default().push(id);
        id
    }

    /// Returns the first linked `src -> tgt` edge with the given realness,
    /// if one exists.
    pub fn exists(&self, src: AuxNode, tgt: AuxNode, real: bool) -> Option<EdgeId> {
        self.succs(src).iter().copied().find(|&id| {
            let edge = &self.edges[id.0 as usize];
            edge.tgt == tgt && edge.real == real
        })
    }

    /// Returns the matching linked edge, adding it first when absent.
    pub fn get_or_insert(&mut self, src: AuxNode, tgt: AuxNode, real: bool) -> EdgeId {
        match self.exists(src, tgt, real) {
            Some(id) => id,
            None => self.add(src, tgt, real),
        }
    }

    /// Segments every edge handle in `list`: unlinks the edge from its
    /// source's adjacency list and appends the fake pair `A -> virtual-exit`,
    /// `virtual-entry -> B`, recording the pair under the original handle.
    /// Handles carry identity, so parallel edges over the same block pair
    /// segment independently.
    ///
    /// All unlinking happens before any fake is appended, so a fake added
    /// for one pair can never be picked up by a later pair in the same
    /// batch. On error the graph may already be partially rewritten and must
    /// be discarded.
    pub fn segment(&mut self, list: &[EdgeId]) -> Result<(), CoreError> {
        for &id in list {
            self.unlink(id)?;
        }
        // Unlinking succeeded, so a non-empty list implies a built graph.
        let Some(ventry) = self.virtual_entry() else {
            return Ok(());
        };

        for &id in list {
            let Edge { src, tgt, .. } = self.edges[id.0 as usize];
            let to_exit = self.add(src, AuxNode::Exit, false);
            let from_entry = self.add(ventry, tgt, false);
            self.segments.insert(id, (to_exit, from_entry));
        }

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(())
    }

    /// Removes the edge with handle `id` from its source's adjacency list.
    /// The arena entry stays.
    fn unlink(&mut self, id: EdgeId) -> Result<(), CoreError> {
        let Some(&Edge { src, tgt, .. }) = self.edges.get(id.0 as usize) else {
            return Err(CoreError::UnknownEdge { edge: id });
        };

        if let Some(list) = self.adjacency.get_mut(&src) {
            if let Some(pos) = list.iter().position(|&linked| linked == id) {
                list.remove(pos);
                return Ok(());
            }
        }

        // Not linked. Tell a repeat segmentation apart from a handle listed
        // twice in one batch.
        if self.segments.contains_key(&id) {
            Err(CoreError::AlreadySegmented { src, tgt })
        } else {
            Err(CoreError::EdgeNotFound { src, tgt })
        }
    }

    /// Drops all nodes, edges, adjacency, and segment records.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.adjacency.clear();
        self.segments.clear();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The node acting as virtual entry: the last node, which for a graph
    /// built by [`AuxGraph::init`] is the function's entry block. `None`
    /// only for a cleared or default graph.
    pub fn virtual_entry(&self) -> Option<AuxNode> {
        self.nodes.last().copied()
    }

    /// All nodes: virtual exit first, then blocks in CFG postorder.
    pub fn nodes(&self) -> &[AuxNode] {
        &self.nodes
    }

    /// Linked out-edges of `node` in insertion order. Unknown nodes (and the
    /// virtual exit) have no out-edges.
    pub fn succs(&self, node: AuxNode) -> &[EdgeId] {
        self.adjacency
            .get(&node)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Looks up an edge by handle.
    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0 as usize]
    }

    /// Real edges with a non-zero weight, in arena order. These are exactly
    /// the edges an instrumenter must attach a counter increment to.
    pub fn weights(&self) -> Vec<(EdgeId, u128)> {
        self.edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.real && e.weight != 0)
            .map(|(i, e)| (EdgeId(i as u32), e.weight))
            .collect()
    }

    /// Segmented edges and their fake halves, in segmentation order. An
    /// instrumenter logs the running counter at each of these.
    pub fn segments(&self) -> &IndexMap<EdgeId, (EdgeId, EdgeId)> {
        &self.segments
    }

    /// Number of nodes, virtual exit included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of arena edges, segmented originals included.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Renders the graph in Graphviz dot format: real edges solid, fake
    /// edges dashed red, weights as edge labels. Block labels come from `f`.
    pub fn to_dot(&self, f: &Function) -> String {
        fn dot_id(node: AuxNode) -> String {
            match node {
                AuxNode::Block(b) => format!("N{}", b.0),
                AuxNode::Exit => "NExit".to_string(),
            }
        }

        let mut out = String::new();
        let _ = writeln!(out, "digraph \"{}\" {{", f.name());
        let _ = writeln!(out, "  label=\"{}\";", f.name());
        for &node in &self.nodes {
            let label = match node {
                AuxNode::Block(b) => f
                    .block(b)
                    .map(|blk| blk.label.clone())
                    .unwrap_or_else(|| format!("b{}", b.0)),
                AuxNode::Exit => "virtual exit".to_string(),
            };
            let _ = writeln!(out, "  {} [shape=record, label=\"{}\"];", dot_id(node), label);
        }
        for &node in &self.nodes {
            for &id in self.succs(node) {
                let edge = &self.edges[id.0 as usize];
                let style = if edge.real {
                    "style=solid"
                } else {
                    "style=dashed, color=\"red\""
                };
                let _ = writeln!(
                    out,
                    "  {} -> {} [{}, label=\"{}\"];",
                    dot_id(edge.src),
                    dot_id(edge.tgt),
                    style,
                    edge.weight
                );
            }
        }
        out.push_str("}\n");
        out
    }

    /// Structural invariants, checked in debug builds after every mutation:
    /// adjacency handles are in range and match their source node, segmented
    /// edges are unlinked, and fake edges only leave the virtual entry or
    /// enter the virtual exit.
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for (&node, list) in &self.adjacency {
            for &id in list {
                let edge = self
                    .edges
                    .get(id.0 as usize)
                    .unwrap_or_else(|| panic!("adjacency holds unknown edge {:?}", id));
                assert_eq!(edge.src, node, "edge {:?} linked under wrong source", id);
            }
        }
        let ventry = self.virtual_entry();
        for (&id, &(to_exit, from_entry)) in &self.segments {
            let edge = &self.edges[id.0 as usize];
            let linked = self
                .succs(edge.src)
                .iter()
                .any(|&linked_id| linked_id == id);
            assert!(!linked, "segmented edge {:?} still linked", id);
            assert_eq!(self.edges[to_exit.0 as usize].tgt, AuxNode::Exit);
            assert_eq!(Some(self.edges[from_entry.0 as usize].src), ventry);
        }
        for edge in &self.edges {
            if !edge.real {
                assert!(
                    Some(edge.src) == ventry || edge.tgt == AuxNode::Exit,
                    "fake edge neither leaves the virtual entry nor enters the virtual exit"
                );
            }
        }
    }
}

/// Weight of an edge, readable by handle.
impl Index<EdgeId> for AuxGraph {
    type Output = u128;

    fn index(&self, id: EdgeId) -> &u128 {
        &self.edges[id.0 as usize].weight
    }
}

/// Weight of an edge, assignable by handle: `graph[id] = w`.
impl IndexMut<EdgeId> for AuxGraph {
    fn index_mut(&mut self, id: EdgeId) -> &mut u128 {
        &mut self.edges[id.0 as usize].weight
    }
}
