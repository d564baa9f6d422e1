//! Path decoding: turn a logged path id back into the blocks it visited.
//!
//! Decoding replays the encoder's arithmetic in reverse. Starting at the
//! entry with the path id as budget, it repeatedly takes the heaviest
//! out-edge whose weight still fits, subtracting as it goes, until the walk
//! drains into the virtual exit. Whether the first and last selected edges
//! were real or fake tells whether the recovered sequence is a complete
//! procedure path or a fragment cut short by segmentation on either end.

use std::collections::HashMap;
use std::fmt;

use pathprof_cfg::{BlockId, Function};
use serde::{Deserialize, Serialize};

use crate::encode::{encode, Encoding, PathId};
use crate::error::CoreError;
use crate::graph::{AuxNode, EdgeId};

/// How a decoded block sequence relates to procedure entry and exit.
///
/// `R` is real, `F` fake; first letter describes how the path begins, second
/// how it ends. Fake ends come from segmentation: the path is one fragment
/// of a longer dynamic path that crossed a loop edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PathType {
    /// Begins at the procedure entry and runs to a real exit block.
    Riro,
    /// Resumes at a loop header, runs to a real exit block.
    Firo,
    /// Begins at the procedure entry, cut short at a segmented edge.
    Rifo,
    /// A fragment between two segmented edges, e.g. one loop iteration.
    Fifo,
}

impl PathType {
    fn classify(first_real: bool, last_real: bool) -> PathType {
        match (first_real, last_real) {
            (true, true) => PathType::Riro,
            (false, true) => PathType::Firo,
            (true, false) => PathType::Rifo,
            (false, false) => PathType::Fifo,
        }
    }

    /// `true` if the path resumes mid-function instead of at the entry.
    pub fn fake_in(self) -> bool {
        matches!(self, PathType::Firo | PathType::Fifo)
    }

    /// `true` if the path was cut short by a segmented edge.
    pub fn fake_out(self) -> bool {
        matches!(self, PathType::Rifo | PathType::Fifo)
    }
}

impl fmt::Display for PathType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            PathType::Riro => "RIRO",
            PathType::Firo => "FIRO",
            PathType::Rifo => "RIFO",
            PathType::Fifo => "FIFO",
        };
        write!(f, "{tag}")
    }
}

/// One decoded path: its classification and the blocks it visits, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedPath {
    /// Real/fake classification of the path's two ends.
    pub path_type: PathType,
    /// The visited blocks. Never includes the virtual exit; for fake-in
    /// paths the entry block is already trimmed off.
    pub blocks: Vec<BlockId>,
}

/// Decodes one path id against an encoding.
///
/// Errors if `id` is outside `0..encoding.num_paths()` (which includes every
/// id of a function whose path space overflowed) or if the walk gets stuck,
/// which means the profile and the function do not match.
pub fn decode(encoding: &Encoding, id: PathId) -> Result<DecodedPath, CoreError> {
    let total = encoding.num_paths();
    if id >= total {
        return Err(CoreError::PathIdOutOfRange { id, total });
    }

    let graph = encoding.graph();
    let mut blocks: Vec<BlockId> = Vec::new();
    let mut selected: Vec<EdgeId> = Vec::new();
    let mut remaining = id;
    let mut node = AuxNode::Block(encoding.entry());

    while let AuxNode::Block(block) = node {
        blocks.push(block);

        // Heaviest edge that still fits the budget; on a tie the later
        // edge wins.
        let mut best: Option<(EdgeId, u128)> = None;
        for &candidate in graph.succs(node) {
            let weight = graph[candidate];
            if weight <= remaining && best.map_or(true, |(_, w)| weight >= w) {
                best = Some((candidate, weight));
            }
        }
        let (edge, weight) = best.ok_or(CoreError::NoViableEdge { block, remaining })?;

        selected.push(edge);
        remaining -= weight;
        node = graph.edge(edge).tgt;
    }

    let path_type = match (selected.first(), selected.last()) {
        (Some(&first), Some(&last)) => {
            PathType::classify(graph.edge(first).real, graph.edge(last).real)
        }
        _ => PathType::Riro,
    };
    // A fake-in path really starts at the first selected edge's target; the
    // entry block the walk began at is not part of it.
    if path_type.fake_in() {
        blocks.remove(0);
    }

    Ok(DecodedPath { path_type, blocks })
}

/// Decoder for many ids of one function, memoizing decoded paths so batch
/// report generation does not re-walk hot ids.
#[derive(Debug, Clone)]
pub struct Decoder {
    encoding: Encoding,
    cache: HashMap<PathId, DecodedPath>,
}

impl Decoder {
    /// Wraps an existing encoding.
    pub fn new(encoding: Encoding) -> Self {
        Decoder {
            encoding,
            cache: HashMap::new(),
        }
    }

    /// Encodes `f` and wraps the result.
    pub fn from_function(f: &Function) -> Result<Self, CoreError> {
        Ok(Decoder::new(encode(f)?))
    }

    /// The underlying encoding.
    pub fn encoding(&self) -> &Encoding {
        &self.encoding
    }

    /// Decodes `id`, reusing the memoized result when available.
    pub fn decode(&mut self, id: PathId) -> Result<DecodedPath, CoreError> {
        if let Some(path) = self.cache.get(&id) {
            return Ok(path.clone());
        }
        let path = decode(&self.encoding, id)?;
        self.cache.insert(id, path.clone());
        Ok(path)
    }

    /// Number of distinct ids decoded so far.
    pub fn cached_paths(&self) -> usize {
        self.cache.len()
    }
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

    fn decoded(f: &Function, id: PathId) -> DecodedPath {
        let enc = encode(f).unwrap();
        decode(&enc, id).unwrap()
    }

    #[test]
    fn triangle_paths_are_complete() {
        let (f, [entry, a, exit]) = triangle();

        let direct = decoded(&f, 0);
        assert_eq!(direct.path_type, PathType::Riro);
        assert_eq!(direct.blocks, vec![entry, exit]);

        let detour = decoded(&f, 1);
        assert_eq!(detour.path_type, PathType::Riro);
        assert_eq!(detour.blocks, vec![entry, a, exit]);
    }

    #[test]
    fn loop_ids_decode_to_fragments() {
        let (f, [_, header, body, exit]) = single_loop();
        let enc = encode(&f).unwrap();
        assert_eq!(enc.num_paths(), 6);

        let expect: [(PathType, Vec<BlockId>); 6] = [
            (PathType::Fifo, vec![header, body]),
            (PathType::Fifo, vec![header]),
            (PathType::Firo, vec![exit]),
            (PathType::Fifo, vec![]),
            (PathType::Fifo, vec![header, body]),
            (PathType::Fifo, vec![header]),
        ];
        for (id, (path_type, blocks)) in expect.into_iter().enumerate() {
            let path = decode(&enc, id as PathId).unwrap();
            assert_eq!(path.path_type, path_type, "path id {id}");
            assert_eq!(path.blocks, blocks, "path id {id}");
        }
    }

    #[test]
    fn single_block_path_is_riro() {
        let mut f = Function::new("one");
        let b = f.add_block(Block::new("entry"));
        f.set_entry(b).unwrap();

        let path = decoded(&f, 0);
        assert_eq!(path.path_type, PathType::Riro);
        assert_eq!(path.blocks, vec![b]);
    }

    #[test]
    fn ids_at_or_above_the_path_count_are_rejected() {
        let (f, _) = triangle();
        let enc = encode(&f).unwrap();

        let err = decode(&enc, 2).unwrap_err();
        assert!(matches!(err, CoreError::PathIdOutOfRange { id: 2, total: 2 }));
        assert!(decode(&enc, u128::MAX).is_err());
    }

    #[test]
    fn overflowed_functions_reject_every_id() {
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
        let err = decode(&enc, 0).unwrap_err();
        assert!(matches!(err, CoreError::PathIdOutOfRange { id: 0, total: 0 }));
    }

    #[test]
    fn decoder_memoizes_by_id() {
        let (f, _) = triangle();
        let mut decoder = Decoder::from_function(&f).unwrap();

        let first = decoder.decode(1).unwrap();
        let again = decoder.decode(1).unwrap();
        assert_eq!(first, again);
        assert_eq!(decoder.cached_paths(), 1);

        decoder.decode(0).unwrap();
        assert_eq!(decoder.cached_paths(), 2);
        assert_eq!(decoder.encoding().num_paths(), 2);
    }

    #[test]
    fn path_type_display_and_flags() {
        assert_eq!(PathType::Riro.to_string(), "RIRO");
        assert_eq!(PathType::Firo.to_string(), "FIRO");
        assert_eq!(PathType::Rifo.to_string(), "RIFO");
        assert_eq!(PathType::Fifo.to_string(), "FIFO");

        assert!(!PathType::Riro.fake_in() && !PathType::Riro.fake_out());
        assert!(PathType::Firo.fake_in() && !PathType::Firo.fake_out());
        assert!(!PathType::Rifo.fake_in() && PathType::Rifo.fake_out());
        assert!(PathType::Fifo.fake_in() && PathType::Fifo.fake_out());
    }

    #[test]
    fn decoded_path_serializes_with_type_tag() {
        let (f, _) = triangle();
        let path = decoded(&f, 0);
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#"{"path_type":"RIRO","blocks":[0,2]}"#);

        let back: DecodedPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
