//! Stable ID newtypes for program entities.
//!
//! All IDs are distinct newtype wrappers over `u32`, providing type safety
//! so that a `BlockId` cannot be accidentally used where a `FuncId` is
//! expected.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Basic block identifier within one function. Maps to a petgraph
/// `NodeIndex<u32>` in that function's control-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

/// Function identifier: the 0-based position of the function in its module's
/// function list. Profile records refer to functions by this ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FuncId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FuncId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between BlockId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for BlockId {
    fn from(idx: NodeIndex<u32>) -> Self {
        BlockId(idx.index() as u32)
    }
}

impl From<BlockId> for NodeIndex<u32> {
    fn from(id: BlockId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(17);
        let block = BlockId::from(idx);
        assert_eq!(block.0, 17);

        let back: NodeIndex<u32> = block.into();
        assert_eq!(back.index(), 17);
    }

    #[test]
    fn block_id_display() {
        assert_eq!(format!("{}", BlockId(4)), "4");
    }

    #[test]
    fn func_id_display() {
        assert_eq!(format!("{}", FuncId(0)), "0");
    }

    #[test]
    fn ids_order_by_inner_value() {
        assert!(BlockId(1) < BlockId(2));
        assert!(FuncId(0) < FuncId(9));
    }

    #[test]
    fn serde_roundtrip() {
        let block = BlockId(11);
        let json = serde_json::to_string(&block).unwrap();
        let back: BlockId = serde_json::from_str(&json).unwrap();
        assert_eq!(block, back);

        let func = FuncId(2);
        let json = serde_json::to_string(&func).unwrap();
        let back: FuncId = serde_json::from_str(&json).unwrap();
        assert_eq!(func, back);
    }
}
