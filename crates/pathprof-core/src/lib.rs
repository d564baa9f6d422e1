//! Ball-Larus path profiling: the weighted auxiliary graph, the path-id
//! encoder, and the id-to-blocks decoder.

pub mod decode;
pub mod encode;
pub mod error;
pub mod graph;

// Re-export commonly used types
pub use decode::{decode, DecodedPath, Decoder, PathType};
pub use encode::{encode, Encoding, PathId};
pub use error::CoreError;
pub use graph::{AuxGraph, AuxNode, Edge, EdgeId};
