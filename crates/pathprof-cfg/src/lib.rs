//! Program model for path profiling: blocks, functions, modules, and the
//! CFG analyses (postorder, back edges, natural loops) the encoder consumes.

pub mod block;
pub mod error;
pub mod function;
pub mod id;
pub mod loops;
pub mod module;
pub mod traverse;

// Re-export commonly used types
pub use block::{Block, SourceLoc};
pub use error::CfgError;
pub use function::{Branch, Function};
pub use id::{BlockId, FuncId};
pub use loops::{LoopForest, LoopId, NaturalLoop};
pub use module::Module;
pub use traverse::{back_edges, postorder};
