//! Error types for the program model.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! construction-time contract of functions and the queries the profiling
//! layers run against them.

use thiserror::Error;

use crate::id::{BlockId, FuncId};

/// Errors produced while building or querying the program model.
#[derive(Debug, Error)]
pub enum CfgError {
    /// A block ID was not found in the function's graph.
    #[error("block not found: BlockId({id})")]
    BlockNotFound { id: BlockId },

    /// A function ID was not found in the module.
    #[error("function not found: FuncId({id})")]
    FunctionNotFound { id: FuncId },

    /// A traversal or analysis was requested before the entry block was set.
    #[error("entry block not set for function '{function}'")]
    EntryNotSet { function: String },

    /// `set_entry` was called on a function that already has an entry block.
    #[error("entry block already set for function '{function}'")]
    EntryAlreadySet { function: String },

    /// The entry block may not have incoming branches. Loop headers must be
    /// separate blocks so every cycle can be broken at a non-entry block.
    #[error("entry block of function '{function}' may not have predecessors")]
    EntryHasPredecessors { function: String },
}
