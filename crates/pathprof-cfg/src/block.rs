//! Basic blocks and their optional source locations.
//!
//! A [`Block`] is the unit the path profiler works in terms of: decoded paths
//! are sequences of blocks, and reports render each block by its label or,
//! when debug info survived, by the source location it came from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Source position a block originated from, when debug info is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLoc {
    /// Source file name.
    pub file: String,
    /// 1-based line number.
    pub line: u32,
}

impl fmt::Display for SourceLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A basic block: a label plus an optional source location.
///
/// The profiler never looks inside a block; instructions are the concern of
/// the host IR. Only the label (for reports and Graphviz output) and the
/// source location (for `file:line` report rendering) are carried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Human-readable block label, e.g. `"entry"` or `"while.body"`.
    pub label: String,
    /// Where this block came from, if debug info is present.
    pub source: Option<SourceLoc>,
}

impl Block {
    /// Creates a block with a label and no source location.
    pub fn new(label: &str) -> Self {
        Block {
            label: label.to_string(),
            source: None,
        }
    }

    /// Creates a block with a label and a `file:line` source location.
    pub fn with_source(label: &str, file: &str, line: u32) -> Self {
        Block {
            label: label.to_string(),
            source: Some(SourceLoc {
                file: file.to_string(),
                line,
            }),
        }
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}
