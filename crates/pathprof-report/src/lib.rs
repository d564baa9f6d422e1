//! Decoder driver for path profiles: the on-disk profile format, batch
//! decoding of recorded path ids against a module, and the per-function
//! instrumentation summary.

pub mod error;
pub mod profile;
pub mod report;
pub mod summary;

// Re-export commonly used types
pub use error::{ProfileError, ReportError};
pub use profile::{CounterWidth, PathRecord, Profile};
pub use report::{decode_profile, FunctionReport, ModuleReport, PathReport};
pub use summary::{summarize, FunctionSummary, ModuleSummary};
