//! Error types for profile files and report generation.

use std::io;

use pathprof_cfg::{CfgError, FuncId};
use pathprof_core::CoreError;
use thiserror::Error;

/// Errors reading or writing the on-disk profile format.
///
/// A profile is written by the instrumented program itself; a malformed file
/// means the run was corrupted or the file is not a profile at all. Parsing
/// therefore fails the whole file on the first bad line instead of skipping.
#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// A function header line was not `<function-id> <record-count>`.
    #[error("line {line}: malformed function header {text:?}")]
    MalformedHeader { line: usize, text: String },

    /// A record line was not `<path-id-hex> <frequency-decimal>`.
    #[error("line {line}: malformed path record {text:?}")]
    MalformedRecord { line: usize, text: String },

    /// The file ended in the middle of a function's record list.
    #[error("line {line}: profile truncated, expected {missing} more record(s)")]
    Truncated { line: usize, missing: usize },
}

/// Errors producing decoded reports and instrumentation summaries.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),

    #[error("cfg error: {0}")]
    Cfg(#[from] CfgError),

    #[error("path coding error: {0}")]
    Core(#[from] CoreError),

    /// The profile records paths for a function ordinal the module does not
    /// have. The profile was taken from a different build of the program.
    #[error("profile references unknown function id {id}")]
    UnknownFunction { id: FuncId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_error_messages_carry_line_numbers() {
        let err = ProfileError::MalformedHeader {
            line: 3,
            text: "not a header".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "line 3: malformed function header \"not a header\""
        );

        let err = ProfileError::Truncated { line: 7, missing: 2 };
        assert_eq!(
            err.to_string(),
            "line 7: profile truncated, expected 2 more record(s)"
        );
    }

    #[test]
    fn report_error_wraps_profile_error() {
        let err = ReportError::from(ProfileError::MalformedRecord {
            line: 2,
            text: "xyz".to_string(),
        });
        assert!(matches!(err, ReportError::Profile(_)));
        assert_eq!(err.to_string(), "profile error: line 2: malformed path record \"xyz\"");
    }

    #[test]
    fn unknown_function_names_the_ordinal() {
        let err = ReportError::UnknownFunction { id: FuncId(9) };
        assert_eq!(err.to_string(), "profile references unknown function id 9");
    }
}
