//! On-disk path profile: parsing and writing.
//!
//! The instrumented runtime dumps one text file per run. For every function
//! that executed at least one path it writes a header line
//! `<function-id> <record-count>` followed by that many record lines
//! `<path-id> <frequency>`, the path ID in fixed-width lowercase hex and the
//! frequency in decimal. Functions appear in ascending ordinal order and
//! records in descending frequency order, ties broken by descending path ID,
//! so repeated runs of the same binary diff cleanly.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use pathprof_cfg::FuncId;
use pathprof_core::PathId;
use serde::{Deserialize, Serialize};

use crate::error::ProfileError;

// ---------------------------------------------------------------------------
// Counter width
// ---------------------------------------------------------------------------

/// Width of the per-function path counter in the instrumented binary.
///
/// The counter starts as a machine word; a function whose path count exceeds
/// `u64::MAX` needs the doubled width, and its path IDs take 32 hex digits in
/// the profile instead of 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CounterWidth {
    U64,
    U128,
}

impl CounterWidth {
    /// Hex digits a full-width path ID occupies in the profile.
    pub fn hex_digits(self) -> usize {
        match self {
            CounterWidth::U64 => 16,
            CounterWidth::U128 => 32,
        }
    }

    /// Narrowest counter that can hold every path ID of a function with
    /// `num_paths` paths. IDs range over `0..num_paths`, so the count itself
    /// may exceed the largest ID by one.
    pub fn for_path_count(num_paths: u128) -> CounterWidth {
        if num_paths > u64::MAX as u128 {
            CounterWidth::U128
        } else {
            CounterWidth::U64
        }
    }
}

impl std::fmt::Display for CounterWidth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CounterWidth::U64 => write!(f, "64-bit"),
            CounterWidth::U128 => write!(f, "128-bit"),
        }
    }
}

// ---------------------------------------------------------------------------
// Profile data
// ---------------------------------------------------------------------------

/// One executed path: its ID and how many times it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathRecord {
    pub id: PathId,
    pub frequency: u64,
}

/// A parsed profile: executed-path records grouped by function ordinal.
///
/// Only functions that actually ran appear; a function with zero records is
/// dropped on read and skipped on write, matching what the runtime emits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    functions: IndexMap<FuncId, Vec<PathRecord>>,
}

impl Profile {
    /// Creates an empty profile.
    pub fn new() -> Self {
        Profile::default()
    }

    /// Appends a record for a function.
    pub fn add_record(&mut self, func: FuncId, record: PathRecord) {
        self.functions.entry(func).or_default().push(record);
    }

    /// Returns the records of one function, empty if it never ran.
    pub fn records(&self, func: FuncId) -> &[PathRecord] {
        self.functions
            .get(&func)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Iterates functions with their records, in insertion (= file) order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &[PathRecord])> {
        self.functions.iter().map(|(&f, v)| (f, v.as_slice()))
    }

    /// Returns the number of functions with at least one record.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Returns true if no function has records.
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    // -----------------------------------------------------------------------
    // Parsing
    // -----------------------------------------------------------------------

    /// Parses profile text. Any line that does not fit the format fails the
    /// whole profile; a file the runtime did not finish writing is worthless
    /// as measurement data.
    pub fn parse(text: &str) -> Result<Profile, ProfileError> {
        let mut profile = Profile::new();
        let mut lines = text.lines().enumerate();

        while let Some((idx, line)) = lines.next() {
            // Blank lines may separate functions or trail the file.
            if line.trim().is_empty() {
                continue;
            }
            let (func, count) = parse_header(idx + 1, line)?;
            let mut records = Vec::with_capacity(count);
            for taken in 0..count {
                let Some((idx, line)) = lines.next() else {
                    return Err(ProfileError::Truncated {
                        line: idx + 2 + taken,
                        missing: count - taken,
                    });
                };
                records.push(parse_record(idx + 1, line)?);
            }
            if !records.is_empty() {
                profile.functions.entry(func).or_default().extend(records);
            }
        }

        tracing::debug!(
            "parsed profile with records for {} function(s)",
            profile.function_count()
        );
        Ok(profile)
    }

    /// Reads and parses a profile file.
    pub fn load(path: impl AsRef<Path>) -> Result<Profile, ProfileError> {
        let text = fs::read_to_string(path)?;
        Profile::parse(&text)
    }

    // -----------------------------------------------------------------------
    // Writing
    // -----------------------------------------------------------------------

    /// Renders the profile in the runtime's dump format: functions in
    /// ascending ordinal order, records sorted by descending frequency with
    /// ties broken by descending path ID, IDs zero-padded to `width`.
    pub fn render(&self, width: CounterWidth) -> String {
        let digits = width.hex_digits();
        let mut funcs: Vec<FuncId> = self.functions.keys().copied().collect();
        funcs.sort();

        let mut out = String::new();
        for func in funcs {
            let records = self.records(func);
            if records.is_empty() {
                continue;
            }
            let mut records = records.to_vec();
            records.sort_by(|a, b| {
                b.frequency
                    .cmp(&a.frequency)
                    .then_with(|| b.id.cmp(&a.id))
            });

            let _ = writeln!(out, "{} {}", func, records.len());
            for record in records {
                let _ = writeln!(out, "{:0digits$x} {}", record.id, record.frequency);
            }
        }
        out
    }

    /// Renders and writes the profile to a file.
    pub fn save(&self, path: impl AsRef<Path>, width: CounterWidth) -> Result<(), ProfileError> {
        fs::write(path, self.render(width))?;
        Ok(())
    }
}

fn parse_header(line_no: usize, line: &str) -> Result<(FuncId, usize), ProfileError> {
    let malformed = || ProfileError::MalformedHeader {
        line: line_no,
        text: line.to_string(),
    };
    let mut tokens = line.split_whitespace();
    let func = tokens.next().ok_or_else(malformed)?;
    let count = tokens.next().ok_or_else(malformed)?;
    if tokens.next().is_some() {
        return Err(malformed());
    }
    let func: u32 = func.parse().map_err(|_| malformed())?;
    let count: usize = count.parse().map_err(|_| malformed())?;
    Ok((FuncId(func), count))
}

fn parse_record(line_no: usize, line: &str) -> Result<PathRecord, ProfileError> {
    let malformed = || ProfileError::MalformedRecord {
        line: line_no,
        text: line.to_string(),
    };
    let mut tokens = line.split_whitespace();
    let id = tokens.next().ok_or_else(malformed)?;
    let frequency = tokens.next().ok_or_else(malformed)?;
    if tokens.next().is_some() {
        return Err(malformed());
    }
    let id = PathId::from_str_radix(id, 16).map_err(|_| malformed())?;
    let frequency: u64 = frequency.parse().map_err(|_| malformed())?;
    Ok(PathRecord { id, frequency })
}
