//! Per-function instrumentation summaries.
//!
//! [`summarize`] encodes every function of a module and reports what an
//! instrumenter would do with it: how many paths it has, whether it can be
//! instrumented at all (overflowed path spaces cannot), how many counter
//! increments and counter log calls it needs, and whether its path ids fit a
//! 64-bit counter. This is the all-functions overview a user reads to see
//! which functions were excluded and why.

use std::fmt;

use pathprof_cfg::{FuncId, Function, Module};
use pathprof_core::{encode, Encoding, PathId};
use serde::Serialize;

use crate::error::ReportError;
use crate::profile::CounterWidth;

/// What instrumenting one function involves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionSummary {
    pub func: FuncId,
    pub name: String,
    /// Total paths through the function. Zero when the path space
    /// overflowed the 128-bit counter.
    pub num_paths: PathId,
    /// `false` when the function must be skipped entirely.
    pub instrumentable: bool,
    /// Counter increments to insert: one per weighted real edge plus one per
    /// non-zero fake half of a segment pair. Zero for skipped functions.
    pub increment_sites: usize,
    /// Counter log calls to insert: one per segment pair plus one per exit
    /// block. Zero for skipped functions.
    pub log_sites: usize,
    /// `true` when path ids exceed `u64::MAX`, forcing 128-bit counters.
    pub needs_wide_counter: bool,
}

/// Instrumentation summary for every function of a module, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleSummary {
    pub module: String,
    pub functions: Vec<FunctionSummary>,
}

impl ModuleSummary {
    /// Narrowest counter width that accommodates every instrumentable
    /// function of the module.
    pub fn counter_width(&self) -> CounterWidth {
        if self.functions.iter().any(|f| f.needs_wide_counter) {
            CounterWidth::U128
        } else {
            CounterWidth::U64
        }
    }

    /// Functions whose path space overflowed, in ordinal order.
    pub fn skipped(&self) -> impl Iterator<Item = &FunctionSummary> {
        self.functions.iter().filter(|f| !f.instrumentable)
    }

    /// Serializes the summary as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Encodes every function of `module` and summarizes its instrumentation.
///
/// Overflowed functions are reported as skipped and do not fail the run;
/// their siblings are summarized normally.
pub fn summarize(module: &Module) -> Result<ModuleSummary, ReportError> {
    let mut functions = Vec::with_capacity(module.function_count());
    for (func, f) in module.iter() {
        let enc = encode(f)?;
        if !enc.is_instrumentable() {
            tracing::warn!(
                "skipping function '{}': path count overflowed the counter",
                f.name()
            );
            functions.push(FunctionSummary {
                func,
                name: f.name().to_string(),
                num_paths: 0,
                instrumentable: false,
                increment_sites: 0,
                log_sites: 0,
                needs_wide_counter: false,
            });
            continue;
        }

        let num_paths = enc.num_paths();
        functions.push(FunctionSummary {
            func,
            name: f.name().to_string(),
            num_paths,
            instrumentable: true,
            increment_sites: increment_sites(&enc),
            log_sites: enc.segments().len() + exit_blocks(f)?,
            needs_wide_counter: CounterWidth::for_path_count(num_paths) == CounterWidth::U128,
        });
    }

    Ok(ModuleSummary {
        module: module.name().to_string(),
        functions,
    })
}

/// Counts the counter increments instrumentation inserts. Every entry of
/// `weights()` is one; each segment pair adds up to two more, one per fake
/// half that carries a non-zero weight (zero increments are never inserted).
fn increment_sites(enc: &Encoding) -> usize {
    let graph = enc.graph();
    let mut sites = enc.weights().len();
    for &(to_exit, from_entry) in enc.segments().values() {
        sites += usize::from(graph[to_exit] != 0);
        sites += usize::from(graph[from_entry] != 0);
    }
    sites
}

/// Counts the blocks with no outgoing branches; each gets one log call.
fn exit_blocks(f: &Function) -> Result<usize, ReportError> {
    let mut count = 0;
    for block in f.blocks() {
        if f.is_exit(block)? {
            count += 1;
        }
    }
    Ok(count)
}

impl fmt::Display for ModuleSummary {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "# Instrumented Functions ({})", self.module)?;
        for func in &self.functions {
            writeln!(out, "- name: {}", func.name)?;
            writeln!(out, "  num_paths: {}", func.num_paths)?;
            if func.instrumentable {
                writeln!(out, "  num_inst_inc: {}", func.increment_sites)?;
                writeln!(out, "  num_inst_log: {}", func.log_sites)?;
                if func.needs_wide_counter {
                    writeln!(out, "  counter: {}", CounterWidth::U128)?;
                }
            } else {
                writeln!(out, "  skipped: path space overflow")?;
            }
        }
        Ok(())
    }
}
