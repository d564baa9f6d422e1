//! Decoded path reports.
//!
//! [`decode_profile`] joins a parsed [`Profile`] with the module it was
//! measured from: every recorded path ID is decoded back into its block
//! sequence and classified, producing a [`ModuleReport`] that renders as
//! YAML-ish text or serializes to JSON.

use std::fmt;

use pathprof_cfg::{BlockId, FuncId, Function, Module, SourceLoc};
use pathprof_core::{Decoder, PathId, PathType};
use serde::Serialize;

use crate::error::ReportError;
use crate::profile::Profile;

/// One decoded path and how often it executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathReport {
    pub id: PathId,
    pub frequency: u64,
    pub path_type: PathType,
    /// Block labels in execution order. Empty when the recorded fragment
    /// carries no real blocks at all.
    pub blocks: Vec<String>,
    /// `file:line` positions of the blocks, consecutive duplicates collapsed.
    /// Blocks without debug info contribute nothing.
    pub source_lines: Vec<String>,
}

/// All recorded paths of one function, hottest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionReport {
    pub func: FuncId,
    pub name: String,
    /// `true` when the function's path space overflowed the counter. Its
    /// records cannot be decoded and `paths` stays empty.
    pub skipped: bool,
    pub paths: Vec<PathReport>,
}

/// Decoded report for a whole module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleReport {
    pub module: String,
    pub functions: Vec<FunctionReport>,
}

impl ModuleReport {
    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Decodes every record of `profile` against `module`.
///
/// Paths are ordered by descending frequency, ties broken by descending path
/// ID; functions by ordinal. Functions whose path space overflowed are
/// reported as skipped and their records dropped. Fails if the profile names
/// a function ordinal the module lacks or a path ID outside the function's
/// path space; both mean profile and module come from different builds.
pub fn decode_profile(module: &Module, profile: &Profile) -> Result<ModuleReport, ReportError> {
    tracing::info!(
        "decoding profile against module '{}': {} function(s) with records",
        module.name(),
        profile.function_count()
    );

    let mut functions = Vec::new();
    for (func, records) in profile.functions() {
        let f = module
            .function(func)
            .ok_or(ReportError::UnknownFunction { id: func })?;
        let mut decoder = Decoder::from_function(f)?;
        if !decoder.encoding().is_instrumentable() {
            tracing::warn!(
                "skipping function '{}': path count overflowed the counter, \
                 dropping {} record(s)",
                f.name(),
                records.len()
            );
            functions.push(FunctionReport {
                func,
                name: f.name().to_string(),
                skipped: true,
                paths: Vec::new(),
            });
            continue;
        }

        let mut paths = Vec::with_capacity(records.len());
        for record in records {
            let decoded = decoder.decode(record.id)?;
            paths.push(PathReport {
                id: record.id,
                frequency: record.frequency,
                path_type: decoded.path_type,
                blocks: block_labels(f, &decoded.blocks),
                source_lines: source_lines(f, &decoded.blocks),
            });
        }
        paths.sort_by(|a, b| {
            b.frequency
                .cmp(&a.frequency)
                .then_with(|| b.id.cmp(&a.id))
        });

        tracing::debug!("decoded {} path(s) for function '{}'", paths.len(), f.name());
        functions.push(FunctionReport {
            func,
            name: f.name().to_string(),
            skipped: false,
            paths,
        });
    }
    functions.sort_by_key(|f| f.func);

    Ok(ModuleReport {
        module: module.name().to_string(),
        functions,
    })
}

fn block_labels(f: &Function, blocks: &[BlockId]) -> Vec<String> {
    blocks
        .iter()
        .map(|&b| {
            f.block(b)
                .map(|blk| blk.label.clone())
                .unwrap_or_else(|| format!("b{}", b.0))
        })
        .collect()
}

fn source_lines(f: &Function, blocks: &[BlockId]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut last: Option<&SourceLoc> = None;
    for &b in blocks {
        let Some(block) = f.block(b) else { continue };
        let Some(loc) = block.source.as_ref() else { continue };
        if last != Some(loc) {
            lines.push(loc.to_string());
            last = Some(loc);
        }
    }
    lines
}

impl fmt::Display for ModuleReport {
    fn fmt(&self, out: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(out, "# Decoded Paths ({})", self.module)?;
        for func in &self.functions {
            writeln!(out, "- name: {}", func.name)?;
            if func.skipped {
                writeln!(out, "  skipped: path space overflow")?;
                continue;
            }
            writeln!(out, "  num_exec_paths: {}", func.paths.len())?;
            for path in &func.paths {
                writeln!(out, "  - path: {:x}", path.id)?;
                writeln!(out, "    freq: {}", path.frequency)?;
                writeln!(out, "    type: {}", path.path_type)?;
                writeln!(out, "    blocks: [{}]", path.blocks.join(", "))?;
                if !path.source_lines.is_empty() {
                    writeln!(out, "    source:")?;
                    for line in &path.source_lines {
                        writeln!(out, "      - {line}")?;
                    }
                }
            }
        }
        Ok(())
    }
}
