//! Module-level function list.
//!
//! [`Module`] owns the functions of one translation unit. A function's
//! [`FuncId`] is its 0-based position in this list -- the same ordinal the
//! instrumented runtime writes into profile records, so profile decoding can
//! map records back to functions without a name table.

use serde::{Deserialize, Serialize};

use crate::error::CfgError;
use crate::function::Function;
use crate::id::FuncId;

/// An ordered collection of functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Module {
    /// Module name, used in reports.
    name: String,
    /// Functions in definition order. Position is identity.
    functions: Vec<Function>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: &str) -> Self {
        Module {
            name: name.to_string(),
            functions: Vec::new(),
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends a function and returns its ordinal ID.
    pub fn add_function(&mut self, function: Function) -> FuncId {
        let id = FuncId(self.functions.len() as u32);
        self.functions.push(function);
        id
    }

    /// Looks up a function by ordinal.
    pub fn function(&self, id: FuncId) -> Option<&Function> {
        self.functions.get(id.0 as usize)
    }

    /// Looks up a function by ordinal, erroring if absent.
    pub fn get(&self, id: FuncId) -> Result<&Function, CfgError> {
        self.function(id).ok_or(CfgError::FunctionNotFound { id })
    }

    /// Returns the number of functions.
    pub fn function_count(&self) -> usize {
        self.functions.len()
    }

    /// Iterates functions with their ordinals, in definition order.
    pub fn iter(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i as u32), f))
    }
}
