//! FILENAME: engine/src/functions.rs
//! PURPOSE: Registry of host functions reachable from templates.
//! CONTEXT: Templates cannot execute arbitrary host code. A `[@module.fn(args)@]`
//! tag, or a call inside any other expression, only reaches host code that
//! the caller registered here under its dotted name.

use crate::evaluator::EvalResult;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A host function: receives already-evaluated arguments.
pub type HostFunction = Arc<dyn Fn(&[EvalResult]) -> EvalResult + Send + Sync>;

#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, HostFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// Registers `f` under `name`. Names are case-insensitive.
    pub fn register<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&[EvalResult]) -> EvalResult + Send + Sync + 'static,
    {
        self.functions.insert(name.to_uppercase(), Arc::new(f));
    }

    pub fn get(&self, name: &str) -> Option<&HostFunction> {
        self.functions.get(&name.to_uppercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry").field("functions", &names).finish()
    }
}
