use crate::error::Result;
use crate::ir::Literal;
use std::collections::HashMap;
use std::fmt;

/// A host function: receives the call's arguments, returns its result (if any)
pub type HostFn = Box<dyn FnMut(&[Literal]) -> Result<Option<Literal>>>;

/// Host functions keyed by import `(module, base)`
#[derive(Default)]
pub struct HostImports {
    functions: HashMap<(String, String), HostFn>,
}

impl HostImports {
    /// Creates an empty import set
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `f` as `module.base`, replacing any earlier registration
    pub fn register<F>(&mut self, module: &str, base: &str, f: F) -> &mut Self
    where
        F: FnMut(&[Literal]) -> Result<Option<Literal>> + 'static,
    {
        self.functions
            .insert((module.to_string(), base.to_string()), Box::new(f));
        self
    }

    /// Look up a host function
    pub fn get_mut(&mut self, module: &str, base: &str) -> Option<&mut HostFn> {
        self.functions
            .get_mut(&(module.to_string(), base.to_string()))
    }

    /// Whether `module.base` is registered
    pub fn contains(&self, module: &str, base: &str) -> bool {
        self.functions
            .contains_key(&(module.to_string(), base.to_string()))
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for HostImports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self
            .functions
            .keys()
            .map(|(module, base)| format!("{}.{}", module, base))
            .collect();
        names.sort();
        f.debug_struct("HostImports").field("functions", &names).finish()
    }
}
