//! Module container: functions, signatures, globals, exports and the table

use super::expression::Expression;
use super::types::{is_illegal_signature, FunctionType, ValueType};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// `(module, base)` pair naming a host import
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportName {
    /// Import namespace, e.g. `env`
    pub module: String,
    /// Name inside the namespace
    pub base: String,
}

impl ImportName {
    /// Create an import name
    pub fn new(module: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            base: base.into(),
        }
    }
}

/// A function, either defined (has a body) or imported (has an import marker)
#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    /// Unique function name
    pub name: String,
    /// Parameter types; params occupy local indices `0..params.len()`
    pub params: Vec<ValueType>,
    /// Result type
    pub result: ValueType,
    /// Additional locals, indexed after the params
    pub vars: Vec<ValueType>,
    /// Body, absent for imports
    pub body: Option<Expression>,
    /// Import marker
    pub import: Option<ImportName>,
    /// Explicit signature name, if the function references a [`FunctionType`]
    pub type_name: Option<String>,
}

impl Function {
    /// Create a defined function
    pub fn new(
        name: impl Into<String>,
        params: Vec<ValueType>,
        result: ValueType,
        body: Expression,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            result,
            vars: Vec::new(),
            body: Some(body),
            import: None,
            type_name: None,
        }
    }

    /// Create an imported function
    pub fn import(
        name: impl Into<String>,
        module: impl Into<String>,
        base: impl Into<String>,
        params: Vec<ValueType>,
        result: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            params,
            result,
            vars: Vec::new(),
            body: None,
            import: Some(ImportName::new(module, base)),
            type_name: None,
        }
    }

    /// Whether this function is resolved by the host
    pub fn is_imported(&self) -> bool {
        self.import.is_some()
    }

    /// Whether the signature contains a type the host cannot pass
    pub fn has_illegal_signature(&self) -> bool {
        is_illegal_signature(&self.params, self.result)
    }
}

/// Kind of entity an export refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalKind {
    /// Function export
    Function,
    /// Table export
    Table,
    /// Memory export
    Memory,
    /// Global export
    Global,
}

/// Host-visible export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Unique host-visible name
    pub name: String,
    /// Internal entity name
    pub value: String,
    /// Entity kind
    pub kind: ExternalKind,
}

impl Export {
    /// Function export
    pub fn function(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            kind: ExternalKind::Function,
        }
    }
}

/// Module global
#[derive(Debug, Clone, PartialEq)]
pub struct Global {
    /// Unique name
    pub name: String,
    /// Value type
    pub ty: ValueType,
    /// Initializer
    pub init: Expression,
    /// Whether `global.set` may target it
    pub mutable: bool,
}

/// Element segment of the function table
#[derive(Debug, Clone, PartialEq)]
pub struct TableSegment {
    /// Start offset
    pub offset: Expression,
    /// Function names, in slot order
    pub data: Vec<String>,
}

/// Function table used by indirect calls
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Element segments
    pub segments: Vec<TableSegment>,
}

/// Compilation unit
#[derive(Debug, Clone, Default)]
pub struct Module {
    functions: Vec<Function>,
    /// Named signatures
    pub function_types: Vec<FunctionType>,
    /// Globals
    pub globals: Vec<Global>,
    /// Exports
    pub exports: Vec<Export>,
    /// Function table
    pub table: Table,
    function_map: HashMap<String, usize>,
}

impl Module {
    /// Create an empty module
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a function; its name must be unused
    pub fn add_function(&mut self, func: Function) -> Result<()> {
        if self.function_map.contains_key(&func.name) {
            return Err(Error::DuplicateName {
                kind: "function",
                name: func.name,
            });
        }
        self.function_map.insert(func.name.clone(), self.functions.len());
        self.functions.push(func);
        Ok(())
    }

    /// Add a named signature; its name must be unused
    pub fn add_function_type(&mut self, ty: FunctionType) -> Result<()> {
        if self.get_function_type(&ty.name).is_some() {
            return Err(Error::DuplicateName {
                kind: "type",
                name: ty.name,
            });
        }
        self.function_types.push(ty);
        Ok(())
    }

    /// Add a global; its name must be unused
    pub fn add_global(&mut self, global: Global) -> Result<()> {
        if self.get_global(&global.name).is_some() {
            return Err(Error::DuplicateName {
                kind: "global",
                name: global.name,
            });
        }
        self.globals.push(global);
        Ok(())
    }

    /// Add an export; its name must be unused
    pub fn add_export(&mut self, export: Export) -> Result<()> {
        if self.get_export(&export.name).is_some() {
            return Err(Error::DuplicateName {
                kind: "export",
                name: export.name,
            });
        }
        self.exports.push(export);
        Ok(())
    }

    /// Functions in definition order
    pub fn functions(&self) -> &[Function] {
        &self.functions
    }

    /// Functions in definition order, for in-place rewriting. Names must not change.
    pub fn functions_mut(&mut self) -> &mut [Function] {
        &mut self.functions
    }

    /// Look up a function by name
    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.function_map.get(name).map(|&i| &self.functions[i])
    }

    /// Look up a function by name for mutation
    pub fn get_function_mut(&mut self, name: &str) -> Option<&mut Function> {
        match self.function_map.get(name) {
            Some(&i) => Some(&mut self.functions[i]),
            None => None,
        }
    }

    /// Look up a signature by name
    pub fn get_function_type(&self, name: &str) -> Option<&FunctionType> {
        self.function_types.iter().find(|t| t.name == name)
    }

    /// Look up a global by name
    pub fn get_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|g| g.name == name)
    }

    /// Look up an export by host-visible name
    pub fn get_export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Remove a function, returning it
    pub fn remove_function(&mut self, name: &str) -> Result<Function> {
        let index = self
            .function_map
            .remove(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        let removed = self.functions.remove(index);
        self.update_function_map();
        Ok(removed)
    }

    /// The function imported as `module.base`, if any
    pub fn imported_function(&self, module: &str, base: &str) -> Option<&Function> {
        self.functions.iter().find(|f| {
            f.import
                .as_ref()
                .is_some_and(|im| im.module == module && im.base == base)
        })
    }

    /// Snapshot of all function names, in definition order
    pub fn function_names(&self) -> Vec<String> {
        self.functions.iter().map(|f| f.name.clone()).collect()
    }

    fn update_function_map(&mut self) {
        self.function_map = self
            .functions
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
    }
}
