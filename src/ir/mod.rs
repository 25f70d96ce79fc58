//! # Tree-structured IR
//!
//! The passes in this crate operate on a small WebAssembly-style IR: every function
//! body is an owned tree of expressions, functions and signatures are named, and the
//! module owns everything for the lifetime of a compilation unit.
//!
//! ## Module Structure
//!
//! ```text
//! ir/
//! ├── mod.rs          # This file - module definition and re-exports
//! ├── types.rs        # ValueType, FunctionType, host legality
//! ├── expression.rs   # Literal, UnaryOp, BinaryOp, Call, Expression
//! ├── module.rs       # Function, Export, Global, Table, Module
//! ├── builder.rs      # Builder node factories, I64Utilities
//! ├── localize.rs     # Localizer (evaluate once, read many)
//! ├── walker.rs       # Visitor, FunctionScope, FunctionPass, walk_*
//! └── printer.rs      # Display impls (S-expression text)
//! ```
//!
//! ## Key Types
//!
//! - [`Expression`] - Closed tagged union of node kinds
//! - [`Module`] - Functions, signatures, globals, exports and the function table
//! - [`Builder`] - Factory for well-typed nodes
//! - [`Visitor`] - Post-order callbacks with in-place replacement

mod builder;
mod expression;
mod localize;
mod module;
mod printer;
mod types;
mod walker;

// Re-export all public types
pub use builder::{Builder, I64Utilities};
pub use expression::{BinaryOp, Call, Expression, Index, Literal, UnaryOp};
pub use localize::Localizer;
pub use module::{
    Export, ExternalKind, Function, Global, ImportName, Module, Table, TableSegment,
};
pub use types::{is_illegal_signature, FunctionType, ValueType};
pub use walker::{
    walk_expression, walk_function, walk_module, FunctionPass, FunctionScope, Visitor,
};
