//! # hostabi - Host-boundary passes for a WebAssembly-style IR
//!
//! Compiler passes that make a module safe to link against a JavaScript host, plus the
//! small tree IR they run on.
//!
//! ## Features
//!
//! - **Boundary legalization** - exports and imports that use `i64` or `f32` get legal
//!   stubs and wrappers; `i64` crosses as two `i32` halves with the high half carried
//!   through `tempRet0`
//! - **Host-math peephole** - `pow(x, 2.0)` becomes `x * x`, `pow(x, 0.5)` becomes `sqrt(x)`
//! - **Break-pointer patch** - the `emscripten_get_sbrk_ptr` import becomes a constant
//! - **Function-parallel walks** on a Rayon pool
//! - **Reference interpreter** for checking that rewritten modules compute the same values
//!
//! ## Quick Start
//!
//! ```rust
//! use hostabi::ir::{Builder, Export, Function, Module, ValueType};
//! use hostabi::passes::{PassOptions, PassRunner};
//!
//! # fn main() -> hostabi::Result<()> {
//! let mut module = Module::new();
//! module.add_function(Function::new(
//!     "id",
//!     vec![ValueType::I64],
//!     ValueType::I64,
//!     Builder::make_local_get(0, ValueType::I64),
//! ))?;
//! module.add_export(Export::function("id", "id"))?;
//!
//! let mut runner = PassRunner::new(PassOptions::default());
//! runner.add("legalize-js-interface")?;
//! runner.run(&mut module)?;
//!
//! let stub = module.get_function("legalize-export-stub$id").unwrap();
//! assert_eq!(stub.params, vec![ValueType::I32, ValueType::I32]);
//! assert_eq!(stub.result, ValueType::I32);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ir::Module ──▶ PassRunner ──▶ Pass (whole module, sequential)
//!                    │
//!                    └────────▶ FunctionPass (per function, optionally in parallel)
//! ```
//!
//! ### Main Components
//!
//! - [`ir`] - Expression trees, module containers, builder, walker, printer
//! - [`passes`] - Pass registry and runner, [`passes::LegalizeJsInterface`],
//!   [`passes::PostEmscripten`], [`passes::OptimizeCalls`]
//! - [`interp`] - Tree-walking interpreter with host closures
//! - [`error`] - Error types
//!
//! ## Logging
//!
//! Passes log through `tracing`. The library never installs a subscriber; whole-module
//! dumps after each pass are emitted at `trace` level.
//!
//! ## License
//!
//! Licensed under the [MIT License](https://opensource.org/licenses/MIT).

#![warn(missing_docs)]

/// Version of the hostabi crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod interp;
pub mod ir;
pub mod passes;

// Re-export main types
pub use error::{Error, ErrorSeverity, Result};
pub use interp::{HostImports, Interpreter};
pub use ir::Module;
pub use passes::{Pass, PassOptions, PassRunner};
