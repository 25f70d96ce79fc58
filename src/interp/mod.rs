//! Reference interpreter for the IR
//!
//! Executes functions of a [`Module`](crate::ir::Module) directly from the tree, with
//! host imports supplied as closures. It exists to check that rewritten modules compute
//! the same values as the originals, not to be fast.

mod evaluator;
mod host;

pub use evaluator::{Interpreter, DEFAULT_MAX_CALL_DEPTH};
pub use host::{HostFn, HostImports};
