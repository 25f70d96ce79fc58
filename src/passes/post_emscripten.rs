//! Cleanups that run after the toolchain's own lowering
//!
//! [`PostEmscripten`] patches the memory-break pointer accessor when its value is known
//! ahead of time, then runs [`OptimizeCalls`] to strength-reduce calls into the host's
//! math library.

use super::names::{WellKnownImport, SBRK_PTR_ARGUMENT};
use super::{Pass, PassRunner};
use crate::error::{Error, Result};
use crate::ir::{
    BinaryOp, Builder, Call, Expression, FunctionPass, FunctionScope, Literal, Localizer, Module,
    UnaryOp, Visitor,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Break-pointer patch followed by the host-math peephole
#[derive(Debug, Default)]
pub struct PostEmscripten {
    patched_sbrk: bool,
}

impl PostEmscripten {
    /// Create the pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the last run replaced the break-pointer import
    pub fn patched_sbrk(&self) -> bool {
        self.patched_sbrk
    }
}

impl Pass for PostEmscripten {
    fn name(&self) -> &'static str {
        "post-emscripten"
    }

    fn run(&mut self, runner: &PassRunner, module: &mut Module) -> Result<()> {
        self.patched_sbrk = false;
        if let Some(ptr) = parse_sbrk_ptr(runner)? {
            self.patched_sbrk = apply_sbrk_ptr(module, ptr);
            if self.patched_sbrk {
                tracing::debug!(ptr, "patched break pointer accessor");
            } else {
                tracing::trace!("no break pointer import to patch");
            }
        }

        runner.nested().run_function_pass(OptimizeCalls::new(), module)
    }
}

/// The break-pointer argument, if set. Empty means unset.
fn parse_sbrk_ptr(runner: &PassRunner) -> Result<Option<i32>> {
    let value = runner
        .options()
        .get_argument_or_default(SBRK_PTR_ARGUMENT, "");
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i32>()
        .map(Some)
        .map_err(|e| Error::InvalidArgument {
            name: SBRK_PTR_ARGUMENT.to_string(),
            value: value.clone(),
            reason: e.to_string(),
        })
}

/// Turn the imported break-pointer accessor into a function returning `ptr`.
///
/// Returns whether an import was found.
pub fn apply_sbrk_ptr(module: &mut Module, ptr: i32) -> bool {
    let Some(name) = WellKnownImport::GetSbrkPtr
        .find(module)
        .map(|func| func.name.clone())
    else {
        return false;
    };
    let Some(func) = module.get_function_mut(&name) else {
        return false;
    };
    func.import = None;
    func.type_name = None;
    func.body = Some(Builder::make_const(Literal::I32(ptr)));
    true
}

/// Strength-reduces calls into the host's math imports:
///
/// - `pow(x, 2.0)` becomes `x * x`, with `x` evaluated once through a fresh local
/// - `pow(x, 0.5)` becomes `sqrt(x)`
#[derive(Debug, Clone, Default)]
pub struct OptimizeCalls {
    math_imports: Arc<HashMap<String, WellKnownImport>>,
}

impl OptimizeCalls {
    /// Create the pass; host-math imports are resolved in [`FunctionPass::prepare`]
    pub fn new() -> Self {
        Self::default()
    }

    fn is_pow(&self, target: &str) -> bool {
        self.math_imports.get(target) == Some(&WellKnownImport::MathPow)
    }
}

impl Visitor for OptimizeCalls {
    fn visit_call(&mut self, call: &mut Call, scope: &mut FunctionScope<'_>) -> Option<Expression> {
        if !self.is_pow(&call.target) || call.operands.len() != 2 {
            return None;
        }
        let exponent = match call.operands[1].as_const() {
            Some(Literal::F64(exponent)) => *exponent,
            _ => return None,
        };

        if Literal::F64(exponent) == Literal::F64(2.0) {
            let base = call.operands.swap_remove(0);
            let localized = Localizer::new(base, scope);
            let get = localized.get();
            Some(Builder::make_binary(BinaryOp::MulFloat64, localized.expr, get))
        } else if Literal::F64(exponent) == Literal::F64(0.5) {
            let base = call.operands.swap_remove(0);
            Some(Builder::make_unary(UnaryOp::SqrtFloat64, base))
        } else {
            None
        }
    }
}

impl FunctionPass for OptimizeCalls {
    fn name(&self) -> &'static str {
        "optimize-host-math"
    }

    fn is_function_parallel(&self) -> bool {
        true
    }

    fn prepare(&mut self, module: &Module) {
        let math_imports: HashMap<String, WellKnownImport> = module
            .functions()
            .iter()
            .filter_map(|func| {
                WellKnownImport::of(func)
                    .filter(|import| import.is_host_math())
                    .map(|import| (func.name.clone(), import))
            })
            .collect();
        tracing::trace!(count = math_imports.len(), "resolved host math imports");
        self.math_imports = Arc::new(math_imports);
    }

    fn create(&self) -> Self {
        self.clone()
    }
}
