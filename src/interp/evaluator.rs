use super::host::HostImports;
use crate::error::{Error, Result};
use crate::ir::{BinaryOp, Expression, Function, Literal, Module, UnaryOp, ValueType};
use std::collections::HashMap;

/// Default limit on nested calls before execution traps
pub const DEFAULT_MAX_CALL_DEPTH: usize = 256;

/// Tree-walking interpreter over a module
///
/// Globals are initialized from their constant init expressions when the interpreter is
/// created and persist across calls. Locals start at zero. Integer arithmetic wraps.
pub struct Interpreter<'m> {
    module: &'m Module,
    host: HostImports,
    globals: HashMap<String, Literal>,
    depth: usize,
    max_depth: usize,
}

impl<'m> Interpreter<'m> {
    /// Creates an interpreter; fails if a global initializer is not a constant
    pub fn new(module: &'m Module, host: HostImports) -> Result<Self> {
        let mut globals = HashMap::new();
        for global in &module.globals {
            let value = global.init.as_const().copied().ok_or_else(|| {
                Error::trap(format!("global {} has a non-constant initializer", global.name))
            })?;
            globals.insert(global.name.clone(), value);
        }
        Ok(Self {
            module,
            host,
            globals,
            depth: 0,
            max_depth: DEFAULT_MAX_CALL_DEPTH,
        })
    }

    /// Override the call depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Current value of a global
    pub fn global(&self, name: &str) -> Option<Literal> {
        self.globals.get(name).copied()
    }

    /// Call the function exported as `name`
    pub fn call_export(&mut self, name: &str, args: &[Literal]) -> Result<Option<Literal>> {
        let target = self
            .module
            .get_export(name)
            .map(|export| export.value.clone())
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        self.call(&target, args)
    }

    /// Call a function by internal name
    pub fn call(&mut self, name: &str, args: &[Literal]) -> Result<Option<Literal>> {
        let module = self.module;
        let func = module
            .get_function(name)
            .ok_or_else(|| Error::UnknownFunction(name.to_string()))?;
        check_arguments(func, args)?;

        if self.depth >= self.max_depth {
            return Err(Error::trap(format!(
                "call stack exhausted at depth {} calling {}",
                self.depth, name
            )));
        }
        self.depth += 1;
        let result = self.invoke(func, args);
        self.depth -= 1;

        let result = result?;
        let result_ty = result.map(|v| v.ty()).unwrap_or(ValueType::None);
        if result_ty != func.result {
            return Err(Error::trap(format!(
                "{} returned {} but is declared to return {}",
                name, result_ty, func.result
            )));
        }
        Ok(result)
    }

    fn invoke(&mut self, func: &'m Function, args: &[Literal]) -> Result<Option<Literal>> {
        if let Some(import) = &func.import {
            tracing::trace!(module = %import.module, base = %import.base, "host call");
            let host = self
                .host
                .get_mut(&import.module, &import.base)
                .ok_or_else(|| Error::UnresolvedImport {
                    module: import.module.clone(),
                    base: import.base.clone(),
                })?;
            return (*host)(args);
        }

        let mut locals: Vec<Literal> = args.to_vec();
        for &ty in &func.vars {
            let zero = Literal::zero(ty)
                .ok_or_else(|| Error::trap(format!("local of type {} in {}", ty, func.name)))?;
            locals.push(zero);
        }
        match &func.body {
            Some(body) => self.eval(body, &mut locals),
            None => Ok(None),
        }
    }

    fn eval(&mut self, expr: &'m Expression, locals: &mut Vec<Literal>) -> Result<Option<Literal>> {
        match expr {
            Expression::Nop => Ok(None),
            Expression::Const(lit) => Ok(Some(*lit)),
            Expression::LocalGet { index, .. } => locals
                .get(*index as usize)
                .copied()
                .map(Some)
                .ok_or_else(|| Error::trap(format!("local {} out of range", index))),
            Expression::LocalSet { index, value, tee } => {
                let value = self.eval_value(value, locals)?;
                let slot = locals
                    .get_mut(*index as usize)
                    .ok_or_else(|| Error::trap(format!("local {} out of range", index)))?;
                *slot = value;
                Ok(if *tee { Some(value) } else { None })
            }
            Expression::GlobalGet { name, .. } => self
                .globals
                .get(name)
                .copied()
                .map(Some)
                .ok_or_else(|| Error::trap(format!("unknown global {}", name))),
            Expression::GlobalSet { name, value } => {
                let value = self.eval_value(value, locals)?;
                let slot = self
                    .globals
                    .get_mut(name)
                    .ok_or_else(|| Error::trap(format!("unknown global {}", name)))?;
                *slot = value;
                Ok(None)
            }
            Expression::Unary { op, value } => {
                let value = self.eval_value(value, locals)?;
                apply_unary(*op, value).map(Some)
            }
            Expression::Binary { op, left, right } => {
                let left = self.eval_value(left, locals)?;
                let right = self.eval_value(right, locals)?;
                apply_binary(*op, left, right).map(Some)
            }
            Expression::Call(call) => {
                let mut args = Vec::with_capacity(call.operands.len());
                for operand in &call.operands {
                    args.push(self.eval_value(operand, locals)?);
                }
                self.call(&call.target, &args)
            }
            Expression::Block { list, .. } => {
                let mut last = None;
                for child in list {
                    last = self.eval(child, locals)?;
                }
                Ok(last)
            }
            Expression::Drop(value) => {
                self.eval(value, locals)?;
                Ok(None)
            }
        }
    }

    fn eval_value(&mut self, expr: &'m Expression, locals: &mut Vec<Literal>) -> Result<Literal> {
        self.eval(expr, locals)?
            .ok_or_else(|| Error::trap("expected a value, found none"))
    }
}

fn check_arguments(func: &Function, args: &[Literal]) -> Result<()> {
    if args.len() != func.params.len() {
        return Err(Error::trap(format!(
            "{} expects {} arguments, got {}",
            func.name,
            func.params.len(),
            args.len()
        )));
    }
    for (i, (arg, &param)) in args.iter().zip(&func.params).enumerate() {
        if arg.ty() != param {
            return Err(Error::trap(format!(
                "{} argument {} is {}, expected {}",
                func.name,
                i,
                arg.ty(),
                param
            )));
        }
    }
    Ok(())
}

fn apply_unary(op: UnaryOp, value: Literal) -> Result<Literal> {
    let result = match (op, value) {
        (UnaryOp::ExtendUInt32, Literal::I32(v)) => Literal::I64(v as u32 as i64),
        (UnaryOp::ExtendSInt32, Literal::I32(v)) => Literal::I64(v as i64),
        (UnaryOp::WrapInt64, Literal::I64(v)) => Literal::I32(v as i32),
        (UnaryOp::PromoteFloat32, Literal::F32(v)) => Literal::F64(v as f64),
        (UnaryOp::DemoteFloat64, Literal::F64(v)) => Literal::F32(v as f32),
        (UnaryOp::SqrtFloat32, Literal::F32(v)) => Literal::F32(v.sqrt()),
        (UnaryOp::SqrtFloat64, Literal::F64(v)) => Literal::F64(v.sqrt()),
        (UnaryOp::NegFloat64, Literal::F64(v)) => Literal::F64(-v),
        (op, value) => {
            return Err(Error::trap(format!(
                "{} applied to {}",
                op.as_str(),
                value.ty()
            )))
        }
    };
    Ok(result)
}

fn apply_binary(op: BinaryOp, left: Literal, right: Literal) -> Result<Literal> {
    use BinaryOp::*;
    use Literal::{F32, F64, I32, I64};

    let result = match (op, left, right) {
        (AddInt32, I32(a), I32(b)) => I32(a.wrapping_add(b)),
        (SubInt32, I32(a), I32(b)) => I32(a.wrapping_sub(b)),
        (MulInt32, I32(a), I32(b)) => I32(a.wrapping_mul(b)),
        (AndInt32, I32(a), I32(b)) => I32(a & b),
        (OrInt32, I32(a), I32(b)) => I32(a | b),
        (AddInt64, I64(a), I64(b)) => I64(a.wrapping_add(b)),
        (SubInt64, I64(a), I64(b)) => I64(a.wrapping_sub(b)),
        (MulInt64, I64(a), I64(b)) => I64(a.wrapping_mul(b)),
        (AndInt64, I64(a), I64(b)) => I64(a & b),
        (OrInt64, I64(a), I64(b)) => I64(a | b),
        // Shift counts are taken modulo 64.
        (ShlInt64, I64(a), I64(b)) => I64(a.wrapping_shl(b as u32)),
        (ShrUInt64, I64(a), I64(b)) => I64((a as u64).wrapping_shr(b as u32) as i64),
        (AddFloat32, F32(a), F32(b)) => F32(a + b),
        (MulFloat32, F32(a), F32(b)) => F32(a * b),
        (AddFloat64, F64(a), F64(b)) => F64(a + b),
        (SubFloat64, F64(a), F64(b)) => F64(a - b),
        (MulFloat64, F64(a), F64(b)) => F64(a * b),
        (DivFloat64, F64(a), F64(b)) => F64(a / b),
        (op, left, right) => {
            return Err(Error::trap(format!(
                "{} applied to {} and {}",
                op.as_str(),
                left.ty(),
                right.ty()
            )))
        }
    };
    Ok(result)
}
