//! Post-order tree walker over the closed expression union
//!
//! A [`Visitor`] sees every node after its children. Returning `Some(expr)` from a
//! visit method replaces the current node in its parent; the replacement is not
//! walked again.

use super::builder::Builder;
use super::expression::{Call, Expression, Index};
use super::module::{Function, Module};
use super::types::ValueType;

/// The function whose body is being walked
pub struct FunctionScope<'a> {
    /// Function name
    pub name: &'a str,
    /// Parameter types
    pub params: &'a [ValueType],
    /// Extra locals; visitors may append to it
    pub vars: &'a mut Vec<ValueType>,
}

impl FunctionScope<'_> {
    /// Add a fresh local of type `ty`
    pub fn add_var(&mut self, ty: ValueType) -> Index {
        Builder::add_var(self.params, self.vars, ty)
    }
}

/// Per-node callbacks
pub trait Visitor {
    /// Called for every `Call` node
    fn visit_call(
        &mut self,
        _call: &mut Call,
        _scope: &mut FunctionScope<'_>,
    ) -> Option<Expression> {
        None
    }

    /// Called for every node the kind-specific method did not replace
    fn visit_expression(
        &mut self,
        _expr: &mut Expression,
        _scope: &mut FunctionScope<'_>,
    ) -> Option<Expression> {
        None
    }
}

/// Walk one expression tree
pub fn walk_expression<V: Visitor + ?Sized>(
    expr: &mut Expression,
    visitor: &mut V,
    scope: &mut FunctionScope<'_>,
) {
    for child in expr.children_mut() {
        walk_expression(child, visitor, scope);
    }

    let replacement = match expr {
        Expression::Call(call) => visitor.visit_call(call, scope),
        _ => None,
    };
    let replacement = match replacement {
        Some(new) => Some(new),
        None => visitor.visit_expression(expr, scope),
    };
    if let Some(new) = replacement {
        *expr = new;
    }
}

/// Walk the body of one function; imports have no body and are skipped
pub fn walk_function<V: Visitor + ?Sized>(func: &mut Function, visitor: &mut V) {
    let Function {
        name,
        params,
        vars,
        body,
        ..
    } = func;
    if let Some(body) = body {
        let mut scope = FunctionScope {
            name: name.as_str(),
            params: params.as_slice(),
            vars,
        };
        walk_expression(body, visitor, &mut scope);
    }
}

/// Walk every defined function in order
pub fn walk_module<V: Visitor + ?Sized>(module: &mut Module, visitor: &mut V) {
    for func in module.functions_mut() {
        walk_function(func, visitor);
    }
}

/// A visitor that runs as a pass over each function body
///
/// Function-parallel passes get one instance per worker via [`create`](Self::create).
/// Anything they need from the module is resolved up front in
/// [`prepare`](Self::prepare), because workers only see their own function.
pub trait FunctionPass: Visitor + Send {
    /// Pass name for logs
    fn name(&self) -> &'static str;

    /// Whether function bodies can be rewritten independently and concurrently
    fn is_function_parallel(&self) -> bool {
        false
    }

    /// Resolve module-level context before any function is walked
    fn prepare(&mut self, _module: &Module) {}

    /// A fresh instance sharing the prepared context
    fn create(&self) -> Self
    where
        Self: Sized;
}
