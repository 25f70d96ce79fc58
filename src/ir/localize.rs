//! Materialize a subexpression into a local so it can be read more than once

use super::builder::Builder;
use super::expression::{Expression, Index};
use super::walker::FunctionScope;

/// An expression rewritten to store its value into local `index` as it is evaluated.
///
/// Place `expr` where the value is first needed, then read the value again with
/// `local.get index`; the original side effects happen exactly once.
#[derive(Debug)]
pub struct Localizer {
    /// Local holding the value
    pub index: Index,
    /// `local.tee index, <original>`
    pub expr: Expression,
}

impl Localizer {
    /// Tee `expr` into a fresh local of its type
    pub fn new(expr: Expression, scope: &mut FunctionScope<'_>) -> Self {
        let index = scope.add_var(expr.ty());
        Self {
            index,
            expr: Builder::make_local_tee(index, expr),
        }
    }

    /// `local.get` of the materialized value
    pub fn get(&self) -> Expression {
        Builder::make_local_get(self.index, self.expr.ty())
    }
}
