//! Node factories
//!
//! [`Builder`] constructs well-typed expression nodes so that passes never assemble
//! variants by hand. [`I64Utilities`] splits and recombines 64-bit integers into
//! 32-bit halves, the building block of host-boundary legalization.

use super::expression::{BinaryOp, Call, Expression, Index, Literal, UnaryOp};
use super::module::Global;
use super::types::ValueType;

/// Expression node factory
pub struct Builder;

impl Builder {
    /// Constant node
    pub fn make_const(value: Literal) -> Expression {
        Expression::Const(value)
    }

    /// Local read
    pub fn make_local_get(index: Index, ty: ValueType) -> Expression {
        Expression::LocalGet { index, ty }
    }

    /// Local write
    pub fn make_local_set(index: Index, value: Expression) -> Expression {
        Expression::LocalSet {
            index,
            value: Box::new(value),
            tee: false,
        }
    }

    /// Local write that also yields the value
    pub fn make_local_tee(index: Index, value: Expression) -> Expression {
        Expression::LocalSet {
            index,
            value: Box::new(value),
            tee: true,
        }
    }

    /// Global read
    pub fn make_global_get(name: impl Into<String>, ty: ValueType) -> Expression {
        Expression::GlobalGet {
            name: name.into(),
            ty,
        }
    }

    /// Global write
    pub fn make_global_set(name: impl Into<String>, value: Expression) -> Expression {
        Expression::GlobalSet {
            name: name.into(),
            value: Box::new(value),
        }
    }

    /// Unary operation
    pub fn make_unary(op: UnaryOp, value: Expression) -> Expression {
        Expression::Unary {
            op,
            value: Box::new(value),
        }
    }

    /// Binary operation
    pub fn make_binary(op: BinaryOp, left: Expression, right: Expression) -> Expression {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Direct call
    pub fn make_call(
        target: impl Into<String>,
        operands: Vec<Expression>,
        ty: ValueType,
    ) -> Expression {
        Expression::Call(Call {
            target: target.into(),
            operands,
            ty,
        })
    }

    /// Block typed by its last child
    pub fn make_block(list: Vec<Expression>) -> Expression {
        let ty = list.last().map(Expression::ty).unwrap_or(ValueType::None);
        Expression::Block { list, ty }
    }

    /// Discard a value
    pub fn make_drop(value: Expression) -> Expression {
        Expression::Drop(Box::new(value))
    }

    /// Global initialized to the zero of its type
    pub fn make_zero_global(name: impl Into<String>, ty: ValueType, mutable: bool) -> Global {
        let init = Literal::zero(ty)
            .map(Expression::Const)
            .unwrap_or(Expression::Nop);
        Global {
            name: name.into(),
            ty,
            init,
            mutable,
        }
    }

    /// Append a local of type `ty` to `vars`, returning its index
    pub fn add_var(params: &[ValueType], vars: &mut Vec<ValueType>, ty: ValueType) -> Index {
        let index = (params.len() + vars.len()) as Index;
        vars.push(ty);
        index
    }
}

/// 64-bit integer split/recombine helpers
pub struct I64Utilities;

impl I64Utilities {
    /// `extend_u(low) | (extend_u(high) << 32)`; `low` is evaluated before `high`
    pub fn recreate_i64(low: Expression, high: Expression) -> Expression {
        Builder::make_binary(
            BinaryOp::OrInt64,
            Builder::make_unary(UnaryOp::ExtendUInt32, low),
            Builder::make_binary(
                BinaryOp::ShlInt64,
                Builder::make_unary(UnaryOp::ExtendUInt32, high),
                Builder::make_const(Literal::I64(32)),
            ),
        )
    }

    /// [`recreate_i64`](Self::recreate_i64) from two `i32` locals
    pub fn recreate_i64_from_locals(low: Index, high: Index) -> Expression {
        Self::recreate_i64(
            Builder::make_local_get(low, ValueType::I32),
            Builder::make_local_get(high, ValueType::I32),
        )
    }

    /// Low 32 bits of an `i64` local
    pub fn get_i64_low(index: Index) -> Expression {
        Builder::make_unary(
            UnaryOp::WrapInt64,
            Builder::make_local_get(index, ValueType::I64),
        )
    }

    /// High 32 bits of an `i64` local
    pub fn get_i64_high(index: Index) -> Expression {
        Builder::make_unary(
            UnaryOp::WrapInt64,
            Builder::make_binary(
                BinaryOp::ShrUInt64,
                Builder::make_local_get(index, ValueType::I64),
                Builder::make_const(Literal::I64(32)),
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_type_follows_last_child() {
        let block = Builder::make_block(vec![
            Builder::make_drop(Builder::make_const(Literal::I32(1))),
            Builder::make_const(Literal::F64(2.0)),
        ]);
        assert_eq!(block.ty(), ValueType::F64);
        assert_eq!(Builder::make_block(vec![]).ty(), ValueType::None);
    }

    #[test]
    fn test_i64_helpers_are_typed() {
        assert_eq!(I64Utilities::get_i64_low(0).ty(), ValueType::I32);
        assert_eq!(I64Utilities::get_i64_high(0).ty(), ValueType::I32);
        assert_eq!(
            I64Utilities::recreate_i64_from_locals(0, 1).ty(),
            ValueType::I64
        );
    }

    #[test]
    fn test_add_var_indexes_after_params() {
        let params = vec![ValueType::I32, ValueType::I32];
        let mut vars = vec![ValueType::F64];
        assert_eq!(Builder::add_var(&params, &mut vars, ValueType::I64), 3);
        assert_eq!(vars, vec![ValueType::F64, ValueType::I64]);
    }

    #[test]
    fn test_zero_global() {
        let global = Builder::make_zero_global("tempRet0", ValueType::I32, true);
        assert_eq!(global.init, Expression::Const(Literal::I32(0)));
        assert!(global.mutable);
    }
}
