//! Expression tree definitions
//!
//! Function bodies are owned trees of [`Expression`] nodes. Passes mutate nodes in
//! place or replace a whole node through the walker.

use super::types::ValueType;

/// Local variable index (params first, then vars)
pub type Index = u32;

/// Constant value
#[derive(Debug, Clone, Copy)]
pub enum Literal {
    /// 32-bit integer constant
    I32(i32),
    /// 64-bit integer constant
    I64(i64),
    /// 32-bit float constant
    F32(f32),
    /// 64-bit float constant
    F64(f64),
}

impl Literal {
    /// Type of this literal
    pub fn ty(&self) -> ValueType {
        match self {
            Literal::I32(_) => ValueType::I32,
            Literal::I64(_) => ValueType::I64,
            Literal::F32(_) => ValueType::F32,
            Literal::F64(_) => ValueType::F64,
        }
    }

    /// Zero of the given type, or `None` for [`ValueType::None`]
    pub fn zero(ty: ValueType) -> Option<Self> {
        match ty {
            ValueType::None => None,
            ValueType::I32 => Some(Literal::I32(0)),
            ValueType::I64 => Some(Literal::I64(0)),
            ValueType::F32 => Some(Literal::F32(0.0)),
            ValueType::F64 => Some(Literal::F64(0.0)),
        }
    }
}

// Bitwise: 0.0 != -0.0 and a NaN equals the same NaN pattern.
impl PartialEq for Literal {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Literal::I32(a), Literal::I32(b)) => a == b,
            (Literal::I64(a), Literal::I64(b)) => a == b,
            (Literal::F32(a), Literal::F32(b)) => a.to_bits() == b.to_bits(),
            (Literal::F64(a), Literal::F64(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for Literal {}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// i64.extend_i32_u
    ExtendUInt32,
    /// i64.extend_i32_s
    ExtendSInt32,
    /// i32.wrap_i64
    WrapInt64,
    /// f64.promote_f32
    PromoteFloat32,
    /// f32.demote_f64
    DemoteFloat64,
    /// f32.sqrt
    SqrtFloat32,
    /// f64.sqrt
    SqrtFloat64,
    /// f64.neg
    NegFloat64,
}

impl UnaryOp {
    /// Result type of the operator
    pub fn result_type(self) -> ValueType {
        match self {
            UnaryOp::ExtendUInt32 | UnaryOp::ExtendSInt32 => ValueType::I64,
            UnaryOp::WrapInt64 => ValueType::I32,
            UnaryOp::PromoteFloat32 | UnaryOp::SqrtFloat64 | UnaryOp::NegFloat64 => ValueType::F64,
            UnaryOp::DemoteFloat64 | UnaryOp::SqrtFloat32 => ValueType::F32,
        }
    }

    /// Text mnemonic
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::ExtendUInt32 => "i64.extend_i32_u",
            UnaryOp::ExtendSInt32 => "i64.extend_i32_s",
            UnaryOp::WrapInt64 => "i32.wrap_i64",
            UnaryOp::PromoteFloat32 => "f64.promote_f32",
            UnaryOp::DemoteFloat64 => "f32.demote_f64",
            UnaryOp::SqrtFloat32 => "f32.sqrt",
            UnaryOp::SqrtFloat64 => "f64.sqrt",
            UnaryOp::NegFloat64 => "f64.neg",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// i32.add
    AddInt32,
    /// i32.sub
    SubInt32,
    /// i32.mul
    MulInt32,
    /// i32.and
    AndInt32,
    /// i32.or
    OrInt32,
    /// i64.add
    AddInt64,
    /// i64.sub
    SubInt64,
    /// i64.mul
    MulInt64,
    /// i64.and
    AndInt64,
    /// i64.or
    OrInt64,
    /// i64.shl
    ShlInt64,
    /// i64.shr_u
    ShrUInt64,
    /// f32.add
    AddFloat32,
    /// f32.mul
    MulFloat32,
    /// f64.add
    AddFloat64,
    /// f64.sub
    SubFloat64,
    /// f64.mul
    MulFloat64,
    /// f64.div
    DivFloat64,
}

impl BinaryOp {
    /// Result type of the operator (operands share it)
    pub fn result_type(self) -> ValueType {
        use BinaryOp::*;
        match self {
            AddInt32 | SubInt32 | MulInt32 | AndInt32 | OrInt32 => ValueType::I32,
            AddInt64 | SubInt64 | MulInt64 | AndInt64 | OrInt64 | ShlInt64 | ShrUInt64 => {
                ValueType::I64
            }
            AddFloat32 | MulFloat32 => ValueType::F32,
            AddFloat64 | SubFloat64 | MulFloat64 | DivFloat64 => ValueType::F64,
        }
    }

    /// Text mnemonic
    pub fn as_str(self) -> &'static str {
        use BinaryOp::*;
        match self {
            AddInt32 => "i32.add",
            SubInt32 => "i32.sub",
            MulInt32 => "i32.mul",
            AndInt32 => "i32.and",
            OrInt32 => "i32.or",
            AddInt64 => "i64.add",
            SubInt64 => "i64.sub",
            MulInt64 => "i64.mul",
            AndInt64 => "i64.and",
            OrInt64 => "i64.or",
            ShlInt64 => "i64.shl",
            ShrUInt64 => "i64.shr_u",
            AddFloat32 => "f32.add",
            MulFloat32 => "f32.mul",
            AddFloat64 => "f64.add",
            SubFloat64 => "f64.sub",
            MulFloat64 => "f64.mul",
            DivFloat64 => "f64.div",
        }
    }
}

/// Direct call to a function by name
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Callee name
    pub target: String,
    /// Arguments, evaluated left to right
    pub operands: Vec<Expression>,
    /// Result type of the call
    pub ty: ValueType,
}

/// IR expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// No operation
    Nop,
    /// Constant
    Const(Literal),
    /// Read a local
    LocalGet {
        /// Local index
        index: Index,
        /// Type of the local
        ty: ValueType,
    },
    /// Write a local; a tee also yields the written value
    LocalSet {
        /// Local index
        index: Index,
        /// Value stored
        value: Box<Expression>,
        /// Whether the value is also the result of the node
        tee: bool,
    },
    /// Read a global
    GlobalGet {
        /// Global name
        name: String,
        /// Type of the global
        ty: ValueType,
    },
    /// Write a global
    GlobalSet {
        /// Global name
        name: String,
        /// Value stored
        value: Box<Expression>,
    },
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        value: Box<Expression>,
    },
    /// Binary operation, left operand evaluated first
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        left: Box<Expression>,
        /// Right operand
        right: Box<Expression>,
    },
    /// Direct call
    Call(Call),
    /// Sequence; the last child is the block's value
    Block {
        /// Children in execution order
        list: Vec<Expression>,
        /// Block result type
        ty: ValueType,
    },
    /// Evaluate and discard
    Drop(Box<Expression>),
}

impl Expression {
    /// Result type of this node
    pub fn ty(&self) -> ValueType {
        match self {
            Expression::Nop | Expression::GlobalSet { .. } | Expression::Drop(_) => ValueType::None,
            Expression::Const(lit) => lit.ty(),
            Expression::LocalGet { ty, .. } | Expression::GlobalGet { ty, .. } => *ty,
            Expression::LocalSet { value, tee, .. } => {
                if *tee {
                    value.ty()
                } else {
                    ValueType::None
                }
            }
            Expression::Unary { op, .. } => op.result_type(),
            Expression::Binary { op, .. } => op.result_type(),
            Expression::Call(call) => call.ty,
            Expression::Block { ty, .. } => *ty,
        }
    }

    /// Constant literal if this node is a `Const`
    pub fn as_const(&self) -> Option<&Literal> {
        match self {
            Expression::Const(lit) => Some(lit),
            _ => None,
        }
    }

    /// Mutable children in evaluation order
    pub fn children_mut(&mut self) -> Vec<&mut Expression> {
        match self {
            Expression::Nop
            | Expression::Const(_)
            | Expression::LocalGet { .. }
            | Expression::GlobalGet { .. } => Vec::new(),
            Expression::LocalSet { value, .. }
            | Expression::GlobalSet { value, .. }
            | Expression::Unary { value, .. }
            | Expression::Drop(value) => vec![value.as_mut()],
            Expression::Binary { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Expression::Call(call) => call.operands.iter_mut().collect(),
            Expression::Block { list, .. } => list.iter_mut().collect(),
        }
    }

    /// Children in evaluation order
    pub fn children(&self) -> Vec<&Expression> {
        match self {
            Expression::Nop
            | Expression::Const(_)
            | Expression::LocalGet { .. }
            | Expression::GlobalGet { .. } => Vec::new(),
            Expression::LocalSet { value, .. }
            | Expression::GlobalSet { value, .. }
            | Expression::Unary { value, .. }
            | Expression::Drop(value) => vec![value.as_ref()],
            Expression::Binary { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            Expression::Call(call) => call.operands.iter().collect(),
            Expression::Block { list, .. } => list.iter().collect(),
        }
    }

    /// Count the nodes of this tree matching a predicate
    pub fn count(&self, pred: &impl Fn(&Expression) -> bool) -> usize {
        let own = usize::from(pred(self));
        own + self.children().into_iter().map(|c| c.count(pred)).sum::<usize>()
    }
}
