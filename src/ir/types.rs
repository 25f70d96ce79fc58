//! Value types and function signatures

/// Value types of the IR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// No value (statements, void results)
    None,
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
}

impl ValueType {
    /// Whether a host runtime can pass this type across its call boundary directly.
    ///
    /// The host has a single number type (a double) plus 32-bit integer coercions, so
    /// only `i32`, `f64` and no value survive a boundary crossing unchanged.
    pub fn is_host_legal(self) -> bool {
        matches!(self, ValueType::None | ValueType::I32 | ValueType::F64)
    }

    /// Text name used by the printer
    pub fn as_str(self) -> &'static str {
        match self {
            ValueType::None => "none",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
        }
    }
}

/// True if any param or the result cannot cross the host boundary
pub fn is_illegal_signature(params: &[ValueType], result: ValueType) -> bool {
    params.iter().any(|p| !p.is_host_legal()) || !result.is_host_legal()
}

/// Named function signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    /// Unique type name
    pub name: String,
    /// Parameter types in order
    pub params: Vec<ValueType>,
    /// Result type
    pub result: ValueType,
}

impl FunctionType {
    /// Create a new signature
    pub fn new(name: impl Into<String>, params: Vec<ValueType>, result: ValueType) -> Self {
        Self {
            name: name.into(),
            params,
            result,
        }
    }
}
