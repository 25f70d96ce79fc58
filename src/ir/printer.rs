//! S-expression rendering of modules, close to WebAssembly text
//!
//! Used for trace logging and for readable assertion failures in tests.

use super::expression::{Expression, Literal};
use super::module::{ExternalKind, Function, Module};
use super::types::ValueType;
use std::fmt::{self, Write};

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::I32(v) => write!(f, "i32.const {}", v),
            Literal::I64(v) => write!(f, "i64.const {}", v),
            Literal::F32(v) => write!(f, "f32.const {:?}", v),
            Literal::F64(v) => write!(f, "f64.const {:?}", v),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        print_expression(self, 0, &mut out)?;
        f.write_str(&out)
    }
}

fn print_expression(expr: &Expression, indent: usize, out: &mut String) -> fmt::Result {
    match expr {
        Expression::Nop => out.write_str("(nop)"),
        Expression::Const(lit) => write!(out, "({})", lit),
        Expression::LocalGet { index, .. } => write!(out, "(local.get {})", index),
        Expression::LocalSet { index, value, tee } => {
            let op = if *tee { "local.tee" } else { "local.set" };
            write!(out, "({} {} ", op, index)?;
            print_expression(value, indent, out)?;
            out.write_char(')')
        }
        Expression::GlobalGet { name, .. } => write!(out, "(global.get ${})", name),
        Expression::GlobalSet { name, value } => {
            write!(out, "(global.set ${} ", name)?;
            print_expression(value, indent, out)?;
            out.write_char(')')
        }
        Expression::Unary { op, value } => {
            write!(out, "({} ", op.as_str())?;
            print_expression(value, indent, out)?;
            out.write_char(')')
        }
        Expression::Binary { op, left, right } => {
            write!(out, "({} ", op.as_str())?;
            print_expression(left, indent, out)?;
            out.write_char(' ')?;
            print_expression(right, indent, out)?;
            out.write_char(')')
        }
        Expression::Call(call) => {
            write!(out, "(call ${}", call.target)?;
            for operand in &call.operands {
                out.write_char(' ')?;
                print_expression(operand, indent, out)?;
            }
            out.write_char(')')
        }
        Expression::Block { list, ty } => {
            out.write_str("(block")?;
            if *ty != ValueType::None {
                write!(out, " (result {})", ty)?;
            }
            for child in list {
                write!(out, "\n{}", " ".repeat(indent + 1))?;
                print_expression(child, indent + 1, out)?;
            }
            write!(out, "\n{})", " ".repeat(indent))
        }
        Expression::Drop(value) => {
            out.write_str("(drop ")?;
            print_expression(value, indent, out)?;
            out.write_char(')')
        }
    }
}

fn write_signature(out: &mut String, params: &[ValueType], result: ValueType) -> fmt::Result {
    for param in params {
        write!(out, " (param {})", param)?;
    }
    if result != ValueType::None {
        write!(out, " (result {})", result)?;
    }
    Ok(())
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        if let Some(import) = &self.import {
            write!(out, "(import \"{}\" \"{}\" (func ${}", import.module, import.base, self.name)?;
            if let Some(ty) = &self.type_name {
                write!(out, " (type ${})", ty)?;
            }
            write_signature(&mut out, &self.params, self.result)?;
            out.write_str("))")?;
        } else {
            write!(out, "(func ${}", self.name)?;
            write_signature(&mut out, &self.params, self.result)?;
            for var in &self.vars {
                write!(out, "\n  (local {})", var)?;
            }
            if let Some(body) = &self.body {
                out.write_str("\n  ")?;
                print_expression(body, 2, &mut out)?;
            }
            out.write_str("\n )")?;
        }
        f.write_str(&out)
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "(module")?;
        for ty in &self.function_types {
            let mut sig = String::new();
            write_signature(&mut sig, &ty.params, ty.result)?;
            writeln!(f, " (type ${} (func{}))", ty.name, sig)?;
        }
        for func in self.functions().iter().filter(|func| func.is_imported()) {
            writeln!(f, " {}", func)?;
        }
        for global in &self.globals {
            let ty = if global.mutable {
                format!("(mut {})", global.ty)
            } else {
                global.ty.to_string()
            };
            writeln!(f, " (global ${} {} {})", global.name, ty, global.init)?;
        }
        for segment in &self.table.segments {
            let names: Vec<String> = segment.data.iter().map(|n| format!("${}", n)).collect();
            writeln!(f, " (elem {} {})", segment.offset, names.join(" "))?;
        }
        for export in &self.exports {
            let kind = match export.kind {
                ExternalKind::Function => "func",
                ExternalKind::Table => "table",
                ExternalKind::Memory => "memory",
                ExternalKind::Global => "global",
            };
            writeln!(f, " (export \"{}\" ({} ${}))", export.name, kind, export.value)?;
        }
        for func in self.functions().iter().filter(|func| !func.is_imported()) {
            writeln!(f, " {}", func)?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Builder, Export, Function, Module};

    #[test]
    fn test_print_expression() {
        let expr = Builder::make_binary(
            BinaryOp::MulFloat64,
            Builder::make_local_tee(1, Builder::make_local_get(0, ValueType::F64)),
            Builder::make_local_get(1, ValueType::F64),
        );
        assert_eq!(
            expr.to_string(),
            "(f64.mul (local.tee 1 (local.get 0)) (local.get 1))"
        );
    }

    #[test]
    fn test_print_module() {
        let mut module = Module::new();
        module
            .add_function(Function::import(
                "g",
                "env",
                "g",
                vec![ValueType::F32],
                ValueType::F32,
            ))
            .unwrap();
        module
            .add_function(Function::new(
                "f",
                vec![ValueType::I32],
                ValueType::I32,
                Builder::make_local_get(0, ValueType::I32),
            ))
            .unwrap();
        module.add_export(Export::function("f", "f")).unwrap();

        let text = module.to_string();
        assert!(text.contains("(import \"env\" \"g\" (func $g (param f32) (result f32)))"));
        assert!(text.contains("(export \"f\" (func $f))"));
        assert!(text.contains("(func $f (param i32) (result i32)\n  (local.get 0)\n )"));
    }
}
