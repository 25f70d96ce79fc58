//! Property-based tests for host-boundary legalization
//!
//! These tests use proptest to generate values and module shapes and verify that:
//! 1. `i64` values survive the low/high split through stubs and wrappers
//! 2. Legalizing twice gives the same module as legalizing once
//! 3. Every host-visible signature is legal afterwards

use hostabi::interp::{HostImports, Interpreter};
use hostabi::ir::{BinaryOp, Builder, Export, Function, Literal, Module, ValueType};
use hostabi::passes::{illegal_boundary, PassOptions, PassRunner};
use proptest::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

// =============================================================================
// STRATEGY GENERATORS
// =============================================================================

fn value_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![
        Just(ValueType::I32),
        Just(ValueType::I64),
        Just(ValueType::F32),
        Just(ValueType::F64),
    ]
}

fn result_type() -> impl Strategy<Value = ValueType> {
    prop_oneof![Just(ValueType::None), value_type()]
}

/// (params, result, is_import) per function
fn signatures() -> impl Strategy<Value = Vec<(Vec<ValueType>, ValueType, bool)>> {
    prop::collection::vec(
        (prop::collection::vec(value_type(), 0..4), result_type(), any::<bool>()),
        1..12,
    )
}

fn build_module(sigs: &[(Vec<ValueType>, ValueType, bool)]) -> Module {
    let mut module = Module::new();
    for (i, (params, result, is_import)) in sigs.iter().enumerate() {
        let name = format!("f{}", i);
        let func = if *is_import {
            Function::import(name.as_str(), "env", name.as_str(), params.clone(), *result)
        } else {
            let body = Literal::zero(*result)
                .map(Builder::make_const)
                .unwrap_or(hostabi::ir::Expression::Nop);
            Function::new(name.as_str(), params.clone(), *result, body)
        };
        module.add_function(func).unwrap();
        if !*is_import {
            module
                .add_export(Export::function(name.as_str(), name.as_str()))
                .unwrap();
        }
    }
    module
}

fn legalize(module: &mut Module) {
    let mut runner = PassRunner::new(PassOptions::default());
    runner.add("legalize-js-interface").unwrap();
    runner.run(module).unwrap();
}

fn split(value: i64) -> (i32, i32) {
    (value as i32, (value >> 32) as i32)
}

fn join(low: i32, high: i32) -> i64 {
    ((high as i64) << 32) | (low as u32 as i64)
}

/// `bump(x: i64) -> i64` exported, calling the imported `env.offset(x: i64) -> i64`
/// and adding `delta`. Carry goes through imported helpers backed by `high`.
fn round_trip_module(delta: i64) -> Module {
    let mut module = Module::new();
    module
        .add_function(Function::import("get_hi", "env", "getTempRet0", vec![], ValueType::I32))
        .unwrap();
    module
        .add_function(Function::import(
            "set_hi",
            "env",
            "setTempRet0",
            vec![ValueType::I32],
            ValueType::None,
        ))
        .unwrap();
    module
        .add_function(Function::import(
            "offset",
            "env",
            "offset",
            vec![ValueType::I64],
            ValueType::I64,
        ))
        .unwrap();
    module
        .add_function(Function::new(
            "bump",
            vec![ValueType::I64],
            ValueType::I64,
            Builder::make_binary(
                BinaryOp::AddInt64,
                Builder::make_call(
                    "offset",
                    vec![Builder::make_local_get(0, ValueType::I64)],
                    ValueType::I64,
                ),
                Builder::make_const(Literal::I64(delta)),
            ),
        ))
        .unwrap();
    module.add_export(Export::function("bump", "bump")).unwrap();
    module
}

fn host_for(high: Rc<Cell<i32>>, host_offset: i64) -> HostImports {
    let mut host = HostImports::new();
    let getter = Rc::clone(&high);
    host.register("env", "getTempRet0", move |_| Ok(Some(Literal::I32(getter.get()))));
    let setter = Rc::clone(&high);
    host.register("env", "setTempRet0", move |args| {
        if let [Literal::I32(v)] = args {
            setter.set(*v);
        }
        Ok(None)
    });
    let carry = Rc::clone(&high);
    host.register("env", "offset", move |args| match args {
        [Literal::I32(low), Literal::I32(high)] => {
            let (low, high) = split(join(*low, *high).wrapping_add(host_offset));
            carry.set(high);
            Ok(Some(Literal::I32(low)))
        }
        _ => Err(hostabi::Error::trap("offset expects two i32 halves")),
    });
    host
}

// =============================================================================
// ROUND TRIP
// =============================================================================

proptest! {
    /// An i64 split by the host, passed through the export stub, the module, the import
    /// wrapper, the host again and back out, arrives intact
    #[test]
    fn i64_survives_stub_and_wrapper(
        value in any::<i64>(),
        delta in any::<i64>(),
        host_offset in any::<i64>()
    ) {
        let mut module = round_trip_module(delta);
        legalize(&mut module);

        let high = Rc::new(Cell::new(0));
        let host = host_for(Rc::clone(&high), host_offset);
        let mut interp = Interpreter::new(&module, host).unwrap();

        let (low_in, high_in) = split(value);
        let low_out = interp
            .call_export("bump", &[Literal::I32(low_in), Literal::I32(high_in)])
            .unwrap();
        let low_out = match low_out {
            Some(Literal::I32(v)) => v,
            other => return Err(TestCaseError::fail(format!("unexpected result {:?}", other))),
        };

        let expected = value.wrapping_add(host_offset).wrapping_add(delta);
        prop_assert_eq!(join(low_out, high.get()), expected);
    }

    /// The recombination expression inverts the split for every value
    #[test]
    fn split_and_join_are_inverse(value in any::<i64>()) {
        let (low, high) = split(value);
        prop_assert_eq!(join(low, high), value);
    }
}

// =============================================================================
// MODULE SHAPES
// =============================================================================

proptest! {
    /// No export or import keeps an illegal signature
    #[test]
    fn boundary_is_closed(sigs in signatures()) {
        let mut module = build_module(&sigs);
        legalize(&mut module);
        prop_assert!(illegal_boundary(&module).is_empty());
    }

    /// A second run is a no-op
    #[test]
    fn legalizing_twice_equals_once(sigs in signatures()) {
        let mut module = build_module(&sigs);
        legalize(&mut module);
        let once = module.to_string();
        legalize(&mut module);
        prop_assert_eq!(module.to_string(), once);
    }

    /// Internal names of defined functions never change
    #[test]
    fn defined_functions_survive(sigs in signatures()) {
        let mut module = build_module(&sigs);
        legalize(&mut module);
        for (i, (params, result, is_import)) in sigs.iter().enumerate() {
            let name = format!("f{}", i);
            let func = module.get_function(&name);
            let illegal = hostabi::ir::is_illegal_signature(params, *result);
            if *is_import && illegal {
                prop_assert!(func.is_none());
            } else {
                let func = func.unwrap();
                prop_assert_eq!(&func.params, params);
                prop_assert_eq!(func.result, *result);
            }
        }
    }
}
