//! Integration tests for the break-pointer patch and the host-math peephole

use hostabi::interp::{HostImports, Interpreter};
use hostabi::ir::{BinaryOp, Builder, Expression, Function, Literal, Module, UnaryOp, ValueType};
use hostabi::passes::{PassOptions, PassRunner};
use hostabi::Error;
use std::cell::Cell;
use std::rc::Rc;

fn pow_call(target: &str, base: Expression, exponent: Expression) -> Expression {
    Builder::make_call(target, vec![base, exponent], ValueType::F64)
}

fn math_module() -> Module {
    let mut module = Module::new();
    module
        .add_function(Function::import(
            "Math_pow",
            "global.Math",
            "pow",
            vec![ValueType::F64, ValueType::F64],
            ValueType::F64,
        ))
        .unwrap();
    module
        .add_function(Function::import("next", "env", "next", vec![], ValueType::F64))
        .unwrap();
    module
}

fn run(module: &mut Module, options: PassOptions, pass: &str) -> hostabi::Result<()> {
    let mut runner = PassRunner::new(options);
    runner.add(pass)?;
    runner.run(module)
}

#[test]
fn test_square_of_local_uses_fresh_tee() {
    let mut module = math_module();
    let mut func = Function::new(
        "sq",
        vec![ValueType::F64],
        ValueType::F64,
        pow_call(
            "Math_pow",
            Builder::make_local_get(1, ValueType::F64),
            Builder::make_const(Literal::F64(2.0)),
        ),
    );
    func.vars = vec![ValueType::F64];
    module.add_function(func).unwrap();

    run(&mut module, PassOptions::default(), "post-emscripten").unwrap();

    let func = module.get_function("sq").unwrap();
    assert_eq!(func.vars, vec![ValueType::F64, ValueType::F64]);
    assert_eq!(
        func.body,
        Some(Builder::make_binary(
            BinaryOp::MulFloat64,
            Builder::make_local_tee(2, Builder::make_local_get(1, ValueType::F64)),
            Builder::make_local_get(2, ValueType::F64),
        ))
    );
}

#[test]
fn test_square_evaluates_side_effects_once() {
    let mut module = math_module();
    module
        .add_function(Function::new(
            "sq_next",
            vec![],
            ValueType::F64,
            pow_call(
                "Math_pow",
                Builder::make_call("next", vec![], ValueType::F64),
                Builder::make_const(Literal::F64(2.0)),
            ),
        ))
        .unwrap();

    run(&mut module, PassOptions::default(), "optimize-host-math").unwrap();

    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut host = HostImports::new();
    host.register("env", "next", move |_| {
        counter.set(counter.get() + 1);
        Ok(Some(Literal::F64(3.0)))
    });
    let mut interp = Interpreter::new(&module, host).unwrap();
    assert_eq!(
        interp.call("sq_next", &[]).unwrap(),
        Some(Literal::F64(9.0))
    );
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_exponent_cases() {
    let cases = [
        (2.0, "mul"),
        (0.5, "sqrt"),
        (3.0, "call"),
        (-0.5, "call"),
    ];
    for (exponent, expected) in cases {
        let mut module = math_module();
        module
            .add_function(Function::new(
                "f",
                vec![ValueType::F64],
                ValueType::F64,
                pow_call(
                    "Math_pow",
                    Builder::make_local_get(0, ValueType::F64),
                    Builder::make_const(Literal::F64(exponent)),
                ),
            ))
            .unwrap();
        run(&mut module, PassOptions::default(), "optimize-host-math").unwrap();

        let body = module.get_function("f").unwrap().body.clone().unwrap();
        let actual = match body {
            Expression::Binary { op: BinaryOp::MulFloat64, .. } => "mul",
            Expression::Unary { op: UnaryOp::SqrtFloat64, .. } => "sqrt",
            Expression::Call(_) => "call",
            _ => "other",
        };
        assert_eq!(actual, expected, "pow(x, {})", exponent);
    }
}

#[test]
fn test_non_constant_exponent_untouched() {
    let mut module = math_module();
    let body = pow_call(
        "Math_pow",
        Builder::make_local_get(0, ValueType::F64),
        Builder::make_local_get(1, ValueType::F64),
    );
    module
        .add_function(Function::new(
            "f",
            vec![ValueType::F64, ValueType::F64],
            ValueType::F64,
            body.clone(),
        ))
        .unwrap();
    run(&mut module, PassOptions::default(), "optimize-host-math").unwrap();
    assert_eq!(module.get_function("f").unwrap().body, Some(body));
}

#[test]
fn test_env_pow_and_nested_calls() {
    let mut module = Module::new();
    module
        .add_function(Function::import(
            "pow",
            "env",
            "pow",
            vec![ValueType::F64, ValueType::F64],
            ValueType::F64,
        ))
        .unwrap();
    // pow(pow(x, 0.5), 2.0): the inner call is rewritten first.
    module
        .add_function(Function::new(
            "f",
            vec![ValueType::F64],
            ValueType::F64,
            pow_call(
                "pow",
                pow_call(
                    "pow",
                    Builder::make_local_get(0, ValueType::F64),
                    Builder::make_const(Literal::F64(0.5)),
                ),
                Builder::make_const(Literal::F64(2.0)),
            ),
        ))
        .unwrap();

    run(&mut module, PassOptions::default(), "optimize-host-math").unwrap();
    let func = module.get_function("f").unwrap();
    assert_eq!(
        func.body.as_ref().unwrap().to_string(),
        "(f64.mul (local.tee 1 (f64.sqrt (local.get 0))) (local.get 1))"
    );

    let mut interp = Interpreter::new(&module, HostImports::new()).unwrap();
    assert_eq!(
        interp.call("f", &[Literal::F64(16.0)]).unwrap(),
        Some(Literal::F64(16.0))
    );
}

#[test]
fn test_parallel_walk_over_many_functions() {
    let mut module = math_module();
    for i in 0..64 {
        module
            .add_function(Function::new(
                format!("f{}", i),
                vec![ValueType::F64],
                ValueType::F64,
                pow_call(
                    "Math_pow",
                    Builder::make_local_get(0, ValueType::F64),
                    Builder::make_const(Literal::F64(if i % 2 == 0 { 2.0 } else { 0.5 })),
                ),
            ))
            .unwrap();
    }
    let options = PassOptions {
        threads: Some(4),
        ..PassOptions::default()
    };
    run(&mut module, options, "optimize-host-math").unwrap();

    let remaining = module
        .functions()
        .iter()
        .filter_map(|f| f.body.as_ref())
        .map(|b| b.count(&|e| matches!(e, Expression::Call(c) if c.target == "Math_pow")))
        .sum::<usize>();
    assert_eq!(remaining, 0);
    for i in (0..64).step_by(2) {
        assert_eq!(
            module.get_function(&format!("f{}", i)).unwrap().vars,
            vec![ValueType::F64]
        );
    }
}

#[test]
fn test_sbrk_patch_from_json_options() {
    let mut module = Module::new();
    module
        .add_function(Function::import(
            "get_sbrk",
            "env",
            "emscripten_get_sbrk_ptr",
            vec![],
            ValueType::I32,
        ))
        .unwrap();
    module
        .add_function(Function::new(
            "brk",
            vec![],
            ValueType::I32,
            Builder::make_call("get_sbrk", vec![], ValueType::I32),
        ))
        .unwrap();

    let options =
        PassOptions::from_json(r#"{"arguments": {"emscripten-sbrk-ptr": "5242880"}}"#).unwrap();
    run(&mut module, options, "post-emscripten").unwrap();

    // No host function is registered: the accessor must no longer be an import.
    let mut interp = Interpreter::new(&module, HostImports::new()).unwrap();
    assert_eq!(
        interp.call("brk", &[]).unwrap(),
        Some(Literal::I32(5242880))
    );
}

#[test]
fn test_sbrk_rejects_garbage() {
    let mut module = Module::new();
    let options = PassOptions::default().with_argument("emscripten-sbrk-ptr", "lots");
    let err = run(&mut module, options, "post-emscripten").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument { .. }));
    assert_eq!(err.classify(), hostabi::ErrorSeverity::Recoverable);
}
