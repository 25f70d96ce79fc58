//! # Pass pipeline
//!
//! Passes transform a [`Module`] in place. A [`PassRunner`] owns the options and the
//! ordered list of passes, and knows how to run function-level passes either
//! sequentially or across a Rayon worker pool.
//!
//! ## Registered passes
//!
//! | Name | Pass |
//! |------|------|
//! | `legalize-js-interface` | [`LegalizeJsInterface`] |
//! | `post-emscripten` | [`PostEmscripten`] (break-pointer patch + math peephole) |
//! | `optimize-host-math` | [`OptimizeCalls`] on its own |
//!
//! ## Usage
//!
//! ```ignore
//! use hostabi::passes::{PassOptions, PassRunner};
//!
//! let options = PassOptions::default().with_argument("emscripten-sbrk-ptr", "5242880");
//! let mut runner = PassRunner::new(options);
//! runner.add("post-emscripten")?;
//! runner.add("legalize-js-interface")?;
//! runner.run(&mut module)?;
//! ```

pub mod legalize_js_interface;
pub mod names;
pub mod post_emscripten;

pub use legalize_js_interface::{illegal_boundary, CarryChannel, LegalizeJsInterface};
pub use names::WellKnownImport;
pub use post_emscripten::{OptimizeCalls, PostEmscripten};

use crate::error::{Error, Result};
use crate::ir::{walk_function, FunctionPass, Module};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

/// Names accepted by [`PassRunner::add`]
pub const PASS_NAMES: &[&str] = &[
    "legalize-js-interface",
    "post-emscripten",
    "optimize-host-math",
];

/// A whole-module transformation
pub trait Pass: Send {
    /// Registry name
    fn name(&self) -> &'static str;

    /// Transform the module. A returned error aborts the pipeline; partial changes stay.
    fn run(&mut self, runner: &PassRunner, module: &mut Module) -> Result<()>;
}

/// Adapts a [`FunctionPass`] to the [`Pass`] interface
pub struct WalkerPass<P> {
    template: P,
}

impl<P: FunctionPass + Sync> WalkerPass<P> {
    /// Wrap a function pass
    pub fn new(template: P) -> Self {
        Self { template }
    }
}

impl<P: FunctionPass + Sync> Pass for WalkerPass<P> {
    fn name(&self) -> &'static str {
        self.template.name()
    }

    fn run(&mut self, runner: &PassRunner, module: &mut Module) -> Result<()> {
        runner.run_function_pass(self.template.create(), module)
    }
}

/// Pass configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PassOptions {
    /// Free-form `name -> value` arguments read by individual passes
    pub arguments: BTreeMap<String, String>,
    /// Worker threads for function-parallel passes (default: num_cpus)
    pub threads: Option<usize>,
}

impl PassOptions {
    /// Load options from JSON, e.g. `{"arguments": {"emscripten-sbrk-ptr": "1024"}}`
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Set an argument
    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    /// Argument value, or `default` when unset
    pub fn get_argument_or_default(&self, name: &str, default: &str) -> String {
        self.arguments
            .get(name)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    /// Effective worker count
    pub fn thread_count(&self) -> usize {
        self.threads.filter(|&n| n > 0).unwrap_or_else(num_cpus::get)
    }
}

/// Create a registered pass by name
pub fn create_pass(name: &str) -> Result<Box<dyn Pass>> {
    match name {
        "legalize-js-interface" => Ok(Box::new(LegalizeJsInterface::new())),
        "post-emscripten" => Ok(Box::new(PostEmscripten::new())),
        "optimize-host-math" => Ok(Box::new(WalkerPass::new(OptimizeCalls::new()))),
        _ => Err(Error::UnknownPass(name.to_string())),
    }
}

/// Runs passes over a module
pub struct PassRunner {
    options: PassOptions,
    passes: Vec<Box<dyn Pass>>,
    nested: bool,
}

impl PassRunner {
    /// Create a runner with no passes
    pub fn new(options: PassOptions) -> Self {
        Self {
            options,
            passes: Vec::new(),
            nested: false,
        }
    }

    /// A runner for passes launched from inside another pass
    pub fn nested(&self) -> Self {
        Self {
            options: self.options.clone(),
            passes: Vec::new(),
            nested: true,
        }
    }

    /// Whether this runner was created by a pass
    pub fn is_nested(&self) -> bool {
        self.nested
    }

    /// Options visible to passes
    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    /// Append a registered pass
    pub fn add(&mut self, name: &str) -> Result<()> {
        self.add_pass(create_pass(name)?);
        Ok(())
    }

    /// Append a pass instance
    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    /// Number of queued passes
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Whether no pass is queued
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Run all queued passes in order, stopping at the first error
    pub fn run(&mut self, module: &mut Module) -> Result<()> {
        let mut passes = std::mem::take(&mut self.passes);
        let result = passes
            .iter_mut()
            .try_for_each(|pass| self.run_pass(pass.as_mut(), module));
        self.passes = passes;
        result
    }

    fn run_pass(&self, pass: &mut dyn Pass, module: &mut Module) -> Result<()> {
        let span = tracing::debug_span!("pass", name = pass.name(), nested = self.nested);
        let _enter = span.enter();
        let start = Instant::now();

        let result = pass.run(self, module);

        match &result {
            Ok(()) => {
                tracing::debug!(elapsed_us = start.elapsed().as_micros() as u64, "pass finished");
                tracing::trace!(module = %module, "module after pass");
            }
            Err(err) => tracing::error!(error = %err, "pass failed"),
        }
        result
    }

    /// Walk every defined function with `pass`.
    ///
    /// Function-parallel passes run on a Rayon pool, one [`FunctionPass::create`]
    /// instance per function and no ordering between functions.
    pub fn run_function_pass<P: FunctionPass + Sync>(
        &self,
        mut pass: P,
        module: &mut Module,
    ) -> Result<()> {
        pass.prepare(module);
        let functions = module.functions_mut();

        if pass.is_function_parallel() && functions.len() > 1 {
            let threads = self.options.thread_count().min(functions.len());
            tracing::trace!(pass = pass.name(), threads, "walking functions in parallel");

            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;

            let template = &pass;
            pool.install(|| {
                functions.par_iter_mut().for_each(|func| {
                    let mut worker = template.create();
                    walk_function(func, &mut worker);
                })
            });
        } else {
            for func in functions.iter_mut() {
                walk_function(func, &mut pass);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Builder, Call, Expression, Function, FunctionScope, ValueType, Visitor};

    #[test]
    fn test_options_from_json() {
        let json = r#"{"arguments": {"emscripten-sbrk-ptr": "1024"}, "threads": 2}"#;
        let options = PassOptions::from_json(json).unwrap();
        assert_eq!(
            options.get_argument_or_default("emscripten-sbrk-ptr", ""),
            "1024"
        );
        assert_eq!(options.get_argument_or_default("missing", "x"), "x");
        assert_eq!(options.thread_count(), 2);

        let empty = PassOptions::from_json("{}").unwrap();
        assert_eq!(empty, PassOptions::default());
        assert!(empty.thread_count() >= 1);

        assert!(matches!(
            PassOptions::from_json("{\"threads\": \"many\"}"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_registry() {
        let mut runner = PassRunner::new(PassOptions::default());
        for name in PASS_NAMES {
            runner.add(name).unwrap();
        }
        assert_eq!(runner.len(), PASS_NAMES.len());
        assert_eq!(
            runner.add("dce").unwrap_err(),
            Error::UnknownPass("dce".to_string())
        );
    }

    #[derive(Clone)]
    struct Retarget;

    impl Visitor for Retarget {
        fn visit_call(
            &mut self,
            call: &mut Call,
            _scope: &mut FunctionScope<'_>,
        ) -> Option<Expression> {
            call.target = "b".to_string();
            None
        }
    }

    impl FunctionPass for Retarget {
        fn name(&self) -> &'static str {
            "retarget"
        }

        fn is_function_parallel(&self) -> bool {
            true
        }

        fn create(&self) -> Self {
            Retarget
        }
    }

    #[test]
    fn test_parallel_function_pass_visits_every_body() {
        let mut module = Module::new();
        module
            .add_function(Function::import("a", "env", "a", vec![], ValueType::None))
            .unwrap();
        for i in 0..16 {
            module
                .add_function(Function::new(
                    format!("f{}", i),
                    vec![],
                    ValueType::None,
                    Builder::make_call("a", vec![], ValueType::None),
                ))
                .unwrap();
        }

        let runner = PassRunner::new(PassOptions {
            threads: Some(4),
            ..PassOptions::default()
        });
        runner.run_function_pass(Retarget, &mut module).unwrap();

        let to_b = |e: &Expression| matches!(e, Expression::Call(c) if c.target == "b");
        let rewritten: usize = module
            .functions()
            .iter()
            .filter_map(|f| f.body.as_ref())
            .map(|b| b.count(&to_b))
            .sum();
        assert_eq!(rewritten, 16);
    }

    #[test]
    fn test_nested_runner_keeps_options() {
        let runner = PassRunner::new(PassOptions::default().with_argument("k", "v"));
        let nested = runner.nested();
        assert!(nested.is_nested());
        assert!(nested.is_empty());
        assert_eq!(nested.options().get_argument_or_default("k", ""), "v");
    }
}
