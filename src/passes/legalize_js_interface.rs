//! # Host-call legalization
//!
//! `i64` values cannot cross into the host, and the host's FFI rules also disallow
//! `f32`. This pass rewrites every export and import whose signature uses either type:
//!
//! - an `i64` param becomes a pair of `i32` params (low, high);
//! - an `i64` result becomes an `i32` result (the low half), with the high half passed
//!   through the *carry channel* (`tempRet0`);
//! - an `f32` param or result becomes `f64`.
//!
//! Exports get a legal stub that the host calls and that forwards to the real
//! function. Imports get a legal-typed replacement import plus a wrapper with the
//! original signature, so module code keeps calling a native-shaped function.
//!
//! ## Carry channel
//!
//! The high half travels either through a global (`tempRet0`) or through the
//! `getTempRet0`/`setTempRet0` helper pair. If both helpers are imported they are
//! used; if both are exported they are reused, with direct global access when the
//! `tempRet0` global exists. A lone helper cannot be trusted to pair with anything and
//! is a fatal error. With neither present the global and both helpers are created and
//! exported.

use super::names::{
    WellKnownImport, EXPORT_STUB_PREFIX, GET_TEMP_RET_0, IMPORT_IMPL_PREFIX,
    IMPORT_TYPE_PREFIX, IMPORT_WRAPPER_PREFIX, SET_TEMP_RET_0, TEMP_RET_0,
};
use super::{Pass, PassRunner};
use crate::error::{Error, Result};
use crate::ir::{
    Builder, Call, Export, ExternalKind, Expression, Function, FunctionPass, FunctionScope,
    FunctionType, I64Utilities, ImportName, Index, Module, UnaryOp, ValueType, Visitor,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// How the high 32 bits of an `i64` cross the boundary.
///
/// Resolved once per run; every transfer site in that run uses the same variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CarryChannel {
    /// Read and write the global directly
    Global {
        /// Global name
        name: String,
    },
    /// Call the getter and setter functions
    Calls {
        /// `() -> i32`
        getter: String,
        /// `(i32) -> none`
        setter: String,
    },
}

impl CarryChannel {
    /// Store `value` (an `i32`) into the channel
    pub fn write_high(&self, value: Expression) -> Expression {
        match self {
            CarryChannel::Global { name } => Builder::make_global_set(name.as_str(), value),
            CarryChannel::Calls { setter, .. } => {
                Builder::make_call(setter.as_str(), vec![value], ValueType::None)
            }
        }
    }

    /// Load the channel's `i32`
    pub fn read_high(&self) -> Expression {
        match self {
            CarryChannel::Global { name } => {
                Builder::make_global_get(name.as_str(), ValueType::I32)
            }
            CarryChannel::Calls { getter, .. } => {
                Builder::make_call(getter.as_str(), vec![], ValueType::I32)
            }
        }
    }

    /// Whether transfers access the global directly
    pub fn uses_global(&self) -> bool {
        matches!(self, CarryChannel::Global { .. })
    }
}

/// Legalizes the host-facing function boundary
#[derive(Debug, Default)]
pub struct LegalizeJsInterface {
    channel: Option<CarryChannel>,
    legalized_exports: Vec<String>,
    export_stubs: BTreeMap<String, String>,
    illegal_imports_to_legal: BTreeMap<String, String>,
}

impl LegalizeJsInterface {
    /// Create the pass
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry channel chosen by the last run
    pub fn channel(&self) -> Option<&CarryChannel> {
        self.channel.as_ref()
    }

    /// Export names retargeted to stubs by the last run
    pub fn legalized_exports(&self) -> &[String] {
        &self.legalized_exports
    }

    /// Original import name -> wrapper name, for the last run
    pub fn legalized_imports(&self) -> &BTreeMap<String, String> {
        &self.illegal_imports_to_legal
    }
}

impl Pass for LegalizeJsInterface {
    fn name(&self) -> &'static str {
        "legalize-js-interface"
    }

    fn run(&mut self, runner: &PassRunner, module: &mut Module) -> Result<()> {
        self.legalized_exports.clear();
        self.export_stubs.clear();
        self.illegal_imports_to_legal.clear();

        let channel = ensure_temp_ret0_helpers(module)?;
        tracing::debug!(?channel, "resolved carry channel");

        // Exports: the host calls a legal stub, which calls the real function.
        let export_targets: Vec<(usize, String)> = module
            .exports
            .iter()
            .enumerate()
            .filter(|(_, ex)| ex.kind == ExternalKind::Function)
            .map(|(index, ex)| (index, ex.value.clone()))
            .collect();
        for (index, value) in export_targets {
            let func = module
                .get_function(&value)
                .ok_or_else(|| Error::UnknownFunction(value.clone()))?;
            if func.has_illegal_signature() {
                let func = func.clone();
                let legal_name = match self.export_stubs.get(&func.name) {
                    // A function may be exported more than once.
                    Some(stub) => stub.clone(),
                    None => {
                        let stub = make_legal_stub(&func, module, &channel)?;
                        self.export_stubs.insert(func.name.clone(), stub.clone());
                        stub
                    }
                };
                let export = &mut module.exports[index];
                tracing::debug!(export = %export.name, stub = %legal_name, "legalized export");
                export.value = legal_name;
                self.legalized_exports.push(export.name.clone());
            }
        }

        // Imports: module code calls a wrapper, which calls a legal import.
        for name in module.function_names() {
            let Some(im) = module.get_function(&name) else {
                continue;
            };
            let Some(import) = im.import.clone() else {
                continue;
            };
            if !im.has_illegal_signature() {
                continue;
            }
            let im = im.clone();
            let func_name = make_legal_stub_for_called_import(&im, &import, module, &channel)?;

            // The table must hold the wrapper: to the host the import is now legal, and
            // the wrapper makes it look like a native function to indirect callers.
            for segment in module.table.segments.iter_mut() {
                for entry in segment.data.iter_mut() {
                    if *entry == im.name {
                        *entry = func_name.clone();
                    }
                }
            }
            tracing::debug!(import = %im.name, wrapper = %func_name, "legalized import");
            self.illegal_imports_to_legal.insert(im.name, func_name);
        }

        if !self.illegal_imports_to_legal.is_empty() {
            for original in self.illegal_imports_to_legal.keys() {
                module.remove_function(original)?;
            }
            let fix = FixImports::new(Arc::new(self.illegal_imports_to_legal.clone()));
            runner.nested().run_function_pass(fix, module)?;
        }

        tracing::info!(
            exports = self.legalized_exports.len(),
            imports = self.illegal_imports_to_legal.len(),
            carry_global = channel.uses_global(),
            "legalized host interface"
        );
        self.channel = Some(channel);
        Ok(())
    }
}

/// Host-visible names whose signatures still use an illegal type: function exports
/// and imports, formatted as `export:<name>` and `import:<name>`.
pub fn illegal_boundary(module: &Module) -> Vec<String> {
    let mut found = Vec::new();
    for export in &module.exports {
        if export.kind != ExternalKind::Function {
            continue;
        }
        if let Some(func) = module.get_function(&export.value) {
            if func.has_illegal_signature() {
                found.push(format!("export:{}", export.name));
            }
        }
    }
    for func in module.functions() {
        if func.is_imported() && func.has_illegal_signature() {
            found.push(format!("import:{}", func.name));
        }
    }
    found
}

/// `base`, or `base` with the first numeric suffix that `taken` rejects
fn fresh_name(base: String, taken: impl Fn(&str) -> bool) -> String {
    if !taken(&base) {
        return base;
    }
    let mut suffix = 1usize;
    loop {
        let candidate = format!("{}_{}", base, suffix);
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

fn partial_temp_ret0(origin: &'static str, present: &str, missing: &str) -> Error {
    let err = Error::PartialTempRet0 {
        origin,
        present: present.to_string(),
        missing: missing.to_string(),
    };
    tracing::error!(error = %err, "legalize-js-interface aborted");
    err
}

/// Find or create the carry channel. Runs before any stub is synthesized.
fn ensure_temp_ret0_helpers(module: &mut Module) -> Result<CarryChannel> {
    let imported_get = WellKnownImport::GetTempRet0
        .find(module)
        .map(|f| f.name.clone());
    let imported_set = WellKnownImport::SetTempRet0
        .find(module)
        .map(|f| f.name.clone());
    match (imported_get, imported_set) {
        (Some(getter), Some(setter)) => return Ok(CarryChannel::Calls { getter, setter }),
        (Some(_), None) => return Err(partial_temp_ret0("imports", GET_TEMP_RET_0, SET_TEMP_RET_0)),
        (None, Some(_)) => return Err(partial_temp_ret0("imports", SET_TEMP_RET_0, GET_TEMP_RET_0)),
        (None, None) => {}
    }

    // Exported helpers may live under other internal names; find them by export name.
    let exported_get = module.get_export(GET_TEMP_RET_0).map(|e| e.value.clone());
    let exported_set = module.get_export(SET_TEMP_RET_0).map(|e| e.value.clone());
    match (exported_get, exported_set) {
        (Some(getter), Some(setter)) => {
            if module.get_global(TEMP_RET_0).is_some() {
                return Ok(CarryChannel::Global {
                    name: TEMP_RET_0.to_string(),
                });
            }
            return Ok(CarryChannel::Calls { getter, setter });
        }
        (Some(_), None) => return Err(partial_temp_ret0("exports", GET_TEMP_RET_0, SET_TEMP_RET_0)),
        (None, Some(_)) => return Err(partial_temp_ret0("exports", SET_TEMP_RET_0, GET_TEMP_RET_0)),
        (None, None) => {}
    }

    if module.get_global(TEMP_RET_0).is_none() {
        module.add_global(Builder::make_zero_global(TEMP_RET_0, ValueType::I32, true))?;
    }
    module.add_function(Function::new(
        GET_TEMP_RET_0,
        vec![],
        ValueType::I32,
        Builder::make_global_get(TEMP_RET_0, ValueType::I32),
    ))?;
    module.add_export(Export::function(GET_TEMP_RET_0, GET_TEMP_RET_0))?;
    module.add_function(Function::new(
        SET_TEMP_RET_0,
        vec![ValueType::I32],
        ValueType::None,
        Builder::make_global_set(TEMP_RET_0, Builder::make_local_get(0, ValueType::I32)),
    ))?;
    module.add_export(Export::function(SET_TEMP_RET_0, SET_TEMP_RET_0))?;

    Ok(CarryChannel::Global {
        name: TEMP_RET_0.to_string(),
    })
}

/// The host calls the export, so it must call a legal stub that calls the real function
fn make_legal_stub(func: &Function, module: &mut Module, channel: &CarryChannel) -> Result<String> {
    let name = fresh_name(format!("{}{}", EXPORT_STUB_PREFIX, func.name), |n| {
        module.get_function(n).is_some()
    });

    let mut params = Vec::with_capacity(func.params.len());
    let mut operands = Vec::with_capacity(func.params.len());
    for &param in &func.params {
        let index = params.len() as Index;
        match param {
            ValueType::I64 => {
                operands.push(I64Utilities::recreate_i64_from_locals(index, index + 1));
                params.push(ValueType::I32);
                params.push(ValueType::I32);
            }
            ValueType::F32 => {
                operands.push(Builder::make_unary(
                    UnaryOp::DemoteFloat64,
                    Builder::make_local_get(index, ValueType::F64),
                ));
                params.push(ValueType::F64);
            }
            other => {
                operands.push(Builder::make_local_get(index, other));
                params.push(other);
            }
        }
    }

    let call = Builder::make_call(func.name.as_str(), operands, func.result);
    let mut vars = Vec::new();
    let (result, body) = match func.result {
        ValueType::I64 => {
            let local = Builder::add_var(&params, &mut vars, ValueType::I64);
            let body = Builder::make_block(vec![
                Builder::make_local_set(local, call),
                channel.write_high(I64Utilities::get_i64_high(local)),
                I64Utilities::get_i64_low(local),
            ]);
            (ValueType::I32, body)
        }
        ValueType::F32 => (
            ValueType::F64,
            Builder::make_unary(UnaryOp::PromoteFloat32, call),
        ),
        other => (other, call),
    };

    let mut stub = Function::new(name.as_str(), params, result, body);
    stub.vars = vars;
    module.add_function(stub)?;
    Ok(name)
}

/// Module code calls the import, so it must call a wrapper that calls the legal import
fn make_legal_stub_for_called_import(
    im: &Function,
    import: &ImportName,
    module: &mut Module,
    channel: &CarryChannel,
) -> Result<String> {
    // User code may already own any of the synthesized names.
    let type_name = fresh_name(format!("{}{}", IMPORT_TYPE_PREFIX, im.name), |n| {
        module.get_function_type(n).is_some()
    });
    let legal_name = fresh_name(format!("{}{}", IMPORT_IMPL_PREFIX, im.name), |n| {
        module.get_function(n).is_some()
    });
    let wrapper_name = fresh_name(format!("{}{}", IMPORT_WRAPPER_PREFIX, im.name), |n| {
        module.get_function(n).is_some()
    });

    let mut legal_params = Vec::with_capacity(im.params.len());
    let mut operands = Vec::with_capacity(im.params.len());
    for (index, &param) in im.params.iter().enumerate() {
        let index = index as Index;
        match param {
            ValueType::I64 => {
                operands.push(I64Utilities::get_i64_low(index));
                operands.push(I64Utilities::get_i64_high(index));
                legal_params.push(ValueType::I32);
                legal_params.push(ValueType::I32);
            }
            ValueType::F32 => {
                operands.push(Builder::make_unary(
                    UnaryOp::PromoteFloat32,
                    Builder::make_local_get(index, ValueType::F32),
                ));
                legal_params.push(ValueType::F64);
            }
            other => {
                operands.push(Builder::make_local_get(index, other));
                legal_params.push(other);
            }
        }
    }

    let (legal_result, body) = match im.result {
        ValueType::I64 => {
            let call = Builder::make_call(legal_name.as_str(), operands, ValueType::I32);
            (
                ValueType::I32,
                I64Utilities::recreate_i64(call, channel.read_high()),
            )
        }
        ValueType::F32 => {
            let call = Builder::make_call(legal_name.as_str(), operands, ValueType::F64);
            (
                ValueType::F64,
                Builder::make_unary(UnaryOp::DemoteFloat64, call),
            )
        }
        other => (
            other,
            Builder::make_call(legal_name.as_str(), operands, other),
        ),
    };

    module.add_function(Function::new(
        wrapper_name.as_str(),
        im.params.clone(),
        im.result,
        body,
    ))?;
    module.add_function_type(FunctionType::new(
        type_name.as_str(),
        legal_params.clone(),
        legal_result,
    ))?;
    let mut legal = Function::import(
        legal_name.as_str(),
        import.module.as_str(),
        import.base.as_str(),
        legal_params,
        legal_result,
    );
    legal.type_name = Some(type_name);
    module.add_function(legal)?;
    Ok(wrapper_name)
}

/// Redirects calls of removed illegal imports to their wrappers
#[derive(Debug, Clone)]
struct FixImports {
    illegal_imports_to_legal: Arc<BTreeMap<String, String>>,
}

impl FixImports {
    fn new(illegal_imports_to_legal: Arc<BTreeMap<String, String>>) -> Self {
        Self {
            illegal_imports_to_legal,
        }
    }
}

impl Visitor for FixImports {
    fn visit_call(&mut self, call: &mut Call, scope: &mut FunctionScope<'_>) -> Option<Expression> {
        let legal = self.illegal_imports_to_legal.get(&call.target)?;
        // Inside the wrapper itself the call must stay as it is.
        if legal == scope.name {
            return None;
        }
        Some(Builder::make_call(
            legal.as_str(),
            std::mem::take(&mut call.operands),
            call.ty,
        ))
    }
}

impl FunctionPass for FixImports {
    fn name(&self) -> &'static str {
        "fix-imports"
    }

    fn is_function_parallel(&self) -> bool {
        true
    }

    fn create(&self) -> Self {
        self.clone()
    }
}
