//! Names shared with the host runtime
//!
//! The host resolves imports and exports by fixed names. Recognizing an import goes
//! through a single static table so that passes dispatch on [`WellKnownImport`]
//! instead of comparing strings.

use crate::ir::{Function, Module};
use lazy_static::lazy_static;
use std::collections::HashMap;

/// Namespace of ordinary host imports
pub const ENV: &str = "env";
/// Namespace of the host's math object
pub const GLOBAL_MATH: &str = "global.Math";

/// Global holding the high 32 bits of the last `i64` crossing the boundary
pub const TEMP_RET_0: &str = "tempRet0";
/// Getter for [`TEMP_RET_0`], as import base name and as export name
pub const GET_TEMP_RET_0: &str = "getTempRet0";
/// Setter for [`TEMP_RET_0`], as import base name and as export name
pub const SET_TEMP_RET_0: &str = "setTempRet0";
/// Host accessor for the memory-break pointer
pub const GET_SBRK_PTR: &str = "emscripten_get_sbrk_ptr";
/// Host power function
pub const POW: &str = "pow";

/// Pass argument overriding the memory-break pointer
pub const SBRK_PTR_ARGUMENT: &str = "emscripten-sbrk-ptr";

/// Prefix of stubs exported in place of illegal functions
pub const EXPORT_STUB_PREFIX: &str = "legalize-export-stub$";
/// Prefix of legal signatures created for illegal imports
pub const IMPORT_TYPE_PREFIX: &str = "legalize-import-type$";
/// Prefix of the legal-typed imports replacing illegal ones
pub const IMPORT_IMPL_PREFIX: &str = "legalize-import-impl$";
/// Prefix of wrappers giving legal imports their original signature
pub const IMPORT_WRAPPER_PREFIX: &str = "legalize-import-wrapper$";

/// Host imports the passes know by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnownImport {
    /// `env.getTempRet0`
    GetTempRet0,
    /// `env.setTempRet0`
    SetTempRet0,
    /// `env.emscripten_get_sbrk_ptr`
    GetSbrkPtr,
    /// `global.Math.pow` or `env.pow`
    MathPow,
}

lazy_static! {
    static ref WELL_KNOWN_IMPORTS: HashMap<&'static str, HashMap<&'static str, WellKnownImport>> = {
        let mut env = HashMap::new();
        env.insert(GET_TEMP_RET_0, WellKnownImport::GetTempRet0);
        env.insert(SET_TEMP_RET_0, WellKnownImport::SetTempRet0);
        env.insert(GET_SBRK_PTR, WellKnownImport::GetSbrkPtr);
        env.insert(POW, WellKnownImport::MathPow);

        let mut math = HashMap::new();
        math.insert(POW, WellKnownImport::MathPow);

        let mut table = HashMap::new();
        table.insert(ENV, env);
        table.insert(GLOBAL_MATH, math);
        table
    };
}

impl WellKnownImport {
    /// Classify an import by its `(module, base)` pair
    pub fn classify(module: &str, base: &str) -> Option<Self> {
        WELL_KNOWN_IMPORTS
            .get(module)
            .and_then(|bases| bases.get(base))
            .copied()
    }

    /// Classify a function; defined functions are never well-known imports
    pub fn of(func: &Function) -> Option<Self> {
        func.import
            .as_ref()
            .and_then(|im| Self::classify(&im.module, &im.base))
    }

    /// A function in the module imported as this well-known import
    pub fn find(self, module: &Module) -> Option<&Function> {
        WELL_KNOWN_IMPORTS.iter().find_map(|(namespace, bases)| {
            bases
                .iter()
                .filter(|(_, import)| **import == self)
                .find_map(|(base, _)| module.imported_function(namespace, base))
        })
    }

    /// Whether this import is a host math function
    pub fn is_host_math(self) -> bool {
        matches!(self, WellKnownImport::MathPow)
    }
}
