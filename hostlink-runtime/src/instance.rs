//! Module sources, compilation and the initialization state machine.

use std::fmt;

use hostlink_abi::imports::{self, ImportSig, ValType};
use hostlink_abi::{IMPORT_MODULE, REQUIRED_EXPORTS};
use wasmtime::{Engine, ExternType, FuncType, Module};

use crate::adapter::ImportTable;
use crate::error::InstantiationError;

/// Where a session is in bringing up its module.
///
/// `Uninitialized → Instantiating → MemoryBound → Started`. A trap in the
/// module moves a started session to `Terminated`; a failed instantiation
/// goes back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Instantiating,
    MemoryBound,
    Started,
    Terminated,
}

/// A compute module, in whatever form the embedder has it.
#[derive(Clone)]
pub enum ModuleSource {
    /// A binary (or WAT text) already in memory.
    Bytes(Vec<u8>),
    /// A filesystem path, `file://` URL or, with the `http` feature, an
    /// `http(s)://` URL.
    Locator(String),
    Compiled(Module),
}

impl ModuleSource {
    pub fn locator(locator: impl Into<String>) -> Self {
        ModuleSource::Locator(locator.into())
    }
}

impl fmt::Debug for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleSource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            ModuleSource::Locator(locator) => write!(f, "Locator({locator:?})"),
            ModuleSource::Compiled(_) => f.write_str("Compiled"),
        }
    }
}

impl From<Vec<u8>> for ModuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        ModuleSource::Bytes(bytes)
    }
}

impl From<&[u8]> for ModuleSource {
    fn from(bytes: &[u8]) -> Self {
        ModuleSource::Bytes(bytes.to_vec())
    }
}

impl From<&str> for ModuleSource {
    /// WAT text.
    fn from(text: &str) -> Self {
        ModuleSource::Bytes(text.as_bytes().to_vec())
    }
}

impl From<Module> for ModuleSource {
    fn from(module: Module) -> Self {
        ModuleSource::Compiled(module)
    }
}

pub fn compile(engine: &Engine, bytes: &[u8]) -> Result<Module, InstantiationError> {
    Module::new(engine, bytes).map_err(|e| InstantiationError::Compile(format!("{e:#}")))
}

/// Reads the module a locator points at.
pub async fn fetch_locator(locator: &str) -> Result<Vec<u8>, InstantiationError> {
    if locator.starts_with("http://") || locator.starts_with("https://") {
        return fetch_http(locator).await;
    }
    let path = locator.strip_prefix("file://").unwrap_or(locator);
    log::debug!("reading module from {path}");
    tokio::fs::read(path)
        .await
        .map_err(|e| InstantiationError::Fetch {
            locator: locator.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(feature = "http")]
async fn fetch_http(url: &str) -> Result<Vec<u8>, InstantiationError> {
    let fail = |e: reqwest::Error| InstantiationError::Fetch {
        locator: url.to_string(),
        reason: e.to_string(),
    };
    log::debug!("downloading module from {url}");
    let response = reqwest::get(url)
        .await
        .map_err(fail)?
        .error_for_status()
        .map_err(fail)?;
    Ok(response.bytes().await.map_err(fail)?.to_vec())
}

#[cfg(not(feature = "http"))]
async fn fetch_http(url: &str) -> Result<Vec<u8>, InstantiationError> {
    Err(InstantiationError::Fetch {
        locator: url.to_string(),
        reason: "http(s) locators need the `http` feature".to_string(),
    })
}

/// One import a module declares, checked against an import table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportInfo {
    pub module: String,
    pub name: String,
    /// The declared function type, e.g. `(i32, i32) -> i32`.
    pub signature: String,
    pub status: ImportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Provided,
    /// Known name, different function type.
    SignatureMismatch,
    Missing,
}

/// What a module needs from the host and what it offers.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub imports: Vec<ImportInfo>,
    pub exports: Vec<String>,
    pub missing_exports: Vec<&'static str>,
}

impl ModuleInfo {
    /// Whether instantiation against the inspected table can succeed.
    pub fn is_linkable(&self) -> bool {
        self.missing_exports.is_empty()
            && self
                .imports
                .iter()
                .all(|import| import.status == ImportStatus::Provided)
    }
}

fn format_func_type(ty: &FuncType) -> String {
    let params: Vec<String> = ty.params().map(|p| p.to_string()).collect();
    let results: Vec<String> = ty.results().map(|r| r.to_string()).collect();
    match results.as_slice() {
        [] => format!("({})", params.join(", ")),
        _ => format!("({}) -> {}", params.join(", "), results.join(", ")),
    }
}

fn same_type(actual: &wasmtime::ValType, expected: ValType) -> bool {
    matches!(
        (actual, expected),
        (wasmtime::ValType::I32, ValType::I32)
            | (wasmtime::ValType::F32, ValType::F32)
            | (wasmtime::ValType::F64, ValType::F64)
    )
}

fn matches_sig(ty: &FuncType, sig: &ImportSig) -> bool {
    ty.params().len() == sig.params.len()
        && ty.results().len() == sig.results.len()
        && ty.params().zip(sig.params).all(|(a, e)| same_type(&a, *e))
        && ty.results().zip(sig.results).all(|(a, e)| same_type(&a, *e))
}

/// Checks a compiled module's imports and exports without instantiating
/// it.
pub fn inspect(module: &Module, table: &ImportTable) -> ModuleInfo {
    let imports = module
        .imports()
        .map(|import| {
            let (signature, func) = match import.ty() {
                ExternType::Func(ty) => (format_func_type(&ty), Some(ty)),
                other => (format!("{other:?}"), None),
            };
            let known = (import.module() == IMPORT_MODULE)
                .then(|| imports::lookup(import.name()))
                .flatten();
            let status = match (known, func) {
                (Some(sig), Some(ty)) if matches_sig(&ty, sig) => ImportStatus::Provided,
                (Some(_), _) => ImportStatus::SignatureMismatch,
                (None, _) if table.provides(import.module(), import.name()) => {
                    ImportStatus::Provided
                }
                (None, _) => ImportStatus::Missing,
            };
            ImportInfo {
                module: import.module().to_string(),
                name: import.name().to_string(),
                signature,
                status,
            }
        })
        .collect();
    let exports: Vec<String> = module.exports().map(|e| e.name().to_string()).collect();
    let missing_exports = REQUIRED_EXPORTS
        .iter()
        .copied()
        .filter(|name| !exports.iter().any(|e| e == name))
        .collect();
    ModuleInfo {
        imports,
        exports,
        missing_exports,
    }
}
