use std::path::PathBuf;

use thiserror::Error;

use crate::instance::InitState;

/// Violations of the boundary contract. These are programming errors on one
/// side or the other: the adapter that hits one traps the current call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoundaryError {
    #[error("invalid UTF-8 in module memory at {ptr:#x}+{len}: {source}")]
    Decode {
        ptr: u32,
        len: u32,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("range {ptr:#x}+{len} is outside linear memory of {size} bytes")]
    OutOfBounds { ptr: u32, len: u32, size: usize },
    #[error("handle {0} does not refer to a live value")]
    InvalidHandle(u32),
    #[error("handle {handle} holds {found}, expected {expected}")]
    TypeMismatch {
        handle: u32,
        expected: &'static str,
        found: &'static str,
    },
    #[error("unknown {what} code {code}")]
    UnknownCode { what: &'static str, code: u32 },
    #[error("view was acquired before the memory region grew")]
    StaleView,
    #[error("module does not export `{0}`")]
    MissingExport(&'static str),
    #[error("module allocator failed: {0}")]
    Alloc(String),
    #[error("host import called before module memory was bound")]
    Unbound,
    #[error("module threw: {0}")]
    Thrown(String),
    #[error("module rethrew host error: {0}")]
    Rethrown(String),
}

/// Failure to bring a module from `Uninitialized` to `Started`.
///
/// Nothing is retained after one of these; the caller starts over.
#[derive(Debug, Error)]
pub enum InstantiationError {
    #[error("failed to fetch module from {locator}: {reason}")]
    Fetch { locator: String, reason: String },
    #[error("failed to compile module: {0}")]
    Compile(String),
    #[error("failed to link module: {0}")]
    Link(String),
    #[error("module does not export `{0}`")]
    MissingExport(&'static str),
    #[error("module start function failed: {0}")]
    Start(String),
    #[error("session was terminated by a module trap")]
    Terminated,
}

/// Errors from calls made against a session after instantiation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("module is not started (state: {0:?})")]
    NotStarted(InitState),
    #[error("module trapped: {0}")]
    Trap(String),
    #[error("uncaught exception: {0}")]
    Uncaught(String),
    #[error(transparent)]
    Boundary(#[from] BoundaryError),
    #[error("export `{name}` is unusable: {reason}")]
    Export { name: String, reason: String },
    #[error("no element with id `{0}`")]
    NoSuchElement(String),
    #[error("task queue did not drain after {0} steps")]
    Runaway(usize),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failure of a resource fetch issued by a module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource not found: {0}")]
    NotFound(String),
    #[error("resource path escapes the resource root: {0}")]
    Forbidden(String),
    #[error("failed to read {url}: {reason}")]
    Io { url: String, reason: String },
}
