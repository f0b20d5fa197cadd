//! hostlink runtime: the host side of the compute-module boundary.
//!
//! A [`Session`] owns one instantiated WebAssembly module together with the
//! handle table, closure table and headless host model it calls into. The
//! crate is also built as a cdylib; the `hl_session_*` functions below are
//! its C entry points.

pub mod adapter;
pub mod closure;
pub mod config;
pub mod error;
pub mod heap;
pub mod host;
pub mod instance;
pub mod memory;
mod registry;
pub mod session;
pub mod state;
pub mod value;

pub use adapter::{GuestCx, ImportTable};
pub use config::RuntimeConfig;
pub use error::{BoundaryError, ConfigError, FetchError, InstantiationError, SessionError};
pub use instance::{inspect, InitState, ModuleInfo, ModuleSource};
pub use session::{DispatchOutcome, Session};

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::sync::{LazyLock, Mutex, MutexGuard};

use hostlink_abi::event::EventKind;
use host::event::EventRecord;
use registry::Registry;

struct FfiSession {
    session: Session,
    last_error: Option<CString>,
}

impl FfiSession {
    fn record(&mut self, err: impl std::fmt::Display) {
        log::error!("{err}");
        self.last_error = CString::new(err.to_string().replace('\0', " ")).ok();
    }
}

static SESSIONS: LazyLock<Mutex<Registry<FfiSession>>> =
    LazyLock::new(|| Mutex::new(Registry::new()));

fn sessions() -> MutexGuard<'static, Registry<FfiSession>> {
    SESSIONS.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Runs `f` against a registered session, storing any error it returns.
fn with_session<T>(
    id: u64,
    failed: T,
    f: impl FnOnce(&mut Session) -> Result<T, SessionError>,
) -> T {
    let mut sessions = sessions();
    let Some(entry) = sessions.get_mut(id) else {
        log::warn!("no session {id}");
        return failed;
    };
    match f(&mut entry.session) {
        Ok(value) => value,
        Err(e) => {
            entry.record(e);
            failed
        }
    }
}

/// Reads an optional C string argument; null reads as `None`.
///
/// # Safety
/// `ptr` must be null or point at a NUL-terminated string.
unsafe fn optional_str<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok()
}

// ============================================================
// FFI: Lifecycle
// ============================================================

/// Create a session. `config_toml` may be null for the defaults.
///
/// Returns a session id (> 0) on success, 0 on failure.
///
/// # Safety
/// `config_toml` must be null or point at a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hl_session_create(config_toml: *const c_char) -> u64 {
    let _ = env_logger::try_init();

    let config = match optional_str(config_toml) {
        Some(text) => match RuntimeConfig::from_toml_str(text) {
            Ok(config) => config,
            Err(e) => {
                log::error!("hl_session_create: {e}");
                return 0;
            }
        },
        None => RuntimeConfig::default(),
    };
    match Session::new(config) {
        Ok(session) => sessions().insert(FfiSession {
            session,
            last_error: None,
        }),
        Err(e) => {
            log::error!("hl_session_create: {e}");
            0
        }
    }
}

/// Instantiate a module from `len` bytes at `bytes`. Returns 1 on success,
/// 0 on failure.
///
/// # Safety
/// `bytes` must point at `len` readable bytes.
#[no_mangle]
pub unsafe extern "C" fn hl_session_load(session: u64, bytes: *const u8, len: usize) -> i32 {
    if bytes.is_null() {
        return 0;
    }
    let module = std::slice::from_raw_parts(bytes, len).to_vec();
    load(session, ModuleSource::Bytes(module))
}

/// Instantiate a module from a path or `file://` URL. Returns 1 on
/// success, 0 on failure.
///
/// # Safety
/// `path` must point at a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hl_session_load_path(session: u64, path: *const c_char) -> i32 {
    match optional_str(path) {
        Some(path) => load(session, ModuleSource::locator(path)),
        None => 0,
    }
}

fn load(id: u64, source: ModuleSource) -> i32 {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("failed to start the loader runtime: {e}");
            return 0;
        }
    };
    let mut sessions = sessions();
    let Some(entry) = sessions.get_mut(id) else {
        return 0;
    };
    let result = runtime
        .block_on(entry.session.instantiate(source))
        .map(|_| ());
    match result {
        Ok(()) => 1,
        Err(e) => {
            entry.record(e);
            0
        }
    }
}

/// Destroy a session and the module it runs.
#[no_mangle]
pub extern "C" fn hl_session_destroy(session: u64) {
    let mut sessions = sessions();
    let Some(mut entry) = sessions.remove(session) else {
        return;
    };
    let remaining = sessions.len();
    drop(sessions);
    entry.session.shutdown();
    log::info!("session {session} destroyed, {remaining} still open");
}

// ============================================================
// FFI: Event loop
// ============================================================

/// Run one animation frame. Returns the number of frame callbacks that
/// ran, or -1 on failure.
#[no_mangle]
pub extern "C" fn hl_session_frame(session: u64, time_ms: f64) -> i32 {
    with_session(session, -1, |s| Ok(s.frame(time_ms)? as i32))
}

/// Drain every queued task. Returns the number of tasks run, or -1.
#[no_mangle]
pub extern "C" fn hl_session_run_until_idle(session: u64) -> i32 {
    with_session(session, -1, |s| Ok(s.run_until_idle()? as i32))
}

fn canvas_dispatch(s: &mut Session, event: EventRecord) -> Result<i32, SessionError> {
    let canvas = s.config().canvas.id.clone();
    let outcome = s.dispatch_to(&canvas, event)?;
    Ok(i32::from(outcome.invoked))
}

/// Deliver a keyboard event (`kind` is an event-kind code) to the canvas.
/// Returns 1 if a handler ran, 0 if none is installed, -1 on failure.
///
/// # Safety
/// `code` must point at a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hl_session_key(
    session: u64,
    kind: u32,
    code: *const c_char,
    repeat: i32,
) -> i32 {
    let kind = match EventKind::from_code(kind) {
        Some(kind @ (EventKind::KeyDown | EventKind::KeyUp)) => kind,
        _ => return -1,
    };
    let Some(code) = optional_str(code) else {
        return -1;
    };
    let event = EventRecord::key(kind, code, repeat != 0);
    with_session(session, -1, |s| canvas_dispatch(s, event))
}

/// Deliver a mouse event (`kind` is an event-kind code) to the canvas.
/// Returns 1 if a handler ran, 0 if none is installed, -1 on failure.
#[no_mangle]
pub extern "C" fn hl_session_pointer(session: u64, kind: u32, button: i32, x: i32, y: i32) -> i32 {
    let kind = match EventKind::from_code(kind) {
        Some(kind @ (EventKind::MouseDown | EventKind::MouseMove | EventKind::MouseUp)) => kind,
        _ => return -1,
    };
    let event = EventRecord::mouse(kind, button as i16, x, y);
    with_session(session, -1, |s| canvas_dispatch(s, event))
}

// ============================================================
// FFI: Error handling
// ============================================================

/// The last error recorded for a session, or null. The pointer stays
/// valid until the next call on that session.
#[no_mangle]
pub extern "C" fn hl_session_last_error(session: u64) -> *const c_char {
    sessions()
        .get(session)
        .and_then(|entry| entry.last_error.as_ref())
        .map_or(std::ptr::null(), |err| err.as_ptr())
}
