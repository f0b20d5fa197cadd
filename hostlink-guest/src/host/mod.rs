//! Typed wrappers over the `hostlink` imports.
//!
//! Every host object is a [`Value`]: an owned handle that releases its heap
//! slot on drop. The wrappers in the submodules are newtypes over `Value`
//! that know which imports apply to them.

mod dom;
mod event;
mod fetch;
mod gl;

use std::fmt;
use std::mem::ManuallyDrop;

use hostlink_abi::handles::{is_sentinel, FALSE, NULL, TRUE, UNDEFINED};
use hostlink_abi::kind::InstanceKind;
use hostlink_abi::records::{BOOL_FALSE, BOOL_TRUE};

use crate::ret::RetArea;
use crate::sys;

pub use dom::{window, Canvas, Document, Element, Performance, Window};
pub use event::{Event, KeyboardEvent, MouseEvent, Touch, TouchEvent, TouchList, WheelEvent};
pub use fetch::{Bytes, Promise, Response};
pub use gl::{Gl, GlBuffer, GlProgram, GlShader, GlTexture, GlUniformLocation, GlVertexArray};

/// An owned reference to a host value.
pub struct Value(u32);

impl Value {
    pub const fn undefined() -> Self {
        Self(UNDEFINED)
    }

    pub const fn null() -> Self {
        Self(NULL)
    }

    pub const fn from_bool(b: bool) -> Self {
        Self(if b { TRUE } else { FALSE })
    }

    /// Takes ownership of a handle the host handed out.
    pub const fn from_raw(handle: u32) -> Self {
        Self(handle)
    }

    /// Gives up ownership without releasing the handle.
    pub fn into_raw(self) -> u32 {
        ManuallyDrop::new(self).0
    }

    pub fn raw(&self) -> u32 {
        self.0
    }

    pub fn is_undefined(&self) -> bool {
        unsafe { sys::is_undefined(self.0) != 0 }
    }

    pub fn is_null(&self) -> bool {
        unsafe { sys::is_null(self.0) != 0 }
    }

    /// `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        self.0 == UNDEFINED || self.0 == NULL || self.is_undefined() || self.is_null()
    }

    pub fn is_function(&self) -> bool {
        unsafe { sys::is_function(self.0) != 0 }
    }

    pub fn is_instance_of(&self, kind: InstanceKind) -> bool {
        unsafe { sys::instance_of(self.0, kind.code()) != 0 }
    }

    pub fn as_string(&self) -> Option<String> {
        take_string(|ret| unsafe { sys::string_get(ret, self.0) })
    }

    pub fn as_f64(&self) -> Option<f64> {
        let mut area = RetArea::new();
        unsafe { sys::number_get(area.offset(), self.0) };
        area.number()
    }

    pub fn as_bool(&self) -> Option<bool> {
        match unsafe { sys::boolean_get(self.0) } {
            BOOL_TRUE => Some(true),
            BOOL_FALSE => Some(false),
            _ => None,
        }
    }

    /// The host's rendering of the value, as used in error messages.
    pub fn debug_string(&self) -> String {
        take_string(|ret| unsafe { sys::debug_string(ret, self.0) }).unwrap_or_default()
    }

    /// Casts to a typed wrapper, or hands the value back if it is not an
    /// instance of `T`.
    pub fn cast<T: HostType>(self) -> Result<T, Value> {
        if self.is_instance_of(T::KIND) {
            Ok(T::from_value(self))
        } else {
            Err(self)
        }
    }
}

impl Clone for Value {
    fn clone(&self) -> Self {
        if is_sentinel(self.0) {
            Self(self.0)
        } else {
            Self(unsafe { sys::object_clone_ref(self.0) })
        }
    }
}

impl Drop for Value {
    fn drop(&mut self) {
        if !is_sentinel(self.0) {
            unsafe { sys::object_drop_ref(self.0) }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {})", self.0, self.debug_string())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(unsafe { sys::string_new(s.as_ptr(), s.len()) })
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self(unsafe { sys::number_new(n) })
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::from_bool(b)
    }
}

/// A typed view of a host object.
pub trait HostType: Sized {
    const KIND: InstanceKind;

    fn from_value(value: Value) -> Self;
    fn as_value(&self) -> &Value;
}

macro_rules! host_type {
    ($name:ident, $kind:ident) => {
        impl $crate::host::HostType for $name {
            const KIND: ::hostlink_abi::kind::InstanceKind =
                ::hostlink_abi::kind::InstanceKind::$kind;

            fn from_value(value: $crate::host::Value) -> Self {
                Self(value)
            }

            fn as_value(&self) -> &$crate::host::Value {
                &self.0
            }
        }

        impl From<$name> for $crate::host::Value {
            fn from(typed: $name) -> Self {
                typed.0
            }
        }
    };
}
pub(crate) use host_type;

/// An exception raised by the host, owned by the module.
pub struct HostError(Value);

pub type HostResult<T> = Result<T, HostError>;

impl HostError {
    pub fn new(message: &str) -> Self {
        Self(Value(unsafe { sys::error_new(message.as_ptr(), message.len()) }))
    }

    pub fn message(&self) -> String {
        self.0.debug_string()
    }

    pub fn stack(&self) -> Option<String> {
        take_string(|ret| unsafe { sys::error_stack(ret, self.0.raw()) })
    }

    /// Re-raises the exception in the host. Never returns.
    pub fn throw(self) -> ! {
        unsafe { sys::rethrow(self.0.into_raw()) };
        core::arch::wasm32::unreachable()
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for HostError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Debug for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("HostError").field(&self.message()).finish()
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for HostError {}

/// Raises a new `Error` with `message` in the host. Never returns.
pub fn throw_str(message: &str) -> ! {
    unsafe { sys::throw(message.as_ptr(), message.len()) };
    core::arch::wasm32::unreachable()
}

/// Runs a fallible import against a fresh return area.
pub(crate) fn fallible(call: impl FnOnce(u32)) -> HostResult<u32> {
    let mut area = RetArea::new();
    call(area.offset());
    area.call_result().map_err(|h| HostError(Value(h)))
}

/// Runs a string-returning import and takes ownership of the host's
/// allocation, which is sized exactly to the string.
pub(crate) fn take_string(call: impl FnOnce(u32)) -> Option<String> {
    let mut area = RetArea::new();
    call(area.offset());
    let ret = area.str_ret();
    if ret.is_absent() {
        return None;
    }
    let (ptr, len) = (ret.ptr as usize as *mut u8, ret.len as usize);
    Some(unsafe { String::from_raw_parts(ptr, len, len) })
}

pub mod console {
    use crate::sys;

    pub fn log(message: &str) {
        unsafe { sys::console_log(message.as_ptr(), message.len()) }
    }

    pub fn warn(message: &str) {
        unsafe { sys::console_warn(message.as_ptr(), message.len()) }
    }

    pub fn error(message: &str) {
        unsafe { sys::console_error(message.as_ptr(), message.len()) }
    }
}

type Callback = Box<dyn FnMut(Value)>;

/// A Rust closure the host can call, owned through a function handle.
///
/// Dropping the `Closure` releases it: installed handlers and queued
/// callbacks that still point at it stop firing, and its environment is
/// freed right away (or, when dropped from inside its own call, through
/// `hl_closure_drop` once that call returns). Keep the `Closure` alive for
/// as long as it must run, or hand it to the host with
/// [`forget`](Self::forget).
pub struct Closure {
    handle: u32,
    env: *mut Callback,
}

impl Closure {
    pub fn new(f: impl FnMut(Value) + 'static) -> Self {
        let env: *mut Callback = Box::into_raw(Box::new(Box::new(f)));
        let handle = unsafe { sys::closure_new(env as usize as u32, 0, 0) };
        Self { handle, env }
    }

    /// A closure that runs `f` on its first call and ignores later ones.
    pub fn once(f: impl FnOnce(Value) + 'static) -> Self {
        let mut f = Some(f);
        Self::new(move |arg| {
            if let Some(f) = f.take() {
                f(arg)
            }
        })
    }

    pub fn raw(&self) -> u32 {
        self.handle
    }

    /// Releases the handle but leaves the closure to the host, which
    /// destroys it once nothing references it.
    pub fn forget(self) {
        let this = ManuallyDrop::new(self);
        unsafe { sys::object_drop_ref(this.handle) }
    }
}

impl Drop for Closure {
    fn drop(&mut self) {
        if unsafe { sys::closure_drop(self.handle) } == 1 {
            drop(unsafe { Box::from_raw(self.env) });
        }
    }
}

/// Calls the closure whose environment lives at `env`.
///
/// # Safety
/// `env` must come from [`Closure::new`] and not have been destroyed.
pub(crate) unsafe fn invoke(env: u32, arg: u32) {
    let callback = &mut *(env as usize as *mut Callback);
    callback(Value::from_raw(arg));
}

/// Destroys the closure environment at `env`.
///
/// # Safety
/// `env` must come from [`Closure::new`] and be destroyed only once.
pub(crate) unsafe fn destroy(env: u32) {
    drop(Box::from_raw(env as usize as *mut Callback));
}

/// Queues `f` to run before control returns to the host's event loop.
pub fn queue_microtask(f: impl FnOnce() + 'static) {
    let closure = Closure::once(move |_| f());
    unsafe { sys::queue_microtask(closure.raw()) };
    closure.forget();
}

pub fn math_random() -> f64 {
    unsafe { sys::math_random() }
}
