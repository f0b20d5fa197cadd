use super::{fallible, host_type, Closure, HostResult, Value};
use crate::sys;

pub struct Promise(Value);
host_type!(Promise, Promise);

impl Promise {
    /// A promise already fulfilled with `value`.
    pub fn resolve(value: &Value) -> Self {
        Self(Value::from_raw(unsafe { sys::promise_resolve(value.raw()) }))
    }

    /// Registers `on_ok`; the returned promise settles after it runs.
    pub fn then(&self, on_ok: &Closure) -> Promise {
        Self(Value::from_raw(unsafe { sys::promise_then(self.0.raw(), on_ok.raw()) }))
    }

    pub fn then2(&self, on_ok: &Closure, on_err: &Closure) -> Promise {
        Self(Value::from_raw(unsafe {
            sys::promise_then2(self.0.raw(), on_ok.raw(), on_err.raw())
        }))
    }
}

pub struct Response(Value);
host_type!(Response, Response);

impl Response {
    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        unsafe { sys::response_ok(self.0.raw()) != 0 }
    }

    pub fn status(&self) -> u16 {
        unsafe { sys::response_status(self.0.raw()) as u16 }
    }

    /// Reads the body. Fails with a `TypeError` when it was already read.
    pub fn array_buffer(&self) -> HostResult<Promise> {
        let raw = fallible(|ret| unsafe { sys::response_array_buffer(ret, self.0.raw()) })?;
        Ok(Promise(Value::from_raw(raw)))
    }
}

/// An `ArrayBuffer`.
pub struct Bytes(Value);
host_type!(Bytes, ArrayBuffer);

impl Bytes {
    /// Copies `data` into a new host buffer.
    pub fn from_slice(data: &[u8]) -> Self {
        Self(Value::from_raw(unsafe { sys::bytes_from_region(data.as_ptr(), data.len()) }))
    }

    pub fn len(&self) -> usize {
        unsafe { sys::bytes_length(self.0.raw()) as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the buffer into `dst`, which must be exactly [`len`](Self::len)
    /// bytes long; the host traps otherwise.
    pub fn copy_to(&self, dst: &mut [u8]) {
        unsafe { sys::bytes_copy_to(self.0.raw(), dst.as_mut_ptr(), dst.len()) }
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = vec![0; self.len()];
        self.copy_to(&mut out);
        out
    }
}
