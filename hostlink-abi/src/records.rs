//! Fixed-layout records adapters write into caller-provided return areas.
//!
//! The boundary only carries numbers, so anything richer than a single
//! scalar comes back through one of these, at an offset the module passes as
//! the first argument (`ret_ptr`).

use bytemuck::{Pod, Zeroable};

/// Outcome of a fallible host call.
///
/// `tag == TAG_OK`: `value` is the call's result (a handle or a number).
/// `tag == TAG_ERR`: `value` is a handle to the host error, owned by the
/// module, which re-raises it in its own control flow.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct CallResult {
    pub tag: u32,
    pub value: u32,
}

impl CallResult {
    pub const TAG_OK: u32 = 0;
    pub const TAG_ERR: u32 = 1;
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn ok(value: u32) -> Self {
        Self { tag: Self::TAG_OK, value }
    }

    pub fn err(error_handle: u32) -> Self {
        Self { tag: Self::TAG_ERR, value: error_handle }
    }

    /// `Ok(value)` or `Err(error_handle)`. Unknown tags are treated as errors.
    pub fn into_result(self) -> Result<u32, u32> {
        if self.tag == Self::TAG_OK {
            Ok(self.value)
        } else {
            Err(self.value)
        }
    }
}

/// A `(ptr, len)` pair describing bytes the host placed in module memory.
/// `ptr == 0` means the value was absent.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Pod, Zeroable)]
pub struct StrRet {
    pub ptr: u32,
    pub len: u32,
}

impl StrRet {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_absent(&self) -> bool {
        self.ptr == 0
    }
}

/// Optional number: `is_some` at offset 0, the value at offset 8.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct NumberRet {
    pub is_some: u32,
    pub _pad: u32,
    pub value: f64,
}

impl NumberRet {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn from_option(value: Option<f64>) -> Self {
        match value {
            Some(value) => Self { is_some: 1, _pad: 0, value },
            None => Self::default(),
        }
    }

    pub fn into_option(self) -> Option<f64> {
        (self.is_some != 0).then_some(self.value)
    }
}

/// `boolean_get` result for a `false` value.
pub const BOOL_FALSE: u32 = 0;
/// `boolean_get` result for a `true` value.
pub const BOOL_TRUE: u32 = 1;
/// `boolean_get` result for anything that is not a boolean.
pub const BOOL_NOT_BOOLEAN: u32 = 2;
