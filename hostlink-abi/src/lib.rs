//! hostlink boundary contract.
//!
//! Everything both sides of the boundary must agree on lives here: the import
//! module name and signature table, the exports a compute module provides,
//! sentinel handle numbers, the `#[repr(C)]` records adapters write into
//! linear memory, WebGL2 enum values and event-kind codes.

pub mod event;
pub mod gl;
pub mod handles;
pub mod imports;
pub mod kind;
pub mod records;

/// Import module name under which every host capability is registered.
pub const IMPORT_MODULE: &str = "hostlink";

/// Linear memory export.
pub const EXPORT_MEMORY: &str = "memory";
/// `(size: i32, align: i32) -> i32`
pub const EXPORT_ALLOC: &str = "hl_alloc";
/// `(ptr: i32, old_size: i32, new_size: i32, align: i32) -> i32`
pub const EXPORT_REALLOC: &str = "hl_realloc";
/// `(ptr: i32, size: i32, align: i32)`, optional.
pub const EXPORT_FREE: &str = "hl_free";
/// `()`, invoked exactly once after instantiation.
pub const EXPORT_START: &str = "hl_start";
/// `(a: i32, b: i32, arg: i32)`, optional; required once a closure is created.
pub const EXPORT_CLOSURE_INVOKE: &str = "hl_closure_invoke";
/// `(dtor: i32, a: i32, b: i32)`, optional; required once a closure is created.
pub const EXPORT_CLOSURE_DROP: &str = "hl_closure_drop";

/// Exports instantiation refuses to proceed without.
pub const REQUIRED_EXPORTS: &[&str] = &[EXPORT_MEMORY, EXPORT_ALLOC, EXPORT_REALLOC, EXPORT_START];
