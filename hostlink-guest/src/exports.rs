//! Exports the host calls into: the allocator, the closure trampolines and
//! the start hook used by [`entry!`](crate::entry).

use std::alloc::{alloc, dealloc, realloc, Layout};
use std::ptr;

use crate::host;

#[no_mangle]
pub unsafe extern "C" fn hl_alloc(size: usize, align: usize) -> *mut u8 {
    if size == 0 {
        return align as *mut u8;
    }
    match Layout::from_size_align(size, align) {
        Ok(layout) => alloc(layout),
        Err(_) => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn hl_realloc(
    ptr: *mut u8,
    old_size: usize,
    new_size: usize,
    align: usize,
) -> *mut u8 {
    if old_size == 0 {
        return hl_alloc(new_size, align);
    }
    let Ok(layout) = Layout::from_size_align(old_size, align) else {
        return ptr::null_mut();
    };
    if new_size == 0 {
        dealloc(ptr, layout);
        return align as *mut u8;
    }
    realloc(ptr, layout, new_size)
}

#[no_mangle]
pub unsafe extern "C" fn hl_free(ptr: *mut u8, size: usize, align: usize) {
    if size == 0 {
        return;
    }
    if let Ok(layout) = Layout::from_size_align(size, align) {
        dealloc(ptr, layout);
    }
}

#[no_mangle]
pub unsafe extern "C" fn hl_closure_invoke(a: u32, _b: u32, arg: u32) {
    host::invoke(a, arg);
}

#[no_mangle]
pub unsafe extern "C" fn hl_closure_drop(_dtor: u32, a: u32, _b: u32) {
    host::destroy(a);
}

/// Installs the panic hook and runs the module's entry point.
pub fn start(main: fn()) {
    std::panic::set_hook(Box::new(|info| host::console::error(&info.to_string())));
    main();
}
