//! Compute-module side of the hostlink boundary.
//!
//! Provides the exports every module needs (`hl_alloc`, `hl_realloc`,
//! `hl_free` and the closure trampolines), typed wrappers over the
//! `hostlink` imports, and plain helpers for input and frame timing that
//! build on any target.

#[cfg(target_arch = "wasm32")]
pub mod exports;
pub mod frame;
#[cfg(target_arch = "wasm32")]
pub mod host;
pub mod input;
pub mod logger;
pub mod ret;
#[cfg(target_arch = "wasm32")]
pub mod sys;

pub use frame::FrameClock;
pub use hostlink_abi::{event::EventKind, gl as consts, kind::InstanceKind};
pub use input::InputState;

/// Declares the module's entry point. Expands to the `hl_start` export,
/// which installs a panic hook that reports to `console.error` and then
/// calls `$main`.
///
/// ```ignore
/// fn main() {
///     hostlink_guest::logger::init_with_level(log::Level::Info).ok();
///     let canvas = hostlink_guest::host::window().document().get_element_by_id("canvas");
/// }
/// hostlink_guest::entry!(main);
/// ```
#[macro_export]
macro_rules! entry {
    ($main:path) => {
        #[no_mangle]
        pub extern "C" fn hl_start() {
            $crate::exports::start($main);
        }
    };
}
