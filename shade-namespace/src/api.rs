//! C ABI for dispatch and shared-resource collaborators
//!
//! Symbol-dispatch code built separately from this crate only needs these
//! two entry points. Both delegate without further checks.

use shade_core::NamespaceId;

use crate::shared::{self, SharedHook};
use crate::thread;

extern "C" fn namespace_getter() -> u8 {
    thread::current().as_raw()
}

/// Function returning the calling thread's current namespace id
#[unsafe(no_mangle)]
pub extern "C" fn shade_thread_group_getter() -> extern "C" fn() -> u8 {
    namespace_getter
}

/// Install the shared-resource hook
#[unsafe(no_mangle)]
pub extern "C" fn shade_shared_hook(hook: Option<SharedHook>) {
    shared::register_hook(hook);
}

/// Rust-side equivalent of [`shade_thread_group_getter`]
#[must_use]
pub fn thread_group_getter() -> fn() -> NamespaceId {
    thread::current
}
