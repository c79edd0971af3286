//! Shared-resource hook slot
//!
//! The shared-resource collaborator calls [`run_hook`] at its extension
//! point. Embedders install the callback through the public API.

use std::sync::{PoisonError, RwLock};

/// Callback run at the shared-resource extension point
pub type SharedHook = extern "C" fn();

static HOOK: RwLock<Option<SharedHook>> = RwLock::new(None);

/// Install `hook`, replacing and returning any previous one
///
/// `None` uninstalls.
pub fn register_hook(hook: Option<SharedHook>) -> Option<SharedHook> {
    let mut slot = HOOK.write().unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, hook)
}

/// Run the installed hook, returning whether there was one
pub fn run_hook() -> bool {
    let hook = *HOOK.read().unwrap_or_else(PoisonError::into_inner);
    hook.map(|hook| hook()).is_some()
}
