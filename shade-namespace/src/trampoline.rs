//! Per-namespace recursion guard for trampolined calls
//!
//! A dispatcher sets a namespace's flag before redirecting one of its calls
//! into another namespace, and clears it after the call returns. While the
//! flag is set, calls from that namespace must not take the trampoline path
//! again.
//!
//! The flags are shared by every thread but carry no locking. Callers must
//! ensure at most one thread traverses a given namespace's trampoline path at
//! a time.

use std::sync::atomic::{AtomicBool, Ordering};

use shade_core::{MAX_NAMESPACES, NamespaceId};

use crate::thread;

static TRAMPOLINING: [AtomicBool; MAX_NAMESPACES] =
    [const { AtomicBool::new(false) }; MAX_NAMESPACES];

/// Recursion flag of `namespace`, or of the calling thread's namespace if `None`
///
/// # Panics
/// Panics if the resolved namespace is the base namespace or lies beyond
/// [`MAX_NAMESPACES`]. This is a caller contract violation.
#[must_use]
pub fn flag_for(namespace: Option<NamespaceId>) -> &'static AtomicBool {
    let namespace = namespace.unwrap_or_else(thread::current);
    match namespace.index() {
        Some(slot) if slot < MAX_NAMESPACES => &TRAMPOLINING[slot],
        _ => panic!("trampoline flag requested for invalid namespace {namespace}"),
    }
}

/// Whether `namespace` is in the middle of a trampolined call
#[must_use]
pub fn is_trampolining(namespace: Option<NamespaceId>) -> bool {
    flag_for(namespace).load(Ordering::Acquire)
}

/// Set the recursion flag of `namespace` for the lifetime of the guard
///
/// Returns `None` if the flag is already set, meaning the caller is re-entering
/// its own trampoline path.
///
/// # Panics
/// Panics under the same conditions as [`flag_for`].
#[must_use]
pub fn engage(namespace: Option<NamespaceId>) -> Option<TrampolineGuard> {
    let flag = flag_for(namespace);
    if flag.swap(true, Ordering::AcqRel) {
        return None;
    }
    Some(TrampolineGuard { flag })
}

/// Clears a recursion flag on drop
#[derive(Debug)]
pub struct TrampolineGuard {
    flag: &'static AtomicBool,
}

impl Drop for TrampolineGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
