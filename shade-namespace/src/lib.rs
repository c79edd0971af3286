//! Shadow namespace identity and recursion control
//!
//! This crate tracks which isolated copy of a shared library the calling
//! code belongs to:
//! - Thread binding - the namespace each thread is executing in
//! - Trampoline flags - per-namespace guard against recursive redirection
//! - Registry - load checks and host namespace resolution
//! - Public API - the C entry points used by dispatch collaborators

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api;
pub mod fault;
pub mod registry;
pub mod resolver;
pub mod shared;
pub mod thread;
pub mod trampoline;

pub use api::{shade_shared_hook, shade_thread_group_getter, thread_group_getter};
pub use fault::SegvDisposition;
pub use registry::{DEFAULT_PROBE_FLAGS, NamespaceRegistry};
#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub use resolver::DynamicLinker;
pub use resolver::{MockResolver, ModuleHandle, ModuleRecord, NamespaceResolver};
pub use trampoline::{TrampolineGuard, flag_for};

// Re-export commonly used types
pub use shade_core::{MAX_NAMESPACES, NamespaceId};
