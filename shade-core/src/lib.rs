//! Shade Core - Foundation types and process-wide settings
//!
//! This crate provides the abstractions shared by every shade crate:
//! namespace identifiers, the error type and the memoized configuration store.

#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    Config, ConfigStore, EnvSource, MapSource, SettingSource, StaticLink, TraceSink,
    abort_on_segv, declare_static_link, no_globals, num_groups, shared_libc,
    static_link_enabled, trace_sink,
};
pub use error::{Error, Result};
pub use types::{Lmid, MAX_NAMESPACES, NamespaceId};
