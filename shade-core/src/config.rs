//! Process-wide settings
//!
//! Every setting is read from its [`SettingSource`] at most once and memoized
//! for the lifetime of the store. Later changes to the source are ignored.
//! Rejected or unusual values are reported once through `tracing` and never
//! cause a failure.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{OnceLock, PoisonError, RwLock};

use crate::types::MAX_NAMESPACES;
use crate::{Error, Result};

/// Environment keys understood by [`ConfigStore`]
pub mod keys {
    /// Number of isolation groups (decimal)
    pub const NUM_GROUPS: &str = "SHADE_NUMGROUPS";
    /// Treat libc as shared code
    pub const SHARED_LIBC: &str = "SHADE_SHAREDLIBC";
    /// Disable shadowing of global variables
    pub const NO_GLOBALS: &str = "SHADE_NOGLOBALS";
    /// Trace global variable accesses
    pub const TRACE_GLOBALS: &str = "SHADE_TRACEGLOBALS";
    /// Abort instead of delegating segmentation faults
    pub const ABORT_SEGV: &str = "SHADE_ABORTSEGV";
}

/// Where settings come from
pub trait SettingSource: Send + Sync {
    /// Look up a setting, `None` if it is not present
    fn get(&self, key: &str) -> Option<String>;

    /// Check whether a setting is present, regardless of its value
    fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

/// Reads settings from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl SettingSource for EnvSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var_os(key).map(|value| value.to_string_lossy().into_owned())
    }
}

/// In-memory settings, mutable after construction
#[derive(Debug, Default)]
pub struct MapSource {
    values: RwLock<HashMap<String, String>>,
}

impl MapSource {
    /// Create an empty source
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a setting
    #[must_use]
    pub fn with(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set or overwrite a setting
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Remove a setting
    pub fn remove(&self, key: &str) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

impl SettingSource for MapSource {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

/// Static-link capability supplied by the packaging step
///
/// Absence is the normal "disabled" state. A capability that is present but
/// set to `false` is also disabled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticLink(Option<bool>);

static DECLARED_STATIC_LINK: OnceLock<bool> = OnceLock::new();

impl StaticLink {
    /// No capability was supplied
    pub const ABSENT: Self = Self(None);

    /// A capability carrying `value`
    #[must_use]
    pub const fn linked(value: bool) -> Self {
        Self(Some(value))
    }

    /// The capability baked in at build time through `SHADE_STATICLINK`
    #[must_use]
    pub fn from_build_env() -> Self {
        match option_env!("SHADE_STATICLINK") {
            None => Self::ABSENT,
            Some(value) => Self::linked(matches!(value.trim(), "1" | "true" | "yes")),
        }
    }

    /// The capability for this process: a startup declaration wins over the build-time one
    #[must_use]
    pub fn packaged() -> Self {
        DECLARED_STATIC_LINK
            .get()
            .map_or_else(Self::from_build_env, |&value| Self::linked(value))
    }

    /// Check for the capability first, then read its value
    #[must_use]
    pub const fn enabled(self) -> bool {
        match self.0 {
            Some(value) => value,
            None => false,
        }
    }
}

/// Declare the static-link capability at startup
///
/// Must run before the global configuration is first accessed.
///
/// # Errors
/// Returns error if a capability was already declared, or if the global
/// configuration has already been read
pub fn declare_static_link(value: bool) -> Result<()> {
    if GLOBAL.get().is_some() {
        return Err(Error::InvalidConfig {
            message: "Static-link capability declared after configuration was read".to_string(),
        });
    }
    DECLARED_STATIC_LINK
        .set(value)
        .map_err(|_| Error::InvalidConfig {
            message: "Static-link capability already declared".to_string(),
        })
}

/// Diagnostic sink for global variable access tracing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceSink {
    _private: (),
}

impl TraceSink {
    const STDERR: Self = Self { _private: () };

    /// Write one trace line to the standard diagnostic stream
    pub fn record(&self, args: fmt::Arguments<'_>) {
        // Tracing output is best-effort.
        let _ = self.record_to(&mut std::io::stderr().lock(), args);
    }

    /// Write one trace line to `writer`
    ///
    /// # Errors
    /// Returns error if the write fails
    pub fn record_to(&self, writer: &mut impl Write, args: fmt::Arguments<'_>) -> Result<()> {
        writeln!(writer, "{args}")?;
        Ok(())
    }
}

/// Immutable view of every setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Static-link mode
    pub static_linked: bool,
    /// Number of isolation groups, in `[1, MAX_NAMESPACES]`
    pub num_groups: usize,
    /// libc is shared rather than isolated
    pub shared_libc: bool,
    /// Cross-namespace global shadowing is disabled
    pub no_globals: bool,
    /// Global access tracing is enabled
    pub trace_globals: bool,
    /// Abort on segmentation fault instead of delegating
    pub abort_on_segv: bool,
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Configuration:")?;
        writeln!(f, "  static linked:  {}", self.static_linked)?;
        writeln!(f, "  groups:         {}", self.num_groups)?;
        writeln!(f, "  shared libc:    {}", self.shared_libc)?;
        writeln!(f, "  no globals:     {}", self.no_globals)?;
        writeln!(f, "  trace globals:  {}", self.trace_globals)?;
        writeln!(f, "  abort on segv:  {}", self.abort_on_segv)
    }
}

/// Outcome of parsing a requested group count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupCount {
    /// A usable count
    Valid(usize),
    /// No leading digits
    NonNumeric,
    /// Zero, negative, too large or overflowing
    OutOfRange,
}

/// Parse a group count the way `sscanf("%zd")` would
///
/// Leading whitespace and a sign are accepted, trailing text is ignored.
#[must_use]
pub fn parse_group_count(raw: &str) -> GroupCount {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return GroupCount::NonNumeric;
    }

    match digits[..end].parse::<usize>() {
        Ok(count) if !negative && count != 0 && count <= MAX_NAMESPACES => {
            GroupCount::Valid(count)
        }
        _ => GroupCount::OutOfRange,
    }
}

/// Memoized settings read from a [`SettingSource`]
#[derive(Debug)]
pub struct ConfigStore<S = EnvSource> {
    source: S,
    static_link: StaticLink,
    num_groups: OnceLock<usize>,
    shared_libc: OnceLock<bool>,
    no_globals: OnceLock<bool>,
    trace_globals: OnceLock<Option<TraceSink>>,
    abort_on_segv: OnceLock<bool>,
}

static GLOBAL: OnceLock<ConfigStore<EnvSource>> = OnceLock::new();

impl ConfigStore<EnvSource> {
    /// The process-wide store over the environment
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::new(EnvSource).with_static_link(StaticLink::packaged()))
    }
}

impl<S: SettingSource> ConfigStore<S> {
    /// Create a store with no static-link capability
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source,
            static_link: StaticLink::ABSENT,
            num_groups: OnceLock::new(),
            shared_libc: OnceLock::new(),
            no_globals: OnceLock::new(),
            trace_globals: OnceLock::new(),
            abort_on_segv: OnceLock::new(),
        }
    }

    /// Supply the static-link capability
    #[must_use]
    pub fn with_static_link(mut self, static_link: StaticLink) -> Self {
        self.static_link = static_link;
        self
    }

    /// Get the underlying source
    #[must_use]
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Whether the packaging step linked this process statically. Never logs.
    #[must_use]
    pub const fn static_link_enabled(&self) -> bool {
        self.static_link.enabled()
    }

    /// Number of isolation groups, always in `[1, MAX_NAMESPACES]`
    pub fn num_groups(&self) -> usize {
        *self.num_groups.get_or_init(|| {
            let Some(requested) = self.source.get(keys::NUM_GROUPS) else {
                return MAX_NAMESPACES;
            };
            match parse_group_count(&requested) {
                GroupCount::Valid(count) => count,
                GroupCount::NonNumeric => {
                    tracing::warn!(
                        requested = %requested,
                        "Ignoring non-numeric number of groups"
                    );
                    MAX_NAMESPACES
                }
                GroupCount::OutOfRange => {
                    tracing::warn!(
                        requested = %requested,
                        "Ignoring request for a number of groups outside the supported range of (0,{MAX_NAMESPACES}]"
                    );
                    MAX_NAMESPACES
                }
            }
        })
    }

    /// Treat the entirety of libc as shared code
    pub fn shared_libc(&self) -> bool {
        self.presence(
            &self.shared_libc,
            keys::SHARED_LIBC,
            "Treating entirety of libc as shared code",
        )
    }

    /// Disable shadowing of global variables
    pub fn no_globals(&self) -> bool {
        self.presence(
            &self.no_globals,
            keys::NO_GLOBALS,
            "Shadowing of global variables has been disabled",
        )
    }

    /// Sink for global variable access tracing, if enabled
    pub fn trace_sink(&self) -> Option<TraceSink> {
        *self.trace_globals.get_or_init(|| {
            self.source.contains(keys::TRACE_GLOBALS).then(|| {
                tracing::info!("Global variable access tracing has been enabled");
                TraceSink::STDERR
            })
        })
    }

    /// Abort rather than calling the segfault handler
    pub fn abort_on_segv(&self) -> bool {
        self.presence(
            &self.abort_on_segv,
            keys::ABORT_SEGV,
            "Will abort rather than calling segfault handler",
        )
    }

    /// Read every setting into a snapshot
    pub fn snapshot(&self) -> Config {
        Config {
            static_linked: self.static_link_enabled(),
            num_groups: self.num_groups(),
            shared_libc: self.shared_libc(),
            no_globals: self.no_globals(),
            trace_globals: self.trace_sink().is_some(),
            abort_on_segv: self.abort_on_segv(),
        }
    }

    fn presence(&self, cell: &OnceLock<bool>, key: &str, notice: &str) -> bool {
        *cell.get_or_init(|| {
            let present = self.source.contains(key);
            if present {
                tracing::info!("{notice}");
            }
            present
        })
    }
}

/// Static-link mode of this process
#[must_use]
pub fn static_link_enabled() -> bool {
    ConfigStore::global().static_link_enabled()
}

/// Number of isolation groups of this process
#[must_use]
pub fn num_groups() -> usize {
    ConfigStore::global().num_groups()
}

/// Whether libc is shared in this process
#[must_use]
pub fn shared_libc() -> bool {
    ConfigStore::global().shared_libc()
}

/// Whether global shadowing is disabled in this process
#[must_use]
pub fn no_globals() -> bool {
    ConfigStore::global().no_globals()
}

/// Trace sink of this process, if enabled
#[must_use]
pub fn trace_sink() -> Option<TraceSink> {
    ConfigStore::global().trace_sink()
}

/// Whether this process aborts on segmentation faults
#[must_use]
pub fn abort_on_segv() -> bool {
    ConfigStore::global().abort_on_segv()
}
