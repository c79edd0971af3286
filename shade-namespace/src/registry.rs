//! Namespace membership probes and host namespace resolution

use std::ffi::{CStr, CString, c_int};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::OnceLock;

use shade_core::{Error, NamespaceId, Result};

use crate::resolver::{ModuleRecord, NamespaceResolver};

/// Probe flags used when the caller has no preference
pub const DEFAULT_PROBE_FLAGS: c_int = libc::RTLD_LAZY;

/// Observes which modules are loaded into which namespace
///
/// The registry never creates namespaces. It only answers questions about
/// the ones the loader has already set up.
#[derive(Debug)]
pub struct NamespaceRegistry<R> {
    resolver: R,
    num_groups: usize,
    host: OnceLock<Option<ModuleRecord>>,
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
static GLOBAL: OnceLock<NamespaceRegistry<crate::resolver::DynamicLinker>> = OnceLock::new();

#[cfg(all(target_os = "linux", target_env = "gnu"))]
impl NamespaceRegistry<crate::resolver::DynamicLinker> {
    /// The process-wide registry over the glibc dynamic linker
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(|| Self::new(crate::resolver::DynamicLinker, shade_core::num_groups()))
    }
}

impl<R: NamespaceResolver> NamespaceRegistry<R> {
    /// Create a registry bounded by `num_groups` isolation groups
    #[must_use]
    pub fn new(resolver: R, num_groups: usize) -> Self {
        Self {
            resolver,
            num_groups,
            host: OnceLock::new(),
        }
    }

    /// Get the resolver
    #[must_use]
    pub const fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Number of isolation groups this registry accepts
    #[must_use]
    pub const fn num_groups(&self) -> usize {
        self.num_groups
    }

    /// Check whether `filename` is already loaded into `namespace`, without loading it
    ///
    /// Ids beyond the configured group count cannot hold anything and are
    /// answered without asking the resolver.
    pub fn resolve_namespace(
        &self,
        namespace: NamespaceId,
        filename: &CStr,
        flags: c_int,
    ) -> bool {
        if usize::from(namespace.as_raw()) > self.num_groups {
            tracing::debug!(
                namespace = %namespace,
                groups = self.num_groups,
                "Probe for namespace beyond configured groups"
            );
            return false;
        }

        let loaded = self.resolver.probe(namespace, filename, flags);
        tracing::debug!(
            namespace = %namespace,
            filename = ?filename,
            loaded,
            "Probed namespace"
        );
        loaded
    }

    /// Path-based variant of [`resolve_namespace`](Self::resolve_namespace)
    ///
    /// # Errors
    /// Returns error if `path` contains a NUL byte
    pub fn probe_path(&self, namespace: NamespaceId, path: &Path, flags: c_int) -> Result<bool> {
        let filename =
            CString::new(path.as_os_str().as_bytes()).map_err(|e| Error::Namespace {
                message: format!("Invalid module path {}: {e}", path.display()),
            })?;
        Ok(self.resolve_namespace(namespace, &filename, flags))
    }

    /// Module hosting the running code, or `None` if it cannot be identified
    ///
    /// The first answer is kept for the lifetime of the registry, including
    /// an unknown one.
    pub fn host_namespace(&self) -> Option<&ModuleRecord> {
        self.host
            .get_or_init(|| {
                let Some(own) = self.resolver.own_dynamic() else {
                    tracing::debug!(
                        "Own dynamic section is unavailable, host namespace unknown"
                    );
                    return None;
                };

                let host = self
                    .resolver
                    .modules()
                    .into_iter()
                    .find(|module| module.dynamic == own);
                match &host {
                    Some(module) => tracing::debug!(
                        module = %module.name,
                        handle = module.handle.as_raw(),
                        "Resolved host namespace"
                    ),
                    None => tracing::debug!("No loaded module matches own dynamic section"),
                }
                host
            })
            .as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{MockResolver, ModuleHandle};

    fn id(raw: i64) -> NamespaceId {
        NamespaceId::shadow(raw).unwrap()
    }

    fn module(handle: usize, name: &str, dynamic: usize) -> ModuleRecord {
        ModuleRecord {
            handle: ModuleHandle::from_raw(handle),
            name: name.to_string(),
            dynamic,
        }
    }

    #[test]
    fn test_resolve_namespace_delegates_to_resolver() {
        let resolver = MockResolver::new().with_loaded(id(2), "libfoo.so");
        let registry = NamespaceRegistry::new(resolver.clone(), 4);

        assert!(registry.resolve_namespace(id(2), c"libfoo.so", DEFAULT_PROBE_FLAGS));
        assert!(!registry.resolve_namespace(id(1), c"libfoo.so", DEFAULT_PROBE_FLAGS));
        assert_eq!(resolver.probe_calls(), 2);
    }

    #[test]
    fn test_resolve_namespace_beyond_groups() {
        let resolver = MockResolver::new().with_loaded(id(5), "libfoo.so");
        let registry = NamespaceRegistry::new(resolver.clone(), 4);

        assert!(!registry.resolve_namespace(id(5), c"libfoo.so", DEFAULT_PROBE_FLAGS));
        assert_eq!(resolver.probe_calls(), 0);
    }

    #[test]
    fn test_base_namespace_can_be_probed() {
        let resolver = MockResolver::new().with_loaded(NamespaceId::BASE, "libc.so.6");
        let registry = NamespaceRegistry::new(resolver, 1);

        assert!(registry.resolve_namespace(NamespaceId::BASE, c"libc.so.6", DEFAULT_PROBE_FLAGS));
    }

    #[test]
    fn test_probe_path() {
        let resolver = MockResolver::new().with_loaded(id(1), "/usr/lib/libfoo.so");
        let registry = NamespaceRegistry::new(resolver, 2);

        let loaded = registry
            .probe_path(id(1), Path::new("/usr/lib/libfoo.so"), DEFAULT_PROBE_FLAGS)
            .unwrap();
        assert!(loaded);
        let err = registry
            .probe_path(id(1), Path::new("bad\0path"), DEFAULT_PROBE_FLAGS)
            .unwrap_err();
        assert!(matches!(err, Error::Namespace { .. }));
        assert!(err.to_string().contains("Invalid module path"));
    }

    #[test]
    fn test_host_namespace_matches_dynamic_section() {
        let resolver = MockResolver::new()
            .with_module(module(0x1000, "", 0xa000))
            .with_module(module(0x2000, "/lib/libshade.so", 0xb000))
            .with_own_dynamic(0xb000);
        let registry = NamespaceRegistry::new(resolver, 2);

        let host = registry.host_namespace().unwrap();
        assert_eq!(host.handle, ModuleHandle::from_raw(0x2000));
        assert_eq!(host.name, "/lib/libshade.so");
    }

    #[test]
    fn test_host_namespace_is_memoized() {
        let resolver = MockResolver::new()
            .with_module(module(0x1000, "", 0xa000))
            .with_own_dynamic(0xa000);
        let registry = NamespaceRegistry::new(resolver.clone(), 2);

        let first = registry.host_namespace().cloned();
        let second = registry.host_namespace().cloned();
        assert_eq!(first, second);
        assert!(first.is_some());
        assert_eq!(resolver.scan_calls(), 1);
    }

    #[test]
    fn test_unknown_host_namespace_is_memoized() {
        let resolver = MockResolver::new()
            .with_module(module(0x1000, "", 0xa000))
            .with_own_dynamic(0xdead);
        let registry = NamespaceRegistry::new(resolver.clone(), 2);

        assert!(registry.host_namespace().is_none());
        assert!(registry.host_namespace().is_none());
        assert_eq!(resolver.scan_calls(), 1);
    }

    #[test]
    fn test_host_namespace_without_own_dynamic() {
        let resolver = MockResolver::new().with_module(module(0x1000, "", 0xa000));
        let registry = NamespaceRegistry::new(resolver.clone(), 2);

        assert!(registry.host_namespace().is_none());
        assert_eq!(resolver.scan_calls(), 0);
    }
}
