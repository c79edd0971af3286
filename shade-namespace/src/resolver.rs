//! Namespace identity resolution
//!
//! Resolving which objects live in which link-map list depends on the dynamic
//! linker. The [`NamespaceResolver`] trait keeps that behind a seam:
//! - [`DynamicLinker`] - glibc, through `dlmopen(3)` and `dladdr1(3)`
//! - [`MockResolver`] - Testing without touching the dynamic linker

use std::collections::HashSet;
use std::ffi::{CStr, CString, c_int};
use std::sync::{Arc, Mutex, PoisonError};

use shade_core::NamespaceId;

/// Identity of a loaded module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(usize);

impl ModuleHandle {
    /// Create from a raw link-map address
    #[must_use]
    pub const fn from_raw(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw link-map address
    #[must_use]
    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// A loaded module as recorded by the dynamic linker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRecord {
    /// Module identity
    pub handle: ModuleHandle,
    /// Path the module was loaded from, empty for the main program
    pub name: String,
    /// Address of the module's dynamic section
    pub dynamic: usize,
}

/// Trait for observing the dynamic linker's namespaces
///
/// Implementations only observe. They never load or unload anything.
pub trait NamespaceResolver: Send + Sync {
    /// Check whether `filename` is already loaded into `namespace`
    ///
    /// Must not load the object as a side effect, and must release any handle
    /// obtained for the check.
    fn probe(&self, namespace: NamespaceId, filename: &CStr, flags: c_int) -> bool;

    /// Module records of every currently loaded module
    fn modules(&self) -> Vec<ModuleRecord>;

    /// Address of the dynamic section of the object containing this code
    fn own_dynamic(&self) -> Option<usize>;
}

impl<R: NamespaceResolver + ?Sized> NamespaceResolver for Arc<R> {
    fn probe(&self, namespace: NamespaceId, filename: &CStr, flags: c_int) -> bool {
        (**self).probe(namespace, filename, flags)
    }

    fn modules(&self) -> Vec<ModuleRecord> {
        (**self).modules()
    }

    fn own_dynamic(&self) -> Option<usize> {
        (**self).own_dynamic()
    }
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
pub use glibc::DynamicLinker;

#[cfg(all(target_os = "linux", target_env = "gnu"))]
mod glibc {
    use std::ffi::{CStr, c_char, c_int, c_void};
    use std::mem::MaybeUninit;
    use std::ptr;

    use shade_core::{Lmid, NamespaceId};

    use super::{ModuleHandle, ModuleRecord, NamespaceResolver};

    const RTLD_DL_LINKMAP: c_int = 2;

    // Public prefix of glibc's `struct link_map` from <link.h>.
    #[repr(C)]
    #[allow(dead_code)]
    struct LinkMap {
        l_addr: usize,
        l_name: *const c_char,
        l_ld: *const c_void,
        l_next: *const LinkMap,
        l_prev: *const LinkMap,
    }

    unsafe extern "C" {
        fn dlmopen(lmid: Lmid, filename: *const c_char, flags: c_int) -> *mut c_void;
        fn dladdr1(
            addr: *const c_void,
            info: *mut libc::Dl_info,
            extra_info: *mut *mut c_void,
            flags: c_int,
        ) -> c_int;
    }

    static MARKER: u8 = 0;

    /// Resolver backed by the glibc dynamic linker
    #[derive(Debug, Clone, Copy, Default)]
    pub struct DynamicLinker;

    impl NamespaceResolver for DynamicLinker {
        fn probe(&self, namespace: NamespaceId, filename: &CStr, flags: c_int) -> bool {
            // SAFETY: `filename` is a valid C string; RTLD_NOLOAD never maps anything.
            let handle = unsafe {
                dlmopen(
                    namespace.as_lmid(),
                    filename.as_ptr(),
                    flags | libc::RTLD_NOLOAD,
                )
            };
            if handle.is_null() {
                return false;
            }

            // SAFETY: `handle` came from a successful dlmopen and is released once.
            unsafe {
                libc::dlclose(handle);
            }
            true
        }

        fn modules(&self) -> Vec<ModuleRecord> {
            // SAFETY: a NULL filename yields the main program's link map.
            let main = unsafe { libc::dlopen(ptr::null(), libc::RTLD_LAZY | libc::RTLD_NOLOAD) };
            if main.is_null() {
                return Vec::new();
            }

            let mut records = Vec::new();
            let mut entry = main.cast::<LinkMap>().cast_const();
            while !entry.is_null() {
                // SAFETY: glibc keeps link maps alive while `main` is held open.
                let map = unsafe { &*entry };
                let name = if map.l_name.is_null() {
                    String::new()
                } else {
                    // SAFETY: `l_name` is a NUL-terminated path owned by the linker.
                    unsafe { CStr::from_ptr(map.l_name) }
                        .to_string_lossy()
                        .into_owned()
                };
                records.push(ModuleRecord {
                    handle: ModuleHandle::from_raw(entry as usize),
                    name,
                    dynamic: map.l_ld as usize,
                });
                entry = map.l_next;
            }

            // SAFETY: balances the dlopen above.
            unsafe {
                libc::dlclose(main);
            }
            records
        }

        fn own_dynamic(&self) -> Option<usize> {
            let mut info = MaybeUninit::<libc::Dl_info>::zeroed();
            let mut map: *mut c_void = ptr::null_mut();
            // SAFETY: both out-pointers are valid for writes.
            let found = unsafe {
                dladdr1(
                    ptr::addr_of!(MARKER).cast(),
                    info.as_mut_ptr(),
                    &raw mut map,
                    RTLD_DL_LINKMAP,
                )
            };
            if found == 0 || map.is_null() {
                return None;
            }

            // SAFETY: RTLD_DL_LINKMAP stores a `struct link_map *`.
            Some(unsafe { (*map.cast::<LinkMap>()).l_ld } as usize)
        }
    }
}

/// Mock resolver for testing (doesn't touch the dynamic linker)
///
/// # Example
/// ```
/// use shade_core::NamespaceId;
/// use shade_namespace::{MockResolver, NamespaceResolver};
///
/// let resolver = MockResolver::new().with_loaded(NamespaceId::shadow(1).unwrap(), "libm.so.6");
///
/// assert!(resolver.probe(NamespaceId::shadow(1).unwrap(), c"libm.so.6", libc::RTLD_LAZY));
/// assert!(!resolver.probe(NamespaceId::shadow(2).unwrap(), c"libm.so.6", libc::RTLD_LAZY));
/// assert_eq!(resolver.probe_calls(), 2);
/// ```
#[derive(Clone, Default)]
pub struct MockResolver {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    loaded: HashSet<(NamespaceId, CString)>,
    modules: Vec<ModuleRecord>,
    own_dynamic: Option<usize>,
    probe_calls: usize,
    scan_calls: usize,
}

impl MockResolver {
    /// Create a resolver with nothing loaded
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `filename` as loaded into `namespace`
    ///
    /// # Panics
    /// Panics if `filename` contains a NUL byte
    #[must_use]
    pub fn with_loaded(self, namespace: NamespaceId, filename: &str) -> Self {
        let filename = CString::new(filename).expect("mock filename contains NUL");
        self.lock().loaded.insert((namespace, filename));
        self
    }

    /// Add a module record
    #[must_use]
    pub fn with_module(self, record: ModuleRecord) -> Self {
        self.lock().modules.push(record);
        self
    }

    /// Set the dynamic section this code reports as its own
    #[must_use]
    pub fn with_own_dynamic(self, dynamic: usize) -> Self {
        self.lock().own_dynamic = Some(dynamic);
        self
    }

    /// Number of probes made (for testing)
    #[must_use]
    pub fn probe_calls(&self) -> usize {
        self.lock().probe_calls
    }

    /// Number of module scans made (for testing)
    #[must_use]
    pub fn scan_calls(&self) -> usize {
        self.lock().scan_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NamespaceResolver for MockResolver {
    fn probe(&self, namespace: NamespaceId, filename: &CStr, _flags: c_int) -> bool {
        let mut state = self.lock();
        state.probe_calls += 1;
        state.loaded.contains(&(namespace, filename.to_owned()))
    }

    fn modules(&self) -> Vec<ModuleRecord> {
        let mut state = self.lock();
        state.scan_calls += 1;
        state.modules.clone()
    }

    fn own_dynamic(&self) -> Option<usize> {
        self.lock().own_dynamic
    }
}
