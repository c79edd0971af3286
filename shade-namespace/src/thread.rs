//! Per-thread current-namespace binding

use std::cell::Cell;

use shade_core::NamespaceId;

thread_local! {
    static CURRENT: Cell<NamespaceId> = const { Cell::new(NamespaceId::BASE) };
}

/// Namespace the calling thread is currently executing in
///
/// Every thread starts in [`NamespaceId::BASE`].
#[must_use]
pub fn current() -> NamespaceId {
    CURRENT.with(Cell::get)
}

/// Switch the calling thread to `namespace`, returning the previous binding
///
/// This is the dispatcher's hook for changing execution context. It never
/// affects other threads.
pub fn replace(namespace: NamespaceId) -> NamespaceId {
    CURRENT.with(|current| current.replace(namespace))
}

/// Switch the calling thread to `namespace` until the guard is dropped
#[must_use = "the previous namespace is restored as soon as the guard is dropped"]
pub fn enter(namespace: NamespaceId) -> ScopedNamespace {
    ScopedNamespace {
        previous: replace(namespace),
    }
}

/// Restores the thread's previous namespace on drop
#[derive(Debug)]
pub struct ScopedNamespace {
    previous: NamespaceId,
}

impl ScopedNamespace {
    /// Namespace that will be restored
    #[must_use]
    pub const fn previous(&self) -> NamespaceId {
        self.previous
    }
}

impl Drop for ScopedNamespace {
    fn drop(&mut self) {
        replace(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;

    fn id(raw: i64) -> NamespaceId {
        NamespaceId::shadow(raw).unwrap()
    }

    #[test]
    fn test_starts_in_base_namespace() {
        let observed = thread::spawn(current).join().unwrap();
        assert_eq!(observed, NamespaceId::BASE);
    }

    #[test]
    fn test_replace_returns_previous() {
        thread::spawn(|| {
            assert_eq!(replace(id(2)), NamespaceId::BASE);
            assert_eq!(current(), id(2));
            assert_eq!(replace(NamespaceId::BASE), id(2));
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_binding_is_per_thread() {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let other = thread::spawn(move || {
            replace(id(5));
            ready_tx.send(()).unwrap();
            done_rx.recv().unwrap();
            current()
        });

        ready_rx.recv().unwrap();
        assert_eq!(current(), NamespaceId::BASE);
        let fresh = thread::spawn(current).join().unwrap();
        assert_eq!(fresh, NamespaceId::BASE);

        done_tx.send(()).unwrap();
        assert_eq!(other.join().unwrap(), id(5));
    }

    #[test]
    fn test_scoped_namespace_restores() {
        thread::spawn(|| {
            {
                let outer = enter(id(1));
                assert_eq!(outer.previous(), NamespaceId::BASE);
                assert_eq!(current(), id(1));
                {
                    let _inner = enter(id(3));
                    assert_eq!(current(), id(3));
                }
                assert_eq!(current(), id(1));
            }
            assert_eq!(current(), NamespaceId::BASE);
        })
        .join()
        .unwrap();
    }
}
