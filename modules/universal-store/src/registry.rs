//! Registry of asynchronous operations produced during dispatch.
//!
//! Stages append (handle, action) pairs; each pair is removed exactly once
//! after its handle settles, whichever outcome. The renderer reads snapshots.
//!
//! An entry stays listed until at least one snapshot has returned it, even
//! if it settled in the meantime. Work registered during a render pass is
//! therefore always seen by the pass that triggered it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, trace};
use universal_common::{Action, AsyncHandle};

/// An asynchronous result paired with the action that produced it.
#[derive(Debug, Clone)]
pub struct TrackedOperation {
    pub handle: AsyncHandle,
    pub action: Action,
}

/// Source of currently outstanding operations, read between render passes.
///
/// Implemented by [`OperationRegistry`] and by closures returning a snapshot.
pub trait ActiveOperations: Send + Sync {
    /// Append-ordered snapshot. Later mutations must not show up in it.
    fn list_active(&self) -> Vec<TrackedOperation>;
}

impl<F> ActiveOperations for F
where
    F: Fn() -> Vec<TrackedOperation> + Send + Sync,
{
    fn list_active(&self) -> Vec<TrackedOperation> {
        self()
    }
}

// ---------------------------------------------------------------------------
// OperationRegistry
// ---------------------------------------------------------------------------

/// Shared, cloneable registry. One per enhanced store.
#[derive(Clone, Default)]
pub struct OperationRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    entries: Mutex<Vec<Entry>>,
    next_key: AtomicU64,
}

struct Entry {
    key: u64,
    operation: TrackedOperation,
    /// Returned by at least one `list_active` snapshot.
    observed: bool,
}

impl Entry {
    fn is_spent(&self) -> bool {
        self.observed && self.operation.handle.is_settled()
    }
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock and drop entries that settled after being observed.
    fn pruned(&self) -> MutexGuard<'_, Vec<Entry>> {
        let mut entries = self.lock();
        entries.retain(|entry| !entry.is_spent());
        entries
    }
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `handle` until it settles and has been listed once.
    ///
    /// Inside a Tokio runtime a watcher task drives the handle and removes
    /// the entry on settlement if a snapshot already returned it. Otherwise
    /// the entry is pruned by the first registry read after both happened.
    pub fn add_operation(&self, handle: AsyncHandle, action: Action) -> Removal {
        let key = self.inner.next_key.fetch_add(1, Ordering::Relaxed);
        let operation_id = handle.id();

        self.inner.lock().push(Entry {
            key,
            operation: TrackedOperation {
                handle: handle.clone(),
                action,
            },
            observed: false,
        });
        trace!(operation = %operation_id, "operation registered");

        let removal = Removal {
            key,
            registry: Arc::downgrade(&self.inner),
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let watcher = removal.clone();
                let settled = handle.settled();
                runtime.spawn(async move {
                    let _ = settled.await;
                    if watcher.release() {
                        trace!(operation = %operation_id, "operation settled");
                    }
                });
            }
            Err(_) => {
                debug!(operation = %operation_id, "no runtime, settlement observed lazily");
            }
        }

        removal
    }

    /// Snapshot in registration order: every unsettled operation, plus any
    /// that settled before a snapshot could return it.
    pub fn list_active(&self) -> Vec<TrackedOperation> {
        let mut entries = self.inner.pruned();
        entries
            .iter_mut()
            .map(|entry| {
                entry.observed = true;
                entry.operation.clone()
            })
            .collect()
    }

    /// Number of entries the next snapshot would return.
    pub fn len(&self) -> usize {
        self.inner.pruned().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ActiveOperations for OperationRegistry {
    fn list_active(&self) -> Vec<TrackedOperation> {
        OperationRegistry::list_active(self)
    }
}

impl std::fmt::Debug for OperationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Removal
// ---------------------------------------------------------------------------

/// Removes one registered entry. Safe to call any number of times.
#[derive(Debug, Clone)]
pub struct Removal {
    key: u64,
    registry: Weak<RegistryInner>,
}

impl Removal {
    /// Remove the entry unconditionally. Returns `true` if this call removed it.
    pub fn remove(&self) -> bool {
        self.remove_where(|_| true)
    }

    /// Remove the entry only if a snapshot has already returned it.
    fn release(&self) -> bool {
        self.remove_where(|entry| entry.observed)
    }

    fn remove_where(&self, allowed: impl Fn(&Entry) -> bool) -> bool {
        let Some(inner) = self.registry.upgrade() else {
            return false;
        };
        let mut entries = inner.lock();
        match entries.iter().position(|entry| entry.key == self.key) {
            Some(index) if allowed(&entries[index]) => {
                entries.remove(index);
                true
            }
            _ => false,
        }
    }
}
