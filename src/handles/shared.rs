use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::Rc;

use super::{HandleError, HandleRegistry, HandleResult, OwnerId, PreviewHandle};
use crate::reference::Blob;

#[derive(Debug)]
enum DeferredRelease {
    Owner(OwnerId),
    Handle(PreviewHandle),
}

/// Registry shared by every controller and viewer on the page.
///
/// Releases requested while the registry is borrowed elsewhere are queued
/// and applied on the next access, so teardown never leaves handles live.
#[derive(Clone)]
pub struct SharedRegistry {
    inner: Rc<RefCell<HandleRegistry>>,
    deferred: Rc<RefCell<Vec<DeferredRelease>>>,
    next_owner: Rc<Cell<u64>>,
}

impl SharedRegistry {
    pub fn new(registry: HandleRegistry) -> Self {
        let next_owner = registry.next_owner;
        Self {
            inner: Rc::new(RefCell::new(registry)),
            deferred: Rc::new(RefCell::new(Vec::new())),
            next_owner: Rc::new(Cell::new(next_owner)),
        }
    }

    /// Read access for inspection. Queued releases are not applied.
    pub fn borrow(&self) -> Ref<'_, HandleRegistry> {
        self.inner.borrow()
    }

    pub fn register_owner(&self) -> OwnerId {
        let id = self.next_owner.get();
        self.next_owner.set(id + 1);
        OwnerId(id)
    }

    pub fn acquire(&self, owner: OwnerId, blob: &Blob) -> HandleResult<PreviewHandle> {
        let mut registry = self
            .inner
            .try_borrow_mut()
            .map_err(|_| HandleError::RegistryBusy)?;
        self.flush(&mut registry);
        registry.acquire(owner, blob)
    }

    /// Returns false when the handle was already released or the release
    /// had to be queued.
    pub fn release(&self, handle: &PreviewHandle) -> bool {
        match self.inner.try_borrow_mut() {
            Ok(mut registry) => {
                self.flush(&mut registry);
                registry.release(handle)
            }
            Err(_) => {
                tracing::debug!(owner = %handle.owner(), "handle registry busy; queueing handle release");
                self.deferred
                    .borrow_mut()
                    .push(DeferredRelease::Handle(handle.clone()));
                false
            }
        }
    }

    /// Releases every handle of `owner`, now or on the next registry access.
    /// Returns the count released immediately.
    pub fn release_all(&self, owner: OwnerId) -> usize {
        match self.inner.try_borrow_mut() {
            Ok(mut registry) => {
                self.flush(&mut registry);
                registry.release_all(owner)
            }
            Err(_) => {
                tracing::debug!(%owner, "handle registry busy; queueing owner teardown");
                self.deferred.borrow_mut().push(DeferredRelease::Owner(owner));
                0
            }
        }
    }

    pub fn live_count(&self) -> usize {
        self.flush_if_free();
        self.inner.borrow().live_count()
    }

    pub fn live_count_for(&self, owner: OwnerId) -> usize {
        self.flush_if_free();
        self.inner.borrow().live_count_for(owner)
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.flush_if_free();
        self.inner.borrow().is_live(handle)
    }

    pub fn queued_releases(&self) -> usize {
        self.deferred.borrow().len()
    }

    fn flush_if_free(&self) {
        if let Ok(mut registry) = self.inner.try_borrow_mut() {
            self.flush(&mut registry);
        }
    }

    fn flush(&self, registry: &mut HandleRegistry) {
        let queued = std::mem::take(&mut *self.deferred.borrow_mut());
        for release in queued {
            match release {
                DeferredRelease::Owner(owner) => {
                    registry.release_all(owner);
                }
                DeferredRelease::Handle(handle) => {
                    registry.release(&handle);
                }
            }
        }
    }
}

impl Default for SharedRegistry {
    fn default() -> Self {
        Self::new(HandleRegistry::default())
    }
}

impl fmt::Debug for SharedRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("queued_releases", &self.deferred.borrow().len())
            .field("next_owner", &self.next_owner.get())
            .finish()
    }
}
