use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::reference::Blob;

mod backend;
mod shared;

pub use backend::{HandleBackend, ObjectUrlBackend, PruneReport, TempFileBackend};
pub use shared::SharedRegistry;

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("failed to write preview file {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove preview file {path}: {source}")]
    Remove {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("handle registry is in use")]
    RegistryBusy,
}

pub type HandleResult<T> = std::result::Result<T, HandleError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerId(u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner-{}", self.0)
    }
}

/// A temporary URI that lets an unsaved blob be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewHandle {
    id: u64,
    owner: OwnerId,
    uri: String,
}

impl PreviewHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }
}

#[derive(Debug)]
struct LiveHandle {
    owner: OwnerId,
    uri: String,
}

/// The only place preview handles are created or released.
///
/// Live handles are always exactly those acquired and not yet released,
/// grouped by the owner that acquired them.
pub struct HandleRegistry {
    backend: Box<dyn HandleBackend>,
    live: BTreeMap<u64, LiveHandle>,
    next_handle: u64,
    next_owner: u64,
}

impl HandleRegistry {
    pub fn new(backend: impl HandleBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            live: BTreeMap::new(),
            next_handle: 1,
            next_owner: 1,
        }
    }

    pub fn with_object_urls(origin: impl Into<String>) -> Self {
        Self::new(ObjectUrlBackend::new(origin))
    }

    pub fn shared(self) -> SharedRegistry {
        SharedRegistry::new(self)
    }

    pub fn register_owner(&mut self) -> OwnerId {
        let owner = OwnerId(self.next_owner);
        self.next_owner += 1;
        owner
    }

    /// Creates one new handle per call; repeated calls for the same blob are
    /// not merged.
    pub fn acquire(&mut self, owner: OwnerId, blob: &Blob) -> HandleResult<PreviewHandle> {
        let id = self.next_handle;
        let uri = self.backend.create(id, blob)?;
        self.next_handle += 1;
        self.live.insert(
            id,
            LiveHandle {
                owner,
                uri: uri.clone(),
            },
        );
        tracing::debug!(%owner, handle = id, live = self.live.len(), "acquired preview handle");
        Ok(PreviewHandle { id, owner, uri })
    }

    /// Returns false when the handle was already released.
    pub fn release(&mut self, handle: &PreviewHandle) -> bool {
        match self.live.remove(&handle.id) {
            Some(live) => {
                self.revoke(handle.id, &live);
                true
            }
            None => false,
        }
    }

    pub fn release_all(&mut self, owner: OwnerId) -> usize {
        let ids: Vec<u64> = self
            .live
            .iter()
            .filter(|(_, live)| live.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in &ids {
            if let Some(live) = self.live.remove(id) {
                self.revoke(*id, &live);
            }
        }
        if !ids.is_empty() {
            tracing::debug!(%owner, released = ids.len(), "released owner preview handles");
        }
        ids.len()
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn live_count_for(&self, owner: OwnerId) -> usize {
        self.live.values().filter(|live| live.owner == owner).count()
    }

    fn revoke(&mut self, id: u64, live: &LiveHandle) {
        if let Err(err) = self.backend.revoke(&live.uri) {
            tracing::warn!(handle = id, owner = %live.owner, ?err, "failed to revoke preview handle");
        }
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("live", &self.live.len())
            .field("next_handle", &self.next_handle)
            .field("next_owner", &self.next_owner)
            .finish()
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        let remaining = std::mem::take(&mut self.live);
        if !remaining.is_empty() {
            tracing::debug!(released = remaining.len(), "releasing preview handles with registry");
        }
        for (id, live) in &remaining {
            self.revoke(*id, live);
        }
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new(ObjectUrlBackend::default())
    }
}
