use std::fmt;

use crate::reference::{Blob, ImageReference};

/// Stable identity of one list entry, unaffected by reordering or removals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub(super) u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entry-{}", self.0)
    }
}

/// A file picked by the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub name: String,
    pub blob: Blob,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, blob: Blob) -> Self {
        Self {
            name: name.into(),
            blob,
        }
    }
}

/// One rendered preview tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewEntry {
    pub id: EntryId,
    pub position: usize,
    pub reference: ImageReference,
    pub display_address: String,
    pub pending: bool,
}

/// First half of a removal: the entry to drop and, for stored images, the
/// address the caller must delete on the server.
#[derive(Debug, PartialEq, Eq)]
pub struct RemovalTicket {
    pub(super) entry: EntryId,
    pub(super) address: Option<String>,
}

impl RemovalTicket {
    pub fn entry(&self) -> EntryId {
        self.entry
    }

    /// `None` for pending images, which need no server call.
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }
}
