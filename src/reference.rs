use std::fmt;
use std::sync::Arc;

use crate::resolve::AddressResolver;

const OCTET_STREAM: &str = "application/octet-stream";

/// Raw bytes of a local file staged for upload.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl Blob {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            content_type: None,
        }
    }

    pub fn with_content_type(bytes: impl Into<Vec<u8>>, content_type: impl Into<String>) -> Self {
        let content_type = content_type.into();
        Self {
            bytes: bytes.into(),
            content_type: (!content_type.trim().is_empty()).then_some(content_type),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Declared content type, else sniffed from the leading bytes.
    pub fn content_type(&self) -> String {
        if let Some(declared) = &self.content_type {
            return declared.clone();
        }
        image::guess_format(&self.bytes)
            .map(|format| format.to_mime_type().to_string())
            .unwrap_or_else(|_| OCTET_STREAM.to_string())
    }

    /// File extension matching the content type, used for on-disk previews.
    pub fn extension(&self) -> &'static str {
        image::guess_format(&self.bytes)
            .ok()
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("len", &self.bytes.len())
            .field("content_type", &self.content_type)
            .finish()
    }
}

/// One image: either already stored on the server or staged locally.
///
/// References are never edited in place. Changing an image means replacing
/// the reference, which keeps handle bookkeeping tied to a single value.
#[derive(Debug, Clone)]
pub enum ImageReference {
    Remote {
        address: String,
    },
    Pending {
        blob: Arc<Blob>,
        display_name: String,
    },
}

impl ImageReference {
    pub fn remote(address: impl Into<String>) -> Self {
        Self::Remote {
            address: address.into(),
        }
    }

    /// Every call wraps the blob in a fresh allocation, so two pending
    /// references built from equal bytes are still distinct images.
    pub fn pending(blob: Blob, display_name: impl Into<String>) -> Self {
        Self::Pending {
            blob: Arc::new(blob),
            display_name: display_name.into(),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    pub fn address(&self) -> Option<&str> {
        match self {
            Self::Remote { address } => Some(address),
            Self::Pending { .. } => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Self::Remote { address } => address,
            Self::Pending { display_name, .. } => display_name,
        }
    }

    /// Whether two references denote the same image when diffing lists.
    pub fn same_image(&self, other: &Self, resolver: &AddressResolver) -> bool {
        match (self, other) {
            (Self::Remote { address: left }, Self::Remote { address: right }) => {
                resolver.resolve_address(left) == resolver.resolve_address(right)
            }
            (Self::Pending { blob: left, .. }, Self::Pending { blob: right, .. }) => {
                Arc::ptr_eq(left, right)
            }
            _ => false,
        }
    }
}

impl PartialEq for ImageReference {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Remote { address: left }, Self::Remote { address: right }) => left == right,
            (Self::Pending { blob: left, .. }, Self::Pending { blob: right, .. }) => {
                Arc::ptr_eq(left, right)
            }
            _ => false,
        }
    }
}

impl Eq for ImageReference {}
