use std::fmt;
use std::ops::Range;

use super::window::{adjust_window, visible_range};
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::handles::{OwnerId, SharedRegistry};
use crate::reference::ImageReference;
use crate::resolve::{AddressResolver, Resolution};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Empty,
    Viewing { current: usize, window_start: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub index: usize,
    pub address: String,
    pub visible: bool,
    pub active: bool,
}

/// State of one open gallery. Owns the handles of its pending images.
#[derive(Debug)]
struct ViewerSession {
    owner: OwnerId,
    images: Vec<ImageReference>,
    rendered: Vec<String>,
    current: usize,
    window_start: usize,
}

/// Read-only gallery with a main pane and a windowed, wrap-around
/// thumbnail strip.
pub struct GalleryViewer {
    window_size: usize,
    resolver: AddressResolver,
    registry: SharedRegistry,
    session: Option<ViewerSession>,
}

impl GalleryViewer {
    pub fn new(window_size: usize, resolver: AddressResolver, registry: SharedRegistry) -> Self {
        Self {
            window_size: window_size.max(1),
            resolver,
            registry,
            session: None,
        }
    }

    pub fn from_config(config: &MediaConfig, registry: SharedRegistry) -> Self {
        Self::new(
            config.visible_thumbs,
            AddressResolver::new(config.clone()),
            registry,
        )
    }

    /// Starts a fresh session at the first image. Every address is resolved
    /// up front so navigation never waits on handle creation.
    pub fn open(&mut self, images: Vec<ImageReference>) -> ViewerState {
        self.close();
        if images.is_empty() {
            tracing::debug!("opened gallery with no images");
            return ViewerState::Empty;
        }

        let registry = &self.registry;
        let owner = registry.register_owner();
        let rendered = images
            .iter()
            .map(|image| match self.resolver.resolve(image) {
                Resolution::Address(address) => address,
                Resolution::NeedsHandle => match image {
                    ImageReference::Pending { blob, .. } => match registry.acquire(owner, blob) {
                        Ok(handle) => handle.uri().to_string(),
                        Err(err) => {
                            tracing::warn!(%owner, ?err, "preview handle unavailable in gallery");
                            self.resolver.placeholder().to_string()
                        }
                    },
                    ImageReference::Remote { .. } => self.resolver.placeholder().to_string(),
                },
            })
            .collect();

        tracing::debug!(%owner, images = images.len(), "opened gallery");
        self.session = Some(ViewerSession {
            owner,
            images,
            rendered,
            current: 0,
            window_start: 0,
        });
        self.state()
    }

    /// Opens a gallery of one stored image.
    pub fn view_single(&mut self, address: impl Into<String>) -> ViewerState {
        self.open(vec![ImageReference::remote(address)])
    }

    /// Ends the session and releases its handles. Returns how many were
    /// freed right away; a busy registry frees them on its next access.
    pub fn close(&mut self) -> usize {
        let Some(session) = self.session.take() else {
            return 0;
        };
        let released = self.registry.release_all(session.owner);
        tracing::debug!(owner = %session.owner, released, "closed gallery");
        released
    }

    pub fn next(&mut self) -> ViewerState {
        if let Some(session) = &self.session {
            let target = (session.current + 1) % session.images.len();
            self.move_to(target);
        }
        self.state()
    }

    pub fn prev(&mut self) -> ViewerState {
        if let Some(session) = &self.session {
            let len = session.images.len();
            let target = (session.current + len - 1) % len;
            self.move_to(target);
        }
        self.state()
    }

    pub fn jump_to(&mut self, index: usize) -> MediaResult<ViewerState> {
        let len = self.len();
        if index >= len {
            return Err(MediaError::IndexOutOfRange { index, len });
        }
        self.move_to(index);
        Ok(self.state())
    }

    pub fn state(&self) -> ViewerState {
        match &self.session {
            Some(session) => ViewerState::Viewing {
                current: session.current,
                window_start: session.window_start,
            },
            None => ViewerState::Empty,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn len(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.images.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn current_index(&self) -> Option<usize> {
        self.session.as_ref().map(|session| session.current)
    }

    pub fn window_start(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.window_start)
    }

    pub fn current_address(&self) -> String {
        self.session
            .as_ref()
            .and_then(|session| session.rendered.get(session.current))
            .cloned()
            .unwrap_or_else(|| self.resolver.placeholder().to_string())
    }

    pub fn current_reference(&self) -> Option<&ImageReference> {
        self.session
            .as_ref()
            .and_then(|session| session.images.get(session.current))
    }

    pub fn visible_thumbnail_indices(&self) -> Range<usize> {
        match &self.session {
            Some(session) => {
                visible_range(session.window_start, session.images.len(), self.window_size)
            }
            None => 0..0,
        }
    }

    pub fn thumbnails(&self) -> Vec<Thumbnail> {
        let Some(session) = &self.session else {
            return Vec::new();
        };
        let visible = self.visible_thumbnail_indices();
        session
            .rendered
            .iter()
            .enumerate()
            .map(|(index, address)| Thumbnail {
                index,
                address: address.clone(),
                visible: visible.contains(&index),
                active: index == session.current,
            })
            .collect()
    }

    /// Navigation arrows only make sense with two or more images.
    pub fn can_navigate(&self) -> bool {
        self.len() > 1
    }

    fn move_to(&mut self, index: usize) {
        let window_size = self.window_size;
        if let Some(session) = &mut self.session {
            session.current = index;
            session.window_start =
                adjust_window(index, session.window_start, session.images.len(), window_size);
            tracing::trace!(
                current = session.current,
                window_start = session.window_start,
                "gallery moved"
            );
        }
    }
}

impl Drop for GalleryViewer {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for GalleryViewer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GalleryViewer")
            .field("window_size", &self.window_size)
            .field("state", &self.state())
            .field("len", &self.len())
            .finish()
    }
}
