//! Image references, uploads, preview handles and the gallery viewer used by
//! the storefront admin editors.

pub mod config;
pub mod error;
pub mod handles;
pub mod logging;
pub mod preview;
pub mod reference;
pub mod resolve;
pub mod upload;
pub mod viewer;

pub use config::{load_media_config, MediaConfig};
pub use error::{MediaError, MediaResult};
pub use handles::{HandleRegistry, OwnerId, PreviewHandle, SharedRegistry};
pub use preview::{EntryId, LocalFile, PreviewEntry, PreviewListController, RemovalTicket};
pub use reference::{Blob, ImageReference};
pub use resolve::{AddressResolver, Resolution};
pub use upload::{materialize, DeleteOperation, TransportError, UploadOperation};
pub use viewer::{GalleryViewer, Thumbnail, ViewerState};
