use crate::preview::EntryId;
use crate::upload::TransportError;
use thiserror::Error;

pub type MediaResult<T> = std::result::Result<T, MediaError>;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error(
        "partial upload failure: image {position} ({display_name}) failed after {attempts} attempts: {source}"
    )]
    UploadFailed {
        position: usize,
        display_name: String,
        attempts: usize,
        #[source]
        source: TransportError,
    },
    #[error("failed to delete image {address}: {source}")]
    DeleteFailed {
        address: String,
        #[source]
        source: TransportError,
    },
    #[error("at most {max} images allowed: holding {current}, tried to add {requested}")]
    CountLimitExceeded {
        current: usize,
        requested: usize,
        max: usize,
    },
    #[error("index {index} out of range for {len} images")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("entry {entry} is no longer in the list")]
    EntryMissing { entry: EntryId },
}
