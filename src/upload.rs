use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::error::{MediaError, MediaResult};
use crate::reference::{Blob, ImageReference};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upload succeeded but no image address was returned")]
    MissingAddress,
    #[error("request failed: {message}")]
    Network { message: String },
}

/// Stores one blob on the server and returns its assigned address.
pub trait UploadOperation {
    fn upload(&self, blob: &Blob, display_name: &str) -> Result<String, TransportError>;
}

/// Deletes an already stored image by address.
pub trait DeleteOperation {
    fn delete(&self, address: &str) -> Result<(), TransportError>;
}

impl<F> UploadOperation for F
where
    F: Fn(&Blob, &str) -> Result<String, TransportError>,
{
    fn upload(&self, blob: &Blob, display_name: &str) -> Result<String, TransportError> {
        self(blob, display_name)
    }
}

impl<F> DeleteOperation for F
where
    F: Fn(&str) -> Result<(), TransportError>,
{
    fn delete(&self, address: &str) -> Result<(), TransportError> {
        self(address)
    }
}

/// Converts every pending reference into a stored address, in list order.
///
/// Uploads run one after another. The first failure aborts the whole batch
/// and nothing is returned for the images already sent; the input list is
/// only borrowed, so the caller keeps it intact for a retry.
pub fn materialize<U>(references: &[ImageReference], uploader: &U) -> MediaResult<Vec<String>>
where
    U: UploadOperation + ?Sized,
{
    let mut addresses = Vec::with_capacity(references.len());
    let mut attempts = 0usize;

    for (position, reference) in references.iter().enumerate() {
        match reference {
            ImageReference::Remote { address } => addresses.push(address.clone()),
            ImageReference::Pending { blob, display_name } => {
                let name = upload_name(display_name);
                attempts += 1;
                tracing::debug!(position, name = %name, size = blob.len(), "uploading pending image");
                let uploaded = uploader
                    .upload(blob, &name)
                    .and_then(|address| {
                        if address.trim().is_empty() {
                            Err(TransportError::MissingAddress)
                        } else {
                            Ok(address)
                        }
                    })
                    .map_err(|source| {
                        tracing::warn!(position, name = %name, %source, "image upload failed; aborting batch");
                        MediaError::UploadFailed {
                            position,
                            display_name: name.clone(),
                            attempts,
                            source,
                        }
                    })?;
                addresses.push(uploaded);
            }
        }
    }

    tracing::info!(
        images = addresses.len(),
        uploaded = attempts,
        "materialized image list"
    );
    Ok(addresses)
}

fn upload_name(display_name: &str) -> String {
    let trimmed = display_name.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("upload-{millis}")
}
