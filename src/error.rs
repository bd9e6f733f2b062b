use std::{io, path::PathBuf};

use thiserror::Error;

use crate::camera::LensFacing;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("no camera matches lens facing {0:?}")]
    NoMatchingCamera(LensFacing),
    #[error("camera provider unavailable: {0}")]
    ProviderUnavailable(String),
}

/// Delivered to the capture callback when a still capture could not be saved.
#[derive(Debug, Error)]
pub enum ImageCaptureError {
    #[error("camera is closed")]
    CameraClosed,
    #[error("no frame received from the camera yet")]
    NoFrame,
    #[error("failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("jpeg encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}
