use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    thread,
};

use image::{codecs::jpeg::JpegEncoder, ColorType, DynamicImage, RgbaImage};
use log::debug;

use super::Camera;
use crate::error::ImageCaptureError;

#[derive(Debug, Clone)]
pub struct OutputFileOptions {
    path: PathBuf,
}

impl OutputFileOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileResults {
    pub saved_path: PathBuf,
}

#[derive(Default)]
struct CaptureState {
    latest: Option<RgbaImage>,
    camera: Option<Camera>,
}

/// Still capture pipeline: keeps the newest frame of the bound camera and
/// writes it out as JPEG on request.
#[derive(Clone)]
pub struct ImageCapture {
    state: Arc<Mutex<CaptureState>>,
    jpeg_quality: u8,
}

impl ImageCapture {
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(CaptureState::default())),
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn attach(&self, camera: &Camera) {
        if let Ok(mut state) = self.state.lock() {
            state.camera = Some(camera.clone());
            state.latest = None;
        }
    }

    pub(crate) fn store_frame(&self, frame: RgbaImage) {
        if let Ok(mut state) = self.state.lock() {
            state.latest = Some(frame);
        }
    }

    /// Encodes the newest frame to `options.path()` on a worker thread.
    /// `callback` runs exactly once, on the worker or on the calling thread
    /// when the capture is rejected up front.
    pub fn take_picture<F>(&self, options: OutputFileOptions, callback: F)
    where
        F: FnOnce(Result<OutputFileResults, ImageCaptureError>) + Send + 'static,
    {
        let frame = match self.snapshot() {
            Ok(frame) => frame,
            Err(err) => return callback(Err(err)),
        };
        let quality = self.jpeg_quality;
        thread::spawn(move || {
            let result = save_jpeg(&frame, options.path(), quality).map(|()| OutputFileResults {
                saved_path: options.path,
            });
            callback(result);
        });
    }

    fn snapshot(&self) -> Result<RgbaImage, ImageCaptureError> {
        let state = self
            .state
            .lock()
            .map_err(|_| ImageCaptureError::CameraClosed)?;
        match state.camera.as_ref() {
            Some(camera) if camera.is_open() => {}
            _ => return Err(ImageCaptureError::CameraClosed),
        }
        state.latest.clone().ok_or(ImageCaptureError::NoFrame)
    }
}

fn save_jpeg(frame: &RgbaImage, path: &Path, quality: u8) -> Result<(), ImageCaptureError> {
    let io_err = |source| ImageCaptureError::Io {
        path: path.to_path_buf(),
        source,
    };
    // jpeg carries no alpha
    let rgb = DynamicImage::ImageRgba8(frame.clone()).to_rgb8();
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    JpegEncoder::new_with_quality(&mut writer, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ColorType::Rgb8,
    )?;
    writer.flush().map_err(io_err)?;
    debug!("saved {}x{} jpeg to {}", rgb.width(), rgb.height(), path.display());
    Ok(())
}
