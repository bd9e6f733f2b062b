use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::Sender,
    Arc, Mutex,
};

use anyhow::Result;
use image::RgbaImage;
use log::debug;
use slint::{Rgba8Pixel, SharedPixelBuffer};

use crate::error::CameraError;

#[cfg(target_os = "android")]
mod camera2;

#[cfg(target_os = "windows")]
mod pcam;

mod capture;
pub mod yuv;

#[cfg(target_os = "android")]
pub use camera2::AndroidCameraProvider;
#[cfg(target_os = "windows")]
pub use pcam::DesktopCameraProvider;

pub use capture::{ImageCapture, OutputFileOptions, OutputFileResults};

pub type PreviewFrame = SharedPixelBuffer<Rgba8Pixel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LensFacing {
    Front,
    Back,
    External,
}

impl LensFacing {
    /// `ACAMERA_LENS_FACING` metadata value.
    pub fn from_metadata(value: u8) -> Self {
        match value {
            0 => LensFacing::Front,
            1 => LensFacing::Back,
            _ => LensFacing::External,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraInfo {
    pub id: String,
    pub lens_facing: LensFacing,
    pub sensor_orientation: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CameraSelector {
    lens_facing: Option<LensFacing>,
}

impl CameraSelector {
    pub fn require_lens_facing(mut self, lens_facing: LensFacing) -> Self {
        self.lens_facing = Some(lens_facing);
        self
    }

    pub fn select<'a>(&self, cameras: &'a [CameraInfo]) -> Result<&'a CameraInfo, CameraError> {
        let selected = match self.lens_facing {
            None => cameras.first(),
            Some(lens_facing) => cameras.iter().find(|c| c.lens_facing == lens_facing),
        };
        selected.ok_or(CameraError::NoMatchingCamera(
            self.lens_facing.unwrap_or(LensFacing::External),
        ))
    }
}

/// Live binding of a camera to the screen. Closed handles reject captures.
#[derive(Debug, Clone)]
pub struct Camera {
    info: CameraInfo,
    open: Arc<AtomicBool>,
}

impl Camera {
    pub fn open(info: CameraInfo) -> Self {
        Self {
            info,
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn info(&self) -> &CameraInfo {
        &self.info
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            debug!("camera {} closed", self.info.id);
        }
    }
}

#[derive(Clone, Default)]
pub struct Preview {
    surface: Arc<Mutex<Option<Sender<PreviewFrame>>>>,
}

impl Preview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_surface_provider(&self, surface: Sender<PreviewFrame>) {
        if let Ok(mut current) = self.surface.lock() {
            *current = Some(surface);
        }
    }

    fn publish(&self, frame: &RgbaImage) {
        let Ok(mut surface) = self.surface.lock() else {
            return;
        };
        if let Some(sender) = surface.as_ref() {
            let buf = SharedPixelBuffer::clone_from_slice(frame.as_raw(), frame.width(), frame.height());
            if sender.send(buf).is_err() {
                debug!("preview surface closed");
                *surface = None;
            }
        }
    }
}

/// Where a camera backend delivers decoded frames.
#[derive(Clone)]
pub struct FrameSink {
    preview: Preview,
    capture: ImageCapture,
}

impl FrameSink {
    pub fn new(preview: Preview, capture: ImageCapture) -> Self {
        Self { preview, capture }
    }

    pub fn submit(&self, frame: RgbaImage) {
        self.preview.publish(&frame);
        self.capture.store_frame(frame);
    }
}

/// Platform camera service the screen binds its pipelines to.
pub trait CameraProvider {
    /// Every camera the provider can bind, in enumeration order.
    fn available_cameras(&self) -> Result<Vec<CameraInfo>>;

    /// Replaces any previous binding.
    fn bind_to_lifecycle(
        &mut self,
        selector: &CameraSelector,
        preview: &Preview,
        capture: &ImageCapture,
    ) -> Result<Camera>;

    fn unbind_all(&mut self);
}

/// Supported size closest in area to the requested one.
pub fn closest_size(sizes: &[(i32, i32)], width: u32, height: u32) -> Option<(u32, u32)> {
    let wanted = width as i64 * height as i64;
    sizes
        .iter()
        .filter(|(w, h)| *w > 0 && *h > 0)
        .min_by_key(|(w, h)| ((*w as i64 * *h as i64) - wanted).abs())
        .map(|(w, h)| (*w as u32, *h as u32))
}
