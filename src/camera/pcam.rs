use std::{
    sync::{Arc, Mutex},
    thread::JoinHandle,
    time::Duration,
};

use anyhow::{anyhow, Result};
use image::RgbaImage;
use kamera::Camera as KCamera;
use log::{info, warn};

use super::{Camera, CameraInfo, CameraProvider, CameraSelector, FrameSink, ImageCapture, LensFacing, Preview};

/// Webcam provider backed by kamera.
pub struct DesktopCameraProvider {
    cameras: Vec<CameraInfo>,
    camera: Option<Camera>,
    camera_handle: Option<Arc<Mutex<bool>>>,
    camera_task: Option<JoinHandle<Result<()>>>,
}

impl DesktopCameraProvider {
    pub fn get_instance() -> Result<Self> {
        // built-in webcams face the user
        let cameras = vec![CameraInfo {
            id: "0".to_string(),
            lens_facing: LensFacing::Front,
            sensor_orientation: 0,
        }];
        Ok(Self {
            cameras,
            camera: None,
            camera_handle: None,
            camera_task: None,
        })
    }

    fn start_preview(&mut self, index: usize, sink: FrameSink) {
        let camera_handle = Arc::new(Mutex::new(true));
        self.camera_handle = Some(camera_handle.clone());
        self.camera_task = Some(std::thread::spawn(move || {
            let camera = match KCamera::new_device(index) {
                None => return Err(anyhow!("camera id not exist")),
                Some(v) => v,
            };
            camera.start();
            loop {
                if let Ok(opened) = camera_handle.lock() {
                    if !*opened {
                        break;
                    }
                }

                let frame = match camera.wait_for_frame() {
                    Some(f) => f,
                    None => {
                        warn!("no frame from camera {index}");
                        std::thread::sleep(Duration::from_millis(10));
                        continue;
                    }
                };

                let (width, height) = frame.size_u32();
                let frame_data = frame.data();
                let mut rgba_buffer = frame_data.data_u8().to_vec();
                for bgra in rgba_buffer.chunks_exact_mut(4) {
                    bgra.swap(0, 2);
                }
                match RgbaImage::from_raw(width, height, rgba_buffer) {
                    Some(image) => sink.submit(image),
                    None => warn!("short frame buffer for {width}x{height}"),
                }
            }
            camera.stop();
            Ok(())
        }));
    }

    fn stop_preview(&mut self) {
        let mut need_close = false;
        if let Some(handle) = self.camera_handle.take() {
            if let Ok(mut handle) = handle.lock() {
                *handle = false;
                need_close = true;
            }
        }

        if need_close {
            info!("stop preview..");
            if let Some(handle) = self.camera_task.take() {
                match handle.join() {
                    Ok(Err(err)) => warn!("camera task failed: {err:?}"),
                    Err(_) => warn!("camera task panicked"),
                    Ok(Ok(())) => {}
                }
            }
        }
    }
}

impl CameraProvider for DesktopCameraProvider {
    fn available_cameras(&self) -> Result<Vec<CameraInfo>> {
        Ok(self.cameras.clone())
    }

    fn bind_to_lifecycle(
        &mut self,
        selector: &CameraSelector,
        preview: &Preview,
        capture: &ImageCapture,
    ) -> Result<Camera> {
        self.unbind_all();
        let info = selector.select(&self.cameras)?.clone();
        let index = info.id.parse::<usize>()?;
        self.start_preview(index, FrameSink::new(preview.clone(), capture.clone()));

        let camera = Camera::open(info);
        capture.attach(&camera);
        self.camera = Some(camera.clone());
        Ok(camera)
    }

    fn unbind_all(&mut self) {
        if let Some(camera) = self.camera.take() {
            camera.close();
        }
        self.stop_preview();
    }
}

impl Drop for DesktopCameraProvider {
    fn drop(&mut self) {
        self.unbind_all();
    }
}
