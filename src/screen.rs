//! The camera screen: permission gate, camera binding and photo capture.
//!
//! All state lives on the UI thread. Platform callbacks only post a
//! [`ScreenEvent`] back; [`CameraScreen::pump`] handles them in order.

use std::{
    path::PathBuf,
    sync::mpsc::{channel, Receiver, Sender},
};

use anyhow::Result;
use log::{debug, error, info, warn};

use crate::{
    activity::Activity,
    camera::{
        Camera, CameraProvider, CameraSelector, ImageCapture, OutputFileOptions, OutputFileResults,
        Preview, PreviewFrame,
    },
    config::AppConfig,
    error::ImageCaptureError,
    output::{output_directory, photo_file_name, Clock, SystemClock},
    permission::{all_permissions_granted, PermissionResult, REQUIRED_PERMISSIONS},
    toast::ShowToast,
};

pub const PERMISSIONS_DENIED_MESSAGE: &str = "All permissions not granted by the user";
pub const CAMERA_UNAVAILABLE_MESSAGE: &str = "Camera unavailable";

pub enum ScreenEvent {
    PermissionsResult(PermissionResult),
    CameraProviderReady(Result<Box<dyn CameraProvider + Send>>),
    ImageSaved(Result<OutputFileResults, ImageCaptureError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenState {
    Created,
    AwaitingPermissions,
    BindingCamera,
    Active,
    CameraUnavailable,
    Finished,
    Destroyed,
}

pub struct CameraScreen<A: Activity> {
    activity: A,
    config: AppConfig,
    clock: Box<dyn Clock>,
    surface: Sender<PreviewFrame>,
    events_tx: Sender<ScreenEvent>,
    events_rx: Receiver<ScreenEvent>,
    state: ScreenState,
    camera_provider: Option<Box<dyn CameraProvider + Send>>,
    camera: Option<Camera>,
    image_capture: Option<ImageCapture>,
    pending_captures: usize,
}

impl<A: Activity> CameraScreen<A> {
    pub fn new(activity: A, config: AppConfig, surface: Sender<PreviewFrame>) -> Self {
        let (events_tx, events_rx) = channel();
        Self {
            activity,
            config,
            clock: Box::new(SystemClock),
            surface,
            events_tx,
            events_rx,
            state: ScreenState::Created,
            camera_provider: None,
            camera: None,
            image_capture: None,
            pending_captures: 0,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn activity(&self) -> &A {
        &self.activity
    }

    pub fn state(&self) -> ScreenState {
        self.state
    }

    pub fn camera(&self) -> Option<&Camera> {
        self.camera.as_ref()
    }

    pub fn is_capture_ready(&self) -> bool {
        self.image_capture.is_some()
    }

    /// Captures started whose result has not been pumped yet.
    pub fn pending_captures(&self) -> usize {
        self.pending_captures
    }

    pub fn on_create(&mut self) {
        if self.state != ScreenState::Created {
            warn!("on_create called twice");
            return;
        }
        if all_permissions_granted(&self.activity, &REQUIRED_PERMISSIONS) {
            self.start_camera();
        } else {
            self.request_all_permissions();
        }
    }

    fn request_all_permissions(&mut self) {
        self.state = ScreenState::AwaitingPermissions;
        let events = self.events_tx.clone();
        self.activity.request_permissions(
            &REQUIRED_PERMISSIONS,
            Box::new(move |result| {
                let _ = events.send(ScreenEvent::PermissionsResult(result));
            }),
        );
    }

    fn on_permissions_result(&mut self, result: PermissionResult) {
        if self.state != ScreenState::AwaitingPermissions {
            debug!("ignoring permission result in state {:?}", self.state);
            return;
        }
        if result.all_granted() {
            self.start_camera();
        } else {
            let denied: Vec<&str> = REQUIRED_PERMISSIONS
                .iter()
                .copied()
                .filter(|permission| !result.is_granted(permission))
                .collect();
            info!("permissions denied: {denied:?}");
            self.activity.show_toast(PERMISSIONS_DENIED_MESSAGE);
            self.state = ScreenState::Finished;
            self.activity.finish();
        }
    }

    fn start_camera(&mut self) {
        self.state = ScreenState::BindingCamera;
        let events = self.events_tx.clone();
        self.activity.process_camera_provider(Box::new(move |provider| {
            let _ = events.send(ScreenEvent::CameraProviderReady(provider));
        }));
    }

    fn on_camera_provider(&mut self, provider: Result<Box<dyn CameraProvider + Send>>) {
        if self.state != ScreenState::BindingCamera {
            debug!("dropping camera provider in state {:?}", self.state);
            return;
        }
        let bound = provider.and_then(|mut provider| {
            let bound = self.bind_preview(provider.as_mut());
            if bound.is_err() {
                match provider.available_cameras() {
                    Ok(cameras) => warn!("available cameras: {cameras:?}"),
                    Err(err) => warn!("listing cameras failed: {err:?}"),
                }
            }
            self.camera_provider = Some(provider);
            bound
        });
        if let Err(err) = bound {
            error!("camera binding failed: {err:?}");
            self.state = ScreenState::CameraUnavailable;
            self.activity.show_toast(CAMERA_UNAVAILABLE_MESSAGE);
        }
    }

    fn bind_preview(&mut self, provider: &mut dyn CameraProvider) -> Result<()> {
        let preview = Preview::new();
        let image_capture = ImageCapture::new(self.config.jpeg_quality);
        let camera_selector = CameraSelector::default().require_lens_facing(self.config.lens_facing);

        preview.set_surface_provider(self.surface.clone());

        let camera = provider.bind_to_lifecycle(&camera_selector, &preview, &image_capture)?;
        info!("bound camera {:?}", camera.info());
        if let Some(previous) = self.camera.replace(camera) {
            previous.close();
        }
        self.image_capture = Some(image_capture);
        self.state = ScreenState::Active;
        Ok(())
    }

    /// Starts a capture and returns the file it will be written to, or
    /// `None` when no camera is bound yet.
    pub fn take_photo(&mut self) -> Option<PathBuf> {
        let image_capture = self.image_capture.as_ref()?;

        let output_dir = match output_directory(&self.activity, &self.config.app_name) {
            Ok(dir) => dir,
            Err(err) => {
                error!("no output directory: {err:?}");
                return None;
            }
        };
        let photo_file = output_dir.join(photo_file_name(self.clock.now()));
        info!("takePhoto: {}", output_dir.display());

        self.pending_captures += 1;
        let events = self.events_tx.clone();
        image_capture.take_picture(OutputFileOptions::new(&photo_file), move |result| {
            let _ = events.send(ScreenEvent::ImageSaved(result));
        });
        Some(photo_file)
    }

    fn on_image_saved(&mut self, result: Result<OutputFileResults, ImageCaptureError>) {
        self.pending_captures = self.pending_captures.saturating_sub(1);
        match result {
            Ok(output) => info!("Photo capture succeeded: {}", output.saved_path.display()),
            Err(err) => error!("Photo capture failed: {err}"),
        }
    }

    /// Handles every event posted so far. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                ScreenEvent::PermissionsResult(result) => self.on_permissions_result(result),
                ScreenEvent::CameraProviderReady(provider) => self.on_camera_provider(provider),
                ScreenEvent::ImageSaved(result) => self.on_image_saved(result),
            }
            handled += 1;
        }
        handled
    }

    pub fn on_destroy(&mut self) {
        if self.state == ScreenState::Destroyed {
            return;
        }
        if let Some(mut provider) = self.camera_provider.take() {
            provider.unbind_all();
        }
        if let Some(camera) = self.camera.take() {
            camera.close();
        }
        self.image_capture = None;
        self.state = ScreenState::Destroyed;
        debug!("camera screen destroyed");
    }
}

impl<A: Activity> Drop for CameraScreen<A> {
    fn drop(&mut self) {
        self.on_destroy();
    }
}
