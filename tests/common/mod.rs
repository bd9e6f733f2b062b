#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    env, fs,
    path::PathBuf,
    sync::{mpsc::Sender, Arc, Mutex},
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local};
use image::{Rgba, RgbaImage};
use slint_camerax::{
    activity::{Activity, PermissionCallback, ProviderCallback},
    camera::{
        Camera, CameraInfo, CameraProvider, CameraSelector, FrameSink, ImageCapture, LensFacing,
        Preview, PreviewFrame,
    },
    config::AppConfig,
    output::Clock,
    permission::PermissionResult,
    screen::CameraScreen,
};

pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = env::temp_dir().join(format!("slint_camerax-it-{}-{name}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[derive(Default)]
pub struct ProviderState {
    pub sink: Option<FrameSink>,
    pub camera: Option<Camera>,
    pub capture: Option<ImageCapture>,
    pub binds: usize,
    pub unbinds: usize,
    pub listings: usize,
}

#[derive(Clone, Default)]
pub struct ProviderHandle(pub Arc<Mutex<ProviderState>>);

impl ProviderHandle {
    pub fn push_frame(&self, width: u32, height: u32) {
        let state = self.0.lock().unwrap();
        let sink = state.sink.as_ref().expect("camera not bound");
        sink.submit(RgbaImage::from_pixel(width, height, Rgba([40, 120, 200, 255])));
    }

    pub fn binds(&self) -> usize {
        self.0.lock().unwrap().binds
    }

    pub fn unbinds(&self) -> usize {
        self.0.lock().unwrap().unbinds
    }

    pub fn listings(&self) -> usize {
        self.0.lock().unwrap().listings
    }

    pub fn camera(&self) -> Option<Camera> {
        self.0.lock().unwrap().camera.clone()
    }

    pub fn capture(&self) -> Option<ImageCapture> {
        self.0.lock().unwrap().capture.clone()
    }
}

pub struct FakeCameraProvider {
    cameras: Vec<CameraInfo>,
    handle: ProviderHandle,
}

impl FakeCameraProvider {
    pub fn new(lenses: &[LensFacing]) -> (Self, ProviderHandle) {
        let cameras = lenses
            .iter()
            .enumerate()
            .map(|(id, lens_facing)| CameraInfo {
                id: id.to_string(),
                lens_facing: *lens_facing,
                sensor_orientation: 0,
            })
            .collect();
        let handle = ProviderHandle::default();
        (
            Self {
                cameras,
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl CameraProvider for FakeCameraProvider {
    fn available_cameras(&self) -> Result<Vec<CameraInfo>> {
        self.handle.0.lock().unwrap().listings += 1;
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
        let camera = Camera::open(info);
        capture.attach(&camera);
        let mut state = self.handle.0.lock().unwrap();
        state.sink = Some(FrameSink::new(preview.clone(), capture.clone()));
        state.camera = Some(camera.clone());
        state.capture = Some(capture.clone());
        state.binds += 1;
        Ok(camera)
    }

    fn unbind_all(&mut self) {
        let mut state = self.handle.0.lock().unwrap();
        if let Some(camera) = state.camera.as_ref().filter(|c| c.is_open()) {
            camera.close();
            state.unbinds += 1;
        }
    }
}

pub struct FakeActivity {
    pub granted: RefCell<Vec<String>>,
    pub grant_on_request: bool,
    pub permission_requests: Cell<usize>,
    pub provider_requests: Cell<usize>,
    pub toasts: RefCell<Vec<String>>,
    pub toast_durations: RefCell<Vec<Duration>>,
    pub finished: Cell<usize>,
    pub media_dir: Option<PathBuf>,
    pub files_dir: PathBuf,
    pub provider: RefCell<Option<FakeCameraProvider>>,
}

impl FakeActivity {
    pub fn new(root: &PathBuf, provider: Option<FakeCameraProvider>) -> Self {
        Self {
            granted: RefCell::new(vec![]),
            grant_on_request: true,
            permission_requests: Cell::new(0),
            provider_requests: Cell::new(0),
            toasts: RefCell::new(vec![]),
            toast_durations: RefCell::new(vec![]),
            finished: Cell::new(0),
            media_dir: Some(root.join("media")),
            files_dir: root.join("files"),
            provider: RefCell::new(provider),
        }
    }

    pub fn pre_granted(self, permissions: &[&str]) -> Self {
        self.granted
            .borrow_mut()
            .extend(permissions.iter().map(|p| p.to_string()));
        self
    }
}

impl Activity for FakeActivity {
    fn check_self_permission(&self, permission: &str) -> Result<bool> {
        Ok(self.granted.borrow().iter().any(|p| p == permission))
    }

    fn request_permissions(&self, permissions: &[&str], callback: PermissionCallback) {
        self.permission_requests.set(self.permission_requests.get() + 1);
        let result = if self.grant_on_request {
            PermissionResult::granted(permissions)
        } else {
            let mut result = PermissionResult::granted(permissions);
            result.insert(permissions[0], false);
            result
        };
        thread::spawn(move || callback(result));
    }

    fn process_camera_provider(&self, callback: ProviderCallback) {
        self.provider_requests.set(self.provider_requests.get() + 1);
        let provider = self.provider.borrow_mut().take();
        thread::spawn(move || {
            callback(match provider {
                Some(provider) => Ok(Box::new(provider) as Box<dyn CameraProvider + Send>),
                None => Err(anyhow!("camera service not available")),
            })
        });
    }

    fn external_media_dirs(&self) -> Vec<PathBuf> {
        self.media_dir.iter().cloned().collect()
    }

    fn files_dir(&self) -> Result<PathBuf> {
        fs::create_dir_all(&self.files_dir)?;
        Ok(self.files_dir.clone())
    }

    fn make_toast(&self, message: &str, duration: Duration) {
        self.toasts.borrow_mut().push(message.to_string());
        self.toast_durations.borrow_mut().push(duration);
    }

    fn finish(&self) {
        self.finished.set(self.finished.get() + 1);
    }
}

/// Hands out the queued instants in order.
pub struct QueuedClock(pub RefCell<VecDeque<DateTime<Local>>>);

impl Clock for QueuedClock {
    fn now(&self) -> DateTime<Local> {
        self.0.borrow_mut().pop_front().unwrap_or_else(Local::now)
    }
}

pub fn screen(activity: FakeActivity) -> (CameraScreen<FakeActivity>, std::sync::mpsc::Receiver<PreviewFrame>) {
    let (surface, frames): (Sender<PreviewFrame>, _) = std::sync::mpsc::channel();
    (CameraScreen::new(activity, AppConfig::default(), surface), frames)
}

pub fn pump_until<F>(screen: &mut CameraScreen<FakeActivity>, mut done: F)
where
    F: FnMut(&CameraScreen<FakeActivity>) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        screen.pump();
        if done(screen) {
            return;
        }
        assert!(Instant::now() < deadline, "timed out in state {:?}", screen.state());
        thread::sleep(Duration::from_millis(5));
    }
}
