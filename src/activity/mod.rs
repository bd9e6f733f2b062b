use std::{path::PathBuf, time::Duration};

use anyhow::Result;

use crate::{camera::CameraProvider, permission::PermissionResult};

#[cfg(target_os = "android")]
mod android;
#[cfg(not(target_os = "android"))]
mod desktop;

#[cfg(target_os = "android")]
pub use android::AndroidActivity;
#[cfg(not(target_os = "android"))]
pub use desktop::DesktopActivity;

pub type PermissionCallback = Box<dyn FnOnce(PermissionResult) + Send>;
pub type ProviderCallback = Box<dyn FnOnce(Result<Box<dyn CameraProvider + Send>>) + Send>;
/// Renders a toast message in the window for the given time.
pub type ToastHandler = Box<dyn Fn(&str, Duration)>;

/// Host services the camera screen runs on.
///
/// Asynchronous results are handed to their callback at most once, possibly
/// from another thread.
pub trait Activity {
    fn check_self_permission(&self, permission: &str) -> Result<bool>;

    fn request_permissions(&self, permissions: &[&str], callback: PermissionCallback);

    fn process_camera_provider(&self, callback: ProviderCallback);

    /// App-scoped external media directories, best first. May be empty.
    fn external_media_dirs(&self) -> Vec<PathBuf>;

    fn files_dir(&self) -> Result<PathBuf>;

    fn make_toast(&self, message: &str, duration: Duration);

    /// Closes the screen once a toast shown just before has had `LENGTH_SHORT` to be read.
    fn finish(&self);
}
