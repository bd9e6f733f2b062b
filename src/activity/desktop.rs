use std::{fs, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use log::{error, info};
use slint::Timer;

use super::{Activity, PermissionCallback, ProviderCallback, ToastHandler};
use crate::{config::AppConfig, permission::PermissionResult, toast::LENGTH_SHORT};

/// Desktop host: no runtime permissions, media goes to the user's pictures.
pub struct DesktopActivity {
    config: AppConfig,
    toast: ToastHandler,
}

impl DesktopActivity {
    pub fn new(config: AppConfig, toast: ToastHandler) -> Self {
        Self { config, toast }
    }
}

impl Activity for DesktopActivity {
    fn check_self_permission(&self, _permission: &str) -> Result<bool> {
        Ok(true)
    }

    fn request_permissions(&self, permissions: &[&str], callback: PermissionCallback) {
        callback(PermissionResult::granted(permissions));
    }

    #[cfg(target_os = "windows")]
    fn process_camera_provider(&self, callback: ProviderCallback) {
        use crate::camera::{CameraProvider, DesktopCameraProvider};
        std::thread::spawn(move || {
            callback(
                DesktopCameraProvider::get_instance()
                    .map(|provider| Box::new(provider) as Box<dyn CameraProvider + Send>),
            )
        });
    }

    #[cfg(not(target_os = "windows"))]
    fn process_camera_provider(&self, callback: ProviderCallback) {
        callback(Err(crate::error::CameraError::ProviderUnavailable(format!(
            "no camera backend for {}",
            std::env::consts::OS
        ))
        .into()));
    }

    fn external_media_dirs(&self) -> Vec<PathBuf> {
        dirs::picture_dir().into_iter().collect()
    }

    fn files_dir(&self) -> Result<PathBuf> {
        let dir = dirs::data_local_dir()
            .ok_or_else(|| anyhow!("no local data directory"))?
            .join(&self.config.app_name);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn make_toast(&self, message: &str, duration: Duration) {
        info!("toast: {message}");
        (self.toast)(message, duration);
    }

    fn finish(&self) {
        // let the toast be read before the window goes away
        Timer::single_shot(LENGTH_SHORT, || {
            if let Err(err) = slint::quit_event_loop() {
                error!("quit_event_loop: {err}");
            }
        });
    }
}
