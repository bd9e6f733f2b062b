use std::{env, time::Duration};

use log::warn;

use crate::camera::LensFacing;

pub const APP_NAME: &str = "Slint CameraX";

/// Startup configuration of the camera screen.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Name of the folder photos are saved into under the media directory.
    pub app_name: String,
    pub lens_facing: LensFacing,
    pub preview_width: u32,
    pub preview_height: u32,
    pub jpeg_quality: u8,
    pub frame_poll_interval: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            lens_facing: LensFacing::Front,
            preview_width: 1280,
            preview_height: 720,
            jpeg_quality: 90,
            frame_poll_interval: Duration::from_millis(10),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `CAMERAX_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("CAMERAX_APP_NAME") {
            if name.trim().is_empty() {
                warn!("CAMERAX_APP_NAME is empty, keeping {:?}", config.app_name);
            } else {
                config.app_name = name.trim().to_string();
            }
        }
        if let Ok(lens) = env::var("CAMERAX_LENS") {
            match parse_lens_facing(&lens) {
                Some(lens_facing) => config.lens_facing = lens_facing,
                None => warn!("unknown CAMERAX_LENS value {lens:?}"),
            }
        }
        if let Ok(size) = env::var("CAMERAX_PREVIEW_SIZE") {
            match parse_size(&size) {
                Some((width, height)) => {
                    config.preview_width = width;
                    config.preview_height = height;
                }
                None => warn!("invalid CAMERAX_PREVIEW_SIZE {size:?}, expected WIDTHxHEIGHT"),
            }
        }
        if let Ok(quality) = env::var("CAMERAX_JPEG_QUALITY") {
            match quality.trim().parse::<u8>() {
                Ok(q) if (1..=100).contains(&q) => config.jpeg_quality = q,
                _ => warn!("invalid CAMERAX_JPEG_QUALITY {quality:?}, expected 1..=100"),
            }
        }
        config
    }
}

pub fn parse_lens_facing(value: &str) -> Option<LensFacing> {
    match value.trim().to_ascii_lowercase().as_str() {
        "front" => Some(LensFacing::Front),
        "back" => Some(LensFacing::Back),
        "external" => Some(LensFacing::External),
        _ => None,
    }
}

pub fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (width, height) = value.trim().split_once(['x', 'X'])?;
    let width = width.trim().parse::<u32>().ok()?;
    let height = height.trim().parse::<u32>().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}
