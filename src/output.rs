use std::{fs, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Local};
use log::warn;

use crate::activity::Activity;

/// `yyyy-MM-dd-HH-mm-ss-SSS`
pub const FILENAME_FORMAT: &str = "%Y-%m-%d-%H-%M-%S-%3f";

pub trait Clock {
    fn now(&self) -> DateTime<Local>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

pub fn photo_file_name(instant: DateTime<Local>) -> String {
    format!("{}.jpg", instant.format(FILENAME_FORMAT))
}

/// `<first external media dir>/<app_name>`, or the private files dir when
/// there is no usable external media dir.
pub fn output_directory<A: Activity + ?Sized>(activity: &A, app_name: &str) -> Result<PathBuf> {
    let media_dir = activity
        .external_media_dirs()
        .into_iter()
        .next()
        .map(|dir| dir.join(app_name))
        .filter(|dir| match fs::create_dir_all(dir) {
            Ok(()) => dir.is_dir(),
            Err(err) => {
                warn!("cannot create {}: {err}", dir.display());
                false
            }
        });
    match media_dir {
        Some(dir) => Ok(dir),
        None => activity.files_dir(),
    }
}
