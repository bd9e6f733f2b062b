use std::{path::PathBuf, thread, time::Duration};

use anyhow::{anyhow, Result};
use jni::{
    objects::{JObject, JObjectArray, JString, JValueGen},
    sys::{jint, JNIInvokeInterface_, _jobject},
    JNIEnv, JavaVM,
};
use log::{error, info, warn};
use slint::{android::AndroidApp, Timer};

use super::{Activity, PermissionCallback, ProviderCallback, ToastHandler};
use crate::{
    camera::{AndroidCameraProvider, CameraProvider},
    config::AppConfig,
    permission::{
        PermissionResult, PermissionState, PermissionWatch, READ_EXTERNAL_STORAGE,
        WRITE_EXTERNAL_STORAGE,
    },
    toast::LENGTH_SHORT,
};

const PERMISSIONS_REQUEST_CODE: i32 = 100;
const PERMISSION_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Android 13, where the legacy storage permissions stop being grantable.
const TIRAMISU: i32 = 33;
const LOCAL_FRAME_CAPACITY: i32 = 16;

pub struct AndroidActivity {
    app: AndroidApp,
    config: AppConfig,
    toast: ToastHandler,
}

impl AndroidActivity {
    pub fn new(app: AndroidApp, config: AppConfig, toast: ToastHandler) -> Self {
        Self { app, config, toast }
    }
}

impl Activity for AndroidActivity {
    fn check_self_permission(&self, permission: &str) -> Result<bool> {
        permission_granted(&self.app, permission)
    }

    fn request_permissions(&self, permissions: &[&str], callback: PermissionCallback) {
        let requested: Vec<String> = permissions.iter().map(|p| p.to_string()).collect();
        let before = permission_states(&self.app, &requested);
        let pending: Vec<&str> = before
            .iter()
            .filter(|state| !state.granted)
            .map(|state| state.permission.as_str())
            .collect();
        if let Err(err) = request_permissions(&self.app, &pending, PERMISSIONS_REQUEST_CODE) {
            error!("requestPermissions failed: {err:?}");
            callback(PermissionResult::denied(permissions));
            return;
        }

        // NativeActivity never sees onRequestPermissionsResult, watch the grant state instead
        let app = self.app.clone();
        let watch = PermissionWatch::new(before);
        thread::spawn(move || loop {
            thread::sleep(PERMISSION_POLL_INTERVAL);
            if is_finishing(&app).unwrap_or(false) {
                info!("activity finishing, permission request dropped");
                return;
            }
            if let Some(result) = watch.decide(&permission_states(&app, &requested)) {
                info!("permission result: {:?}", result.entries());
                callback(result);
                return;
            }
        });
    }

    fn process_camera_provider(&self, callback: ProviderCallback) {
        let (width, height) = (self.config.preview_width, self.config.preview_height);
        thread::spawn(move || {
            callback(
                AndroidCameraProvider::get_instance(width, height)
                    .map(|provider| Box::new(provider) as Box<dyn CameraProvider + Send>),
            )
        });
    }

    fn external_media_dirs(&self) -> Vec<PathBuf> {
        match external_media_dirs(&self.app) {
            Ok(dirs) => dirs,
            Err(err) => {
                warn!("getExternalMediaDirs failed: {err:?}");
                vec![]
            }
        }
    }

    fn files_dir(&self) -> Result<PathBuf> {
        files_dir(&self.app)
    }

    fn make_toast(&self, message: &str, duration: Duration) {
        info!("toast: {message}");
        (self.toast)(message, duration);
    }

    fn finish(&self) {
        let app = self.app.clone();
        // let the toast be read before the activity goes away
        Timer::single_shot(LENGTH_SHORT, move || {
            if let Err(err) = finish(&app) {
                error!("finish failed: {err:?}");
            }
        });
    }
}

fn java_vm(app: &AndroidApp) -> Result<JavaVM> {
    Ok(unsafe { JavaVM::from_raw(app.vm_as_ptr() as *mut *const JNIInvokeInterface_)? })
}

fn activity<'a>(app: &AndroidApp) -> JObject<'a> {
    unsafe { JObject::from_raw(app.activity_as_ptr() as *mut _jobject) }
}

/// Runs `f` on an attached thread inside a local reference frame, so the
/// locals it creates are freed on return even on long-lived threads.
fn with_activity<T>(
    app: &AndroidApp,
    f: impl FnOnce(&mut JNIEnv, &JObject) -> Result<T>,
) -> Result<T> {
    let vm = java_vm(app)?;
    let mut env = vm.attach_current_thread()?;
    let activity = activity(app);
    env.with_local_frame(LOCAL_FRAME_CAPACITY, |env| f(env, &activity))
}

pub fn sdk_version(app: &AndroidApp) -> Result<i32> {
    let vm = java_vm(app)?;
    let mut env = vm.attach_current_thread()?;
    Ok(env
        .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")?
        .i()?)
}

fn is_legacy_storage(permission: &str) -> bool {
    permission == READ_EXTERNAL_STORAGE || permission == WRITE_EXTERNAL_STORAGE
}

/// Photos go to app-scoped storage, so on Android 13+ the storage
/// permissions count as granted.
pub fn permission_granted(app: &AndroidApp, permission: &str) -> Result<bool> {
    if is_legacy_storage(permission) && sdk_version(app)? >= TIRAMISU {
        return Ok(true);
    }
    check_self_permission(app, permission)
}

fn permission_state(app: &AndroidApp, permission: &str) -> Result<PermissionState> {
    let granted = permission_granted(app, permission)?;
    let show_rationale = !granted && should_show_rationale(app, permission)?;
    Ok(PermissionState {
        permission: permission.to_string(),
        granted,
        show_rationale,
    })
}

fn permission_states(app: &AndroidApp, permissions: &[String]) -> Vec<PermissionState> {
    permissions
        .iter()
        .map(|permission| {
            permission_state(app, permission).unwrap_or_else(|err| {
                warn!("permission state of {permission} unknown: {err:?}");
                PermissionState {
                    permission: permission.clone(),
                    granted: false,
                    show_rationale: false,
                }
            })
        })
        .collect()
}

pub fn check_self_permission(app: &AndroidApp, permission: &str) -> Result<bool> {
    with_activity(app, |env, activity| {
        let granted_int = env
            .get_static_field(
                "android/content/pm/PackageManager",
                "PERMISSION_GRANTED",
                "I",
            )?
            .i()?;
        let permission_str = env.new_string(permission)?;
        let result = env
            .call_method(
                activity,
                "checkSelfPermission",
                "(Ljava/lang/String;)I",
                &[JValueGen::Object(&JObject::from(permission_str))],
            )?
            .i()?;
        Ok(result == granted_int)
    })
}

pub fn should_show_rationale(app: &AndroidApp, permission: &str) -> Result<bool> {
    with_activity(app, |env, activity| {
        let permission_str = env.new_string(permission)?;
        Ok(env
            .call_method(
                activity,
                "shouldShowRequestPermissionRationale",
                "(Ljava/lang/String;)Z",
                &[JValueGen::Object(&JObject::from(permission_str))],
            )?
            .z()?)
    })
}

pub fn request_permissions(app: &AndroidApp, permissions: &[&str], request_code: i32) -> Result<()> {
    if permissions.is_empty() {
        return Ok(());
    }
    with_activity(app, |env, activity| {
        let permission_count = permissions.len() as jint;
        let java_permission_array =
            env.new_object_array(permission_count, "java/lang/String", JObject::null())?;
        for (index, permission) in permissions.iter().enumerate() {
            let permission_str = env.new_string(*permission)?;
            env.set_object_array_element(&java_permission_array, index as jint, permission_str)?;
        }

        env.call_method(
            activity,
            "requestPermissions",
            "([Ljava/lang/String;I)V",
            &[
                JValueGen::Object(&JObject::from(java_permission_array)),
                request_code.into(),
            ],
        )?;
        Ok(())
    })
}

fn is_finishing(app: &AndroidApp) -> Result<bool> {
    with_activity(app, |env, activity| {
        Ok(env.call_method(activity, "isFinishing", "()Z", &[])?.z()?)
    })
}

fn absolute_path(env: &mut JNIEnv, file: &JObject) -> Result<PathBuf> {
    let path = env
        .call_method(file, "getAbsolutePath", "()Ljava/lang/String;", &[])?
        .l()?;
    let path = JString::from(path);
    let path: String = env.get_string(&path)?.into();
    Ok(PathBuf::from(path))
}

pub fn external_media_dirs(app: &AndroidApp) -> Result<Vec<PathBuf>> {
    with_activity(app, |env, activity| {
        let dirs = env
            .call_method(activity, "getExternalMediaDirs", "()[Ljava/io/File;", &[])?
            .l()?;
        if dirs.is_null() {
            return Ok(vec![]);
        }
        let dirs = JObjectArray::from(dirs);
        let len = env.get_array_length(&dirs)?;
        let mut paths = Vec::with_capacity(len as usize);
        for index in 0..len {
            // unmounted volumes show up as null entries
            let file = env.get_object_array_element(&dirs, index)?;
            if !file.is_null() {
                paths.push(absolute_path(env, &file)?);
            }
            env.delete_local_ref(file)?;
        }
        Ok(paths)
    })
}

pub fn files_dir(app: &AndroidApp) -> Result<PathBuf> {
    with_activity(app, |env, activity| {
        let file = env
            .call_method(activity, "getFilesDir", "()Ljava/io/File;", &[])?
            .l()?;
        if file.is_null() {
            return Err(anyhow!("getFilesDir returned null"));
        }
        absolute_path(env, &file)
    })
}

pub fn finish(app: &AndroidApp) -> Result<()> {
    with_activity(app, |env, activity| {
        env.call_method(activity, "finish", "()V", &[])?;
        Ok(())
    })
}
