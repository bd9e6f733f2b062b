pub mod activity;
pub mod app;
pub mod camera;
pub mod config;
pub mod error;
pub mod output;
pub mod permission;
pub mod screen;
pub mod toast;

#[cfg(target_os = "android")]
#[no_mangle]
fn android_main(app: slint::android::AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("slint_camerax"),
    );
    if let Err(err) = slint::android::init(app.clone()) {
        log::error!("slint android init failed: {err:?}");
        return;
    }
    if let Err(err) = app::run(app) {
        log::error!("camera app failed: {err:?}");
    }
}
