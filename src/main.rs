// Android enters through `android_main` in the library.
#![cfg_attr(target_os = "android", no_main)]

#[cfg(not(target_os = "android"))]
fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    slint_camerax::app::run()
}
