use std::{cell::RefCell, rc::Rc, sync::mpsc::channel, time::Duration};

use anyhow::Result;
use log::info;
use slint::{Image, Timer, TimerMode};

#[cfg(target_os = "android")]
use crate::activity::AndroidActivity;
#[cfg(not(target_os = "android"))]
use crate::activity::DesktopActivity;
use crate::{activity::ToastHandler, config::AppConfig, screen::CameraScreen};

slint::slint! {
    import { Button } from "std-widgets.slint";
    export component MainWindow inherits Window {
        in-out property <image> camera-texture <=> camera-texture.source;
        in-out property <string> toast-text;
        in-out property <bool> toast-visible;
        callback take-photo();

        background: black;

        Rectangle {
            width: 100%;
            height: 100%;
            HorizontalLayout {
                padding: 0px;
                alignment: center;
                camera-texture := Image {
                    image-fit: contain;
                }
            }
            Rectangle {
                height: 48px;
                width: 140px;
                x: (parent.width/2 - self.width/2);
                y: (parent.height - self.height - 24px);
                Button {
                    text: "Take photo";
                    clicked => {
                        take-photo();
                    }
                }
            }
            if toast-visible: Rectangle {
                x: (parent.width/2 - self.width/2);
                y: (parent.height - 140px);
                width: toast-label.preferred-width + 32px;
                height: 40px;
                border-radius: 20px;
                background: #323232e6;
                toast-label := Text {
                    text: toast-text;
                    color: white;
                    horizontal-alignment: center;
                    vertical-alignment: center;
                }
            }
        }
    }
}

/// In-window toast, hidden again by a single shot timer.
struct Toaster {
    window: slint::Weak<MainWindow>,
    timer: Timer,
}

impl Toaster {
    fn show(&self, message: &str, duration: Duration) {
        let Some(window) = self.window.upgrade() else {
            return;
        };
        window.set_toast_text(message.into());
        window.set_toast_visible(true);
        let weak = self.window.clone();
        self.timer.start(TimerMode::SingleShot, duration, move || {
            if let Some(window) = weak.upgrade() {
                window.set_toast_visible(false);
            }
        });
    }

    fn into_handler(self) -> ToastHandler {
        Box::new(move |message: &str, duration: Duration| self.show(message, duration))
    }
}

pub fn run(
    #[cfg(target_os = "android")]
    android_app: slint::android::AndroidApp,
) -> Result<()> {
    let config = AppConfig::from_env();
    info!("starting with {:?}", config);

    let app = MainWindow::new()?;

    let (image_sender, image_receiver) = channel();

    let toaster = Toaster {
        window: app.as_weak(),
        timer: Timer::default(),
    }
    .into_handler();

    #[cfg(target_os = "android")]
    let activity = AndroidActivity::new(android_app, config.clone(), toaster);
    #[cfg(not(target_os = "android"))]
    let activity = DesktopActivity::new(config.clone(), toaster);

    let screen = Rc::new(RefCell::new(CameraScreen::new(
        activity,
        config.clone(),
        image_sender,
    )));
    screen.borrow_mut().on_create();

    let app_clone = app.as_weak();
    let screen_clone = screen.clone();
    let timer = Timer::default();
    timer.start(TimerMode::Repeated, config.frame_poll_interval, move || {
        screen_clone.borrow_mut().pump();
        // only the newest frame is worth drawing
        if let (Some(buffer), Some(app)) = (image_receiver.try_iter().last(), app_clone.upgrade()) {
            app.set_camera_texture(Image::from_rgba8(buffer));
        }
    });

    let screen_clone = screen.clone();
    app.on_take_photo(move || {
        if screen_clone.borrow_mut().take_photo().is_none() {
            info!("camera not ready, ignoring capture");
        }
    });

    app.run()?;
    timer.stop();
    screen.borrow_mut().on_destroy();
    Ok(())
}
