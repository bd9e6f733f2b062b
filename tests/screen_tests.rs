mod common;

use std::{
    cell::RefCell,
    collections::VecDeque,
    fs,
    sync::mpsc::channel,
    thread,
    time::{Duration, Instant},
};

use chrono::{Duration as ChronoDuration, Local, TimeZone};
use slint_camerax::{
    camera::{LensFacing, OutputFileOptions},
    error::ImageCaptureError,
    permission::REQUIRED_PERMISSIONS,
    screen::{ScreenState, CAMERA_UNAVAILABLE_MESSAGE, PERMISSIONS_DENIED_MESSAGE},
    toast::LENGTH_SHORT,
};

use common::{pump_until, scratch_dir, screen, FakeActivity, FakeCameraProvider, QueuedClock};

#[test]
fn granted_permissions_bind_without_request() {
    let root = scratch_dir("pre-granted");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Back, LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);

    assert_eq!(screen.activity().permission_requests.get(), 0);
    assert!(screen.is_capture_ready());
    assert_eq!(handle.binds(), 1);
    let camera = screen.camera().unwrap();
    assert_eq!(camera.info().lens_facing, LensFacing::Front);
    assert!(screen.activity().toasts.borrow().is_empty());
}

#[test]
fn missing_permission_is_requested_once_then_binds() {
    let root = scratch_dir("request-granted");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS[..1]);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    assert_eq!(screen.state(), ScreenState::AwaitingPermissions);
    assert!(!screen.is_capture_ready());
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);

    assert_eq!(screen.activity().permission_requests.get(), 1);
    assert_eq!(handle.binds(), 1);
}

#[test]
fn denied_permission_toasts_once_and_finishes() {
    let root = scratch_dir("denied");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let mut activity = FakeActivity::new(&root, Some(provider));
    activity.grant_on_request = false;
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Finished);

    let activity = screen.activity();
    assert_eq!(*activity.toasts.borrow(), vec![PERMISSIONS_DENIED_MESSAGE.to_string()]);
    assert_eq!(*activity.toast_durations.borrow(), vec![LENGTH_SHORT]);
    assert_eq!(activity.finished.get(), 1);
    assert_eq!(activity.provider_requests.get(), 0);
    assert_eq!(handle.binds(), 0);
    assert!(screen.camera().is_none());
    assert!(screen.take_photo().is_none());
}

#[test]
fn capture_before_bind_is_ignored() {
    let root = scratch_dir("not-ready");
    let (provider, _handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider));
    let (mut screen, _frames) = screen(activity);

    assert!(screen.take_photo().is_none());
    screen.on_create();
    assert!(screen.take_photo().is_none());
    assert_eq!(screen.pending_captures(), 0);
    assert!(!root.join("media").exists());
    assert!(!root.join("files").exists());
}

#[test]
fn captures_are_named_after_their_instants() {
    let root = scratch_dir("two-captures");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let base = Local.with_ymd_and_hms(2023, 6, 14, 9, 30, 15).unwrap();
    let clock = QueuedClock(RefCell::new(VecDeque::from([
        base + ChronoDuration::milliseconds(120),
        base + ChronoDuration::milliseconds(121),
    ])));
    let (screen, frames) = screen(activity);
    let mut screen = screen.with_clock(clock);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);
    handle.push_frame(32, 24);
    assert!(frames.recv_timeout(Duration::from_secs(1)).is_ok());

    let first = screen.take_photo().unwrap();
    let second = screen.take_photo().unwrap();
    pump_until(&mut screen, |s| s.pending_captures() == 0);

    let dir = root.join("media").join("Slint CameraX");
    assert_eq!(first, dir.join("2023-06-14-09-30-15-120.jpg"));
    assert_eq!(second, dir.join("2023-06-14-09-30-15-121.jpg"));
    for path in [&first, &second] {
        let saved = image::open(path).unwrap();
        assert_eq!((saved.width(), saved.height()), (32, 24));
    }
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);
}

#[test]
fn falls_back_to_files_dir_without_media_dir() {
    let root = scratch_dir("fallback");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let mut activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    activity.media_dir = None;
    let base = Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
    let clock = QueuedClock(RefCell::new(VecDeque::from([base + ChronoDuration::milliseconds(6)])));
    let (screen, _frames) = screen(activity);
    let mut screen = screen.with_clock(clock);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);
    handle.push_frame(8, 8);

    let path = screen.take_photo().unwrap();
    pump_until(&mut screen, |s| s.pending_captures() == 0);

    assert_eq!(path, root.join("files").join("2024-01-02-03-04-05-006.jpg"));
    assert!(path.is_file());
}

#[test]
fn falls_back_to_files_dir_when_media_dir_cannot_be_created() {
    let root = scratch_dir("media-is-file");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    // the app folder would have to be created inside a regular file
    fs::write(root.join("media"), b"not a directory").unwrap();
    let base = Local.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
    let clock = QueuedClock(RefCell::new(VecDeque::from([base + ChronoDuration::milliseconds(10)])));
    let (screen, _frames) = screen(activity);
    let mut screen = screen.with_clock(clock);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);
    handle.push_frame(8, 8);

    let path = screen.take_photo().unwrap();
    pump_until(&mut screen, |s| s.pending_captures() == 0);

    assert_eq!(path, root.join("files").join("2024-05-06-07-08-09-010.jpg"));
    assert!(path.is_file());
    assert!(root.join("media").is_file());
}

#[test]
fn capture_without_frame_logs_failure_and_writes_nothing() {
    let root = scratch_dir("no-frame");
    let (provider, _handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);

    let path = screen.take_photo().unwrap();
    pump_until(&mut screen, |s| s.pending_captures() == 0);
    assert!(!path.exists());
    assert!(screen.activity().toasts.borrow().is_empty());
}

#[test]
fn destroyed_screen_does_not_capture_on_stale_session() {
    let root = scratch_dir("destroyed");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::Active);
    handle.push_frame(8, 8);
    assert!(screen.is_capture_ready());

    screen.on_destroy();
    assert_eq!(screen.state(), ScreenState::Destroyed);
    assert!(!screen.is_capture_ready());
    assert!(screen.take_photo().is_none());
    assert_eq!(handle.unbinds(), 1);
    assert!(!handle.camera().unwrap().is_open());

    let stale = handle.capture().unwrap();
    let (tx, rx) = channel();
    stale.take_picture(OutputFileOptions::new(root.join("stale.jpg")), move |result| {
        tx.send(result).unwrap();
    });
    let result = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(matches!(result, Err(ImageCaptureError::CameraClosed)));
    assert!(!root.join("stale.jpg").exists());
}

#[test]
fn provider_arriving_after_destroy_is_not_bound() {
    let root = scratch_dir("late-provider");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Front]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    assert_eq!(screen.state(), ScreenState::BindingCamera);
    screen.on_destroy();

    let deadline = Instant::now() + Duration::from_secs(10);
    while screen.pump() == 0 {
        assert!(Instant::now() < deadline, "provider never arrived");
        thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(handle.binds(), 0);
    assert_eq!(screen.state(), ScreenState::Destroyed);
}

#[test]
fn provider_failure_keeps_screen_open() {
    let root = scratch_dir("no-provider");
    let activity = FakeActivity::new(&root, None).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::CameraUnavailable);

    assert_eq!(
        *screen.activity().toasts.borrow(),
        vec![CAMERA_UNAVAILABLE_MESSAGE.to_string()]
    );
    assert_eq!(screen.activity().finished.get(), 0);
    assert!(screen.take_photo().is_none());
}

#[test]
fn missing_front_camera_is_reported() {
    let root = scratch_dir("no-front");
    let (provider, handle) = FakeCameraProvider::new(&[LensFacing::Back]);
    let activity = FakeActivity::new(&root, Some(provider)).pre_granted(&REQUIRED_PERMISSIONS);
    let (mut screen, _frames) = screen(activity);

    screen.on_create();
    pump_until(&mut screen, |s| s.state() == ScreenState::CameraUnavailable);

    assert_eq!(handle.binds(), 0);
    assert_eq!(handle.listings(), 1);
    assert!(!screen.is_capture_ready());
    assert!(screen.camera().is_none());
    assert_eq!(
        *screen.activity().toasts.borrow(),
        vec![CAMERA_UNAVAILABLE_MESSAGE.to_string()]
    );
}
