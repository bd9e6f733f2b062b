use anyhow::{anyhow, Result};
use core::slice;
use log::{debug, error, info, warn};
use ndk_sys::{
    acamera_metadata_tag, camera_status_t, media_status_t, ACameraCaptureSession,
    ACameraCaptureSession_close, ACameraCaptureSession_setRepeatingRequest,
    ACameraCaptureSession_stateCallbacks, ACameraDevice, ACameraDevice_StateCallbacks,
    ACameraDevice_close, ACameraDevice_createCaptureRequest, ACameraDevice_createCaptureSession,
    ACameraDevice_getId, ACameraDevice_request_template, ACameraManager, ACameraManager_create,
    ACameraManager_delete, ACameraManager_deleteCameraIdList,
    ACameraManager_getCameraCharacteristics, ACameraManager_getCameraIdList,
    ACameraManager_openCamera, ACameraMetadata, ACameraMetadata_const_entry, ACameraMetadata_free,
    ACameraMetadata_getConstEntry, ACameraOutputTarget, ACameraOutputTarget_create,
    ACameraOutputTarget_free, ACaptureRequest, ACaptureRequest_addTarget, ACaptureRequest_free,
    ACaptureSessionOutput, ACaptureSessionOutputContainer, ACaptureSessionOutputContainer_add,
    ACaptureSessionOutputContainer_create, ACaptureSessionOutputContainer_free,
    ACaptureSessionOutput_create, ACaptureSessionOutput_free, AImage, AImageReader,
    AImageReader_ImageListener, AImageReader_acquireLatestImage, AImageReader_delete,
    AImageReader_getWindow, AImageReader_new, AImageReader_setImageListener, AImage_delete,
    AImage_getHeight, AImage_getPlaneData, AImage_getPlanePixelStride, AImage_getPlaneRowStride,
    AImage_getWidth, ANativeWindow, AIMAGE_FORMATS,
};
use std::{
    ffi::{c_int, c_void, CStr, CString},
    mem::zeroed,
    ptr::null_mut,
    time::Instant,
};

use super::{
    closest_size,
    yuv::{self, YuvPlanes},
    Camera, CameraInfo, CameraProvider, CameraSelector, FrameSink, ImageCapture, LensFacing,
    Preview,
};

#[link(name = "camera2ndk")]
extern "C" {}

#[link(name = "mediandk")]
extern "C" {}

/// Camera2 NDK provider. Cameras are enumerated once when the provider is
/// acquired; the device is opened on bind.
pub struct AndroidCameraProvider {
    cameras: Vec<CameraInfo>,
    preview_width: u32,
    preview_height: u32,
    device: Option<Box<AndroidCamera>>,
    camera: Option<Camera>,
}

// SAFETY: the NDK camera objects are thread safe; the device is only opened
// and closed by whoever owns the provider.
unsafe impl Send for AndroidCameraProvider {}

impl AndroidCameraProvider {
    pub fn get_instance(preview_width: u32, preview_height: u32) -> Result<Self> {
        let cameras = unsafe { enumerate_cameras()? };
        info!("cameras: {:?}", cameras);
        Ok(Self {
            cameras,
            preview_width,
            preview_height,
            device: None,
            camera: None,
        })
    }
}

impl CameraProvider for AndroidCameraProvider {
    fn available_cameras(&self) -> Result<Vec<CameraInfo>> {
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
        // boxed so the NDK callbacks keep a stable context pointer
        let mut device = Box::new(AndroidCamera::new(
            info.clone(),
            FrameSink::new(preview.clone(), capture.clone()),
        ));
        device.open()?;
        device.start_preview(self.preview_width, self.preview_height)?;

        let camera = Camera::open(info);
        capture.attach(&camera);
        self.device = Some(device);
        self.camera = Some(camera.clone());
        Ok(camera)
    }

    fn unbind_all(&mut self) {
        if let Some(camera) = self.camera.take() {
            camera.close();
        }
        if let Some(mut device) = self.device.take() {
            device.close();
        }
    }
}

impl Drop for AndroidCameraProvider {
    fn drop(&mut self) {
        self.unbind_all();
    }
}

unsafe fn enumerate_cameras() -> Result<Vec<CameraInfo>> {
    let camera_manager = ACameraManager_create();
    let cameras = camera_infos(camera_manager);
    ACameraManager_delete(camera_manager);
    cameras
}

unsafe fn camera_infos(camera_manager: *mut ACameraManager) -> Result<Vec<CameraInfo>> {
    let mut camera_id_list_raw = null_mut();
    let camera_status = ACameraManager_getCameraIdList(camera_manager, &mut camera_id_list_raw);
    if camera_status != camera_status_t::ACAMERA_OK {
        return Err(anyhow!(
            "Failed to get camera id list (reason: {:?})",
            camera_status
        ));
    }
    if camera_id_list_raw.is_null() {
        return Err(anyhow!(
            "Failed to get camera id list (reason: camera_id_list is null)"
        ));
    }

    let camera_id_list = &*camera_id_list_raw;
    let camera_ids = if camera_id_list.numCameras < 1 || camera_id_list.cameraIds.is_null() {
        &[][..]
    } else {
        slice::from_raw_parts(camera_id_list.cameraIds, camera_id_list.numCameras as usize)
    };

    let mut cameras = Vec::with_capacity(camera_ids.len());
    for cid in camera_ids {
        let Some(id) = get_cstr(*cid) else {
            continue;
        };
        let mut camera_metadata = null_mut();
        let camera_status =
            ACameraManager_getCameraCharacteristics(camera_manager, *cid, &mut camera_metadata);
        if camera_status != camera_status_t::ACAMERA_OK {
            warn!("Failed to get camera meta data of id:{id} ({:?})", camera_status);
            continue;
        }
        let (lens_facing, sensor_orientation) = get_sensor_orientation(camera_metadata);
        ACameraMetadata_free(camera_metadata);
        cameras.push(CameraInfo {
            id: id.to_string(),
            lens_facing: LensFacing::from_metadata(lens_facing),
            sensor_orientation,
        });
    }
    ACameraManager_deleteCameraIdList(camera_id_list_raw);

    if cameras.is_empty() {
        return Err(anyhow!("No camera device detected."));
    }
    Ok(cameras)
}

unsafe fn get_sensor_orientation(camera_metadata: *const ACameraMetadata) -> (u8, i32) {
    let mut lens_facing: ACameraMetadata_const_entry = zeroed();
    let mut sensor_orientation: ACameraMetadata_const_entry = zeroed();

    ACameraMetadata_getConstEntry(
        camera_metadata,
        acamera_metadata_tag::ACAMERA_LENS_FACING.0,
        &mut lens_facing,
    );
    ACameraMetadata_getConstEntry(
        camera_metadata,
        acamera_metadata_tag::ACAMERA_SENSOR_ORIENTATION.0,
        &mut sensor_orientation,
    );

    let lens_facing = if lens_facing.count > 0 {
        *lens_facing.data.u8_
    } else {
        2
    };
    let sensor_orientation = if sensor_orientation.count > 0 {
        *sensor_orientation.data.i32_
    } else {
        0
    };
    (lens_facing, sensor_orientation)
}

/// YUV_420_888 output sizes, as (width, height).
unsafe fn get_video_size(camera_metadata: *const ACameraMetadata) -> Result<Vec<(i32, i32)>> {
    let mut available_configs: ACameraMetadata_const_entry = zeroed();
    let camera_status = ACameraMetadata_getConstEntry(
        camera_metadata,
        acamera_metadata_tag::ACAMERA_SCALER_AVAILABLE_STREAM_CONFIGURATIONS.0,
        &mut available_configs,
    );
    if camera_status != camera_status_t::ACAMERA_OK {
        return Err(anyhow!(
            "Failed to get ACameraMetadata_const_entry res={:?}",
            camera_status
        ));
    }

    // format, width, height, input
    let data_i32_list: &[i32] =
        slice::from_raw_parts(available_configs.data.i32_, available_configs.count as usize);
    let sizes = data_i32_list
        .chunks_exact(4)
        .filter(|entry| {
            entry[3] == 0 && entry[0] == AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888.0 as i32
        })
        .map(|entry| (entry[1], entry[2]))
        .collect();
    Ok(sizes)
}

struct AndroidCamera {
    info: CameraInfo,
    sink: FrameSink,
    camera_device: *mut ACameraDevice,
    capture_request: *mut ACaptureRequest,
    camera_output_target: *mut ACameraOutputTarget,
    session_output: *mut ACaptureSessionOutput,
    capture_session_output_container: *mut ACaptureSessionOutputContainer,
    capture_session: *mut ACameraCaptureSession,
    image_reader: *mut AImageReader,
    image_sizes: Vec<(i32, i32)>,
    image_listener: AImageReader_ImageListener,
    capture_session_state_callbacks: ACameraCaptureSession_stateCallbacks,
    device_state_callbacks: ACameraDevice_StateCallbacks,
    timer: Instant,
    frame_count: i32,
}

impl AndroidCamera {
    fn new(info: CameraInfo, sink: FrameSink) -> Self {
        Self {
            info,
            sink,
            camera_device: null_mut(),
            capture_request: null_mut(),
            camera_output_target: null_mut(),
            session_output: null_mut(),
            capture_session_output_container: null_mut(),
            capture_session: null_mut(),
            image_reader: null_mut(),
            image_sizes: vec![],
            image_listener: AImageReader_ImageListener {
                context: null_mut(),
                onImageAvailable: None,
            },
            capture_session_state_callbacks: unsafe { zeroed() },
            device_state_callbacks: unsafe { zeroed() },
            timer: Instant::now(),
            frame_count: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        let camera_id = CString::new(self.info.id.as_str())?;
        unsafe {
            let camera_manager = ACameraManager_create();
            let result = self.open_device(camera_manager, &camera_id);
            ACameraManager_delete(camera_manager);
            result
        }
    }

    unsafe fn open_device(
        &mut self,
        camera_manager: *mut ACameraManager,
        camera_id: &CStr,
    ) -> Result<()> {
        let mut camera_metadata = null_mut();
        let camera_status = ACameraManager_getCameraCharacteristics(
            camera_manager,
            camera_id.as_ptr(),
            &mut camera_metadata,
        );
        if camera_status != camera_status_t::ACAMERA_OK {
            return Err(anyhow!(
                "Failed to get camera meta data of id:{}",
                self.info.id
            ));
        }
        let sizes = get_video_size(camera_metadata);
        ACameraMetadata_free(camera_metadata);
        self.image_sizes = sizes?;
        debug!("YUV_420 sizes: {:?}", self.image_sizes);

        unsafe extern "C" fn on_disconnected(_data: *mut c_void, device: *mut ACameraDevice) {
            info!(
                "Camera(id: {:?}) is disconnected.",
                get_cstr(ACameraDevice_getId(device))
            );
        }

        unsafe extern "C" fn on_error(_data: *mut c_void, device: *mut ACameraDevice, error: c_int) {
            error!(
                "Error(code: {}) on Camera(id: {:?}).",
                error,
                get_cstr(ACameraDevice_getId(device))
            );
        }

        self.device_state_callbacks.onDisconnected = Some(on_disconnected);
        self.device_state_callbacks.onError = Some(on_error);

        let camera_status = ACameraManager_openCamera(
            camera_manager,
            camera_id.as_ptr(),
            &mut self.device_state_callbacks,
            &mut self.camera_device,
        );
        if camera_status != camera_status_t::ACAMERA_OK {
            return Err(anyhow!(
                "Failed to open camera device (id: {}, reason: {:?})",
                self.info.id,
                camera_status
            ));
        }
        info!(
            "Camera {} opened, lens {:?}, orientation {}",
            self.info.id, self.info.lens_facing, self.info.sensor_orientation
        );
        Ok(())
    }

    fn start_preview(&mut self, width: u32, height: u32) -> Result<()> {
        let (width, height) = closest_size(&self.image_sizes, width, height).unwrap_or((width, height));
        info!("preview size {width}x{height}");
        self.create_image_reader(width, height, AIMAGE_FORMATS::AIMAGE_FORMAT_YUV_420_888)?;
        unsafe {
            let camera_status = ACameraDevice_createCaptureRequest(
                self.camera_device,
                ACameraDevice_request_template::TEMPLATE_PREVIEW,
                &mut self.capture_request,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create preview capture request (id: {})",
                    self.info.id
                ));
            }

            let mut native_window: *mut ANativeWindow = null_mut();
            let res = AImageReader_getWindow(self.image_reader, &mut native_window);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("AImageReader_getWindow error res={:?}.", res));
            }

            ACameraOutputTarget_create(native_window, &mut self.camera_output_target);
            ACaptureRequest_addTarget(self.capture_request, self.camera_output_target);
            ACaptureSessionOutput_create(native_window, &mut self.session_output);

            let camera_status =
                ACaptureSessionOutputContainer_create(&mut self.capture_session_output_container);
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session output container (reason: {:?})",
                    camera_status
                ));
            }

            unsafe extern "C" fn capture_session_on_ready(
                _context: *mut c_void,
                session: *mut ACameraCaptureSession,
            ) {
                debug!("Session is ready. {:?}", session);
            }

            unsafe extern "C" fn capture_session_on_active(
                _context: *mut c_void,
                session: *mut ACameraCaptureSession,
            ) {
                debug!("Session is activated. {:?}", session);
            }

            unsafe extern "C" fn capture_session_on_closed(
                _context: *mut c_void,
                session: *mut ACameraCaptureSession,
            ) {
                debug!("Session is closed. {:?}", session);
            }

            self.capture_session_state_callbacks.onReady = Some(capture_session_on_ready);
            self.capture_session_state_callbacks.onActive = Some(capture_session_on_active);
            self.capture_session_state_callbacks.onClosed = Some(capture_session_on_closed);

            ACaptureSessionOutputContainer_add(
                self.capture_session_output_container,
                self.session_output,
            );

            let camera_status = ACameraDevice_createCaptureSession(
                self.camera_device,
                self.capture_session_output_container,
                &self.capture_session_state_callbacks,
                &mut self.capture_session,
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to create capture session (reason: {:?})",
                    camera_status
                ));
            }

            let camera_status = ACameraCaptureSession_setRepeatingRequest(
                self.capture_session,
                null_mut(),
                1,
                &mut self.capture_request,
                null_mut(),
            );
            if camera_status != camera_status_t::ACAMERA_OK {
                return Err(anyhow!(
                    "Failed to set repeating request (reason: {:?})",
                    camera_status
                ));
            }
        }
        Ok(())
    }

    fn on_image_available(&mut self) -> Result<()> {
        let frame = unsafe {
            let mut image = null_mut();
            let media_status = AImageReader_acquireLatestImage(self.image_reader, &mut image);
            if media_status != media_status_t::AMEDIA_OK {
                return Err(
                    if media_status == media_status_t::AMEDIA_IMGREADER_NO_BUFFER_AVAILABLE {
                        anyhow!("An image reader frame was discarded")
                    } else {
                        anyhow!(
                            "Failed to acquire latest image from image reader, error: {:?}.",
                            media_status
                        )
                    },
                );
            }
            let frame = decode_image(image);
            AImage_delete(image);
            frame?
        };
        self.sink
            .submit(yuv::rotate(frame, self.info.sensor_orientation));

        self.frame_count += 1;
        if self.timer.elapsed().as_millis() > 1000 {
            debug!("preview FPS:{}", self.frame_count);
            self.timer = Instant::now();
            self.frame_count = 0;
        }
        Ok(())
    }

    fn create_image_reader(
        &mut self,
        width: u32,
        height: u32,
        image_format: AIMAGE_FORMATS,
    ) -> Result<()> {
        unsafe {
            let res = AImageReader_new(
                width as i32,
                height as i32,
                image_format.0 as i32,
                2,
                &mut self.image_reader,
            );
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("create Image Reader error res={:?}.", res));
            }

            unsafe extern "C" fn on_image_available(
                context: *mut c_void,
                _image_reader: *mut AImageReader,
            ) {
                let camera = &mut *(context as *mut AndroidCamera);
                if let Err(err) = camera.on_image_available() {
                    debug!("on_image_available: {err}");
                }
            }

            self.image_listener.context = (self as *mut AndroidCamera) as *mut c_void;
            self.image_listener.onImageAvailable = Some(on_image_available);

            let res = AImageReader_setImageListener(self.image_reader, &mut self.image_listener);
            if res != media_status_t::AMEDIA_OK {
                return Err(anyhow!("set Image Listener error res={:?}.", res));
            }
        }
        Ok(())
    }

    fn close(&mut self) {
        unsafe {
            if !self.capture_session.is_null() {
                ACameraCaptureSession_close(self.capture_session);
                self.capture_session = null_mut();
            }

            if !self.capture_request.is_null() {
                ACaptureRequest_free(self.capture_request);
                self.capture_request = null_mut();
            }

            if !self.camera_output_target.is_null() {
                ACameraOutputTarget_free(self.camera_output_target);
                self.camera_output_target = null_mut();
            }

            if !self.camera_device.is_null() {
                let camera_status = ACameraDevice_close(self.camera_device);
                if camera_status != camera_status_t::ACAMERA_OK {
                    error!("Failed to close CameraDevice.");
                }
                self.camera_device = null_mut();
            }

            if !self.session_output.is_null() {
                ACaptureSessionOutput_free(self.session_output);
                self.session_output = null_mut();
            }

            if !self.capture_session_output_container.is_null() {
                ACaptureSessionOutputContainer_free(self.capture_session_output_container);
                self.capture_session_output_container = null_mut();
            }

            if !self.image_reader.is_null() {
                AImageReader_delete(self.image_reader);
                self.image_reader = null_mut();
            }
        }
        info!("Close Camera {}", self.info.id);
    }
}

impl Drop for AndroidCamera {
    fn drop(&mut self) {
        self.close();
    }
}

unsafe fn decode_image(image: *mut AImage) -> Result<image::RgbaImage> {
    let mut width = 0;
    let mut height = 0;
    let res = AImage_getWidth(image, &mut width);
    if res != media_status_t::AMEDIA_OK {
        return Err(anyhow!("AImage_getWidth error res={:?}.", res));
    }
    let res = AImage_getHeight(image, &mut height);
    if res != media_status_t::AMEDIA_OK {
        return Err(anyhow!("AImage_getHeight error res={:?}.", res));
    }

    let mut y_stride = 0;
    let mut uv_stride = 0;
    let mut uv_pixel_stride = 0;
    AImage_getPlaneRowStride(image, 0, &mut y_stride);
    AImage_getPlaneRowStride(image, 1, &mut uv_stride);
    AImage_getPlanePixelStride(image, 1, &mut uv_pixel_stride);

    let y = plane_data(image, 0)?;
    let u = plane_data(image, 1)?;
    let v = plane_data(image, 2)?;

    let planes = YuvPlanes {
        y,
        y_row_stride: y_stride.max(0) as usize,
        u,
        v,
        uv_row_stride: uv_stride.max(0) as usize,
        uv_pixel_stride: uv_pixel_stride.max(1) as usize,
    };
    Ok(yuv::yuv420_to_rgba(&planes, width as u32, height as u32))
}

unsafe fn plane_data<'a>(image: *mut AImage, plane: c_int) -> Result<&'a [u8]> {
    let mut data = null_mut();
    let mut len = 0;
    let res = AImage_getPlaneData(image, plane, &mut data, &mut len);
    if res != media_status_t::AMEDIA_OK || data.is_null() {
        return Err(anyhow!("AImage_getPlaneData({plane}) error res={:?}.", res));
    }
    Ok(slice::from_raw_parts(data, len.max(0) as usize))
}

unsafe fn get_cstr<'a>(s: *const ::std::os::raw::c_char) -> Option<&'a str> {
    if s.is_null() {
        return None;
    }
    CStr::from_ptr(s).to_str().ok()
}
