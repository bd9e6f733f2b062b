use image::{
    imageops::{rotate180, rotate270, rotate90},
    Rgba, RgbaImage,
};

/// Planes of a YUV_420_888 image. Chroma is subsampled 2x2; the pixel stride
/// tells interleaved (NV21/NV12, stride 2) from planar (I420, stride 1).
pub struct YuvPlanes<'a> {
    pub y: &'a [u8],
    pub y_row_stride: usize,
    pub u: &'a [u8],
    pub v: &'a [u8],
    pub uv_row_stride: usize,
    pub uv_pixel_stride: usize,
}

/// BT.601 limited range to RGBA, fixed point.
pub fn yuv420_to_rgba(planes: &YuvPlanes, width: u32, height: u32) -> RgbaImage {
    let mut rgba = RgbaImage::new(width, height);
    for row in 0..height as usize {
        let uv_row = (row >> 1) * planes.uv_row_stride;
        for col in 0..width as usize {
            let y = planes.y.get(row * planes.y_row_stride + col).copied().unwrap_or(16) as i32;
            let uv_idx = uv_row + (col >> 1) * planes.uv_pixel_stride;
            let u = planes.u.get(uv_idx).copied().unwrap_or(128) as i32 - 128;
            let v = planes.v.get(uv_idx).copied().unwrap_or(128) as i32 - 128;

            let y1192 = 1192 * (y - 16).max(0);
            let r = (y1192 + 1634 * v).clamp(0, 262143);
            let g = (y1192 - 833 * v - 400 * u).clamp(0, 262143);
            let b = (y1192 + 2066 * u).clamp(0, 262143);

            rgba.put_pixel(
                col as u32,
                row as u32,
                Rgba([(r >> 10) as u8, (g >> 10) as u8, (b >> 10) as u8, 255]),
            );
        }
    }
    rgba
}

/// Rotates clockwise by a sensor orientation (multiples of 90).
pub fn rotate(frame: RgbaImage, degrees: i32) -> RgbaImage {
    match degrees.rem_euclid(360) {
        90 => rotate90(&frame),
        180 => rotate180(&frame),
        270 => rotate270(&frame),
        _ => frame,
    }
}
