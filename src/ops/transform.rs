// ============================================================================
// TRANSFORM OPERATIONS — fade, resize, flip, rotate-with-expand for overlays
// ============================================================================

use image::{RgbaImage, imageops};
use rayon::prelude::*;

/// Interpolation method for resize operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    Nearest,
    Bilinear,
    Bicubic,
    /// High-quality downscale filter used for every overlay render.
    #[default]
    Lanczos3,
}

impl Interpolation {
    pub fn label(&self) -> &'static str {
        match self {
            Interpolation::Nearest  => "nearest",
            Interpolation::Bilinear => "bilinear",
            Interpolation::Bicubic  => "bicubic",
            Interpolation::Lanczos3 => "lanczos3",
        }
    }

    pub fn all() -> &'static [Interpolation] {
        &[
            Interpolation::Nearest,
            Interpolation::Bilinear,
            Interpolation::Bicubic,
            Interpolation::Lanczos3,
        ]
    }

    /// Inverse of [`label`](Self::label), case-insensitive.
    pub fn from_label(label: &str) -> Option<Interpolation> {
        let label = label.trim().to_ascii_lowercase();
        Self::all().iter().copied().find(|i| i.label() == label)
    }

    pub fn to_filter(&self) -> imageops::FilterType {
        match self {
            Interpolation::Nearest  => imageops::FilterType::Nearest,
            Interpolation::Bilinear => imageops::FilterType::Triangle,
            Interpolation::Bicubic  => imageops::FilterType::CatmullRom,
            Interpolation::Lanczos3 => imageops::FilterType::Lanczos3,
        }
    }
}

// ---------------------------------------------------------------------------
//  Per-step operations
// ---------------------------------------------------------------------------

/// Multiply every alpha by `opacity`, rounding down. No-op at full opacity.
pub fn apply_opacity(img: &mut RgbaImage, opacity: f32) {
    if opacity >= 1.0 {
        return;
    }
    let factor = opacity.max(0.0);
    img.as_mut().par_chunks_mut(4).for_each(|px| {
        px[3] = (px[3] as f32 * factor).floor() as u8;
    });
}

/// Resize to exactly `(w, h)`. Returns the input unchanged when the size
/// already matches.
pub fn resize_to(img: RgbaImage, w: u32, h: u32, interp: Interpolation) -> RgbaImage {
    if img.dimensions() == (w, h) {
        return img;
    }
    imageops::resize(&img, w, h, interp.to_filter())
}

/// Mirror in place: horizontal first, then vertical.
pub fn apply_flips(img: &mut RgbaImage, horizontal: bool, vertical: bool) {
    if horizontal {
        imageops::flip_horizontal_in_place(img);
    }
    if vertical {
        imageops::flip_vertical_in_place(img);
    }
}

// ---------------------------------------------------------------------------
//  Rotation with canvas expansion
// ---------------------------------------------------------------------------

/// Output size for rotating a `w × h` frame by `angle_degrees` about
/// `center` (frame coordinates) so that the result, centred on the frame
/// centre, holds every rotated corner.
pub fn expanded_size(w: u32, h: u32, angle_degrees: f64, center: (f64, f64)) -> (u32, u32) {
    let (sin, cos) = angle_degrees.to_radians().sin_cos();
    let (fw, fh) = (w as f64, h as f64);
    let (mid_x, mid_y) = (fw / 2.0, fh / 2.0);

    let mut half_w: f64 = 0.0;
    let mut half_h: f64 = 0.0;
    for (x, y) in [(0.0, 0.0), (fw, 0.0), (0.0, fh), (fw, fh)] {
        let (rx, ry) = rotate_point((x, y), center, sin, cos);
        half_w = half_w.max((rx - mid_x).abs());
        half_h = half_h.max((ry - mid_y).abs());
    }
    // Trim float noise so a 90° turn of 10×20 is 20×10, not 21×11
    let nw = ((2.0 * half_w) - 1e-9).ceil().max(1.0) as u32;
    let nh = ((2.0 * half_h) - 1e-9).ceil().max(1.0) as u32;
    (nw, nh)
}

/// Clockwise (screen, y-down) rotation of `p` about `c`.
fn rotate_point(p: (f64, f64), c: (f64, f64), sin: f64, cos: f64) -> (f64, f64) {
    let (dx, dy) = (p.0 - c.0, p.1 - c.1);
    (c.0 + dx * cos - dy * sin, c.1 + dx * sin + dy * cos)
}

/// Rotate `src` clockwise by `angle_degrees` about `center` (frame
/// coordinates, default the frame centre).
///
/// The output canvas grows so nothing is cropped, and stays centred on the
/// source frame centre: placing the result centred where the source frame
/// was centred puts the rotated content exactly where a rotation about
/// `center` would. Sampling is bilinear against a transparent background.
pub fn rotate_expand(src: &RgbaImage, angle_degrees: f64, center: Option<(f64, f64)>) -> RgbaImage {
    let (w, h) = src.dimensions();
    let angle = angle_degrees.rem_euclid(360.0);
    if angle == 0.0 || w == 0 || h == 0 {
        return src.clone();
    }

    let (fw, fh) = (w as f64, h as f64);
    let center = center.unwrap_or((fw / 2.0, fh / 2.0));
    let (nw, nh) = expanded_size(w, h, angle, center);
    let (sin, cos) = angle.to_radians().sin_cos();

    // Output pixel (ox, oy) ↔ frame point (ox - shift_x, oy - shift_y)
    let shift_x = (nw as f64 - fw) / 2.0;
    let shift_y = (nh as f64 - fh) / 2.0;

    let src_w = w as i32;
    let src_h = h as i32;
    let src_stride = w as usize * 4;
    let src_raw = src.as_raw();

    let mut dst = RgbaImage::new(nw, nh);
    let row_bytes = nw as usize * 4;

    dst.as_mut().par_chunks_mut(row_bytes).enumerate().for_each(|(oy, row)| {
        let fy = oy as f64 + 0.5 - shift_y - center.1;

        for ox in 0..nw as usize {
            let fx = ox as f64 + 0.5 - shift_x - center.0;

            // Inverse (counter-clockwise) rotation back into the source
            let src_x = (center.0 + fx * cos + fy * sin - 0.5) as f32;
            let src_y = (center.1 - fx * sin + fy * cos - 0.5) as f32;

            let x0 = src_x.floor() as i32;
            let y0 = src_y.floor() as i32;
            if x0 < -1 || y0 < -1 || x0 >= src_w || y0 >= src_h { continue; }

            let tx = src_x - x0 as f32;
            let ty = src_y - y0 as f32;

            let sample = |sx: i32, sy: i32| -> [f32; 4] {
                if sx < 0 || sy < 0 || sx >= src_w || sy >= src_h {
                    [0.0; 4]
                } else {
                    let idx = sy as usize * src_stride + sx as usize * 4;
                    [
                        src_raw[idx]     as f32,
                        src_raw[idx + 1] as f32,
                        src_raw[idx + 2] as f32,
                        src_raw[idx + 3] as f32,
                    ]
                }
            };

            let tl = sample(x0, y0);
            let tr = sample(x0 + 1, y0);
            let bl = sample(x0, y0 + 1);
            let br = sample(x0 + 1, y0 + 1);

            let px = ox * 4;
            for c in 0..4 {
                let top = tl[c] + (tr[c] - tl[c]) * tx;
                let bot = bl[c] + (br[c] - bl[c]) * tx;
                row[px + c] = (top + (bot - top) * ty).round().clamp(0.0, 255.0) as u8;
            }
        }
    });
    dst
}
