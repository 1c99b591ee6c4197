// ============================================================================
// IMAGE STATE — per-image transform model (position, scale, rotation, flip,
// opacity). Pure data; no I/O, no rendering.
// ============================================================================

use std::sync::Arc;

use image::RgbaImage;

/// Lower bound of the zoom range.
pub const MIN_SCALE: f64 = 0.1;
/// Upper bound of the zoom range.
pub const MAX_SCALE: f64 = 10.0;
/// Opacity of the "faint" overlay level. The overlay never goes below this
/// while it is shown.
pub const MIN_OPACITY: f32 = 0.2;
/// Opacity of the fully opaque level.
pub const MAX_OPACITY: f32 = 1.0;
/// Where a freshly imported image is centred.
pub const DEFAULT_OFFSET: (f64, f64) = (512.0, 512.0);

/// Mirror axis for [`ImageTransform::toggle_flip`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    Horizontal,
    Vertical,
}

/// The two opacity levels exposed to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpacityLevel {
    Min,
    Max,
}

impl OpacityLevel {
    pub fn value(self) -> f32 {
        match self {
            OpacityLevel::Min => MIN_OPACITY,
            OpacityLevel::Max => MAX_OPACITY,
        }
    }
}

/// Visual state of one loaded image.
///
/// Mutated in place by every transform operation. The source raster and
/// vector markup are shared and never modified.
#[derive(Clone, Debug)]
pub struct ImageTransform {
    pub identity: String,
    source_pixels: Arc<RgbaImage>,
    source_vector_markup: Option<Arc<str>>,
    angle_degrees: f64,
    scale_factor: f64,
    scale_log: f64,
    pub offset: (f64, f64),
    pub rotation_pivot: Option<(f64, f64)>,
    pub flipped_horizontally: bool,
    pub flipped_vertically: bool,
    opacity: f32,
    pub visible: bool,
}

impl ImageTransform {
    /// Create a transform with the import defaults (faint, visible, centred
    /// at [`DEFAULT_OFFSET`]).
    pub fn new(
        identity: impl Into<String>,
        source_pixels: RgbaImage,
        source_vector_markup: Option<String>,
    ) -> Self {
        Self {
            identity: identity.into(),
            source_pixels: Arc::new(source_pixels),
            source_vector_markup: source_vector_markup.map(Arc::from),
            angle_degrees: 0.0,
            scale_factor: 1.0,
            scale_log: 0.0,
            offset: DEFAULT_OFFSET,
            rotation_pivot: None,
            flipped_horizontally: false,
            flipped_vertically: false,
            opacity: MIN_OPACITY,
            visible: true,
        }
    }

    pub fn source_pixels(&self) -> &RgbaImage {
        &self.source_pixels
    }

    pub fn source_vector_markup(&self) -> Option<&str> {
        self.source_vector_markup.as_deref()
    }

    pub fn is_vector(&self) -> bool {
        self.source_vector_markup.is_some()
    }

    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn scale_log(&self) -> f64 {
        self.scale_log
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    // ---------------------------------------------------------------------
    //  Mutations
    // ---------------------------------------------------------------------

    /// Rotate by `delta` degrees; the angle stays in `[0, 360)`.
    pub fn set_rotation(&mut self, delta: f64) {
        self.angle_degrees = normalize_angle(self.angle_degrees + delta);
    }

    /// Multiplicative zoom expressed in log2 units.
    pub fn set_zoom(&mut self, delta_log: f64) {
        let target = 2f64.powf(self.scale_log + delta_log);
        self.apply_scale(target);
    }

    /// Linear zoom step (`scale + amount`), used by the zoom buttons.
    pub fn adjust_scale(&mut self, amount: f64) {
        self.apply_scale(self.scale_factor + amount);
    }

    /// Clamp and store `scale`, then recompute the log from the clamped value
    /// so the two representations never drift apart.
    fn apply_scale(&mut self, scale: f64) {
        let scale = if scale.is_finite() { scale } else { 1.0 };
        self.scale_factor = scale.clamp(MIN_SCALE, MAX_SCALE);
        self.scale_log = self.scale_factor.log2();
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.offset.0 += dx;
        self.offset.1 += dy;
    }

    pub fn toggle_flip(&mut self, axis: FlipAxis) {
        match axis {
            FlipAxis::Horizontal => self.flipped_horizontally = !self.flipped_horizontally,
            FlipAxis::Vertical => self.flipped_vertically = !self.flipped_vertically,
        }
    }

    pub fn set_pivot(&mut self, pivot: Option<(f64, f64)>) {
        self.rotation_pivot = pivot;
    }

    pub fn set_opacity_level(&mut self, level: OpacityLevel) {
        self.opacity = level.value();
    }

    /// Flip between the faint and opaque levels. Returns the new level.
    pub fn toggle_opacity(&mut self) -> OpacityLevel {
        let level = if self.opacity > MIN_OPACITY {
            OpacityLevel::Min
        } else {
            OpacityLevel::Max
        };
        self.set_opacity_level(level);
        level
    }

    pub fn opacity_level(&self) -> OpacityLevel {
        if self.opacity > MIN_OPACITY {
            OpacityLevel::Max
        } else {
            OpacityLevel::Min
        }
    }

    /// Return every visual field to its reset default. Identity, sources and
    /// visibility are kept.
    pub fn reset(&mut self) {
        self.angle_degrees = 0.0;
        self.scale_factor = 1.0;
        self.scale_log = 0.0;
        self.offset = DEFAULT_OFFSET;
        self.rotation_pivot = None;
        self.flipped_horizontally = false;
        self.flipped_vertically = false;
        self.opacity = MAX_OPACITY;
    }

    /// [`reset`](Self::reset), then centre the image on `center`.
    pub fn reset_centered(&mut self, center: (f64, f64)) {
        self.reset();
        self.offset = center;
    }

    // ---------------------------------------------------------------------
    //  Geometry
    // ---------------------------------------------------------------------

    /// On-screen size after scaling, before rotation.
    pub fn scaled_dimensions(&self) -> (u32, u32) {
        scaled_dimensions(self.source_pixels.dimensions(), self.scale_factor)
    }

    /// Axis-aligned, pre-rotation bounds in display coordinates:
    /// `(min_x, min_y, max_x, max_y)`.
    pub fn display_bounds(&self) -> (f64, f64, f64, f64) {
        let (w, h) = self.scaled_dimensions();
        let (hw, hh) = (w as f64 / 2.0, h as f64 / 2.0);
        (
            self.offset.0 - hw,
            self.offset.1 - hh,
            self.offset.0 + hw,
            self.offset.1 + hh,
        )
    }

    /// Hit test against [`display_bounds`](Self::display_bounds). Rotation is
    /// ignored.
    pub fn contains_point(&self, point: (f64, f64)) -> bool {
        let (x0, y0, x1, y1) = self.display_bounds();
        (x0..=x1).contains(&point.0) && (y0..=y1).contains(&point.1)
    }
}

/// `round(dim * scale)` per axis, never below one pixel.
pub fn scaled_dimensions((w, h): (u32, u32), scale: f64) -> (u32, u32) {
    let sw = (w as f64 * scale).round().max(1.0) as u32;
    let sh = (h as f64 * scale).round().max(1.0) as u32;
    (sw, sh)
}

/// Map any angle into `[0, 360)`.
pub fn normalize_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return 0.0;
    }
    let a = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if a >= 360.0 { 0.0 } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use proptest::prelude::*;

    fn blank(w: u32, h: u32) -> ImageTransform {
        ImageTransform::new("A", RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])), None)
    }

    #[test]
    fn new_image_has_import_defaults() {
        let t = blank(10, 10);
        assert_eq!(t.angle_degrees(), 0.0);
        assert_eq!(t.scale_factor(), 1.0);
        assert_eq!(t.offset, (512.0, 512.0));
        assert_eq!(t.opacity(), 0.2);
        assert!(t.visible);
        assert!(!t.is_vector());
    }

    #[test]
    fn four_log_zoom_steps_accumulate() {
        let mut t = blank(10, 10);
        for _ in 0..4 {
            t.set_zoom(0.05);
        }
        assert!((t.scale_log() - 0.2).abs() < 1e-12);
        assert!((t.scale_factor() - 2f64.powf(0.2)).abs() < 1e-12);
        assert!((t.scale_factor() - 1.1487).abs() < 1e-4);
    }

    #[test]
    fn rotation_wraps_past_full_turn() {
        let mut t = blank(10, 10);
        t.set_rotation(350.0);
        t.set_rotation(20.0);
        assert!((t.angle_degrees() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn negative_rotation_stays_in_range() {
        let mut t = blank(10, 10);
        t.set_rotation(-0.5);
        assert!((t.angle_degrees() - 359.5).abs() < 1e-9);
    }

    #[test]
    fn zoom_clamps_and_log_follows() {
        let mut t = blank(10, 10);
        t.set_zoom(100.0);
        assert_eq!(t.scale_factor(), MAX_SCALE);
        assert!((t.scale_log() - MAX_SCALE.log2()).abs() < 1e-12);
        // Coming back down starts from the clamped value, not the overshoot
        t.set_zoom(-0.05);
        assert!(t.scale_factor() < MAX_SCALE);
    }

    #[test]
    fn linear_adjust_keeps_log_consistent() {
        let mut t = blank(10, 10);
        t.adjust_scale(0.05);
        assert!((t.scale_factor() - 1.05).abs() < 1e-12);
        assert!((2f64.powf(t.scale_log()) - t.scale_factor()).abs() < 1e-12);
        t.adjust_scale(-50.0);
        assert_eq!(t.scale_factor(), MIN_SCALE);
    }

    #[test]
    fn opacity_toggle_alternates_levels() {
        let mut t = blank(10, 10);
        assert_eq!(t.toggle_opacity(), OpacityLevel::Max);
        assert_eq!(t.opacity(), 1.0);
        assert_eq!(t.toggle_opacity(), OpacityLevel::Min);
        assert_eq!(t.opacity(), 0.2);
    }

    #[test]
    fn reset_restores_defaults_but_keeps_identity() {
        let mut t = blank(10, 10);
        t.set_rotation(33.0);
        t.set_zoom(0.7);
        t.translate(5.0, -7.0);
        t.toggle_flip(FlipAxis::Horizontal);
        t.toggle_flip(FlipAxis::Vertical);
        t.set_pivot(Some((1.0, 2.0)));
        t.reset();
        assert_eq!(t.identity, "A");
        assert_eq!(t.angle_degrees(), 0.0);
        assert_eq!(t.scale_factor(), 1.0);
        assert_eq!(t.scale_log(), 0.0);
        assert!(!t.flipped_horizontally && !t.flipped_vertically);
        assert_eq!(t.opacity(), 1.0);
        assert_eq!(t.rotation_pivot, None);
        assert_eq!(t.source_pixels().dimensions(), (10, 10));
    }

    #[test]
    fn reset_centered_moves_to_center() {
        let mut t = blank(10, 10);
        t.reset_centered((960.0, 540.0));
        assert_eq!(t.offset, (960.0, 540.0));
    }

    #[test]
    fn bounds_follow_scale_not_rotation() {
        let mut t = blank(100, 50);
        t.offset = (200.0, 200.0);
        t.set_rotation(45.0);
        assert!(t.contains_point((150.0, 175.0)));
        assert!(!t.contains_point((149.0, 200.0)));
        t.adjust_scale(1.0);
        assert_eq!(t.scaled_dimensions(), (200, 100));
        assert!(t.contains_point((101.0, 200.0)));
    }

    proptest! {
        #[test]
        fn zoom_sequence_keeps_scale_and_log_in_step(
            steps in proptest::collection::vec(-3.0f64..3.0, 1..64)
        ) {
            let mut t = blank(4, 4);
            for step in steps {
                t.set_zoom(step);
                prop_assert!(t.scale_factor() >= MIN_SCALE && t.scale_factor() <= MAX_SCALE);
                prop_assert!((2f64.powf(t.scale_log()) - t.scale_factor()).abs() < 1e-9);
            }
        }

        #[test]
        fn rotation_always_normalized(start in -1.0e6f64..1.0e6, delta in -1.0e6f64..1.0e6) {
            let mut t = blank(4, 4);
            t.set_rotation(start);
            t.set_rotation(delta);
            prop_assert!(t.angle_degrees() >= 0.0 && t.angle_degrees() < 360.0);
        }
    }
}
