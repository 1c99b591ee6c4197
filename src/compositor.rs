// ============================================================================
// COMPOSITOR — turn transform state into pixels (raster) or markup (vector)
// ============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use image::RgbaImage;
use tracing::trace;

use crate::error::{OverlayError, Result};
use crate::image_state::ImageTransform;
use crate::ops::svg;
use crate::ops::transform::{self, Interpolation};
use crate::registry::ImageRegistry;

/// Render `t` to a raster with the default (Lanczos3) resize filter.
///
/// The output carries its own size; callers centre it on `t.offset`.
pub fn render_raster(t: &ImageTransform) -> RgbaImage {
    render_raster_with(t, Interpolation::default())
}

/// Fade, resize, flip (horizontal then vertical), then rotate with canvas
/// expansion about the pivot or the image centre.
pub fn render_raster_with(t: &ImageTransform, interp: Interpolation) -> RgbaImage {
    let mut img = t.source_pixels().clone();
    transform::apply_opacity(&mut img, t.opacity());

    let (w, h) = t.scaled_dimensions();
    let mut img = transform::resize_to(img, w, h, interp);
    transform::apply_flips(&mut img, t.flipped_horizontally, t.flipped_vertically);

    transform::rotate_expand(&img, t.angle_degrees(), pivot_in_frame(t))
}

/// Pivot translated from display space into the resized image's own frame.
fn pivot_in_frame(t: &ImageTransform) -> Option<(f64, f64)> {
    let (px, py) = t.rotation_pivot?;
    let (w, h) = t.scaled_dimensions();
    let origin_x = t.offset.0 - w as f64 / 2.0;
    let origin_y = t.offset.1 - h as f64 / 2.0;
    Some((px - origin_x, py - origin_y))
}

/// The original SVG with every child wrapped in a `<g>` carrying the
/// transform (and opacity below 1).
pub fn render_vector_document(t: &ImageTransform) -> Result<String> {
    let markup = t.source_vector_markup().ok_or_else(|| {
        OverlayError::Document(format!("'{}' has no vector source", t.identity))
    })?;
    svg::wrap_in_group(markup, &svg::transform_attribute(t), t.opacity())
}

// ---------------------------------------------------------------------------
//  Frame composition
// ---------------------------------------------------------------------------

/// One visible image, rendered and placed.
#[derive(Clone, Debug)]
pub struct RenderedImage {
    pub identity: String,
    pub pixels: Arc<RgbaImage>,
    /// Display point the render is centred on.
    pub center: (f64, f64),
    /// Where to draw the pivot marker, if a pivot is set.
    pub pivot_marker: Option<(f64, f64)>,
    /// False when `pixels` came out of the cache.
    pub fresh: bool,
}

impl RenderedImage {
    /// Top-left corner in display coordinates.
    pub fn top_left(&self) -> (f64, f64) {
        (
            self.center.0 - self.pixels.width() as f64 / 2.0,
            self.center.1 - self.pixels.height() as f64 / 2.0,
        )
    }
}

/// Render every visible image in drawing order, without caching.
pub fn compose_frame(registry: &ImageRegistry) -> Vec<RenderedImage> {
    registry
        .iter()
        .filter(|t| t.visible)
        .map(|t| RenderedImage {
            identity: t.identity.clone(),
            pixels: Arc::new(render_raster(t)),
            center: t.offset,
            pivot_marker: t.rotation_pivot,
            fresh: true,
        })
        .collect()
}

/// The fields that change the rendered pixels. Position is excluded since a
/// move only changes placement.
#[derive(Clone, Debug, PartialEq)]
struct VisualKey {
    angle: f64,
    scale: f64,
    flips: (bool, bool),
    opacity: f32,
    pivot_in_frame: Option<(f64, f64)>,
}

impl VisualKey {
    fn of(t: &ImageTransform) -> Self {
        Self {
            angle: t.angle_degrees(),
            scale: t.scale_factor(),
            flips: (t.flipped_horizontally, t.flipped_vertically),
            opacity: t.opacity(),
            pivot_in_frame: pivot_in_frame(t),
        }
    }
}

/// Per-identity render cache: re-renders only when an image's visual
/// fields changed since the last frame.
#[derive(Default)]
pub struct RenderCache {
    entries: HashMap<String, (VisualKey, Arc<RgbaImage>)>,
    interpolation: Interpolation,
}

impl RenderCache {
    pub fn new(interpolation: Interpolation) -> Self {
        Self {
            entries: HashMap::new(),
            interpolation,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached or fresh render of `t`. The flag is true when it was rendered
    /// on this call.
    pub fn render(&mut self, t: &ImageTransform) -> (Arc<RgbaImage>, bool) {
        let key = VisualKey::of(t);
        if let Some((cached_key, pixels)) = self.entries.get(&t.identity)
            && *cached_key == key
        {
            return (Arc::clone(pixels), false);
        }
        trace!(image = %t.identity, "re-rendering overlay");
        let pixels = Arc::new(render_raster_with(t, self.interpolation));
        self.entries
            .insert(t.identity.clone(), (key, Arc::clone(&pixels)));
        (pixels, true)
    }

    /// [`compose_frame`] through the cache.
    pub fn compose(&mut self, registry: &ImageRegistry) -> Vec<RenderedImage> {
        registry
            .iter()
            .filter(|t| t.visible)
            .map(|t| {
                let (pixels, fresh) = self.render(t);
                RenderedImage {
                    identity: t.identity.clone(),
                    pixels,
                    center: t.offset,
                    pivot_marker: t.rotation_pivot,
                    fresh,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_state::FlipAxis;
    use crate::registry::NamePolicy;
    use image::Rgba;

    fn opaque(name: &str, w: u32, h: u32) -> ImageTransform {
        ImageTransform::new(name, RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 255])), None)
    }

    #[test]
    fn new_image_renders_faint_at_source_size() {
        let t = opaque("a", 8, 6);
        let out = render_raster(&t);
        assert_eq!(out.dimensions(), (8, 6));
        assert_eq!(out.get_pixel(3, 3)[3], 51);
    }

    #[test]
    fn scale_then_quarter_turn() {
        let mut t = opaque("a", 10, 20);
        t.set_opacity_level(crate::image_state::OpacityLevel::Max);
        t.adjust_scale(1.0);
        t.set_rotation(90.0);
        let out = render_raster(&t);
        assert_eq!(out.dimensions(), (40, 20));
        assert_eq!(out.get_pixel(20, 10)[3], 255);
    }

    #[test]
    fn flip_happens_before_rotation() {
        let mut src = RgbaImage::new(4, 2);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        let mut t = ImageTransform::new("f", src, None);
        t.set_opacity_level(crate::image_state::OpacityLevel::Max);
        t.toggle_flip(FlipAxis::Horizontal);
        let out = render_raster(&t);
        assert_eq!(out.get_pixel(3, 0)[0], 255);
    }

    #[test]
    fn pivot_is_mapped_into_image_frame() {
        let mut t = opaque("a", 100, 50);
        t.offset = (300.0, 300.0);
        t.set_pivot(Some((260.0, 280.0)));
        assert_eq!(pivot_in_frame(&t), Some((10.0, 5.0)));
    }

    #[test]
    fn render_is_deterministic() {
        let mut t = opaque("a", 31, 17);
        t.set_rotation(12.5);
        t.set_zoom(0.35);
        t.set_pivot(Some((500.0, 505.0)));
        assert_eq!(render_raster(&t), render_raster(&t));
    }

    #[test]
    fn raster_only_image_has_no_vector_document() {
        let t = opaque("a", 2, 2);
        assert!(matches!(render_vector_document(&t), Err(OverlayError::Document(_))));
    }

    #[test]
    fn compose_skips_hidden_images_and_keeps_order() {
        let mut reg = ImageRegistry::new();
        reg.add(opaque("first", 2, 2), NamePolicy::Reject).unwrap();
        reg.add(opaque("hidden", 2, 2), NamePolicy::Reject).unwrap();
        reg.add(opaque("last", 2, 2), NamePolicy::Reject).unwrap();
        reg.toggle_visibility("hidden").unwrap();
        let frame = compose_frame(&reg);
        let names: Vec<_> = frame.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(names, ["first", "last"]);
        assert_eq!(frame[0].top_left(), (511.0, 511.0));
    }

    #[test]
    fn cache_reuses_until_visual_change() {
        let mut reg = ImageRegistry::new();
        reg.add(opaque("a", 4, 4), NamePolicy::Reject).unwrap();
        let mut cache = RenderCache::new(Interpolation::Lanczos3);

        assert!(cache.compose(&reg)[0].fresh);
        assert!(!cache.compose(&reg)[0].fresh);

        reg.get_mut("a").unwrap().translate(5.0, 5.0);
        let moved = cache.compose(&reg);
        assert!(!moved[0].fresh);
        assert_eq!(moved[0].center, (517.0, 517.0));

        reg.get_mut("a").unwrap().set_rotation(1.0);
        assert!(cache.compose(&reg)[0].fresh);
        assert_eq!(cache.len(), 1);
    }
}
