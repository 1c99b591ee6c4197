// ============================================================================
// ASSET I/O — import raster/SVG images, export overlays, resolve directories
// ============================================================================

use std::fs;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use resvg::{tiny_skia, usvg};
use rfd::FileDialog;
use tracing::{info, warn};

use crate::compositor;
use crate::error::{OverlayError, Result};
use crate::image_state::ImageTransform;
use crate::registry::{PredefinedTemplate, TEMPLATE_CENTER_OFFSET};

/// Extensions accepted by the import dialog.
pub const IMPORT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "svg"];

/// A decoded image file, ready to become an [`ImageTransform`].
#[derive(Debug)]
pub struct LoadedAsset {
    /// File stem, used as the default identity.
    pub name: String,
    pub pixels: RgbaImage,
    /// Original text for SVG inputs.
    pub vector_markup: Option<String>,
}

impl LoadedAsset {
    pub fn into_transform(self, identity: impl Into<String>) -> ImageTransform {
        ImageTransform::new(identity, self.pixels, self.vector_markup)
    }
}

fn is_svg(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"))
}

/// Load a PNG/JPEG/BMP or SVG file. SVGs are rasterized at their intrinsic
/// size and the markup is kept for export.
pub fn load_asset(path: &Path) -> Result<LoadedAsset> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Image")
        .to_string();

    let (pixels, vector_markup) = if is_svg(path) {
        let markup = fs::read_to_string(path).map_err(|e| OverlayError::load(path, e))?;
        let pixels = rasterize_svg(&markup).map_err(|e| OverlayError::load(path, e))?;
        (pixels, Some(markup))
    } else {
        let img = image::open(path).map_err(|e| OverlayError::load(path, e))?;
        (img.to_rgba8(), None)
    };

    info!(path = %path.display(), w = pixels.width(), h = pixels.height(), vector = vector_markup.is_some(), "asset loaded");
    Ok(LoadedAsset { name, pixels, vector_markup })
}

/// Render SVG text to straight-alpha RGBA at the document's own size.
pub fn rasterize_svg(markup: &str) -> Result<RgbaImage> {
    let tree = usvg::Tree::from_str(markup, &usvg::Options::default())
        .map_err(|e| OverlayError::Document(e.to_string()))?;

    let size = tree.size();
    let w = size.width().ceil().max(1.0) as u32;
    let h = size.height().ceil().max(1.0) as u32;
    let mut pixmap = tiny_skia::Pixmap::new(w, h)
        .ok_or_else(|| OverlayError::Document(format!("cannot allocate {w}x{h} canvas")))?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    // tiny-skia stores premultiplied colour
    let mut out = RgbaImage::new(w, h);
    for (dst, src) in out.pixels_mut().zip(pixmap.pixels()) {
        let c = src.demultiply();
        dst.0 = [c.red(), c.green(), c.blue(), c.alpha()];
    }
    Ok(out)
}

/// Load a bundled template and centre it at `overlay_center` shifted by
/// [`TEMPLATE_CENTER_OFFSET`].
pub fn load_template(
    base: &Path,
    template: &PredefinedTemplate,
    overlay_center: (f64, f64),
) -> Result<ImageTransform> {
    let path = template_path(base, template);
    let mut t = load_asset(&path)?.into_transform(template.key);
    t.offset = (
        overlay_center.0 + TEMPLATE_CENTER_OFFSET.0,
        overlay_center.1 + TEMPLATE_CENTER_OFFSET.1,
    );
    Ok(t)
}

// ---------------------------------------------------------------------------
//  Export
// ---------------------------------------------------------------------------

/// What [`export_image`] wrote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportKind {
    Svg,
    Png,
}

impl ExportKind {
    pub fn for_transform(t: &ImageTransform) -> Self {
        if t.is_vector() { ExportKind::Svg } else { ExportKind::Png }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Svg => "svg",
            ExportKind::Png => "png",
        }
    }
}

/// Export `t` with its current transform: transformed SVG text for vector
/// images, the rendered raster as PNG otherwise. The extension of `path` is
/// replaced to match; the final path is returned.
pub fn export_image(t: &ImageTransform, path: &Path) -> Result<(ExportKind, PathBuf)> {
    let kind = ExportKind::for_transform(t);
    let target = path.with_extension(kind.extension());

    match kind {
        ExportKind::Svg => {
            let doc = compositor::render_vector_document(t)?;
            fs::write(&target, doc).map_err(|e| OverlayError::export(&target, e))?;
        }
        ExportKind::Png => {
            let img = compositor::render_raster(t);
            img.save_with_format(&target, image::ImageFormat::Png)
                .map_err(|e| OverlayError::export(&target, e))?;
        }
    }
    info!(image = %t.identity, path = %target.display(), ?kind, "image exported");
    Ok((kind, target))
}

// ---------------------------------------------------------------------------
//  Directories
// ---------------------------------------------------------------------------

/// Install directory: `override_dir` if given, else the executable's folder,
/// else the working directory.
pub fn base_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn images_dir(base: &Path) -> PathBuf {
    base.join("Images")
}

/// Default folder for user images; created on demand.
pub fn arch_saves_dir(base: &Path) -> PathBuf {
    let dir = images_dir(base).join("ArchSaves");
    if let Err(e) = fs::create_dir_all(&dir) {
        warn!(dir = %dir.display(), error = %e, "could not create image folder");
    }
    dir
}

pub fn template_path(base: &Path, template: &PredefinedTemplate) -> PathBuf {
    images_dir(base).join(template.file)
}

// ---------------------------------------------------------------------------
//  Native dialogs
// ---------------------------------------------------------------------------

pub fn pick_image_file(start_dir: &Path) -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Select Image")
        .set_directory(start_dir)
        .add_filter("Image Files", IMPORT_EXTENSIONS)
        .pick_file()
}

pub fn pick_export_path(start_dir: &Path, t: &ImageTransform) -> Option<PathBuf> {
    let kind = ExportKind::for_transform(t);
    let (label, ext) = match kind {
        ExportKind::Svg => ("SVG Image", kind.extension()),
        ExportKind::Png => ("PNG Image", kind.extension()),
    };
    FileDialog::new()
        .set_title("Save Image")
        .set_directory(start_dir)
        .set_file_name(format!("{}.{ext}", t.identity))
        .add_filter(label, &[ext])
        .save_file()
}

pub fn pick_coordinates_file(start_dir: &Path) -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Select Coordinates File")
        .set_directory(start_dir)
        .add_filter("Text Files", &["txt"])
        .pick_file()
}

pub fn pick_coordinates_save_path(start_dir: &Path, default_name: &str) -> Option<PathBuf> {
    FileDialog::new()
        .set_title("Save Coordinates")
        .set_directory(start_dir)
        .set_file_name(default_name)
        .add_filter("Text Files", &["txt"])
        .save_file()
}
