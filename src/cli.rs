// ============================================================================
// Orthy CLI — headless transform/export and coordinate-file checks
// ============================================================================
//
// Usage examples:
//   orthy --input arch.svg --rotate 12.5 --zoom 0.2 --output arch_rotated.svg
//   orthy -i photo.jpg --flip-h --opaque --output-dir out/
//   orthy --check-coords coords_maestro_6.txt
//
// No GUI is opened in CLI mode. Every input goes through the same
// ImageTransform + compositor path as the overlay; the export format follows
// the input (SVG stays SVG, rasters become PNG).

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;
use tracing::debug;

use crate::coords::{CoordinateBindings, CONTROL_ORDER};
use crate::error::Result;
use crate::image_state::{FlipAxis, OpacityLevel};
use crate::io::{self, ExportKind};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Orthy headless overlay processor.
///
/// Apply overlay transforms to image files and export them without opening
/// the GUI.
#[derive(Parser, Debug)]
#[command(
    name = "orthy",
    about = "Orthy headless overlay export",
    long_about = "Rotate, scale, flip and fade arch templates or photos exactly as the\n\
                  overlay would, and export the result. SVG inputs are exported as\n\
                  transformed SVG, everything else as PNG.\n\n\
                  Example:\n  \
                  orthy --input Ovoide.svg --rotate 15 --output ovoide_15.svg\n  \
                  orthy --check-coords coords_maestro_6.txt"
)]
pub struct CliArgs {
    /// Input image file(s): PNG, JPEG, BMP or SVG.
    #[arg(short, long, num_args = 1.., required_unless_present = "check_coords")]
    pub input: Vec<PathBuf>,

    /// Output file path. Only valid for single-file input. The extension is
    /// replaced to match the export format.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for several inputs.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Rotation in degrees, clockwise.
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true, value_name = "DEG")]
    pub rotate: f64,

    /// Zoom in log2 steps (0.05 per wheel notch in the overlay).
    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true, value_name = "LOG2")]
    pub zoom: f64,

    /// Image centre in display coordinates.
    #[arg(long, value_parser = parse_point, value_name = "X,Y")]
    pub offset: Option<(f64, f64)>,

    /// Rotation pivot in display coordinates (default: image centre).
    #[arg(long, value_parser = parse_point, value_name = "X,Y")]
    pub pivot: Option<(f64, f64)>,

    #[arg(long)]
    pub flip_h: bool,

    #[arg(long)]
    pub flip_v: bool,

    /// Export at full opacity instead of the 20 % tracing level.
    #[arg(long)]
    pub opaque: bool,

    /// Validate a Maestro coordinates file and print its bindings.
    #[arg(long, value_name = "FILE")]
    pub check_coords: Option<PathBuf>,

    /// Print per-file timing information.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a == "--check-coords")
    }
}

/// `X,Y` as two floats.
fn parse_point(s: &str) -> std::result::Result<(f64, f64), String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y, got '{s}'"))?;
    let x = x.trim().parse::<f64>().map_err(|e| format!("bad X '{x}': {e}"))?;
    let y = y.trim().parse::<f64>().map_err(|e| format!("bad Y '{y}': {e}"))?;
    Ok((x, y))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = everything succeeded, `1` = one or more steps failed.
pub fn run(args: CliArgs) -> ExitCode {
    if let Some(path) = &args.check_coords {
        if !check_coords(path) {
            return ExitCode::FAILURE;
        }
        if args.input.is_empty() {
            return ExitCode::SUCCESS;
        }
    }

    if args.input.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory.",
            args.input.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = args.input.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in args.input.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
            any_failure = true;
            continue;
        };

        match run_one(input_path, &output_path, &args) {
            Ok((kind, written)) => {
                if args.verbose || multi {
                    println!(
                        "  → {} [{}] ({:.0}ms)",
                        written.display(),
                        kind.extension(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file pipeline
// ============================================================================

fn run_one(input: &Path, output: &Path, args: &CliArgs) -> Result<(ExportKind, PathBuf)> {
    let asset = io::load_asset(input)?;
    let name = asset.name.clone();
    let mut t = asset.into_transform(name);

    if let Some(offset) = args.offset {
        t.offset = offset;
    }
    t.set_zoom(args.zoom);
    t.set_rotation(args.rotate);
    t.set_pivot(args.pivot);
    if args.flip_h {
        t.toggle_flip(FlipAxis::Horizontal);
    }
    if args.flip_v {
        t.toggle_flip(FlipAxis::Vertical);
    }
    if args.opaque {
        t.set_opacity_level(OpacityLevel::Max);
    }
    debug!(
        image = %t.identity,
        angle = t.angle_degrees(),
        scale = t.scale_factor(),
        "transform applied"
    );

    io::export_image(&t, output)
}

fn check_coords(path: &Path) -> bool {
    match CoordinateBindings::load_file(path) {
        Ok(bindings) => {
            for (control, (x, y)) in bindings.iter() {
                println!("{control}: {x},{y}");
            }
            let missing = bindings.missing_controls();
            if !missing.is_empty() {
                println!("missing ({}/{}): {}", missing.len(), CONTROL_ORDER.len(), missing.join(", "));
            }
            true
        }
        Err(e) => {
            eprintln!("error: {}", e);
            false
        }
    }
}

/// Compute the output path for a single input file. The extension is fixed
/// up later by the exporter.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` + input stem
/// 3. next to the input, stem + `_overlay`
///
/// Derived names carry a `.png` extension, which the exporter swaps for
/// `.svg` on vector input. Dots inside the stem survive.
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }
    let stem = input.file_stem()?.to_string_lossy().into_owned();
    let ext = ExportKind::Png.extension();
    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{stem}.{ext}")));
    }
    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{stem}_overlay.{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_parse_with_spaces_and_signs() {
        assert_eq!(parse_point("10, -2.5"), Ok((10.0, -2.5)));
        assert!(parse_point("10").is_err());
        assert!(parse_point("a,1").is_err());
    }

    #[test]
    fn output_path_priority() {
        let input = Path::new("dir/arch.svg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("o"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(build_output_path(input, None, Some(Path::new("o"))), Some(PathBuf::from("o/arch.png")));
        assert_eq!(build_output_path(input, None, None), Some(PathBuf::from("dir/arch_overlay.png")));
    }

    #[test]
    fn dotted_stems_keep_distinct_outputs() {
        let dir = Some(Path::new("o"));
        let first = build_output_path(Path::new("scan.v1.png"), None, dir).unwrap();
        let second = build_output_path(Path::new("scan.v2.png"), None, dir).unwrap();
        assert_ne!(first, second);
        assert_eq!(first.with_extension(ExportKind::Svg.extension()), PathBuf::from("o/scan.v1.svg"));
        assert_eq!(
            build_output_path(Path::new("in/scan.v1.png"), None, None),
            Some(PathBuf::from("in/scan.v1_overlay.png"))
        );
    }

    #[test]
    fn dotted_stems_export_to_separate_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("o");
        let mut inputs = Vec::new();
        for name in ["scan.v1.png", "scan.v2.png"] {
            let path = dir.path().join(name);
            image::RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255])).save(&path).unwrap();
            inputs.push(path);
        }

        let args = CliArgs::try_parse_from([
            "orthy",
            "-i",
            inputs[0].to_str().unwrap(),
            "-i",
            inputs[1].to_str().unwrap(),
            "--output-dir",
            out.to_str().unwrap(),
        ])
        .unwrap();
        assert_eq!(run(args), ExitCode::SUCCESS);
        assert!(out.join("scan.v1.png").exists());
        assert!(out.join("scan.v2.png").exists());
    }

    #[test]
    fn input_is_required_without_check_coords() {
        assert!(CliArgs::try_parse_from(["orthy"]).is_err());
        assert!(CliArgs::try_parse_from(["orthy", "--check-coords", "c.txt"]).is_ok());
        let args = CliArgs::try_parse_from(["orthy", "-i", "a.png", "--rotate", "-30"]).unwrap();
        assert_eq!(args.rotate, -30.0);
    }

    #[test]
    fn raster_input_exports_transformed_png() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([9, 9, 9, 255])).save(&input).unwrap();

        let args = CliArgs::try_parse_from([
            "orthy",
            "-i",
            input.to_str().unwrap(),
            "--rotate",
            "90",
            "--opaque",
        ])
        .unwrap();
        assert_eq!(run(args), ExitCode::SUCCESS);

        let out = image::open(dir.path().join("photo_overlay.png")).unwrap().to_rgba8();
        assert_eq!(out.dimensions(), (2, 4));
        assert_eq!(out.get_pixel(1, 1)[3], 255);
    }

    #[test]
    fn missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let args = CliArgs::try_parse_from(["orthy", "-i", dir.path().join("no.png").to_str().unwrap()]).unwrap();
        assert_eq!(run(args), ExitCode::FAILURE);
    }
}
