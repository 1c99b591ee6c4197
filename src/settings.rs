// ============================================================================
// SETTINGS — `key=value` lines in the per-user config directory
// ============================================================================

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::coords::MAESTRO_VERSIONS;
use crate::input::KeyBindings;
use crate::io;
use crate::ops::transform::Interpolation;

const SETTINGS_FILE: &str = "orthy_settings.cfg";

#[derive(Clone, Debug, PartialEq)]
pub struct OverlaySettings {
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    pub log_level: String,
    /// Control panel width in points.
    pub panel_width: f32,
    /// Distance of the control panel from the right screen edge.
    pub panel_margin_right: f32,
    pub panel_margin_top: f32,
    /// Overlay window size; `None` covers the whole screen.
    pub overlay_size: Option<(u32, u32)>,
    /// Preselected in the Maestro setup dialog.
    pub default_maestro_version: u8,
    /// Replaces the executable's folder as the root of `Images/` and the
    /// coordinate files.
    pub base_dir: Option<PathBuf>,
    pub interpolation: Interpolation,
    pub keybindings: KeyBindings,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            panel_width: 130.0,
            panel_margin_right: 60.0,
            panel_margin_top: 150.0,
            overlay_size: None,
            default_maestro_version: 6,
            base_dir: None,
            interpolation: Interpolation::default(),
            keybindings: KeyBindings::default(),
        }
    }
}

impl OverlaySettings {
    /// `orthy_settings.cfg` beside the executable when present, so a portable
    /// install next to its `Images/` folder keeps its own settings. Otherwise
    /// the per-user config dir.
    pub(crate) fn settings_path() -> Option<PathBuf> {
        let portable = io::base_dir(None).join(SETTINGS_FILE);
        if portable.is_file() {
            return Some(portable);
        }
        user_config_dir().map(|dir| dir.join(SETTINGS_FILE))
    }

    /// Settings from the default location, or defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else { return Self::default() };
        Self::load_from(&path)
    }

    /// A missing or unreadable file gives defaults; bad lines are skipped.
    pub fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else { return Self::default() };
        Self::from_config_str(&content)
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Some(dir) = path.parent()
            && let Err(e) = std::fs::create_dir_all(dir)
        {
            warn!(dir = %dir.display(), error = %e, "could not create settings directory");
            return;
        }
        self.save_to(&path);
    }

    pub fn save_to(&self, path: &Path) {
        match std::fs::write(path, self.to_config_string()) {
            Ok(()) => info!(path = %path.display(), "settings saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not save settings"),
        }
    }

    pub fn to_config_string(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("log_level={}\n", self.log_level));
        out.push_str(&format!("panel_width={}\n", self.panel_width));
        out.push_str(&format!("panel_margin_right={}\n", self.panel_margin_right));
        out.push_str(&format!("panel_margin_top={}\n", self.panel_margin_top));
        let size = match self.overlay_size {
            Some((w, h)) => format!("{w}x{h}"),
            None => "fullscreen".to_string(),
        };
        out.push_str(&format!("overlay_size={size}\n"));
        out.push_str(&format!("default_maestro_version={}\n", self.default_maestro_version));
        if let Some(dir) = &self.base_dir {
            out.push_str(&format!("base_dir={}\n", dir.display()));
        }
        out.push_str(&format!("interpolation={}\n", self.interpolation.label()));
        for line in self.keybindings.to_config_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    pub fn from_config_str(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "log_level" if !val.is_empty() => s.log_level = val.to_string(),
                "panel_width" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.panel_width = v.clamp(80.0, 400.0);
                    }
                }
                "panel_margin_right" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.panel_margin_right = v.max(0.0);
                    }
                }
                "panel_margin_top" => {
                    if let Ok(v) = val.parse::<f32>() {
                        s.panel_margin_top = v.max(0.0);
                    }
                }
                "overlay_size" => s.overlay_size = parse_size(val),
                "default_maestro_version" => {
                    if let Ok(v) = val.parse::<u8>()
                        && MAESTRO_VERSIONS.contains(&v)
                    {
                        s.default_maestro_version = v;
                    }
                }
                "base_dir" if !val.is_empty() => s.base_dir = Some(PathBuf::from(val)),
                "interpolation" => {
                    if let Some(i) = Interpolation::from_label(val) {
                        s.interpolation = i;
                    }
                }
                _ => {
                    if let Some(action) = key.strip_prefix("keybind.") {
                        s.keybindings.load_config_line(action, val);
                    }
                }
            }
        }
        s
    }
}

/// `WIDTHxHEIGHT`; anything else means full screen.
fn parse_size(val: &str) -> Option<(u32, u32)> {
    let (w, h) = val.split_once('x')?;
    let w = w.trim().parse::<u32>().ok().filter(|w| *w > 0)?;
    let h = h.trim().parse::<u32>().ok().filter(|h| *h > 0)?;
    Some((w, h))
}

/// `%APPDATA%\Orthy`, `~/Library/Application Support/Orthy` or
/// `$XDG_CONFIG_HOME/orthy`.
fn user_config_dir() -> Option<PathBuf> {
    let var = |name: &str| std::env::var_os(name).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        var("APPDATA").or_else(|| var("USERPROFILE")).map(|d| d.join("Orthy"))
    } else if cfg!(target_os = "macos") {
        var("HOME").map(|h| h.join("Library").join("Application Support").join("Orthy"))
    } else {
        var("XDG_CONFIG_HOME")
            .or_else(|| var("HOME").map(|h| h.join(".config")))
            .map(|d| d.join("orthy"))
    }
}
