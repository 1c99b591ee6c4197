// ============================================================================
// COORDINATE BINDINGS — recorded screen positions of Maestro controls
// ============================================================================
//
// File format, one binding per line:
//
//     DistalTip:100,200
//     MesialTip:250,350
//
// Blank lines are ignored. Anything else that does not parse fails the whole
// file; callers keep their previous bindings in that case.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{OverlayError, Result};

/// Controls in the order they are captured and written.
pub const CONTROL_ORDER: [&str; 10] = [
    "DistalTip",
    "MesialTip",
    "NegativeTorque",
    "PositiveTorque",
    "MesialRotation",
    "DistalRotation",
    "Intrusion",
    "Extrusion",
    "DistalLinear",
    "MesialLinear",
];

/// Maestro releases with a known control layout.
pub const MAESTRO_VERSIONS: [u8; 2] = [4, 6];

/// `coords_maestro_<version>.txt`
pub fn coords_file_name(version: u8) -> String {
    format!("coords_maestro_{version}.txt")
}

pub fn coords_file_path(base: &Path, version: u8) -> PathBuf {
    base.join(coords_file_name(version))
}

/// Control name → screen position, in insertion order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoordinateBindings {
    entries: Vec<(String, (i32, i32))>,
}

impl CoordinateBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, control: &str) -> Option<(i32, i32)> {
        self.entries
            .iter()
            .find(|(name, _)| name == control)
            .map(|(_, pos)| *pos)
    }

    /// Insert or overwrite. A new control goes to the end.
    pub fn set(&mut self, control: impl Into<String>, position: (i32, i32)) {
        let control = control.into();
        match self.entries.iter_mut().find(|(name, _)| *name == control) {
            Some(entry) => entry.1 = position,
            None => self.entries.push((control, position)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, (i32, i32))> {
        self.entries.iter().map(|(name, pos)| (name.as_str(), *pos))
    }

    /// Controls from [`CONTROL_ORDER`] with no recorded position.
    pub fn missing_controls(&self) -> Vec<&'static str> {
        CONTROL_ORDER
            .iter()
            .copied()
            .filter(|c| self.get(c).is_none())
            .collect()
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut bindings = Self::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let (control, position) = parse_line(line)
                .ok_or_else(|| OverlayError::CoordinateFile(format!("line {}: malformed entry '{line}'", idx + 1)))?;
            bindings.set(control, position);
        }
        Ok(bindings)
    }

    /// `Name:X,Y\n` per binding, in insertion order.
    pub fn serialize(&self) -> String {
        self.entries
            .iter()
            .map(|(name, (x, y))| format!("{name}:{x},{y}\n"))
            .collect()
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| OverlayError::CoordinateFile(format!("{}: {e}", path.display())))?;
        let bindings = Self::parse(&text)?;
        info!(path = %path.display(), count = bindings.len(), "coordinates loaded");
        Ok(bindings)
    }

    pub fn save_file(&self, path: &Path) -> Result<()> {
        fs::write(path, self.serialize())
            .map_err(|e| OverlayError::CoordinateFile(format!("{}: {e}", path.display())))?;
        info!(path = %path.display(), count = self.len(), "coordinates saved");
        Ok(())
    }
}

fn parse_line(line: &str) -> Option<(&str, (i32, i32))> {
    let (control, pos) = line.split_once(':')?;
    let (x, y) = pos.split_once(',')?;
    let control = control.trim();
    if control.is_empty() {
        return None;
    }
    Some((control, (x.trim().parse().ok()?, y.trim().parse().ok()?)))
}
