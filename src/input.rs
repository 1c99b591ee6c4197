// ============================================================================
// INPUT ROUTER — pointer, wheel and key events to transform mutations
// ============================================================================
//
// The router owns no image state. Every handler takes the registry, mutates
// the active image (if any) and reports what the caller has to do next.
// Events come either from the overlay window (egui) or from the global hook
// adapters, both translated into the platform-neutral types below.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::image_state::FlipAxis;
use crate::registry::ImageRegistry;

/// Degrees of rotation per pixel of horizontal drag with Ctrl held.
pub const DRAG_ROTATION_PER_PIXEL: f64 = 0.1;
/// Log2 zoom per wheel detent.
pub const WHEEL_ZOOM_STEP: f64 = 0.05;
pub const MOVE_STEP: f64 = 3.0;
pub const FINE_MOVE_STEP: f64 = 1.0;
pub const ROTATE_STEP: f64 = 0.5;
pub const ZOOM_STEP: f64 = 0.05;
pub const FINE_ZOOM_STEP: f64 = 0.01;

// ═══════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════

/// A physical key, independent of the windowing backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    /// Letter key, stored lowercase.
    Char(char),
    /// Top-row digit.
    Digit(u8),
    /// Numeric keypad digit.
    Numpad(u8),
    Up,
    Down,
    Left,
    Right,
    Shift,
    Control,
    Alt,
    Escape,
    /// Anything else, by Win32 virtual-key code.
    Other(u32),
}

impl Key {
    pub fn letter(c: char) -> Self {
        Key::Char(c.to_ascii_lowercase())
    }

    pub fn is_modifier(self) -> bool {
        matches!(self, Key::Shift | Key::Control | Key::Alt)
    }

    /// Map a Win32 virtual-key code.
    pub fn from_vk(vk: u32) -> Self {
        match vk {
            0x41..=0x5A => Key::Char((b'a' + (vk - 0x41) as u8) as char),
            0x30..=0x39 => Key::Digit((vk - 0x30) as u8),
            0x60..=0x69 => Key::Numpad((vk - 0x60) as u8),
            0x25 => Key::Left,
            0x26 => Key::Up,
            0x27 => Key::Right,
            0x28 => Key::Down,
            0x10 | 0xA0 | 0xA1 => Key::Shift,
            0x11 | 0xA2 | 0xA3 => Key::Control,
            0x12 | 0xA4 | 0xA5 => Key::Alt,
            0x1B => Key::Escape,
            other => Key::Other(other),
        }
    }

    /// Win32 virtual-key code, used for injection.
    pub fn to_vk(self) -> u32 {
        match self {
            Key::Char(c) => 0x41 + (c.to_ascii_lowercase() as u32).saturating_sub('a' as u32),
            Key::Digit(d) => 0x30 + d as u32,
            Key::Numpad(d) => 0x60 + d as u32,
            Key::Left => 0x25,
            Key::Up => 0x26,
            Key::Right => 0x27,
            Key::Down => 0x28,
            Key::Shift => 0x10,
            Key::Control => 0x11,
            Key::Alt => 0x12,
            Key::Escape => 0x1B,
            Key::Other(vk) => vk,
        }
    }

    pub fn name(self) -> String {
        match self {
            Key::Char(c) => c.to_ascii_uppercase().to_string(),
            Key::Digit(d) => d.to_string(),
            Key::Numpad(d) => format!("Num{d}"),
            Key::Up => "Up".into(),
            Key::Down => "Down".into(),
            Key::Left => "Left".into(),
            Key::Right => "Right".into(),
            Key::Shift => "Shift".into(),
            Key::Control => "Ctrl".into(),
            Key::Alt => "Alt".into(),
            Key::Escape => "Esc".into(),
            Key::Other(vk) => format!("VK{vk}"),
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        let s = s.trim();
        match s {
            "Up" => return Some(Key::Up),
            "Down" => return Some(Key::Down),
            "Left" => return Some(Key::Left),
            "Right" => return Some(Key::Right),
            "Shift" => return Some(Key::Shift),
            "Ctrl" => return Some(Key::Control),
            "Alt" => return Some(Key::Alt),
            "Esc" => return Some(Key::Escape),
            _ => {}
        }
        if let Some(d) = s.strip_prefix("Num") {
            return d.parse::<u8>().ok().filter(|d| *d <= 9).map(Key::Numpad);
        }
        if let Some(vk) = s.strip_prefix("VK") {
            return vk.parse().ok().map(Key::Other);
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphabetic() => Some(Key::letter(c)),
            (Some(c), None) if c.is_ascii_digit() => Some(Key::Digit(c as u8 - b'0')),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, shift: false, alt: false };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub pressed: bool,
    pub modifiers: Modifiers,
}

impl KeyEvent {
    pub fn press(key: Key, modifiers: Modifiers) -> Self {
        Self { key, pressed: true, modifiers }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

/// Pointer events in overlay (display) coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { button: PointerButton, pos: (f64, f64) },
    Up { button: PointerButton, pos: (f64, f64) },
    Moved { pos: (f64, f64), modifiers: Modifiers },
}

/// Wheel movement in whatever unit the source reports.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WheelDelta {
    /// Already in notches.
    Detents(f64),
    /// Win32-style, 120 per notch.
    Raw120(f64),
    /// egui scroll points, 50 per notch.
    Points(f64),
}

impl WheelDelta {
    pub fn detents(self) -> f64 {
        match self {
            WheelDelta::Detents(d) => d,
            WheelDelta::Raw120(d) => d / 120.0,
            WheelDelta::Points(p) => p / 50.0,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ACTIONS & KEYBINDINGS
// ═══════════════════════════════════════════════════════════════════════════

/// Every transform command reachable from a key or a control-panel button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OverlayAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    RotateClockwise,
    RotateCounterClockwise,
    TogglePivotMode,
    ZoomIn,
    ZoomOut,
    FineZoomIn,
    FineZoomOut,
    ToggleOpacity,
    FlipHorizontal,
    FlipVertical,
    Reset,
}

impl OverlayAction {
    pub fn all() -> &'static [OverlayAction] {
        use OverlayAction::*;
        &[
            MoveUp, MoveDown, MoveLeft, MoveRight,
            RotateClockwise, RotateCounterClockwise, TogglePivotMode,
            ZoomIn, ZoomOut, FineZoomIn, FineZoomOut,
            ToggleOpacity, FlipHorizontal, FlipVertical, Reset,
        ]
    }

    /// Name used in `keybind.<name>=` settings lines.
    pub fn config_name(self) -> &'static str {
        use OverlayAction::*;
        match self {
            MoveUp => "MoveUp",
            MoveDown => "MoveDown",
            MoveLeft => "MoveLeft",
            MoveRight => "MoveRight",
            RotateClockwise => "RotateClockwise",
            RotateCounterClockwise => "RotateCounterClockwise",
            TogglePivotMode => "TogglePivotMode",
            ZoomIn => "ZoomIn",
            ZoomOut => "ZoomOut",
            FineZoomIn => "FineZoomIn",
            FineZoomOut => "FineZoomOut",
            ToggleOpacity => "ToggleOpacity",
            FlipHorizontal => "FlipHorizontal",
            FlipVertical => "FlipVertical",
            Reset => "Reset",
        }
    }

    pub fn from_config_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|a| a.config_name() == name)
    }

    /// Control-panel caption.
    pub fn label(self) -> &'static str {
        use OverlayAction::*;
        match self {
            MoveUp => "Up",
            MoveDown => "Down",
            MoveLeft => "Left",
            MoveRight => "Right",
            RotateClockwise => "Rot +",
            RotateCounterClockwise => "Rot -",
            TogglePivotMode => "Rot Pt",
            ZoomIn => "+",
            ZoomOut => "-",
            FineZoomIn => "+ Fine",
            FineZoomOut => "- Fine",
            ToggleOpacity => "Transp",
            FlipHorizontal => "Flip H",
            FlipVertical => "Flip V",
            Reset => "Reset",
        }
    }
}

/// A key plus the modifiers it needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyCombo {
    pub ctrl: bool,
    pub shift: bool,
    pub alt: bool,
    pub key: Key,
}

impl KeyCombo {
    pub fn key(key: Key) -> Self {
        Self { ctrl: false, shift: false, alt: false, key }
    }
    pub fn alt_key(key: Key) -> Self {
        Self { ctrl: false, shift: false, alt: true, key }
    }
    pub fn ctrl_alt_key(key: Key) -> Self {
        Self { ctrl: true, shift: false, alt: true, key }
    }

    /// Ctrl must match exactly. Alt and Shift are required when the combo
    /// has them and ignored otherwise, so Shift can select the fine step.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        let m = event.modifiers;
        self.key == event.key
            && self.ctrl == m.ctrl
            && (!self.alt || m.alt)
            && (!self.shift || m.shift)
    }

    fn modifier_count(&self) -> usize {
        [self.ctrl, self.shift, self.alt].iter().filter(|b| **b).count()
    }

    /// Human-readable display string
    pub fn display(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("Ctrl".to_string()); }
        if self.shift { parts.push("Shift".to_string()); }
        if self.alt { parts.push("Alt".to_string()); }
        parts.push(self.key.name());
        parts.join("+")
    }

    pub fn to_config_string(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl { parts.push("ctrl".to_string()); }
        if self.shift { parts.push("shift".to_string()); }
        if self.alt { parts.push("alt".to_string()); }
        parts.push(format!("key:{}", self.key.name()));
        parts.join("+")
    }

    pub fn from_config_string(s: &str) -> Option<Self> {
        let (mut ctrl, mut shift, mut alt, mut key) = (false, false, false, None);
        for part in s.split('+') {
            match part.trim() {
                "ctrl" => ctrl = true,
                "shift" => shift = true,
                "alt" => alt = true,
                other => {
                    if let Some(name) = other.strip_prefix("key:") {
                        key = Key::from_name(name);
                    }
                }
            }
        }
        key.map(|key| Self { ctrl, shift, alt, key })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct KeyBindings {
    pub bindings: HashMap<OverlayAction, KeyCombo>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        use OverlayAction::*;
        let mut map = HashMap::new();
        map.insert(MoveUp,                 KeyCombo::key(Key::letter('w')));
        map.insert(MoveDown,               KeyCombo::key(Key::letter('s')));
        map.insert(MoveLeft,               KeyCombo::key(Key::letter('a')));
        map.insert(MoveRight,              KeyCombo::key(Key::letter('d')));
        map.insert(RotateClockwise,        KeyCombo::key(Key::letter('z')));
        map.insert(RotateCounterClockwise, KeyCombo::key(Key::letter('c')));
        map.insert(TogglePivotMode,        KeyCombo::key(Key::letter('x')));
        map.insert(FineZoomOut,            KeyCombo::key(Key::letter('q')));
        map.insert(FineZoomIn,             KeyCombo::alt_key(Key::letter('e')));
        Self { bindings: map }
    }
}

impl KeyBindings {
    pub fn get(&self, action: OverlayAction) -> Option<&KeyCombo> {
        self.bindings.get(&action)
    }

    pub fn set(&mut self, action: OverlayAction, combo: KeyCombo) {
        self.bindings.insert(action, combo);
    }

    /// The bound action for a key press. When several combos match, the one
    /// with the most modifiers wins.
    pub fn action_for(&self, event: &KeyEvent) -> Option<OverlayAction> {
        OverlayAction::all()
            .iter()
            .filter_map(|a| self.bindings.get(a).map(|c| (*a, c)))
            .filter(|(_, combo)| combo.matches(event))
            .max_by_key(|(_, combo)| combo.modifier_count())
            .map(|(a, _)| a)
    }

    /// Serialize all bindings for the settings file.
    pub fn to_config_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        for action in OverlayAction::all() {
            if let Some(combo) = self.bindings.get(action) {
                lines.push(format!("keybind.{}={}", action.config_name(), combo.to_config_string()));
            }
        }
        lines
    }

    /// Apply one `keybind.<action>=<combo>` entry. Unknown names and
    /// unparsable combos are ignored.
    pub fn load_config_line(&mut self, action_name: &str, combo_str: &str) {
        if let Some(action) = OverlayAction::from_config_name(action_name)
            && let Some(combo) = KeyCombo::from_config_string(combo_str)
        {
            self.bindings.insert(action, combo);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUTER
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum RouterMode {
    #[default]
    Idle,
    Dragging { last: (f64, f64) },
    PivotPick,
}

/// What a handled event asks of the caller.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Routed {
    /// The overlay must be redrawn.
    pub redraw: bool,
    /// A primary click landed outside the active image.
    pub defocus: bool,
    /// Entered or left pivot-pick mode.
    pub mode_changed: bool,
}

impl Routed {
    const REDRAW: Routed = Routed { redraw: true, defocus: false, mode_changed: false };

    pub fn merge(self, other: Routed) -> Routed {
        Routed {
            redraw: self.redraw || other.redraw,
            defocus: self.defocus || other.defocus,
            mode_changed: self.mode_changed || other.mode_changed,
        }
    }
}

#[derive(Debug, Default)]
pub struct InputRouter {
    mode: RouterMode,
    bindings: KeyBindings,
    /// Overlay centre, target of the right-click reset.
    canvas_center: (f64, f64),
}

impl InputRouter {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            mode: RouterMode::Idle,
            bindings,
            canvas_center: crate::image_state::DEFAULT_OFFSET,
        }
    }

    pub fn mode(&self) -> RouterMode {
        self.mode
    }

    pub fn is_pivot_pick(&self) -> bool {
        self.mode == RouterMode::PivotPick
    }

    pub fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut KeyBindings {
        &mut self.bindings
    }

    pub fn set_canvas_center(&mut self, center: (f64, f64)) {
        self.canvas_center = center;
    }

    pub fn canvas_center(&self) -> (f64, f64) {
        self.canvas_center
    }

    pub fn handle_pointer(&mut self, registry: &mut ImageRegistry, event: PointerEvent) -> Routed {
        match event {
            PointerEvent::Down { button: PointerButton::Primary, pos } => {
                if self.mode != RouterMode::PivotPick {
                    self.mode = RouterMode::Dragging { last: pos };
                }
                Routed::default()
            }

            PointerEvent::Moved { pos, modifiers } => {
                let RouterMode::Dragging { last } = self.mode else {
                    return Routed::default();
                };
                self.mode = RouterMode::Dragging { last: pos };
                let Some(active) = registry.active_mut() else {
                    return Routed::default();
                };
                let (dx, dy) = (pos.0 - last.0, pos.1 - last.1);
                if modifiers.ctrl {
                    active.set_rotation(dx * DRAG_ROTATION_PER_PIXEL);
                } else {
                    active.translate(dx, dy);
                }
                Routed::REDRAW
            }

            PointerEvent::Up { button: PointerButton::Primary, pos } => {
                if self.mode == RouterMode::PivotPick {
                    self.mode = RouterMode::Idle;
                    let Some(active) = registry.active_mut() else {
                        return Routed { mode_changed: true, ..Routed::default() };
                    };
                    active.set_pivot(Some(pos));
                    info!(image = %active.identity, x = pos.0, y = pos.1, "rotation pivot set");
                    return Routed { redraw: true, defocus: false, mode_changed: true };
                }

                self.mode = RouterMode::Idle;
                match registry.active() {
                    Some(active) if !active.contains_point(pos) => {
                        debug!(image = %active.identity, "click outside active image");
                        Routed { defocus: true, ..Routed::default() }
                    }
                    _ => Routed::default(),
                }
            }

            PointerEvent::Down { button: PointerButton::Secondary, .. } => {
                let left_pick = self.mode == RouterMode::PivotPick;
                self.mode = RouterMode::Idle;
                let Some(active) = registry.active_mut() else {
                    return Routed { mode_changed: left_pick, ..Routed::default() };
                };
                active.reset_centered(self.canvas_center);
                info!(image = %active.identity, "image reset to overlay centre");
                Routed { redraw: true, defocus: false, mode_changed: left_pick }
            }

            PointerEvent::Down { .. } | PointerEvent::Up { .. } => Routed::default(),
        }
    }

    pub fn handle_wheel(&mut self, registry: &mut ImageRegistry, delta: WheelDelta) -> Routed {
        let detents = delta.detents();
        if detents == 0.0 {
            return Routed::default();
        }
        let Some(active) = registry.active_mut() else {
            return Routed::default();
        };
        active.set_zoom(detents * WHEEL_ZOOM_STEP);
        debug!(image = %active.identity, scale = active.scale_factor(), "wheel zoom");
        Routed::REDRAW
    }

    /// Run the bound action for a key press. Releases and unbound keys are
    /// ignored.
    pub fn handle_key(&mut self, registry: &mut ImageRegistry, event: &KeyEvent) -> Routed {
        if !event.pressed {
            return Routed::default();
        }
        match self.bindings.action_for(event) {
            Some(action) => self.apply_action(registry, action, event.modifiers.shift),
            None => Routed::default(),
        }
    }

    /// Apply `action` to the active image. `fine` selects the one-unit move.
    pub fn apply_action(&mut self, registry: &mut ImageRegistry, action: OverlayAction, fine: bool) -> Routed {
        if action == OverlayAction::TogglePivotMode {
            return self.toggle_pivot_mode(registry);
        }
        let center = self.canvas_center;
        let Some(active) = registry.active_mut() else {
            return Routed::default();
        };
        let step = if fine { FINE_MOVE_STEP } else { MOVE_STEP };

        use OverlayAction::*;
        match action {
            MoveUp => active.translate(0.0, -step),
            MoveDown => active.translate(0.0, step),
            MoveLeft => active.translate(-step, 0.0),
            MoveRight => active.translate(step, 0.0),
            RotateClockwise => active.set_rotation(ROTATE_STEP),
            RotateCounterClockwise => active.set_rotation(-ROTATE_STEP),
            ZoomIn => active.adjust_scale(ZOOM_STEP),
            ZoomOut => active.adjust_scale(-ZOOM_STEP),
            FineZoomIn => active.adjust_scale(FINE_ZOOM_STEP),
            FineZoomOut => active.adjust_scale(-FINE_ZOOM_STEP),
            ToggleOpacity => {
                active.toggle_opacity();
            }
            FlipHorizontal => active.toggle_flip(FlipAxis::Horizontal),
            FlipVertical => active.toggle_flip(FlipAxis::Vertical),
            Reset => active.reset_centered(center),
            TogglePivotMode => {}
        }
        debug!(image = %active.identity, ?action, "action applied");
        Routed::REDRAW
    }

    /// Enter pivot-pick mode, or leave it and clear the active image's pivot.
    /// Needs an active image.
    pub fn toggle_pivot_mode(&mut self, registry: &mut ImageRegistry) -> Routed {
        let Some(active) = registry.active_mut() else {
            return Routed::default();
        };
        if self.mode == RouterMode::PivotPick {
            self.mode = RouterMode::Idle;
            active.set_pivot(None);
            info!(image = %active.identity, "pivot mode off, pivot cleared");
            Routed { redraw: true, defocus: false, mode_changed: true }
        } else {
            self.mode = RouterMode::PivotPick;
            info!("pivot mode on");
            Routed { redraw: false, defocus: false, mode_changed: true }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_state::ImageTransform;
    use crate::registry::NamePolicy;
    use image::{Rgba, RgbaImage};

    fn registry_with_active() -> ImageRegistry {
        let mut reg = ImageRegistry::new();
        let mut t = ImageTransform::new("A", RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 255])), None);
        t.offset = (200.0, 200.0);
        reg.add(t, NamePolicy::Reject).unwrap();
        reg.set_active("A").unwrap();
        reg
    }

    fn press(c: char, modifiers: Modifiers) -> KeyEvent {
        KeyEvent::press(Key::letter(c), modifiers)
    }

    #[test]
    fn drag_translates_by_motion_delta() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        router.handle_pointer(&mut reg, PointerEvent::Down { button: PointerButton::Primary, pos: (200.0, 200.0) });
        let routed = router.handle_pointer(&mut reg, PointerEvent::Moved { pos: (210.0, 195.0), modifiers: Modifiers::NONE });
        assert!(routed.redraw);
        router.handle_pointer(&mut reg, PointerEvent::Moved { pos: (212.0, 195.0), modifiers: Modifiers::NONE });
        assert_eq!(reg.active().unwrap().offset, (212.0, 195.0));
        let up = router.handle_pointer(&mut reg, PointerEvent::Up { button: PointerButton::Primary, pos: (212.0, 195.0) });
        assert_eq!(router.mode(), RouterMode::Idle);
        assert!(!up.defocus);
    }

    #[test]
    fn ctrl_drag_rotates() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        let ctrl = Modifiers { ctrl: true, ..Modifiers::NONE };
        router.handle_pointer(&mut reg, PointerEvent::Down { button: PointerButton::Primary, pos: (0.0, 0.0) });
        router.handle_pointer(&mut reg, PointerEvent::Moved { pos: (50.0, 30.0), modifiers: ctrl });
        let a = reg.active().unwrap();
        assert!((a.angle_degrees() - 5.0).abs() < 1e-9);
        assert_eq!(a.offset, (200.0, 200.0));
    }

    #[test]
    fn motion_without_drag_is_ignored() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        let routed = router.handle_pointer(&mut reg, PointerEvent::Moved { pos: (5.0, 5.0), modifiers: Modifiers::NONE });
        assert_eq!(routed, Routed::default());
        assert_eq!(reg.active().unwrap().offset, (200.0, 200.0));
    }

    #[test]
    fn release_outside_bounds_defocuses() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        router.handle_pointer(&mut reg, PointerEvent::Down { button: PointerButton::Primary, pos: (400.0, 400.0) });
        router.handle_pointer(&mut reg, PointerEvent::Moved { pos: (400.0, 400.0), modifiers: Modifiers::NONE });
        let up = router.handle_pointer(&mut reg, PointerEvent::Up { button: PointerButton::Primary, pos: (400.0, 400.0) });
        assert!(up.defocus);
    }

    #[test]
    fn pivot_pick_sets_pivot_on_next_click() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        let routed = router.handle_key(&mut reg, &press('x', Modifiers::NONE));
        assert!(routed.mode_changed);
        assert!(router.is_pivot_pick());

        // The click must not start a drag
        router.handle_pointer(&mut reg, PointerEvent::Down { button: PointerButton::Primary, pos: (180.0, 190.0) });
        assert!(router.is_pivot_pick());
        let up = router.handle_pointer(&mut reg, PointerEvent::Up { button: PointerButton::Primary, pos: (180.0, 190.0) });
        assert!(up.mode_changed && up.redraw);
        assert_eq!(router.mode(), RouterMode::Idle);
        assert_eq!(reg.active().unwrap().rotation_pivot, Some((180.0, 190.0)));
    }

    #[test]
    fn leaving_pivot_pick_by_toggle_clears_pivot() {
        let mut reg = registry_with_active();
        reg.active_mut().unwrap().set_pivot(Some((1.0, 1.0)));
        let mut router = InputRouter::new(KeyBindings::default());
        router.toggle_pivot_mode(&mut reg);
        router.toggle_pivot_mode(&mut reg);
        assert_eq!(router.mode(), RouterMode::Idle);
        assert_eq!(reg.active().unwrap().rotation_pivot, None);
    }

    #[test]
    fn pivot_mode_needs_active_image() {
        let mut reg = ImageRegistry::new();
        let mut router = InputRouter::new(KeyBindings::default());
        assert_eq!(router.toggle_pivot_mode(&mut reg), Routed::default());
        assert_eq!(router.mode(), RouterMode::Idle);
    }

    #[test]
    fn wheel_normalizes_each_unit() {
        assert_eq!(WheelDelta::Raw120(240.0).detents(), 2.0);
        assert_eq!(WheelDelta::Points(-50.0).detents(), -1.0);
        assert_eq!(WheelDelta::Detents(1.0).detents(), 1.0);

        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        router.handle_wheel(&mut reg, WheelDelta::Raw120(120.0));
        assert!((reg.active().unwrap().scale_log() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn default_keys_move_rotate_and_zoom() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        let shift = Modifiers { shift: true, ..Modifiers::NONE };
        let alt = Modifiers { alt: true, ..Modifiers::NONE };

        router.handle_key(&mut reg, &press('w', Modifiers::NONE));
        router.handle_key(&mut reg, &press('d', shift));
        assert_eq!(reg.active().unwrap().offset, (201.0, 197.0));

        router.handle_key(&mut reg, &press('z', Modifiers::NONE));
        router.handle_key(&mut reg, &press('z', Modifiers::NONE));
        router.handle_key(&mut reg, &press('c', Modifiers::NONE));
        assert!((reg.active().unwrap().angle_degrees() - 0.5).abs() < 1e-9);

        // Plain E is unbound; Alt+E zooms in
        assert_eq!(router.handle_key(&mut reg, &press('e', Modifiers::NONE)), Routed::default());
        router.handle_key(&mut reg, &press('e', alt));
        assert!((reg.active().unwrap().scale_factor() - 1.01).abs() < 1e-12);
        router.handle_key(&mut reg, &press('q', Modifiers::NONE));
        assert!((reg.active().unwrap().scale_factor() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn releases_and_ctrl_combos_do_nothing() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        let release = KeyEvent { key: Key::letter('w'), pressed: false, modifiers: Modifiers::NONE };
        assert_eq!(router.handle_key(&mut reg, &release), Routed::default());
        let ctrl = Modifiers { ctrl: true, ..Modifiers::NONE };
        assert_eq!(router.handle_key(&mut reg, &press('w', ctrl)), Routed::default());
    }

    #[test]
    fn secondary_click_resets_to_canvas_center() {
        let mut reg = registry_with_active();
        let mut router = InputRouter::new(KeyBindings::default());
        router.set_canvas_center((960.0, 540.0));
        reg.active_mut().unwrap().set_rotation(30.0);
        router.toggle_pivot_mode(&mut reg);
        let routed = router.handle_pointer(&mut reg, PointerEvent::Down { button: PointerButton::Secondary, pos: (0.0, 0.0) });
        assert!(routed.redraw && routed.mode_changed);
        let a = reg.active().unwrap();
        assert_eq!(a.offset, (960.0, 540.0));
        assert_eq!(a.angle_degrees(), 0.0);
        assert_eq!(a.opacity(), 1.0);
    }

    #[test]
    fn no_active_image_means_no_effect() {
        let mut reg = ImageRegistry::new();
        let mut router = InputRouter::new(KeyBindings::default());
        assert_eq!(router.apply_action(&mut reg, OverlayAction::ZoomIn, false), Routed::default());
        assert_eq!(router.handle_wheel(&mut reg, WheelDelta::Detents(3.0)), Routed::default());
    }

    #[test]
    fn keybinding_config_lines_round_trip() {
        let defaults = KeyBindings::default();
        let mut loaded = KeyBindings { bindings: HashMap::new() };
        for line in defaults.to_config_lines() {
            let (name, combo) = line
                .strip_prefix("keybind.")
                .and_then(|l| l.split_once('='))
                .unwrap();
            loaded.load_config_line(name, combo);
        }
        assert_eq!(loaded, defaults);
        assert!(defaults.to_config_lines().contains(&"keybind.FineZoomIn=alt+key:E".to_string()));
    }

    #[test]
    fn vk_codes_map_both_ways() {
        assert_eq!(Key::from_vk(0x57), Key::Char('w'));
        assert_eq!(Key::from_vk(104), Key::Numpad(8));
        assert_eq!(Key::from_vk(0xA4), Key::Alt);
        for key in [Key::Char('q'), Key::Numpad(0), Key::Up, Key::Digit(3)] {
            assert_eq!(Key::from_vk(key.to_vk()), key);
        }
        assert_eq!(Key::from_name("Num7"), Some(Key::Numpad(7)));
        assert_eq!(Key::from_name("e"), Some(Key::Char('e')));
        assert_eq!(Key::from_name("Num12"), None);
    }
}
