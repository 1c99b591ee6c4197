// ============================================================================
// MAESTRO CONTROLS — numpad ghost clicks on recorded control positions
// ============================================================================
//
// Full-control mode turns the numpad into a remote for the Maestro window:
//
//     7 DistalTip        8 PositiveTorque   9 MesialTip
//     4 DistalRotation   5 NegativeTorque   6 MesialRotation
//     1 Intrusion        2 DistalLinear     3 MesialLinear
//     0 Extrusion
//
// Positions come from a coordinates file or from a capture run, which hides
// the overlay and records one primary click per control in CONTROL_ORDER.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::{
    CoordinateSource, HostRequest, OverlayPlugin, PluginCommand, PluginContext, MAESTRO_CONTROLS,
};
use crate::controls::{ButtonSpec, Indicator};
use crate::coords::{self, CoordinateBindings, CONTROL_ORDER, MAESTRO_VERSIONS};
use crate::error::OverlayError;
use crate::hooks::HookEvent;
use crate::input::{Key, PointerButton};

pub const BUTTON_ID: &str = "btn_full_control";

/// Control clicked by a numpad digit.
pub fn control_for_numpad(digit: u8) -> Option<&'static str> {
    Some(match digit {
        7 => "DistalTip",
        8 => "PositiveTorque",
        9 => "MesialTip",
        4 => "DistalRotation",
        5 => "NegativeTorque",
        6 => "MesialRotation",
        1 => "Intrusion",
        2 => "DistalLinear",
        3 => "MesialLinear",
        0 => "Extrusion",
        _ => return None,
    })
}

#[derive(Debug)]
struct CaptureRun {
    version: u8,
    next: usize,
    bindings: CoordinateBindings,
}

#[derive(Debug)]
pub struct MaestroControlsPlugin {
    base_dir: PathBuf,
    full_control: bool,
    version: Option<u8>,
    bindings: CoordinateBindings,
    capture: Option<CaptureRun>,
}

impl MaestroControlsPlugin {
    pub fn new(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            full_control: false,
            version: None,
            bindings: CoordinateBindings::new(),
            capture: None,
        }
    }

    pub fn version(&self) -> Option<u8> {
        self.version
    }

    pub fn bindings(&self) -> &CoordinateBindings {
        &self.bindings
    }

    pub fn is_capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn enable(&mut self, version: u8, bindings: CoordinateBindings, ctx: &mut PluginContext<'_>) {
        let missing = bindings.missing_controls();
        if !missing.is_empty() {
            warn!(?missing, "some Maestro controls have no position");
        }
        self.version = Some(version);
        self.bindings = bindings;
        self.full_control = true;
        ctx.controls.update(BUTTON_ID, "Full_Ctrl_ON", Indicator::On);
        info!(version, controls = self.bindings.len(), "full control enabled");
    }

    fn disable(&mut self, ctx: &mut PluginContext<'_>) {
        if self.capture.take().is_some() {
            ctx.request(HostRequest::SetWindowsHidden(false));
            info!("coordinate capture cancelled");
        }
        if self.full_control {
            self.full_control = false;
            ctx.controls.update(BUTTON_ID, "FullCtrl", Indicator::Off);
            info!("full control disabled");
        }
    }

    fn configure(&mut self, version: u8, source: CoordinateSource, ctx: &mut PluginContext<'_>) {
        if !MAESTRO_VERSIONS.contains(&version) {
            ctx.notify_error(&OverlayError::CoordinateFile(format!(
                "unknown Maestro version {version}"
            )));
            return;
        }
        match source {
            CoordinateSource::File(path) => match CoordinateBindings::load_file(&path) {
                Ok(bindings) => self.enable(version, bindings, ctx),
                Err(e) => ctx.notify_error(&e),
            },
            CoordinateSource::Capture => self.start_capture(version, ctx),
        }
    }

    fn start_capture(&mut self, version: u8, ctx: &mut PluginContext<'_>) {
        if !ctx.global_input {
            ctx.notify_error(&OverlayError::Hook(
                "capturing positions needs desktop-wide mouse input".into(),
            ));
            return;
        }
        self.capture = Some(CaptureRun { version, next: 0, bindings: CoordinateBindings::new() });
        ctx.request(HostRequest::SetWindowsHidden(true));
        ctx.toasts.info("Coordinate Selection", capture_prompt(CONTROL_ORDER[0]));
        info!(version, "coordinate capture started");
    }

    /// Record a click for the current control. Returns true when the run is
    /// complete.
    fn record_click(&mut self, pos: (i32, i32), ctx: &mut PluginContext<'_>) -> bool {
        let Some(run) = self.capture.as_mut() else { return false };
        let control = CONTROL_ORDER[run.next];
        run.bindings.set(control, pos);
        run.next += 1;
        info!(control, x = pos.0, y = pos.1, "position recorded");

        if let Some(next) = CONTROL_ORDER.get(run.next) {
            ctx.toasts.info("Coordinate Selection", capture_prompt(next));
            return false;
        }
        true
    }

    fn finish_capture(&mut self, ctx: &mut PluginContext<'_>) {
        let Some(run) = self.capture.take() else { return };
        ctx.request(HostRequest::SetWindowsHidden(false));
        let version = run.version;
        self.enable(version, run.bindings, ctx);
        ctx.request(HostRequest::OfferSaveCoordinates { version });
    }

    fn save(&mut self, ctx: &mut PluginContext<'_>) {
        let Some(version) = self.version else {
            ctx.toasts.warn("Save Coordinates", "Nothing captured yet");
            return;
        };
        let path = coords::coords_file_path(&self.base_dir, version);
        match self.bindings.save_file(&path) {
            Ok(()) => ctx
                .toasts
                .info("Coordinates Saved", format!("Coordinates saved to {}", path.display())),
            Err(e) => ctx.notify_error(&e),
        }
    }

    fn ghost_click(&self, digit: u8, ctx: &mut PluginContext<'_>) {
        let Some(control) = control_for_numpad(digit) else { return };
        let Some(pos) = self.bindings.get(control) else {
            warn!(control, "no position recorded");
            ctx.toasts.warn("Maestro Controls", format!("No position for '{control}'"));
            return;
        };
        debug!(control, x = pos.0, y = pos.1, "ghost click");
        if let Err(e) = ctx.injector.click_at(pos) {
            ctx.notify_error(&e);
        }
    }
}

fn capture_prompt(control: &str) -> String {
    format!("Click on the '{control}' control (Esc cancels)")
}

impl OverlayPlugin for MaestroControlsPlugin {
    fn name(&self) -> &'static str {
        MAESTRO_CONTROLS
    }

    fn buttons(&self) -> Vec<ButtonSpec> {
        vec![ButtonSpec::new(BUTTON_ID, "Maestro Controls", Indicator::Off)]
    }

    fn handle_command(&mut self, command: PluginCommand, ctx: &mut PluginContext<'_>) {
        match command {
            PluginCommand::Toggle if self.full_control || self.capture.is_some() => self.disable(ctx),
            PluginCommand::Toggle | PluginCommand::SetEnabled(true) => {
                if !self.full_control && self.capture.is_none() {
                    ctx.request(HostRequest::ChooseMaestroSetup);
                }
            }
            PluginCommand::SetEnabled(false) => self.disable(ctx),
            PluginCommand::ConfigureMaestro { version, source } => self.configure(version, source, ctx),
            PluginCommand::SaveCoordinates => self.save(ctx),
        }
    }

    fn on_hook_event(&mut self, event: &HookEvent, ctx: &mut PluginContext<'_>) {
        if self.capture.is_some() {
            match event {
                HookEvent::MouseButton { pos, button: PointerButton::Primary, pressed: true } => {
                    if self.record_click(*pos, ctx) {
                        self.finish_capture(ctx);
                    }
                }
                HookEvent::Key(k) if k.pressed && k.key == Key::Escape => self.disable(ctx),
                _ => {}
            }
            return;
        }

        if !self.full_control {
            return;
        }
        // Alt+numpad belongs to key remapping
        if let HookEvent::Key(k) = event
            && k.pressed
            && !k.modifiers.alt
            && let Key::Numpad(digit) = k.key
        {
            self.ghost_click(digit, ctx);
        }
    }

    fn is_active(&self) -> bool {
        self.full_control
    }

    fn cleanup(&mut self) {
        self.capture = None;
        self.full_control = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::Injected;
    use crate::input::{KeyEvent, Modifiers};
    use crate::plugins::test_support::Harness;

    fn click(x: i32, y: i32) -> HookEvent {
        HookEvent::MouseButton { pos: (x, y), button: PointerButton::Primary, pressed: true }
    }

    fn numpad(n: u8) -> HookEvent {
        HookEvent::Key(KeyEvent::press(Key::Numpad(n), Modifiers::NONE))
    }

    #[test]
    fn numpad_layout_covers_every_control_once() {
        let mut names: Vec<_> = (0..10).filter_map(control_for_numpad).collect();
        names.sort_unstable();
        let mut expected = CONTROL_ORDER.to_vec();
        expected.sort_unstable();
        assert_eq!(names, expected);
        assert_eq!(control_for_numpad(8), Some("PositiveTorque"));
    }

    #[test]
    fn toggle_when_off_asks_for_setup() {
        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(Path::new("."));
        let mut ctx = h.ctx();
        p.handle_command(PluginCommand::Toggle, &mut ctx);
        assert_eq!(ctx.take_requests(), [HostRequest::ChooseMaestroSetup]);
        assert!(!p.is_active());
    }

    #[test]
    fn file_source_enables_and_clicks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coords.txt");
        std::fs::write(&path, "DistalTip:100,200\nMesialTip:250,350\n").unwrap();

        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(dir.path());
        for spec in p.buttons() {
            h.controls.register(spec);
        }
        p.handle_command(
            PluginCommand::ConfigureMaestro { version: 4, source: CoordinateSource::File(path) },
            &mut h.ctx(),
        );
        assert!(p.is_active());
        assert_eq!(h.controls.get(BUTTON_ID).unwrap().label, "Full_Ctrl_ON");

        p.on_hook_event(&numpad(7), &mut h.ctx());
        p.on_hook_event(&numpad(9), &mut h.ctx());
        // No position for Extrusion: warned, nothing injected
        p.on_hook_event(&numpad(0), &mut h.ctx());
        assert_eq!(
            *h.injector.log.borrow(),
            [Injected::Click((100, 200)), Injected::Click((250, 350))]
        );
        assert_eq!(h.toasts.len(), 1);

        p.handle_command(PluginCommand::Toggle, &mut h.ctx());
        assert!(!p.is_active());
        assert_eq!(h.controls.get(BUTTON_ID).unwrap().label, "FullCtrl");
    }

    #[test]
    fn bad_file_keeps_mode_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.txt");
        std::fs::write(&path, "garbage\n").unwrap();
        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(dir.path());
        p.handle_command(
            PluginCommand::ConfigureMaestro { version: 6, source: CoordinateSource::File(path) },
            &mut h.ctx(),
        );
        assert!(!p.is_active());
        assert_eq!(h.toasts.len(), 1);
    }

    #[test]
    fn alt_numpad_is_left_to_remapping() {
        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(Path::new("."));
        let mut b = CoordinateBindings::new();
        b.set("PositiveTorque", (1, 1));
        p.enable(4, b, &mut h.ctx());
        let alt = Modifiers { alt: true, ..Modifiers::NONE };
        p.on_hook_event(&HookEvent::Key(KeyEvent::press(Key::Numpad(8), alt)), &mut h.ctx());
        assert!(h.injector.log.borrow().is_empty());
    }

    #[test]
    fn capture_records_every_control_then_offers_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(dir.path());

        let mut ctx = h.ctx();
        p.handle_command(
            PluginCommand::ConfigureMaestro { version: 6, source: CoordinateSource::Capture },
            &mut ctx,
        );
        assert!(p.is_capturing());
        assert_eq!(ctx.take_requests(), [HostRequest::SetWindowsHidden(true)]);

        for i in 0..CONTROL_ORDER.len() as i32 {
            p.on_hook_event(&click(i * 10, i), &mut ctx);
        }
        assert!(!p.is_capturing());
        assert!(p.is_active());
        assert_eq!(
            ctx.take_requests(),
            [HostRequest::SetWindowsHidden(false), HostRequest::OfferSaveCoordinates { version: 6 }]
        );
        assert_eq!(p.bindings().get("Extrusion"), Some((70, 7)));

        p.handle_command(PluginCommand::SaveCoordinates, &mut ctx);
        drop(ctx);
        let saved = std::fs::read_to_string(dir.path().join("coords_maestro_6.txt")).unwrap();
        assert_eq!(saved.lines().count(), 10);
        assert!(saved.starts_with("DistalTip:0,0\nMesialTip:10,1\n"));
    }

    #[test]
    fn escape_cancels_capture() {
        let mut h = Harness::new();
        let mut p = MaestroControlsPlugin::new(Path::new("."));
        let mut ctx = h.ctx();
        p.handle_command(
            PluginCommand::ConfigureMaestro { version: 4, source: CoordinateSource::Capture },
            &mut ctx,
        );
        p.on_hook_event(&click(5, 5), &mut ctx);
        ctx.take_requests();
        p.on_hook_event(&HookEvent::Key(KeyEvent::press(Key::Escape, Modifiers::NONE)), &mut ctx);
        assert!(!p.is_capturing());
        assert!(!p.is_active());
        assert_eq!(ctx.take_requests(), [HostRequest::SetWindowsHidden(false)]);
    }

    #[test]
    fn capture_needs_global_input() {
        let mut h = Harness::new();
        h.global_input = false;
        let mut p = MaestroControlsPlugin::new(Path::new("."));
        p.handle_command(
            PluginCommand::ConfigureMaestro { version: 4, source: CoordinateSource::Capture },
            &mut h.ctx(),
        );
        assert!(!p.is_capturing());
        assert_eq!(h.toasts.len(), 1);
    }
}
