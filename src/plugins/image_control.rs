//! Routes desktop-wide key presses to the Input Router while enabled, so the
//! overlay can be nudged without taking focus away from the application
//! underneath.

use tracing::info;

use super::{OverlayPlugin, PluginCommand, PluginContext, IMAGE_CONTROL, MAESTRO_CONTROLS};
use crate::controls::{ButtonSpec, Indicator};
use crate::hooks::HookEvent;

pub const BUTTON_ID: &str = "btn_toggle_control_mode";

#[derive(Debug, Default)]
pub struct ImageControlPlugin {
    enabled: bool,
}

impl ImageControlPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn enable(&mut self, ctx: &mut PluginContext<'_>) {
        // Ghost clicks and image keys would fight over the numpad
        ctx.send_to(MAESTRO_CONTROLS, PluginCommand::SetEnabled(false));
        if self.enabled {
            return;
        }
        if ctx.active().is_none() {
            ctx.toasts.warn("Image Control", "Select an image first");
            return;
        }
        self.enabled = true;
        ctx.controls.update(BUTTON_ID, "Disable ImgCtrl", Indicator::On);
        info!("image control enabled");
    }

    fn disable(&mut self, ctx: &mut PluginContext<'_>) {
        if !self.enabled {
            return;
        }
        self.enabled = false;
        ctx.controls.update(BUTTON_ID, "Img Ctrl", Indicator::Off);
        info!("image control disabled");
    }
}

impl OverlayPlugin for ImageControlPlugin {
    fn name(&self) -> &'static str {
        IMAGE_CONTROL
    }

    fn buttons(&self) -> Vec<ButtonSpec> {
        let (label, indicator) = if self.enabled {
            ("Disable ImgCtrl", Indicator::On)
        } else {
            ("Img Ctrl", Indicator::Off)
        };
        vec![ButtonSpec::new(BUTTON_ID, label, indicator)]
    }

    fn handle_command(&mut self, command: PluginCommand, ctx: &mut PluginContext<'_>) {
        match command {
            PluginCommand::Toggle if self.enabled => self.disable(ctx),
            PluginCommand::Toggle | PluginCommand::SetEnabled(true) => self.enable(ctx),
            PluginCommand::SetEnabled(false) => self.disable(ctx),
            _ => {}
        }
    }

    fn on_hook_event(&mut self, event: &HookEvent, ctx: &mut PluginContext<'_>) {
        if !self.enabled {
            return;
        }
        if let HookEvent::Key(key) = event {
            ctx.route_key(key);
        }
    }

    fn is_active(&self) -> bool {
        self.enabled
    }

    fn cleanup(&mut self) {
        self.enabled = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{Key, KeyEvent, Modifiers};
    use crate::plugins::test_support::Harness;

    #[test]
    fn needs_an_active_image() {
        let mut h = Harness::new();
        let mut p = ImageControlPlugin::new();
        p.handle_command(PluginCommand::Toggle, &mut h.ctx());
        assert!(!p.is_active());
        assert_eq!(h.toasts.len(), 1);
    }

    #[test]
    fn toggle_flips_label_and_indicator() {
        let mut h = Harness::with_active_image();
        let mut p = ImageControlPlugin::new();
        for spec in p.buttons() {
            h.controls.register(spec);
        }
        p.handle_command(PluginCommand::Toggle, &mut h.ctx());
        assert!(p.is_active());
        assert_eq!(h.controls.get(BUTTON_ID).unwrap().label, "Disable ImgCtrl");
        assert!(h.controls.is_on(BUTTON_ID));

        p.handle_command(PluginCommand::Toggle, &mut h.ctx());
        assert!(!p.is_active());
        assert_eq!(h.controls.get(BUTTON_ID).unwrap().label, "Img Ctrl");
    }

    #[test]
    fn set_enabled_is_idempotent() {
        let mut h = Harness::with_active_image();
        let mut p = ImageControlPlugin::new();
        p.handle_command(PluginCommand::SetEnabled(true), &mut h.ctx());
        p.handle_command(PluginCommand::SetEnabled(true), &mut h.ctx());
        assert!(p.is_active());
        p.handle_command(PluginCommand::SetEnabled(false), &mut h.ctx());
        p.handle_command(PluginCommand::SetEnabled(false), &mut h.ctx());
        assert!(!p.is_active());
    }

    #[test]
    fn shift_selects_the_fine_step() {
        let mut h = Harness::with_active_image();
        let mut p = ImageControlPlugin::new();
        p.handle_command(PluginCommand::SetEnabled(true), &mut h.ctx());
        let shift = Modifiers { shift: true, ..Modifiers::NONE };
        let ev = HookEvent::Key(KeyEvent::press(Key::Char('w'), shift));
        p.on_hook_event(&ev, &mut h.ctx());
        assert_eq!(h.registry.active().unwrap().offset, (512.0, 511.0));
    }
}
