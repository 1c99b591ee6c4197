//! Alt + Numpad 8/5/6/4 tap the arrow keys, for applications that only take
//! arrows for fine adjustment.

use tracing::{debug, info};

use super::{OverlayPlugin, PluginCommand, PluginContext, KEY_REMAP};
use crate::controls::{ButtonSpec, Indicator};
use crate::hooks::HookEvent;
use crate::input::Key;

pub const BUTTON_ID: &str = "btn_key_remap";

#[derive(Debug)]
pub struct KeyRemapPlugin {
    enabled: bool,
}

impl Default for KeyRemapPlugin {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl KeyRemapPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    fn remapped(key: Key) -> Option<Key> {
        match key {
            Key::Numpad(8) => Some(Key::Up),
            Key::Numpad(5) => Some(Key::Down),
            Key::Numpad(6) => Some(Key::Right),
            Key::Numpad(4) => Some(Key::Left),
            _ => None,
        }
    }

    fn button(&self) -> ButtonSpec {
        if self.enabled {
            ButtonSpec::new(BUTTON_ID, "Remap: ON", Indicator::On)
        } else {
            ButtonSpec::new(BUTTON_ID, "Remap: OFF", Indicator::Off)
        }
    }

    fn set_enabled(&mut self, enabled: bool, ctx: &mut PluginContext<'_>) {
        self.enabled = enabled;
        let spec = self.button();
        ctx.controls.update(spec.id, spec.label, spec.indicator);
        info!(enabled, "key remapping toggled");
    }
}

impl OverlayPlugin for KeyRemapPlugin {
    fn name(&self) -> &'static str {
        KEY_REMAP
    }

    fn buttons(&self) -> Vec<ButtonSpec> {
        vec![self.button()]
    }

    fn handle_command(&mut self, command: PluginCommand, ctx: &mut PluginContext<'_>) {
        match command {
            PluginCommand::Toggle => self.set_enabled(!self.enabled, ctx),
            PluginCommand::SetEnabled(on) => self.set_enabled(on, ctx),
            _ => {}
        }
    }

    fn on_hook_event(&mut self, event: &HookEvent, ctx: &mut PluginContext<'_>) {
        let HookEvent::Key(key) = event else { return };
        if !self.enabled || !key.pressed || !key.modifiers.alt {
            return;
        }
        let Some(arrow) = Self::remapped(key.key) else { return };
        match ctx.injector.tap_key(arrow) {
            Ok(()) => debug!(from = %key.key.name(), to = %arrow.name(), "key remapped"),
            Err(e) => ctx.notify_error(&e),
        }
    }

    fn is_active(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::testing::Injected;
    use crate::input::{KeyEvent, Modifiers};
    use crate::plugins::test_support::Harness;

    fn alt() -> Modifiers {
        Modifiers { alt: true, ..Modifiers::NONE }
    }

    #[test]
    fn alt_numpad_taps_arrows() {
        let mut h = Harness::new();
        let mut p = KeyRemapPlugin::new();
        for n in [8, 5, 6, 4, 7] {
            let ev = HookEvent::Key(KeyEvent::press(Key::Numpad(n), alt()));
            p.on_hook_event(&ev, &mut h.ctx());
        }
        assert_eq!(
            *h.injector.log.borrow(),
            [
                Injected::Tap(Key::Up),
                Injected::Tap(Key::Down),
                Injected::Tap(Key::Right),
                Injected::Tap(Key::Left),
            ]
        );
    }

    #[test]
    fn needs_alt_and_enabled() {
        let mut h = Harness::new();
        let mut p = KeyRemapPlugin::new();
        let plain = HookEvent::Key(KeyEvent::press(Key::Numpad(8), Modifiers::NONE));
        p.on_hook_event(&plain, &mut h.ctx());

        h.controls.register(p.button());
        p.handle_command(PluginCommand::Toggle, &mut h.ctx());
        assert_eq!(h.controls.get(BUTTON_ID).unwrap().label, "Remap: OFF");
        let with_alt = HookEvent::Key(KeyEvent::press(Key::Numpad(8), alt()));
        p.on_hook_event(&with_alt, &mut h.ctx());
        assert!(h.injector.log.borrow().is_empty());
    }
}
