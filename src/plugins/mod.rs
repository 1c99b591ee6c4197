// ============================================================================
// PLUGIN HOST — statically registered extensions of the control surface
// ============================================================================
//
// Plugins never hold references to the app. Every call receives a
// `PluginContext` borrowing exactly what a plugin may touch; anything that
// needs the GUI (dialogs, window visibility) goes out as a `HostRequest`,
// and messages to other plugins are queued and delivered by the host after
// the current call returns.

mod image_control;
mod key_remap;
mod maestro_controls;

pub use image_control::ImageControlPlugin;
pub use key_remap::KeyRemapPlugin;
pub use maestro_controls::MaestroControlsPlugin;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::controls::{ButtonSpec, ControlPanel};
use crate::error::OverlayError;
use crate::hooks::{HookEvent, InputInjector};
use crate::image_state::ImageTransform;
use crate::input::{InputRouter, KeyEvent, OverlayAction, Routed};
use crate::notify::Toasts;
use crate::registry::ImageRegistry;

pub const IMAGE_CONTROL: &str = "ImageControl";
pub const MAESTRO_CONTROLS: &str = "MaestroControls";
pub const KEY_REMAP: &str = "KeyRemap";

/// Nested plugin-to-plugin messages beyond this depth are dropped.
const MAX_MESSAGE_ROUNDS: usize = 8;

/// Where Maestro control positions come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CoordinateSource {
    /// Record one click per control.
    Capture,
    File(PathBuf),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PluginCommand {
    Toggle,
    SetEnabled(bool),
    ConfigureMaestro { version: u8, source: CoordinateSource },
    /// Write the captured coordinates to the default file.
    SaveCoordinates,
}

/// Things only the app can do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostRequest {
    ToggleOverlay,
    /// Hide or restore the overlay window while positions are captured.
    /// The control panel stays up to show the prompts.
    SetWindowsHidden(bool),
    /// Ask for Maestro version and coordinate source, then answer with
    /// `PluginCommand::ConfigureMaestro`.
    ChooseMaestroSetup,
    /// Ask whether to keep the captured coordinates; answer with
    /// `PluginCommand::SaveCoordinates`.
    OfferSaveCoordinates { version: u8 },
}

/// What a plugin may touch during one call.
pub struct PluginContext<'a> {
    pub registry: &'a mut ImageRegistry,
    pub router: &'a mut InputRouter,
    pub controls: &'a mut ControlPanel,
    pub toasts: &'a mut Toasts,
    pub injector: &'a dyn InputInjector,
    /// Hook events come from the whole desktop.
    pub global_input: bool,
    redraw: bool,
    requests: Vec<HostRequest>,
    messages: VecDeque<(&'static str, PluginCommand)>,
}

impl<'a> PluginContext<'a> {
    pub fn new(
        registry: &'a mut ImageRegistry,
        router: &'a mut InputRouter,
        controls: &'a mut ControlPanel,
        toasts: &'a mut Toasts,
        injector: &'a dyn InputInjector,
        global_input: bool,
    ) -> Self {
        Self {
            registry,
            router,
            controls,
            toasts,
            injector,
            global_input,
            redraw: false,
            requests: Vec::new(),
            messages: VecDeque::new(),
        }
    }

    pub fn active(&self) -> Option<&ImageTransform> {
        self.registry.active()
    }

    pub fn request_redraw(&mut self) {
        self.redraw = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw
    }

    /// Run a transform command on the active image.
    pub fn apply(&mut self, action: OverlayAction, fine: bool) -> Routed {
        let routed = self.router.apply_action(self.registry, action, fine);
        self.redraw |= routed.redraw;
        routed
    }

    /// Hand a key event to the Input Router.
    pub fn route_key(&mut self, event: &KeyEvent) -> Routed {
        let routed = self.router.handle_key(self.registry, event);
        self.redraw |= routed.redraw;
        routed
    }

    pub fn request(&mut self, request: HostRequest) {
        self.requests.push(request);
    }

    /// Queue a command for another plugin; delivered after the current call.
    pub fn send_to(&mut self, target: &'static str, command: PluginCommand) {
        self.messages.push_back((target, command));
    }

    pub fn notify_error(&mut self, err: &OverlayError) {
        warn!(error = %err, "plugin operation failed");
        self.toasts.error(err);
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }
}

/// An extension of the control surface.
pub trait OverlayPlugin {
    fn name(&self) -> &'static str;

    /// Buttons this plugin adds to the control panel.
    fn buttons(&self) -> Vec<ButtonSpec> {
        Vec::new()
    }

    fn initialize(&mut self, _ctx: &mut PluginContext<'_>) {}

    fn handle_command(&mut self, command: PluginCommand, ctx: &mut PluginContext<'_>);

    fn on_hook_event(&mut self, _event: &HookEvent, _ctx: &mut PluginContext<'_>) {}

    /// Whether the plugin's main mode is currently on.
    fn is_active(&self) -> bool {
        false
    }

    fn cleanup(&mut self) {}
}

#[derive(Default)]
pub struct PluginHost {
    plugins: Vec<Box<dyn OverlayPlugin>>,
}

impl PluginHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plugins shipped with the overlay, in panel order.
    pub fn with_builtin(base_dir: &Path) -> Self {
        let mut host = Self::new();
        host.register(Box::new(ImageControlPlugin::new()));
        host.register(Box::new(KeyRemapPlugin::new()));
        host.register(Box::new(MaestroControlsPlugin::new(base_dir)));
        host
    }

    pub fn register(&mut self, plugin: Box<dyn OverlayPlugin>) {
        if self.get(plugin.name()).is_some() {
            warn!(plugin = plugin.name(), "plugin already registered, ignoring");
            return;
        }
        debug!(plugin = plugin.name(), "plugin registered");
        self.plugins.push(plugin);
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&dyn OverlayPlugin> {
        self.plugins.iter().find(|p| p.name() == name).map(|p| p.as_ref())
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.is_active())
    }

    pub fn buttons(&self) -> Vec<ButtonSpec> {
        self.plugins.iter().flat_map(|p| p.buttons()).collect()
    }

    /// Register every plugin's buttons and run its `initialize`.
    pub fn initialize_all(&mut self, ctx: &mut PluginContext<'_>) {
        for plugin in &mut self.plugins {
            for spec in plugin.buttons() {
                ctx.controls.register(spec);
            }
            plugin.initialize(ctx);
            info!(plugin = plugin.name(), "plugin initialized");
        }
        self.deliver_messages(ctx);
    }

    pub fn dispatch_hook(&mut self, event: &HookEvent, ctx: &mut PluginContext<'_>) {
        for plugin in &mut self.plugins {
            plugin.on_hook_event(event, ctx);
        }
        self.deliver_messages(ctx);
    }

    /// Deliver `command` to the plugin called `target`. False if there is
    /// no such plugin.
    pub fn send(&mut self, target: &str, command: PluginCommand, ctx: &mut PluginContext<'_>) -> bool {
        let delivered = self.deliver(target, command, ctx);
        self.deliver_messages(ctx);
        delivered
    }

    /// A plugin button was clicked.
    pub fn press_button(&mut self, id: &str, ctx: &mut PluginContext<'_>) -> bool {
        let owner = self
            .plugins
            .iter()
            .find(|p| p.buttons().iter().any(|b| b.id == id))
            .map(|p| p.name());
        match owner {
            Some(name) => self.send(name, PluginCommand::Toggle, ctx),
            None => false,
        }
    }

    pub fn cleanup(&mut self) {
        for plugin in &mut self.plugins {
            plugin.cleanup();
            debug!(plugin = plugin.name(), "plugin cleaned up");
        }
    }

    fn deliver(&mut self, target: &str, command: PluginCommand, ctx: &mut PluginContext<'_>) -> bool {
        match self.plugins.iter_mut().find(|p| p.name() == target) {
            Some(plugin) => {
                plugin.handle_command(command, ctx);
                true
            }
            None => {
                warn!(plugin = target, ?command, "command for unknown plugin");
                false
            }
        }
    }

    fn deliver_messages(&mut self, ctx: &mut PluginContext<'_>) {
        for _ in 0..MAX_MESSAGE_ROUNDS {
            let batch: Vec<_> = ctx.messages.drain(..).collect();
            if batch.is_empty() {
                return;
            }
            for (target, command) in batch {
                self.deliver(target, command, ctx);
            }
        }
        warn!(dropped = ctx.messages.len(), "plugin messages kept bouncing, dropping");
        ctx.messages.clear();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use image::RgbaImage;

    use super::*;
    use crate::hooks::testing::RecordingInjector;
    use crate::input::KeyBindings;
    use crate::registry::NamePolicy;

    /// Owns everything a `PluginContext` borrows.
    pub struct Harness {
        pub registry: ImageRegistry,
        pub router: InputRouter,
        pub controls: ControlPanel,
        pub toasts: Toasts,
        pub injector: RecordingInjector,
        pub global_input: bool,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                registry: ImageRegistry::new(),
                router: InputRouter::new(KeyBindings::default()),
                controls: ControlPanel::new(),
                toasts: Toasts::new(),
                injector: RecordingInjector::default(),
                global_input: true,
            }
        }

        pub fn with_active_image() -> Self {
            let mut h = Self::new();
            let t = ImageTransform::new("Arch", RgbaImage::new(10, 10), None);
            let id = h.registry.add(t, NamePolicy::Reject).unwrap();
            h.registry.set_active(&id).unwrap();
            h
        }

        pub fn ctx(&mut self) -> PluginContext<'_> {
            PluginContext::new(
                &mut self.registry,
                &mut self.router,
                &mut self.controls,
                &mut self.toasts,
                &self.injector,
                self.global_input,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::Harness;
    use super::*;
    use crate::input::{Key, Modifiers};

    #[test]
    fn builtin_plugins_register_their_buttons() {
        let mut h = Harness::new();
        let mut host = PluginHost::with_builtin(Path::new("."));
        assert_eq!(host.names(), [IMAGE_CONTROL, KEY_REMAP, MAESTRO_CONTROLS]);
        host.initialize_all(&mut h.ctx());
        let labels: Vec<_> = h.controls.iter().map(|(_, s)| s.label.clone()).collect();
        assert_eq!(labels, ["Img Ctrl", "Remap: ON", "Maestro Controls"]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let mut host = PluginHost::new();
        host.register(Box::new(KeyRemapPlugin::new()));
        host.register(Box::new(KeyRemapPlugin::new()));
        assert_eq!(host.names().len(), 1);
    }

    #[test]
    fn unknown_targets_are_reported() {
        let mut h = Harness::new();
        let mut host = PluginHost::with_builtin(Path::new("."));
        assert!(!host.send("Nope", PluginCommand::Toggle, &mut h.ctx()));
        assert!(!host.press_button("btn_missing", &mut h.ctx()));
    }

    #[test]
    fn enabling_image_control_switches_full_control_off() {
        let dir = tempfile::tempdir().unwrap();
        let coords = dir.path().join("c.txt");
        std::fs::write(&coords, "DistalTip:1,2\n").unwrap();

        let mut h = Harness::with_active_image();
        let mut host = PluginHost::with_builtin(dir.path());
        let mut ctx = h.ctx();
        host.initialize_all(&mut ctx);
        host.send(
            MAESTRO_CONTROLS,
            PluginCommand::ConfigureMaestro { version: 6, source: CoordinateSource::File(coords) },
            &mut ctx,
        );
        assert!(host.is_active(MAESTRO_CONTROLS));

        host.send(IMAGE_CONTROL, PluginCommand::SetEnabled(true), &mut ctx);
        assert!(host.is_active(IMAGE_CONTROL));
        assert!(!host.is_active(MAESTRO_CONTROLS));
        drop(ctx);
        assert_eq!(h.controls.get("btn_full_control").unwrap().label, "FullCtrl");
    }

    #[test]
    fn hook_keys_reach_the_router_only_with_image_control_on() {
        let mut h = Harness::with_active_image();
        let mut host = PluginHost::with_builtin(Path::new("."));
        let press_d = HookEvent::Key(KeyEvent::press(Key::Char('d'), Modifiers::NONE));

        let mut ctx = h.ctx();
        host.initialize_all(&mut ctx);
        host.dispatch_hook(&press_d, &mut ctx);
        assert!(!ctx.needs_redraw());
        host.press_button("btn_toggle_control_mode", &mut ctx);
        host.dispatch_hook(&press_d, &mut ctx);
        assert!(ctx.needs_redraw());
        drop(ctx);
        assert_eq!(h.registry.active().unwrap().offset, (515.0, 512.0));
    }
}
