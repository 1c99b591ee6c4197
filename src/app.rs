// ============================================================================
// ORTHY APP — control panel (root viewport) + tracing overlay (immediate viewport)
// ============================================================================
//
// The root window is the narrow, always-on-top control panel. The overlay is
// a second, undecorated and transparent viewport covering the screen; it is
// only shown while `overlay_visible` is set and is click-through unless image
// control or pivot picking needs the mouse.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

use eframe::egui;
use tracing::{debug, info, warn};

use crate::compositor::{RenderCache, RenderedImage};
use crate::controls::{ControlPanel, Indicator};
use crate::coords::{self, MAESTRO_VERSIONS};
use crate::error::OverlayError;
use crate::hooks::{self, GlobalHotkey, HookEvent, HookSource, InputInjector, LocalHookSource};
use crate::image_state::OpacityLevel;
use crate::input::{
    InputRouter, Key, KeyEvent, Modifiers, OverlayAction, PointerButton, PointerEvent, Routed,
    WheelDelta,
};
use crate::io::{self, LoadedAsset};
use crate::notify::{ToastLevel, Toasts};
use crate::platform;
use crate::plugins::{
    CoordinateSource, HostRequest, PluginCommand, PluginContext, PluginHost, IMAGE_CONTROL,
    MAESTRO_CONTROLS,
};
use crate::registry::{self, ImageRegistry, PredefinedToggle, PREDEFINED_TEMPLATES};
use crate::settings::OverlaySettings;

/// Used until the monitor size is known.
const FALLBACK_OVERLAY_SIZE: egui::Vec2 = egui::vec2(1024.0, 1024.0);
const PANEL_HEIGHT: f32 = 620.0;
const BUTTON_HEIGHT: f32 = 20.0;
const PIVOT_MARKER_RADIUS: f32 = 1.5;

const INDICATOR_ON: egui::Color32 = egui::Color32::from_rgb(0x5c, 0xb8, 0x5c);
const INDICATOR_OFF: egui::Color32 = egui::Color32::from_rgb(0xd9, 0x53, 0x4f);

fn overlay_viewport_id() -> egui::ViewportId {
    egui::ViewportId::from_hash_of("orthy_overlay")
}

fn dialog_viewport_id() -> egui::ViewportId {
    egui::ViewportId::from_hash_of("orthy_dialog")
}

// ============================================================================
// DIALOGS
// ============================================================================

/// At most one small modal window at a time.
enum Dialog {
    /// Name a freshly loaded user image.
    ImportName { asset: LoadedAsset, name: String },
    /// Choose Maestro version and where the control positions come from.
    MaestroSetup { version: u8 },
    /// Keep the positions captured for `version`?
    SaveCoordinates { version: u8 },
}

impl Dialog {
    fn title(&self) -> &'static str {
        match self {
            Dialog::ImportName { .. } => "Image Name",
            Dialog::MaestroSetup { .. } => "Maestro Setup",
            Dialog::SaveCoordinates { .. } => "Save Coordinates",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DialogAction {
    None,
    Confirm,
    Cancel,
    Capture,
    PickFile,
}

/// Something the control panel asked for during this frame.
#[derive(Clone, Debug, PartialEq)]
enum PanelAction {
    Load,
    Export,
    ToggleOverlay,
    Transform(OverlayAction),
    Template(&'static str),
    Select(String),
    HideActive,
    Plugin(&'static str),
}

// ============================================================================
// APP
// ============================================================================

pub struct OrthyApp {
    settings: OverlaySettings,
    base_dir: PathBuf,
    registry: ImageRegistry,
    router: InputRouter,
    controls: ControlPanel,
    toasts: Toasts,
    plugins: PluginHost,

    hook_source: Box<dyn HookSource>,
    hook_rx: Option<Receiver<HookEvent>>,
    injector: Box<dyn InputInjector>,

    cache: RenderCache,
    textures: HashMap<String, egui::TextureHandle>,

    overlay_visible: bool,
    /// Overlay forced hidden while Maestro positions are captured.
    overlay_suppressed: bool,
    panel_placed: bool,
    dialog: Option<Dialog>,
    shut_down: bool,
}

impl OrthyApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: OverlaySettings) -> Self {
        let base_dir = io::base_dir(settings.base_dir.as_deref());
        info!(base = %base_dir.display(), "base directory");

        let mut toasts = Toasts::new();
        let mut hook_source = platform::default_hook_source();
        let repaint = cc.egui_ctx.clone();
        let (handler, rx) = hooks::channel_handler(move || repaint.request_repaint());
        let hook_rx = match hook_source.subscribe(handler) {
            Ok(()) => {
                info!(global = hook_source.is_global(), "input hooks installed");
                Some(rx)
            }
            Err(e) => {
                warn!(error = %e, "falling back to overlay-local input");
                toasts.error(&e);
                hook_source = Box::new(LocalHookSource::default());
                None
            }
        };

        let mut app = Self {
            router: InputRouter::new(settings.keybindings.clone()),
            cache: RenderCache::new(settings.interpolation),
            plugins: PluginHost::with_builtin(&base_dir),
            registry: ImageRegistry::new(),
            controls: ControlPanel::new(),
            toasts,
            hook_source,
            hook_rx,
            injector: platform::default_injector(),
            textures: HashMap::new(),
            overlay_visible: false,
            overlay_suppressed: false,
            panel_placed: false,
            dialog: None,
            shut_down: false,
            base_dir,
            settings,
        };
        app.run_plugins(|host, ctx| host.initialize_all(ctx));
        app
    }

    /// Hook events cover the whole desktop, not just our windows.
    fn global_input(&self) -> bool {
        self.hook_source.is_subscribed() && self.hook_source.is_global()
    }

    /// Lend the plugins a context, then act on what they asked of the host.
    fn run_plugins<R>(&mut self, f: impl FnOnce(&mut PluginHost, &mut PluginContext<'_>) -> R) -> R {
        let global_input = self.global_input();
        let mut ctx = PluginContext::new(
            &mut self.registry,
            &mut self.router,
            &mut self.controls,
            &mut self.toasts,
            self.injector.as_ref(),
            global_input,
        );
        let out = f(&mut self.plugins, &mut ctx);
        let requests = ctx.take_requests();
        self.handle_requests(requests);
        out
    }

    fn send_to_plugin(&mut self, target: &'static str, command: PluginCommand) {
        self.run_plugins(|host, ctx| host.send(target, command, ctx));
    }

    fn handle_requests(&mut self, requests: Vec<HostRequest>) {
        for request in requests {
            debug!(?request, "host request");
            match request {
                HostRequest::ToggleOverlay => self.toggle_overlay(),
                HostRequest::SetWindowsHidden(hidden) => self.overlay_suppressed = hidden,
                HostRequest::ChooseMaestroSetup => {
                    self.open_dialog(Dialog::MaestroSetup { version: self.settings.default_maestro_version })
                }
                HostRequest::OfferSaveCoordinates { version } => {
                    self.open_dialog(Dialog::SaveCoordinates { version })
                }
            }
        }
    }

    fn open_dialog(&mut self, dialog: Dialog) {
        if let Some(previous) = &self.dialog {
            debug!(replaced = previous.title(), "dialog replaced");
        }
        self.dialog = Some(dialog);
    }

    fn report(&mut self, err: &OverlayError) {
        warn!(error = %err, "operation failed");
        self.toasts.error(err);
    }

    fn toggle_overlay(&mut self) {
        self.overlay_visible = !self.overlay_visible;
        info!(visible = self.overlay_visible, "overlay toggled");
    }

    fn show_overlay(&mut self) {
        if !self.overlay_visible {
            self.overlay_visible = true;
            info!("overlay shown");
        }
    }

    // ------------------------------------------------------------------
    //  Input
    // ------------------------------------------------------------------

    fn drain_hook_events(&mut self) {
        let Some(rx) = &self.hook_rx else { return };
        let events: Vec<HookEvent> = rx.try_iter().collect();
        for event in events {
            self.handle_hook_event(event);
        }
    }

    fn handle_hook_event(&mut self, event: HookEvent) {
        if let HookEvent::Key(key) = &event
            && let Some(hotkey) = GlobalHotkey::match_event(key)
        {
            self.run_hotkey(hotkey);
            return;
        }
        self.run_plugins(|host, ctx| host.dispatch_hook(&event, ctx));
    }

    fn run_hotkey(&mut self, hotkey: GlobalHotkey) {
        debug!(?hotkey, "hotkey");
        match hotkey {
            GlobalHotkey::ToggleImageControl => self.send_to_plugin(IMAGE_CONTROL, PluginCommand::Toggle),
            GlobalHotkey::ToggleOverlay => self.toggle_overlay(),
            GlobalHotkey::ToggleFullControl => self.send_to_plugin(MAESTRO_CONTROLS, PluginCommand::Toggle),
        }
    }

    /// Without a desktop-wide hook our own windows' keys stand in for it.
    fn forward_local_keys(&mut self, events: &[egui::Event]) {
        if self.global_input() {
            return;
        }
        for event in events {
            if let egui::Event::Key { key, pressed, repeat: false, modifiers } = event
                && let Some(key) = key_from_egui(*key)
            {
                let event = KeyEvent { key, pressed: *pressed, modifiers: modifiers_from_egui(*modifiers) };
                self.handle_hook_event(HookEvent::Key(event));
            }
        }
    }

    fn route_overlay_events(&mut self, events: &[egui::Event], modifiers: egui::Modifiers) -> Routed {
        let mut routed = Routed::default();
        for event in events {
            let step = match event {
                egui::Event::PointerButton { pos, button, pressed, .. } => {
                    let Some(button) = button_from_egui(*button) else { continue };
                    let pos = (pos.x as f64, pos.y as f64);
                    let pointer = if *pressed {
                        PointerEvent::Down { button, pos }
                    } else {
                        PointerEvent::Up { button, pos }
                    };
                    self.router.handle_pointer(&mut self.registry, pointer)
                }
                egui::Event::PointerMoved(pos) => self.router.handle_pointer(
                    &mut self.registry,
                    PointerEvent::Moved {
                        pos: (pos.x as f64, pos.y as f64),
                        modifiers: modifiers_from_egui(modifiers),
                    },
                ),
                egui::Event::MouseWheel { unit, delta, .. } => {
                    let delta = match unit {
                        egui::MouseWheelUnit::Point => WheelDelta::Points(delta.y as f64),
                        egui::MouseWheelUnit::Line | egui::MouseWheelUnit::Page => {
                            WheelDelta::Detents(delta.y as f64)
                        }
                    };
                    self.router.handle_wheel(&mut self.registry, delta)
                }
                _ => continue,
            };
            routed = routed.merge(step);
        }
        routed
    }

    // ------------------------------------------------------------------
    //  Panel actions
    // ------------------------------------------------------------------

    fn apply_panel_action(&mut self, action: PanelAction) {
        debug!(?action, "panel action");
        match action {
            PanelAction::Load => self.begin_import(),
            PanelAction::Export => self.export_active(),
            PanelAction::ToggleOverlay => self.toggle_overlay(),
            PanelAction::Transform(action) => {
                if self.registry.active().is_none() {
                    self.toasts.warn("No Image", "Load or show an image first");
                    return;
                }
                self.router.apply_action(&mut self.registry, action, false);
            }
            PanelAction::Template(key) => self.toggle_template(key),
            PanelAction::Select(identity) => self.select_image(&identity),
            PanelAction::HideActive => {
                let Some(identity) = self.registry.active_identity().map(str::to_owned) else { return };
                match self.registry.toggle_visibility(&identity) {
                    Ok(_) => {
                        if self.registry.active().is_none() {
                            self.send_to_plugin(IMAGE_CONTROL, PluginCommand::SetEnabled(false));
                        }
                    }
                    Err(e) => self.report(&e),
                }
            }
            PanelAction::Plugin(id) => {
                if !self.run_plugins(|host, ctx| host.press_button(id, ctx)) {
                    warn!(button = id, "button has no owning plugin");
                }
            }
        }
    }

    fn begin_import(&mut self) {
        let dir = io::arch_saves_dir(&self.base_dir);
        let Some(path) = io::pick_image_file(&dir) else { return };
        match io::load_asset(&path) {
            Ok(asset) => {
                let name = asset.name.clone();
                self.open_dialog(Dialog::ImportName { asset, name });
            }
            Err(e) => self.report(&e),
        }
    }

    /// Returns the asset when the name was rejected, so the dialog stays open.
    fn finish_import(&mut self, asset: LoadedAsset, name: &str) -> Option<LoadedAsset> {
        let name = name.trim();
        if name.is_empty() {
            self.toasts.warn("Name Required", "Please enter a name for the image.");
            return Some(asset);
        }
        let mut transform = asset.into_transform(name);
        transform.offset = self.router.canvas_center();
        match self.registry.import_user(transform) {
            Ok(identity) => {
                info!(image = %identity, "user image imported");
                self.send_to_plugin(IMAGE_CONTROL, PluginCommand::SetEnabled(true));
                self.show_overlay();
            }
            Err(e) => self.report(&e),
        }
        None
    }

    fn export_active(&mut self) {
        let Some(active) = self.registry.active() else {
            self.toasts.warn("No Image", "Nothing to export");
            return;
        };
        let dir = io::arch_saves_dir(&self.base_dir);
        let Some(path) = io::pick_export_path(&dir, active) else { return };
        match io::export_image(active, &path) {
            Ok((kind, written)) => {
                info!(path = %written.display(), format = kind.extension(), "image exported");
                self.toasts.info("Exported", format!("Saved to {}", written.display()));
            }
            Err(e) => self.report(&e),
        }
    }

    fn toggle_template(&mut self, key: &'static str) {
        let Some(template) = registry::find_template(key) else {
            warn!(template = key, "unknown template");
            return;
        };
        let was_active = self.registry.active_identity() == Some(key);
        let base = self.base_dir.clone();
        let center = self.router.canvas_center();
        match self
            .registry
            .toggle_predefined(key, || io::load_template(&base, template, center))
        {
            Ok(PredefinedToggle::Shown) => {
                info!(template = key, "template shown");
                self.send_to_plugin(IMAGE_CONTROL, PluginCommand::SetEnabled(true));
                self.show_overlay();
            }
            Ok(PredefinedToggle::Hidden) => {
                info!(template = key, "template hidden");
                if was_active {
                    self.send_to_plugin(IMAGE_CONTROL, PluginCommand::SetEnabled(false));
                }
            }
            Err(e) => self.report(&e),
        }
    }

    fn select_image(&mut self, identity: &str) {
        if let Err(e) = self.registry.set_active(identity) {
            self.report(&e);
            return;
        }
        let hidden = self.registry.get(identity).is_some_and(|t| !t.visible);
        if hidden && let Err(e) = self.registry.toggle_visibility(identity) {
            self.report(&e);
        }
    }

    fn apply_dialog_action(&mut self, dialog: Dialog, action: DialogAction) {
        match (dialog, action) {
            (dialog, DialogAction::None) => self.dialog = Some(dialog),
            (dialog, DialogAction::Cancel) => debug!(dialog = dialog.title(), "dialog cancelled"),
            (Dialog::ImportName { asset, name }, DialogAction::Confirm) => {
                if let Some(asset) = self.finish_import(asset, &name) {
                    self.dialog = Some(Dialog::ImportName { asset, name });
                }
            }
            (Dialog::MaestroSetup { version }, DialogAction::Capture) => {
                self.settings.default_maestro_version = version;
                self.send_to_plugin(
                    MAESTRO_CONTROLS,
                    PluginCommand::ConfigureMaestro { version, source: CoordinateSource::Capture },
                );
            }
            (Dialog::MaestroSetup { version }, DialogAction::PickFile) => {
                self.settings.default_maestro_version = version;
                let Some(path) = io::pick_coordinates_file(&self.base_dir) else {
                    self.dialog = Some(Dialog::MaestroSetup { version });
                    return;
                };
                self.send_to_plugin(
                    MAESTRO_CONTROLS,
                    PluginCommand::ConfigureMaestro { version, source: CoordinateSource::File(path) },
                );
            }
            (Dialog::SaveCoordinates { .. }, DialogAction::Confirm) => {
                self.send_to_plugin(MAESTRO_CONTROLS, PluginCommand::SaveCoordinates);
            }
            (dialog, action) => {
                debug!(dialog = dialog.title(), ?action, "action does not apply");
                self.dialog = Some(dialog);
            }
        }
    }

    // ------------------------------------------------------------------
    //  Windows
    // ------------------------------------------------------------------

    fn overlay_size(&self, ctx: &egui::Context) -> egui::Vec2 {
        if let Some((w, h)) = self.settings.overlay_size {
            return egui::vec2(w as f32, h as f32);
        }
        ctx.input(|i| i.viewport().monitor_size).unwrap_or(FALLBACK_OVERLAY_SIZE)
    }

    /// Pin the control panel to the top-right corner once the monitor is known.
    fn place_panel(&mut self, ctx: &egui::Context) {
        if self.panel_placed {
            return;
        }
        let Some(monitor) = ctx.input(|i| i.viewport().monitor_size) else { return };
        let x = monitor.x - self.settings.panel_width - self.settings.panel_margin_right;
        let pos = egui::pos2(x.max(0.0), self.settings.panel_margin_top);
        ctx.send_viewport_cmd(egui::ViewportCommand::OuterPosition(pos));
        self.panel_placed = true;
        debug!(x = pos.x, y = pos.y, "control panel placed");
    }

    fn show_overlay_viewport(&mut self, ctx: &egui::Context) {
        if !self.overlay_visible || self.overlay_suppressed {
            return;
        }
        let size = self.overlay_size(ctx);
        self.router.set_canvas_center(((size.x / 2.0) as f64, (size.y / 2.0) as f64));

        let interactive = self.plugins.is_active(IMAGE_CONTROL) || self.router.is_pivot_pick();
        let builder = egui::ViewportBuilder::default()
            .with_title("Orthy Overlay")
            .with_decorations(false)
            .with_transparent(true)
            .with_always_on_top()
            .with_resizable(false)
            .with_position([0.0, 0.0])
            .with_inner_size(size)
            .with_mouse_passthrough(!interactive);

        ctx.show_viewport_immediate(overlay_viewport_id(), builder, |ctx, _class| {
            self.overlay_ui(ctx);
        });
    }

    fn overlay_ui(&mut self, ctx: &egui::Context) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.overlay_visible = false;
            return;
        }

        let (events, modifiers) = ctx.input(|i| (i.events.clone(), i.modifiers));
        let routed = self.route_overlay_events(&events, modifiers);
        if routed.defocus {
            self.send_to_plugin(IMAGE_CONTROL, PluginCommand::SetEnabled(false));
        }
        self.forward_local_keys(&events);

        let frame = self.cache.compose(&self.registry);
        self.sync_textures(ctx, &frame);

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let painter = ui.painter();
                let uv = egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
                for image in &frame {
                    let Some(texture) = self.textures.get(&image.identity) else { continue };
                    let (x, y) = image.top_left();
                    let size = egui::vec2(image.pixels.width() as f32, image.pixels.height() as f32);
                    let rect = egui::Rect::from_min_size(egui::pos2(x as f32, y as f32), size);
                    painter.image(texture.id(), rect, uv, egui::Color32::WHITE);
                    if let Some((px, py)) = image.pivot_marker {
                        painter.circle_filled(
                            egui::pos2(px as f32, py as f32),
                            PIVOT_MARKER_RADIUS,
                            egui::Color32::RED,
                        );
                    }
                }
            });
    }

    /// Upload re-rendered images and drop textures of hidden ones.
    fn sync_textures(&mut self, ctx: &egui::Context, frame: &[RenderedImage]) {
        self.textures
            .retain(|identity, _| frame.iter().any(|image| &image.identity == identity));
        for image in frame {
            match self.textures.get_mut(&image.identity) {
                Some(_) if !image.fresh => {}
                Some(texture) => texture.set(color_image(image), egui::TextureOptions::LINEAR),
                None => {
                    let texture = ctx.load_texture(
                        format!("overlay-{}", image.identity),
                        color_image(image),
                        egui::TextureOptions::LINEAR,
                    );
                    self.textures.insert(image.identity.clone(), texture);
                }
            }
        }
    }

    fn show_dialog_viewport(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.dialog.take() else { return };
        let builder = egui::ViewportBuilder::default()
            .with_title(dialog.title())
            .with_inner_size([300.0, 150.0])
            .with_resizable(false)
            .with_always_on_top();

        let action = ctx.show_viewport_immediate(dialog_viewport_id(), builder, |ctx, _class| {
            if ctx.input(|i| i.viewport().close_requested()) {
                return DialogAction::Cancel;
            }
            egui::CentralPanel::default()
                .show(ctx, |ui| dialog_ui(ui, &mut dialog))
                .inner
        });
        self.apply_dialog_action(dialog, action);
    }

    fn panel_ui(&self, ui: &mut egui::Ui) -> Vec<PanelAction> {
        let mut actions = Vec::new();
        let width = ui.available_width();
        let active = self.registry.active();

        if panel_button(ui, width, "Load", Indicator::Neutral) {
            actions.push(PanelAction::Load);
        }
        if panel_button(ui, width, "Export", Indicator::Neutral) {
            actions.push(PanelAction::Export);
        }
        let overlay_label = if self.overlay_visible { "Hide" } else { "Show" };
        if panel_button(ui, width, overlay_label, Indicator::Neutral) {
            actions.push(PanelAction::ToggleOverlay);
        }
        let transp_label = match active.map(|t| t.opacity_level()) {
            Some(OpacityLevel::Max) => "Min Transp",
            _ => "Max Transp",
        };
        if panel_button(ui, width, transp_label, Indicator::Neutral) {
            actions.push(PanelAction::Transform(OverlayAction::ToggleOpacity));
        }

        ui.separator();
        use OverlayAction::*;
        for action in [
            FlipHorizontal, FlipVertical, TogglePivotMode,
            ZoomIn, ZoomOut, FineZoomIn, FineZoomOut,
            RotateClockwise, RotateCounterClockwise, Reset,
        ] {
            let indicator = if action == TogglePivotMode && self.router.is_pivot_pick() {
                Indicator::On
            } else {
                Indicator::Neutral
            };
            if panel_button(ui, width, action.label(), indicator) {
                actions.push(PanelAction::Transform(action));
            }
        }

        ui.separator();
        let selected = self.registry.active_identity().unwrap_or("None");
        egui::ComboBox::from_id_source("active_image")
            .width(width - 8.0)
            .selected_text(selected)
            .show_ui(ui, |ui| {
                for identity in self.registry.identities() {
                    if ui.selectable_label(identity == selected, &identity).clicked() {
                        actions.push(PanelAction::Select(identity));
                    }
                }
            });
        if active.is_some() && panel_button(ui, width, "Hide Img", Indicator::Neutral) {
            actions.push(PanelAction::HideActive);
        }

        ui.separator();
        for template in PREDEFINED_TEMPLATES {
            let indicator = if self.registry.is_predefined_shown(template.key) {
                Indicator::On
            } else {
                Indicator::Neutral
            };
            if panel_button(ui, width, template.label, indicator) {
                actions.push(PanelAction::Template(template.key));
            }
        }

        ui.separator();
        for (id, state) in self.controls.iter() {
            let clicked = ui
                .add_enabled_ui(state.enabled, |ui| panel_button(ui, width, &state.label, state.indicator))
                .inner;
            if clicked {
                actions.push(PanelAction::Plugin(id));
            }
        }

        if !self.toasts.is_empty() {
            ui.separator();
            for toast in self.toasts.iter() {
                let color = match toast.level {
                    ToastLevel::Info => ui.visuals().text_color(),
                    ToastLevel::Warning => ui.visuals().warn_fg_color,
                    ToastLevel::Error => ui.visuals().error_fg_color,
                };
                ui.label(egui::RichText::new(&toast.title).strong().color(color));
                ui.label(egui::RichText::new(&toast.message).small());
            }
        }
        actions
    }

    /// Plugin cleanup, hook removal and settings save. Runs once.
    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.plugins.cleanup();
        self.hook_source.unsubscribe();
        self.hook_rx = None;
        self.settings.save();
        info!("=== Orthy session ended ===");
    }
}

impl Drop for OrthyApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl eframe::App for OrthyApp {
    fn clear_color(&self, _visuals: &egui::Visuals) -> [f32; 4] {
        // The overlay viewport must stay see-through where nothing is drawn.
        [0.0, 0.0, 0.0, 0.0]
    }

    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if ctx.input(|i| i.viewport().close_requested()) {
            self.shutdown();
            return;
        }
        self.place_panel(ctx);
        self.drain_hook_events();
        let events = ctx.input(|i| i.events.clone());
        self.forward_local_keys(&events);

        self.show_overlay_viewport(ctx);
        self.show_dialog_viewport(ctx);

        let actions = egui::CentralPanel::default()
            .show(ctx, |ui| {
                egui::ScrollArea::vertical()
                    .show(ui, |ui| self.panel_ui(ui))
                    .inner
            })
            .inner;
        for action in actions {
            self.apply_panel_action(action);
        }

        if self.toasts.prune(Instant::now()) {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

// ============================================================================
// HELPERS
// ============================================================================

pub fn panel_size(settings: &OverlaySettings) -> egui::Vec2 {
    egui::vec2(settings.panel_width, PANEL_HEIGHT)
}

fn panel_button(ui: &mut egui::Ui, width: f32, label: &str, indicator: Indicator) -> bool {
    let mut button = egui::Button::new(label);
    match indicator {
        Indicator::On => button = button.fill(INDICATOR_ON),
        Indicator::Off => button = button.fill(INDICATOR_OFF),
        Indicator::Neutral => {}
    }
    ui.add_sized([width, BUTTON_HEIGHT], button).clicked()
}

fn dialog_ui(ui: &mut egui::Ui, dialog: &mut Dialog) -> DialogAction {
    let mut action = DialogAction::None;
    match dialog {
        Dialog::ImportName { name, .. } => {
            ui.label("Enter a name for the image:");
            let edit = ui.text_edit_singleline(name);
            if edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                action = DialogAction::Confirm;
            }
            ui.horizontal(|ui| {
                if ui.button("OK").clicked() {
                    action = DialogAction::Confirm;
                }
                if ui.button("Cancel").clicked() {
                    action = DialogAction::Cancel;
                }
            });
        }
        Dialog::MaestroSetup { version } => {
            ui.label("Maestro version:");
            ui.horizontal(|ui| {
                for v in MAESTRO_VERSIONS {
                    ui.radio_value(version, v, format!("Maestro {v}"));
                }
            });
            ui.label("Control positions:");
            ui.horizontal(|ui| {
                if ui.button("Capture").clicked() {
                    action = DialogAction::Capture;
                }
                if ui.button("From File...").clicked() {
                    action = DialogAction::PickFile;
                }
                if ui.button("Cancel").clicked() {
                    action = DialogAction::Cancel;
                }
            });
        }
        Dialog::SaveCoordinates { version } => {
            ui.label(format!("Save the captured positions to {}?", coords::coords_file_name(*version)));
            ui.horizontal(|ui| {
                if ui.button("Yes").clicked() {
                    action = DialogAction::Confirm;
                }
                if ui.button("No").clicked() {
                    action = DialogAction::Cancel;
                }
            });
        }
    }
    action
}

fn color_image(image: &RenderedImage) -> egui::ColorImage {
    let size = [image.pixels.width() as usize, image.pixels.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, image.pixels.as_raw())
}

fn key_from_egui(key: egui::Key) -> Option<Key> {
    match key {
        egui::Key::ArrowUp => Some(Key::Up),
        egui::Key::ArrowDown => Some(Key::Down),
        egui::Key::ArrowLeft => Some(Key::Left),
        egui::Key::ArrowRight => Some(Key::Right),
        egui::Key::Escape => Some(Key::Escape),
        // Letters and top-row digits share their names
        other => Key::from_name(other.name()),
    }
}

fn modifiers_from_egui(m: egui::Modifiers) -> Modifiers {
    Modifiers { ctrl: m.ctrl, shift: m.shift, alt: m.alt }
}

fn button_from_egui(button: egui::PointerButton) -> Option<PointerButton> {
    match button {
        egui::PointerButton::Primary => Some(PointerButton::Primary),
        egui::PointerButton::Secondary => Some(PointerButton::Secondary),
        egui::PointerButton::Middle => Some(PointerButton::Middle),
        egui::PointerButton::Extra1 | egui::PointerButton::Extra2 => None,
    }
}
