//! System-wide input plumbing.
//!
//! A [`HookSource`] delivers keyboard and mouse-button events from outside
//! the overlay's own windows. Sources run their own threads; the handler they
//! are given only forwards events into an mpsc channel that the GUI thread
//! drains once per frame (see [`channel_handler`]). Nothing else crosses
//! threads.
//!
//! [`InputInjector`] is the other direction: synthetic clicks and key taps
//! sent to whatever application sits under the overlay.

use std::sync::mpsc::{self, Receiver};

use tracing::warn;

use crate::error::{OverlayError, Result};
use crate::input::{Key, KeyEvent, Modifiers, PointerButton};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HookEvent {
    Key(KeyEvent),
    /// Screen coordinates, physical pixels.
    MouseButton {
        pos: (i32, i32),
        button: PointerButton,
        pressed: bool,
    },
}

pub type HookHandler = Box<dyn Fn(HookEvent) + Send + 'static>;

pub trait HookSource {
    /// Start delivering events to `handler`. Replaces any earlier handler.
    fn subscribe(&mut self, handler: HookHandler) -> Result<()>;
    /// Stop delivering events. Safe to call when not subscribed.
    fn unsubscribe(&mut self);
    fn is_subscribed(&self) -> bool;
    /// True when events come from the whole desktop rather than only from
    /// the overlay's own windows.
    fn is_global(&self) -> bool;
}

/// A handler that forwards into a channel and pokes the GUI awake.
pub fn channel_handler<W>(wake: W) -> (HookHandler, Receiver<HookEvent>)
where
    W: Fn() + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handler: HookHandler = Box::new(move |event| {
        if tx.send(event).is_ok() {
            wake();
        }
    });
    (handler, rx)
}

/// Fallback source for platforms without a global hook: nothing arrives
/// through it, and the app routes its own window events instead.
#[derive(Default)]
pub struct LocalHookSource {
    handler: Option<HookHandler>,
}

impl HookSource for LocalHookSource {
    fn subscribe(&mut self, handler: HookHandler) -> Result<()> {
        self.handler = Some(handler);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.handler = None;
    }

    fn is_subscribed(&self) -> bool {
        self.handler.is_some()
    }

    fn is_global(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
//  Modifier state
// ---------------------------------------------------------------------------

/// Folds raw key down/up events into the current modifier state, for sources
/// that only report individual keys.
#[derive(Clone, Copy, Debug, Default)]
pub struct ModifierTracker {
    state: Modifiers,
}

impl ModifierTracker {
    pub const fn new() -> Self {
        Self { state: Modifiers::NONE }
    }

    /// Update from a raw key transition and return the modifiers that apply
    /// to it.
    pub fn observe(&mut self, key: Key, pressed: bool) -> Modifiers {
        match key {
            Key::Shift => self.state.shift = pressed,
            Key::Control => self.state.ctrl = pressed,
            Key::Alt => self.state.alt = pressed,
            _ => {}
        }
        self.state
    }

    pub fn current(&self) -> Modifiers {
        self.state
    }
}

// ---------------------------------------------------------------------------
//  Global hotkeys
// ---------------------------------------------------------------------------

/// Ctrl+Alt+1/2/3.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GlobalHotkey {
    ToggleImageControl,
    ToggleOverlay,
    ToggleFullControl,
}

impl GlobalHotkey {
    pub fn match_event(event: &KeyEvent) -> Option<Self> {
        let m = event.modifiers;
        if !event.pressed || !m.ctrl || !m.alt {
            return None;
        }
        match event.key {
            Key::Digit(1) => Some(GlobalHotkey::ToggleImageControl),
            Key::Digit(2) => Some(GlobalHotkey::ToggleOverlay),
            Key::Digit(3) => Some(GlobalHotkey::ToggleFullControl),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
//  Injection
// ---------------------------------------------------------------------------

pub trait InputInjector {
    /// Move the cursor to `pos` (screen pixels) and click the primary button.
    fn click_at(&self, pos: (i32, i32)) -> Result<()>;
    /// Press and release one key.
    fn tap_key(&self, key: Key) -> Result<()>;
}

/// Injector for platforms with no injection support.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullInjector;

impl InputInjector for NullInjector {
    fn click_at(&self, pos: (i32, i32)) -> Result<()> {
        warn!(x = pos.0, y = pos.1, "click injection unavailable");
        Err(OverlayError::Hook("input injection is not supported on this platform".into()))
    }

    fn tap_key(&self, key: Key) -> Result<()> {
        warn!(key = %key.name(), "key injection unavailable");
        Err(OverlayError::Hook("input injection is not supported on this platform".into()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;

    use super::*;

    #[derive(Clone, Debug, PartialEq)]
    pub enum Injected {
        Click((i32, i32)),
        Tap(Key),
    }

    /// Records what would have been injected.
    #[derive(Default)]
    pub struct RecordingInjector {
        pub log: RefCell<Vec<Injected>>,
    }

    impl InputInjector for RecordingInjector {
        fn click_at(&self, pos: (i32, i32)) -> Result<()> {
            self.log.borrow_mut().push(Injected::Click(pos));
            Ok(())
        }

        fn tap_key(&self, key: Key) -> Result<()> {
            self.log.borrow_mut().push(Injected::Tap(key));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn channel_handler_forwards_and_wakes() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&wakes);
        let (handler, rx) = channel_handler(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let ev = HookEvent::Key(KeyEvent::press(Key::Numpad(8), Modifiers::NONE));
        std::thread::spawn(move || handler(ev)).join().unwrap();
        assert_eq!(rx.try_recv().unwrap(), ev);
        assert_eq!(wakes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tracker_follows_modifier_transitions() {
        let mut t = ModifierTracker::default();
        t.observe(Key::Control, true);
        let m = t.observe(Key::Alt, true);
        assert!(m.ctrl && m.alt && !m.shift);
        t.observe(Key::Control, false);
        assert!(!t.current().ctrl);
        assert_eq!(t.observe(Key::Char('a'), true), t.current());
    }

    #[test]
    fn hotkeys_need_ctrl_and_alt() {
        let both = Modifiers { ctrl: true, alt: true, shift: false };
        let ctrl = Modifiers { ctrl: true, ..Modifiers::NONE };
        assert_eq!(
            GlobalHotkey::match_event(&KeyEvent::press(Key::Digit(2), both)),
            Some(GlobalHotkey::ToggleOverlay)
        );
        assert_eq!(GlobalHotkey::match_event(&KeyEvent::press(Key::Digit(2), ctrl)), None);
        assert_eq!(GlobalHotkey::match_event(&KeyEvent::press(Key::Numpad(1), both)), None);
    }

    #[test]
    fn local_source_tracks_subscription() {
        let mut src = LocalHookSource::default();
        assert!(!src.is_global());
        src.subscribe(Box::new(|_| {})).unwrap();
        assert!(src.is_subscribed());
        src.unsubscribe();
        assert!(!src.is_subscribed());
    }
}
