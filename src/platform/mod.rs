//! Per-OS hook and injection adapters.
//!
//! On Windows the overlay installs low-level keyboard/mouse hooks and injects
//! with `SendInput`. Elsewhere it falls back to its own window events and
//! cannot inject.

use crate::hooks::{HookSource, InputInjector};

#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "windows")]
pub fn default_hook_source() -> Box<dyn HookSource> {
    Box::new(windows::LowLevelHookSource::default())
}

#[cfg(not(target_os = "windows"))]
pub fn default_hook_source() -> Box<dyn HookSource> {
    Box::new(crate::hooks::LocalHookSource::default())
}

#[cfg(target_os = "windows")]
pub fn default_injector() -> Box<dyn InputInjector> {
    Box::new(windows::SendInputInjector)
}

#[cfg(not(target_os = "windows"))]
pub fn default_injector() -> Box<dyn InputInjector> {
    Box::new(crate::hooks::NullInjector)
}
