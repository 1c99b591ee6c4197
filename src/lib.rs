//! Orthy: a transparent, always-on-top tracing overlay for orthodontic
//! arch-wire work.
//!
//! The core is GUI-free: [`image_state`] holds one image's geometry,
//! [`registry`] the loaded images and which one is active, [`compositor`]
//! renders them, and [`input`] turns pointer and key events into transform
//! changes. [`app`] wraps that in an eframe window pair, and [`plugins`]
//! extend the control surface.

pub mod app;
pub mod cli;
pub mod compositor;
pub mod controls;
pub mod coords;
pub mod error;
pub mod hooks;
pub mod image_state;
pub mod input;
pub mod io;
pub mod logger;
pub mod notify;
pub mod ops;
pub mod platform;
pub mod plugins;
pub mod registry;
pub mod settings;

pub use error::{OverlayError, Result};
