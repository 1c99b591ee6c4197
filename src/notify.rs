//! Non-blocking notifications shown in a corner of the control panel.
//!
//! Errors caught at an operation boundary end up here instead of in modal
//! dialogs, so a failed load never stalls the overlay.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::OverlayError;

const INFO_TTL: Duration = Duration::from_secs(4);
const ERROR_TTL: Duration = Duration::from_secs(8);
const MAX_TOASTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    expires: Instant,
}

impl Toast {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires
    }
}

#[derive(Debug, Default)]
pub struct Toasts {
    queue: VecDeque<Toast>,
}

impl Toasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: ToastLevel, title: impl Into<String>, message: impl Into<String>) {
        self.push_at(Instant::now(), level, title.into(), message.into());
    }

    fn push_at(&mut self, now: Instant, level: ToastLevel, title: String, message: String) {
        let ttl = if level == ToastLevel::Info { INFO_TTL } else { ERROR_TTL };
        // Oldest goes first when full
        while self.queue.len() >= MAX_TOASTS {
            self.queue.pop_front();
        }
        self.queue.push_back(Toast { level, title, message, expires: now + ttl });
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(ToastLevel::Info, title, message);
    }

    pub fn warn(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(ToastLevel::Warning, title, message);
    }

    pub fn error(&mut self, err: &OverlayError) {
        self.push(ToastLevel::Error, err.title(), err.to_string());
    }

    /// Drop expired toasts. Returns true while any remain, so the caller
    /// knows to keep repainting.
    pub fn prune(&mut self, now: Instant) -> bool {
        self.queue.retain(|t| !t.is_expired(now));
        !self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.queue.iter()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
