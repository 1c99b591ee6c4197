// ============================================================================
// IMAGE REGISTRY — the set of loaded images and the single active image
// ============================================================================

use std::collections::HashMap;

use tracing::{debug, info};

use crate::error::{OverlayError, Result};
use crate::image_state::ImageTransform;

/// How [`ImageRegistry::add`] treats an identity that is already taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamePolicy {
    /// Fail with [`OverlayError::DuplicateName`].
    Reject,
    /// Append `_1`, `_2`, … until the name is free.
    Uniquify,
}

/// A bundled arch template shown by a toggle button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PredefinedTemplate {
    /// Button caption.
    pub label: &'static str,
    /// Identity the template is registered under.
    pub key: &'static str,
    /// File name under `<base>/Images/`.
    pub file: &'static str,
}

pub const PREDEFINED_TEMPLATES: &[PredefinedTemplate] = &[
    PredefinedTemplate { label: "Angul",    key: "Angulation",     file: "angulation.svg" },
    PredefinedTemplate { label: "Ruler",    key: "Ruler",          file: "liniar_new_n2.svg" },
    PredefinedTemplate { label: "Normal",   key: "Normal",         file: "Normal(medium).svg" },
    PredefinedTemplate { label: "Tapered",  key: "Tapered",        file: "Tapered.svg" },
    PredefinedTemplate { label: "Ovoide",   key: "Ovoide",         file: "Ovoide.svg" },
    PredefinedTemplate { label: "Narrow T", key: "Narrow Tapered", file: "NarrowTapered.svg" },
    PredefinedTemplate { label: "Narrow O", key: "Narrow Ovoide",  file: "NarrowOvoide.svg" },
];

/// Where a template is placed the first time it is shown, relative to the
/// overlay's centre.
pub const TEMPLATE_CENTER_OFFSET: (f64, f64) = (156.0, 100.0);

pub fn find_template(key: &str) -> Option<&'static PredefinedTemplate> {
    PREDEFINED_TEMPLATES.iter().find(|t| t.key == key)
}

/// Outcome of [`ImageRegistry::toggle_predefined`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredefinedToggle {
    Shown,
    Hidden,
}

/// Loaded images in drawing order, plus the active/previous-active pointers.
///
/// Images are never removed; hiding flips `visible` so the transform
/// survives show/hide cycles.
#[derive(Debug, Default)]
pub struct ImageRegistry {
    images: Vec<ImageTransform>,
    active_identity: Option<String>,
    previous_active_identity: Option<String>,
    /// Predefined template key → currently shown.
    predefined_shown: HashMap<String, bool>,
}

impl ImageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index_of(identity).is_some()
    }

    fn index_of(&self, identity: &str) -> Option<usize> {
        self.images.iter().position(|t| t.identity == identity)
    }

    pub fn get(&self, identity: &str) -> Option<&ImageTransform> {
        self.images.iter().find(|t| t.identity == identity)
    }

    pub fn get_mut(&mut self, identity: &str) -> Option<&mut ImageTransform> {
        self.images.iter_mut().find(|t| t.identity == identity)
    }

    /// Images in drawing order.
    pub fn iter(&self) -> impl Iterator<Item = &ImageTransform> {
        self.images.iter()
    }

    pub fn identities(&self) -> Vec<String> {
        self.images.iter().map(|t| t.identity.clone()).collect()
    }

    pub fn active_identity(&self) -> Option<&str> {
        self.active_identity.as_deref()
    }

    pub fn previous_active_identity(&self) -> Option<&str> {
        self.previous_active_identity.as_deref()
    }

    pub fn active(&self) -> Option<&ImageTransform> {
        self.active_identity.as_deref().and_then(|id| self.get(id))
    }

    pub fn active_mut(&mut self) -> Option<&mut ImageTransform> {
        let id = self.active_identity.clone()?;
        self.get_mut(&id)
    }

    /// First free name of the form `base`, `base_1`, `base_2`, …
    pub fn unique_identity(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        let mut counter = 1usize;
        loop {
            let candidate = format!("{base}_{counter}");
            if !self.contains(&candidate) {
                return candidate;
            }
            counter += 1;
        }
    }

    /// Register a new image. Returns the identity it was stored under.
    pub fn add(&mut self, mut transform: ImageTransform, policy: NamePolicy) -> Result<String> {
        if self.contains(&transform.identity) {
            match policy {
                NamePolicy::Reject => {
                    return Err(OverlayError::DuplicateName(transform.identity));
                }
                NamePolicy::Uniquify => {
                    let renamed = self.unique_identity(&transform.identity);
                    debug!(from = %transform.identity, to = %renamed, "identity collision resolved");
                    transform.identity = renamed;
                }
            }
        }
        let identity = transform.identity.clone();
        self.images.push(transform);
        Ok(identity)
    }

    /// Make `identity` the active image. Other images keep their visibility.
    pub fn set_active(&mut self, identity: &str) -> Result<()> {
        if !self.contains(identity) {
            return Err(OverlayError::NotFound(identity.to_string()));
        }
        self.active_identity = Some(identity.to_string());
        info!(image = identity, "active image changed");
        Ok(())
    }

    /// Flip `visible` on one image. Hiding the active image hands the active
    /// role back to the previously active one, which is made visible again.
    /// A template's shown flag follows its visibility. Returns the new
    /// visibility.
    pub fn toggle_visibility(&mut self, identity: &str) -> Result<bool> {
        let image = self
            .get_mut(identity)
            .ok_or_else(|| OverlayError::NotFound(identity.to_string()))?;
        image.visible = !image.visible;
        let now_visible = image.visible;

        if self.predefined_shown.contains_key(identity) {
            self.predefined_shown.insert(identity.to_string(), now_visible);
        }
        if !now_visible && self.active_identity.as_deref() == Some(identity) {
            self.restore_previous_active(identity);
        }
        Ok(now_visible)
    }

    /// Hand the active role from `hidden` back to the previous active image.
    /// Leaves nothing active when the previous image is `hidden` itself.
    fn restore_previous_active(&mut self, hidden: &str) {
        self.active_identity = self
            .previous_active_identity
            .take()
            .filter(|prev| prev != hidden);
        if let Some(prev) = self.active_identity.clone()
            && let Some(image) = self.get_mut(&prev)
        {
            image.visible = true;
        }
    }

    /// Import a user-picked image: the name is uniquified, the current active
    /// image is hidden and the new one becomes active and visible.
    pub fn import_user(&mut self, transform: ImageTransform) -> Result<String> {
        let identity = self.add(transform, NamePolicy::Uniquify)?;
        if let Some(current) = self.active_mut() {
            current.visible = false;
        }
        if let Some(image) = self.get_mut(&identity) {
            image.visible = true;
        }
        self.active_identity = Some(identity.clone());
        Ok(identity)
    }

    pub fn is_predefined_shown(&self, key: &str) -> bool {
        self.predefined_shown.get(key).copied().unwrap_or(false)
    }

    /// Show or hide a bundled template.
    ///
    /// Showing hides the current active image, remembers it as previous and
    /// activates the template (loading it on first use through `loader`).
    /// Hiding restores the previous active image. A failing `loader` leaves
    /// the registry unchanged.
    pub fn toggle_predefined<F>(&mut self, key: &str, loader: F) -> Result<PredefinedToggle>
    where
        F: FnOnce() -> Result<ImageTransform>,
    {
        if !self.is_predefined_shown(key) {
            let fresh = if self.contains(key) {
                None
            } else {
                let mut loaded = loader()?;
                loaded.identity = key.to_string();
                Some(loaded)
            };

            if let Some(current) = self.active_mut() {
                current.visible = false;
            }
            match fresh {
                Some(loaded) => self.images.push(loaded),
                None => {
                    if let Some(image) = self.get_mut(key) {
                        image.visible = true;
                    }
                }
            }

            self.predefined_shown.insert(key.to_string(), true);
            if let Some(current) = self.active_identity.take()
                && current != key
            {
                self.previous_active_identity = Some(current);
            }
            self.active_identity = Some(key.to_string());
            info!(template = key, "predefined image shown");
            Ok(PredefinedToggle::Shown)
        } else {
            if let Some(image) = self.get_mut(key) {
                image.visible = false;
            }
            self.predefined_shown.insert(key.to_string(), false);
            if self.active_identity.as_deref() == Some(key) {
                self.restore_previous_active(key);
            }
            info!(template = key, "predefined image hidden");
            Ok(PredefinedToggle::Hidden)
        }
    }
}
