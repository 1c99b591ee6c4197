// ============================================================================
// CONTROL PANEL MODEL — caption, indicator and enabled state per button
// ============================================================================
//
// The panel itself is drawn by the app. Plugins and the app only touch this
// model, keyed by a stable button id, so a button can change its caption and
// colour without anyone holding a widget handle.

use std::collections::HashMap;

/// Colour state of a toggle button.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Indicator {
    On,
    Off,
    #[default]
    Neutral,
}

/// A button a plugin contributes to the panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonSpec {
    pub id: &'static str,
    pub label: String,
    pub indicator: Indicator,
}

impl ButtonSpec {
    pub fn new(id: &'static str, label: impl Into<String>, indicator: Indicator) -> Self {
        Self { id, label: label.into(), indicator }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlState {
    pub label: String,
    pub indicator: Indicator,
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub struct ControlPanel {
    controls: HashMap<&'static str, ControlState>,
    /// Registration order, which is also display order.
    order: Vec<&'static str>,
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a button, or reset an existing one to `spec`.
    pub fn register(&mut self, spec: ButtonSpec) {
        if !self.controls.contains_key(spec.id) {
            self.order.push(spec.id);
        }
        self.controls.insert(
            spec.id,
            ControlState { label: spec.label, indicator: spec.indicator, enabled: true },
        );
    }

    pub fn get(&self, id: &str) -> Option<&ControlState> {
        self.controls.get(id)
    }

    /// Change caption and indicator. Unknown ids are ignored.
    pub fn update(&mut self, id: &str, label: impl Into<String>, indicator: Indicator) {
        if let Some(state) = self.controls.get_mut(id) {
            state.label = label.into();
            state.indicator = indicator;
        }
    }

    pub fn set_enabled(&mut self, id: &str, enabled: bool) {
        if let Some(state) = self.controls.get_mut(id) {
            state.enabled = enabled;
        }
    }

    pub fn is_on(&self, id: &str) -> bool {
        self.get(id).is_some_and(|s| s.indicator == Indicator::On)
    }

    /// Buttons in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ControlState)> {
        self.order
            .iter()
            .filter_map(|id| self.controls.get(id).map(|state| (*id, state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_keeps_order_and_reset_replaces() {
        let mut p = ControlPanel::new();
        p.register(ButtonSpec::new("b", "B", Indicator::Off));
        p.register(ButtonSpec::new("a", "A", Indicator::Neutral));
        p.set_enabled("b", false);
        p.register(ButtonSpec::new("b", "B2", Indicator::On));
        let ids: Vec<_> = p.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, ["b", "a"]);
        let b = p.get("b").unwrap();
        assert_eq!(b.label, "B2");
        assert!(b.enabled);
        assert!(p.is_on("b"));
    }

    #[test]
    fn update_ignores_unknown_ids() {
        let mut p = ControlPanel::new();
        p.update("missing", "x", Indicator::On);
        assert!(p.get("missing").is_none());
        assert!(!p.is_on("missing"));
    }
}
