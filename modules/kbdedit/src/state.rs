//! Editor state, the events that change it, and the reducer.

use tracing::warn;

use crate::keyboard::{KeyKind, Layer, Layout};
use crate::keymap::KeyMap;

#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardState {
    pub layout: Layout,
    pub selected_key: Option<String>,
    pub layer: Layer,
    pub keymap: KeyMap,
    /// Set once the user asked to quit.
    pub done: bool,
}

impl KeyboardState {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            selected_key: None,
            layer: Layer::Default,
            keymap: KeyMap::new(),
            done: false,
        }
    }

    pub fn with_keymap(mut self, keymap: KeyMap) -> Self {
        self.keymap = keymap;
        self
    }

    /// Value of the selected key on `layer`, if a key is selected.
    pub fn selected_value(&self, layer: Layer) -> Option<&str> {
        self.selected_key
            .as_deref()
            .map(|code| self.keymap.get(layer, code))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyboardEvent {
    ToggleShift,
    SetLayer(Layer),
    SetSelectedKey(String),
    SetKeyValue { layer: Layer, value: String },
    Quit,
}

pub fn reduce(mut state: KeyboardState, event: KeyboardEvent) -> KeyboardState {
    match event {
        KeyboardEvent::ToggleShift => {
            state.layer = match state.layer {
                Layer::Default => Layer::Shifted,
                _ => Layer::Default,
            };
        }
        KeyboardEvent::SetLayer(layer) => state.layer = layer,
        KeyboardEvent::SetSelectedKey(code) => match state.layout.kind_of(&code) {
            Some(KeyKind::Normal) => state.selected_key = Some(code),
            Some(KeyKind::Shift) => {
                warn!(key = %code, "Shift keys hold no value, selection unchanged");
            }
            None => {
                warn!(key = %code, layout = %state.layout, "Unknown key, selection unchanged");
            }
        },
        KeyboardEvent::SetKeyValue { layer, value } => match &state.selected_key {
            Some(code) => {
                let code = code.clone();
                state.keymap.set(layer, code, value);
            }
            None => warn!(%layer, "No key selected, value dropped"),
        },
        KeyboardEvent::Quit => state.done = true,
    }
    state
}
