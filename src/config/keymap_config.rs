use serde::{Deserialize, Serialize};

use crate::core::buttons::Button;

/// Configuration for button mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeymapConfig {
    /// A button mapping
    pub button_a: Option<String>,
    /// B button mapping
    pub button_b: Option<String>,
    /// Square button mapping
    pub button_square: Option<String>,
    /// Triangle button mapping
    pub button_triangle: Option<String>,
    /// D-pad up mapping
    pub button_up: Option<String>,
    /// D-pad down mapping
    pub button_down: Option<String>,
    /// D-pad left mapping
    pub button_left: Option<String>,
    /// D-pad right mapping
    pub button_right: Option<String>,
}

impl Default for KeymapConfig {
    fn default() -> Self {
        KeymapConfig {
            button_a: Some("space".to_string()),
            button_b: Some("backspace".to_string()),
            button_square: Some("shift".to_string()),
            button_triangle: Some("enter".to_string()),
            button_up: Some("up".to_string()),
            button_down: Some("down".to_string()),
            button_left: Some("left".to_string()),
            button_right: Some("right".to_string()),
        }
    }
}

impl KeymapConfig {
    /// The key name mapped to `button`, if any. Blank names count as unmapped.
    pub fn key_for(&self, button: Button) -> Option<&str> {
        let entry = match button {
            Button::ButtonA => &self.button_a,
            Button::ButtonB => &self.button_b,
            Button::ButtonSquare => &self.button_square,
            Button::ButtonTriangle => &self.button_triangle,
            Button::ButtonUp => &self.button_up,
            Button::ButtonDown => &self.button_down,
            Button::ButtonLeft => &self.button_left,
            Button::ButtonRight => &self.button_right,
        };
        entry.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}
