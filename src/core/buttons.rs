//! Button byte decoding
//! This module turns the raw value of the control characteristic into the set of
//! logical buttons that are currently held.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the eight logical buttons carried in the control byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Button {
    ButtonA,
    ButtonB,
    ButtonSquare,
    ButtonTriangle,
    ButtonUp,
    ButtonDown,
    ButtonLeft,
    ButtonRight,
}

/// Bit of the control byte -> button.
const BUTTON_BITS: [(u8, Button); 8] = [
    (0x01, Button::ButtonA),
    (0x02, Button::ButtonB),
    (0x04, Button::ButtonSquare),
    (0x08, Button::ButtonTriangle),
    (0x10, Button::ButtonUp),
    (0x20, Button::ButtonDown),
    (0x40, Button::ButtonLeft),
    (0x80, Button::ButtonRight),
];

impl Button {
    pub const ALL: [Button; 8] = [
        Button::ButtonA,
        Button::ButtonB,
        Button::ButtonSquare,
        Button::ButtonTriangle,
        Button::ButtonUp,
        Button::ButtonDown,
        Button::ButtonLeft,
        Button::ButtonRight,
    ];

    /// Position of the button in [`Button::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    /// The bit this button occupies in the control byte.
    pub fn mask(self) -> u8 {
        BUTTON_BITS
            .iter()
            .find(|(_, button)| *button == self)
            .map(|(bit, _)| *bit)
            .unwrap_or(0)
    }

    pub fn name(self) -> &'static str {
        match self {
            Button::ButtonA => "button_a",
            Button::ButtonB => "button_b",
            Button::ButtonSquare => "button_square",
            Button::ButtonTriangle => "button_triangle",
            Button::ButtonUp => "button_up",
            Button::ButtonDown => "button_down",
            Button::ButtonLeft => "button_left",
            Button::ButtonRight => "button_right",
        }
    }
}

impl fmt::Display for Button {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of pressed buttons, stored as the same bitmask the peripheral sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ButtonSet(u8);

impl ButtonSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Button::ALL.into_iter().collect()
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn contains(self, button: Button) -> bool {
        self.0 & button.mask() != 0
    }

    pub fn insert(&mut self, button: Button) {
        self.0 |= button.mask();
    }

    pub fn remove(&mut self, button: Button) {
        self.0 &= !button.mask();
    }

    /// Buttons in `self` that are not in `other`.
    pub fn difference(self, other: ButtonSet) -> ButtonSet {
        ButtonSet(self.0 & !other.0)
    }

    /// Iterates the members in bit order.
    pub fn iter(self) -> impl Iterator<Item = Button> {
        Button::ALL.into_iter().filter(move |b| self.contains(*b))
    }
}

impl FromIterator<Button> for ButtonSet {
    fn from_iter<I: IntoIterator<Item = Button>>(iter: I) -> Self {
        let mut set = ButtonSet::empty();
        for button in iter {
            set.insert(button);
        }
        set
    }
}

impl fmt::Display for ButtonSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("{}");
        }
        let names: Vec<&str> = self.iter().map(Button::name).collect();
        write!(f, "{{{}}}", names.join(", "))
    }
}

/// Decodes a raw control value into the set of pressed buttons.
///
/// Only the first byte is interpreted. An empty payload means nothing is pressed,
/// and bits without a mapped button are ignored, so this never fails.
pub fn decode(raw: &[u8]) -> ButtonSet {
    let Some(&state) = raw.first() else {
        return ButtonSet::empty();
    };

    BUTTON_BITS
        .iter()
        .filter(|(bit, _)| state & bit != 0)
        .map(|(_, button)| *button)
        .collect()
}
