//! Pressed-key tracking
//! Turns successive button sets into press/release actions so that a key is never
//! pressed twice without a release in between, and never left held.

use log::{debug, warn};
use std::fmt;

use crate::core::buttons::{Button, ButtonSet};
use crate::mapping::InputEmitter;

/// A single key transition sent to the input emitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Press(Button),
    Release(Button),
}

impl KeyAction {
    pub fn button(self) -> Button {
        match self {
            KeyAction::Press(b) | KeyAction::Release(b) => b,
        }
    }
}

impl fmt::Display for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Press(b) => write!(f, "Press({})", b),
            KeyAction::Release(b) => write!(f, "Release({})", b),
        }
    }
}

/// Owns the set of buttons currently held down in the emitted input stream.
pub struct KeyStateTranslator<E: InputEmitter> {
    emitter: E,
    pressed: ButtonSet,
}

impl<E: InputEmitter> KeyStateTranslator<E> {
    pub fn new(emitter: E) -> Self {
        Self {
            emitter,
            pressed: ButtonSet::empty(),
        }
    }

    /// The buttons currently considered held.
    pub fn pressed(&self) -> ButtonSet {
        self.pressed
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    /// Moves the key state to `next`, emitting releases first and then presses.
    ///
    /// Buttons whose membership did not change get no action.
    pub fn apply(&mut self, next: ButtonSet) -> Vec<KeyAction> {
        let to_release = self.pressed.difference(next);
        let to_press = next.difference(self.pressed);

        let actions: Vec<KeyAction> = to_release
            .iter()
            .map(KeyAction::Release)
            .chain(to_press.iter().map(KeyAction::Press))
            .collect();

        for action in &actions {
            self.emit(*action);
        }
        self.pressed = next;
        actions
    }

    /// Releases every held key. Safe to call with nothing held.
    pub fn release_all(&mut self) -> Vec<KeyAction> {
        let actions = self.apply(ButtonSet::empty());
        self.pressed = ButtonSet::empty();
        if !actions.is_empty() {
            debug!("Released all keys: {} action(s)", actions.len());
        }
        actions
    }

    fn emit(&mut self, action: KeyAction) {
        let result = match action {
            KeyAction::Press(button) => self.emitter.press(button),
            KeyAction::Release(button) => self.emitter.release(button),
        };
        match result {
            Ok(()) => debug!("{}", action),
            Err(e) => warn!("Failed to emit {}: {}", action, e),
        }
    }
}
