//! Keyboard output for decoded buttons
//! This module maps logical buttons to OS key events using the enigo library.

use enigo::{Direction, Enigo, Key, Keyboard, Settings};
use log::{debug, error, info};
use std::sync::mpsc as std_mpsc;
use std::thread;
use tokio::sync::mpsc;

use crate::config::keymap_config::KeymapConfig;
use crate::core::buttons::Button;
use crate::error::EmitError;

/// Applies press/release actions to the OS input stream.
pub trait InputEmitter {
    fn press(&mut self, button: Button) -> Result<(), EmitError>;
    fn release(&mut self, button: Button) -> Result<(), EmitError>;
}

/// Parses a key name from the keymap into an enigo key.
pub fn parse_key(name: &str) -> Option<Key> {
    let key = match name.trim().to_lowercase().as_str() {
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "shift" => Key::Shift,
        "enter" | "return" => Key::Return,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "esc" | "escape" => Key::Escape,
        "tab" => Key::Tab,
        "ctrl" | "control" => Key::Control,
        "alt" => Key::Alt,
        "meta" | "super" => Key::Meta,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" => Key::PageUp,
        "pagedown" => Key::PageDown,
        "delete" => Key::Delete,
        "volume_up" => Key::VolumeUp,
        "volume_down" => Key::VolumeDown,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        single => {
            let mut chars = single.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Key::Unicode(c),
                _ => return None,
            }
        }
    };
    Some(key)
}

enum KeyCommand {
    Key(Key, Direction),
}

/// A handle that sends key events to the dedicated keyboard thread.
///
/// The enigo instance is created and used on that thread only.
pub struct KeyboardSender {
    keys: [Option<Key>; 8],
    tx: Option<mpsc::UnboundedSender<KeyCommand>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl KeyboardSender {
    /// Starts the keyboard thread. Fails if the input backend cannot be opened.
    pub fn new(keymap: &KeymapConfig) -> anyhow::Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<KeyCommand>();
        let (ready_tx, ready_rx) = std_mpsc::sync_channel::<Result<(), String>>(1);

        let thread = thread::Builder::new()
            .name("keyboard".into())
            .spawn(move || {
                let mut enigo = match Enigo::new(&Settings::default()) {
                    Ok(enigo) => {
                        let _ = ready_tx.send(Ok(()));
                        enigo
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                info!("Keyboard thread started.");

                while let Some(command) = rx.blocking_recv() {
                    match command {
                        KeyCommand::Key(key, direction) => {
                            if let Err(e) = enigo.key(key, direction) {
                                error!("Failed to send {:?} {:?}: {}", key, direction, e);
                            }
                        }
                    }
                }
                info!("Keyboard thread stopped.");
            })?;

        ready_rx
            .recv()
            .map_err(|_| anyhow::anyhow!("keyboard thread exited during startup"))?
            .map_err(|e| anyhow::anyhow!("failed to open input backend: {}", e))?;

        Ok(Self {
            keys: Self::resolve_keymap(keymap),
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    fn resolve_keymap(keymap: &KeymapConfig) -> [Option<Key>; 8] {
        Button::ALL.map(|button| {
            let name = keymap.key_for(button)?;
            let key = parse_key(name);
            if key.is_none() {
                error!("Unknown key name {:?} for {}", name, button);
            }
            key
        })
    }

    fn send(&self, button: Button, direction: Direction) -> Result<(), EmitError> {
        let key = self.keys[button.index()].ok_or(EmitError::Unmapped(button))?;
        debug!("{:?} {:?} for {}", direction, key, button);
        self.tx
            .as_ref()
            .ok_or(EmitError::ThreadGone)?
            .send(KeyCommand::Key(key, direction))
            .map_err(|_| EmitError::ThreadGone)
    }
}

impl Drop for KeyboardSender {
    /// Lets the keyboard thread drain queued key events before returning.
    fn drop(&mut self) {
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Keyboard thread panicked.");
            }
        }
    }
}

impl InputEmitter for KeyboardSender {
    fn press(&mut self, button: Button) -> Result<(), EmitError> {
        self.send(button, Direction::Press)
    }

    fn release(&mut self, button: Button) -> Result<(), EmitError> {
        self.send(button, Direction::Release)
    }
}
