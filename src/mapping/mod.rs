//! Mapping of decoded controller input onto the OS input stream.

pub mod keyboard;

pub use keyboard::{InputEmitter, KeyboardSender};
