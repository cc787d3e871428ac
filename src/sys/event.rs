use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::sys::geometry::Point;

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    /// Top-row digit `0..=9`.
    Digit(u8),
    /// Numeric keypad digit `0..=9`.
    Numpad(u8),
    Escape,
    F4,
    Tab,
    Other(u32),
}

impl Key {
    /// Decodes a Windows-style virtual key code.
    pub fn from_virtual_key(vk: u32) -> Key {
        match vk {
            0x30..=0x39 => Key::Digit((vk - 0x30) as u8),
            0x60..=0x69 => Key::Numpad((vk - 0x60) as u8),
            0x1B => Key::Escape,
            0x73 => Key::F4,
            0x09 => Key::Tab,
            other => Key::Other(other),
        }
    }

    /// Digit value for both the top row and the keypad.
    pub fn digit(self) -> Option<u8> {
        match self {
            Key::Digit(d) | Key::Numpad(d) if d <= 9 => Some(d),
            _ => None,
        }
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CONTROL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Down,
    Up,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    #[serde(default)]
    pub modifiers: Modifiers,
    /// Synthesized by software rather than a physical device.
    #[serde(default)]
    pub injected: bool,
}

impl KeyEvent {
    pub fn down(key: Key) -> Self {
        KeyEvent { key, state: KeyState::Down, modifiers: Modifiers::empty(), injected: false }
    }

    pub fn up(key: Key) -> Self { KeyEvent { state: KeyState::Up, ..KeyEvent::down(key) } }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseAction {
    Move,
    Down(MouseButton),
    Up(MouseButton),
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub struct MouseEvent {
    pub point: Point,
    pub action: MouseAction,
}

impl MouseEvent {
    pub fn moved(point: Point) -> Self { MouseEvent { point, action: MouseAction::Move } }

    pub fn down(point: Point, button: MouseButton) -> Self {
        MouseEvent { point, action: MouseAction::Down(button) }
    }

    pub fn up(point: Point, button: MouseButton) -> Self {
        MouseEvent { point, action: MouseAction::Up(button) }
    }

    pub fn is_click(&self) -> bool { !matches!(self.action, MouseAction::Move) }
}

#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

/// Result of handing an input event to a hook consumer.
///
/// `Handled` swallows the event: the hook chain stops and the window that would
/// otherwise have received it never sees it.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, Eq, PartialEq)]
pub enum Propagation {
    Handled,
    Forward,
}

impl Propagation {
    pub fn is_handled(self) -> bool { self == Propagation::Handled }
}
