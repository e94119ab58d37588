//! Key normalization and modifier tracking.

use winit::keyboard::{KeyCode, ModifiersState};

bitflags::bitflags! {
    /// Modifier keys composed into every key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Modifiers: u8 {
        /// Either Alt key.
        const ALT = 0b001;
        /// Either Shift key.
        const SHIFT = 0b010;
        /// Either Control key.
        const CONTROL = 0b100;
    }
}

/// Normalized key delivered with key events.
///
/// Letters and digits pass through as characters, named keys are mapped explicitly and anything unrecognized becomes [`Key::Unknown`] instead of being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Backspace key.
    Backspace,
    /// Tab key.
    Tab,
    /// Enter key.
    Return,
    /// Either Shift key.
    Shift,
    /// Either Control key.
    Control,
    /// Either Alt key.
    Alt,
    /// Pause key.
    Pause,
    /// Escape key.
    Escape,
    /// End key.
    End,
    /// Home key.
    Home,
    /// Left arrow.
    Left,
    /// Up arrow.
    Up,
    /// Right arrow.
    Right,
    /// Down arrow.
    Down,
    /// Insert key.
    Insert,
    /// Delete key.
    Delete,
    /// Function key F1.
    F1,
    /// Function key F2.
    F2,
    /// Function key F3.
    F3,
    /// Function key F4.
    F4,
    /// Function key F5.
    F5,
    /// Function key F6.
    F6,
    /// Function key F7.
    F7,
    /// Function key F8.
    F8,
    /// Function key F9.
    F9,
    /// Function key F10.
    F10,
    /// Function key F11.
    F11,
    /// Function key F12.
    F12,
    /// Letter, digit or space as a lowercase character.
    Char(char),
    /// Any key without a mapping.
    Unknown,
}

/// Map a platform key code to the normalized key.
pub(crate) const fn map_key_code(code: KeyCode) -> Key {
    match code {
        KeyCode::Backspace => Key::Backspace,
        KeyCode::Tab => Key::Tab,
        KeyCode::Enter | KeyCode::NumpadEnter => Key::Return,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
        KeyCode::Pause => Key::Pause,
        KeyCode::Escape => Key::Escape,
        KeyCode::End => Key::End,
        KeyCode::Home => Key::Home,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::Insert => Key::Insert,
        KeyCode::Delete => Key::Delete,
        KeyCode::F1 => Key::F1,
        KeyCode::F2 => Key::F2,
        KeyCode::F3 => Key::F3,
        KeyCode::F4 => Key::F4,
        KeyCode::F5 => Key::F5,
        KeyCode::F6 => Key::F6,
        KeyCode::F7 => Key::F7,
        KeyCode::F8 => Key::F8,
        KeyCode::F9 => Key::F9,
        KeyCode::F10 => Key::F10,
        KeyCode::F11 => Key::F11,
        KeyCode::F12 => Key::F12,
        KeyCode::Space => Key::Char(' '),
        KeyCode::KeyA => Key::Char('a'),
        KeyCode::KeyB => Key::Char('b'),
        KeyCode::KeyC => Key::Char('c'),
        KeyCode::KeyD => Key::Char('d'),
        KeyCode::KeyE => Key::Char('e'),
        KeyCode::KeyF => Key::Char('f'),
        KeyCode::KeyG => Key::Char('g'),
        KeyCode::KeyH => Key::Char('h'),
        KeyCode::KeyI => Key::Char('i'),
        KeyCode::KeyJ => Key::Char('j'),
        KeyCode::KeyK => Key::Char('k'),
        KeyCode::KeyL => Key::Char('l'),
        KeyCode::KeyM => Key::Char('m'),
        KeyCode::KeyN => Key::Char('n'),
        KeyCode::KeyO => Key::Char('o'),
        KeyCode::KeyP => Key::Char('p'),
        KeyCode::KeyQ => Key::Char('q'),
        KeyCode::KeyR => Key::Char('r'),
        KeyCode::KeyS => Key::Char('s'),
        KeyCode::KeyT => Key::Char('t'),
        KeyCode::KeyU => Key::Char('u'),
        KeyCode::KeyV => Key::Char('v'),
        KeyCode::KeyW => Key::Char('w'),
        KeyCode::KeyX => Key::Char('x'),
        KeyCode::KeyY => Key::Char('y'),
        KeyCode::KeyZ => Key::Char('z'),
        KeyCode::Digit0 | KeyCode::Numpad0 => Key::Char('0'),
        KeyCode::Digit1 | KeyCode::Numpad1 => Key::Char('1'),
        KeyCode::Digit2 | KeyCode::Numpad2 => Key::Char('2'),
        KeyCode::Digit3 | KeyCode::Numpad3 => Key::Char('3'),
        KeyCode::Digit4 | KeyCode::Numpad4 => Key::Char('4'),
        KeyCode::Digit5 | KeyCode::Numpad5 => Key::Char('5'),
        KeyCode::Digit6 | KeyCode::Numpad6 => Key::Char('6'),
        KeyCode::Digit7 | KeyCode::Numpad7 => Key::Char('7'),
        KeyCode::Digit8 | KeyCode::Numpad8 => Key::Char('8'),
        KeyCode::Digit9 | KeyCode::Numpad9 => Key::Char('9'),
        _ => Key::Unknown,
    }
}

/// Alt/Shift/Control held-down flags latched from dedicated key events.
///
/// Composed with the platform's reported modifier mask since the platform mask can miss keys pressed before the window gained focus.
#[derive(Debug, Default)]
pub(crate) struct ModifierLatch {
    /// Alt observed down through key events.
    alt: bool,
    /// Shift observed down through key events.
    shift: bool,
    /// Control observed down through key events.
    control: bool,
    /// Last modifier mask reported by the platform.
    platform: Modifiers,
}

impl ModifierLatch {
    /// Update the latch from a normalized key event.
    pub(crate) fn handle_key(&mut self, key: Key, down: bool) {
        match key {
            Key::Alt => self.alt = down,
            Key::Shift => self.shift = down,
            Key::Control => self.control = down,
            _ => (),
        }
    }

    /// Replace the platform reported mask.
    pub(crate) fn set_platform(&mut self, state: ModifiersState) {
        let mut platform = Modifiers::empty();
        platform.set(Modifiers::ALT, state.alt_key());
        platform.set(Modifiers::SHIFT, state.shift_key());
        platform.set(Modifiers::CONTROL, state.control_key());

        self.platform = platform;
    }

    /// Latched keys and the platform mask as one bitmask.
    pub(crate) fn compose(&self) -> Modifiers {
        let mut modifiers = self.platform;
        modifiers.set(Modifiers::ALT, self.alt || modifiers.contains(Modifiers::ALT));
        modifiers.set(
            Modifiers::SHIFT,
            self.shift || modifiers.contains(Modifiers::SHIFT),
        );
        modifiers.set(
            Modifiers::CONTROL,
            self.control || modifiers.contains(Modifiers::CONTROL),
        );

        modifiers
    }

    /// Whether Control is held, from either source.
    pub(crate) fn control(&self) -> bool {
        self.control || self.platform.contains(Modifiers::CONTROL)
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::{KeyCode, ModifiersState};

    use super::{map_key_code, Key, ModifierLatch, Modifiers};

    /// Letters and digits pass through, named keys map, the rest is unknown.
    #[test]
    fn key_codes_normalize() {
        assert_eq!(map_key_code(KeyCode::KeyA), Key::Char('a'));
        assert_eq!(map_key_code(KeyCode::Digit7), Key::Char('7'));
        assert_eq!(map_key_code(KeyCode::Space), Key::Char(' '));
        assert_eq!(map_key_code(KeyCode::F5), Key::F5);
        assert_eq!(map_key_code(KeyCode::ArrowDown), Key::Down);
        assert_eq!(map_key_code(KeyCode::ShiftRight), Key::Shift);
        assert_eq!(map_key_code(KeyCode::NumLock), Key::Unknown);
    }

    /// Dedicated key events latch modifiers even without a platform mask.
    #[test]
    fn latch_tracks_dedicated_keys() {
        let mut latch = ModifierLatch::default();

        latch.handle_key(Key::Alt, true);
        latch.handle_key(Key::Control, true);
        assert_eq!(latch.compose(), Modifiers::ALT | Modifiers::CONTROL);

        latch.handle_key(Key::Alt, false);
        assert_eq!(latch.compose(), Modifiers::CONTROL);
        assert!(latch.control());
    }

    /// The platform mask and the latch compose instead of overwriting each other.
    #[test]
    fn platform_mask_composes_with_latch() {
        let mut latch = ModifierLatch::default();

        latch.handle_key(Key::Shift, true);
        latch.set_platform(ModifiersState::CONTROL);

        assert_eq!(latch.compose(), Modifiers::SHIFT | Modifiers::CONTROL);

        // Clearing the platform mask keeps the latched key
        latch.set_platform(ModifiersState::empty());
        assert_eq!(latch.compose(), Modifiers::SHIFT);
    }
}
