//! Gamepad state polled into a fixed button bit layout.

bitflags::bitflags! {
    /// Digital gamepad buttons in a fixed bit layout.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct GamepadButtons: u16 {
        /// D-pad up.
        const DPAD_UP = 0x0001;
        /// D-pad down.
        const DPAD_DOWN = 0x0002;
        /// D-pad left.
        const DPAD_LEFT = 0x0004;
        /// D-pad right.
        const DPAD_RIGHT = 0x0008;
        /// Start button.
        const START = 0x0010;
        /// Auxiliary button, select or back.
        const AUX = 0x0020;
        /// Left stick click.
        const LEFT_STICK = 0x0040;
        /// Right stick click.
        const RIGHT_STICK = 0x0080;
        /// Left shoulder bumper.
        const LEFT_SHOULDER = 0x0100;
        /// Right shoulder bumper.
        const RIGHT_SHOULDER = 0x0200;
        /// Bottom face button.
        const FACE_0 = 0x1000;
        /// Right face button.
        const FACE_1 = 0x2000;
        /// Left face button.
        const FACE_2 = 0x4000;
        /// Top face button.
        const FACE_3 = 0x8000;
    }
}

/// Polled state of one gamepad slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gamepad {
    /// Whether a device currently backs the slot.
    pub(crate) connected: bool,
    /// Digital button state.
    pub(crate) buttons: GamepadButtons,
    /// Left analog trigger in `0.0..=1.0`.
    pub(crate) left_trigger: f32,
    /// Right analog trigger in `0.0..=1.0`.
    pub(crate) right_trigger: f32,
    /// Left stick in `-1.0..=1.0` per axis.
    pub(crate) left_stick: (f32, f32),
    /// Right stick in `-1.0..=1.0` per axis.
    pub(crate) right_stick: (f32, f32),
}

impl Gamepad {
    /// Whether a device currently backs the slot.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Digital button state.
    #[inline]
    #[must_use]
    pub const fn buttons(&self) -> GamepadButtons {
        self.buttons
    }

    /// Left analog trigger in `0.0..=1.0`.
    #[inline]
    #[must_use]
    pub const fn left_trigger(&self) -> f32 {
        self.left_trigger
    }

    /// Right analog trigger in `0.0..=1.0`.
    #[inline]
    #[must_use]
    pub const fn right_trigger(&self) -> f32 {
        self.right_trigger
    }

    /// Left stick in `-1.0..=1.0` per axis.
    #[inline]
    #[must_use]
    pub const fn left_stick(&self) -> (f32, f32) {
        self.left_stick
    }

    /// Right stick in `-1.0..=1.0` per axis.
    #[inline]
    #[must_use]
    pub const fn right_stick(&self) -> (f32, f32) {
        self.right_stick
    }
}

/// Fold a pressed-state lookup into the fixed bit layout.
pub(crate) fn button_bits(pressed: impl Fn(gilrs::Button) -> bool) -> GamepadButtons {
    use gilrs::Button;

    let mut buttons = GamepadButtons::empty();
    buttons.set(GamepadButtons::DPAD_UP, pressed(Button::DPadUp));
    buttons.set(GamepadButtons::DPAD_DOWN, pressed(Button::DPadDown));
    buttons.set(GamepadButtons::DPAD_LEFT, pressed(Button::DPadLeft));
    buttons.set(GamepadButtons::DPAD_RIGHT, pressed(Button::DPadRight));
    buttons.set(GamepadButtons::START, pressed(Button::Start));
    buttons.set(GamepadButtons::AUX, pressed(Button::Select));
    buttons.set(GamepadButtons::LEFT_STICK, pressed(Button::LeftThumb));
    buttons.set(GamepadButtons::RIGHT_STICK, pressed(Button::RightThumb));
    buttons.set(GamepadButtons::LEFT_SHOULDER, pressed(Button::LeftTrigger));
    buttons.set(GamepadButtons::RIGHT_SHOULDER, pressed(Button::RightTrigger));
    buttons.set(GamepadButtons::FACE_0, pressed(Button::South));
    buttons.set(GamepadButtons::FACE_1, pressed(Button::East));
    buttons.set(GamepadButtons::FACE_2, pressed(Button::West));
    buttons.set(GamepadButtons::FACE_3, pressed(Button::North));

    buttons
}

/// Read the full state of a connected device.
pub(crate) fn read(pad: &gilrs::Gamepad<'_>) -> Gamepad {
    use gilrs::{Axis, Button};

    let trigger = |button| pad.button_data(button).map_or(0.0, |data| data.value());
    let axis = |axis| pad.axis_data(axis).map_or(0.0, |data| data.value());

    Gamepad {
        connected: true,
        buttons: button_bits(|button| pad.is_pressed(button)),
        left_trigger: trigger(Button::LeftTrigger2),
        right_trigger: trigger(Button::RightTrigger2),
        left_stick: (axis(Axis::LeftStickX), axis(Axis::LeftStickY)),
        right_stick: (axis(Axis::RightStickX), axis(Axis::RightStickY)),
    }
}

#[cfg(test)]
mod tests {
    use gilrs::Button;

    use super::{button_bits, GamepadButtons};

    /// Every button lands on its fixed bit.
    #[test]
    fn bit_layout_is_stable() {
        let buttons = button_bits(|button| matches!(button, Button::DPadUp | Button::North));
        assert_eq!(buttons.bits(), 0x8001);

        let buttons = button_bits(|button| {
            matches!(button, Button::Start | Button::Select | Button::LeftThumb)
        });
        assert_eq!(buttons.bits(), 0x0070);

        let buttons =
            button_bits(|button| matches!(button, Button::LeftTrigger | Button::RightTrigger));
        assert_eq!(
            buttons,
            GamepadButtons::LEFT_SHOULDER | GamepadButtons::RIGHT_SHOULDER
        );

        let buttons = button_bits(|button| {
            matches!(button, Button::South | Button::East | Button::West)
        });
        assert_eq!(buttons.bits(), 0x7000);
    }

    /// Nothing pressed is an empty mask.
    #[test]
    fn empty_without_presses() {
        assert_eq!(button_bits(|_| false), GamepadButtons::empty());
    }
}
