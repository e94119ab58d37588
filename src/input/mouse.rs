//! Addressable mice, the physical pointer plus optional virtual pointers.

/// Mouse button delivered with mouse events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left or primary button.
    Left,
    /// Middle button or wheel click.
    Middle,
    /// Right or secondary button.
    Right,
}

/// Map a platform mouse button, ignoring extra buttons.
pub(crate) const fn map_button(button: winit::event::MouseButton) -> Option<MouseButton> {
    match button {
        winit::event::MouseButton::Left => Some(MouseButton::Left),
        winit::event::MouseButton::Middle => Some(MouseButton::Middle),
        winit::event::MouseButton::Right => Some(MouseButton::Right),
        _ => None,
    }
}

/// State of one addressable mouse.
///
/// Index zero is the physical pointer, higher indices are keyboard driven virtual pointers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Mouse {
    /// Whether the index is backed by anything.
    pub(crate) connected: bool,
    /// Position in device pixels.
    pub(crate) x: f32,
    /// Position in device pixels.
    pub(crate) y: f32,
    /// Movement per frame, only used for virtual pointers.
    pub(crate) velocity_x: f32,
    /// Movement per frame, only used for virtual pointers.
    pub(crate) velocity_y: f32,
    /// Synthesized left button state, only used for virtual pointers.
    pub(crate) left_down: bool,
}

impl Mouse {
    /// Whether the index is backed by a physical or virtual pointer.
    #[inline]
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Position in device pixels.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}
