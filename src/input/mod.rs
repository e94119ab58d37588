//! Raw platform input translated into a normalized event model.

pub(crate) mod gamepad;
pub(crate) mod keyboard;
pub(crate) mod mouse;

use std::collections::VecDeque;

use winit::{event::WindowEvent, keyboard::KeyCode};

pub use gamepad::{Gamepad, GamepadButtons};
pub use keyboard::{Key, Modifiers};
pub use mouse::{Mouse, MouseButton};

use keyboard::ModifierLatch;
use crate::config::Config;

/// Gamepad slots that are polled.
pub(crate) const MAX_GAMEPADS: usize = 4;

/// Mouse index of the first virtual pointer.
const FIRST_VIRTUAL_POINTER: usize = 1;

/// Normalized input event delivered to the game.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// A key went down.
    KeyDown {
        /// Normalized key.
        key: Key,
        /// Modifier state at the time of the event.
        modifiers: Modifiers,
    },
    /// A key was released.
    KeyUp {
        /// Normalized key.
        key: Key,
        /// Modifier state at the time of the event.
        modifiers: Modifiers,
    },
    /// A mouse moved.
    MouseMove {
        /// Index of the mouse.
        mouse: usize,
        /// New position in device pixels.
        x: f32,
        /// New position in device pixels.
        y: f32,
    },
    /// A mouse button went down.
    MouseDown {
        /// Index of the mouse.
        mouse: usize,
        /// Which button.
        button: MouseButton,
    },
    /// A mouse button was released.
    MouseUp {
        /// Index of the mouse.
        mouse: usize,
        /// Which button.
        button: MouseButton,
    },
    /// The scroll wheel moved.
    MouseWheel {
        /// Index of the mouse.
        mouse: usize,
        /// Vertical scroll amount in lines, positive away from the user.
        delta: f32,
    },
}

/// Input state of the window.
///
/// Window events are translated into [`InputEvent`]s drained once per loop iteration; mouse and gamepad state can also be read directly.
pub struct Input {
    /// Translated events waiting to be drained.
    events: VecDeque<InputEvent>,
    /// Alt/Shift/Control tracking.
    latch: ModifierLatch,
    /// Index zero is the physical mouse, the rest are virtual pointers.
    mice: Vec<Mouse>,
    /// Movement in pixels per frame for virtual pointers.
    virtual_pointer_speed: f32,
    /// Fixed gamepad slots.
    gamepads: [Gamepad; MAX_GAMEPADS],
    /// Gamepad backend, `None` when it failed to initialize.
    gilrs: Option<gilrs::Gilrs>,
    /// Alt+Enter was pressed, consumed by the scheduler.
    fullscreen_toggle_requested: bool,
}

impl Input {
    /// Set up the input state, connecting the configured virtual pointers.
    pub(crate) fn new(config: &Config) -> Self {
        // Setup the gamepads
        let gilrs = match gilrs::Gilrs::new() {
            Ok(gilrs) => Some(gilrs),
            Err(err) => {
                log::warn!("Error setting up gamepad support, gamepads stay disconnected: {err}");

                None
            }
        };

        let mut mice = vec![Mouse::default(); 1 + config.virtual_pointers];
        for mouse in &mut mice {
            mouse.connected = true;
        }

        Self {
            events: VecDeque::new(),
            latch: ModifierLatch::default(),
            mice,
            virtual_pointer_speed: config.virtual_pointer_speed,
            gamepads: [Gamepad::default(); MAX_GAMEPADS],
            gilrs,
            fullscreen_toggle_requested: false,
        }
    }

    /// State of a mouse by index.
    ///
    /// # Panics
    ///
    /// - When the index is out of range.
    #[inline]
    #[must_use]
    pub fn mouse(&self, index: usize) -> &Mouse {
        assert!(index < self.mice.len(), "Mouse index out of range");

        &self.mice[index]
    }

    /// Amount of addressable mice, the physical one plus the virtual pointers.
    #[inline]
    #[must_use]
    pub fn mouse_count(&self) -> usize {
        self.mice.len()
    }

    /// State of a gamepad slot.
    ///
    /// # Panics
    ///
    /// - When the index is out of range.
    #[inline]
    #[must_use]
    pub fn gamepad(&self, index: usize) -> &Gamepad {
        assert!(index < MAX_GAMEPADS, "Gamepad index out of range");

        &self.gamepads[index]
    }

    /// Amount of gamepad slots.
    #[inline]
    #[must_use]
    pub const fn gamepad_count(&self) -> usize {
        MAX_GAMEPADS
    }

    /// Translate a window event.
    pub(crate) fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let winit::keyboard::PhysicalKey::Code(code) = event.physical_key {
                    self.on_key(code, event.state.is_pressed());
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => self.latch.set_platform(modifiers.state()),
            WindowEvent::CursorMoved { position, .. } => {
                let (x, y) = (position.x as f32, position.y as f32);
                self.mice[0].x = x;
                self.mice[0].y = y;
                self.events.push_back(InputEvent::MouseMove { mouse: 0, x, y });
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if let Some(button) = mouse::map_button(*button) {
                    let event = if state.is_pressed() {
                        InputEvent::MouseDown { mouse: 0, button }
                    } else {
                        InputEvent::MouseUp { mouse: 0, button }
                    };
                    self.events.push_back(event);
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let delta = match delta {
                    winit::event::MouseScrollDelta::LineDelta(_, y) => *y,
                    winit::event::MouseScrollDelta::PixelDelta(position) => position.y as f32,
                };
                self.events.push_back(InputEvent::MouseWheel { mouse: 0, delta });
            }
            _ => (),
        }
    }

    /// Move every virtual pointer by its velocity, called once per loop iteration.
    pub(crate) fn integrate_virtual_pointers(&mut self) {
        for index in FIRST_VIRTUAL_POINTER..self.mice.len() {
            let mouse = &mut self.mice[index];
            if mouse.velocity_x == 0.0 && mouse.velocity_y == 0.0 {
                continue;
            }

            mouse.x += mouse.velocity_x;
            mouse.y += mouse.velocity_y;
            let (x, y) = (mouse.x, mouse.y);

            self.events.push_back(InputEvent::MouseMove {
                mouse: index,
                x,
                y,
            });
        }
    }

    /// Read the state of all connected gamepads into the fixed slots.
    pub(crate) fn poll_gamepads(&mut self) {
        profiling::scope!("poll_gamepads");

        let Some(gilrs) = self.gilrs.as_mut() else {
            return;
        };

        // Pump the event queue so connection state is current
        while gilrs.next_event().is_some() {}

        // A slot without a device behind it reads as disconnected
        let mut polled = [Gamepad::default(); MAX_GAMEPADS];
        for (slot, (_id, pad)) in polled.iter_mut().zip(gilrs.gamepads()) {
            if pad.is_connected() {
                *slot = gamepad::read(&pad);
            }
        }

        self.gamepads = polled;
    }

    /// Drain all translated events in arrival order.
    pub(crate) fn take_events(&mut self) -> VecDeque<InputEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether Alt+Enter was pressed since the last call.
    pub(crate) fn take_fullscreen_toggle_request(&mut self) -> bool {
        std::mem::take(&mut self.fullscreen_toggle_requested)
    }

    /// Handle a key state change.
    fn on_key(&mut self, code: KeyCode, down: bool) {
        let key = keyboard::map_key_code(code);
        self.latch.handle_key(key, down);

        // Virtual pointer chords swallow the key event
        if self.handle_virtual_pointer_chord(code, down) {
            return;
        }

        let modifiers = self.latch.compose();

        if down && key == Key::Return && modifiers.contains(Modifiers::ALT) {
            self.fullscreen_toggle_requested = true;
        }

        let event = if down {
            InputEvent::KeyDown { key, modifiers }
        } else {
            InputEvent::KeyUp { key, modifiers }
        };
        self.events.push_back(event);
    }

    /// Drive the first virtual pointer from Control chords.
    ///
    /// Control+arrows set the velocity, Control+Slash synthesizes the left button.
    /// Key releases always clear so a released Control can't leave a pointer drifting.
    fn handle_virtual_pointer_chord(&mut self, code: KeyCode, down: bool) -> bool {
        if self.mice.len() <= FIRST_VIRTUAL_POINTER {
            return false;
        }

        let control = self.latch.control();
        let speed = self.virtual_pointer_speed;
        let mouse = &mut self.mice[FIRST_VIRTUAL_POINTER];

        match code {
            KeyCode::ArrowUp => chord_axis(&mut mouse.velocity_y, -speed, down, control),
            KeyCode::ArrowDown => chord_axis(&mut mouse.velocity_y, speed, down, control),
            KeyCode::ArrowLeft => chord_axis(&mut mouse.velocity_x, -speed, down, control),
            KeyCode::ArrowRight => chord_axis(&mut mouse.velocity_x, speed, down, control),
            KeyCode::Slash => {
                if down {
                    if !control || mouse.left_down {
                        return control;
                    }
                    mouse.left_down = true;
                    self.events.push_back(InputEvent::MouseDown {
                        mouse: FIRST_VIRTUAL_POINTER,
                        button: MouseButton::Left,
                    });

                    true
                } else if mouse.left_down {
                    mouse.left_down = false;
                    self.events.push_back(InputEvent::MouseUp {
                        mouse: FIRST_VIRTUAL_POINTER,
                        button: MouseButton::Left,
                    });

                    true
                } else {
                    false
                }
            }
            _ => false,
        }
    }
}

/// Apply an arrow chord to a velocity axis.
///
/// Returns whether the key event was consumed.
fn chord_axis(axis: &mut f32, velocity: f32, down: bool, control: bool) -> bool {
    if down {
        if !control {
            return false;
        }
        *axis = velocity;

        true
    } else if *axis != 0.0 {
        *axis = 0.0;

        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use winit::keyboard::KeyCode;

    use super::{Input, InputEvent, Key, Modifiers, MouseButton};
    use crate::config::Config;

    /// Input with one virtual pointer.
    fn input_with_virtual_pointer() -> Input {
        Input::new(&Config::default().with_virtual_pointers(1))
    }

    /// Alt+Enter raises the toggle request and still forwards the key.
    #[test]
    fn alt_enter_requests_fullscreen_toggle() {
        let mut input = Input::new(&Config::default());

        input.on_key(KeyCode::AltLeft, true);
        input.on_key(KeyCode::Enter, true);

        assert!(input.take_fullscreen_toggle_request());
        // Consumed, a second take returns false
        assert!(!input.take_fullscreen_toggle_request());

        let events: Vec<_> = input.take_events().into_iter().collect();
        assert!(events.contains(&InputEvent::KeyDown {
            key: Key::Return,
            modifiers: Modifiers::ALT,
        }));
    }

    /// Enter without Alt is an ordinary key event.
    #[test]
    fn plain_enter_does_not_toggle() {
        let mut input = Input::new(&Config::default());

        input.on_key(KeyCode::Enter, true);

        assert!(!input.take_fullscreen_toggle_request());
    }

    /// Control+arrow moves the virtual pointer until the key is released.
    #[test]
    fn virtual_pointer_moves_while_chord_held() {
        let mut input = input_with_virtual_pointer();

        input.on_key(KeyCode::ControlLeft, true);
        input.on_key(KeyCode::ArrowRight, true);

        input.integrate_virtual_pointers();
        input.integrate_virtual_pointers();
        assert_eq!(input.mouse(1).position(), (4.0, 0.0));

        // Release stops the movement even after Control went up first
        input.on_key(KeyCode::ControlLeft, false);
        input.on_key(KeyCode::ArrowRight, false);
        input.integrate_virtual_pointers();
        assert_eq!(input.mouse(1).position(), (4.0, 0.0));
    }

    /// Without the Control chord arrows stay ordinary key events.
    #[test]
    fn arrows_without_control_are_key_events() {
        let mut input = input_with_virtual_pointer();

        input.on_key(KeyCode::ArrowUp, true);
        input.integrate_virtual_pointers();

        assert_eq!(input.mouse(1).position(), (0.0, 0.0));
        let events: Vec<_> = input.take_events().into_iter().collect();
        assert!(events.contains(&InputEvent::KeyDown {
            key: Key::Up,
            modifiers: Modifiers::empty(),
        }));
    }

    /// Control+Slash synthesizes a left button press on the virtual pointer.
    #[test]
    fn slash_chord_synthesizes_left_button() {
        let mut input = input_with_virtual_pointer();

        input.on_key(KeyCode::ControlLeft, true);
        input.on_key(KeyCode::Slash, true);
        // Key repeat must not produce a second press
        input.on_key(KeyCode::Slash, true);
        input.on_key(KeyCode::Slash, false);

        let events: Vec<_> = input.take_events().into_iter().collect();
        let downs = events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    InputEvent::MouseDown {
                        mouse: 1,
                        button: MouseButton::Left,
                    }
                )
            })
            .count();
        let ups = events
            .iter()
            .filter(|event| {
                matches!(
                    event,
                    InputEvent::MouseUp {
                        mouse: 1,
                        button: MouseButton::Left,
                    }
                )
            })
            .count();

        assert_eq!(downs, 1);
        assert_eq!(ups, 1);
    }

    /// Only configured virtual pointers are connected.
    #[test]
    fn pointer_connectivity_follows_config() {
        let input = Input::new(&Config::default());
        assert_eq!(input.mouse_count(), 1);
        assert!(input.mouse(0).is_connected());

        let input = input_with_virtual_pointer();
        assert_eq!(input.mouse_count(), 2);
        assert!(input.mouse(1).is_connected());
    }

    #[test]
    #[should_panic(expected = "Mouse index out of range")]
    fn out_of_range_mouse_panics() {
        let input = Input::new(&Config::default());
        let _ = input.mouse(3);
    }
}
