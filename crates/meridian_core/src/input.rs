//! # Abstract Input
//!
//! Sixteen abstract buttons packed into a `u16`, plus a mouse position.
//! Device mapping (keys, gamepads) lives outside this crate.

use bytemuck::{Pod, Zeroable};

/// Abstract button, one bit each in [`InputState::buttons`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Button {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Action1 = 4,
    Action2 = 5,
    Action3 = 6,
    Action4 = 7,
    Action5 = 8,
    Action6 = 9,
    Action7 = 10,
    Action8 = 11,
    Menu = 12,
    Submit = 13,
    Select = 14,
    Escape = 15,
}

impl Button {
    /// Bit mask of this button.
    #[inline]
    #[must_use]
    pub const fn mask(self) -> u16 {
        1 << self as u16
    }
}

/// One sampled input frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct InputState {
    /// Pressed buttons, one bit per [`Button`].
    pub buttons: u16,
    /// Mouse X in screen space.
    pub mouse_x: i16,
    /// Mouse Y in screen space.
    pub mouse_y: i16,
}

impl InputState {
    /// Input with the given buttons held and the mouse at origin.
    #[must_use]
    pub fn pressed(buttons: &[Button]) -> Self {
        Self {
            buttons: buttons.iter().fold(0, |acc, b| acc | b.mask()),
            ..Self::default()
        }
    }

    /// Returns `true` if `button` is held.
    #[inline]
    #[must_use]
    pub const fn is_pressed(self, button: Button) -> bool {
        self.buttons & button.mask() != 0
    }

    /// Sets or clears `button`.
    pub fn set(&mut self, button: Button, pressed: bool) {
        if pressed {
            self.buttons |= button.mask();
        } else {
            self.buttons &= !button.mask();
        }
    }

    /// Unit movement direction from the directional buttons.
    ///
    /// Diagonals are normalised. Opposing buttons cancel out.
    #[must_use]
    pub fn direction(self) -> (f32, f32) {
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        if self.is_pressed(Button::Left) {
            x -= 1.0;
        }
        if self.is_pressed(Button::Right) {
            x += 1.0;
        }
        if self.is_pressed(Button::Up) {
            y -= 1.0;
        }
        if self.is_pressed(Button::Down) {
            y += 1.0;
        }
        if x != 0.0 && y != 0.0 {
            let magnitude = (x * x + y * y).sqrt();
            x /= magnitude;
            y /= magnitude;
        }
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_bits() {
        assert_eq!(Button::Up.mask(), 1);
        assert_eq!(Button::Action1.mask(), 1 << 4);
        assert_eq!(Button::Escape.mask(), 1 << 15);
    }

    #[test]
    fn test_set_and_query() {
        let mut input = InputState::default();
        input.set(Button::Submit, true);
        assert!(input.is_pressed(Button::Submit));
        input.set(Button::Submit, false);
        assert_eq!(input, InputState::default());
    }

    #[test]
    fn test_direction_normalises_diagonal() {
        let (x, y) = InputState::pressed(&[Button::Right, Button::Down]).direction();
        assert!((x * x + y * y - 1.0).abs() < 1e-6);
        assert!(x > 0.0 && y > 0.0);

        assert_eq!(InputState::pressed(&[Button::Left, Button::Right]).direction(), (0.0, 0.0));
        assert_eq!(InputState::pressed(&[Button::Up]).direction(), (0.0, -1.0));
    }
}
