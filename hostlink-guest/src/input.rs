/// Maps a `KeyboardEvent.code` to its legacy key code, the index used by
/// [`InputState::keys_down`].
pub fn key_slot(code: &str) -> Option<u8> {
    if let Some(letter) = code.strip_prefix("Key") {
        return match letter.as_bytes() {
            [c @ b'A'..=b'Z'] => Some(*c),
            _ => None,
        };
    }
    if let Some(digit) = code.strip_prefix("Digit") {
        return match digit.as_bytes() {
            [c @ b'0'..=b'9'] => Some(*c),
            _ => None,
        };
    }
    Some(match code {
        "Backspace" => 8,
        "Tab" => 9,
        "Enter" | "NumpadEnter" => 13,
        "ShiftLeft" | "ShiftRight" => 16,
        "ControlLeft" | "ControlRight" => 17,
        "AltLeft" | "AltRight" => 18,
        "Escape" => 27,
        "Space" => 32,
        "ArrowLeft" => 37,
        "ArrowUp" => 38,
        "ArrowRight" => 39,
        "ArrowDown" => 40,
        _ => return None,
    })
}

/// One active touch point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: i32,
    pub x: f64,
    pub y: f64,
}

/// Input state built from keyboard, mouse, wheel and touch events.
pub struct InputState {
    pub keys_down: [bool; 256],
    pub mouse_x: f64,
    pub mouse_y: f64,
    pub mouse_dx: f64,
    pub mouse_dy: f64,
    pub mouse_buttons: [bool; 3],
    pub wheel_dy: f64,
    pub touches: Vec<TouchPoint>,
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_down: [false; 256],
            mouse_x: 0.0,
            mouse_y: 0.0,
            mouse_dx: 0.0,
            mouse_dy: 0.0,
            mouse_buttons: [false; 3],
            wheel_dy: 0.0,
            touches: Vec::new(),
        }
    }

    /// Reset per-frame deltas.
    pub fn update(&mut self) {
        self.mouse_dx = 0.0;
        self.mouse_dy = 0.0;
        self.wheel_dy = 0.0;
    }

    pub fn is_key_down(&self, code: &str) -> bool {
        key_slot(code).is_some_and(|slot| self.keys_down[slot as usize])
    }

    /// Records a key press. Returns whether the key is tracked, so the
    /// caller can prevent the browser default for it.
    pub fn key_down(&mut self, code: &str) -> bool {
        self.set_key(code, true)
    }

    pub fn key_up(&mut self, code: &str) -> bool {
        self.set_key(code, false)
    }

    fn set_key(&mut self, code: &str, down: bool) -> bool {
        match key_slot(code) {
            Some(slot) => {
                self.keys_down[slot as usize] = down;
                true
            }
            None => false,
        }
    }

    pub fn mouse_move(&mut self, x: f64, y: f64) {
        self.mouse_dx += x - self.mouse_x;
        self.mouse_dy += y - self.mouse_y;
        self.mouse_x = x;
        self.mouse_y = y;
    }

    /// `button` is `MouseEvent.button`; buttons past the third are ignored.
    pub fn mouse_button(&mut self, button: i32, down: bool, x: f64, y: f64) {
        if let Some(slot) = usize::try_from(button)
            .ok()
            .and_then(|b| self.mouse_buttons.get_mut(b))
        {
            *slot = down;
        }
        self.mouse_x = x;
        self.mouse_y = y;
    }

    pub fn wheel(&mut self, delta_y: f64) {
        self.wheel_dy += delta_y;
    }

    /// A touch started or moved. The first active touch also drives the
    /// mouse position.
    pub fn touch_move(&mut self, id: i32, x: f64, y: f64) {
        let primary = self.touches.first().map_or(true, |t| t.id == id);
        match self.touches.iter_mut().find(|t| t.id == id) {
            Some(touch) => {
                touch.x = x;
                touch.y = y;
            }
            None => self.touches.push(TouchPoint { id, x, y }),
        }
        if primary {
            self.mouse_move(x, y);
        }
    }

    pub fn touch_end(&mut self, id: i32) {
        self.touches.retain(|t| t.id != id);
    }
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_slots() {
        assert_eq!(key_slot("KeyW"), Some(b'W'));
        assert_eq!(key_slot("Digit7"), Some(b'7'));
        assert_eq!(key_slot("ArrowUp"), Some(38));
        assert_eq!(key_slot("Keyboard"), None);
        assert_eq!(key_slot("F13"), None);
    }

    #[test]
    fn test_keys() {
        let mut input = InputState::new();
        assert!(input.key_down("KeyA"));
        assert!(input.is_key_down("KeyA"));
        assert!(!input.key_down("MediaPlayPause"));
        input.key_up("KeyA");
        assert!(!input.is_key_down("KeyA"));
    }

    #[test]
    fn test_mouse_deltas_reset_each_frame() {
        let mut input = InputState::new();
        input.mouse_move(10.0, 5.0);
        input.mouse_move(12.0, 4.0);
        assert_eq!((input.mouse_dx, input.mouse_dy), (12.0, 4.0));
        input.mouse_button(0, true, 12.0, 4.0);
        input.mouse_button(7, true, 12.0, 4.0);
        assert_eq!(input.mouse_buttons, [true, false, false]);
        input.wheel(3.0);

        input.update();
        assert_eq!((input.mouse_dx, input.mouse_dy, input.wheel_dy), (0.0, 0.0, 0.0));
        assert_eq!(input.mouse_x, 12.0);
    }

    #[test]
    fn test_primary_touch_drives_mouse() {
        let mut input = InputState::new();
        input.touch_move(4, 1.0, 1.0);
        input.touch_move(9, 50.0, 50.0);
        assert_eq!(input.touches.len(), 2);
        assert_eq!((input.mouse_x, input.mouse_y), (1.0, 1.0));

        input.touch_end(4);
        input.touch_move(9, 60.0, 40.0);
        assert_eq!((input.mouse_x, input.mouse_y), (60.0, 40.0));
    }
}
