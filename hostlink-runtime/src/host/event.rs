use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hostlink_abi::event::EventKind;
use hostlink_abi::kind::InstanceKind;

/// One touch point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub identifier: i32,
    pub screen_x: i32,
    pub screen_y: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Keyboard { code: String, repeat: bool },
    Mouse { button: i16, screen_x: i32, screen_y: i32 },
    Wheel { delta_x: f64, delta_y: f64, delta_z: f64 },
    Touch { changed: Arc<[Touch]> },
}

/// A DOM input event as seen by a handler.
///
/// Clones share the `default_prevented` flag, so the dispatcher can read
/// it back after the module's handler has run.
#[derive(Debug, Clone)]
pub struct EventRecord {
    kind: EventKind,
    payload: EventPayload,
    default_prevented: Arc<AtomicBool>,
}

impl EventRecord {
    fn new(kind: EventKind, payload: EventPayload) -> Self {
        Self {
            kind,
            payload,
            default_prevented: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A `keydown`/`keyup` event. Panics on a non-keyboard kind.
    pub fn key(kind: EventKind, code: impl Into<String>, repeat: bool) -> Self {
        assert!(kind.is_keyboard(), "{kind:?} is not a keyboard event");
        Self::new(
            kind,
            EventPayload::Keyboard {
                code: code.into(),
                repeat,
            },
        )
    }

    pub fn mouse(kind: EventKind, button: i16, screen_x: i32, screen_y: i32) -> Self {
        assert!(kind.is_mouse(), "{kind:?} is not a mouse event");
        Self::new(
            kind,
            EventPayload::Mouse {
                button,
                screen_x,
                screen_y,
            },
        )
    }

    pub fn wheel(delta_x: f64, delta_y: f64, delta_z: f64) -> Self {
        Self::new(
            EventKind::Wheel,
            EventPayload::Wheel {
                delta_x,
                delta_y,
                delta_z,
            },
        )
    }

    pub fn touch(kind: EventKind, changed: Vec<Touch>) -> Self {
        assert!(kind.is_touch(), "{kind:?} is not a touch event");
        Self::new(
            kind,
            EventPayload::Touch {
                changed: changed.into(),
            },
        )
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::Relaxed);
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::Relaxed)
    }

    pub fn instance_kind(&self) -> InstanceKind {
        match self.payload {
            EventPayload::Keyboard { .. } => InstanceKind::KeyboardEvent,
            EventPayload::Mouse { .. } => InstanceKind::MouseEvent,
            EventPayload::Wheel { .. } => InstanceKind::WheelEvent,
            EventPayload::Touch { .. } => InstanceKind::TouchEvent,
        }
    }

    pub fn class_name(&self) -> &'static str {
        self.instance_kind().name()
    }

    pub fn code(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::Keyboard { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn repeat(&self) -> Option<bool> {
        match self.payload {
            EventPayload::Keyboard { repeat, .. } => Some(repeat),
            _ => None,
        }
    }

    /// Mouse fields; wheel events carry a zero button and position.
    pub fn button(&self) -> Option<i16> {
        match self.payload {
            EventPayload::Mouse { button, .. } => Some(button),
            EventPayload::Wheel { .. } => Some(0),
            _ => None,
        }
    }

    pub fn screen_position(&self) -> Option<(i32, i32)> {
        match self.payload {
            EventPayload::Mouse {
                screen_x, screen_y, ..
            } => Some((screen_x, screen_y)),
            EventPayload::Wheel { .. } => Some((0, 0)),
            _ => None,
        }
    }

    pub fn wheel_delta(&self) -> Option<[f64; 3]> {
        match self.payload {
            EventPayload::Wheel {
                delta_x,
                delta_y,
                delta_z,
            } => Some([delta_x, delta_y, delta_z]),
            _ => None,
        }
    }

    pub fn changed_touches(&self) -> Option<Arc<[Touch]>> {
        match &self.payload {
            EventPayload::Touch { changed } => Some(changed.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prevent_default_is_shared() {
        let event = EventRecord::key(EventKind::KeyDown, "KeyW", false);
        let handed_out = event.clone();
        assert!(!event.default_prevented());
        handed_out.prevent_default();
        assert!(event.default_prevented());
    }

    #[test]
    fn test_accessors_by_payload() {
        let key = EventRecord::key(EventKind::KeyUp, "Space", true);
        assert_eq!(key.code(), Some("Space"));
        assert_eq!(key.repeat(), Some(true));
        assert_eq!(key.button(), None);
        assert_eq!(key.instance_kind(), InstanceKind::KeyboardEvent);

        let mouse = EventRecord::mouse(EventKind::MouseMove, 0, 10, -4);
        assert_eq!(mouse.screen_position(), Some((10, -4)));
        assert_eq!(mouse.class_name(), "MouseEvent");

        let wheel = EventRecord::wheel(0.0, -120.0, 0.0);
        assert_eq!(wheel.wheel_delta(), Some([0.0, -120.0, 0.0]));
        assert_eq!(wheel.button(), Some(0));

        let touch = EventRecord::touch(
            EventKind::TouchStart,
            vec![Touch {
                identifier: 3,
                screen_x: 1,
                screen_y: 2,
            }],
        );
        assert_eq!(touch.changed_touches().unwrap().len(), 1);
        assert_eq!(touch.code(), None);
    }

    #[test]
    #[should_panic]
    fn test_key_rejects_mouse_kind() {
        EventRecord::key(EventKind::MouseDown, "KeyA", false);
    }
}
