/// Input events a compute module can install handlers for.
///
/// The numeric code is what crosses the boundary in `element_set_handler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventKind {
    KeyDown = 0,
    KeyUp = 1,
    MouseDown = 2,
    MouseMove = 3,
    MouseUp = 4,
    Wheel = 5,
    TouchStart = 6,
    TouchMove = 7,
    TouchEnd = 8,
    TouchCancel = 9,
}

impl EventKind {
    pub const COUNT: usize = 10;

    pub const ALL: [EventKind; Self::COUNT] = [
        Self::KeyDown,
        Self::KeyUp,
        Self::MouseDown,
        Self::MouseMove,
        Self::MouseUp,
        Self::Wheel,
        Self::TouchStart,
        Self::TouchMove,
        Self::TouchEnd,
        Self::TouchCancel,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// DOM event type, e.g. `"keydown"`.
    pub fn event_type(self) -> &'static str {
        match self {
            Self::KeyDown => "keydown",
            Self::KeyUp => "keyup",
            Self::MouseDown => "mousedown",
            Self::MouseMove => "mousemove",
            Self::MouseUp => "mouseup",
            Self::Wheel => "wheel",
            Self::TouchStart => "touchstart",
            Self::TouchMove => "touchmove",
            Self::TouchEnd => "touchend",
            Self::TouchCancel => "touchcancel",
        }
    }

    pub fn from_event_type(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.event_type() == name)
    }

    /// Element property the handler is installed under, e.g. `"onkeydown"`.
    pub fn handler_name(self) -> &'static str {
        match self {
            Self::KeyDown => "onkeydown",
            Self::KeyUp => "onkeyup",
            Self::MouseDown => "onmousedown",
            Self::MouseMove => "onmousemove",
            Self::MouseUp => "onmouseup",
            Self::Wheel => "onwheel",
            Self::TouchStart => "ontouchstart",
            Self::TouchMove => "ontouchmove",
            Self::TouchEnd => "ontouchend",
            Self::TouchCancel => "ontouchcancel",
        }
    }

    pub fn is_keyboard(self) -> bool {
        matches!(self, Self::KeyDown | Self::KeyUp)
    }

    pub fn is_mouse(self) -> bool {
        matches!(self, Self::MouseDown | Self::MouseMove | Self::MouseUp)
    }

    pub fn is_touch(self) -> bool {
        matches!(
            self,
            Self::TouchStart | Self::TouchMove | Self::TouchEnd | Self::TouchCancel
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_table() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_code(kind.code()), Some(kind));
            assert_eq!(EventKind::from_event_type(kind.event_type()), Some(kind));
            assert_eq!(kind.handler_name(), format!("on{}", kind.event_type()));
        }
        assert_eq!(EventKind::from_code(EventKind::COUNT as u32), None);
        assert_eq!(EventKind::from_event_type("click"), None);
    }

    #[test]
    fn test_families_are_disjoint() {
        for kind in EventKind::ALL {
            let families = [kind.is_keyboard(), kind.is_mouse(), kind.is_touch()];
            assert!(families.iter().filter(|f| **f).count() <= 1, "{kind:?}");
        }
        assert!(!EventKind::Wheel.is_mouse());
    }
}
