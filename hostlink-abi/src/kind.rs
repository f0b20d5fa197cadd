/// Host object classes a module can probe with `instance_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum InstanceKind {
    Window = 0,
    Document = 1,
    Element = 2,
    HtmlCanvasElement = 3,
    WebGl2RenderingContext = 4,
    Response = 5,
    ArrayBuffer = 6,
    Error = 7,
    Promise = 8,
    KeyboardEvent = 9,
    MouseEvent = 10,
    WheelEvent = 11,
    TouchEvent = 12,
    Performance = 13,
}

impl InstanceKind {
    pub const ALL: [InstanceKind; 14] = [
        Self::Window,
        Self::Document,
        Self::Element,
        Self::HtmlCanvasElement,
        Self::WebGl2RenderingContext,
        Self::Response,
        Self::ArrayBuffer,
        Self::Error,
        Self::Promise,
        Self::KeyboardEvent,
        Self::MouseEvent,
        Self::WheelEvent,
        Self::TouchEvent,
        Self::Performance,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Window => "Window",
            Self::Document => "Document",
            Self::Element => "Element",
            Self::HtmlCanvasElement => "HTMLCanvasElement",
            Self::WebGl2RenderingContext => "WebGL2RenderingContext",
            Self::Response => "Response",
            Self::ArrayBuffer => "ArrayBuffer",
            Self::Error => "Error",
            Self::Promise => "Promise",
            Self::KeyboardEvent => "KeyboardEvent",
            Self::MouseEvent => "MouseEvent",
            Self::WheelEvent => "WheelEvent",
            Self::TouchEvent => "TouchEvent",
            Self::Performance => "Performance",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_code_matches_discriminant() {
        for kind in InstanceKind::ALL {
            assert_eq!(InstanceKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(InstanceKind::from_code(99), None);
    }
}
