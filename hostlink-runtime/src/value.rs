//! Host values addressed by module-held handles.

use std::fmt;
use std::sync::Arc;

use hostlink_abi::kind::InstanceKind;

use crate::closure::FunctionRef;
use crate::host::dom::ElementId;
use crate::host::event::{EventRecord, Touch};
use crate::host::fetch::ResponseId;
use crate::host::gl::{
    BufferId, ContextId, ProgramId, ShaderId, TextureId, UniformLocation, VertexArrayId,
};
use crate::host::promise::PromiseId;

/// An error value raised by a host API and handed to the module.
#[derive(Debug, Clone, PartialEq)]
pub struct HostException {
    pub name: String,
    pub message: String,
    pub stack: String,
}

impl HostException {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let message = message.into();
        let stack = format!("{name}: {message}\n    at <host>");
        Self {
            name,
            message,
            stack,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn invalid_character(message: impl Into<String>) -> Self {
        Self::new("InvalidCharacterError", message)
    }
}

impl fmt::Display for HostException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

/// Everything a handle can refer to.
#[derive(Debug, Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Bytes(Arc<[u8]>),
    Window,
    Document,
    Performance,
    Element(ElementId),
    GlContext(ContextId),
    GlBuffer(BufferId),
    GlTexture(TextureId),
    GlShader(ShaderId),
    GlProgram(ProgramId),
    GlVertexArray(VertexArrayId),
    GlUniformLocation(UniformLocation),
    Event(EventRecord),
    TouchList(Arc<[Touch]>),
    Touch(Touch),
    Function(FunctionRef),
    Promise(PromiseId),
    Response(ResponseId),
    Error(HostException),
}

impl HostValue {
    /// Class-ish name used in diagnostics and type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bytes(_) => "ArrayBuffer",
            Self::Window => "Window",
            Self::Document => "Document",
            Self::Performance => "Performance",
            Self::Element(_) => "Element",
            Self::GlContext(_) => "WebGL2RenderingContext",
            Self::GlBuffer(_) => "WebGLBuffer",
            Self::GlTexture(_) => "WebGLTexture",
            Self::GlShader(_) => "WebGLShader",
            Self::GlProgram(_) => "WebGLProgram",
            Self::GlVertexArray(_) => "WebGLVertexArrayObject",
            Self::GlUniformLocation(_) => "WebGLUniformLocation",
            Self::Event(event) => event.class_name(),
            Self::TouchList(_) => "TouchList",
            Self::Touch(_) => "Touch",
            Self::Function(_) => "Function",
            Self::Promise(_) => "Promise",
            Self::Response(_) => "Response",
            Self::Error(_) => "Error",
        }
    }

    pub fn is_like_none(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Whether this value satisfies an `instanceof` probe. Canvas checks
    /// need the document and are answered by the adapter.
    pub fn is_instance_of(&self, kind: InstanceKind) -> bool {
        match kind {
            InstanceKind::Window => matches!(self, Self::Window),
            InstanceKind::Document => matches!(self, Self::Document),
            InstanceKind::Element | InstanceKind::HtmlCanvasElement => {
                matches!(self, Self::Element(_))
            }
            InstanceKind::WebGl2RenderingContext => matches!(self, Self::GlContext(_)),
            InstanceKind::Response => matches!(self, Self::Response(_)),
            InstanceKind::ArrayBuffer => matches!(self, Self::Bytes(_)),
            InstanceKind::Error => matches!(self, Self::Error(_)),
            InstanceKind::Promise => matches!(self, Self::Promise(_)),
            InstanceKind::Performance => matches!(self, Self::Performance),
            InstanceKind::KeyboardEvent
            | InstanceKind::MouseEvent
            | InstanceKind::WheelEvent
            | InstanceKind::TouchEvent => match self {
                Self::Event(event) => event.instance_kind() == kind,
                _ => false,
            },
        }
    }

    /// Human-readable rendering, used by `debug_string` and error paths.
    pub fn debug_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => format_number(*n),
            Self::String(s) => format!("{s:?}"),
            Self::Function(_) => "Function".to_string(),
            Self::Bytes(bytes) => format!("ArrayBuffer({})", bytes.len()),
            Self::TouchList(list) => format!("TouchList({})", list.len()),
            Self::Error(exn) => format!("{exn}\n{}", exn.stack),
            other => other.type_name().to_string(),
        }
    }
}

/// Formats a number the way a script host prints it: integral values
/// without a fractional part, non-finite values by name.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Typed extraction of a handle's value, used by `HandleTable::cast`.
pub trait FromHostValue: Sized {
    const EXPECTED: &'static str;

    fn from_host_value(value: &HostValue) -> Option<Self>;
}

macro_rules! from_host_value {
    ($ty:ty, $variant:ident, $expected:literal) => {
        impl FromHostValue for $ty {
            const EXPECTED: &'static str = $expected;

            fn from_host_value(value: &HostValue) -> Option<Self> {
                match value {
                    HostValue::$variant(inner) => Some(inner.clone()),
                    _ => None,
                }
            }
        }
    };
}

from_host_value!(ElementId, Element, "Element");
from_host_value!(ContextId, GlContext, "WebGL2RenderingContext");
from_host_value!(BufferId, GlBuffer, "WebGLBuffer");
from_host_value!(TextureId, GlTexture, "WebGLTexture");
from_host_value!(ShaderId, GlShader, "WebGLShader");
from_host_value!(ProgramId, GlProgram, "WebGLProgram");
from_host_value!(VertexArrayId, GlVertexArray, "WebGLVertexArrayObject");
from_host_value!(UniformLocation, GlUniformLocation, "WebGLUniformLocation");
from_host_value!(PromiseId, Promise, "Promise");
from_host_value!(ResponseId, Response, "Response");
from_host_value!(FunctionRef, Function, "Function");
from_host_value!(EventRecord, Event, "Event");
from_host_value!(Touch, Touch, "Touch");
from_host_value!(String, String, "string");
from_host_value!(f64, Number, "number");
