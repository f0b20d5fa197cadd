use std::ops::Deref;

use hostlink_abi::event::EventKind;
use hostlink_abi::handles::NULL;
use hostlink_abi::kind::InstanceKind;

use super::{fallible, host_type, take_string, Closure, Gl, HostResult, HostType, Promise, Value};
use crate::sys;

pub struct Window(Value);
host_type!(Window, Window);

/// The global window.
pub fn window() -> Window {
    Window(Value::from_raw(unsafe { sys::global_this() }))
}

impl Window {
    pub fn document(&self) -> Document {
        Document(Value::from_raw(unsafe { sys::window_document(self.0.raw()) }))
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        unsafe { sys::window_device_pixel_ratio(self.0.raw()) }
    }

    pub fn performance(&self) -> Performance {
        Performance(Value::from_raw(unsafe { sys::window_performance(self.0.raw()) }))
    }

    /// Starts a fetch. The promise resolves to a [`Response`](super::Response)
    /// or rejects with a `TypeError` on network failure.
    pub fn fetch(&self, url: &str) -> Promise {
        let raw = unsafe { sys::window_fetch(self.0.raw(), url.as_ptr(), url.len()) };
        Promise::from_value(Value::from_raw(raw))
    }

    /// Schedules `callback` for the next frame. The host keeps its own
    /// reference, so the `Closure` may be forgotten right after.
    pub fn request_animation_frame(&self, callback: &Closure) -> HostResult<u32> {
        fallible(|ret| unsafe { sys::request_animation_frame(ret, self.0.raw(), callback.raw()) })
    }

    pub fn cancel_animation_frame(&self, id: u32) {
        unsafe { sys::cancel_animation_frame(self.0.raw(), id) }
    }
}

pub struct Document(Value);
host_type!(Document, Document);

impl Document {
    pub fn get_element_by_id(&self, id: &str) -> Option<Element> {
        let raw = unsafe { sys::document_get_element_by_id(self.0.raw(), id.as_ptr(), id.len()) };
        let value = Value::from_raw(raw);
        (!value.is_nullish()).then(|| Element(value))
    }
}

pub struct Element(Value);
host_type!(Element, Element);

impl Element {
    pub fn set_attribute(&self, name: &str, value: &str) -> HostResult<()> {
        fallible(|ret| unsafe {
            sys::element_set_attribute(
                ret,
                self.0.raw(),
                name.as_ptr(),
                name.len(),
                value.as_ptr(),
                value.len(),
            )
        })
        .map(drop)
    }

    pub fn get_attribute(&self, name: &str) -> Option<String> {
        take_string(|ret| unsafe {
            sys::element_get_attribute(ret, self.0.raw(), name.as_ptr(), name.len())
        })
    }

    pub fn focus(&self) -> HostResult<()> {
        fallible(|ret| unsafe { sys::element_focus(ret, self.0.raw()) }).map(drop)
    }

    pub fn client_width(&self) -> i32 {
        unsafe { sys::element_client_width(self.0.raw()) }
    }

    pub fn client_height(&self) -> i32 {
        unsafe { sys::element_client_height(self.0.raw()) }
    }

    /// Installs (or with `None`, clears) the `on<kind>` handler. The
    /// element keeps its own reference to the closure.
    pub fn set_handler(&self, kind: EventKind, handler: Option<&Closure>) {
        let func = handler.map_or(NULL, Closure::raw);
        unsafe { sys::element_set_handler(self.0.raw(), kind.code(), func) }
    }

    pub fn into_canvas(self) -> Result<Canvas, Element> {
        if self.0.is_instance_of(InstanceKind::HtmlCanvasElement) {
            Ok(Canvas(self))
        } else {
            Err(self)
        }
    }
}

/// An `HTMLCanvasElement`.
pub struct Canvas(Element);

impl HostType for Canvas {
    const KIND: InstanceKind = InstanceKind::HtmlCanvasElement;

    fn from_value(value: Value) -> Self {
        Self(Element(value))
    }

    fn as_value(&self) -> &Value {
        &self.0 .0
    }
}

impl Deref for Canvas {
    type Target = Element;

    fn deref(&self) -> &Element {
        &self.0
    }
}

impl Canvas {
    pub fn width(&self) -> u32 {
        unsafe { sys::canvas_width(self.as_value().raw()) as u32 }
    }

    pub fn height(&self) -> u32 {
        unsafe { sys::canvas_height(self.as_value().raw()) as u32 }
    }

    pub fn set_width(&self, width: u32) {
        unsafe { sys::canvas_set_width(self.as_value().raw(), width as i32) }
    }

    pub fn set_height(&self, height: u32) {
        unsafe { sys::canvas_set_height(self.as_value().raw(), height as i32) }
    }

    /// `getContext(name)`; `Ok(None)` when the host returns `null`.
    pub fn get_context(&self, name: &str) -> HostResult<Option<Value>> {
        let raw = fallible(|ret| unsafe {
            sys::canvas_get_context(ret, self.as_value().raw(), name.as_ptr(), name.len())
        })?;
        let value = Value::from_raw(raw);
        Ok((!value.is_nullish()).then_some(value))
    }

    pub fn get_context_webgl2(&self) -> HostResult<Option<Gl>> {
        Ok(self.get_context("webgl2")?.map(Gl::from_value))
    }
}

pub struct Performance(Value);
host_type!(Performance, Performance);

impl Performance {
    /// Milliseconds since the page started.
    pub fn now(&self) -> f64 {
        unsafe { sys::performance_now(self.0.raw()) }
    }
}
