use super::{host_type, take_string, HostType, Value};
use crate::sys;

macro_rules! event_type {
    ($name:ident, $kind:ident) => {
        pub struct $name(Value);
        host_type!($name, $kind);

        impl $name {
            pub fn prevent_default(&self) {
                unsafe { sys::event_prevent_default(self.0.raw()) }
            }
        }
    };
}

/// Any event; the argument passed to a handler closure.
pub struct Event(Value);

impl Event {
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    pub fn prevent_default(&self) {
        unsafe { sys::event_prevent_default(self.0.raw()) }
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn cast<T: HostType>(self) -> Result<T, Event> {
        self.0.cast().map_err(Event)
    }
}

event_type!(KeyboardEvent, KeyboardEvent);

impl KeyboardEvent {
    /// The physical key, e.g. `"KeyW"`.
    pub fn code(&self) -> String {
        take_string(|ret| unsafe { sys::keyboard_event_code(ret, self.0.raw()) })
            .unwrap_or_default()
    }

    pub fn repeat(&self) -> bool {
        unsafe { sys::keyboard_event_repeat(self.0.raw()) != 0 }
    }
}

event_type!(MouseEvent, MouseEvent);

impl MouseEvent {
    pub fn button(&self) -> i32 {
        unsafe { sys::mouse_event_button(self.0.raw()) }
    }

    pub fn screen_x(&self) -> i32 {
        unsafe { sys::mouse_event_screen_x(self.0.raw()) }
    }

    pub fn screen_y(&self) -> i32 {
        unsafe { sys::mouse_event_screen_y(self.0.raw()) }
    }
}

event_type!(WheelEvent, WheelEvent);

impl WheelEvent {
    pub fn delta_x(&self) -> f64 {
        unsafe { sys::wheel_event_delta_x(self.0.raw()) }
    }

    pub fn delta_y(&self) -> f64 {
        unsafe { sys::wheel_event_delta_y(self.0.raw()) }
    }

    pub fn delta_z(&self) -> f64 {
        unsafe { sys::wheel_event_delta_z(self.0.raw()) }
    }
}

event_type!(TouchEvent, TouchEvent);

impl TouchEvent {
    pub fn changed_touches(&self) -> TouchList {
        TouchList(Value::from_raw(unsafe {
            sys::touch_event_changed_touches(self.0.raw())
        }))
    }
}

pub struct TouchList(Value);

impl TouchList {
    pub fn len(&self) -> u32 {
        unsafe { sys::touch_list_length(self.0.raw()) }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: u32) -> Option<Touch> {
        (index < self.len())
            .then(|| Touch(Value::from_raw(unsafe { sys::touch_list_get(self.0.raw(), index) })))
    }

    pub fn iter(&self) -> impl Iterator<Item = Touch> + '_ {
        (0..self.len()).filter_map(|i| self.get(i))
    }
}

pub struct Touch(Value);

impl Touch {
    pub fn identifier(&self) -> i32 {
        unsafe { sys::touch_identifier(self.0.raw()) }
    }

    pub fn screen_x(&self) -> i32 {
        unsafe { sys::touch_screen_x(self.0.raw()) }
    }

    pub fn screen_y(&self) -> i32 {
        unsafe { sys::touch_screen_y(self.0.raw()) }
    }
}
