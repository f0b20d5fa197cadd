//! Event field accessors.

use hostlink_abi::handles::UNDEFINED;
use hostlink_abi::IMPORT_MODULE;
use wasmtime::Linker;

use super::{allocate, guard, value, write_string, Cx};
use crate::error::BoundaryError;
use crate::host::event::{EventRecord, Touch};
use crate::state::HostState;
use crate::value::HostValue;

/// Reads a field of the event behind `h`. `None` from `field` means the
/// event is of the wrong family for this accessor.
fn with_event<R>(
    c: &Cx<'_>,
    h: i32,
    expected: &'static str,
    field: impl FnOnce(&EventRecord) -> Option<R>,
) -> Result<R, BoundaryError> {
    let value = value(c, h)?;
    let mismatch = || BoundaryError::TypeMismatch {
        handle: h as u32,
        expected,
        found: value.type_name(),
    };
    match value {
        HostValue::Event(event) => field(event).ok_or_else(mismatch),
        _ => Err(mismatch()),
    }
}

fn with_touches<R>(
    c: &Cx<'_>,
    h: i32,
    f: impl FnOnce(&[Touch]) -> R,
) -> Result<R, BoundaryError> {
    match value(c, h)? {
        HostValue::TouchList(list) => Ok(f(list)),
        other => Err(BoundaryError::TypeMismatch {
            handle: h as u32,
            expected: "TouchList",
            found: other.type_name(),
        }),
    }
}

fn touch(c: &Cx<'_>, h: i32) -> Result<Touch, BoundaryError> {
    c.data().heap.cast::<Touch>(super::handle(h))
}

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "event_prevent_default", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| with_event(c, ev, "Event", |e| Some(e.prevent_default())))
    })?;

    linker.func_wrap(IMPORT_MODULE, "keyboard_event_code", |mut c: Cx<'_>, ret: i32, ev: i32| {
        guard(&mut c, |c| {
            let code = with_event(c, ev, "KeyboardEvent", |e| e.code().map(str::to_owned))?;
            write_string(c, ret, Some(code))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "keyboard_event_repeat", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| {
            with_event(c, ev, "KeyboardEvent", |e| e.repeat().map(i32::from))
        })
    })?;

    linker.func_wrap(IMPORT_MODULE, "mouse_event_button", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| {
            with_event(c, ev, "MouseEvent", |e| e.button().map(i32::from))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "mouse_event_screen_x", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| {
            with_event(c, ev, "MouseEvent", |e| e.screen_position().map(|(x, _)| x))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "mouse_event_screen_y", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| {
            with_event(c, ev, "MouseEvent", |e| e.screen_position().map(|(_, y)| y))
        })
    })?;

    for (name, axis) in [
        ("wheel_event_delta_x", 0usize),
        ("wheel_event_delta_y", 1),
        ("wheel_event_delta_z", 2),
    ] {
        linker.func_wrap(IMPORT_MODULE, name, move |mut c: Cx<'_>, ev: i32| {
            guard(&mut c, |c| {
                with_event(c, ev, "WheelEvent", |e| e.wheel_delta().map(|d| d[axis]))
            })
        })?;
    }

    linker.func_wrap(IMPORT_MODULE, "touch_event_changed_touches", |mut c: Cx<'_>, ev: i32| {
        guard(&mut c, |c| {
            let list = with_event(c, ev, "TouchEvent", EventRecord::changed_touches)?;
            Ok(allocate(c, HostValue::TouchList(list)))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "touch_list_length", |mut c: Cx<'_>, list: i32| {
        guard(&mut c, |c| with_touches(c, list, |touches| touches.len() as i32))
    })?;
    linker.func_wrap(IMPORT_MODULE, "touch_list_get", |mut c: Cx<'_>, list: i32, index: i32| {
        guard(&mut c, |c| {
            let found = with_touches(c, list, |touches| {
                usize::try_from(index).ok().and_then(|i| touches.get(i).copied())
            })?;
            Ok(match found {
                Some(touch) => allocate(c, HostValue::Touch(touch)),
                None => UNDEFINED as i32,
            })
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "touch_identifier", |mut c: Cx<'_>, t: i32| {
        guard(&mut c, |c| Ok(touch(c, t)?.identifier))
    })?;
    linker.func_wrap(IMPORT_MODULE, "touch_screen_x", |mut c: Cx<'_>, t: i32| {
        guard(&mut c, |c| Ok(touch(c, t)?.screen_x))
    })?;
    linker.func_wrap(IMPORT_MODULE, "touch_screen_y", |mut c: Cx<'_>, t: i32| {
        guard(&mut c, |c| Ok(touch(c, t)?.screen_y))
    })?;
    Ok(())
}
