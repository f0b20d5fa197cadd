//! Heap, primitive values, errors, console and closures.

use hostlink_abi::kind::InstanceKind;
use hostlink_abi::records::{NumberRet, BOOL_FALSE, BOOL_NOT_BOOLEAN, BOOL_TRUE};
use hostlink_abi::{EXPORT_CLOSURE_DROP, EXPORT_CLOSURE_INVOKE, IMPORT_MODULE};
use wasmtime::Linker;

use super::{allocate, cast, guard, handle, raw, read_string, value, write_record, write_string, Cx};
use crate::closure::{FunctionRef, Released};
use crate::error::BoundaryError;
use crate::host::console::ConsoleLevel;
use crate::state::HostState;
use crate::value::{HostException, HostValue};

fn console(c: &mut Cx<'_>, level: ConsoleLevel, ptr: i32, len: i32) -> Result<(), BoundaryError> {
    let text = read_string(c, ptr, len)?;
    let env = &mut c.data_mut().env;
    let at_ms = env.clock.now();
    env.console.push(level, text, at_ms);
    Ok(())
}

fn instance_of(c: &Cx<'_>, h: i32, kind: InstanceKind) -> Result<bool, BoundaryError> {
    let state = c.data();
    Ok(match (kind, state.heap.get(handle(h))?) {
        (InstanceKind::HtmlCanvasElement, HostValue::Element(el)) => state
            .env
            .document
            .element(*el)
            .is_some_and(|element| element.is_canvas()),
        (kind, value) => value.is_instance_of(kind),
    })
}

fn closure_new(c: &mut Cx<'_>, a: i32, b: i32, dtor: i32) -> Result<i32, BoundaryError> {
    let state = c.data_mut();
    let guest = state.guest.as_ref().ok_or(BoundaryError::Unbound)?;
    if guest.closure_invoke.is_none() {
        return Err(BoundaryError::MissingExport(EXPORT_CLOSURE_INVOKE));
    }
    if guest.closure_drop.is_none() {
        return Err(BoundaryError::MissingExport(EXPORT_CLOSURE_DROP));
    }
    let func = state.closures.create(a as u32, b as u32, dtor as u32);
    Ok(raw(state.heap.allocate(HostValue::Function(func))))
}

fn closure_drop(c: &mut Cx<'_>, h: i32) -> Result<i32, BoundaryError> {
    let func = cast::<FunctionRef>(c, h)?;
    let state = c.data_mut();
    state.heap.release(handle(h));
    Ok(match state.closures.release(func.id()) {
        Released::Last => 1,
        Released::Deferred | Released::Unknown => 0,
    })
}

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "object_drop_ref", |mut c: Cx<'_>, h: i32| {
        c.data_mut().heap.release(handle(h));
    })?;
    linker.func_wrap(IMPORT_MODULE, "object_clone_ref", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| Ok(raw(c.data_mut().heap.clone_ref(handle(h))?)))
    })?;

    linker.func_wrap(
        IMPORT_MODULE,
        "string_new",
        |mut c: Cx<'_>, ptr: i32, len: i32| {
            guard(&mut c, |c| {
                let s = read_string(c, ptr, len)?;
                Ok(allocate(c, HostValue::String(s)))
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "string_get", |mut c: Cx<'_>, ret: i32, h: i32| {
        guard(&mut c, |c| {
            let s = match value(c, h)? {
                HostValue::String(s) => Some(s.clone()),
                _ => None,
            };
            write_string(c, ret, s)
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "number_new", |mut c: Cx<'_>, n: f64| {
        allocate(&mut c, HostValue::Number(n))
    })?;
    linker.func_wrap(IMPORT_MODULE, "number_get", |mut c: Cx<'_>, ret: i32, h: i32| {
        guard(&mut c, |c| {
            let n = match value(c, h)? {
                HostValue::Number(n) => Some(*n),
                _ => None,
            };
            write_record(c, ret, &NumberRet::from_option(n))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "boolean_get", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| {
            let b = match value(c, h)? {
                HostValue::Bool(true) => BOOL_TRUE,
                HostValue::Bool(false) => BOOL_FALSE,
                _ => BOOL_NOT_BOOLEAN,
            };
            Ok(b as i32)
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "is_undefined", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| {
            Ok(matches!(value(c, h)?, HostValue::Undefined) as i32)
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "is_null", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| Ok(matches!(value(c, h)?, HostValue::Null) as i32))
    })?;
    linker.func_wrap(IMPORT_MODULE, "is_function", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| {
            Ok(matches!(value(c, h)?, HostValue::Function(_)) as i32)
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "instance_of", |mut c: Cx<'_>, h: i32, kind: i32| {
        guard(&mut c, |c| match InstanceKind::from_code(kind as u32) {
            Some(kind) => Ok(instance_of(c, h, kind)? as i32),
            None => Ok(0),
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "debug_string", |mut c: Cx<'_>, ret: i32, h: i32| {
        guard(&mut c, |c| {
            let text = value(c, h)?.debug_string();
            write_string(c, ret, Some(text))
        })
    })?;

    linker.func_wrap(IMPORT_MODULE, "error_new", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| {
            let message = read_string(c, ptr, len)?;
            Ok(allocate(c, HostValue::Error(HostException::error(message))))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "error_stack", |mut c: Cx<'_>, ret: i32, h: i32| {
        guard(&mut c, |c| {
            let stack = match value(c, h)? {
                HostValue::Error(exception) => Some(exception.stack.clone()),
                _ => None,
            };
            write_string(c, ret, stack)
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "throw", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| {
            let message = read_string(c, ptr, len)?;
            Err::<(), _>(BoundaryError::Thrown(message))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "rethrow", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| {
            let thrown = match c.data_mut().heap.take(handle(h))? {
                HostValue::Error(exception) => exception.to_string(),
                other => other.debug_string(),
            };
            Err::<(), _>(BoundaryError::Rethrown(thrown))
        })
    })?;

    linker.func_wrap(IMPORT_MODULE, "console_log", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| console(c, ConsoleLevel::Log, ptr, len))
    })?;
    linker.func_wrap(IMPORT_MODULE, "console_warn", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| console(c, ConsoleLevel::Warn, ptr, len))
    })?;
    linker.func_wrap(IMPORT_MODULE, "console_error", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| console(c, ConsoleLevel::Error, ptr, len))
    })?;

    linker.func_wrap(
        IMPORT_MODULE,
        "closure_new",
        |mut c: Cx<'_>, a: i32, b: i32, dtor: i32| guard(&mut c, |c| closure_new(c, a, b, dtor)),
    )?;
    linker.func_wrap(IMPORT_MODULE, "closure_drop", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| closure_drop(c, h))
    })?;

    linker.func_wrap(IMPORT_MODULE, "global_this", |mut c: Cx<'_>| {
        allocate(&mut c, HostValue::Window)
    })?;
    linker.func_wrap(IMPORT_MODULE, "math_random", |mut c: Cx<'_>| {
        c.data_mut().env.random()
    })?;
    Ok(())
}
