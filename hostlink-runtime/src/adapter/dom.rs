//! Window, document, element and canvas adapters.

use hostlink_abi::event::EventKind;
use hostlink_abi::handles::{NULL, UNDEFINED};
use hostlink_abi::kind::InstanceKind;
use hostlink_abi::IMPORT_MODULE;
use wasmtime::Linker;

use super::{allocate, cast, guard, handle, read_string, value, write_result, write_string, Cx};
use crate::closure::FunctionRef;
use crate::error::BoundaryError;
use crate::host::dom::{CanvasState, Element, ElementId};
use crate::state::HostState;
use crate::value::{HostException, HostValue};

/// Checks that `h` refers to an instance of `kind`.
pub(super) fn expect(c: &Cx<'_>, h: i32, kind: InstanceKind) -> Result<(), BoundaryError> {
    let value = value(c, h)?;
    if value.is_instance_of(kind) {
        Ok(())
    } else {
        Err(BoundaryError::TypeMismatch {
            handle: h as u32,
            expected: kind.name(),
            found: value.type_name(),
        })
    }
}

fn element<'c>(c: &'c Cx<'_>, h: i32) -> Result<&'c Element, BoundaryError> {
    let id = cast::<ElementId>(c, h)?;
    c.data()
        .env
        .document
        .element(id)
        .ok_or(BoundaryError::InvalidHandle(h as u32))
}

fn canvas_mismatch(h: i32) -> BoundaryError {
    BoundaryError::TypeMismatch {
        handle: h as u32,
        expected: InstanceKind::HtmlCanvasElement.name(),
        found: InstanceKind::Element.name(),
    }
}

fn canvas<'c>(c: &'c Cx<'_>, h: i32) -> Result<&'c CanvasState, BoundaryError> {
    element(c, h)?.canvas().ok_or_else(|| canvas_mismatch(h))
}

fn canvas_mut<'c>(c: &'c mut Cx<'_>, h: i32) -> Result<&'c mut CanvasState, BoundaryError> {
    let id = cast::<ElementId>(c, h)?;
    c.data_mut()
        .env
        .document
        .element_mut(id)
        .ok_or(BoundaryError::InvalidHandle(h as u32))?
        .canvas_mut()
        .ok_or_else(|| canvas_mismatch(h))
}

fn get_element_by_id(c: &mut Cx<'_>, doc: i32, ptr: i32, len: i32) -> Result<i32, BoundaryError> {
    expect(c, doc, InstanceKind::Document)?;
    let id = read_string(c, ptr, len)?;
    let found = c.data().env.document.element_by_id(&id);
    match found {
        Some(el) => Ok(allocate(c, HostValue::Element(el))),
        None => Ok(UNDEFINED as i32),
    }
}

fn set_handler(c: &mut Cx<'_>, el: i32, kind: i32, func: i32) -> Result<(), BoundaryError> {
    let el = cast::<ElementId>(c, el)?;
    let kind = EventKind::from_code(kind as u32).ok_or(BoundaryError::UnknownCode {
        what: "event kind",
        code: kind as u32,
    })?;
    let func = c.data().heap.cast_optional::<FunctionRef>(handle(func))?;
    let installed = func.is_some();
    c.data_mut().env.document.set_handler(el, kind, func);
    log::trace!(
        "{} {} on element {el:?}",
        if installed { "installed" } else { "cleared" },
        kind.handler_name()
    );
    Ok(())
}

fn get_context(c: &mut Cx<'_>, ret: i32, el: i32, ptr: i32, len: i32) -> Result<(), BoundaryError> {
    let id = cast::<ElementId>(c, el)?;
    let name = read_string(c, ptr, len)?;
    if !element(c, el)?.is_canvas() {
        let exception = HostException::type_error("canvas.getContext is not a function");
        return write_result(c, ret, Err(exception));
    }
    let context = if name == "webgl2" {
        c.data_mut().env.webgl2_context(id)
    } else {
        log::debug!("getContext({name:?}) is not supported; returning null");
        None
    };
    let result = match context {
        Some(ctx) => c.data_mut().heap.allocate(HostValue::GlContext(ctx)).raw(),
        None => NULL,
    };
    write_result(c, ret, Ok(result))
}

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "window_document", |mut c: Cx<'_>, win: i32| {
        guard(&mut c, |c| {
            expect(c, win, InstanceKind::Window)?;
            Ok(allocate(c, HostValue::Document))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "window_device_pixel_ratio", |mut c: Cx<'_>, win: i32| {
        guard(&mut c, |c| {
            expect(c, win, InstanceKind::Window)?;
            Ok(c.data().env.document.device_pixel_ratio())
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "window_performance", |mut c: Cx<'_>, win: i32| {
        guard(&mut c, |c| {
            expect(c, win, InstanceKind::Window)?;
            Ok(allocate(c, HostValue::Performance))
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "document_get_element_by_id",
        |mut c: Cx<'_>, doc: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| get_element_by_id(c, doc, ptr, len))
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "element_set_attribute",
        |mut c: Cx<'_>, ret: i32, el: i32, np: i32, nl: i32, vp: i32, vl: i32| {
            guard(&mut c, |c| {
                let id = cast::<ElementId>(c, el)?;
                let name = read_string(c, np, nl)?;
                let value = read_string(c, vp, vl)?;
                let outcome = c.data_mut().env.document.set_attribute(id, &name, &value);
                write_result(c, ret, outcome.map(|()| 0))
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "element_get_attribute",
        |mut c: Cx<'_>, ret: i32, el: i32, np: i32, nl: i32| {
            guard(&mut c, |c| {
                let name = read_string(c, np, nl)?;
                let value = element(c, el)?.attribute(&name).map(str::to_owned);
                write_string(c, ret, value)
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "element_focus", |mut c: Cx<'_>, ret: i32, el: i32| {
        guard(&mut c, |c| {
            let id = cast::<ElementId>(c, el)?;
            if !c.data_mut().env.document.focus(id) {
                log::trace!("element {id:?} is not focusable");
            }
            write_result(c, ret, Ok(0))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "element_client_width", |mut c: Cx<'_>, el: i32| {
        guard(&mut c, |c| Ok(element(c, el)?.client_width))
    })?;
    linker.func_wrap(IMPORT_MODULE, "element_client_height", |mut c: Cx<'_>, el: i32| {
        guard(&mut c, |c| Ok(element(c, el)?.client_height))
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "element_set_handler",
        |mut c: Cx<'_>, el: i32, kind: i32, func: i32| {
            guard(&mut c, |c| set_handler(c, el, kind, func))
        },
    )?;

    linker.func_wrap(IMPORT_MODULE, "canvas_width", |mut c: Cx<'_>, el: i32| {
        guard(&mut c, |c| Ok(canvas(c, el)?.width as i32))
    })?;
    linker.func_wrap(IMPORT_MODULE, "canvas_height", |mut c: Cx<'_>, el: i32| {
        guard(&mut c, |c| Ok(canvas(c, el)?.height as i32))
    })?;
    linker.func_wrap(IMPORT_MODULE, "canvas_set_width", |mut c: Cx<'_>, el: i32, w: i32| {
        guard(&mut c, |c| {
            canvas_mut(c, el)?.width = w.max(0) as u32;
            Ok(())
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "canvas_set_height", |mut c: Cx<'_>, el: i32, h: i32| {
        guard(&mut c, |c| {
            canvas_mut(c, el)?.height = h.max(0) as u32;
            Ok(())
        })
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "canvas_get_context",
        |mut c: Cx<'_>, ret: i32, el: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| get_context(c, ret, el, ptr, len))
        },
    )?;
    Ok(())
}
