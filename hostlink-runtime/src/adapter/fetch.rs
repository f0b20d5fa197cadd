//! Promises, `fetch()`, responses and byte arrays.

use std::sync::Arc;

use hostlink_abi::kind::InstanceKind;
use hostlink_abi::IMPORT_MODULE;
use wasmtime::Linker;

use super::dom::expect;
use super::{allocate, cast, guard, handle, memory, read_string, value, write_result, Cx};
use crate::closure::FunctionRef;
use crate::error::BoundaryError;
use crate::host::fetch::{Response, ResponseId};
use crate::host::promise::PromiseId;
use crate::host::scheduler::Task;
use crate::memory::{bytes_in, write_bytes};
use crate::state::HostState;
use crate::value::{HostException, HostValue};

fn then(c: &mut Cx<'_>, p: i32, on_ok: i32, on_err: i32) -> Result<i32, BoundaryError> {
    let promise = cast::<PromiseId>(c, p)?;
    let heap = &c.data().heap;
    let on_ok = heap.cast_optional::<FunctionRef>(handle(on_ok))?;
    let on_err = heap.cast_optional::<FunctionRef>(handle(on_err))?;
    let state = c.data_mut();
    let (derived, ready) = state.env.promises.then(promise, on_ok, on_err);
    state.queue_reactions(ready);
    Ok(allocate(c, HostValue::Promise(derived)))
}

fn response<'c>(c: &'c Cx<'_>, h: i32) -> Result<&'c Response, BoundaryError> {
    let id = cast::<ResponseId>(c, h)?;
    c.data()
        .env
        .responses
        .get(id)
        .ok_or(BoundaryError::InvalidHandle(h as u32))
}

fn bytes(c: &Cx<'_>, h: i32) -> Result<Arc<[u8]>, BoundaryError> {
    match value(c, h)? {
        HostValue::Bytes(bytes) => Ok(Arc::clone(bytes)),
        other => Err(BoundaryError::TypeMismatch {
            handle: h as u32,
            expected: InstanceKind::ArrayBuffer.name(),
            found: other.type_name(),
        }),
    }
}

fn array_buffer(c: &mut Cx<'_>, ret: i32, r: i32) -> Result<(), BoundaryError> {
    let id = cast::<ResponseId>(c, r)?;
    let state = c.data_mut();
    let outcome = match state.env.responses.take_body(id) {
        Some(body) => {
            let promise = state.env.promises.resolved(HostValue::Bytes(body));
            Ok(state.heap.allocate(HostValue::Promise(promise)).raw())
        }
        None => Err(HostException::type_error(
            "Failed to execute 'arrayBuffer' on 'Response': body stream already read",
        )),
    };
    write_result(c, ret, outcome)
}

fn copy_to(c: &mut Cx<'_>, h: i32, ptr: i32, len: i32) -> Result<(), BoundaryError> {
    let bytes = bytes(c, h)?;
    if len as u32 as usize != bytes.len() {
        return Err(BoundaryError::OutOfBounds {
            ptr: ptr as u32,
            len: len as u32,
            size: bytes.len(),
        });
    }
    let mem = memory(c)?;
    write_bytes(mem.data_mut(&mut *c), ptr as u32, &bytes)
}

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(IMPORT_MODULE, "promise_resolve", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| {
            let resolved = value(c, h)?.clone();
            let promise = c.data_mut().env.promises.resolved(resolved);
            Ok(allocate(c, HostValue::Promise(promise)))
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "promise_then", |mut c: Cx<'_>, p: i32, f: i32| {
        guard(&mut c, |c| then(c, p, f, 0))
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "promise_then2",
        |mut c: Cx<'_>, p: i32, f: i32, r: i32| guard(&mut c, |c| then(c, p, f, r)),
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "window_fetch",
        |mut c: Cx<'_>, win: i32, ptr: i32, len: i32| {
            guard(&mut c, |c| {
                expect(c, win, InstanceKind::Window)?;
                let url = read_string(c, ptr, len)?;
                log::debug!("fetch({url:?})");
                let env = &mut c.data_mut().env;
                let promise = env.promises.create();
                env.scheduler.queue_task(Task::Fetch { promise, url });
                Ok(allocate(c, HostValue::Promise(promise)))
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "response_ok", |mut c: Cx<'_>, r: i32| {
        guard(&mut c, |c| Ok(response(c, r)?.ok() as i32))
    })?;
    linker.func_wrap(IMPORT_MODULE, "response_status", |mut c: Cx<'_>, r: i32| {
        guard(&mut c, |c| Ok(i32::from(response(c, r)?.status)))
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "response_array_buffer",
        |mut c: Cx<'_>, ret: i32, r: i32| guard(&mut c, |c| array_buffer(c, ret, r)),
    )?;

    linker.func_wrap(IMPORT_MODULE, "bytes_length", |mut c: Cx<'_>, h: i32| {
        guard(&mut c, |c| Ok(bytes(c, h)?.len() as i32))
    })?;
    linker.func_wrap(
        IMPORT_MODULE,
        "bytes_copy_to",
        |mut c: Cx<'_>, h: i32, ptr: i32, len: i32| guard(&mut c, |c| copy_to(c, h, ptr, len)),
    )?;
    linker.func_wrap(IMPORT_MODULE, "bytes_from_region", |mut c: Cx<'_>, ptr: i32, len: i32| {
        guard(&mut c, |c| {
            let mem = memory(c)?;
            let copied: Arc<[u8]> = bytes_in(mem.data(&*c), ptr as u32, len as u32)?.into();
            Ok(allocate(c, HostValue::Bytes(copied)))
        })
    })?;
    Ok(())
}
