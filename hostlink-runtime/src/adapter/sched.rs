//! Animation frames, microtasks and `performance.now()`.

use hostlink_abi::kind::InstanceKind;
use hostlink_abi::IMPORT_MODULE;
use wasmtime::Linker;

use super::dom::expect;
use super::{cast, guard, value, write_result, Cx};
use crate::closure::FunctionRef;
use crate::host::scheduler::Microtask;
use crate::state::HostState;
use crate::value::{HostException, HostValue};

pub(super) fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    linker.func_wrap(
        IMPORT_MODULE,
        "request_animation_frame",
        |mut c: Cx<'_>, ret: i32, win: i32, func: i32| {
            guard(&mut c, |c| {
                expect(c, win, InstanceKind::Window)?;
                let outcome = match value(c, func)? {
                    HostValue::Function(func) => {
                        let func = func.clone();
                        Ok(c.data_mut().env.scheduler.request_frame(func))
                    }
                    other => Err(HostException::type_error(format!(
                        "Failed to execute 'requestAnimationFrame' on 'Window': \
                         parameter 1 is not of type 'Function' (got {}).",
                        other.type_name()
                    ))),
                };
                write_result(c, ret, outcome)
            })
        },
    )?;
    linker.func_wrap(
        IMPORT_MODULE,
        "cancel_animation_frame",
        |mut c: Cx<'_>, win: i32, id: i32| {
            guard(&mut c, |c| {
                expect(c, win, InstanceKind::Window)?;
                if !c.data_mut().env.scheduler.cancel_frame(id as u32) {
                    log::trace!("cancelAnimationFrame({id}): no such request");
                }
                Ok(())
            })
        },
    )?;
    linker.func_wrap(IMPORT_MODULE, "queue_microtask", |mut c: Cx<'_>, func: i32| {
        guard(&mut c, |c| {
            let func = cast::<FunctionRef>(c, func)?;
            c.data_mut()
                .env
                .scheduler
                .queue_microtask(Microtask::Callback(func));
            Ok(())
        })
    })?;
    linker.func_wrap(IMPORT_MODULE, "performance_now", |mut c: Cx<'_>, perf: i32| {
        guard(&mut c, |c| {
            expect(c, perf, InstanceKind::Performance)?;
            Ok(c.data().env.clock.now())
        })
    })?;
    Ok(())
}
