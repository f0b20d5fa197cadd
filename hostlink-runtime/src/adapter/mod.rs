//! Call adapters: the flat numeric functions registered under the
//! `hostlink` import module.
//!
//! Each adapter resolves its handle arguments, decodes strings out of
//! linear memory, calls into the host model and encodes the result. A
//! boundary violation (bad handle, bad UTF-8, out-of-bounds region) traps
//! the call; errors raised by the host API itself are returned to the
//! module as a `CallResult` holding an `Error` handle.

mod dom;
mod event;
mod fetch;
mod gl;
mod sched;
mod values;

use bytemuck::Pod;
use hostlink_abi::imports;
use hostlink_abi::records::{CallResult, StrRet};
use hostlink_abi::IMPORT_MODULE;
use wasmtime::{AsContext, AsContextMut, Caller, Engine, IntoFunc, Linker, Memory};

use crate::error::{BoundaryError, InstantiationError};
use crate::heap::Handle;
use crate::memory::{string_from_region, string_to_region, write_pod, Allocator, LinearMemory};
use crate::state::{GuestExports, HostState};
use crate::value::{FromHostValue, HostException, HostValue};

pub(crate) type Cx<'a> = Caller<'a, HostState>;

/// Runs an adapter body, turning a boundary error into a trap.
pub(crate) fn guard<R>(
    caller: &mut Cx<'_>,
    body: impl FnOnce(&mut Cx<'_>) -> Result<R, BoundaryError>,
) -> wasmtime::Result<R> {
    body(caller).map_err(|err| caller.data_mut().fail(err))
}

pub(crate) fn handle(raw: i32) -> Handle {
    Handle::from_raw(raw as u32)
}

pub(crate) fn raw(handle: Handle) -> i32 {
    handle.raw() as i32
}

pub(crate) fn value<'c>(c: &'c Cx<'_>, h: i32) -> Result<&'c HostValue, BoundaryError> {
    c.data().heap.get(handle(h))
}

pub(crate) fn cast<T: FromHostValue>(c: &Cx<'_>, h: i32) -> Result<T, BoundaryError> {
    c.data().heap.cast(handle(h))
}

pub(crate) fn allocate(c: &mut Cx<'_>, value: HostValue) -> i32 {
    raw(c.data_mut().heap.allocate(value))
}

pub(crate) fn memory(c: &Cx<'_>) -> Result<Memory, BoundaryError> {
    c.data()
        .guest
        .as_ref()
        .map(|guest| guest.memory)
        .ok_or(BoundaryError::Unbound)
}

pub(crate) fn read_string(c: &Cx<'_>, ptr: i32, len: i32) -> Result<String, BoundaryError> {
    let mem = memory(c)?;
    string_from_region(mem.data(c), ptr as u32, len as u32)
}

/// Writes a fixed-layout record into the caller's return area.
pub(crate) fn write_record<T: Pod>(
    c: &mut Cx<'_>,
    ret: i32,
    record: &T,
) -> Result<(), BoundaryError> {
    let mem = memory(c)?;
    write_pod(mem.data_mut(&mut *c), ret as u32, record)
}

/// Writes a `CallResult`; an exception is stored in the heap and its
/// handle handed to the module.
pub(crate) fn write_result(
    c: &mut Cx<'_>,
    ret: i32,
    outcome: Result<u32, HostException>,
) -> Result<(), BoundaryError> {
    let record = match outcome {
        Ok(value) => CallResult::ok(value),
        Err(exception) => {
            log::debug!("returning {exception} to the module");
            CallResult::err(c.data_mut().heap.allocate(HostValue::Error(exception)).raw())
        }
    };
    write_record(c, ret, &record)
}

/// Copies `value` into a fresh module allocation and writes its `StrRet`.
pub(crate) fn write_string(
    c: &mut Cx<'_>,
    ret: i32,
    value: Option<String>,
) -> Result<(), BoundaryError> {
    let record = match value {
        Some(value) => string_to_region(&mut GuestCx::new(&mut *c)?, &value)?.to_str_ret(),
        None => StrRet::absent(),
    };
    write_record(c, ret, &record)
}

/// Linear memory plus the allocator exports, reachable through any store
/// context. Allocating may grow memory, so slices taken from it never
/// outlive a single accessor call.
pub struct GuestCx<'a, S: AsContextMut<Data = HostState>> {
    store: &'a mut S,
    exports: GuestExports,
}

impl<'a, S: AsContextMut<Data = HostState>> GuestCx<'a, S> {
    pub fn new(store: &'a mut S) -> Result<Self, BoundaryError> {
        let exports = store
            .as_context_mut()
            .data_mut()
            .guest
            .clone()
            .ok_or(BoundaryError::Unbound)?;
        Ok(Self { store, exports })
    }

    fn observe_growth(&mut self) {
        let (epoch, len) = (self.epoch(), self.byte_len());
        let mut cx = self.store.as_context_mut();
        let views = &mut cx.data_mut().views;
        if views.observe(epoch, len) && views.reacquisitions() > 0 {
            log::trace!("linear memory grew to {len} bytes");
        }
    }
}

impl<S: AsContextMut<Data = HostState>> LinearMemory for GuestCx<'_, S> {
    fn data(&self) -> &[u8] {
        self.exports.memory.data(self.store.as_context())
    }

    fn data_mut(&mut self) -> &mut [u8] {
        self.exports.memory.data_mut(self.store.as_context_mut())
    }
}

impl<S: AsContextMut<Data = HostState>> Allocator for GuestCx<'_, S> {
    fn alloc(&mut self, size: u32, align: u32) -> Result<u32, BoundaryError> {
        let ptr = self
            .exports
            .alloc
            .call(self.store.as_context_mut(), (size as i32, align as i32))
            .map_err(|e| BoundaryError::Alloc(e.to_string()))?;
        if ptr == 0 {
            return Err(BoundaryError::Alloc(format!(
                "hl_alloc({size}, {align}) returned null"
            )));
        }
        self.observe_growth();
        Ok(ptr as u32)
    }

    fn realloc(
        &mut self,
        ptr: u32,
        old_size: u32,
        new_size: u32,
        align: u32,
    ) -> Result<u32, BoundaryError> {
        let args = (ptr as i32, old_size as i32, new_size as i32, align as i32);
        let ptr = self
            .exports
            .realloc
            .call(self.store.as_context_mut(), args)
            .map_err(|e| BoundaryError::Alloc(e.to_string()))?;
        if ptr == 0 {
            return Err(BoundaryError::Alloc(format!(
                "hl_realloc(.., {old_size}, {new_size}, {align}) returned null"
            )));
        }
        self.observe_growth();
        Ok(ptr as u32)
    }
}

fn link(linker: &mut Linker<HostState>) -> wasmtime::Result<()> {
    values::link(linker)?;
    dom::link(linker)?;
    event::link(linker)?;
    sched::link(linker)?;
    fetch::link(linker)?;
    gl::link(linker)?;
    Ok(())
}

/// The import resolver: every `hostlink` adapter, plus whatever further
/// namespaces the embedder registers before instantiation.
pub struct ImportTable {
    linker: Linker<HostState>,
    extra: Vec<(String, String)>,
}

impl ImportTable {
    pub fn new(engine: &Engine) -> Result<Self, InstantiationError> {
        let mut linker = Linker::new(engine);
        link(&mut linker).map_err(|e| InstantiationError::Link(e.to_string()))?;
        Ok(Self {
            linker,
            extra: Vec::new(),
        })
    }

    /// Registers an additional host function.
    pub fn func_wrap<Params, Args>(
        &mut self,
        module: &str,
        name: &str,
        func: impl IntoFunc<HostState, Params, Args>,
    ) -> Result<&mut Self, InstantiationError> {
        self.linker
            .func_wrap(module, name, func)
            .map_err(|e| InstantiationError::Link(format!("{module}::{name}: {e}")))?;
        self.extra.push((module.to_string(), name.to_string()));
        Ok(self)
    }

    /// Whether `module::name` resolves against this table.
    pub fn provides(&self, module: &str, name: &str) -> bool {
        (module == IMPORT_MODULE && imports::lookup(name).is_some())
            || self.extra.iter().any(|(m, n)| m == module && n == name)
    }

    pub(crate) fn linker(&self) -> &Linker<HostState> {
        &self.linker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use hostlink_abi::imports::ValType;
    use wasmtime::{Extern, Store};

    fn val_type(ty: ValType) -> wasmtime::ValType {
        match ty {
            ValType::I32 => wasmtime::ValType::I32,
            ValType::F32 => wasmtime::ValType::F32,
            ValType::F64 => wasmtime::ValType::F64,
        }
    }

    #[test]
    fn test_linker_defines_every_import() {
        let engine = Engine::default();
        let table = ImportTable::new(&engine).unwrap();
        let mut store = Store::new(&engine, HostState::new(&RuntimeConfig::default(), None));

        for sig in imports::IMPORTS {
            let Some(Extern::Func(func)) = table.linker().get(&mut store, IMPORT_MODULE, sig.name)
            else {
                panic!("import {} is not defined", sig.name);
            };
            let ty = func.ty(&store);
            let params: Vec<String> = ty.params().map(|p| p.to_string()).collect();
            let expected: Vec<String> = sig.params.iter().map(|p| val_type(*p).to_string()).collect();
            assert_eq!(params, expected, "params of {}", sig.name);
            let results: Vec<String> = ty.results().map(|r| r.to_string()).collect();
            let expected: Vec<String> =
                sig.results.iter().map(|r| val_type(*r).to_string()).collect();
            assert_eq!(results, expected, "results of {}", sig.name);
        }
    }

    #[test]
    fn test_linker_defines_nothing_else() {
        let engine = Engine::default();
        let table = ImportTable::new(&engine).unwrap();
        let mut store = Store::new(&engine, HostState::new(&RuntimeConfig::default(), None));
        let defined: Vec<String> = table
            .linker()
            .iter(&mut store)
            .map(|(module, name, _)| format!("{module}::{name}"))
            .collect();
        assert_eq!(defined.len(), imports::IMPORTS.len());
    }

    #[test]
    fn test_embedder_imports() {
        let engine = Engine::default();
        let mut table = ImportTable::new(&engine).unwrap();
        assert!(table.provides(IMPORT_MODULE, "gl_clear"));
        assert!(!table.provides("snippets", "now"));
        table.func_wrap("snippets", "now", || 1.5f64).unwrap();
        assert!(table.provides("snippets", "now"));
        assert!(table.func_wrap(IMPORT_MODULE, "gl_clear", |_: i32| {}).is_err());
    }
}
