//! Per-store host state and the module exports bound to it.

use std::sync::Arc;

use hostlink_abi::{
    EXPORT_ALLOC, EXPORT_CLOSURE_DROP, EXPORT_CLOSURE_INVOKE, EXPORT_FREE, EXPORT_MEMORY,
    EXPORT_REALLOC, EXPORT_START,
};
use wasmtime::{Instance, Memory, Store, TypedFunc, WasmParams, WasmResults};

use crate::closure::ClosureTable;
use crate::config::RuntimeConfig;
use crate::error::{BoundaryError, InstantiationError};
use crate::heap::{Handle, HandleTable};
use crate::host::fetch::Fetch;
use crate::host::gl::{ContextId, GlContext};
use crate::host::promise::{Outcome, PromiseId, Reaction};
use crate::host::scheduler::Microtask;
use crate::host::{HostEnv, Reachable};
use crate::memory::RegionView;

/// Exports the host calls back into.
#[derive(Clone)]
pub struct GuestExports {
    pub memory: Memory,
    pub alloc: TypedFunc<(i32, i32), i32>,
    pub realloc: TypedFunc<(i32, i32, i32, i32), i32>,
    pub free: Option<TypedFunc<(i32, i32, i32), ()>>,
    pub start: TypedFunc<(), ()>,
    pub closure_invoke: Option<TypedFunc<(i32, i32, i32), ()>>,
    pub closure_drop: Option<TypedFunc<(i32, i32, i32), ()>>,
}

impl GuestExports {
    pub fn bind(
        instance: &Instance,
        store: &mut Store<HostState>,
    ) -> Result<Self, InstantiationError> {
        let memory = instance
            .get_memory(&mut *store, EXPORT_MEMORY)
            .ok_or(InstantiationError::MissingExport(EXPORT_MEMORY))?;
        Ok(Self {
            memory,
            alloc: required(instance, store, EXPORT_ALLOC)?,
            realloc: required(instance, store, EXPORT_REALLOC)?,
            free: optional(instance, store, EXPORT_FREE),
            start: required(instance, store, EXPORT_START)?,
            closure_invoke: optional(instance, store, EXPORT_CLOSURE_INVOKE),
            closure_drop: optional(instance, store, EXPORT_CLOSURE_DROP),
        })
    }
}

fn required<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &'static str,
) -> Result<TypedFunc<P, R>, InstantiationError> {
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|_| InstantiationError::MissingExport(name))
}

fn optional<P: WasmParams, R: WasmResults>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &'static str,
) -> Option<TypedFunc<P, R>> {
    let func = instance.get_func(&mut *store, name)?;
    match func.typed::<P, R>(&*store) {
        Ok(typed) => Some(typed),
        Err(e) => {
            log::warn!("ignoring export `{name}` with unexpected signature: {e}");
            None
        }
    }
}

/// Everything a boundary call can reach: the handle and closure tables,
/// the host model and, once instantiation has bound them, the module's
/// memory and allocator.
pub struct HostState {
    pub heap: HandleTable,
    pub closures: ClosureTable,
    pub env: HostEnv,
    pub(crate) guest: Option<GuestExports>,
    pub(crate) views: RegionView,
    fault: Option<BoundaryError>,
    collect_at: usize,
}

/// Promise and response count below which no collection is attempted.
const COLLECT_MIN: usize = 64;

impl HostState {
    pub fn new(config: &RuntimeConfig, fetcher: Option<Arc<dyn Fetch>>) -> Self {
        Self {
            heap: HandleTable::new(config.heap.reserved_slots),
            closures: ClosureTable::new(),
            env: HostEnv::new(config, fetcher),
            guest: None,
            views: RegionView::default(),
            fault: None,
            collect_at: COLLECT_MIN,
        }
    }

    /// True once memory and the allocator exports are bound.
    pub fn is_bound(&self) -> bool {
        self.guest.is_some()
    }

    pub fn exports(&self) -> Option<&GuestExports> {
        self.guest.as_ref()
    }

    /// The WebGL2 context behind a context handle.
    pub fn gl(&mut self, ctx: Handle) -> Result<&mut GlContext, BoundaryError> {
        let id = self.heap.cast::<ContextId>(ctx)?;
        self.env
            .gl_mut(id)
            .ok_or(BoundaryError::InvalidHandle(ctx.raw()))
    }

    /// Records a boundary violation and turns it into a trap.
    pub(crate) fn fail(&mut self, err: BoundaryError) -> wasmtime::Error {
        log::error!("boundary violation: {err}");
        self.fault = Some(err.clone());
        wasmtime::Error::new(err)
    }

    /// The violation behind the most recent trap, if the host raised it.
    pub(crate) fn take_fault(&mut self) -> Option<BoundaryError> {
        self.fault.take()
    }

    /// Frees the promises and responses that neither a handle nor queued
    /// work refers to. Returns `(promises, responses)` freed.
    pub fn collect_unreachable(&mut self) -> (usize, usize) {
        let mut reachable = Reachable::default();
        for value in self.heap.values() {
            reachable.value(value);
        }
        let freed = self.env.collect_unreachable(reachable);
        let live = self.env.promises.len() + self.env.responses.len();
        self.collect_at = (live * 2).max(COLLECT_MIN);
        if freed != (0, 0) {
            log::trace!(
                "freed {} promises and {} responses, {live} remain",
                freed.0,
                freed.1
            );
        }
        freed
    }

    /// [`collect_unreachable`](Self::collect_unreachable) once the stores
    /// have doubled since the last collection.
    pub(crate) fn maybe_collect(&mut self) {
        if self.env.promises.len() + self.env.responses.len() >= self.collect_at {
            self.collect_unreachable();
        }
    }

    /// Settles `promise` and queues whatever reactions became due.
    pub fn settle(&mut self, promise: PromiseId, outcome: Outcome) {
        let due = self.env.promises.settle(promise, outcome);
        self.queue_reactions(due);
    }

    pub fn queue_reactions(&mut self, reactions: impl IntoIterator<Item = Reaction>) {
        for reaction in reactions {
            self.env
                .scheduler
                .queue_microtask(Microtask::Reaction(reaction));
        }
    }
}
