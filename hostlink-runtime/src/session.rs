//! A loaded compute module and the host it talks to.
//!
//! The session drives the single-threaded event loop: module calls,
//! dispatched events, animation frames, microtasks and tasks all run on the
//! caller's thread, one at a time. Host callbacks never re-enter a closure
//! that is already running.

use std::sync::Arc;

use wasmtime::{Engine, Instance, Store, WasmParams, WasmResults};

use crate::adapter::{GuestCx, ImportTable};
use crate::closure::{Destroy, FunctionRef};
use crate::config::RuntimeConfig;
use crate::error::{BoundaryError, InstantiationError, SessionError};
use crate::host::dom::ElementId;
use crate::host::event::EventRecord;
use crate::host::fetch::Fetch;
use crate::host::promise::PromiseId;
use crate::host::scheduler::{Microtask, Task};
use crate::instance::{compile, fetch_locator, InitState, ModuleSource};
use crate::memory::{string_from_region, string_to_region, Slice};
use crate::state::{GuestExports, HostState};
use crate::value::{HostException, HostValue};

/// Upper bound on queue entries processed by one drain. A module that keeps
/// re-queueing work past this is reported instead of spinning forever.
pub const MAX_STEPS: usize = 10_000;

/// What happened to a dispatched event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DispatchOutcome {
    /// A handler was registered and ran.
    pub invoked: bool,
    pub default_prevented: bool,
}

/// Holds the first uncaught exception of a batch of callbacks so the rest
/// of the batch still runs. Any other error stops the batch at once.
#[derive(Debug, Default)]
struct FirstUncaught(Option<String>);

impl FirstUncaught {
    fn absorb<T>(&mut self, result: Result<T, SessionError>) -> Result<Option<T>, SessionError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(SessionError::Uncaught(message)) => {
                self.0.get_or_insert(message);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn finish<T>(self, value: T) -> Result<T, SessionError> {
        match self.0 {
            Some(message) => Err(SessionError::Uncaught(message)),
            None => Ok(value),
        }
    }
}

pub struct Session {
    config: RuntimeConfig,
    engine: Engine,
    imports: ImportTable,
    fetcher: Option<Arc<dyn Fetch>>,
    store: Option<Store<HostState>>,
    instance: Option<Instance>,
    state: InitState,
}

impl Session {
    pub fn new(config: RuntimeConfig) -> Result<Self, InstantiationError> {
        Self::with_engine(Engine::default(), config)
    }

    pub fn with_engine(engine: Engine, config: RuntimeConfig) -> Result<Self, InstantiationError> {
        let imports = ImportTable::new(&engine)?;
        Ok(Self {
            config,
            engine,
            imports,
            fetcher: None,
            store: None,
            instance: None,
            state: InitState::Uninitialized,
        })
    }

    /// Serves module `fetch` calls from `fetcher` instead of the configured
    /// resource directory. Takes effect at the next instantiation.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetch>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    /// The import table, for registering embedder namespaces before
    /// instantiation.
    pub fn imports_mut(&mut self) -> &mut ImportTable {
        &mut self.imports
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn host(&self) -> Option<&HostState> {
        self.store.as_ref().map(|store| store.data())
    }

    pub fn host_mut(&mut self) -> Option<&mut HostState> {
        self.store.as_mut().map(|store| store.data_mut())
    }

    // ---- Instantiation ----

    /// Fetches, compiles, links and starts a module.
    ///
    /// Calling this on a started session is a no-op that returns the
    /// existing instance. Any failure leaves the session `Uninitialized`.
    pub async fn instantiate(
        &mut self,
        source: ModuleSource,
    ) -> Result<&Instance, InstantiationError> {
        let source = match source {
            // `Instantiating` here means an earlier call was dropped mid-fetch.
            ModuleSource::Locator(locator)
                if matches!(
                    self.state,
                    InitState::Uninitialized | InitState::Instantiating
                ) =>
            {
                self.state = InitState::Instantiating;
                match fetch_locator(&locator).await {
                    Ok(bytes) => ModuleSource::Bytes(bytes),
                    Err(e) => {
                        log::error!("{e}");
                        self.reset();
                        return Err(e);
                    }
                }
            }
            other => other,
        };
        self.instantiate_sync(source)
    }

    /// [`instantiate`](Self::instantiate) for sources already in memory.
    pub fn instantiate_sync(&mut self, source: ModuleSource) -> Result<&Instance, InstantiationError> {
        match self.state {
            InitState::Started => {
                log::debug!("module already started; ignoring {source:?}");
                return self.instance.as_ref().ok_or(InstantiationError::Terminated);
            }
            InitState::Terminated => return Err(InstantiationError::Terminated),
            _ => {}
        }
        self.state = InitState::Instantiating;
        if let Err(e) = self.bring_up(source) {
            log::error!("{e}");
            self.reset();
            return Err(e);
        }
        self.instance.as_ref().ok_or(InstantiationError::Terminated)
    }

    fn bring_up(&mut self, source: ModuleSource) -> Result<(), InstantiationError> {
        let module = match source {
            ModuleSource::Bytes(bytes) => compile(&self.engine, &bytes)?,
            ModuleSource::Compiled(module) => {
                if !Engine::same(module.engine(), &self.engine) {
                    return Err(InstantiationError::Compile(
                        "module was compiled by a different engine".to_string(),
                    ));
                }
                module
            }
            ModuleSource::Locator(locator) => {
                return Err(InstantiationError::Fetch {
                    locator,
                    reason: "locators are resolved by the async `instantiate`".to_string(),
                })
            }
        };

        let mut store = Store::new(
            &self.engine,
            HostState::new(&self.config, self.fetcher.clone()),
        );
        let instance = self
            .imports
            .linker()
            .instantiate(&mut store, &module)
            .map_err(|e| match store.data_mut().take_fault() {
                Some(fault) => InstantiationError::Start(fault.to_string()),
                None => InstantiationError::Link(format!("{e:#}")),
            })?;

        let exports = GuestExports::bind(&instance, &mut store)?;
        let start = exports.start.clone();
        store.data_mut().guest = Some(exports);
        self.state = InitState::MemoryBound;
        log::debug!("memory and allocator bound; running start");

        start.call(&mut store, ()).map_err(|e| {
            InstantiationError::Start(match store.data_mut().take_fault() {
                Some(fault) => fault.to_string(),
                None => format!("{e:#}"),
            })
        })?;

        self.store = Some(store);
        self.instance = Some(instance);
        self.state = InitState::Started;
        log::info!("module started");

        self.drain_microtasks()
            .map_err(|e| InstantiationError::Start(e.to_string()))?;
        Ok(())
    }

    fn reset(&mut self) {
        self.store = None;
        self.instance = None;
        self.state = InitState::Uninitialized;
    }

    /// Drops the module and everything the host held for it. The session
    /// can instantiate again afterwards.
    pub fn shutdown(&mut self) {
        if self.store.is_some() {
            log::info!("shutting down module");
        }
        self.reset();
    }

    fn started(&mut self) -> Result<&mut Store<HostState>, SessionError> {
        match (self.state, self.store.as_mut()) {
            (InitState::Started, Some(store)) => Ok(store),
            _ => Err(SessionError::NotStarted(self.state)),
        }
    }

    /// Maps a failed module call to a session error. An exception thrown by
    /// the module only fails the call; any other trap terminates the
    /// session.
    fn fail(&mut self, err: wasmtime::Error) -> SessionError {
        let fault = self
            .store
            .as_mut()
            .and_then(|store| store.data_mut().take_fault());
        if let Some(BoundaryError::Thrown(message) | BoundaryError::Rethrown(message)) = &fault {
            log::error!("uncaught exception: {message}");
            return SessionError::Uncaught(message.clone());
        }
        log::error!("module trapped; terminating session: {err:#}");
        self.store = None;
        self.instance = None;
        self.state = InitState::Terminated;
        match fault {
            Some(fault) => SessionError::Boundary(fault),
            None => SessionError::Trap(format!("{err:#}")),
        }
    }

    // ---- Module calls ----

    /// Calls an export, then runs the microtasks it queued.
    pub fn call<P: WasmParams, R: WasmResults>(
        &mut self,
        name: &str,
        params: P,
    ) -> Result<R, SessionError> {
        let instance = self.instance.ok_or(SessionError::NotStarted(self.state))?;
        let store = self.started()?;
        let func = instance
            .get_typed_func::<P, R>(&mut *store, name)
            .map_err(|e| SessionError::Export {
                name: name.to_string(),
                reason: format!("{e:#}"),
            })?;
        let result = func.call(&mut *store, params);
        let value = result.map_err(|e| self.fail(e))?;
        self.drain_microtasks()?;
        Ok(value)
    }

    /// Linear memory and the module's allocator.
    pub fn guest(&mut self) -> Result<GuestCx<'_, Store<HostState>>, SessionError> {
        Ok(GuestCx::new(self.started()?)?)
    }

    /// Copies `value` into a fresh module allocation.
    pub fn pass_string(&mut self, value: &str) -> Result<Slice, SessionError> {
        let mut guest = self.guest()?;
        Ok(string_to_region(&mut guest, value)?)
    }

    pub fn read_string(&mut self, ptr: u32, len: u32) -> Result<String, SessionError> {
        let guest = self.guest()?;
        Ok(string_from_region(&guest, ptr, len)?)
    }

    /// Returns an allocation to the module, if it exports a deallocator.
    pub fn free(&mut self, slice: Slice) -> Result<(), SessionError> {
        let store = self.started()?;
        let Some(free) = store.data().guest.as_ref().and_then(|g| g.free.clone()) else {
            log::trace!("module has no deallocator; leaking {} bytes", slice.len);
            return Ok(());
        };
        let result = free.call(&mut *store, (slice.ptr as i32, slice.len as i32, 1));
        result.map_err(|e| self.fail(e))
    }

    // ---- Closures ----

    /// Runs a registered closure with one argument. Returns `false` when
    /// the closure is already running or gone.
    fn invoke(&mut self, func: &FunctionRef, arg: HostValue) -> Result<bool, SessionError> {
        let store = self.started()?;
        let host = store.data_mut();
        let Some(invoke) = host.guest.as_ref().and_then(|g| g.closure_invoke.clone()) else {
            return Err(BoundaryError::MissingExport(hostlink_abi::EXPORT_CLOSURE_INVOKE).into());
        };
        let Some(invocation) = host.closures.begin_invoke(func.id()) else {
            log::trace!("{} is running or destroyed; skipping", func.id());
            return Ok(false);
        };
        // The module owns the argument handle and drops it itself.
        let arg = host.heap.from_value(arg);
        let args = (invocation.a as i32, invocation.b as i32, arg.raw() as i32);
        let result = invoke.call(&mut *store, args);
        let destroy = store.data_mut().closures.end_invoke(invocation);
        if let Err(e) = result {
            let err = self.fail(e);
            if let (SessionError::Uncaught(_), Some(destroy)) = (&err, destroy) {
                self.destroy(destroy)?;
            }
            return Err(err);
        }
        if let Some(destroy) = destroy {
            self.destroy(destroy)?;
        }
        Ok(true)
    }

    fn destroy(&mut self, destroy: Destroy) -> Result<(), SessionError> {
        let store = self.started()?;
        let Some(drop_fn) = store.data().guest.as_ref().and_then(|g| g.closure_drop.clone())
        else {
            return Err(BoundaryError::MissingExport(hostlink_abi::EXPORT_CLOSURE_DROP).into());
        };
        let args = (destroy.dtor as i32, destroy.a as i32, destroy.b as i32);
        let result = drop_fn.call(&mut *store, args);
        result.map_err(|e| self.fail(e))
    }

    /// Destroys closures the host no longer references but the module
    /// never released. Returns how many were destroyed.
    /// Unreachable promises and responses are freed as well.
    pub fn collect_garbage(&mut self) -> Result<usize, SessionError> {
        let host = self.started()?.data_mut();
        let (promises, responses) = host.collect_unreachable();
        log::debug!("freed {promises} promises and {responses} responses");
        let destroys = host.closures.sweep();
        let count = destroys.len();
        for destroy in destroys {
            self.destroy(destroy)?;
        }
        Ok(count)
    }

    // ---- Events ----

    pub fn element_by_id(&self, id: &str) -> Option<ElementId> {
        self.host()?.env.document.element_by_id(id)
    }

    /// Delivers an event to the handler registered on `target`, then runs
    /// the microtasks it queued, even when the handler threw.
    pub fn dispatch(
        &mut self,
        target: ElementId,
        event: EventRecord,
    ) -> Result<DispatchOutcome, SessionError> {
        let store = self.started()?;
        let handler = store
            .data()
            .env
            .document
            .handler(target, event.kind())
            .cloned();
        let Some(handler) = handler else {
            log::trace!("no {:?} handler on {target:?}", event.kind());
            return Ok(DispatchOutcome::default());
        };
        let mut uncaught = FirstUncaught::default();
        let invoked = uncaught
            .absorb(self.invoke(&handler, HostValue::Event(event.clone())))?
            .unwrap_or(true);
        uncaught.absorb(self.drain_microtasks())?;
        uncaught.finish(DispatchOutcome {
            invoked,
            default_prevented: event.default_prevented(),
        })
    }

    /// [`dispatch`](Self::dispatch) addressed by element id.
    pub fn dispatch_to(
        &mut self,
        id: &str,
        event: EventRecord,
    ) -> Result<DispatchOutcome, SessionError> {
        let target = self
            .element_by_id(id)
            .ok_or_else(|| SessionError::NoSuchElement(id.to_string()))?;
        self.dispatch(target, event)
    }

    /// Queues an event for the next turn of the event loop instead of
    /// delivering it now. Returns `false` when nothing listens for it.
    pub fn queue_event(&mut self, target: ElementId, event: EventRecord) -> Result<bool, SessionError> {
        let env = &mut self.started()?.data_mut().env;
        let Some(func) = env.document.handler(target, event.kind()).cloned() else {
            return Ok(false);
        };
        env.scheduler.queue_task(Task::Callback {
            func,
            arg: HostValue::Event(event),
        });
        Ok(true)
    }

    // ---- Event loop ----

    /// Runs one animation frame at `time_ms`: every callback requested
    /// before the frame, each followed by its microtasks, then any tasks
    /// that became ready. Returns how many callbacks ran.
    ///
    /// A callback that throws does not stop the others; the first
    /// exception is returned once the whole frame has run.
    pub fn frame(&mut self, time_ms: f64) -> Result<usize, SessionError> {
        let env = &mut self.started()?.data_mut().env;
        env.clock.advance_to(time_ms);
        let callbacks = env.scheduler.take_frame_callbacks();
        log::trace!("frame at {time_ms}ms: {} callbacks", callbacks.len());

        let mut uncaught = FirstUncaught::default();
        let mut ran = 0;
        for (_, func) in callbacks {
            match uncaught.absorb(self.invoke(&func, HostValue::Number(time_ms)))? {
                Some(false) => {}
                Some(true) | None => ran += 1,
            }
            uncaught.absorb(self.drain_microtasks())?;
        }
        uncaught.absorb(self.run_until_idle())?;
        uncaught.finish(ran)
    }

    /// Runs queued tasks, and the microtasks each one queues, until both
    /// queues are empty. Returns how many tasks ran.
    /// Uncaught exceptions don't stop the drain; the first one is returned
    /// once both queues are empty.
    pub fn run_until_idle(&mut self) -> Result<usize, SessionError> {
        let mut uncaught = FirstUncaught::default();
        uncaught.absorb(self.drain_microtasks())?;
        let mut steps = 0;
        loop {
            let Some(task) = self.started()?.data_mut().env.scheduler.next_task() else {
                break;
            };
            steps += 1;
            if steps > MAX_STEPS {
                return Err(SessionError::Runaway(MAX_STEPS));
            }
            uncaught.absorb(self.run_task(task))?;
            uncaught.absorb(self.drain_microtasks())?;
        }
        self.started()?.data_mut().maybe_collect();
        uncaught.finish(steps)
    }

    fn drain_microtasks(&mut self) -> Result<usize, SessionError> {
        let mut uncaught = FirstUncaught::default();
        let mut steps = 0;
        loop {
            let Some(task) = self.started()?.data_mut().env.scheduler.next_microtask() else {
                return uncaught.finish(steps);
            };
            steps += 1;
            if steps > MAX_STEPS {
                return Err(SessionError::Runaway(MAX_STEPS));
            }
            uncaught.absorb(self.run_microtask(task))?;
        }
    }

    fn run_microtask(&mut self, task: Microtask) -> Result<(), SessionError> {
        match task {
            Microtask::Callback(func) => {
                self.invoke(&func, HostValue::Undefined)?;
            }
            Microtask::Reaction(reaction) => {
                let (outcome, thrown) = match &reaction.handler {
                    Some(handler) => match self.invoke(handler, reaction.argument.clone()) {
                        Ok(_) => (Ok(HostValue::Undefined), None),
                        // The derived promise rejects with what the handler threw.
                        Err(SessionError::Uncaught(message)) => {
                            let reason = HostException::error(message.clone());
                            (Err(HostValue::Error(reason)), Some(message))
                        }
                        Err(err) => return Err(err),
                    },
                    None => (reaction.passthrough(), None),
                };
                self.started()?.data_mut().settle(reaction.derived, outcome);
                if let Some(message) = thrown {
                    return Err(SessionError::Uncaught(message));
                }
            }
        }
        Ok(())
    }

    fn run_task(&mut self, task: Task) -> Result<(), SessionError> {
        match task {
            Task::Callback { func, arg } => {
                self.invoke(&func, arg)?;
            }
            Task::Fetch { promise, url } => self.complete_fetch(promise, &url)?,
        }
        Ok(())
    }

    fn complete_fetch(&mut self, promise: PromiseId, url: &str) -> Result<(), SessionError> {
        let host = self.started()?.data_mut();
        let result = host.env.fetcher().fetch(url);
        let outcome = match host.env.responses.complete(url, result) {
            Ok(id) => {
                log::debug!("fetch({url:?}) completed");
                Ok(HostValue::Response(id))
            }
            Err(e) => {
                log::warn!("fetch({url:?}) failed: {e}");
                Err(HostValue::Error(HostException::type_error("Failed to fetch")))
            }
        };
        host.settle(promise, outcome);
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "hl_alloc") (param i32 i32) (result i32) (i32.const 1024))
          (func (export "hl_realloc") (param i32 i32 i32 i32) (result i32) (i32.const 1024))
          (func (export "hl_start")))
    "#;

    #[tokio::test]
    async fn test_locator_after_abandoned_instantiate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minimal.wat");
        std::fs::write(&path, MINIMAL).unwrap();

        let mut session = Session::new(RuntimeConfig::default()).unwrap();
        // What a future dropped during its fetch leaves behind.
        session.state = InitState::Instantiating;
        session
            .instantiate(ModuleSource::locator(path.display().to_string()))
            .await
            .unwrap();
        assert_eq!(session.state(), InitState::Started);
    }
}
