//! Headless model of the host environment a compute module talks to.

pub mod clock;
pub mod console;
pub mod dom;
pub mod event;
pub mod fetch;
pub mod gl;
pub mod promise;
pub mod scheduler;

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::RuntimeConfig;
use clock::Clock;
use console::Console;
use dom::{Document, ElementId};
use fetch::{DirFetcher, Fetch, ResponseId, Responses};
use gl::{ContextId, GlContext};
use promise::{PromiseId, Promises};
use scheduler::Scheduler;

use crate::value::HostValue;

/// Promises and responses something still refers to.
#[derive(Debug, Default)]
pub struct Reachable {
    pub promises: HashSet<PromiseId>,
    pub responses: HashSet<ResponseId>,
}

impl Reachable {
    pub fn value(&mut self, value: &HostValue) {
        match value {
            HostValue::Promise(id) => {
                self.promises.insert(*id);
            }
            HostValue::Response(id) => {
                self.responses.insert(*id);
            }
            _ => {}
        }
    }
}

/// Everything the adapters act on, apart from the handle and closure
/// tables.
pub struct HostEnv {
    pub document: Document,
    pub scheduler: Scheduler,
    pub promises: Promises,
    pub responses: Responses,
    pub clock: Clock,
    pub console: Console,
    fetcher: Arc<dyn Fetch>,
    contexts: Vec<GlContext>,
    rng: StdRng,
    trace_capacity: usize,
}

impl HostEnv {
    pub fn new(config: &RuntimeConfig, fetcher: Option<Arc<dyn Fetch>>) -> Self {
        let fetcher =
            fetcher.unwrap_or_else(|| Arc::new(DirFetcher::new(config.resources.root.clone())));
        let rng = match config.clock.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            document: Document::from_config(&config.canvas),
            scheduler: Scheduler::new(),
            promises: Promises::new(),
            responses: Responses::new(),
            clock: Clock::new(config.clock.mode),
            console: Console::new(config.console.capacity),
            fetcher,
            contexts: Vec::new(),
            rng,
            trace_capacity: config.trace.capacity,
        }
    }

    pub fn fetcher(&self) -> Arc<dyn Fetch> {
        Arc::clone(&self.fetcher)
    }

    /// `Math.random()`: uniform in `[0, 1)`.
    pub fn random(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }

    /// `canvas.getContext("webgl2")`: one context per canvas, created on
    /// first request. `None` when `el` is not a canvas.
    pub fn webgl2_context(&mut self, el: ElementId) -> Option<ContextId> {
        let element = self.document.element(el)?;
        let canvas = element.canvas()?;
        if let Some(existing) = canvas.context {
            return Some(existing);
        }
        let (width, height) = (canvas.width, canvas.height);
        let id = ContextId(self.contexts.len() as u32);
        self.contexts
            .push(GlContext::new(el, width, height, self.trace_capacity));
        if let Some(canvas) = self.document.element_mut(el).and_then(|e| e.canvas_mut()) {
            canvas.context = Some(id);
        }
        log::debug!("created WebGL2 context {} for canvas {:?}", id.0, el);
        Some(id)
    }

    pub fn gl(&self, id: ContextId) -> Option<&GlContext> {
        self.contexts.get(id.0 as usize)
    }

    pub fn gl_mut(&mut self, id: ContextId) -> Option<&mut GlContext> {
        self.contexts.get_mut(id.0 as usize)
    }

    pub fn contexts(&self) -> impl Iterator<Item = &GlContext> {
        self.contexts.iter()
    }

    /// Frees the promises and responses not reachable from `reachable`
    /// (the heap and the run queues). Returns `(promises, responses)`
    /// freed.
    pub fn collect_unreachable(&mut self, mut reachable: Reachable) -> (usize, usize) {
        self.scheduler.mark(&mut reachable);
        let promises = self.promises.retain(&mut reachable);
        let responses = self.responses.retain(&reachable.responses);
        (promises, responses)
    }

    /// Drops everything that can hold a module closure.
    pub fn clear_callbacks(&mut self) {
        self.document.clear_handlers();
        self.scheduler.clear();
        self.promises.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockMode;

    fn env() -> HostEnv {
        let mut config = RuntimeConfig::default();
        config.clock.mode = ClockMode::Manual;
        config.clock.random_seed = Some(42);
        HostEnv::new(&config, None)
    }

    #[test]
    fn test_context_is_created_once_per_canvas() {
        let mut env = env();
        let canvas = env.document.element_by_id("canvas").unwrap();
        let first = env.webgl2_context(canvas).unwrap();
        let second = env.webgl2_context(canvas).unwrap();
        assert_eq!(first, second);
        assert_eq!(env.contexts().count(), 1);
        assert_eq!(env.gl(first).unwrap().current_viewport(), [0, 0, 300, 150]);

        let div = env.document.create_element("div");
        assert!(env.webgl2_context(div).is_none());
    }

    #[test]
    fn test_seeded_random() {
        let mut a = env();
        let mut b = env();
        let x = a.random();
        assert!((0.0..1.0).contains(&x));
        assert_eq!(x, b.random());
    }
}
