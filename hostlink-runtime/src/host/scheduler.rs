use std::collections::{BTreeMap, VecDeque};

use crate::closure::FunctionRef;
use crate::host::promise::Reaction;
use crate::host::promise::PromiseId;
use crate::host::Reachable;
use crate::value::HostValue;

/// Work run once the current call returns to the host, before any task.
#[derive(Debug)]
pub enum Microtask {
    Callback(FunctionRef),
    Reaction(Reaction),
}

/// Work run on a later turn of the event loop.
#[derive(Debug)]
pub enum Task {
    Callback { func: FunctionRef, arg: HostValue },
    Fetch { promise: PromiseId, url: String },
}

/// Single-threaded run queues. Every queued callback runs at most once.
#[derive(Debug)]
pub struct Scheduler {
    next_frame_id: u32,
    frames: BTreeMap<u32, FunctionRef>,
    microtasks: VecDeque<Microtask>,
    tasks: VecDeque<Task>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            next_frame_id: 1,
            frames: BTreeMap::new(),
            microtasks: VecDeque::new(),
            tasks: VecDeque::new(),
        }
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a callback for the next frame and returns its id.
    pub fn request_frame(&mut self, func: FunctionRef) -> u32 {
        let id = self.next_frame_id;
        self.next_frame_id = self.next_frame_id.wrapping_add(1).max(1);
        self.frames.insert(id, func);
        id
    }

    pub fn cancel_frame(&mut self, id: u32) -> bool {
        self.frames.remove(&id).is_some()
    }

    /// Takes every callback registered so far, in registration order.
    /// Callbacks registered while these run wait for the following frame.
    pub fn take_frame_callbacks(&mut self) -> Vec<(u32, FunctionRef)> {
        std::mem::take(&mut self.frames).into_iter().collect()
    }

    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn queue_microtask(&mut self, task: Microtask) {
        self.microtasks.push_back(task);
    }

    pub fn next_microtask(&mut self) -> Option<Microtask> {
        self.microtasks.pop_front()
    }

    pub fn queue_task(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    pub fn next_task(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// No microtasks or tasks are waiting. Frame callbacks don't count.
    pub fn is_idle(&self) -> bool {
        self.microtasks.is_empty() && self.tasks.is_empty()
    }

    /// Adds the promises and responses queued work refers to.
    pub fn mark(&self, reachable: &mut Reachable) {
        for task in &self.microtasks {
            if let Microtask::Reaction(reaction) = task {
                reachable.promises.insert(reaction.derived);
                reachable.value(&reaction.argument);
            }
        }
        for task in &self.tasks {
            match task {
                Task::Callback { arg, .. } => reachable.value(arg),
                Task::Fetch { promise, .. } => {
                    reachable.promises.insert(*promise);
                }
            }
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.microtasks.clear();
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ClosureTable;

    #[test]
    fn test_frames_run_once_in_order() {
        let mut closures = ClosureTable::new();
        let mut sched = Scheduler::new();
        let a = sched.request_frame(closures.create(1, 0, 0));
        let b = sched.request_frame(closures.create(2, 0, 0));
        assert!(a >= 1 && b > a);

        let due = sched.take_frame_callbacks();
        assert_eq!(due.iter().map(|(id, _)| *id).collect::<Vec<_>>(), vec![a, b]);
        assert!(sched.take_frame_callbacks().is_empty());
    }

    #[test]
    fn test_cancel_frame() {
        let mut closures = ClosureTable::new();
        let mut sched = Scheduler::new();
        let id = sched.request_frame(closures.create(1, 0, 0));
        assert!(sched.cancel_frame(id));
        assert!(!sched.cancel_frame(id));
        assert_eq!(sched.pending_frames(), 0);
    }

    #[test]
    fn test_queues_are_fifo() {
        let mut closures = ClosureTable::new();
        let mut sched = Scheduler::new();
        assert!(sched.is_idle());
        let first = closures.create(1, 0, 0);
        let second = closures.create(2, 0, 0);
        sched.queue_microtask(Microtask::Callback(first.clone()));
        sched.queue_microtask(Microtask::Callback(second));
        sched.queue_task(Task::Fetch {
            promise: PromiseId(0),
            url: "a.bin".into(),
        });
        assert!(!sched.is_idle());

        match sched.next_microtask() {
            Some(Microtask::Callback(f)) => assert_eq!(f, first),
            other => panic!("unexpected {other:?}"),
        }
        assert!(sched.next_microtask().is_some());
        assert!(matches!(sched.next_task(), Some(Task::Fetch { .. })));
        assert!(sched.is_idle());
    }
}
