//! Host promises. Settling a promise yields the reactions to queue as
//! microtasks; running them is the session's job.
//!
//! Slots of promises nothing can reach any more are reused; see
//! [`Promises::retain`].

use crate::closure::FunctionRef;
use crate::host::Reachable;
use crate::value::HostValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PromiseId(pub(crate) u32);

pub type Outcome = Result<HostValue, HostValue>;

/// A continuation ready to run: call `handler` with `argument` (or pass
/// the outcome through when there is no handler), then settle `derived`.
#[derive(Debug)]
pub struct Reaction {
    pub handler: Option<FunctionRef>,
    pub argument: HostValue,
    pub rejected: bool,
    pub derived: PromiseId,
}

impl Reaction {
    /// The outcome `derived` settles with when there is no handler.
    pub fn passthrough(&self) -> Outcome {
        if self.rejected {
            Err(self.argument.clone())
        } else {
            Ok(self.argument.clone())
        }
    }
}

#[derive(Debug)]
struct Pending {
    on_fulfilled: Option<FunctionRef>,
    on_rejected: Option<FunctionRef>,
    derived: PromiseId,
}

impl Pending {
    fn react(self, outcome: &Outcome) -> Reaction {
        let (handler, argument, rejected) = match outcome {
            Ok(value) => (self.on_fulfilled, value.clone(), false),
            Err(reason) => (self.on_rejected, reason.clone(), true),
        };
        Reaction {
            handler,
            argument,
            rejected,
            derived: self.derived,
        }
    }
}

#[derive(Debug)]
enum Entry {
    Pending(Vec<Pending>),
    Settled(Outcome),
    Free,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromiseState {
    Pending,
    Fulfilled,
    Rejected,
}

#[derive(Debug, Default)]
pub struct Promises {
    entries: Vec<Entry>,
    free: Vec<u32>,
}

impl Promises {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, entry: Entry) -> PromiseId {
        match self.free.pop() {
            Some(index) => {
                self.entries[index as usize] = entry;
                PromiseId(index)
            }
            None => {
                self.entries.push(entry);
                PromiseId(self.entries.len() as u32 - 1)
            }
        }
    }

    pub fn create(&mut self) -> PromiseId {
        self.insert(Entry::Pending(Vec::new()))
    }

    /// `Promise.resolve(value)`: a promise is returned as is.
    pub fn resolved(&mut self, value: HostValue) -> PromiseId {
        if let HostValue::Promise(id) = value {
            return id;
        }
        self.insert(Entry::Settled(Ok(value)))
    }

    pub fn state(&self, id: PromiseId) -> Option<PromiseState> {
        Some(match self.entries.get(id.0 as usize)? {
            Entry::Pending(_) => PromiseState::Pending,
            Entry::Settled(Ok(_)) => PromiseState::Fulfilled,
            Entry::Settled(Err(_)) => PromiseState::Rejected,
            Entry::Free => return None,
        })
    }

    /// Registers continuations. Returns the derived promise and, when `id`
    /// has already settled, the reaction to queue right away.
    pub fn then(
        &mut self,
        id: PromiseId,
        on_fulfilled: Option<FunctionRef>,
        on_rejected: Option<FunctionRef>,
    ) -> (PromiseId, Option<Reaction>) {
        let derived = self.create();
        let pending = Pending {
            on_fulfilled,
            on_rejected,
            derived,
        };
        match self.entries.get_mut(id.0 as usize) {
            Some(Entry::Pending(waiting)) => {
                waiting.push(pending);
                (derived, None)
            }
            Some(Entry::Settled(outcome)) => (derived, Some(pending.react(outcome))),
            Some(Entry::Free) | None => {
                log::warn!("then() on unknown promise {}", id.0);
                (derived, None)
            }
        }
    }

    /// Settles `id` and returns the reactions now due. Settling twice is a
    /// no-op. Fulfilling with another promise makes `id` follow it.
    pub fn settle(&mut self, id: PromiseId, outcome: Outcome) -> Vec<Reaction> {
        if let Ok(HostValue::Promise(other)) = &outcome {
            if *other != id {
                return self.follow(id, *other);
            }
        }
        let Some(Entry::Pending(waiting)) = self.entries.get_mut(id.0 as usize) else {
            return Vec::new();
        };
        let waiting = std::mem::take(waiting);
        let due = waiting.into_iter().map(|p| p.react(&outcome)).collect();
        self.entries[id.0 as usize] = Entry::Settled(outcome);
        due
    }

    fn follow(&mut self, id: PromiseId, target: PromiseId) -> Vec<Reaction> {
        let pending = Pending {
            on_fulfilled: None,
            on_rejected: None,
            derived: id,
        };
        match self.entries.get_mut(target.0 as usize) {
            Some(Entry::Pending(waiting)) => {
                waiting.push(pending);
                Vec::new()
            }
            Some(Entry::Settled(outcome)) => vec![pending.react(outcome)],
            Some(Entry::Free) | None => Vec::new(),
        }
    }

    /// Promises currently occupying a slot.
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees every promise not reachable from `reachable.promises`. A
    /// pending promise keeps the promises derived from it alive, and a
    /// settled one keeps whatever it settled with. Returns how many slots
    /// were freed; `reachable` ends up holding every surviving promise and
    /// the responses they refer to.
    pub fn retain(&mut self, reachable: &mut Reachable) -> usize {
        let mut work: Vec<PromiseId> = reachable.promises.iter().copied().collect();
        while let Some(id) = work.pop() {
            match self.entries.get(id.0 as usize) {
                Some(Entry::Pending(waiting)) => {
                    for pending in waiting {
                        if reachable.promises.insert(pending.derived) {
                            work.push(pending.derived);
                        }
                    }
                }
                Some(Entry::Settled(Ok(value) | Err(value))) => {
                    if let HostValue::Promise(next) = value {
                        if reachable.promises.insert(*next) {
                            work.push(*next);
                        }
                    } else {
                        reachable.value(value);
                    }
                }
                Some(Entry::Free) | None => {}
            }
        }

        let mut freed = 0;
        for (index, entry) in self.entries.iter_mut().enumerate() {
            if matches!(entry, Entry::Free) || reachable.promises.contains(&PromiseId(index as u32))
            {
                continue;
            }
            *entry = Entry::Free;
            self.free.push(index as u32);
            freed += 1;
        }
        freed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::ClosureTable;

    #[test]
    fn test_then_on_pending_runs_at_settle() {
        let mut closures = ClosureTable::new();
        let mut promises = Promises::new();
        let p = promises.create();
        let ok = closures.create(1, 0, 0);
        let (derived, ready) = promises.then(p, Some(ok.clone()), None);
        assert!(ready.is_none());
        assert_eq!(promises.state(derived), Some(PromiseState::Pending));

        let due = promises.settle(p, Ok(HostValue::Number(5.0)));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].handler.as_ref(), Some(&ok));
        assert!(matches!(due[0].argument, HostValue::Number(n) if n == 5.0));
        assert_eq!(due[0].derived, derived);
        assert_eq!(promises.state(p), Some(PromiseState::Fulfilled));

        assert!(promises.settle(p, Err(HostValue::Null)).is_empty());
        assert_eq!(promises.state(p), Some(PromiseState::Fulfilled));
    }

    #[test]
    fn test_then_on_settled_is_immediately_due() {
        let mut promises = Promises::new();
        let p = promises.resolved(HostValue::String("done".into()));
        let (_, ready) = promises.then(p, None, None);
        let reaction = ready.unwrap();
        assert!(reaction.handler.is_none());
        assert!(matches!(reaction.passthrough(), Ok(HostValue::String(s)) if s == "done"));
    }

    #[test]
    fn test_rejection_picks_rejection_handler() {
        let mut closures = ClosureTable::new();
        let mut promises = Promises::new();
        let p = promises.create();
        let on_ok = closures.create(1, 0, 0);
        let on_err = closures.create(2, 0, 0);
        promises.then(p, Some(on_ok), Some(on_err.clone()));
        let due = promises.settle(p, Err(HostValue::Number(1.0)));
        assert!(due[0].rejected);
        assert_eq!(due[0].handler.as_ref(), Some(&on_err));
        assert_eq!(promises.state(p), Some(PromiseState::Rejected));
    }

    #[test]
    fn test_retain_frees_unreachable_and_reuses_slots() {
        let mut closures = ClosureTable::new();
        let mut promises = Promises::new();
        let root = promises.create();
        let (derived, _) = promises.then(root, Some(closures.create(1, 0, 0)), None);
        let done = promises.resolved(HostValue::Number(1.0));
        let dropped = promises.create();
        assert_eq!(promises.len(), 4);

        let mut reachable = Reachable::default();
        reachable.promises.insert(root);
        assert_eq!(promises.retain(&mut reachable), 2);
        assert_eq!(promises.len(), 2);
        assert!(reachable.promises.contains(&derived));
        assert_eq!(promises.state(derived), Some(PromiseState::Pending));
        assert_eq!(promises.state(done), None);
        assert_eq!(promises.state(dropped), None);

        let reused = promises.create();
        assert!(reused == done || reused == dropped);
        assert_eq!(promises.len(), 3);
    }

    #[test]
    fn test_settled_value_keeps_response_reachable() {
        let mut promises = Promises::new();
        let mut responses = crate::host::fetch::Responses::new();
        let response = responses.complete("a", Ok(vec![1])).unwrap();
        let p = promises.resolved(HostValue::Response(response));

        let mut reachable = Reachable::default();
        reachable.promises.insert(p);
        assert_eq!(promises.retain(&mut reachable), 0);
        assert!(reachable.responses.contains(&response));
    }

    #[test]
    fn test_resolve_with_promise_follows_it() {
        let mut promises = Promises::new();
        let inner = promises.create();
        assert_eq!(promises.resolved(HostValue::Promise(inner)), inner);

        let outer = promises.create();
        assert!(promises.settle(outer, Ok(HostValue::Promise(inner))).is_empty());
        let due = promises.settle(inner, Ok(HostValue::Bool(true)));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].derived, outer);
        assert!(due[0].handler.is_none());
    }
}
