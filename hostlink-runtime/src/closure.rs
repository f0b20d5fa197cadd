//! Module-side closures registered as host callbacks.
//!
//! A closure is identified on the module side by an `(a, b)` pair (data and
//! vtable of a boxed callable) plus the index of its destructor. The host
//! tracks a refcount: one for the registration, one per in-flight
//! invocation. The destructor runs when the count reaches zero, and only
//! then.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClosureId(u32);

impl fmt::Display for ClosureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "closure#{}", self.0)
    }
}

/// Host-side wrapper of a registered closure. Clones share one liveness
/// token; once every clone is gone the closure is eligible for the sweep.
#[derive(Debug, Clone)]
pub struct FunctionRef {
    id: ClosureId,
    token: Arc<()>,
}

impl FunctionRef {
    pub fn id(&self) -> ClosureId {
        self.id
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

#[derive(Debug)]
struct ClosureState {
    /// Zero while an invocation is running or after release.
    a: u32,
    b: u32,
    refcount: u32,
    dtor: u32,
    wrappers: Weak<()>,
}

/// Proof of a running invocation; hand it back to `end_invoke`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub id: ClosureId,
    pub a: u32,
    pub b: u32,
}

/// A destructor call the host owes the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destroy {
    pub dtor: u32,
    pub a: u32,
    pub b: u32,
}

/// Outcome of an explicit release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Released {
    /// The registration was the last reference; the module frees the
    /// environment itself.
    Last,
    /// An invocation is in flight and will run the destructor.
    Deferred,
    /// No such closure, or it was already destroyed.
    Unknown,
}

#[derive(Debug, Default)]
pub struct ClosureTable {
    states: HashMap<ClosureId, ClosureState>,
    next_id: u32,
    destroyed: u64,
}

impl ClosureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, a: u32, b: u32, dtor: u32) -> FunctionRef {
        let id = ClosureId(self.next_id);
        self.next_id += 1;
        let token = Arc::new(());
        self.states.insert(
            id,
            ClosureState {
                a,
                b,
                refcount: 1,
                dtor,
                wrappers: Arc::downgrade(&token),
            },
        );
        log::trace!("created {id} (a={a:#x}, b={b:#x}, dtor={dtor})");
        FunctionRef { id, token }
    }

    /// Starts an invocation. `None` when the closure is gone or already
    /// running: a closure never re-enters itself.
    pub fn begin_invoke(&mut self, id: ClosureId) -> Option<Invocation> {
        let state = self.states.get_mut(&id)?;
        if state.a == 0 {
            return None;
        }
        state.refcount += 1;
        let a = std::mem::take(&mut state.a);
        Some(Invocation { id, a, b: state.b })
    }

    /// Finishes an invocation, returning the destructor call if this was
    /// the last reference.
    pub fn end_invoke(&mut self, invocation: Invocation) -> Option<Destroy> {
        let state = self.states.get_mut(&invocation.id)?;
        state.refcount -= 1;
        if state.refcount == 0 {
            let state = self.states.remove(&invocation.id)?;
            self.destroyed += 1;
            log::trace!("{} destroyed after invocation", invocation.id);
            return Some(Destroy {
                dtor: state.dtor,
                a: invocation.a,
                b: state.b,
            });
        }
        state.a = invocation.a;
        None
    }

    /// Drops the registration's reference.
    pub fn release(&mut self, id: ClosureId) -> Released {
        let Some(state) = self.states.get_mut(&id) else {
            return Released::Unknown;
        };
        if state.refcount == 1 {
            self.states.remove(&id);
            self.destroyed += 1;
            log::trace!("{id} released");
            Released::Last
        } else {
            state.refcount -= 1;
            Released::Deferred
        }
    }

    /// Destroys closures whose host wrappers have all been dropped without
    /// an explicit release. Each one found is a leak in the module.
    pub fn sweep(&mut self) -> Vec<Destroy> {
        let orphaned: Vec<ClosureId> = self
            .states
            .iter()
            .filter(|(_, state)| state.wrappers.strong_count() == 0 && state.a != 0)
            .map(|(id, _)| *id)
            .collect();

        let mut destroys = Vec::with_capacity(orphaned.len());
        for id in orphaned {
            if let Some(state) = self.states.remove(&id) {
                log::warn!("{id} was never released; destroying it from the sweep");
                self.destroyed += 1;
                destroys.push(Destroy {
                    dtor: state.dtor,
                    a: state.a,
                    b: state.b,
                });
            }
        }
        destroys
    }

    pub fn contains(&self, id: ClosureId) -> bool {
        self.states.contains_key(&id)
    }

    pub fn live(&self) -> usize {
        self.states.len()
    }

    /// Total closures destroyed, by any path.
    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_then_release() {
        let mut table = ClosureTable::new();
        let f = table.create(0x100, 0x200, 7);

        for _ in 0..3 {
            let inv = table.begin_invoke(f.id()).unwrap();
            assert_eq!((inv.a, inv.b), (0x100, 0x200));
            assert_eq!(table.end_invoke(inv), None);
        }

        assert_eq!(table.release(f.id()), Released::Last);
        assert!(table.begin_invoke(f.id()).is_none());
        assert_eq!(table.release(f.id()), Released::Unknown);
        assert_eq!(table.destroyed(), 1);
    }

    #[test]
    fn test_release_during_invoke_defers_destructor() {
        let mut table = ClosureTable::new();
        let f = table.create(0x10, 0x20, 3);
        let inv = table.begin_invoke(f.id()).unwrap();

        assert_eq!(table.release(f.id()), Released::Deferred);
        assert_eq!(
            table.end_invoke(inv),
            Some(Destroy {
                dtor: 3,
                a: 0x10,
                b: 0x20
            })
        );
        assert!(!table.contains(f.id()));
        assert_eq!(table.destroyed(), 1);
    }

    #[test]
    fn test_reentrant_invoke_refused() {
        let mut table = ClosureTable::new();
        let f = table.create(1, 2, 0);
        let outer = table.begin_invoke(f.id()).unwrap();
        assert!(table.begin_invoke(f.id()).is_none());
        assert_eq!(table.end_invoke(outer), None);
        assert!(table.begin_invoke(f.id()).is_some());
    }

    #[test]
    fn test_refcount_reaches_zero_exactly_once() {
        // every interleaving of one release against two sequential invokes
        for release_at in 0..=4 {
            let mut table = ClosureTable::new();
            let f = table.create(9, 9, 1);
            let mut destroys = 0;
            let mut released = false;
            let mut step = 0;
            for _ in 0..2 {
                if step == release_at && !released {
                    released = true;
                    if table.release(f.id()) == Released::Last {
                        destroys += 1;
                    }
                }
                step += 1;
                if let Some(inv) = table.begin_invoke(f.id()) {
                    if step == release_at && !released {
                        released = true;
                        if table.release(f.id()) == Released::Last {
                            destroys += 1;
                        }
                    }
                    if table.end_invoke(inv).is_some() {
                        destroys += 1;
                    }
                }
                step += 1;
            }
            if !released && table.release(f.id()) == Released::Last {
                destroys += 1;
            }
            destroys += table.sweep().len();
            assert_eq!(destroys, 1, "release at step {release_at}");
            assert_eq!(table.destroyed(), 1);
        }
    }

    #[test]
    fn test_sweep_collects_orphans_only() {
        let mut table = ClosureTable::new();
        let kept = table.create(1, 1, 0);
        let orphan = table.create(2, 2, 5);
        let orphan_id = orphan.id();
        drop(orphan);

        let destroys = table.sweep();
        assert_eq!(destroys, vec![Destroy { dtor: 5, a: 2, b: 2 }]);
        assert!(!table.contains(orphan_id));
        assert!(table.contains(kept.id()));
        assert!(table.sweep().is_empty());
    }

    #[test]
    fn test_clones_share_liveness() {
        let mut table = ClosureTable::new();
        let f = table.create(1, 1, 0);
        let installed = f.clone();
        drop(f);
        assert!(table.sweep().is_empty());
        drop(installed);
        assert_eq!(table.sweep().len(), 1);
    }
}
