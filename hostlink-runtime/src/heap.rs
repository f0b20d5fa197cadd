//! Handle table: the module refers to host values by small integers.
//!
//! Indices below `reserved` are never reclaimed; the first four are the
//! sentinels `undefined`, `null`, `true` and `false`. Free slots above the
//! reserved range form a LIFO list threaded through the slots themselves.

use hostlink_abi::handles;

use crate::error::BoundaryError;
use crate::value::{FromHostValue, HostValue};

/// A module-visible reference to a host value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    pub const UNDEFINED: Handle = Handle(handles::UNDEFINED);
    pub const NULL: Handle = Handle(handles::NULL);
    pub const TRUE: Handle = Handle(handles::TRUE);
    pub const FALSE: Handle = Handle(handles::FALSE);

    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_sentinel(self) -> bool {
        handles::is_sentinel(self.0)
    }

    pub fn is_like_none(self) -> bool {
        handles::is_like_none(self.0)
    }
}

#[derive(Debug)]
enum Slot {
    Occupied(HostValue),
    Free { next: u32 },
}

#[derive(Debug)]
pub struct HandleTable {
    slots: Vec<Slot>,
    /// Head of the free list; equal to `slots.len()` when the list is empty.
    next_free: u32,
    reserved: u32,
    live: usize,
}

impl HandleTable {
    pub fn new(reserved: u32) -> Self {
        let reserved = reserved.max(handles::SENTINEL_COUNT);
        let mut slots = Vec::with_capacity(reserved as usize * 2);
        slots.push(Slot::Occupied(HostValue::Undefined));
        slots.push(Slot::Occupied(HostValue::Null));
        slots.push(Slot::Occupied(HostValue::Bool(true)));
        slots.push(Slot::Occupied(HostValue::Bool(false)));
        slots.resize_with(reserved as usize, || Slot::Occupied(HostValue::Undefined));
        Self {
            slots,
            next_free: reserved,
            reserved,
            live: 0,
        }
    }

    /// Stores `value` in a fresh slot, reusing the most recently freed one.
    pub fn allocate(&mut self, value: HostValue) -> Handle {
        if self.next_free as usize == self.slots.len() {
            let next = self.slots.len() as u32 + 1;
            self.slots.push(Slot::Free { next });
        }
        let index = self.next_free;
        let slot = &mut self.slots[index as usize];
        let Slot::Free { next } = *slot else {
            unreachable!("free list head {index} points at a live slot");
        };
        *slot = Slot::Occupied(value);
        self.next_free = next;
        self.live += 1;
        Handle(index)
    }

    /// Like [`allocate`](Self::allocate), but `undefined`, `null` and
    /// booleans map to their sentinels without consuming a slot.
    pub fn from_value(&mut self, value: HostValue) -> Handle {
        match value {
            HostValue::Undefined => Handle::UNDEFINED,
            HostValue::Null => Handle::NULL,
            HostValue::Bool(true) => Handle::TRUE,
            HostValue::Bool(false) => Handle::FALSE,
            other => self.allocate(other),
        }
    }

    pub fn get(&self, handle: Handle) -> Result<&HostValue, BoundaryError> {
        match self.slots.get(handle.0 as usize) {
            Some(Slot::Occupied(value)) => Ok(value),
            _ => Err(BoundaryError::InvalidHandle(handle.0)),
        }
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut HostValue, BoundaryError> {
        if handle.0 < self.reserved {
            return Err(BoundaryError::InvalidHandle(handle.0));
        }
        match self.slots.get_mut(handle.0 as usize) {
            Some(Slot::Occupied(value)) => Ok(value),
            _ => Err(BoundaryError::InvalidHandle(handle.0)),
        }
    }

    /// Typed dereference.
    pub fn cast<T: FromHostValue>(&self, handle: Handle) -> Result<T, BoundaryError> {
        let value = self.get(handle)?;
        T::from_host_value(value).ok_or(BoundaryError::TypeMismatch {
            handle: handle.0,
            expected: T::EXPECTED,
            found: value.type_name(),
        })
    }

    /// Typed dereference that treats `undefined`/`null` as absent.
    pub fn cast_optional<T: FromHostValue>(
        &self,
        handle: Handle,
    ) -> Result<Option<T>, BoundaryError> {
        if handle.is_like_none() {
            return Ok(None);
        }
        self.cast(handle).map(Some)
    }

    /// Returns a slot to the free list. Reserved handles are ignored.
    pub fn release(&mut self, handle: Handle) {
        if handle.0 < self.reserved {
            return;
        }
        let index = handle.0 as usize;
        debug_assert!(
            matches!(self.slots.get(index), Some(Slot::Occupied(_))),
            "double release of handle {}",
            handle.0
        );
        if let Some(slot @ Slot::Occupied(_)) = self.slots.get_mut(index) {
            *slot = Slot::Free {
                next: self.next_free,
            };
            self.next_free = handle.0;
            self.live -= 1;
        }
    }

    /// Dereferences and releases in one step.
    pub fn take(&mut self, handle: Handle) -> Result<HostValue, BoundaryError> {
        if handle.0 < self.reserved {
            return self.get(handle).cloned();
        }
        match self.slots.get_mut(handle.0 as usize) {
            Some(slot @ Slot::Occupied(_)) => {
                let freed = Slot::Free {
                    next: self.next_free,
                };
                let Slot::Occupied(value) = std::mem::replace(slot, freed) else {
                    unreachable!();
                };
                self.next_free = handle.0;
                self.live -= 1;
                Ok(value)
            }
            _ => Err(BoundaryError::InvalidHandle(handle.0)),
        }
    }

    /// New handle to the same value.
    pub fn clone_ref(&mut self, handle: Handle) -> Result<Handle, BoundaryError> {
        let value = self.get(handle)?.clone();
        Ok(self.from_value(value))
    }

    /// Every value a handle currently refers to, sentinels included.
    pub fn values(&self) -> impl Iterator<Item = &HostValue> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Occupied(value) => Some(value),
            Slot::Free { .. } => None,
        })
    }

    /// Number of allocated, unreleased slots above the reserved range.
    pub fn live_count(&self) -> usize {
        self.live
    }

    pub fn reserved(&self) -> u32 {
        self.reserved
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every non-reserved value.
    pub fn clear(&mut self) {
        self.slots.truncate(self.reserved as usize);
        self.next_free = self.reserved;
        self.live = 0;
    }
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new(handles::DEFAULT_RESERVED_SLOTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sentinels() {
        let table = HandleTable::default();
        assert!(matches!(table.get(Handle::UNDEFINED), Ok(HostValue::Undefined)));
        assert!(matches!(table.get(Handle::NULL), Ok(HostValue::Null)));
        assert!(matches!(table.get(Handle::TRUE), Ok(HostValue::Bool(true))));
        assert!(matches!(table.get(Handle::FALSE), Ok(HostValue::Bool(false))));
        assert_eq!(table.reserved(), 128);
    }

    #[test]
    fn test_first_allocation_follows_reserved_range() {
        let mut table = HandleTable::new(16);
        let h = table.allocate(HostValue::Number(1.0));
        assert_eq!(h.raw(), 16);
        assert_eq!(table.live_count(), 1);
    }

    #[test]
    fn test_reserved_minimum_is_sentinel_count() {
        let mut table = HandleTable::new(0);
        assert_eq!(table.reserved(), 4);
        assert_eq!(table.allocate(HostValue::Window).raw(), 4);
    }

    #[test]
    fn test_lifo_reuse() {
        let mut table = HandleTable::new(8);
        let a = table.allocate(HostValue::Number(1.0));
        let b = table.allocate(HostValue::Number(2.0));
        let c = table.allocate(HostValue::Number(3.0));
        table.release(a);
        table.release(c);
        assert_eq!(table.allocate(HostValue::Null), c);
        assert_eq!(table.allocate(HostValue::Null), a);
        let d = table.allocate(HostValue::Null);
        assert!(d != a && d != b && d != c);
    }

    #[test]
    fn test_live_handles_never_reissued() {
        let mut table = HandleTable::new(4);
        let mut live = HashSet::new();
        for round in 0..50u32 {
            let h = table.allocate(HostValue::Number(round as f64));
            assert!(live.insert(h), "handle {} reissued while live", h.raw());
            if round % 3 == 0 {
                let victim = *live.iter().next().unwrap();
                live.remove(&victim);
                table.release(victim);
            }
        }
        assert_eq!(table.live_count(), live.len());
    }

    #[test]
    fn test_release_of_reserved_is_ignored() {
        let mut table = HandleTable::default();
        table.release(Handle::TRUE);
        table.release(Handle::from_raw(100));
        assert!(matches!(table.get(Handle::TRUE), Ok(HostValue::Bool(true))));
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_take_and_invalid() {
        let mut table = HandleTable::default();
        let h = table.allocate(HostValue::String("x".into()));
        assert!(matches!(table.take(h), Ok(HostValue::String(s)) if s == "x"));
        assert_eq!(table.get(h).unwrap_err(), BoundaryError::InvalidHandle(h.raw()));
        assert_eq!(
            table.get(Handle::from_raw(9999)).unwrap_err(),
            BoundaryError::InvalidHandle(9999)
        );
    }

    #[test]
    fn test_cast_mismatch() {
        let mut table = HandleTable::default();
        let h = table.allocate(HostValue::Number(2.0));
        assert_eq!(table.cast::<f64>(h), Ok(2.0));
        assert_eq!(
            table.cast::<String>(h),
            Err(BoundaryError::TypeMismatch {
                handle: h.raw(),
                expected: "string",
                found: "number",
            })
        );
        assert_eq!(table.cast_optional::<String>(Handle::NULL), Ok(None));
    }

    #[test]
    fn test_from_value_uses_sentinels() {
        let mut table = HandleTable::default();
        assert_eq!(table.from_value(HostValue::Bool(false)), Handle::FALSE);
        assert_eq!(table.from_value(HostValue::Null), Handle::NULL);
        assert_eq!(table.live_count(), 0);
        let h = table.from_value(HostValue::Number(0.0));
        let copy = table.clone_ref(h).unwrap();
        assert_ne!(h, copy);
        assert_eq!(table.live_count(), 2);
    }
}
