//! Fixed-capacity node pool with generation-checked handles.
//!
//! Slots are reused after [`Arena::free`]; every reuse bumps the slot's
//! generation so a handle to the old occupant no longer resolves.

use std::collections::VecDeque;

/// Handle to a value stored in an [`Arena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeId {
    slot: u32,
    generation: u32,
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    /// Freed slots, reused oldest first.
    available: VecDeque<u32>,
    capacity: usize,
    live: usize,
}

impl<T> Arena<T> {
    /// Pool holding at most `capacity` values. Slots are allocated lazily.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            available: VecDeque::new(),
            capacity,
            live: 0,
        }
    }

    /// Store `value`, or return `None` when the pool is exhausted.
    pub fn construct(&mut self, value: T) -> Option<NodeId> {
        if let Some(slot) = self.available.pop_front() {
            let s = &mut self.slots[slot as usize];
            s.value = Some(value);
            self.live += 1;
            return Some(NodeId {
                slot,
                generation: s.generation,
            });
        }
        if self.slots.len() >= self.capacity {
            return None;
        }
        let slot = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        self.live += 1;
        Some(NodeId {
            slot,
            generation: 0,
        })
    }

    /// Release the value behind `id`. Returns false for stale handles.
    pub fn free(&mut self, id: NodeId) -> bool {
        match self.slots.get_mut(id.slot as usize) {
            Some(s) if s.generation == id.generation && s.value.is_some() => {
                s.value = None;
                s.generation = s.generation.wrapping_add(1);
                self.available.push_back(id.slot);
                self.live -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.slot as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live values.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.live >= self.capacity
    }

    /// Drop every value. Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.available.clear();
        for (i, s) in self.slots.iter_mut().enumerate() {
            if s.value.take().is_some() {
                s.generation = s.generation.wrapping_add(1);
            }
            self.available.push_back(i as u32);
        }
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_until_full() {
        let mut arena = Arena::new(2);
        assert!(arena.construct(1).is_some());
        assert!(arena.construct(2).is_some());
        assert!(arena.is_full());
        assert!(arena.construct(3).is_none());
    }

    #[test]
    fn test_stale_handle_after_reuse() {
        let mut arena = Arena::new(1);
        let a = arena.construct("a").unwrap();
        assert!(arena.free(a));
        let b = arena.construct("b").unwrap();
        assert_eq!(arena.get(a), None);
        assert_eq!(arena.get(b), Some(&"b"));
        assert!(!arena.free(a));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_double_free_rejected() {
        let mut arena = Arena::new(4);
        let a = arena.construct(10).unwrap();
        assert!(arena.free(a));
        assert!(!arena.free(a));
        assert!(arena.is_empty());
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut arena = Arena::new(3);
        let a = arena.construct(1).unwrap();
        arena.construct(2).unwrap();
        arena.clear();
        assert!(!arena.contains(a));
        assert_eq!(arena.len(), 0);
        for i in 0..3 {
            assert!(arena.construct(i).is_some());
        }
        assert!(arena.construct(99).is_none());
    }
}
