//! Generational arena for scope records

use outline_core::ScopeId;

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Arena of records addressed by generational [`ScopeId`]s.
///
/// Freed slots are reused with a bumped generation, so a stale id never
/// resolves to the record that replaced it.
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    live: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Store a value in a fresh or recycled slot.
    pub fn alloc(&mut self, value: T) -> ScopeId {
        self.live += 1;
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            ScopeId::new(index, slot.generation)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            ScopeId::new(index, 0)
        }
    }

    /// Remove a value, invalidating its id.
    pub fn free(&mut self, id: ScopeId) -> Option<T> {
        if !self.is_valid(id) {
            return None;
        }
        let slot = &mut self.slots[id.index as usize];
        // Bump generation immediately to invalidate the id
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index);
        self.live -= 1;
        slot.value.take()
    }

    /// Check if an id is live (slot occupied with the same generation).
    pub fn is_valid(&self, id: ScopeId) -> bool {
        self.slots
            .get(id.index as usize)
            .map(|s| s.generation == id.generation && s.value.is_some())
            .unwrap_or(false)
    }

    pub fn get(&self, id: ScopeId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, id: ScopeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Iterate over live records.
    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.value
                .as_ref()
                .map(|v| (ScopeId::new(i as u32, s.generation), v))
        })
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_alloc_and_free() {
        let mut arena = Arena::new();

        let a = arena.alloc("a");
        let b = arena.alloc("b");

        assert!(arena.is_valid(a));
        assert!(arena.is_valid(b));
        assert_ne!(a, b);
        assert_eq!(arena.len(), 2);

        assert_eq!(arena.free(a), Some("a"));
        assert!(!arena.is_valid(a));
        assert_eq!(arena.free(a), None);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn arena_generation_check() {
        let mut arena = Arena::new();

        let old = arena.alloc(1);
        arena.free(old);
        let new = arena.alloc(2); // Reuses the freed index

        assert_eq!(new.index, old.index);
        assert_ne!(new.generation, old.generation);
        assert!(arena.get(old).is_none());
        assert_eq!(arena.get(new), Some(&2));
    }

    #[test]
    fn arena_get_mut_and_iter() {
        let mut arena = Arena::new();
        let a = arena.alloc(10);
        let b = arena.alloc(20);
        arena.free(a);

        if let Some(v) = arena.get_mut(b) {
            *v += 1;
        }

        let live: Vec<_> = arena.iter().map(|(id, v)| (id, *v)).collect();
        assert_eq!(live, vec![(b, 21)]);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Alloc,
        /// Free the n-th id handed out so far (modulo the count).
        Free(usize),
    }

    fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
        prop::collection::vec(
            prop_oneof![Just(Op::Alloc), (0usize..64).prop_map(Op::Free)],
            1..64,
        )
    }

    proptest! {
        #[test]
        fn prop_freed_ids_never_resolve(ops in arb_ops()) {
            let mut arena = Arena::new();
            let mut issued: Vec<(ScopeId, usize)> = Vec::new();
            let mut freed: Vec<ScopeId> = Vec::new();

            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Alloc => issued.push((arena.alloc(step), step)),
                    Op::Free(n) if !issued.is_empty() => {
                        let (id, _) = issued[n % issued.len()];
                        if arena.free(id).is_some() {
                            freed.push(id);
                        }
                    }
                    Op::Free(_) => {}
                }
            }

            for id in &freed {
                prop_assert!(!arena.is_valid(*id));
                prop_assert!(arena.get(*id).is_none());
            }
            let live: Vec<_> = issued
                .iter()
                .filter(|(id, _)| !freed.contains(id))
                .collect();
            prop_assert_eq!(arena.len(), live.len());
            for (id, value) in live {
                prop_assert_eq!(arena.get(*id), Some(value));
            }
        }
    }
}
