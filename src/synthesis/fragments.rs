//! Slots of live dynamic fragments.
//!
//! Slot `i` is published as the base name followed by `i` marker characters.
//! A fragment is addressed through an opaque [`FragmentHandle`]; its name only
//! exists once it is written to the registry.

use std::collections::BTreeSet;

const MARKER: char = 'x';

/// Opaque reference to a fragment slot.
///
/// A handle outlives its fragment: once the slot is released and reused,
/// the old handle no longer resolves to a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentHandle {
    slot: usize,
    generation: u64,
}

#[derive(Debug, Clone, Default)]
struct Slot {
    generation: u64,
    occupied: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct FragmentArena {
    base: String,
    slots: Vec<Slot>,
}

impl FragmentArena {
    pub(crate) fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            slots: Vec::new(),
        }
    }

    fn slot_name(&self, slot: usize) -> String {
        let mut name = self.base.clone();
        name.extend(std::iter::repeat(MARKER).take(slot));
        name
    }

    /// First free slot whose name nobody else has registered.
    ///
    /// The slot is only reserved by [`Self::occupy`].
    pub(crate) fn next_free(&self, taken: &BTreeSet<String>) -> (usize, String) {
        let mut slot = 0;
        loop {
            let free = self.slots.get(slot).map_or(true, |s| !s.occupied);
            let name = self.slot_name(slot);
            if free && !taken.contains(&name) {
                return (slot, name);
            }
            slot += 1;
        }
    }

    pub(crate) fn occupy(&mut self, slot: usize) -> FragmentHandle {
        if self.slots.len() <= slot {
            self.slots.resize_with(slot + 1, Slot::default);
        }
        let entry = &mut self.slots[slot];
        entry.occupied = true;
        FragmentHandle {
            slot,
            generation: entry.generation,
        }
    }

    pub(crate) fn name(&self, handle: FragmentHandle) -> Option<String> {
        self.slots
            .get(handle.slot)
            .filter(|s| s.occupied && s.generation == handle.generation)
            .map(|_| self.slot_name(handle.slot))
    }

    /// Free the slot published as `name`; `false` if no live slot has that name.
    pub(crate) fn release(&mut self, name: &str) -> bool {
        let Some(slot) = (0..self.slots.len())
            .find(|&slot| self.slots[slot].occupied && self.slot_name(slot) == name)
        else {
            return false;
        };
        let entry = &mut self.slots[slot];
        entry.occupied = false;
        entry.generation += 1;
        true
    }

    /// Names of all occupied slots, in slot order.
    pub(crate) fn live_names(&self) -> Vec<String> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.occupied)
            .map(|(slot, _)| self.slot_name(slot))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allocate(arena: &mut FragmentArena, taken: &BTreeSet<String>) -> FragmentHandle {
        let (slot, _) = arena.next_free(taken);
        arena.occupy(slot)
    }

    #[test]
    fn slots_are_reused_after_release() {
        let mut arena = FragmentArena::new("dyn");
        let none = BTreeSet::new();
        let handles: Vec<_> = (0..3).map(|_| allocate(&mut arena, &none)).collect();
        assert_eq!(arena.live_names(), vec!["dyn", "dynx", "dynxx"]);

        assert!(arena.release("dynx"));
        assert!(!arena.release("dynx"));
        assert_eq!(arena.name(handles[1]), None);

        let reused = allocate(&mut arena, &none);
        assert_eq!(arena.name(reused).as_deref(), Some("dynx"));
        assert_ne!(reused, handles[1]);
    }

    #[test]
    fn names_registered_elsewhere_are_skipped() {
        let mut arena = FragmentArena::new("dyn");
        let taken: BTreeSet<String> = ["dyn".to_string()].into();
        let handle = allocate(&mut arena, &taken);
        assert_eq!(arena.name(handle).as_deref(), Some("dynx"));
    }
}
