//! Generational arena of the statements a session owns. A closed statement's
//! slot is reused under a new generation, so stale ids never alias.

use crate::statement::StatementState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatementId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    state: Option<StatementState>,
}

#[derive(Debug, Default)]
pub(crate) struct StatementRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl StatementRegistry {
    pub(crate) fn insert(&mut self, state: StatementState) -> StatementId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.generation = slot.generation.wrapping_add(1);
            slot.state = Some(state);
            return StatementId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            state: Some(state),
        });
        StatementId {
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: StatementId) -> Option<&StatementState> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: StatementId) -> Option<&mut StatementState> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.state.as_mut())
    }

    pub(crate) fn remove(&mut self, id: StatementId) -> Option<StatementState> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let state = slot.state.take()?;
        self.free.push(id.index);
        Some(state)
    }

    pub(crate) fn ids(&self) -> Vec<StatementId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.state.is_some())
            .map(|(index, slot)| StatementId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.state.is_some()).count()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::statement::{StatementKind, StatementState};

    fn state() -> StatementState {
        StatementState::new(StatementKind::Plain, None, 0)
    }

    #[test]
    fn removed_ids_do_not_alias_reused_slots() {
        let mut registry = StatementRegistry::default();
        let first = registry.insert(state());
        assert!(registry.remove(first).is_some());
        let second = registry.insert(state());
        assert_ne!(first, second);
        assert!(registry.get(first).is_none());
        assert!(registry.get(second).is_some());
        assert!(registry.remove(first).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn ids_lists_live_statements() {
        let mut registry = StatementRegistry::default();
        let a = registry.insert(state());
        let b = registry.insert(state());
        registry.remove(a);
        assert_eq!(registry.ids(), vec![b]);
    }
}
