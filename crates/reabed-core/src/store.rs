//! Device state store.
//!
//! The store is the single source of truth for the bed state. It performs
//! no I/O and no locking of its own: the server wraps it in one mutex so
//! that every read and write is serialized.

use crate::model::{DeviceState, StateUpdate, ValidationError};

/// Trait for device state storage implementations.
pub trait StateStore: Send + Sync {
    /// Snapshot of the current state.
    fn get(&self) -> DeviceState;

    /// Apply a partial update.
    ///
    /// Every supplied field is validated before anything is committed. If any
    /// field is out of range the whole update is discarded and the store is
    /// left unchanged.
    fn try_set(&mut self, update: &StateUpdate) -> Result<DeviceState, ValidationError>;
}

/// In-memory store implementation.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: DeviceState,
}

impl MemoryStore {
    /// Create a store with every field at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store from an initial state, which must be in range.
    pub fn with_state(state: DeviceState) -> Result<Self, ValidationError> {
        state.validate()?;
        Ok(Self { state })
    }
}

impl StateStore for MemoryStore {
    fn get(&self) -> DeviceState {
        self.state
    }

    fn try_set(&mut self, update: &StateUpdate) -> Result<DeviceState, ValidationError> {
        update.validate()?;
        self.state = self.state.merged(update);
        Ok(self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Angles, Field};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_store() {
        let store = MemoryStore::new();
        assert_eq!(store.get(), DeviceState::default());
    }

    #[test]
    fn test_with_state_rejects_out_of_range() {
        let state = DeviceState {
            weight: 301,
            ..Default::default()
        };
        let err = MemoryStore::with_state(state).unwrap_err();
        assert_eq!(err.field, Field::Weight);
    }

    #[test]
    fn test_set_angles_every_valid_combination() {
        let mut store = MemoryStore::new();
        for back in 0..=50 {
            for hip in -15..=15 {
                for ankle in 0..=30 {
                    let angles = Angles::new(back, hip, ankle);
                    store.try_set(&StateUpdate::angles(angles)).unwrap();
                    assert_eq!(store.get().angles(), angles);
                }
            }
        }
    }

    #[test]
    fn test_out_of_range_leaves_store_unchanged() {
        let mut store = MemoryStore::new();
        store
            .try_set(&StateUpdate {
                back: Some(10),
                hip: Some(-3),
                ankle: Some(7),
                height: Some(40),
                weight: Some(90),
            })
            .unwrap();
        let before = store.get();

        let rejected = [
            StateUpdate::angles(Angles::new(51, 0, 0)),
            StateUpdate::angles(Angles::new(0, -16, 0)),
            StateUpdate::angles(Angles::new(0, 16, 0)),
            StateUpdate::angles(Angles::new(0, 0, 31)),
            StateUpdate::angles(Angles::new(-1, 0, 0)),
            StateUpdate::height(101),
            StateUpdate::height(-1),
            StateUpdate::weight(301),
            StateUpdate::weight(-1),
        ];
        for update in rejected {
            assert!(store.try_set(&update).is_err(), "{update:?} accepted");
            assert_eq!(store.get(), before);
        }
    }

    #[test]
    fn test_no_partial_application() {
        let mut store = MemoryStore::new();
        // Back and ankle are valid, hip is not.
        let err = store
            .try_set(&StateUpdate::angles(Angles::new(20, 40, 10)))
            .unwrap_err();
        assert_eq!(err.field, Field::Hip);
        assert_eq!(store.get(), DeviceState::default());
    }

    #[test]
    fn test_partial_update_keeps_other_fields() {
        let mut store = MemoryStore::new();
        store
            .try_set(&StateUpdate::angles(Angles::new(5, 5, 5)))
            .unwrap();
        let state = store.try_set(&StateUpdate::weight(120)).unwrap();

        assert_eq!(state.angles(), Angles::new(5, 5, 5));
        assert_eq!(state.weight, 120);
        assert_eq!(state.height, 0);
    }
}
