//! # Entity State
//!
//! [`EntityState<T>`] is the container an entity keeps its data in. It starts
//! empty and is filled by the initialization message.
//!
//! Handlers see it through one of two views:
//!
//! - [`ActorState`]: read-only. The data can be observed but not reassigned.
//! - [`MutableActorState`]: read-write. The data can be replaced or mutated in place.
//!
//! Which view a caller gets is decided by the type it is handed, not by a
//! runtime check.

/// Read-only view of an entity's state.
pub trait ActorState<T> {
    /// The state data, `None` until the entity is initialized.
    fn data(&self) -> Option<&T>;

    fn is_set(&self) -> bool {
        self.data().is_some()
    }
}

/// Read-write view of an entity's state.
pub trait MutableActorState<T>: ActorState<T> {
    fn data_mut(&mut self) -> Option<&mut T>;

    /// Replaces the data, returning the previous value.
    fn set_data(&mut self, data: T) -> Option<T>;
}

/// Owned state container for one entity.
#[derive(Debug)]
pub struct EntityState<T> {
    data: Option<T>,
}

impl<T> EntityState<T> {
    /// Empty, uninitialized state.
    pub fn new() -> Self {
        Self { data: None }
    }

    pub fn view(&self) -> &dyn ActorState<T> {
        self
    }

    pub fn view_mut(&mut self) -> &mut dyn MutableActorState<T> {
        self
    }
}

impl<T> Default for EntityState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ActorState<T> for EntityState<T> {
    fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }
}

impl<T> MutableActorState<T> for EntityState<T> {
    fn data_mut(&mut self) -> Option<&mut T> {
        self.data.as_mut()
    }

    fn set_data(&mut self, data: T) -> Option<T> {
        self.data.replace(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uninitialized() {
        let state = EntityState::<u32>::new();
        assert!(!state.view().is_set());
        assert_eq!(state.data(), None);
    }

    #[test]
    fn mutable_view_can_reassign_and_mutate() {
        let mut state = EntityState::new();
        assert_eq!(state.view_mut().set_data(vec![1]), None);
        state.view_mut().data_mut().unwrap().push(2);
        assert_eq!(state.view().data(), Some(&vec![1, 2]));
        assert_eq!(state.set_data(vec![]), Some(vec![1, 2]));
    }
}
