use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::error::AssetError;

/// Lifecycle of an asynchronously loaded object.
#[derive(Debug)]
pub enum AssetState<T> {
    Pending,
    Loaded(T),
    Failed(AssetError),
}

/// Shared slot an asset loader resolves once; the frame loop polls it every
/// tick instead of closures writing into outer scope.
///
/// Cloning gives another handle to the same slot.
pub struct AssetSlot<T> {
    label: Rc<str>,
    state: Rc<RefCell<AssetState<T>>>,
}

impl<T> Clone for AssetSlot<T> {
    fn clone(&self) -> Self {
        Self {
            label: self.label.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T> AssetSlot<T> {
    pub fn pending(label: &str) -> Self {
        Self {
            label: Rc::from(label),
            state: Rc::new(RefCell::new(AssetState::Pending)),
        }
    }

    pub fn loaded(label: &str, value: T) -> Self {
        let slot = Self::pending(label);
        slot.resolve(Ok(value));
        slot
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Settle the slot. Only the first resolution counts; failures are logged
    /// and leave the feature absent.
    pub fn resolve(&self, result: Result<T, AssetError>) {
        let mut state = self.state.borrow_mut();
        if !matches!(*state, AssetState::Pending) {
            tracing::warn!(asset = %self.label, "asset slot already settled, ignoring");
            return;
        }
        *state = match result {
            Ok(value) => {
                tracing::info!(asset = %self.label, "asset loaded");
                AssetState::Loaded(value)
            }
            Err(err) => {
                tracing::error!(asset = %self.label, "{err}");
                AssetState::Failed(err)
            }
        };
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Pending)
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Loaded(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(*self.state.borrow(), AssetState::Failed(_))
    }

    /// Borrow the loaded value. Drop the guard before resolving the slot.
    pub fn get(&self) -> Option<Ref<'_, T>> {
        Ref::filter_map(self.state.borrow(), |state| match state {
            AssetState::Loaded(value) => Some(value),
            _ => None,
        })
        .ok()
    }
}
