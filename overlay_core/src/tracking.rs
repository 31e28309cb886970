use std::collections::HashSet;

use crate::ids::ItemSerial;

/// Transition of a tracked set between empty and non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// First serial added (0 -> 1).
    Activated,
    /// Last serial removed (1 -> 0).
    Deactivated,
    Unchanged,
}

/// Serials currently owned by one definition.
///
/// Each definition keeps its own set: two definitions sharing a base item type
/// must never claim each other's instances.
#[derive(Debug, Clone, Default)]
pub struct TrackedSerials {
    serials: HashSet<ItemSerial>,
}

impl TrackedSerials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, serial: ItemSerial) -> Activation {
        if self.serials.insert(serial) && self.serials.len() == 1 {
            Activation::Activated
        } else {
            Activation::Unchanged
        }
    }

    pub fn unregister(&mut self, serial: ItemSerial) -> Activation {
        if self.serials.remove(&serial) && self.serials.is_empty() {
            Activation::Deactivated
        } else {
            Activation::Unchanged
        }
    }

    pub fn is_tracked(&self, serial: ItemSerial) -> bool {
        self.serials.contains(&serial)
    }

    pub fn len(&self) -> usize {
        self.serials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.serials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ItemSerial> + '_ {
        self.serials.iter().copied()
    }
}
