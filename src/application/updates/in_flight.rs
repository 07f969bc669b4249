use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::domain::account::Account;
use crate::domain::image::ExecutionScope;

type InFlightKey = (Account, String);

struct InFlightEntry {
    generation: Uuid,
    scope: ExecutionScope,
}

/// Tracks the execution scope of every image with an upgrade in flight.
#[derive(Default, Clone)]
pub struct InFlightUpgrades {
    entries: Arc<DashMap<InFlightKey, InFlightEntry>>,
}

impl InFlightUpgrades {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `scope` as the active one for the image. A scope previously
    /// registered for the same image is cancelled.
    pub fn register(&self, account: &Account, uuid: &str, scope: ExecutionScope) -> InFlightGuard {
        let key = (account.clone(), uuid.to_string());
        let generation = Uuid::new_v4();

        let previous = self
            .entries
            .insert(key.clone(), InFlightEntry { generation, scope });
        if let Some(previous) = previous {
            previous.scope.cancel();
        }

        InFlightGuard {
            key,
            generation,
            entries: Arc::clone(&self.entries),
        }
    }

    /// Cancels the active scope for the image. Returns whether one existed.
    pub fn cancel(&self, account: &Account, uuid: &str) -> bool {
        match self.entries.remove(&(account.clone(), uuid.to_string())) {
            Some((_, entry)) => {
                entry.scope.cancel();
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, account: &Account, uuid: &str) -> bool {
        self.entries.contains_key(&(account.clone(), uuid.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Removes its registry entry on drop, unless a newer registration replaced it.
pub struct InFlightGuard {
    key: InFlightKey,
    generation: Uuid,
    entries: Arc<DashMap<InFlightKey, InFlightEntry>>,
}

impl InFlightGuard {
    /// Points the entry at a new scope, keeping this guard's ownership of it.
    pub fn rebind(&self, scope: ExecutionScope) {
        if let Some(mut entry) = self.entries.get_mut(&self.key) {
            if entry.generation == self.generation {
                entry.scope = scope;
            }
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let generation = self.generation;
        self.entries
            .remove_if(&self.key, |_, entry| entry.generation == generation);
    }
}

impl std::fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InFlightGuard")
            .field("account", &self.key.0)
            .field("uuid", &self.key.1)
            .finish()
    }
}
