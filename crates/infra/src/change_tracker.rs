//! In-memory registry of the entities participating in one unit of work.
//!
//! The tracker is owned by a single request/operation and is mutated through
//! `&mut` only; it is never shared between concurrent callers.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use travel_core::{AuditInfo, Capability, DomainResult, EntityKey, EventCarrier, Trackable};

use crate::store::Change;

/// Transition state of a tracked entity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum EntityState {
    /// New in this unit of work; inserted on flush.
    Added,
    /// Persisted before and changed since it was attached; updated on flush.
    Modified,
    /// Persisted and untouched.
    Unchanged,
    /// Persisted and marked for removal; deleted on flush.
    Deleted,
}

/// Programming error: the tracked state contradicts itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidStateError {
    #[error("{key} is already tracked as {existing:?}; cannot register it as {requested:?}")]
    ConflictingRegistration {
        key: EntityKey,
        existing: EntityState,
        requested: EntityState,
    },

    #[error("{key} is tracked as {state:?} but has never been persisted")]
    NeverPersisted { key: EntityKey, state: EntityState },
}

#[derive(Debug)]
struct Entry {
    key: EntityKey,
    state: EntityState,
    entity: Box<dyn Trackable>,
}

/// Audit values as they were before a commit stamped them.
#[derive(Debug)]
pub(crate) struct AuditSnapshot(Vec<(EntityKey, AuditInfo)>);

/// Change tracker for one unit of work.
///
/// Entries keep registration order; every query and the commit pipeline walk
/// them in that order, so a commit's event order is deterministic.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    entries: Vec<Entry>,
    index: HashMap<EntityKey, usize>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `entity` in `state`.
    ///
    /// Registering an already tracked key again with the same state is a
    /// no-op that keeps the tracked instance; a different state is an error.
    pub fn register<T: Trackable>(
        &mut self,
        entity: T,
        state: EntityState,
    ) -> Result<EntityKey, InvalidStateError> {
        self.register_boxed(Box::new(entity), state)
    }

    pub fn register_boxed(
        &mut self,
        entity: Box<dyn Trackable>,
        state: EntityState,
    ) -> Result<EntityKey, InvalidStateError> {
        let key = entity.key();
        if let Some(&idx) = self.index.get(&key) {
            let existing = self.entries[idx].state;
            if existing != state {
                return Err(InvalidStateError::ConflictingRegistration {
                    key,
                    existing,
                    requested: state,
                });
            }
            return Ok(key);
        }

        debug!(entity = %key, ?state, "tracking entity");
        self.index.insert(key, self.entries.len());
        self.entries.push(Entry { key, state, entity });
        Ok(key)
    }

    /// Track a new entity (inserted on the next commit).
    pub fn add<T: Trackable>(&mut self, entity: T) -> Result<EntityKey, InvalidStateError> {
        self.register(entity, EntityState::Added)
    }

    /// Track an entity loaded from the store.
    pub fn attach<T: Trackable>(&mut self, entity: T) -> Result<EntityKey, InvalidStateError> {
        self.register(entity, EntityState::Unchanged)
    }

    pub fn state_of(&self, key: &EntityKey) -> Option<EntityState> {
        self.index.get(key).map(|&idx| self.entries[idx].state)
    }

    pub fn contains(&self, key: &EntityKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn get<T: Trackable>(&self, key: &EntityKey) -> Option<&T> {
        let idx = *self.index.get(key)?;
        (*self.entries[idx].entity).as_any().downcast_ref::<T>()
    }

    /// Mutable access; this is where changes are detected.
    ///
    /// Borrowing an `Unchanged` entity mutably marks it `Modified`. Deleted
    /// entities are not handed out for mutation.
    pub fn get_mut<T: Trackable>(&mut self, key: &EntityKey) -> Option<&mut T> {
        let idx = *self.index.get(key)?;
        let entry = &mut self.entries[idx];
        if entry.state == EntityState::Deleted || !(*entry.entity).as_any().is::<T>() {
            return None;
        }
        if entry.state == EntityState::Unchanged {
            entry.state = EntityState::Modified;
        }
        (*entry.entity).as_any_mut().downcast_mut::<T>()
    }

    /// Mark an entity for removal.
    ///
    /// An `Added` entity was never persisted, so it is simply detached.
    /// Returns `false` if the key is not tracked.
    pub fn remove(&mut self, key: &EntityKey) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        if self.entries[idx].state == EntityState::Added {
            self.detach_where(|entry| entry.key == *key);
        } else {
            self.entries[idx].state = EntityState::Deleted;
        }
        true
    }

    /// Keys currently in `state`, in registration order.
    ///
    /// The sequence is a snapshot: later tracker mutations do not show up in it.
    pub fn entries_of_state(&self, state: EntityState) -> impl Iterator<Item = EntityKey> + use<> {
        self.entries
            .iter()
            .filter(|e| e.state == state)
            .map(|e| e.key)
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Keys of every tracked entity implementing `capability`, whatever its type.
    pub fn entries_implementing(
        &self,
        capability: Capability,
    ) -> impl Iterator<Item = EntityKey> + use<> {
        self.entries
            .iter()
            .filter(|e| e.entity.implements(capability))
            .map(|e| e.key)
            .collect::<Vec<_>>()
            .into_iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether a commit would write anything.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.state != EntityState::Unchanged)
    }

    /// Reject contradictory state before any I/O happens.
    pub(crate) fn validate(&self) -> Result<(), InvalidStateError> {
        for entry in &self.entries {
            if entry.state == EntityState::Added {
                continue;
            }
            if let Some(auditable) = entry.entity.as_auditable() {
                if !auditable.audit().is_persisted() {
                    return Err(InvalidStateError::NeverPersisted {
                        key: entry.key,
                        state: entry.state,
                    });
                }
            }
        }
        Ok(())
    }

    /// Stamp audit fields for added/modified auditable entities.
    ///
    /// Returns the previous values so a failed flush can put them back.
    pub(crate) fn stamp_audit(&mut self, now: DateTime<Utc>, user_id: &str) -> AuditSnapshot {
        let mut previous = Vec::new();
        for entry in &mut self.entries {
            let state = entry.state;
            let Some(auditable) = entry.entity.as_auditable_mut() else {
                continue;
            };
            let audit = auditable.audit_mut();
            match state {
                EntityState::Added => {
                    previous.push((entry.key, audit.clone()));
                    audit.stamp_created(now, user_id);
                }
                EntityState::Modified => {
                    previous.push((entry.key, audit.clone()));
                    audit.stamp_modified(now, user_id);
                }
                EntityState::Unchanged | EntityState::Deleted => continue,
            }
            debug!(entity = %entry.key, ?state, user_id, "stamped audit fields");
        }
        AuditSnapshot(previous)
    }

    pub(crate) fn restore_audit(&mut self, snapshot: AuditSnapshot) {
        for (key, audit) in snapshot.0 {
            let Some(&idx) = self.index.get(&key) else {
                continue;
            };
            if let Some(auditable) = self.entries[idx].entity.as_auditable_mut() {
                *auditable.audit_mut() = audit;
            }
        }
    }

    /// Unpublished carriers of every event source, entity by entity in
    /// registration order, each entity's carriers in the order raised.
    pub(crate) fn pending_events(&self) -> Vec<(EntityKey, EventCarrier)> {
        self.entries
            .iter()
            .filter_map(|e| e.entity.as_event_source().map(|source| (e.key, source)))
            .flat_map(|(key, source)| {
                source
                    .events()
                    .pending()
                    .iter()
                    .map(move |carrier| (key, carrier.clone()))
            })
            .collect()
    }

    pub(crate) fn mark_published(&mut self, key: &EntityKey, event_id: Uuid) -> bool {
        let Some(&idx) = self.index.get(key) else {
            return false;
        };
        self.entries[idx]
            .entity
            .as_event_source_mut()
            .is_some_and(|source| source.events_mut().mark_published(event_id))
    }

    /// Row changes for the store, in registration order.
    pub(crate) fn pending_changes(&self) -> DomainResult<Vec<Change>> {
        let mut changes = Vec::new();
        for entry in &self.entries {
            let change = match entry.state {
                EntityState::Unchanged => continue,
                EntityState::Added => Change::Insert {
                    key: entry.key,
                    row: entry.entity.to_row()?,
                },
                EntityState::Modified => Change::Update {
                    key: entry.key,
                    row: entry.entity.to_row()?,
                },
                EntityState::Deleted => Change::Delete { key: entry.key },
            };
            changes.push(change);
        }
        Ok(changes)
    }

    /// Settle the tracker after a successful flush: added and modified
    /// entities become unchanged, deleted ones are detached.
    pub(crate) fn accept_all_changes(&mut self) {
        self.detach_where(|entry| entry.state == EntityState::Deleted);
        for entry in &mut self.entries {
            entry.state = EntityState::Unchanged;
        }
    }

    fn detach_where(&mut self, mut predicate: impl FnMut(&Entry) -> bool) {
        let before = self.entries.len();
        self.entries.retain(|entry| !predicate(entry));
        if self.entries.len() != before {
            self.index = self
                .entries
                .iter()
                .enumerate()
                .map(|(idx, entry)| (entry.key, idx))
                .collect();
        }
    }
}
