use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{ParticipantId, ParticipantStatus};

/// Canonical mapping from participant id to status record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRegistry {
    participants: BTreeMap<ParticipantId, ParticipantStatus>,
}

impl EntityRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing record for `id`, or a freshly inserted default one
    pub fn get_or_create(&mut self, id: ParticipantId) -> &mut ParticipantStatus {
        self.participants
            .entry(id)
            .or_insert_with(|| ParticipantStatus::new(id))
    }

    /// Record for `id`, if one was ever created
    pub fn get(&self, id: ParticipantId) -> Option<&ParticipantStatus> {
        self.participants.get(&id)
    }

    /// Mutable record for `id`, if one was ever created
    pub fn get_mut(&mut self, id: ParticipantId) -> Option<&mut ParticipantStatus> {
        self.participants.get_mut(&id)
    }

    /// Insert a fully built record, replacing any previous one
    pub fn insert(&mut self, status: ParticipantStatus) {
        self.participants.insert(status.id, status);
    }

    /// Whether a record exists for `id`
    pub fn contains(&self, id: ParticipantId) -> bool {
        self.participants.contains_key(&id)
    }

    /// Number of tracked participants
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    /// Whether no participant is tracked
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Drop every record
    pub fn clear(&mut self) {
        self.participants.clear();
    }

    /// Tracked ids in ascending order
    pub fn ids(&self) -> impl Iterator<Item = ParticipantId> + '_ {
        self.participants.keys().copied()
    }

    /// Records in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = &ParticipantStatus> {
        self.participants.values()
    }

    /// Mutable records in ascending id order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ParticipantStatus> {
        self.participants.values_mut()
    }
}
