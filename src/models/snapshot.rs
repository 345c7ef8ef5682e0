use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{MatchStatus, ParticipantId, ParticipantStatus};
use crate::state::EntityRegistry;

/// Field width in meters
pub const FIELD_WIDTH: f32 = 28.0;

/// Field height in meters
pub const FIELD_HEIGHT: f32 = 15.0;

/// Field position of a participant, owned by the position topic
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: ParticipantId,

    /// Meters from the left edge
    pub x: f32,

    /// Meters from the bottom edge
    pub y: f32,

    /// Heading in degrees
    pub heading: f32,
}

/// Complete match state consumed by the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub match_status: MatchStatus,

    pub participants: EntityRegistry,

    pub positions: BTreeMap<ParticipantId, Position>,

    /// Participant observed in detail
    pub self_id: Option<ParticipantId>,

    /// When the last message was applied
    pub updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(self_id: Option<ParticipantId>) -> Self {
        Self {
            self_id,
            ..Default::default()
        }
    }

    pub fn participant(&self, id: ParticipantId) -> Option<&ParticipantStatus> {
        self.participants.get(id)
    }

    /// Status record of the observed participant, if any has arrived
    pub fn self_status(&self) -> Option<&ParticipantStatus> {
        self.self_id.and_then(|id| self.participants.get(id))
    }

    pub fn self_position(&self) -> Option<&Position> {
        self.self_id.and_then(|id| self.positions.get(&id))
    }
}
