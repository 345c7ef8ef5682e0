//! Per-topic merge of decoded messages into the snapshot.
//!
//! Every reducer is handed only the part of the snapshot its topic owns, so a
//! late or missing message on one topic cannot touch another topic's fields.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::models::{
    BaseStatus, BuildingState, MatchStatus, ModuleFlags, OutpostStatus, ParticipantId,
    ParticipantStatus, Position, Snapshot, Stage, Team, TransmissionMode, VideoLink,
};
use crate::protocol::{
    GameStatus, GlobalUnitStatus, RobotDynamicStatus, RobotModuleStatus, RobotPosition,
    RobotStaticStatus, TopicMessage, VideoTransmitterStatus,
};
use crate::state::EntityRegistry;

/// Result of reducing one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(&'static str),
}

/// Merge `message` into the fields of `snapshot` owned by its topic
pub fn reduce(snapshot: &mut Snapshot, message: &TopicMessage) -> Outcome {
    // Everything but match status is interpreted relative to the observed participant
    match (message, snapshot.self_id) {
        (TopicMessage::MatchStatus(msg), _) => reduce_match_status(&mut snapshot.match_status, msg),
        (_, None) => Outcome::Ignored("no observed participant"),
        (TopicMessage::Roster(msg), Some(self_id)) => match self_id.team() {
            Some(team) => reduce_roster(&mut snapshot.participants, team, msg),
            None => Outcome::Ignored("observed participant has no team"),
        },
        (TopicMessage::Profile(msg), Some(self_id)) => {
            reduce_profile(snapshot.participants.get_or_create(self_id), msg)
        }
        (TopicMessage::Dynamic(msg), Some(self_id)) => {
            reduce_dynamic(snapshot.participants.get_or_create(self_id), msg)
        }
        (TopicMessage::Modules(msg), Some(self_id)) => {
            reduce_modules(&mut snapshot.participants.get_or_create(self_id).modules, msg)
        }
        (TopicMessage::Position(msg), Some(self_id)) => {
            reduce_position(&mut snapshot.positions, self_id, msg)
        }
        (TopicMessage::VideoLink(msg), Some(self_id)) => {
            reduce_video_link(&mut snapshot.participants.get_or_create(self_id).video_link, msg)
        }
    }
}

/// Stage, countdown and scores
pub fn reduce_match_status(status: &mut MatchStatus, msg: &GameStatus) -> Outcome {
    let Some(stage) = Stage::from_wire(msg.current_stage) else {
        return Outcome::Ignored("unknown stage");
    };

    if !status.accepts(stage, msg.stage_countdown_sec) {
        debug!(
            "Dropping stale match status {} ({}s) while in {} ({}s)",
            stage.as_str(),
            msg.stage_countdown_sec,
            status.stage.as_str(),
            status.stage_time_left
        );
        return Outcome::Ignored("stale match status");
    }

    if stage != status.stage {
        debug!("Stage {} -> {}", status.stage.as_str(), stage.as_str());
    }

    *status = MatchStatus {
        stage,
        stage_time_left: msg.stage_countdown_sec,
        red_score: msg.red_score,
        blue_score: msg.blue_score,
    };
    Outcome::Applied
}

/// Health of every unit plus the observer team's buildings
pub fn reduce_roster(registry: &mut EntityRegistry, observer: Team, msg: &GlobalUnitStatus) -> Outcome {
    let base = registry.get_or_create(observer.base());
    base.set_health(msg.base_health);
    match BaseStatus::from_wire(msg.base_status) {
        Some(status) => base.building = Some(BuildingState::Base(status)),
        None => warn!("Ignoring unknown base status {}", msg.base_status),
    }

    let outpost = registry.get_or_create(observer.outpost());
    outpost.set_health(msg.outpost_health);
    match OutpostStatus::from_wire(msg.outpost_status) {
        Some(status) => outpost.building = Some(BuildingState::Outpost(status)),
        None => warn!("Ignoring unknown outpost status {}", msg.outpost_status),
    }

    // Indices past the end of a short array leave those units untouched
    let slots = roster_order(observer);
    for (id, health) in slots.iter().zip(msg.robot_health.iter()) {
        registry.get_or_create(*id).set_health(*health);
    }

    if msg.robot_health.len() > slots.len() {
        debug!(
            "Roster carried {} entries, ignoring {} without a participant",
            msg.robot_health.len(),
            msg.robot_health.len() - slots.len()
        );
    }

    Outcome::Applied
}

/// Own team units 1-7 followed by the enemy's, as laid out in the roster array
pub fn roster_order(observer: Team) -> [ParticipantId; 14] {
    let own = observer.unit_ids();
    let enemy = observer.opponent().unit_ids();
    std::array::from_fn(|i| if i < own.len() { own[i] } else { enemy[i - own.len()] })
}

pub fn reduce_profile(status: &mut ParticipantStatus, msg: &RobotStaticStatus) -> Outcome {
    let profile = &mut status.profile;
    profile.max_health = msg.max_health;
    profile.max_heat = msg.max_heat;
    profile.max_power = msg.max_power;
    profile.max_chassis_energy = msg.max_chassis_energy;
    profile.level = msg.level;

    status.clamp_to_profile();
    Outcome::Applied
}

pub fn reduce_dynamic(status: &mut ParticipantStatus, msg: &RobotDynamicStatus) -> Outcome {
    status.set_health(msg.current_health);
    status.set_heat(msg.current_heat);
    status.set_chassis_energy(msg.current_chassis_energy);
    status.set_buffer_energy(msg.current_buffer_energy);
    status.telemetry.ammo = msg.remaining_ammo;
    status.telemetry.power = msg.current_power.max(0.0);
    status.telemetry.in_combat = !msg.is_out_of_combat;
    Outcome::Applied
}

pub fn reduce_modules(modules: &mut ModuleFlags, msg: &RobotModuleStatus) -> Outcome {
    *modules = ModuleFlags::from_array(
        [
            msg.power_manager,
            msg.rfid,
            msg.light_strip,
            msg.small_shooter,
            msg.big_shooter,
            msg.uwb,
            msg.armor,
            msg.video_transmission,
            msg.capacitor,
            msg.main_controller,
        ]
        .map(|flag| flag == 1),
    );
    Outcome::Applied
}

pub fn reduce_position(
    positions: &mut BTreeMap<ParticipantId, Position>,
    id: ParticipantId,
    msg: &RobotPosition,
) -> Outcome {
    positions.insert(
        id,
        Position {
            id,
            x: msg.x,
            y: msg.y,
            heading: msg.yaw,
        },
    );
    Outcome::Applied
}

pub fn reduce_video_link(link: &mut VideoLink, msg: &VideoTransmitterStatus) -> Outcome {
    link.serial_up = msg.serial_status;
    link.connection_up = msg.connection_status;
    link.link_up = msg.link_status;
    link.channel = msg.channel;
    if msg.signal_strength.is_finite() {
        link.signal = msg.signal_strength.clamp(0.0, 100.0);
    } else {
        warn!("Ignoring non-finite signal strength {}", msg.signal_strength);
    }
    match TransmissionMode::from_wire(msg.mode) {
        Some(mode) => link.mode = mode,
        None => warn!("Ignoring unknown transmission mode {}", msg.mode),
    }
    Outcome::Applied
}
