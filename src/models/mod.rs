pub mod command;
pub mod match_status;
pub mod participant;
pub mod snapshot;

pub use command::{ChassisType, Command, ExchangeKind, ShooterType};
pub use match_status::{MatchStatus, Stage};
pub use participant::{
    BaseStatus, BuildingState, ModuleFlags, OutpostStatus, ParticipantId, ParticipantStatus,
    Profile, Role, Team, Telemetry, TransmissionMode, VideoLink, BUFFER_ENERGY_CAP,
};
pub use snapshot::{Position, Snapshot, FIELD_HEIGHT, FIELD_WIDTH};
