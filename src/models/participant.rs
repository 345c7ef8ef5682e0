use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed ceiling of the fast-reacting buffer energy pool
pub const BUFFER_ENERGY_CAP: u32 = 60;

/// Offset between a red participant id and its blue mirror
const BLUE_OFFSET: u16 = 100;

/// Participant identifier (1-11 red, 101-111 blue)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(pub u16);

impl ParticipantId {
    pub const RED_OUTPOST: ParticipantId = ParticipantId(10);
    pub const RED_BASE: ParticipantId = ParticipantId(11);
    pub const BLUE_OUTPOST: ParticipantId = ParticipantId(110);
    pub const BLUE_BASE: ParticipantId = ParticipantId(111);

    /// Role-relative slot (1-11 for known participants)
    pub fn slot(self) -> u16 {
        if self.0 < BLUE_OFFSET {
            self.0
        } else {
            self.0 % BLUE_OFFSET
        }
    }

    /// Team derived from the id range; `None` for ids outside both teams
    pub fn team(self) -> Option<Team> {
        match self.0 {
            1..=99 => Some(Team::Red),
            101..=199 => Some(Team::Blue),
            _ => None,
        }
    }

    /// Role derived from the slot, never stored separately
    pub fn role(self) -> Option<Role> {
        self.team()?;
        Role::from_slot(self.slot())
    }

    pub fn is_building(self) -> bool {
        self.role().is_some_and(Role::is_building)
    }

    /// Build the id for a slot on the given team
    pub fn from_team_slot(team: Team, slot: u16) -> Self {
        match team {
            Team::Red => ParticipantId(slot),
            Team::Blue => ParticipantId(slot + BLUE_OFFSET),
        }
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.team(), self.role()) {
            (Some(team), Some(role)) => write!(f, "{} {} ({})", team.as_str(), role, self.0),
            _ => write!(f, "#{}", self.0),
        }
    }
}

impl From<u16> for ParticipantId {
    fn from(id: u16) -> Self {
        ParticipantId(id)
    }
}

/// Match side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// The other team
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Team::Red => "red",
            Team::Blue => "blue",
        }
    }

    /// Mobile unit ids (slots 1-7) in roster order
    pub fn unit_ids(self) -> [ParticipantId; 7] {
        [1, 2, 3, 4, 5, 6, 7].map(|slot| ParticipantId::from_team_slot(self, slot))
    }

    /// This team's base
    pub fn base(self) -> ParticipantId {
        match self {
            Team::Red => ParticipantId::RED_BASE,
            Team::Blue => ParticipantId::BLUE_BASE,
        }
    }

    /// This team's outpost
    pub fn outpost(self) -> ParticipantId {
        match self {
            Team::Red => ParticipantId::RED_OUTPOST,
            Team::Blue => ParticipantId::BLUE_OUTPOST,
        }
    }
}

/// Participant role within a team
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hero,
    Engineer,
    Infantry(u8),
    Aerial,
    Sentry,
    Dart,
    Radar,
    Outpost,
    Base,
}

impl Role {
    pub fn from_slot(slot: u16) -> Option<Role> {
        match slot {
            1 => Some(Role::Hero),
            2 => Some(Role::Engineer),
            3..=5 => Some(Role::Infantry(slot as u8)),
            6 => Some(Role::Aerial),
            7 => Some(Role::Sentry),
            8 => Some(Role::Dart),
            9 => Some(Role::Radar),
            10 => Some(Role::Outpost),
            11 => Some(Role::Base),
            _ => None,
        }
    }

    pub fn is_building(self) -> bool {
        matches!(self, Role::Outpost | Role::Base)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Hero => f.write_str("hero"),
            Role::Engineer => f.write_str("engineer"),
            Role::Infantry(n) => write!(f, "infantry {}", n),
            Role::Aerial => f.write_str("aerial"),
            Role::Sentry => f.write_str("sentry"),
            Role::Dart => f.write_str("dart"),
            Role::Radar => f.write_str("radar"),
            Role::Outpost => f.write_str("outpost"),
            Role::Base => f.write_str("base"),
        }
    }
}

/// Static profile, owned by the static profile topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Health ceiling; 0 until reported
    pub max_health: u32,
    /// Barrel heat ceiling
    pub max_heat: u32,
    /// Chassis power limit in watts
    pub max_power: u32,
    /// Chassis energy ceiling
    pub max_chassis_energy: u32,
    /// Robot level, starting at 1
    pub level: u32,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            max_health: 0,
            max_heat: 0,
            max_power: 0,
            max_chassis_energy: 0,
            level: 1,
        }
    }
}

/// High-frequency telemetry, owned by the dynamic telemetry topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Telemetry {
    /// Current barrel heat
    pub heat: u32,
    /// Remaining chassis energy
    pub chassis_energy: u32,
    /// Power buffer, capped at [`BUFFER_ENERGY_CAP`]
    pub buffer_energy: u32,
    /// Projectiles left
    pub ammo: u32,
    /// Instantaneous power draw in watts
    pub power: f32,
    /// Cleared once the referee reports the unit out of combat
    pub in_combat: bool,
}

/// Subsystem health flags, owned by the module health topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleFlags {
    pub power_manager: bool,
    pub rfid: bool,
    pub light_strip: bool,
    pub small_shooter: bool,
    pub big_shooter: bool,
    pub uwb: bool,
    pub armor: bool,
    pub video_transmission: bool,
    pub capacitor: bool,
    pub main_controller: bool,
}

impl ModuleFlags {
    pub const COUNT: usize = 10;

    /// Every module reporting healthy
    pub fn all_up() -> Self {
        Self::from_array([true; Self::COUNT])
    }

    pub fn to_array(self) -> [bool; Self::COUNT] {
        [
            self.power_manager,
            self.rfid,
            self.light_strip,
            self.small_shooter,
            self.big_shooter,
            self.uwb,
            self.armor,
            self.video_transmission,
            self.capacitor,
            self.main_controller,
        ]
    }

    pub fn from_array(flags: [bool; Self::COUNT]) -> Self {
        let [power_manager, rfid, light_strip, small_shooter, big_shooter, uwb, armor, video_transmission, capacitor, main_controller] =
            flags;
        Self {
            power_manager,
            rfid,
            light_strip,
            small_shooter,
            big_shooter,
            uwb,
            armor,
            video_transmission,
            capacitor,
            main_controller,
        }
    }
}

/// Video transmitter transmission mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionMode {
    Hd,
    #[default]
    Smooth,
    LowLatency,
}

impl TransmissionMode {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(TransmissionMode::Hd),
            1 => Some(TransmissionMode::Smooth),
            2 => Some(TransmissionMode::LowLatency),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            TransmissionMode::Hd => 0,
            TransmissionMode::Smooth => 1,
            TransmissionMode::LowLatency => 2,
        }
    }
}

/// Video transmitter link status, owned by the video transmitter topic
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoLink {
    /// Serial port to the transmitter is open
    pub serial_up: bool,
    /// Transmitter connected to the referee server
    pub connection_up: bool,
    /// Video link established
    pub link_up: bool,
    /// Current transmission mode
    pub mode: TransmissionMode,
    /// Radio channel
    pub channel: u32,
    /// Signal quality percentage (0-100)
    pub signal: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseStatus {
    Invincible,
    VulnerableClosed,
    VulnerableOpen,
}

impl BaseStatus {
    pub const ALL: [BaseStatus; 3] = [
        BaseStatus::Invincible,
        BaseStatus::VulnerableClosed,
        BaseStatus::VulnerableOpen,
    ];

    pub fn from_wire(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutpostStatus {
    Invincible,
    Rotating,
    Stopped,
    Destroyed,
    Rebuildable,
}

impl OutpostStatus {
    pub const ALL: [OutpostStatus; 5] = [
        OutpostStatus::Invincible,
        OutpostStatus::Rotating,
        OutpostStatus::Stopped,
        OutpostStatus::Destroyed,
        OutpostStatus::Rebuildable,
    ];

    pub fn from_wire(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }
}

/// Lifecycle status carried only by buildings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum BuildingState {
    Base(BaseStatus),
    Outpost(OutpostStatus),
}

impl BuildingState {
    pub fn cycle(self) -> Self {
        match self {
            BuildingState::Base(s) => BuildingState::Base(s.next()),
            BuildingState::Outpost(s) => BuildingState::Outpost(s.next()),
        }
    }
}

/// Per-participant status record
///
/// Each sub-record is written by exactly one topic. `health` is the one field
/// shared by the roster and dynamic telemetry topics and always goes through
/// [`ParticipantStatus::set_health`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantStatus {
    pub id: ParticipantId,

    health: u32,

    /// Maxima and level
    pub profile: Profile,

    /// Live telemetry
    pub telemetry: Telemetry,

    /// Subsystem health
    pub modules: ModuleFlags,

    /// Video transmitter link
    pub video_link: VideoLink,

    /// Lifecycle status, set for bases and outposts only
    pub building: Option<BuildingState>,
}

impl ParticipantStatus {
    /// All-zero defaults: health 0/0, level 1, every flag down
    pub fn new(id: ParticipantId) -> Self {
        Self {
            id,
            health: 0,
            profile: Profile::default(),
            telemetry: Telemetry::default(),
            modules: ModuleFlags::default(),
            video_link: VideoLink::default(),
            building: None,
        }
    }

    /// Current health
    pub fn health(&self) -> u32 {
        self.health
    }

    /// Whether the participant still has health left
    pub fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Set health, clamped to the max once a max is known
    pub fn set_health(&mut self, health: u32) {
        self.health = clamp_known(health, self.profile.max_health);
    }

    /// Set heat, clamped to the max once a max is known
    pub fn set_heat(&mut self, heat: u32) {
        self.telemetry.heat = clamp_known(heat, self.profile.max_heat);
    }

    /// Set chassis energy, clamped to the max once a max is known
    pub fn set_chassis_energy(&mut self, energy: u32) {
        self.telemetry.chassis_energy = clamp_known(energy, self.profile.max_chassis_energy);
    }

    /// Set buffer energy, never above [`BUFFER_ENERGY_CAP`]
    pub fn set_buffer_energy(&mut self, energy: u32) {
        self.telemetry.buffer_energy = energy.min(BUFFER_ENERGY_CAP);
    }

    /// Re-apply every clamp after a profile change
    pub fn clamp_to_profile(&mut self) {
        self.set_health(self.health);
        self.set_heat(self.telemetry.heat);
        self.set_chassis_energy(self.telemetry.chassis_energy);
        self.set_buffer_energy(self.telemetry.buffer_energy);
    }

    /// Health as a fraction of max (0.0 when max is unknown)
    pub fn health_ratio(&self) -> f32 {
        if self.profile.max_health == 0 {
            0.0
        } else {
            self.health as f32 / self.profile.max_health as f32
        }
    }
}

/// A max of 0 means "not reported yet" and leaves the value unbounded
fn clamp_known(value: u32, max: u32) -> u32 {
    if max == 0 {
        value
    } else {
        value.min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_and_role() {
        assert_eq!(ParticipantId(3).slot(), 3);
        assert_eq!(ParticipantId(103).slot(), 3);
        assert_eq!(ParticipantId(1).role(), Some(Role::Hero));
        assert_eq!(ParticipantId(104).role(), Some(Role::Infantry(4)));
        assert_eq!(ParticipantId(111).role(), Some(Role::Base));
        assert_eq!(ParticipantId(12).role(), None);
        assert_eq!(ParticipantId(0).role(), None);
        assert!(ParticipantId::BLUE_OUTPOST.is_building());
        assert!(!ParticipantId(7).is_building());
    }

    #[test]
    fn test_team() {
        assert_eq!(ParticipantId(7).team(), Some(Team::Red));
        assert_eq!(ParticipantId(107).team(), Some(Team::Blue));
        assert_eq!(ParticipantId(100).team(), None);
        assert_eq!(Team::Blue.unit_ids()[0], ParticipantId(101));
        assert_eq!(Team::Red.opponent(), Team::Blue);
    }

    #[test]
    fn test_defaults() {
        let status = ParticipantStatus::new(ParticipantId(3));
        assert_eq!(status.health(), 0);
        assert_eq!(status.profile.max_health, 0);
        assert_eq!(status.profile.level, 1);
        assert_eq!(status.modules, ModuleFlags::default());
        assert!(!status.video_link.link_up);
        assert_eq!(status.video_link.signal, 0.0);
    }

    #[test]
    fn test_clamp_only_when_max_known() {
        let mut status = ParticipantStatus::new(ParticipantId(1));
        status.set_health(150);
        assert_eq!(status.health(), 150);

        status.profile.max_health = 100;
        status.clamp_to_profile();
        assert_eq!(status.health(), 100);

        status.set_buffer_energy(500);
        assert_eq!(status.telemetry.buffer_energy, BUFFER_ENERGY_CAP);
    }

    #[test]
    fn test_health_ratio_and_alive() {
        let mut status = ParticipantStatus::new(ParticipantId(7));
        status.set_health(200);
        assert!(status.is_alive());
        assert_eq!(status.health_ratio(), 0.0);

        status.profile.max_health = 400;
        assert_eq!(status.health_ratio(), 0.5);

        status.set_health(0);
        assert!(!status.is_alive());
        assert_eq!(status.health_ratio(), 0.0);
    }

    #[test]
    fn test_building_cycle() {
        assert_eq!(BaseStatus::VulnerableOpen.next(), BaseStatus::Invincible);
        assert_eq!(OutpostStatus::Rebuildable.next(), OutpostStatus::Invincible);
        assert_eq!(
            BuildingState::Outpost(OutpostStatus::Rotating).cycle(),
            BuildingState::Outpost(OutpostStatus::Stopped)
        );
        assert_eq!(OutpostStatus::from_wire(5), None);
    }
}
