//! Protobuf schemas for referee system topics.
//!
//! The topic name on the broker is the message type name.

/// Match stage, countdown and scores
#[derive(Clone, PartialEq, prost::Message)]
pub struct GameStatus {
    #[prost(uint32, tag = "1")]
    pub current_stage: u32,
    #[prost(uint32, tag = "2")]
    pub stage_countdown_sec: u32,
    #[prost(uint32, tag = "3")]
    pub red_score: u32,
    #[prost(uint32, tag = "4")]
    pub blue_score: u32,
}

/// Coarse health of every unit plus the observer team's buildings
#[derive(Clone, PartialEq, prost::Message)]
pub struct GlobalUnitStatus {
    #[prost(uint32, tag = "1")]
    pub base_health: u32,
    #[prost(uint32, tag = "2")]
    pub base_status: u32,
    #[prost(uint32, tag = "3")]
    pub outpost_health: u32,
    #[prost(uint32, tag = "4")]
    pub outpost_status: u32,
    /// Own team units 1-7 followed by enemy units 1-7
    #[prost(uint32, repeated, tag = "5")]
    pub robot_health: Vec<u32>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RobotStaticStatus {
    #[prost(uint32, tag = "1")]
    pub max_health: u32,
    #[prost(uint32, tag = "2")]
    pub max_heat: u32,
    #[prost(uint32, tag = "3")]
    pub max_power: u32,
    #[prost(uint32, tag = "4")]
    pub max_chassis_energy: u32,
    #[prost(uint32, tag = "5")]
    pub level: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RobotDynamicStatus {
    #[prost(uint32, tag = "1")]
    pub current_health: u32,
    #[prost(uint32, tag = "2")]
    pub current_heat: u32,
    #[prost(uint32, tag = "3")]
    pub current_chassis_energy: u32,
    #[prost(uint32, tag = "4")]
    pub current_buffer_energy: u32,
    #[prost(uint32, tag = "5")]
    pub remaining_ammo: u32,
    #[prost(bool, tag = "6")]
    pub is_out_of_combat: bool,
    #[prost(float, tag = "7")]
    pub current_power: f32,
}

/// Subsystem health, 1 = online
#[derive(Clone, PartialEq, prost::Message)]
pub struct RobotModuleStatus {
    #[prost(uint32, tag = "1")]
    pub power_manager: u32,
    #[prost(uint32, tag = "2")]
    pub rfid: u32,
    #[prost(uint32, tag = "3")]
    pub light_strip: u32,
    #[prost(uint32, tag = "4")]
    pub small_shooter: u32,
    #[prost(uint32, tag = "5")]
    pub big_shooter: u32,
    #[prost(uint32, tag = "6")]
    pub uwb: u32,
    #[prost(uint32, tag = "7")]
    pub armor: u32,
    #[prost(uint32, tag = "8")]
    pub video_transmission: u32,
    #[prost(uint32, tag = "9")]
    pub capacitor: u32,
    #[prost(uint32, tag = "10")]
    pub main_controller: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RobotPosition {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub yaw: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct VideoTransmitterStatus {
    #[prost(bool, tag = "1")]
    pub serial_status: bool,
    #[prost(bool, tag = "2")]
    pub connection_status: bool,
    #[prost(bool, tag = "3")]
    pub link_status: bool,
    #[prost(uint32, tag = "4")]
    pub mode: u32,
    #[prost(uint32, tag = "5")]
    pub channel: u32,
    #[prost(float, tag = "6")]
    pub signal_strength: f32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct RobotPerformanceSelectionCommand {
    #[prost(uint32, tag = "1")]
    pub chassis_type: u32,
    #[prost(uint32, tag = "2")]
    pub shooter_type: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct HeroDeployModeEventCommand {
    #[prost(uint32, tag = "1")]
    pub mode: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct AmmoExchangeCommand {
    #[prost(uint32, tag = "1")]
    pub exchange_type: u32,
    #[prost(uint32, tag = "2")]
    pub amount: u32,
}
