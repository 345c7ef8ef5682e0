pub mod command;
pub mod messages;

use prost::Message;

use crate::error::DecodeError;
use crate::models::Stage;

pub use command::{decode_command, encode_command};
pub use messages::{
    GameStatus, GlobalUnitStatus, RobotDynamicStatus, RobotModuleStatus, RobotPosition,
    RobotStaticStatus, VideoTransmitterStatus,
};

/// Status topics the HUD subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    GameStatus,
    GlobalUnitStatus,
    RobotStaticStatus,
    RobotDynamicStatus,
    RobotModuleStatus,
    RobotPosition,
    VideoTransmitterStatus,
    GlobalLogisticsStatus,
    Buff,
    RobotInjuryStat,
}

impl Topic {
    pub const SUBSCRIBED: [Topic; 10] = [
        Topic::GameStatus,
        Topic::GlobalUnitStatus,
        Topic::RobotStaticStatus,
        Topic::RobotDynamicStatus,
        Topic::RobotModuleStatus,
        Topic::RobotPosition,
        Topic::VideoTransmitterStatus,
        Topic::GlobalLogisticsStatus,
        Topic::Buff,
        Topic::RobotInjuryStat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::GameStatus => "GameStatus",
            Topic::GlobalUnitStatus => "GlobalUnitStatus",
            Topic::RobotStaticStatus => "RobotStaticStatus",
            Topic::RobotDynamicStatus => "RobotDynamicStatus",
            Topic::RobotModuleStatus => "RobotModuleStatus",
            Topic::RobotPosition => "RobotPosition",
            Topic::VideoTransmitterStatus => "VideoTransmitterStatus",
            Topic::GlobalLogisticsStatus => "GlobalLogisticsStatus",
            Topic::Buff => "Buff",
            Topic::RobotInjuryStat => "RobotInjuryStat",
        }
    }

    pub fn from_name(name: &str) -> Option<Topic> {
        Self::SUBSCRIBED.into_iter().find(|t| t.as_str() == name)
    }
}

/// A decoded status message, tagged by the topic it arrived on
#[derive(Debug, Clone, PartialEq)]
pub enum TopicMessage {
    MatchStatus(GameStatus),
    Roster(GlobalUnitStatus),
    Profile(RobotStaticStatus),
    Dynamic(RobotDynamicStatus),
    Modules(RobotModuleStatus),
    Position(RobotPosition),
    VideoLink(VideoTransmitterStatus),
}

impl TopicMessage {
    pub fn topic(&self) -> Topic {
        match self {
            TopicMessage::MatchStatus(_) => Topic::GameStatus,
            TopicMessage::Roster(_) => Topic::GlobalUnitStatus,
            TopicMessage::Profile(_) => Topic::RobotStaticStatus,
            TopicMessage::Dynamic(_) => Topic::RobotDynamicStatus,
            TopicMessage::Modules(_) => Topic::RobotModuleStatus,
            TopicMessage::Position(_) => Topic::RobotPosition,
            TopicMessage::VideoLink(_) => Topic::VideoTransmitterStatus,
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            TopicMessage::MatchStatus(m) => m.encode_to_vec(),
            TopicMessage::Roster(m) => m.encode_to_vec(),
            TopicMessage::Profile(m) => m.encode_to_vec(),
            TopicMessage::Dynamic(m) => m.encode_to_vec(),
            TopicMessage::Modules(m) => m.encode_to_vec(),
            TopicMessage::Position(m) => m.encode_to_vec(),
            TopicMessage::VideoLink(m) => m.encode_to_vec(),
        }
    }
}

/// Decode a payload received on `topic`.
///
/// Returns `Ok(None)` for recognized topics that carry nothing the snapshot
/// tracks.
pub fn decode(topic: &str, payload: &[u8]) -> Result<Option<TopicMessage>, DecodeError> {
    let topic = Topic::from_name(topic).ok_or_else(|| DecodeError::UnknownTopic(topic.to_string()))?;

    let message = match topic {
        Topic::GameStatus => {
            let msg: GameStatus = decode_as(topic, payload)?;
            if Stage::from_wire(msg.current_stage).is_none() {
                return Err(DecodeError::InvalidValue {
                    topic: topic.as_str(),
                    field: "current_stage",
                    value: msg.current_stage,
                });
            }
            TopicMessage::MatchStatus(msg)
        }
        Topic::GlobalUnitStatus => TopicMessage::Roster(decode_as(topic, payload)?),
        Topic::RobotStaticStatus => TopicMessage::Profile(decode_as(topic, payload)?),
        Topic::RobotDynamicStatus => TopicMessage::Dynamic(decode_as(topic, payload)?),
        Topic::RobotModuleStatus => TopicMessage::Modules(decode_as(topic, payload)?),
        Topic::RobotPosition => TopicMessage::Position(decode_as(topic, payload)?),
        Topic::VideoTransmitterStatus => TopicMessage::VideoLink(decode_as(topic, payload)?),
        Topic::GlobalLogisticsStatus | Topic::Buff | Topic::RobotInjuryStat => return Ok(None),
    };

    Ok(Some(message))
}

fn decode_as<M: Message + Default>(topic: Topic, payload: &[u8]) -> Result<M, DecodeError> {
    M::decode(payload).map_err(|source| DecodeError::Malformed {
        topic: topic.as_str(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_game_status() {
        let msg = GameStatus {
            current_stage: 4,
            stage_countdown_sec: 300,
            red_score: 1,
            blue_score: 2,
        };
        let decoded = decode("GameStatus", &msg.encode_to_vec()).unwrap();
        assert_eq!(decoded, Some(TopicMessage::MatchStatus(msg)));
    }

    #[test]
    fn test_decode_unknown_topic() {
        let err = decode("Weather", &[]).unwrap_err();
        assert!(matches!(err, DecodeError::UnknownTopic(name) if name == "Weather"));
    }

    #[test]
    fn test_decode_malformed() {
        // Truncated varint
        let err = decode("RobotStaticStatus", &[0x08, 0xff]).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { topic: "RobotStaticStatus", .. }));
    }

    #[test]
    fn test_decode_invalid_stage() {
        let msg = GameStatus {
            current_stage: 9,
            ..Default::default()
        };
        let err = decode("GameStatus", &msg.encode_to_vec()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { field: "current_stage", value: 9, .. }));
    }

    #[test]
    fn test_informational_topics_have_no_message() {
        assert_eq!(decode("Buff", &[]).unwrap(), None);
        assert_eq!(decode("RobotInjuryStat", &[]).unwrap(), None);
    }

    #[test]
    fn test_topic_names_round_trip() {
        for topic in Topic::SUBSCRIBED {
            assert_eq!(Topic::from_name(topic.as_str()), Some(topic));
        }
    }
}
