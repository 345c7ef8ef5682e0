use prost::Message;

use crate::error::DecodeError;
use crate::models::{ChassisType, Command, ExchangeKind, ShooterType};
use crate::protocol::messages::{
    AmmoExchangeCommand, HeroDeployModeEventCommand, RobotPerformanceSelectionCommand,
};

const PERFORMANCE_TOPIC: &str = "RobotPerformanceSelectionCommand";
const DEPLOY_TOPIC: &str = "HeroDeployModeEventCommand";
const EXCHANGE_TOPIC: &str = "AmmoExchangeCommand";

/// Broker topic a command is published on
pub fn command_topic(command: &Command) -> &'static str {
    match command {
        Command::PerformanceSelection { .. } => PERFORMANCE_TOPIC,
        Command::HeroDeployMode { .. } => DEPLOY_TOPIC,
        Command::AmmoExchange { .. } => EXCHANGE_TOPIC,
    }
}

/// Encode a command into its topic and protobuf payload
pub fn encode_command(command: &Command) -> (&'static str, Vec<u8>) {
    let payload = match command {
        Command::PerformanceSelection { chassis, shooter } => RobotPerformanceSelectionCommand {
            chassis_type: chassis.to_wire(),
            shooter_type: shooter.to_wire(),
        }
        .encode_to_vec(),
        Command::HeroDeployMode { enabled } => HeroDeployModeEventCommand {
            mode: u32::from(*enabled),
        }
        .encode_to_vec(),
        Command::AmmoExchange { kind, amount } => AmmoExchangeCommand {
            exchange_type: kind.to_wire(),
            amount: *amount,
        }
        .encode_to_vec(),
    };

    (command_topic(command), payload)
}

/// Decode a command as the referee system would receive it
pub fn decode_command(topic: &str, payload: &[u8]) -> Result<Command, DecodeError> {
    match topic {
        PERFORMANCE_TOPIC => {
            let msg = RobotPerformanceSelectionCommand::decode(payload)
                .map_err(|source| malformed(PERFORMANCE_TOPIC, source))?;
            let chassis = ChassisType::from_wire(msg.chassis_type).ok_or(DecodeError::InvalidValue {
                topic: PERFORMANCE_TOPIC,
                field: "chassis_type",
                value: msg.chassis_type,
            })?;
            let shooter = ShooterType::from_wire(msg.shooter_type).ok_or(DecodeError::InvalidValue {
                topic: PERFORMANCE_TOPIC,
                field: "shooter_type",
                value: msg.shooter_type,
            })?;
            Ok(Command::PerformanceSelection { chassis, shooter })
        }
        DEPLOY_TOPIC => {
            let msg = HeroDeployModeEventCommand::decode(payload)
                .map_err(|source| malformed(DEPLOY_TOPIC, source))?;
            Ok(Command::HeroDeployMode {
                enabled: msg.mode != 0,
            })
        }
        EXCHANGE_TOPIC => {
            let msg = AmmoExchangeCommand::decode(payload)
                .map_err(|source| malformed(EXCHANGE_TOPIC, source))?;
            let kind = ExchangeKind::from_wire(msg.exchange_type).ok_or(DecodeError::InvalidValue {
                topic: EXCHANGE_TOPIC,
                field: "exchange_type",
                value: msg.exchange_type,
            })?;
            Ok(Command::AmmoExchange {
                kind,
                amount: msg.amount,
            })
        }
        other => Err(DecodeError::UnknownTopic(other.to_string())),
    }
}

fn malformed(topic: &'static str, source: prost::DecodeError) -> DecodeError {
    DecodeError::Malformed { topic, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParticipantId;

    /// Validate, encode and decode on a mock receiver
    fn send_and_receive(command: &Command, self_id: ParticipantId) -> Command {
        command.validate(Some(self_id)).unwrap();
        let (topic, payload) = encode_command(command);
        decode_command(topic, &payload).unwrap()
    }

    #[test]
    fn test_performance_selection_round_trip() {
        let cmd = Command::PerformanceSelection {
            chassis: ChassisType::HpPriority,
            shooter: ShooterType::BurstPriority,
        };
        assert_eq!(send_and_receive(&cmd, ParticipantId(3)), cmd);
    }

    #[test]
    fn test_deploy_round_trip() {
        for enabled in [true, false] {
            let cmd = Command::HeroDeployMode { enabled };
            assert_eq!(send_and_receive(&cmd, ParticipantId(101)), cmd);
        }
    }

    #[test]
    fn test_ammo_exchange_round_trip() {
        let cmd = Command::AmmoExchange {
            kind: ExchangeKind::Remote,
            amount: 200,
        };
        assert_eq!(send_and_receive(&cmd, ParticipantId(4)), cmd);
    }

    #[test]
    fn test_decode_rejects_unknown_preset() {
        let payload = RobotPerformanceSelectionCommand {
            chassis_type: 7,
            shooter_type: 0,
        }
        .encode_to_vec();
        let err = decode_command(PERFORMANCE_TOPIC, &payload).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidValue { field: "chassis_type", .. }));
    }
}
