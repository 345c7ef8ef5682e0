use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::models::{ParticipantId, Role};

/// Largest ammo amount a single exchange may request
pub const MAX_EXCHANGE_AMOUNT: u32 = 1000;

/// Ammo is exchanged in steps of this size
pub const EXCHANGE_STEP: u32 = 10;

/// Chassis performance preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChassisType {
    PowerPriority,
    HpPriority,
    #[default]
    Balance,
}

impl ChassisType {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(ChassisType::PowerPriority),
            1 => Some(ChassisType::HpPriority),
            2 => Some(ChassisType::Balance),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// Shooter performance preset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShooterType {
    CoolingPriority,
    BurstPriority,
    #[default]
    Standard,
}

impl ShooterType {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(ShooterType::CoolingPriority),
            1 => Some(ShooterType::BurstPriority),
            2 => Some(ShooterType::Standard),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// Which exchange counter an ammo request goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeKind {
    Hero,
    Infantry,
    Remote,
}

impl ExchangeKind {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(ExchangeKind::Hero),
            1 => Some(ExchangeKind::Infantry),
            2 => Some(ExchangeKind::Remote),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }
}

/// Operator-initiated action sent to the referee system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Command {
    PerformanceSelection {
        chassis: ChassisType,
        shooter: ShooterType,
    },
    HeroDeployMode {
        enabled: bool,
    },
    AmmoExchange {
        kind: ExchangeKind,
        amount: u32,
    },
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::PerformanceSelection { .. } => "performance_selection",
            Command::HeroDeployMode { .. } => "hero_deploy_mode",
            Command::AmmoExchange { .. } => "ammo_exchange",
        }
    }

    /// Check the payload against the sender's identity before it is encoded
    pub fn validate(&self, self_id: Option<ParticipantId>) -> Result<(), CommandError> {
        match self {
            Command::PerformanceSelection { .. } => Ok(()),
            Command::HeroDeployMode { .. } => {
                if self_id.and_then(ParticipantId::role) == Some(Role::Hero) {
                    Ok(())
                } else {
                    Err(self.invalid("deploy mode is only available to heroes"))
                }
            }
            Command::AmmoExchange { amount, .. } => {
                if *amount == 0 || *amount > MAX_EXCHANGE_AMOUNT {
                    Err(self.invalid(format!(
                        "amount {} outside 1..={}",
                        amount, MAX_EXCHANGE_AMOUNT
                    )))
                } else if amount % EXCHANGE_STEP != 0 {
                    Err(self.invalid(format!(
                        "amount {} is not a multiple of {}",
                        amount, EXCHANGE_STEP
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> CommandError {
        CommandError::Invalid {
            command: self.as_str(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_requires_hero() {
        let cmd = Command::HeroDeployMode { enabled: true };
        assert!(cmd.validate(Some(ParticipantId(1))).is_ok());
        assert!(cmd.validate(Some(ParticipantId(101))).is_ok());
        assert!(cmd.validate(Some(ParticipantId(3))).is_err());
        assert!(cmd.validate(None).is_err());
    }

    #[test]
    fn test_ammo_amount_rules() {
        let ok = Command::AmmoExchange {
            kind: ExchangeKind::Infantry,
            amount: 50,
        };
        assert!(ok.validate(Some(ParticipantId(3))).is_ok());

        for amount in [0, 15, MAX_EXCHANGE_AMOUNT + EXCHANGE_STEP] {
            let cmd = Command::AmmoExchange {
                kind: ExchangeKind::Hero,
                amount,
            };
            assert!(matches!(
                cmd.validate(Some(ParticipantId(1))),
                Err(CommandError::Invalid { .. })
            ));
        }
    }
}
