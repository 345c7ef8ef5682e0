use anyhow::{bail, Context, Result};

use crate::models::{ChassisType, Command, ExchangeKind, ParticipantId, ShooterType};
use crate::sources::SourceKind;

/// A line typed by the operator on stdin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Switch the telemetry source
    Source(SourceKind),
    /// Observe a different participant
    SelfId(ParticipantId),
    /// Forward an operator command to the source
    Send(Command),
    /// Print the current snapshot
    Status,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Self> {
        let words: Vec<&str> = line.split_whitespace().collect();

        let command = match words.as_slice() {
            ["live"] => ConsoleCommand::Source(SourceKind::Live),
            ["sim"] => ConsoleCommand::Source(SourceKind::Synthetic),
            ["self", id] => {
                let id: u16 = id.parse().context("participant id must be a number")?;
                let id = ParticipantId(id);
                if id.role().is_none() {
                    bail!("{} is not a known participant", id.0);
                }
                ConsoleCommand::SelfId(id)
            }
            ["deploy", mode] => ConsoleCommand::Send(Command::HeroDeployMode {
                enabled: parse_switch(mode)?,
            }),
            ["ammo", kind, amount] => ConsoleCommand::Send(Command::AmmoExchange {
                kind: parse_exchange(kind)?,
                amount: amount.parse().context("ammo amount must be a number")?,
            }),
            ["perf", chassis, shooter] => ConsoleCommand::Send(Command::PerformanceSelection {
                chassis: parse_chassis(chassis)?,
                shooter: parse_shooter(shooter)?,
            }),
            ["status"] => ConsoleCommand::Status,
            ["quit"] | ["exit"] => ConsoleCommand::Quit,
            [] => bail!("empty command"),
            _ => bail!("unrecognized command: {}", line.trim()),
        };

        Ok(command)
    }
}

fn parse_switch(word: &str) -> Result<bool> {
    match word {
        "on" => Ok(true),
        "off" => Ok(false),
        other => bail!("expected on/off, got {}", other),
    }
}

fn parse_exchange(word: &str) -> Result<ExchangeKind> {
    match word {
        "hero" => Ok(ExchangeKind::Hero),
        "infantry" => Ok(ExchangeKind::Infantry),
        "remote" => Ok(ExchangeKind::Remote),
        other => bail!("unknown exchange {}", other),
    }
}

fn parse_chassis(word: &str) -> Result<ChassisType> {
    match word {
        "power" => Ok(ChassisType::PowerPriority),
        "hp" => Ok(ChassisType::HpPriority),
        "balance" => Ok(ChassisType::Balance),
        other => bail!("unknown chassis preset {}", other),
    }
}

fn parse_shooter(word: &str) -> Result<ShooterType> {
    match word {
        "cooling" => Ok(ShooterType::CoolingPriority),
        "burst" => Ok(ShooterType::BurstPriority),
        "standard" => Ok(ShooterType::Standard),
        other => bail!("unknown shooter preset {}", other),
    }
}
