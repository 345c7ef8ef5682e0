use serde::{Deserialize, Serialize};

/// Match lifecycle stage, in the order a match moves through them
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    NotStarted,
    Preparation,
    SelfCheck,
    Countdown,
    Fighting,
    Result,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::NotStarted,
        Stage::Preparation,
        Stage::SelfCheck,
        Stage::Countdown,
        Stage::Fighting,
        Stage::Result,
    ];

    pub fn from_wire(value: u32) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn to_wire(self) -> u32 {
        self as u32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::NotStarted => "not_started",
            Stage::Preparation => "preparation",
            Stage::SelfCheck => "self_check",
            Stage::Countdown => "countdown",
            Stage::Fighting => "fighting",
            Stage::Result => "result",
        }
    }
}

/// Match-wide status, owned by the match status topic
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStatus {
    /// Current stage
    pub stage: Stage,

    /// Seconds remaining in the current stage
    pub stage_time_left: u32,

    /// Red team score
    pub red_score: u32,

    /// Blue team score
    pub blue_score: u32,
}

impl MatchStatus {
    /// Whether a report for `stage` may replace the current status.
    ///
    /// Stages only move forward; `NotStarted` is the explicit reset.
    pub fn accepts(&self, stage: Stage, time_left: u32) -> bool {
        if stage == Stage::NotStarted {
            return true;
        }
        match stage.cmp(&self.stage) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => time_left <= self.stage_time_left,
            std::cmp::Ordering::Less => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Preparation < Stage::SelfCheck);
        assert!(Stage::Fighting < Stage::Result);
        assert_eq!(Stage::from_wire(4), Some(Stage::Fighting));
        assert_eq!(Stage::from_wire(6), None);
    }

    #[test]
    fn test_accepts() {
        let status = MatchStatus {
            stage: Stage::SelfCheck,
            stage_time_left: 10,
            ..Default::default()
        };

        assert!(status.accepts(Stage::Countdown, 5));
        assert!(status.accepts(Stage::SelfCheck, 9));
        assert!(!status.accepts(Stage::SelfCheck, 11));
        assert!(!status.accepts(Stage::Preparation, 100));
        assert!(status.accepts(Stage::NotStarted, 0));
    }
}
