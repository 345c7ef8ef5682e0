use thiserror::Error;

/// Failure to turn an inbound topic payload into a typed message
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unknown topic: {0}")]
    UnknownTopic(String),

    #[error("malformed {topic} payload: {source}")]
    Malformed {
        topic: &'static str,
        #[source]
        source: prost::DecodeError,
    },

    #[error("{topic}.{field} has invalid value {value}")]
    InvalidValue {
        topic: &'static str,
        field: &'static str,
        value: u32,
    },
}

/// Failure to send an operator command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid {command} command: {reason}")]
    Invalid {
        command: &'static str,
        reason: String,
    },

    #[error("no source connected")]
    NotConnected,

    #[error("transport error: {0}")]
    Transport(String),
}
