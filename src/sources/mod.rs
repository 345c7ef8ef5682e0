pub mod live;
pub mod synthetic;

use std::fmt;

use tracing::info;

use crate::config::Config;
use crate::error::CommandError;
use crate::models::{Command, ParticipantId, Snapshot};
use crate::state::{Aggregator, Subscription};

pub use live::{BrokerSettings, LiveAdapter};
pub use synthetic::{Simulation, SyntheticAdapter};

/// Which telemetry source feeds the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Live,
    Synthetic,
}

impl SourceKind {
    pub fn from_simulate_flag(simulate: bool) -> Self {
        if simulate {
            SourceKind::Synthetic
        } else {
            SourceKind::Live
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Live => f.write_str("live"),
            SourceKind::Synthetic => f.write_str("synthetic"),
        }
    }
}

/// A telemetry source; both variants share one contract
pub enum SourceAdapter {
    Live(LiveAdapter),
    Synthetic(SyntheticAdapter),
}

impl SourceAdapter {
    pub fn new(kind: SourceKind, aggregator: Aggregator, config: &Config) -> Self {
        match kind {
            SourceKind::Live => SourceAdapter::Live(LiveAdapter::new(aggregator, BrokerSettings::from(config))),
            SourceKind::Synthetic => SourceAdapter::Synthetic(SyntheticAdapter::new(
                aggregator,
                config.synthetic_tick(),
                config.synthetic_seed,
            )),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceAdapter::Live(_) => SourceKind::Live,
            SourceAdapter::Synthetic(_) => SourceKind::Synthetic,
        }
    }

    pub fn connect(&mut self, self_id: ParticipantId) {
        match self {
            SourceAdapter::Live(adapter) => adapter.connect(self_id),
            SourceAdapter::Synthetic(adapter) => adapter.connect(self_id),
        }
    }

    /// Idempotent; returns once the source can no longer mutate the aggregator
    pub async fn disconnect(&mut self) {
        match self {
            SourceAdapter::Live(adapter) => adapter.disconnect().await,
            SourceAdapter::Synthetic(adapter) => adapter.disconnect().await,
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.aggregator().subscribe(callback)
    }

    pub fn send_command(&self, command: Command) -> Result<(), CommandError> {
        match self {
            SourceAdapter::Live(adapter) => adapter.send_command(command),
            SourceAdapter::Synthetic(adapter) => adapter.send_command(command),
        }
    }

    fn aggregator(&self) -> &Aggregator {
        match self {
            SourceAdapter::Live(adapter) => adapter.aggregator(),
            SourceAdapter::Synthetic(adapter) => adapter.aggregator(),
        }
    }
}

/// Owns the single active source and switches between them
pub struct SourceController {
    aggregator: Aggregator,
    config: Config,
    active: Option<SourceAdapter>,
}

impl SourceController {
    pub fn new(aggregator: Aggregator, config: Config) -> Self {
        Self {
            aggregator,
            config,
            active: None,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn kind(&self) -> Option<SourceKind> {
        self.active.as_ref().map(SourceAdapter::kind)
    }

    /// Make `kind` the active source observing `self_id`.
    ///
    /// A different kind fully stops the previous source and clears its state
    /// before the new one starts.
    pub async fn activate(&mut self, kind: SourceKind, self_id: ParticipantId) {
        if let Some(active) = self.active.as_mut() {
            if active.kind() == kind {
                active.connect(self_id);
                return;
            }
            active.disconnect().await;
            self.active = None;
            self.aggregator.reset();
            info!("Switched source to {}", kind);
        }

        let mut adapter = SourceAdapter::new(kind, self.aggregator.clone(), &self.config);
        adapter.connect(self_id);
        self.active = Some(adapter);
    }

    /// Observe a different participant through the active source
    pub fn set_self(&mut self, self_id: ParticipantId) {
        match self.active.as_mut() {
            Some(active) => active.connect(self_id),
            None => self.aggregator.set_self(self_id),
        }
    }

    pub fn send_command(&self, command: Command) -> Result<(), CommandError> {
        match &self.active {
            Some(active) => active.send_command(command),
            None => Err(CommandError::NotConnected),
        }
    }

    /// Stop the active source; safe to call repeatedly
    pub async fn shutdown(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.disconnect().await;
        }
    }
}
