use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, SubscribeFilter};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::CommandError;
use crate::models::{Command, ParticipantId};
use crate::protocol::{encode_command, Topic};
use crate::state::{Aggregator, Outcome};

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 64;

/// Broker connection settings
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl From<&Config> for BrokerSettings {
    fn from(config: &Config) -> Self {
        let (backoff_min, backoff_max) = config.reconnect_backoff();
        Self {
            host: config.broker_host.clone(),
            port: config.broker_port,
            keep_alive: config.keep_alive(),
            backoff_min,
            backoff_max,
        }
    }
}

struct Session {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Source that mirrors the referee system's MQTT broker into the aggregator
pub struct LiveAdapter {
    aggregator: Aggregator,
    settings: BrokerSettings,
    session: Option<Session>,
}

impl LiveAdapter {
    pub fn new(aggregator: Aggregator, settings: BrokerSettings) -> Self {
        Self {
            aggregator,
            settings,
            session: None,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    /// Whether the broker has acknowledged the current connection
    pub fn is_connected(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|s| s.connected.load(Ordering::Acquire))
    }

    /// Open the broker session, or just switch identity if one is open
    pub fn connect(&mut self, self_id: ParticipantId) {
        self.aggregator.set_self(self_id);

        if self.session.as_ref().is_some_and(|s| !s.handle.is_finished()) {
            info!("Already connected, observing {}", self_id);
            return;
        }

        let client_id = format!("custom_client_{}_{:08x}", self_id.0, rand::random::<u32>());
        let mut options = MqttOptions::new(client_id, self.settings.host.clone(), self.settings.port);
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let (shutdown, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(run_event_loop(
            eventloop,
            client.clone(),
            self.aggregator.clone(),
            Arc::clone(&connected),
            shutdown_rx,
            self.settings.clone(),
        ));

        info!(
            "Connecting to referee broker at {}:{} as {}",
            self.settings.host, self.settings.port, self_id
        );
        self.session = Some(Session {
            client,
            connected,
            shutdown,
            handle,
        });
    }

    /// Close the session and wait for the event loop to exit
    pub async fn disconnect(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };

        let _ = session.shutdown.send(());
        if let Err(e) = session.handle.await {
            warn!("Broker event loop ended abnormally: {}", e);
        }
        info!("Disconnected from referee broker");
    }

    /// Publish an operator command; fire-and-forget
    pub fn send_command(&self, command: Command) -> Result<(), CommandError> {
        command.validate(self.aggregator.self_id())?;

        let session = self
            .session
            .as_ref()
            .filter(|s| s.connected.load(Ordering::Acquire))
            .ok_or(CommandError::NotConnected)?;

        let (topic, payload) = encode_command(&command);
        session
            .client
            .try_publish(topic, QoS::AtLeastOnce, false, payload)
            .map_err(|e| CommandError::Transport(e.to_string()))?;

        debug!("Sent {} command", command.as_str());
        Ok(())
    }

    /// Route one inbound publish into the aggregator
    pub fn handle_publish(&self, topic: &str, payload: &[u8]) -> Option<Outcome> {
        handle_publish(&self.aggregator, topic, payload)
    }
}

fn handle_publish(aggregator: &Aggregator, topic: &str, payload: &[u8]) -> Option<Outcome> {
    aggregator.apply_raw(topic, payload)
}

fn status_subscriptions() -> Vec<SubscribeFilter> {
    Topic::SUBSCRIBED
        .iter()
        .map(|topic| SubscribeFilter::new(topic.as_str().to_string(), QoS::AtLeastOnce))
        .collect()
}

/// Exponential reconnect delay
#[derive(Debug, Clone, Copy)]
struct Backoff {
    current: Duration,
    min: Duration,
    max: Duration,
}

impl Backoff {
    fn new(min: Duration, max: Duration) -> Self {
        Self {
            current: min,
            min,
            max: max.max(min),
        }
    }

    /// Delay to wait now; doubles the next one up to the ceiling
    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    fn reset(&mut self) {
        self.current = self.min;
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    aggregator: Aggregator,
    connected: Arc<AtomicBool>,
    mut shutdown: oneshot::Receiver<()>,
    settings: BrokerSettings,
) {
    let mut backoff = Backoff::new(settings.backoff_min, settings.backoff_max);

    loop {
        let event = tokio::select! {
            _ = &mut shutdown => break,
            event = eventloop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Release);
                backoff.reset();
                info!("Connected to referee broker");

                // Clean sessions drop subscriptions, so renew them on every connect
                if let Err(e) = client.try_subscribe_many(status_subscriptions()) {
                    error!("Failed to subscribe to status topics: {}", e);
                }
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                handle_publish(&aggregator, &publish.topic, &publish.payload);
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Release);
                let delay = backoff.next_delay();
                warn!("Broker connection error: {}; retrying in {:?}", e, delay);

                tokio::select! {
                    _ = &mut shutdown => break,
                    _ = time::sleep(delay) => {}
                }
            }
        }
    }

    connected.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    use crate::protocol::{GlobalUnitStatus, TopicMessage};

    fn adapter() -> LiveAdapter {
        LiveAdapter::new(Aggregator::new(), BrokerSettings::from(&Config::default()))
    }

    #[test]
    fn test_roster_publish_scenario() {
        let adapter = adapter();
        adapter.aggregator().set_self(ParticipantId(3));

        let payload = GlobalUnitStatus {
            robot_health: vec![150, 300, 150, 150, 150, 200, 400],
            ..Default::default()
        }
        .encode_to_vec();
        assert_eq!(adapter.handle_publish("GlobalUnitStatus", &payload), Some(Outcome::Applied));

        let snapshot = adapter.aggregator().snapshot();
        assert_eq!(snapshot.participant(ParticipantId(1)).unwrap().health(), 150);
        assert_eq!(snapshot.participant(ParticipantId(2)).unwrap().health(), 300);
        assert!(snapshot.participant(ParticipantId(101)).is_none());
    }

    #[test]
    fn test_bad_publish_keeps_going() {
        let adapter = adapter();
        adapter.aggregator().set_self(ParticipantId(3));

        assert_eq!(adapter.handle_publish("GlobalUnitStatus", &[0xff, 0xff, 0xff]), None);
        assert_eq!(adapter.handle_publish("Unheard", &[]), None);

        let payload = TopicMessage::Roster(GlobalUnitStatus {
            robot_health: vec![10],
            ..Default::default()
        })
        .encode_to_vec();
        assert_eq!(adapter.handle_publish("GlobalUnitStatus", &payload), Some(Outcome::Applied));
    }

    #[tokio::test]
    async fn test_disconnect_when_never_connected() {
        let mut adapter = adapter();
        adapter.disconnect().await;
        adapter.disconnect().await;
        assert!(!adapter.is_connected());
    }

    #[tokio::test]
    async fn test_disconnect_during_reconnect_backoff() {
        let settings = BrokerSettings {
            host: "127.0.0.1".to_string(),
            port: 1,
            keep_alive: Duration::from_secs(5),
            backoff_min: Duration::from_secs(60),
            backoff_max: Duration::from_secs(60),
        };
        let mut adapter = LiveAdapter::new(Aggregator::new(), settings);
        adapter.connect(ParticipantId(3));

        // Refused immediately, then parked in a 60s backoff sleep
        time::sleep(Duration::from_millis(200)).await;
        assert!(!adapter.is_connected());

        time::timeout(Duration::from_secs(2), adapter.disconnect())
            .await
            .expect("disconnect should cancel the pending reconnect");
        assert!(!adapter.is_connected());
    }

    #[test]
    fn test_command_while_disconnected_is_noop() {
        let adapter = adapter();
        adapter.aggregator().set_self(ParticipantId(1));
        let result = adapter.send_command(Command::HeroDeployMode { enabled: true });
        assert!(matches!(result, Err(CommandError::NotConnected)));
    }

    #[test]
    fn test_invalid_command_rejected_before_connection_check() {
        let adapter = adapter();
        adapter.aggregator().set_self(ParticipantId(3));
        let result = adapter.send_command(Command::HeroDeployMode { enabled: true });
        assert!(matches!(result, Err(CommandError::Invalid { .. })));
    }

    #[test]
    fn test_backoff_doubles_to_ceiling() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(5));
        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 5, 5]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_subscribes_to_every_status_topic() {
        let filters = status_subscriptions();
        assert_eq!(filters.len(), Topic::SUBSCRIBED.len());
        assert!(filters.iter().any(|f| f.path == "RobotDynamicStatus"));
    }
}
