use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::DecodeError;
use crate::models::{ParticipantId, Snapshot};
use crate::protocol::{self, TopicMessage};
use crate::state::reducer::{self, Outcome};
use crate::state::{Subscription, SubscriptionHub};

/// Single source of truth for the match snapshot
///
/// Cloning yields another handle to the same state. Every mutation is applied
/// and published to subscribers before the next one starts, so observers see
/// changes in exactly the order they were made.
#[derive(Clone, Default)]
pub struct Aggregator {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    snapshot: Mutex<Snapshot>,
    hub: SubscriptionHub,
    /// Held across apply + notify to serialize writers
    dispatch: Mutex<()>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot {
        lock(&self.inner.snapshot).clone()
    }

    pub fn self_id(&self) -> Option<ParticipantId> {
        lock(&self.inner.snapshot).self_id
    }

    /// Register a snapshot observer.
    ///
    /// Callbacks must not mutate the aggregator; they may read it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(&Snapshot) + Send + 'static,
    {
        self.inner.hub.subscribe(callback)
    }

    /// Merge one decoded message and notify observers
    pub fn apply_message(&self, message: &TopicMessage) -> Outcome {
        self.mutate(|snapshot| apply(snapshot, message))
    }

    /// Apply `message` only while `observer` is still the observed participant.
    ///
    /// Sources that build own-identity messages ahead of time use this so a
    /// concurrent [`Aggregator::set_self`] cannot file them under the new id.
    /// A mismatch is dropped without notifying.
    pub fn apply_observed(&self, observer: ParticipantId, message: &TopicMessage) -> Outcome {
        self.dispatch(|snapshot| {
            if snapshot.self_id != Some(observer) {
                return (Outcome::Ignored("observed participant changed"), false);
            }
            (apply(snapshot, message), true)
        })
    }

    /// Decode a raw payload for `topic` and apply it.
    ///
    /// Unknown topics and malformed payloads are logged and dropped.
    pub fn apply_raw(&self, topic: &str, payload: &[u8]) -> Option<Outcome> {
        match protocol::decode(topic, payload) {
            Ok(Some(message)) => Some(self.apply_message(&message)),
            Ok(None) => {
                debug!("No state tracked for topic {}", topic);
                None
            }
            Err(DecodeError::UnknownTopic(name)) => {
                debug!("Ignoring message on unknown topic {}", name);
                None
            }
            Err(e) => {
                warn!("Dropping message: {}", e);
                None
            }
        }
    }

    /// Switch the observed participant.
    ///
    /// A different id drops all participant and position detail, since that
    /// detail was gathered from the previous identity's point of view.
    pub fn set_self(&self, id: ParticipantId) {
        self.dispatch(|snapshot| {
            if snapshot.self_id == Some(id) {
                return ((), false);
            }

            info!(
                "Observed participant {} -> {}",
                snapshot.self_id.map_or_else(|| "none".to_string(), |p| p.to_string()),
                id
            );
            snapshot.participants.clear();
            snapshot.positions.clear();
            snapshot.self_id = Some(id);
            ((), true)
        });
    }

    /// Replace the snapshot wholesale with a default one
    pub fn reset(&self) {
        self.mutate(|snapshot| *snapshot = Snapshot::new(snapshot.self_id));
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Snapshot) -> T) -> T {
        self.dispatch(|snapshot| (f(snapshot), true))
    }

    /// Run `f` under the writer lock; notify when it reports a change worth publishing
    fn dispatch<T>(&self, f: impl FnOnce(&mut Snapshot) -> (T, bool)) -> T {
        let _dispatch = lock(&self.inner.dispatch);

        let (result, published) = {
            let mut snapshot = lock(&self.inner.snapshot);
            let (result, publish) = f(&mut snapshot);
            (result, publish.then(|| snapshot.clone()))
        };

        if let Some(published) = published {
            self.inner.hub.notify(&published);
        }
        result
    }
}

fn apply(snapshot: &mut Snapshot, message: &TopicMessage) -> Outcome {
    let outcome = reducer::reduce(snapshot, message);
    match outcome {
        Outcome::Applied => snapshot.updated_at = Some(Utc::now()),
        Outcome::Ignored(reason) => {
            debug!("Ignored {} message: {}", message.topic().as_str(), reason)
        }
    }
    outcome
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    use proptest::prelude::*;
    use prost::Message;

    use crate::models::Stage;
    use crate::protocol::{
        GameStatus, GlobalUnitStatus, RobotDynamicStatus, RobotModuleStatus, RobotPosition,
        RobotStaticStatus,
    };

    fn roster(health: Vec<u32>) -> TopicMessage {
        TopicMessage::Roster(GlobalUnitStatus {
            robot_health: health,
            ..Default::default()
        })
    }

    #[test]
    fn test_roster_scenario_through_raw_payload() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));

        let payload = GlobalUnitStatus {
            robot_health: vec![150, 300, 150, 150, 150, 200, 400],
            ..Default::default()
        }
        .encode_to_vec();
        assert_eq!(aggregator.apply_raw("GlobalUnitStatus", &payload), Some(Outcome::Applied));

        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.participant(ParticipantId(1)).unwrap().health(), 150);
        assert_eq!(snapshot.participant(ParticipantId(2)).unwrap().health(), 300);
        assert!(snapshot.participant(ParticipantId(101)).is_none());
        assert!(snapshot.updated_at.is_some());
    }

    #[test]
    fn test_unknown_topic_and_garbage_are_not_fatal() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));

        assert_eq!(aggregator.apply_raw("FutureTopic", &[1, 2, 3]), None);
        assert_eq!(aggregator.apply_raw("RobotDynamicStatus", &[0x08, 0xff]), None);

        let payload = TopicMessage::Dynamic(RobotDynamicStatus {
            current_health: 90,
            ..Default::default()
        })
        .encode_to_vec();
        assert_eq!(aggregator.apply_raw("RobotDynamicStatus", &payload), Some(Outcome::Applied));
        assert_eq!(aggregator.snapshot().self_status().unwrap().health(), 90);
    }

    #[test]
    fn test_set_self_clears_detail() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));
        aggregator.apply_message(&roster(vec![150; 14]));
        aggregator.apply_message(&TopicMessage::Position(RobotPosition {
            x: 1.0,
            y: 2.0,
            yaw: 3.0,
        }));
        assert!(!aggregator.snapshot().participants.is_empty());

        // Same id is a no-op
        aggregator.set_self(ParticipantId(3));
        assert!(!aggregator.snapshot().participants.is_empty());

        aggregator.set_self(ParticipantId(103));
        let snapshot = aggregator.snapshot();
        assert!(snapshot.participants.is_empty());
        assert!(snapshot.positions.is_empty());
        assert_eq!(snapshot.self_id, Some(ParticipantId(103)));

        // Only the topic that fired repopulates
        aggregator.apply_message(&TopicMessage::Dynamic(RobotDynamicStatus {
            current_health: 50,
            ..Default::default()
        }));
        let snapshot = aggregator.snapshot();
        assert_eq!(snapshot.participants.ids().collect::<Vec<_>>(), vec![ParticipantId(103)]);
        assert!(snapshot.positions.is_empty());
    }

    #[test]
    fn test_every_message_notifies() {
        let aggregator = Aggregator::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            aggregator.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        aggregator.set_self(ParticipantId(1));
        for _ in 0..3 {
            aggregator.apply_message(&roster(vec![100]));
        }
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_self_unsubscribe_during_apply() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));

        let first_calls = Arc::new(AtomicUsize::new(0));
        let second_seen = Arc::new(Mutex::new(Vec::new()));
        let handle: Arc<OnceLock<Subscription>> = Arc::new(OnceLock::new());

        let first = {
            let calls = Arc::clone(&first_calls);
            let handle = Arc::clone(&handle);
            aggregator.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                if let Some(me) = handle.get() {
                    me.unsubscribe();
                }
            })
        };
        let _ = handle.set(first);

        {
            let seen = Arc::clone(&second_seen);
            aggregator.subscribe(move |snapshot| {
                let health = snapshot.participant(ParticipantId(1)).map(|p| p.health());
                seen.lock().unwrap().push(health);
            });
        }

        aggregator.apply_message(&roster(vec![120]));
        aggregator.apply_message(&roster(vec![110]));

        assert_eq!(first_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*second_seen.lock().unwrap(), vec![Some(120), Some(110)]);
    }

    #[test]
    fn test_set_self_same_id_is_silent() {
        let aggregator = Aggregator::new();
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            aggregator.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let aggregator = aggregator.clone();
                std::thread::spawn(move || aggregator.set_self(ParticipantId(5)))
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(aggregator.self_id(), Some(ParticipantId(5)));
    }

    #[test]
    fn test_apply_observed_drops_messages_for_previous_self() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));
        let dynamic = TopicMessage::Dynamic(RobotDynamicStatus {
            current_health: 80,
            ..Default::default()
        });

        assert_eq!(aggregator.apply_observed(ParticipantId(3), &dynamic), Outcome::Applied);

        aggregator.set_self(ParticipantId(1));
        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            aggregator.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        let outcome = aggregator.apply_observed(ParticipantId(3), &dynamic);
        assert!(matches!(outcome, Outcome::Ignored(_)));
        assert!(aggregator.snapshot().participants.is_empty());
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_read_aggregator() {
        let aggregator = Aggregator::new();
        let observed = Arc::new(Mutex::new(None));
        {
            let reader = aggregator.clone();
            let observed = Arc::clone(&observed);
            aggregator.subscribe(move |_| {
                *observed.lock().unwrap() = reader.self_id();
            });
        }

        aggregator.set_self(ParticipantId(7));
        assert_eq!(*observed.lock().unwrap(), Some(ParticipantId(7)));
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let aggregator = Aggregator::new();
        aggregator.set_self(ParticipantId(3));
        let mut copy = aggregator.snapshot();
        copy.participants.get_or_create(ParticipantId(1)).set_health(1);
        assert!(aggregator.snapshot().participants.is_empty());
    }

    fn match_status(stage: Stage, time_left: u32) -> TopicMessage {
        TopicMessage::MatchStatus(GameStatus {
            current_stage: stage.to_wire(),
            stage_countdown_sec: time_left,
            red_score: 0,
            blue_score: 0,
        })
    }

    fn own_messages(
        health: u32,
        max_health: u32,
        heat: u32,
        ammo: u32,
        flags: [u32; 10],
        roster_health: Vec<u32>,
        x: f32,
    ) -> Vec<TopicMessage> {
        vec![
            TopicMessage::Profile(RobotStaticStatus {
                max_health,
                max_heat: 200,
                max_power: 60,
                max_chassis_energy: 40000,
                level: 1,
            }),
            TopicMessage::Modules(RobotModuleStatus {
                power_manager: flags[0],
                rfid: flags[1],
                light_strip: flags[2],
                small_shooter: flags[3],
                big_shooter: flags[4],
                uwb: flags[5],
                armor: flags[6],
                video_transmission: flags[7],
                capacitor: flags[8],
                main_controller: flags[9],
            }),
            TopicMessage::Dynamic(RobotDynamicStatus {
                current_health: health,
                current_heat: heat,
                remaining_ammo: ammo,
                ..Default::default()
            }),
            roster(roster_health),
            TopicMessage::Position(RobotPosition { x, y: 1.0, yaw: 0.0 }),
            match_status(Stage::Fighting, 100),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Topics own disjoint fields, so their arrival order does not matter
        #[test]
        fn prop_distinct_topics_commute(
            health in 0u32..500,
            max_health in 1u32..500,
            heat in 0u32..400,
            ammo in 0u32..1000,
            flags in prop::array::uniform10(0u32..2),
            roster_health in prop::collection::vec(0u32..600, 0..16),
            x in 0f32..28.0,
            order in Just((0..6usize).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            // Roster health of the observer itself (slot 3) is shared with the
            // dynamic topic, so keep that index out of the comparison
            let messages = own_messages(health, max_health, heat, ammo, flags, roster_health, x);

            let forward = Aggregator::new();
            forward.set_self(ParticipantId(3));
            for message in &messages {
                forward.apply_message(message);
            }

            let shuffled = Aggregator::new();
            shuffled.set_self(ParticipantId(3));
            for i in &order {
                shuffled.apply_message(&messages[*i]);
            }

            let a = forward.snapshot();
            let b = shuffled.snapshot();
            prop_assert_eq!(&a.match_status, &b.match_status);
            prop_assert_eq!(&a.positions, &b.positions);
            for id in a.participants.ids().filter(|id| *id != ParticipantId(3)) {
                prop_assert_eq!(a.participant(id), b.participant(id));
            }
            let (me_a, me_b) = (a.self_status().unwrap(), b.self_status().unwrap());
            prop_assert_eq!(&me_a.profile, &me_b.profile);
            prop_assert_eq!(me_a.modules, me_b.modules);
            prop_assert_eq!(me_a.telemetry.ammo, me_b.telemetry.ammo);
            prop_assert_eq!(a.participants.len(), b.participants.len());
        }

        /// Monotonically reported stages, delivered in any order, never move backwards
        #[test]
        fn prop_stage_never_regresses(
            order in Just((0..Stage::ALL.len()).collect::<Vec<_>>()).prop_shuffle(),
        ) {
            let aggregator = Aggregator::new();
            let observed = Arc::new(Mutex::new(Vec::new()));
            {
                let observed = Arc::clone(&observed);
                aggregator.subscribe(move |snapshot| {
                    observed.lock().unwrap().push(snapshot.match_status.stage);
                });
            }

            // Skip NotStarted, which is the explicit reset
            for i in order.into_iter().filter(|i| *i != 0) {
                aggregator.apply_message(&match_status(Stage::ALL[i], 60));
            }

            let observed = observed.lock().unwrap();
            prop_assert!(observed.windows(2).all(|w| w[0] <= w[1]));
            prop_assert_eq!(aggregator.snapshot().match_status.stage, Stage::Result);
        }
    }
}
