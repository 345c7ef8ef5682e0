use std::collections::BTreeMap;
use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, info};

use crate::error::CommandError;
use crate::models::{
    BaseStatus, BuildingState, Command, MatchStatus, ModuleFlags, OutpostStatus, ParticipantId,
    ParticipantStatus, Position, Stage, Team, TransmissionMode, BUFFER_ENERGY_CAP, FIELD_HEIGHT,
    FIELD_WIDTH,
};
use crate::protocol::{
    GameStatus, GlobalUnitStatus, RobotDynamicStatus, RobotModuleStatus, RobotPosition,
    RobotStaticStatus, TopicMessage, VideoTransmitterStatus,
};
use crate::state::reducer::roster_order;
use crate::state::{Aggregator, EntityRegistry, Outcome};

const TICKS_PER_SECOND: u32 = 10;
const PREPARATION_SECS: u32 = 180;
const SELF_CHECK_SECS: u32 = 15;
const FIGHTING_SECS: u32 = 420;

/// Chance per tick that a unit takes a health swing
const HEALTH_SWING_CHANCE: f64 = 0.02;
/// Chance per tick that a building changes lifecycle status
const BUILDING_CYCLE_CHANCE: f64 = 0.001;
/// Chance per tick that one of the observed unit's modules flickers
const MODULE_FLICKER_CHANCE: f64 = 0.01;

/// Level 1 profile: (slot, health, heat, power)
const LEVEL_ONE: [(u16, u32, u32, u32); 9] = [
    (1, 150, 100, 50),
    (2, 300, 0, 120),
    (3, 150, 170, 60),
    (4, 150, 170, 60),
    (5, 150, 170, 60),
    (6, 200, 100, 0),
    (7, 400, 260, 100),
    (10, 1500, 0, 0),
    (11, 5000, 0, 0),
];

/// Self-contained match simulation advanced one tick at a time
///
/// All randomness comes from `R`, so a seeded generator reproduces a run exactly.
pub struct Simulation<R: Rng> {
    rng: R,
    self_id: ParticipantId,
    match_status: MatchStatus,
    remaining_ticks: u32,
    participants: EntityRegistry,
    positions: BTreeMap<ParticipantId, Position>,
}

impl<R: Rng> Simulation<R> {
    /// Both teams at level 1, in preparation with 180s left
    pub fn new(self_id: ParticipantId, mut rng: R) -> Self {
        let mut participants = EntityRegistry::new();
        let mut positions = BTreeMap::new();

        for team in [Team::Red, Team::Blue] {
            for (slot, health, heat, power) in LEVEL_ONE {
                let id = ParticipantId::from_team_slot(team, slot);
                participants.insert(seed_status(id, health, heat, power));
                positions.insert(
                    id,
                    Position {
                        id,
                        x: rng.gen_range(0.0..FIELD_WIDTH),
                        y: rng.gen_range(0.0..FIELD_HEIGHT),
                        heading: rng.gen_range(0.0..360.0),
                    },
                );
            }
        }

        Self {
            rng,
            self_id,
            match_status: MatchStatus {
                stage: Stage::Preparation,
                stage_time_left: PREPARATION_SECS,
                red_score: 0,
                blue_score: 0,
            },
            remaining_ticks: PREPARATION_SECS * TICKS_PER_SECOND,
            participants,
            positions,
        }
    }

    /// Start from an arbitrary stage and countdown
    pub fn with_stage(mut self, stage: Stage, time_left_secs: u32) -> Self {
        self.match_status.stage = stage;
        self.set_time_left(time_left_secs);
        self
    }

    pub fn match_status(&self) -> &MatchStatus {
        &self.match_status
    }

    pub fn participants(&self) -> &EntityRegistry {
        &self.participants
    }

    pub fn positions(&self) -> &BTreeMap<ParticipantId, Position> {
        &self.positions
    }

    pub fn self_id(&self) -> ParticipantId {
        self.self_id
    }

    pub fn switch_self(&mut self, id: ParticipantId) {
        self.self_id = id;
    }

    /// Advance the simulation by one tick
    pub fn step(&mut self) {
        self.advance_clock();

        let self_id = self.self_id;
        let rng = &mut self.rng;
        for status in self.participants.iter_mut() {
            if let Some(pos) = self.positions.get_mut(&status.id) {
                drift_position(rng, pos);
            }
            drift_status(rng, status, status.id == self_id);
        }
    }

    fn advance_clock(&mut self) {
        if self.remaining_ticks == 0 {
            return;
        }

        self.remaining_ticks -= 1;
        if self.remaining_ticks == 0 {
            match self.match_status.stage {
                Stage::Preparation => self.enter(Stage::SelfCheck, SELF_CHECK_SECS),
                Stage::SelfCheck => self.enter(Stage::Fighting, FIGHTING_SECS),
                _ => self.match_status.stage_time_left = 0,
            }
        } else {
            self.match_status.stage_time_left = self.remaining_ticks.div_ceil(TICKS_PER_SECOND);
        }
    }

    fn enter(&mut self, stage: Stage, secs: u32) {
        debug!("Simulated stage {} -> {}", self.match_status.stage.as_str(), stage.as_str());
        self.match_status.stage = stage;
        self.set_time_left(secs);
    }

    fn set_time_left(&mut self, secs: u32) {
        self.match_status.stage_time_left = secs;
        self.remaining_ticks = secs * TICKS_PER_SECOND;
    }

    /// React to an operator command the way the referee system would
    pub fn apply_command(&mut self, command: &Command) {
        match command {
            Command::AmmoExchange { amount, .. } => {
                if let Some(me) = self.participants.get_mut(self.self_id) {
                    me.telemetry.ammo = me.telemetry.ammo.saturating_add(*amount);
                }
            }
            Command::HeroDeployMode { .. } | Command::PerformanceSelection { .. } => {}
        }
        debug!("Simulated {} command", command.as_str());
    }

    /// The topic messages a live broker would publish for the current state
    pub fn messages(&self) -> Vec<TopicMessage> {
        let mut messages = vec![TopicMessage::MatchStatus(GameStatus {
            current_stage: self.match_status.stage.to_wire(),
            stage_countdown_sec: self.match_status.stage_time_left,
            red_score: self.match_status.red_score,
            blue_score: self.match_status.blue_score,
        })];

        if let Some(team) = self.self_id.team() {
            messages.push(TopicMessage::Roster(self.roster(team)));
        }

        let Some(me) = self.participants.get(self.self_id) else {
            return messages;
        };

        messages.push(TopicMessage::Profile(RobotStaticStatus {
            max_health: me.profile.max_health,
            max_heat: me.profile.max_heat,
            max_power: me.profile.max_power,
            max_chassis_energy: me.profile.max_chassis_energy,
            level: me.profile.level,
        }));
        messages.push(TopicMessage::Dynamic(RobotDynamicStatus {
            current_health: me.health(),
            current_heat: me.telemetry.heat,
            current_chassis_energy: me.telemetry.chassis_energy,
            current_buffer_energy: me.telemetry.buffer_energy,
            remaining_ammo: me.telemetry.ammo,
            is_out_of_combat: !me.telemetry.in_combat,
            current_power: me.telemetry.power,
        }));

        let [power_manager, rfid, light_strip, small_shooter, big_shooter, uwb, armor, video_transmission, capacitor, main_controller] =
            me.modules.to_array().map(u32::from);
        messages.push(TopicMessage::Modules(RobotModuleStatus {
            power_manager,
            rfid,
            light_strip,
            small_shooter,
            big_shooter,
            uwb,
            armor,
            video_transmission,
            capacitor,
            main_controller,
        }));

        messages.push(TopicMessage::VideoLink(VideoTransmitterStatus {
            serial_status: me.video_link.serial_up,
            connection_status: me.video_link.connection_up,
            link_status: me.video_link.link_up,
            mode: me.video_link.mode.to_wire(),
            channel: me.video_link.channel,
            signal_strength: me.video_link.signal,
        }));

        if let Some(pos) = self.positions.get(&self.self_id) {
            messages.push(TopicMessage::Position(RobotPosition {
                x: pos.x,
                y: pos.y,
                yaw: pos.heading,
            }));
        }

        messages
    }

    fn roster(&self, team: Team) -> GlobalUnitStatus {
        let health = |id: ParticipantId| self.participants.get(id).map_or(0, ParticipantStatus::health);
        let building = |id: ParticipantId| {
            match self.participants.get(id).and_then(|p| p.building) {
                Some(BuildingState::Base(s)) => s.to_wire(),
                Some(BuildingState::Outpost(s)) => s.to_wire(),
                None => 0,
            }
        };

        GlobalUnitStatus {
            base_health: health(team.base()),
            base_status: building(team.base()),
            outpost_health: health(team.outpost()),
            outpost_status: building(team.outpost()),
            robot_health: roster_order(team).into_iter().map(health).collect(),
        }
    }
}

fn seed_status(id: ParticipantId, health: u32, heat: u32, power: u32) -> ParticipantStatus {
    let mut status = ParticipantStatus::new(id);
    status.profile.max_health = health;
    status.profile.max_heat = heat;
    status.profile.max_power = power;
    status.profile.max_chassis_energy = 40000;
    status.set_health(health);
    status.telemetry.ammo = 100;
    status.set_chassis_energy(20000);
    status.set_buffer_energy(BUFFER_ENERGY_CAP);
    status.modules = ModuleFlags::all_up();
    status.video_link.serial_up = true;
    status.video_link.connection_up = true;
    status.video_link.link_up = true;
    status.video_link.mode = TransmissionMode::LowLatency;
    status.video_link.channel = 1;
    status.video_link.signal = 95.0;
    status.building = match id.slot() {
        10 => Some(BuildingState::Outpost(OutpostStatus::Rotating)),
        11 => Some(BuildingState::Base(BaseStatus::Invincible)),
        _ => None,
    };
    status
}

fn drift_position<R: Rng>(rng: &mut R, pos: &mut Position) {
    pos.x = (pos.x + rng.gen_range(-0.1..0.1)).clamp(0.0, FIELD_WIDTH);
    pos.y = (pos.y + rng.gen_range(-0.1..0.1)).clamp(0.0, FIELD_HEIGHT);
    pos.heading = (pos.heading + rng.gen_range(-5.0..5.0)).rem_euclid(360.0);
    // rem_euclid can round up to the modulus for tiny negative inputs
    if pos.heading >= 360.0 {
        pos.heading = 0.0;
    }
}

fn drift_status<R: Rng>(rng: &mut R, status: &mut ParticipantStatus, observed: bool) {
    if status.profile.max_heat > 0 {
        // Biased towards cooling
        let delta: i64 = rng.gen_range(-3..=2);
        status.set_heat(offset(status.telemetry.heat, delta));
    }

    if rng.gen_bool(HEALTH_SWING_CHANCE) {
        let delta: i64 = rng.gen_range(-10..=10);
        status.set_health(offset(status.health(), delta));
    }

    let max_power = status.profile.max_power;
    if max_power > 0 {
        let target = max_power as f32 * 0.8;
        status.telemetry.power = (target + rng.gen_range(-10.0..10.0)).max(0.0);
        status.telemetry.in_combat = rng.gen_bool(0.5);

        let energy = status.telemetry.chassis_energy;
        if status.telemetry.in_combat {
            status.set_chassis_energy(energy.saturating_sub(50));
        } else {
            status.set_chassis_energy(energy.saturating_add(20));
        }

        let buffer = status.telemetry.buffer_energy;
        if status.telemetry.power > max_power as f32 {
            status.set_buffer_energy(buffer.saturating_sub(5));
        } else {
            status.set_buffer_energy(buffer.saturating_add(2));
        }
    }

    if observed {
        let link = &mut status.video_link;
        link.signal = (link.signal + rng.gen_range(-2.5..2.5)).clamp(0.0, 100.0);
    }

    if rng.gen_bool(BUILDING_CYCLE_CHANCE) {
        status.building = status.building.map(BuildingState::cycle);
    }

    if observed && rng.gen_bool(MODULE_FLICKER_CHANCE) {
        let mut flags = status.modules.to_array();
        flags[rng.gen_range(0..ModuleFlags::COUNT)] = rng.gen_bool(0.95);
        status.modules = ModuleFlags::from_array(flags);
    }
}

fn offset(value: u32, delta: i64) -> u32 {
    (value as i64 + delta).clamp(0, u32::MAX as i64) as u32
}

enum Control {
    Command(Command),
    Stop,
}

struct Running {
    control: mpsc::UnboundedSender<Control>,
    handle: JoinHandle<()>,
}

/// Source that replays a local simulation into the aggregator on a fixed tick
pub struct SyntheticAdapter {
    aggregator: Aggregator,
    tick: Duration,
    seed: Option<u64>,
    running: Option<Running>,
}

impl SyntheticAdapter {
    pub fn new(aggregator: Aggregator, tick: Duration, seed: Option<u64>) -> Self {
        Self {
            aggregator,
            tick,
            seed,
            running: None,
        }
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Start ticking, or switch the observed participant if already running.
    ///
    /// The switch is visible in the aggregator as soon as this returns; the
    /// simulation follows on its next tick.
    pub fn connect(&mut self, self_id: ParticipantId) {
        self.aggregator.set_self(self_id);

        if self.running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return;
        }

        let rng = match self.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let simulation = Simulation::new(self_id, rng);
        let (control, control_rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run_simulation(
            simulation,
            self.aggregator.clone(),
            self.tick,
            control_rx,
        ));

        info!("Synthetic source started (tick: {:?}, self: {})", self.tick, self_id);
        self.running = Some(Running { control, handle });
    }

    /// Stop the tick task and wait for it to exit
    pub async fn disconnect(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        let _ = running.control.send(Control::Stop);
        if let Err(e) = running.handle.await {
            debug!("Synthetic task ended abnormally: {}", e);
        }
        info!("Synthetic source stopped");
    }

    pub fn send_command(&self, command: Command) -> Result<(), CommandError> {
        command.validate(self.aggregator.self_id())?;

        let running = self.running.as_ref().ok_or(CommandError::NotConnected)?;
        running
            .control
            .send(Control::Command(command))
            .map_err(|_| CommandError::NotConnected)
    }
}

async fn run_simulation<R: Rng + Send + 'static>(
    mut simulation: Simulation<R>,
    aggregator: Aggregator,
    tick: Duration,
    mut control: mpsc::UnboundedReceiver<Control>,
) {
    let mut interval = time::interval_at(Instant::now() + tick, tick);

    loop {
        tokio::select! {
            biased;

            message = control.recv() => match message {
                Some(Control::Command(command)) => simulation.apply_command(&command),
                Some(Control::Stop) | None => break,
            },
            _ = interval.tick() => {
                simulation.step();
                publish_tick(&mut simulation, &aggregator);
            }
        }
    }
}

/// Feed one tick's messages, built for whoever the aggregator observes now
fn publish_tick<R: Rng>(simulation: &mut Simulation<R>, aggregator: &Aggregator) {
    if let Some(id) = aggregator.self_id() {
        if id != simulation.self_id() {
            debug!("Simulation now observing {}", id);
            simulation.switch_self(id);
        }
    }

    let observer = simulation.self_id();
    for message in simulation.messages() {
        if let Outcome::Ignored(_) = aggregator.apply_observed(observer, &message) {
            if aggregator.self_id() != Some(observer) {
                // Switched mid-tick; the next tick rebuilds for the new identity
                break;
            }
        }
    }
}
