use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use robomaster_hud::config::Config;
use robomaster_hud::console::ConsoleCommand;
use robomaster_hud::models::{Snapshot, Stage};
use robomaster_hud::sources::{SourceController, SourceKind};
use robomaster_hud::state::Aggregator;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "robomaster_hud=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting robomaster-hud");

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded");

    let aggregator = Aggregator::new();

    // Stand-in for the presentation layer
    let mut last_stage = None;
    let _hud = aggregator.subscribe(move |snapshot: &Snapshot| {
        let stage = snapshot.match_status.stage;
        if last_stage != Some(stage) {
            info!(
                "Stage {} | {}s left | red {} - blue {}",
                stage.as_str(),
                snapshot.match_status.stage_time_left,
                snapshot.match_status.red_score,
                snapshot.match_status.blue_score
            );
            last_stage = Some(stage);
        }
        if let Some(me) = snapshot.self_status() {
            if !me.is_alive() {
                debug!("{} is down", me.id);
                return;
            }
            debug!(
                "{} | HP {}/{} ({:.0}%) | heat {}/{} | ammo {} | buffer {}",
                me.id,
                me.health(),
                me.profile.max_health,
                me.health_ratio() * 100.0,
                me.telemetry.heat,
                me.profile.max_heat,
                me.telemetry.ammo,
                me.telemetry.buffer_energy
            );
        }
    });

    let mut controller = SourceController::new(aggregator.clone(), config.clone());
    controller
        .activate(SourceKind::from_simulate_flag(config.simulate_data), config.self_id)
        .await;

    info!("Source started, reading operator commands from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut self_id = config.self_id;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        // Keep running headless once stdin closes
                        let _ = tokio::signal::ctrl_c().await;
                        info!("Shutdown signal received");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read stdin: {}", e);
                        break;
                    }
                };

                match ConsoleCommand::parse(&line) {
                    Ok(ConsoleCommand::Source(kind)) => controller.activate(kind, self_id).await,
                    Ok(ConsoleCommand::SelfId(id)) => {
                        self_id = id;
                        controller.set_self(id);
                    }
                    Ok(ConsoleCommand::Send(command)) => {
                        if let Err(e) = controller.send_command(command) {
                            warn!("Command not sent: {}", e);
                        }
                    }
                    Ok(ConsoleCommand::Status) => print_status(&aggregator.snapshot()),
                    Ok(ConsoleCommand::Quit) => break,
                    Err(e) => warn!("{:#}", e),
                }
            }
        }
    }

    controller.shutdown().await;
    info!("Shutting down robomaster-hud");
    Ok(())
}

fn print_status(snapshot: &Snapshot) {
    match serde_json::to_string_pretty(snapshot) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to serialize snapshot: {}", e),
    }

    if snapshot.match_status.stage == Stage::NotStarted && snapshot.participants.is_empty() {
        info!("No telemetry received yet");
    }
}
