//! Print a few live channels and session changes while the simulator runs.
//!
//! ```text
//! cargo run --example live_dump [config.toml]
//! RUST_LOG=irsdk_poll=debug cargo run --example live_dump
//! ```
//!
//! Waits for the simulator to start, survives restarts, and reprints the
//! track and player name whenever the session document changes.

use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use irsdk_poll::types::irsdk_flags::session_flags;
use irsdk_poll::{
    BitField, LiveSource, ReaderConfig, SessionPath, TelemetryClient, TelemetryError,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const RETRY_DELAY: Duration = Duration::from_secs(2);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => ReaderConfig::load(Path::new(&path))
            .with_context(|| format!("loading reader config from {path}"))?,
        None => ReaderConfig::default(),
    };
    let timeout = config.wait_timeout();
    let mut client = TelemetryClient::new(LiveSource::default(), config);
    let mut session_update = None;
    let mut frames = 0u64;

    loop {
        let snapshot = match client.read_snapshot(timeout) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => continue,
            Err(error @ TelemetryError::UnsupportedPlatform { .. }) => return Err(error.into()),
            Err(error) if error.is_retryable() => {
                warn!(%error, "Simulator not available, retrying");
                thread::sleep(RETRY_DELAY);
                continue;
            }
            Err(error) => return Err(error).context("reading telemetry"),
        };

        if session_update != Some(snapshot.session_update) {
            session_update = Some(snapshot.session_update);
            print_session(&mut client)?;
        }

        frames += 1;
        if frames % 60 != 0 {
            continue;
        }

        let Some(connection) = client.connection() else { continue };
        let speed = connection.variable_by_name("Speed")?;
        let rpm = connection.variable_by_name("RPM")?;
        let gear = connection.variable_by_name("Gear")?;
        let flags = connection.variable_by_name("SessionFlags")?;

        let speed = speed.map(|v| snapshot.get::<f32>(&v)).transpose()?.unwrap_or_default();
        let rpm = rpm.map(|v| snapshot.get::<f32>(&v)).transpose()?.unwrap_or_default();
        let gear = gear.map(|v| snapshot.get::<i32>(&v)).transpose()?.unwrap_or_default();
        let green = flags
            .map(|v| snapshot.get::<BitField>(&v))
            .transpose()?
            .is_some_and(|f| f.has_flag(session_flags::GREEN));

        println!(
            "tick {:>8}  speed {:>6.1} km/h  rpm {:>6.0}  gear {:>2}  green {}",
            snapshot.tick,
            speed * 3.6,
            rpm,
            gear,
            green
        );
    }
}

fn print_session(client: &mut TelemetryClient<LiveSource>) -> Result<()> {
    let Some(session) = client.session_info()? else { return Ok(()) };

    let track = session.text("WeekendInfo:TrackDisplayName:").unwrap_or("unknown track");
    let player = session
        .int("DriverInfo:DriverCarIdx:")
        .and_then(|car| {
            let path = SessionPath::new().key("DriverInfo").key("Drivers").key_eq("CarIdx", car);
            session.string(path.key("UserName"))
        })
        .unwrap_or_else(|| "unknown driver".to_string());

    info!(update = session.update(), "Session changed");
    println!("{track}: {player}");
    Ok(())
}
