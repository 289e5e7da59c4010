use std::{
    path::PathBuf,
    sync::mpsc,
    thread,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use log::{error, warn};
use pitwall::PitwallError;
use pitwall::config::AppConfig;
use pitwall::hud::{HudEngine, HudSnapshot};
use pitwall::recorder;
use pitwall::standings::RankingMode;
use pitwall::store::StateStore;
use pitwall::transport::{
    MessageSource, MockMessageSource, SimulatedSource, TcpLineSource, pump_messages,
};

const DEFAULT_FEED_ADDR: &str = "127.0.0.1:9441";
const ENGINE_POLL_MS: u64 = 100;
const RENDER_INTERVAL_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Ingest a live telemetry feed and render the broadcast leaderboard
    Live {
        /// Address of the telemetry feed
        #[arg(short, long, default_value_t = DEFAULT_FEED_ADDR.to_string())]
        addr: String,

        /// Run against the built-in demo grid instead of a live feed
        #[arg(short, long, default_value_t = false)]
        demo: bool,

        /// Record the incoming message stream to a JSON Lines file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a recorded session through the engine
    Replay {
        #[arg(short, long)]
        input: PathBuf,
    },
}

fn render_leaderboard(snapshot: &HudSnapshot) {
    let stats = &snapshot.race_stats;
    println!(
        "\n== {} | Lap {}/{} | {} flag{} ==",
        stats.session_status,
        stats.lap,
        stats.total_laps,
        stats.flag,
        if stats.is_maintenance {
            " | MAINTENANCE"
        } else {
            ""
        }
    );
    for driver in &snapshot.drivers {
        let focused = snapshot.selected_driver_id.as_deref() == Some(driver.id.as_str());
        let speed = driver
            .telemetry
            .as_ref()
            .map(|t| format!("{:.0} mph", t.speed))
            .unwrap_or_else(|| "--".to_string());
        println!(
            "{} P{:<2} #{:<3} {:<20} {:>8} {:>9} {:?}",
            if focused { ">" } else { " " },
            driver.position,
            driver.number,
            driver.name,
            driver.gap,
            speed,
            driver.status
        );
    }
    if let Some(alert) = snapshot.alerts.first() {
        println!("  LEAD CHANGE: #{} {}", alert.car_number, alert.driver_name);
    }
    for signal in &snapshot.coaching {
        println!("  [{:?}] {}", signal.kind, signal.message);
    }
}

fn live(addr: String, demo: bool, output: Option<PathBuf>) -> Result<(), PitwallError> {
    let mut app_config = AppConfig::from_local_file().unwrap_or_default();
    if demo {
        // the demo grid runs the gated simulated lead-change mechanism
        app_config.ranking_mode = RankingMode::Simulated;
    }

    let (message_tx, message_rx) = mpsc::channel();

    // if we need to record the session we create a second channel and have
    // the pump tee every message to the recorder thread
    let recorder_tx = if let Some(output_file) = output {
        let (recorder_tx, recorder_rx) = mpsc::channel();
        thread::spawn(move || {
            if let Err(e) = recorder::record_messages(&output_file, recorder_rx) {
                error!("Session recording failed: {e}");
            }
        });
        Some(recorder_tx)
    } else {
        None
    };

    let simulator_refresh_ms = app_config.simulator_refresh_ms;
    thread::spawn(move || {
        let result = if demo {
            pump_messages(
                SimulatedSource::new(simulator_refresh_ms),
                message_tx,
                recorder_tx,
            )
        } else {
            pump_messages(TcpLineSource::new(&addr), message_tx, recorder_tx)
        };
        if let Err(e) = result {
            error!("Telemetry feed stopped: {e}");
        }
    });

    let mut engine = HudEngine::new(&app_config);
    match StateStore::new_default() {
        Ok(store) => engine = engine.with_store(store),
        Err(e) => warn!("Running without persisted state: {e}"),
    }

    let mut last_render = Instant::now();
    loop {
        match message_rx.recv_timeout(Duration::from_millis(ENGINE_POLL_MS)) {
            Ok(message) => engine.apply(message, Instant::now()),
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }

        let now = Instant::now();
        engine.tick(now);
        if now.duration_since(last_render) >= Duration::from_millis(RENDER_INTERVAL_MS) {
            render_leaderboard(&engine.snapshot());
            last_render = now;
        }
    }

    render_leaderboard(&engine.snapshot());
    Ok(())
}

fn replay(input: &PathBuf) -> Result<(), PitwallError> {
    if !input.exists() {
        return Err(PitwallError::InvalidRecording {
            path: format!("{input:?}"),
        });
    }

    let app_config = AppConfig::from_local_file().unwrap_or_default();
    let mut engine = HudEngine::new(&app_config);

    let mut source = MockMessageSource::from_file(input)?;
    source.start()?;
    loop {
        match source.next_message() {
            Ok(message) => {
                let now = Instant::now();
                engine.apply(message, now);
                engine.tick(now);
            }
            Err(PitwallError::SourceExhausted) => break,
            Err(e) => return Err(e),
        }
    }

    render_leaderboard(&engine.snapshot());
    Ok(())
}

fn main() {
    #[cfg(debug_assertions)]
    colog::init();

    let cli = Args::parse();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        std::process::exit(0);
    })
    .expect("Could not set Ctrl-C handler");
    match &cli.command {
        Commands::Live { addr, demo, output } => {
            live(addr.clone(), *demo, output.clone()).expect("Error while running live broadcast")
        }
        Commands::Replay { input } => {
            replay(input).expect("Error while replaying session recording")
        }
    };
}
