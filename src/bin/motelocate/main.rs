//! Runs the sensor loop: poll readings, update the registry, re-estimate
//! the light source, once per tick.

use clap::Parser;
use motelocate::{
    args::{CommandTask, LiveCommand, LocatorArgs, ReplayCommand},
    config::LocatorConfig,
    frame_decoder::FrameDecoder,
    gui::{device_selector, run_until_stop, GuiError},
    pacer::Pacer,
    reading_source::{LiveSource, ReadingSource, ReplayFeed, SerialSource},
    replay::ReplaySource,
    sensor_registry::{SensorRegistry, Upsert},
    tracker::SourceTracker,
};

use log::{debug, info, warn};
use serial2::SerialPort;
use std::error::Error;

// Example:
// cargo run -- --rate 30 replay light_log.csv --seed 7
// cargo run -- --config layout.ron live --port /dev/ttyUSB0

/// Everything the loop carries from one tick to the next.
struct Session {
    source: Box<dyn ReadingSource>,
    registry: SensorRegistry,
    tracker: SourceTracker,
    ticks: u64,
}

impl Session {
    /// One pass of the loop. Returns the lines for the status panel.
    fn tick(&mut self) -> Vec<String> {
        for reading in self.source.poll() {
            let id = reading.sensor_id;
            if let Upsert::Registered(i) = self.registry.upsert(reading) {
                debug!("Sensor {} placed at index {}", id, i);
            }
        }
        let estimate = self.tracker.update(&self.registry);
        self.ticks += 1;

        let mut lines = vec![
            match estimate {
                Some(p) => format!("Estimated source: {}", p),
                None => "Estimated source: waiting for two active sensors".to_string(),
            },
            format!("Model: {}    Tick: {}", self.tracker.estimator().model, self.ticks),
            String::new(),
        ];
        lines.extend(self.registry.iter().map(|node| {
            let id = node
                .id
                .map_or_else(|| "manual".to_string(), |id| format!("#{}", id));
            let intensity = node
                .intensity
                .map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
            format!(
                "{:>8}  at {}  light {:>10}  {}",
                id,
                node.position,
                intensity,
                if node.active { "active" } else { "inactive" }
            )
        }));
        lines
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = LocatorArgs::parse();

    let mut config = match &args.config {
        Some(path) => LocatorConfig::from_path(path)?,
        None => LocatorConfig::default(),
    };
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(rate) = args.tick_rate {
        config.tick_rate = rate;
    }
    config.validate()?;
    info!("Estimating with the {} model at {} Hz", config.model, config.tick_rate);

    let source: Box<dyn ReadingSource> = match &args.command {
        CommandTask::Live(cmd) => Box::new(live_source(cmd, config.decoder())?),
        CommandTask::Replay(cmd) => Box::new(replay_source(cmd, &config)?),
    };

    let session = Session {
        source,
        registry: config.registry(),
        tracker: SourceTracker::new(config.estimator()),
        ticks: 0,
    };

    let session = match args.ticks {
        Some(n) => run_headless(session, config.tick_rate, n),
        None => run_until_stop(session, config.tick_rate, Session::tick)?,
    };

    match session.tracker.last() {
        Some(p) => info!("Final estimate after {} ticks: {}", session.ticks, p),
        None => info!("No estimate after {} ticks", session.ticks),
    }
    Ok(())
}

fn run_headless(mut session: Session, tick_rate: f64, ticks: u64) -> Session {
    let mut pacer = Pacer::new(tick_rate);
    for _ in 0..ticks {
        pacer.start();
        session.tick();
        if let Some(p) = session.tracker.last() {
            info!("Tick {}: source at {}", session.ticks, p);
        }
        pacer.wait();
    }
    session
}

/// Open the sink mote's port, asking the user for it when none was given.
/// Falls back to a source that never yields anything if there is no port
/// to open, so the configured sensors can still be estimated from.
fn live_source(cmd: &LiveCommand, decoder: FrameDecoder) -> Result<SerialSource, GuiError> {
    let port = match &cmd.port {
        Some(port) => Some(port.clone()),
        None => match SerialPort::available_ports() {
            Ok(ports) => match device_selector(ports) {
                Ok(choice) => choice,
                Err(GuiError::NoPorts) => {
                    warn!("No serial devices found");
                    None
                }
                Err(e) => return Err(e),
            },
            Err(e) => {
                warn!("Failed to list serial devices: {}", e);
                None
            }
        },
    };

    let Some(port) = port else {
        info!("Running without hardware");
        return Ok(LiveSource::disconnected(decoder));
    };

    match SerialSource::open_serial(&port, cmd.baud_rate, decoder.clone()) {
        Ok(source) => Ok(source),
        Err(e) => {
            warn!("Failed to open {}: {}, running without hardware", port.display(), e);
            Ok(LiveSource::disconnected(decoder))
        }
    }
}

fn replay_source(
    cmd: &ReplayCommand,
    config: &LocatorConfig,
) -> Result<ReplayFeed, Box<dyn Error>> {
    let mut source = ReplaySource::from_csv(&cmd.dataset)?.with_offset(config.replay_offset);
    if let Some(seed) = cmd.seed {
        source = source.with_seed(seed);
    }
    info!(
        "Replaying sensors {:?} from {}",
        source.sensor_ids(),
        cmd.dataset.display()
    );
    Ok(ReplayFeed::new(source))
}
