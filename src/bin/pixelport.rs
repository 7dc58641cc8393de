use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;

#[derive(Parser, Debug)]
#[command(name = "pixelport", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a session script headlessly and render the final frame as a PNG.
    Simulate(SimulateArgs),
    /// Print the region-grid layout for a canvas config.
    Grid(GridArgs),
}

#[derive(Parser, Debug)]
struct SimulateArgs {
    /// Input session script JSON.
    #[arg(long)]
    script: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Canvas config JSON (defaults to the server's standard config).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Surface width in pixels.
    #[arg(long, default_value_t = 1024)]
    width: u32,

    /// Surface height in pixels.
    #[arg(long, default_value_t = 768)]
    height: u32,
}

#[derive(Parser, Debug)]
struct GridArgs {
    /// Canvas config JSON (defaults to the server's standard config).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// One scripted event. `now` values are session-relative seconds and must be
/// non-decreasing for throttle behavior to match a live session.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ScriptEvent {
    Tick { now: f64 },
    Pan { dx: f64, dy: f64, now: f64 },
    PanEnded { now: f64 },
    Zoom { sx: f64, sy: f64, factor: f64, now: f64 },
    ZoomSettled { now: f64 },
    Resize { width: f64, height: f64, now: f64 },
    Hover { sx: f64, sy: f64 },
    Click { sx: f64, sy: f64, color: pixelport::Color, now: f64 },
    BulkBegin,
    BulkAdd { sx: f64, sy: f64, color: pixelport::Color, now: f64 },
    BulkFlush { now: f64 },
    BulkCancel,
    /// A raw server frame, exactly as it would arrive on the channel.
    Server { message: serde_json::Value, now: f64 },
    BudgetSync { current: u32, max: u32 },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    match cli.cmd {
        Command::Simulate(args) => cmd_simulate(args),
        Command::Grid(args) => cmd_grid(args),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> anyhow::Result<T> {
    let f = File::open(path).with_context(|| format!("open {what} '{}'", path.display()))?;
    let r = BufReader::new(f);
    serde_json::from_reader(r).with_context(|| format!("parse {what} JSON"))
}

fn load_config(path: Option<&Path>) -> anyhow::Result<pixelport::CanvasConfig> {
    let config = match path {
        Some(p) => read_json(p, "config")?,
        None => pixelport::CanvasConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn cmd_simulate(args: SimulateArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let script: Vec<ScriptEvent> = read_json(&args.script, "script")?;

    let mut engine =
        pixelport::CanvasEngine::new(config, f64::from(args.width), f64::from(args.height))?;

    let mut last_now = 0.0f64;
    let mut fetches = 0usize;
    let mut sent = 0usize;
    for event in script {
        match event {
            ScriptEvent::Tick { now } => {
                last_now = now;
                engine.tick(now);
            }
            ScriptEvent::Pan { dx, dy, now } => {
                last_now = now;
                engine.pan(dx, dy, now);
            }
            ScriptEvent::PanEnded { now } => {
                last_now = now;
                engine.pan_ended(now);
            }
            ScriptEvent::Zoom { sx, sy, factor, now } => {
                last_now = now;
                engine.zoom_at(sx, sy, factor, now);
            }
            ScriptEvent::ZoomSettled { now } => {
                last_now = now;
                engine.zoom_settled(now);
            }
            ScriptEvent::Resize { width, height, now } => {
                last_now = now;
                engine.resize(width, height, now);
            }
            ScriptEvent::Hover { sx, sy } => engine.hover(sx, sy),
            ScriptEvent::Click { sx, sy, color, now } => {
                last_now = now;
                engine.click_place(sx, sy, color, now);
            }
            ScriptEvent::BulkBegin => engine.bulk_begin(),
            ScriptEvent::BulkAdd { sx, sy, color, now } => {
                last_now = now;
                engine.bulk_extend(sx, sy, color, now);
            }
            ScriptEvent::BulkFlush { now } => {
                last_now = now;
                engine.bulk_flush(now);
            }
            ScriptEvent::BulkCancel => engine.bulk_cancel(),
            ScriptEvent::Server { message, now } => {
                last_now = now;
                let raw = serde_json::to_string(&message)?;
                engine
                    .handle_frame(&raw, now)
                    .with_context(|| "decode scripted server frame")?;
            }
            ScriptEvent::BudgetSync { current, max } => {
                engine.apply_budget_sync(current, max);
            }
        }

        // There is no server behind a replay: resolve every fetch with an
        // empty region so the loaded set evolves as it would live. Scripted
        // `region_data` frames supply actual content.
        for command in engine.take_commands() {
            match command {
                pixelport::Command::FetchRegion(key) => {
                    fetches += 1;
                    let empty = pixelport::protocol::RegionPayload {
                        region_x: key.x,
                        region_y: key.y,
                        ..Default::default()
                    };
                    engine.complete_region_fetch(key, Ok(empty));
                }
                pixelport::Command::Send(_) => sent += 1,
                pixelport::Command::SyncBudget => {}
            }
        }
        for notice in engine.take_notices() {
            eprintln!("notice: {notice:?}");
        }
    }

    let mut surface = pixelport::RasterSurface::new(args.width, args.height);
    engine.render(&mut surface, last_now);

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        surface.data(),
        args.width,
        args.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} ({} pixels stored, {} regions fetched, {} messages sent)",
        args.out.display(),
        engine.store().len(),
        fetches,
        sent,
    );
    Ok(())
}

fn cmd_grid(args: GridArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let per_side = config.regions_per_side();
    println!(
        "canvas {0}x{0}, regions {1}x{1} of {2}x{2} ({3} total)",
        config.canvas_size,
        per_side,
        config.region_size,
        per_side * per_side,
    );
    println!(
        "budget: {} initial / {} max, one credit per {}s",
        config.initial_pixel_bag, config.max_pixel_bag, config.pixel_refill_rate,
    );
    Ok(())
}
