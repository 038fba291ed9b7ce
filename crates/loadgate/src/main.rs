//! loadgate CLI: thin wrapper over loadgate-core.
//!
//! Two ways to watch the gate work: `demo` drives a jittered real-time burst
//! through a controller on the tokio frame scheduler; `trace` replays a
//! fully deterministic burst on the virtual-time scheduler and prints the
//! timeline.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;
use tracing::info;

use loadgate_core::manual::ManualScheduler;
use loadgate_core::tokio_frame::TokioFrameScheduler;
use loadgate_core::{LoadControlConfig, Scheduler, create_load_control};

#[derive(Debug, Parser)]
#[command(name = "loadgate", version, about = "Frame-aligned throttle/debounce load control")]
struct Cli {
    /// TOML config file with `throttle_delay_ms` / `debounce_delay_ms`.
    /// The delay flags below override whatever the file (or default) set.
    #[arg(long, global = true)]
    config: Option<String>,

    /// Throttle delay override in milliseconds.
    #[arg(long, global = true)]
    throttle_ms: Option<u64>,

    /// Debounce delay override in milliseconds.
    #[arg(long, global = true)]
    debounce_ms: Option<u64>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Drive a jittered real-time burst through the controller.
    Demo {
        /// Number of invoke calls to issue.
        #[arg(long, default_value_t = 40)]
        events: u32,
        /// Base spacing between invokes, in milliseconds.
        #[arg(long, default_value_t = 4)]
        spacing_ms: u64,
        /// Extra random spacing added per invoke, in milliseconds.
        #[arg(long, default_value_t = 3)]
        jitter_ms: u64,
        /// Frame cadence of the simulated presentation loop.
        #[arg(long, default_value_t = 16)]
        frame_ms: u64,
    },
    /// Replay a deterministic virtual-time burst and print the timeline.
    Trace {
        /// Number of invoke calls to issue.
        #[arg(long, default_value_t = 8)]
        events: u32,
        /// Virtual milliseconds between invokes (one frame per step).
        #[arg(long, default_value_t = 5)]
        spacing_ms: u64,
    },
}

fn load_config(cli: &Cli) -> Result<LoadControlConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("read config {path}"))?;
            LoadControlConfig::from_toml_str(&raw).context("parse config toml")?
        }
        None => LoadControlConfig::default(),
    };
    if let Some(throttle_ms) = cli.throttle_ms {
        config.throttle_delay_ms = throttle_ms;
    }
    if let Some(debounce_ms) = cli.debounce_ms {
        config.debounce_delay_ms = debounce_ms;
    }
    Ok(config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.cmd {
        Command::Demo {
            events,
            spacing_ms,
            jitter_ms,
            frame_ms,
        } => demo(config, events, spacing_ms, jitter_ms, frame_ms).await,
        Command::Trace { events, spacing_ms } => trace(config, events, spacing_ms),
    }
}

async fn demo(
    config: LoadControlConfig,
    events: u32,
    spacing_ms: u64,
    jitter_ms: u64,
    frame_ms: u64,
) -> Result<()> {
    info!(?config, events, spacing_ms, jitter_ms, frame_ms, "demo: starting");

    let local = tokio::task::LocalSet::new();
    local
        .run_until(async move {
            let scheduler =
                TokioFrameScheduler::with_frame_interval(Duration::from_millis(frame_ms));
            let clock = scheduler.clone();

            let (starter, mut disposer) = create_load_control(
                move |value: u32| println!("{:>6}ms  deliver {value}", clock.now_ms()),
                config,
                scheduler.clone(),
            );
            let controller = starter.start()?;

            let mut rng = rand::rng();
            for value in 1..=events {
                println!("{:>6}ms  invoke  {value}", scheduler.now_ms());
                controller.invoke(value);
                let jitter = if jitter_ms == 0 {
                    0
                } else {
                    rng.random_range(0..=jitter_ms)
                };
                tokio::time::sleep(Duration::from_millis(spacing_ms + jitter)).await;
            }

            // Let the last window and any pending deferral settle.
            tokio::time::sleep(Duration::from_millis(
                config.deferral_delay_ms() + frame_ms + 5,
            ))
            .await;

            let metrics = controller.metrics();
            disposer.dispose();
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        })
        .await
}

fn trace(config: LoadControlConfig, events: u32, spacing_ms: u64) -> Result<()> {
    let scheduler = ManualScheduler::new();
    let clock = scheduler.clone();

    let (starter, mut disposer) = create_load_control(
        move |value: u32| println!("{:>6}ms  deliver {value}", clock.now_ms()),
        config,
        scheduler.clone(),
    );
    let controller = starter.start()?;

    for value in 1..=events {
        println!(
            "{:>6}ms  invoke  {value} (gate {:?})",
            scheduler.now_ms(),
            controller.gate()
        );
        controller.invoke(value);
        // One frame presentation per step, then let the clock move on.
        scheduler.fire_frame();
        scheduler.advance_ms(spacing_ms);
    }

    // Settle: present one more frame and run out the deferral delay.
    scheduler.fire_frame();
    scheduler.advance_ms(config.deferral_delay_ms() + 1);

    let snapshot = controller.snapshot();
    disposer.dispose();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
