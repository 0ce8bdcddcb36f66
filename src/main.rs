//! Item sorter: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  CaptureDevice   LogEventSink   SorterLogger   TcpTransport    │
//! │  (CapturePort)   (EventSink)    (log::Log)     (Transport)     │
//! │  BeltPin × 4     ServoPwm                                      │
//! │  (OutputPin)     (SetDutyCycle)                                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              SortController (cycle logic)              │    │
//! │  │  FSM · belt · bucket · classification channel          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{error, info, warn};

use sorter::adapters::log_sink::LogEventSink;
use sorter::adapters::logger;
use sorter::app::service::SortController;
use sorter::capture::CaptureDevice;
use sorter::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH, SorterConfig};
use sorter::drivers::hw_init;
use sorter::error::Error;
use sorter::rpc::transport::TcpTransport;

/// Conveyor item sorter
#[derive(Parser, Debug)]
#[command(name = "sorter", version)]
#[command(about = "Captures, classifies and sorts items off the belt. Needs a classifier peer.")]
struct Args {
    /// JSON config file (missing file means built-in defaults)
    #[arg(long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the classifier listen address from the config
    #[arg(long, value_name = "ADDR")]
    listen: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // ── 1. Logging ────────────────────────────────────────────
    logger::init(logger::level_from_env()).map_err(|e| anyhow!("logger init failed: {e}"))?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Item sorter v{}                  ║", sorter::VERSION);
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config ─────────────────────────────────────────────
    let mut config = SorterConfig::load(&args.config)
        .map_err(Error::from)
        .with_context(|| format!("loading {}", args.config.display()))?;
    if let Some(listen) = args.listen {
        config.classifier.listen_addr = listen;
    }
    for entry in config.classes.iter() {
        info!(
            "Class {} -> {} at {}°",
            entry.label, entry.name, entry.angle_deg
        );
    }

    // ── 3. Hardware ───────────────────────────────────────────
    let belt_pins = hw_init::init_belt_pins(&config.belt).context("claiming belt pins")?;
    let servo = hw_init::init_servo(&config.servo).context("claiming servo pin")?;
    let camera = CaptureDevice::new(config.capture.clone());

    // ── 4. Classifier link ────────────────────────────────────
    let transport = TcpTransport::accept(config.classifier.listen_addr.as_str())
        .with_context(|| format!("accepting classifier on {}", config.classifier.listen_addr))?;
    if config.classifier.mirror_logs {
        if logger::bind_remote_mirror() {
            info!("Log mirror bound to classifier peer {}", transport.peer_addr());
        } else {
            warn!("Log mirror already bound");
        }
    }

    // ── 5. Sort loop ──────────────────────────────────────────
    let mut controller = SortController::from_config(&config, camera, belt_pins, servo, transport);
    let mut sink = LogEventSink::new();
    controller.start(&mut sink);
    info!("System ready. Entering sort loop.");

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    let outcome = futures_lite::future::block_on(executor.run(controller.run(&mut sink)));

    match outcome {
        Ok(never) => match never {},
        Err(e) => {
            error!(
                "Sort loop stopped after {} cycles: {}",
                controller.completed_cycles(),
                e
            );
            logger::flush();
            Err(anyhow::Error::new(e).context("sort loop stopped"))
        }
    }
}
