//! Console logger with an optional remote mirror.
//!
//! Every record goes to stderr as one line. Once
//! [`bind_remote_mirror`] has been called, a copy of each line is also
//! queued on a static bounded channel; the classification channel drains
//! that queue and forwards the lines to the connected peer.
//!
//! ```text
//!  log::info!() ──▶ SorterLogger ──┬──▶ stderr
//!                                  └──▶ MIRROR_QUEUE ──▶ ClassificationChannel
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::io::Write;
use std::str::FromStr;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable holding the log level.
pub const LOG_LEVEL_ENV: &str = "SORTER_LOG";

/// Longest mirrored line; longer lines are truncated.
pub const MIRROR_LINE_LEN: usize = 256;

/// Lines the mirror queue holds before dropping.
const MIRROR_DEPTH: usize = 32;

/// One mirrored log line.
pub type MirrorLine = heapless::String<MIRROR_LINE_LEN>;

static MIRROR_QUEUE: Channel<CriticalSectionRawMutex, MirrorLine, MIRROR_DEPTH> = Channel::new();
static MIRROR_BOUND: AtomicBool = AtomicBool::new(false);
static MIRROR_DROPPED: AtomicU32 = AtomicU32::new(0);

static LOGGER: SorterLogger = SorterLogger;

/// The process-wide `log` sink.
pub struct SorterLogger;

impl Log for SorterLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{:<5} [{}] {}", record.level(), record.target(), record.args());

        let _ = writeln!(std::io::stderr().lock(), "{line}");

        if MIRROR_BOUND.load(Ordering::Acquire) {
            mirror(&line);
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Install the logger. Fails if another logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Flush the console.
pub fn flush() {
    log::logger().flush();
}

/// Level from [`LOG_LEVEL_ENV`], falling back to `info`.
pub fn level_from_env() -> LevelFilter {
    std::env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|v| parse_level(&v))
        .unwrap_or(LevelFilter::Info)
}

fn parse_level(text: &str) -> Option<LevelFilter> {
    LevelFilter::from_str(text.trim()).ok()
}

/// Start mirroring log lines. Only the first call has an effect; later
/// calls return `false`.
pub fn bind_remote_mirror() -> bool {
    MIRROR_BOUND
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

pub fn is_mirror_bound() -> bool {
    MIRROR_BOUND.load(Ordering::Acquire)
}

/// Next mirrored line waiting to be forwarded, if any.
pub fn take_mirrored() -> Option<MirrorLine> {
    MIRROR_QUEUE.try_receive().ok()
}

/// Mirrored lines lost to a full queue since startup.
pub fn dropped_mirror_lines() -> u32 {
    MIRROR_DROPPED.load(Ordering::Relaxed)
}

/// Queue `line` for the peer. Called by the logger itself, so it must not
/// log.
pub fn mirror(line: &str) {
    let mut owned = MirrorLine::new();
    for ch in line.chars() {
        if owned.push(ch).is_err() {
            break;
        }
    }
    if MIRROR_QUEUE.try_send(owned).is_err() {
        MIRROR_DROPPED.fetch_add(1, Ordering::Relaxed);
    }
}
