//! Sort controller: the hexagonal core.
//!
//! [`SortController`] owns the FSM and every resource a cycle touches:
//! the camera, the belt, the bucket and the classifier link. Handles are
//! created once and reused by every cycle.
//!
//! ```text
//!  CapturePort ──▶ ┌────────────────────────────┐ ──▶ EventSink
//!                  │       SortController        │
//!   OutputPin  ◀── │  FSM · belt · bucket · link │ ◀──▶ Transport
//!  SetDutyCycle ◀──└────────────────────────────┘
//! ```
//!
//! ## One cycle
//!
//! ```text
//!  Idle ─▶ Capturing ─▶ AwaitingResult ──────────────▶ Rotating ─▶ Idle
//!             │              │ request sent                │
//!             │              ├─ belt.advance() ──┐         │
//!             │              └─ link.wait() ─────┴─ join ──┘
//!             └─ no frame: abort
//! ```

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use embedded_hal::pwm::SetDutyCycle;
use log::{error, info, warn};

use crate::classes::ClassLabel;
use crate::config::SorterConfig;
use crate::drivers::servo::{BucketActuator, BucketMove};
use crate::drivers::stepper::BeltActuator;
use crate::error::{CaptureError, Error, Result};
use crate::fsm::{SortFsm, SortState};
use crate::rpc::channel::ClassificationChannel;
use crate::rpc::transport::Transport;

use super::events::SortEvent;
use super::ports::{CapturePort, EventSink};

/// Summary of one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Completed-cycle number, starting at 1.
    pub cycle: u64,
    pub reference: String,
    pub label: ClassLabel,
    pub steps: u32,
    pub bucket: BucketMove,
    /// Wall time from leaving `Idle` to returning to it.
    pub elapsed_ms: u64,
}

// ───────────────────────────────────────────────────────────────
// SortController
// ───────────────────────────────────────────────────────────────

/// Runs sort cycles until one fails.
pub struct SortController<C, P, S, T> {
    fsm: SortFsm,
    camera: C,
    belt: BeltActuator<P>,
    bucket: BucketActuator<S>,
    link: ClassificationChannel<T>,
}

impl<C, P, S, T> SortController<C, P, S, T>
where
    C: CapturePort,
    P: OutputPin,
    S: SetDutyCycle,
    T: Transport,
{
    pub fn new(
        camera: C,
        belt: BeltActuator<P>,
        bucket: BucketActuator<S>,
        link: ClassificationChannel<T>,
    ) -> Self {
        Self {
            fsm: SortFsm::new(),
            camera,
            belt,
            bucket,
            link,
        }
    }

    /// Build every actuator and the link from `config`.
    pub fn from_config(
        config: &SorterConfig,
        camera: C,
        belt_pins: [P; 4],
        servo: S,
        transport: T,
    ) -> Self {
        Self::new(
            camera,
            BeltActuator::new(belt_pins, &config.belt),
            BucketActuator::new(servo, &config.servo, config.classes.clone()),
            ClassificationChannel::new(transport, &config.classifier),
        )
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start();
        sink.emit(&SortEvent::Started(self.fsm.current_state()));
        info!(
            "SortController started: {} classes, {} steps per advance",
            self.bucket.classes().len(),
            self.belt.steps_per_advance()
        );
    }

    /// Run cycles back to back. Only returns on the first failed cycle.
    pub async fn run(&mut self, sink: &mut impl EventSink) -> Result<Infallible> {
        loop {
            self.run_cycle(sink).await?;
        }
    }

    /// Run exactly one cycle. On failure the FSM is back in `Idle` and
    /// the error has been logged and emitted.
    pub async fn run_cycle(&mut self, sink: &mut impl EventSink) -> Result<CycleReport> {
        match self.cycle(sink).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.fail(&e, sink).await;
                Err(e)
            }
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> SortState {
        self.fsm.current_state()
    }

    pub fn completed_cycles(&self) -> u64 {
        self.fsm.completed_cycles()
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn belt(&self) -> &BeltActuator<P> {
        &self.belt
    }

    pub fn bucket(&self) -> &BucketActuator<S> {
        &self.bucket
    }

    pub fn link(&self) -> &ClassificationChannel<T> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut ClassificationChannel<T> {
        &mut self.link
    }

    // ── Internal ──────────────────────────────────────────────

    async fn cycle(&mut self, sink: &mut impl EventSink) -> Result<CycleReport> {
        let started = embassy_time::Instant::now();
        self.step(sink);
        info!("Capturing image...");
        let frame = self
            .camera
            .capture()
            .await
            .ok_or(CaptureError::NoImageCaptured)?;
        info!("Image captured: {}", frame.path.display());
        sink.emit(&SortEvent::Captured {
            reference: frame.reference.clone(),
        });

        self.step(sink);
        let ticket = self.link.request(&frame.reference).await?;
        info!("Classifying {} while the belt advances", frame.reference);

        // The belt never waits on the classifier; the join only completes
        // once both are done.
        let belt = &mut self.belt;
        let advance = async {
            let steps = belt.advance().await?;
            info!("Belt advanced {} steps", steps);
            sink.emit(&SortEvent::BeltAdvanced { steps });
            Ok::<u32, Error>(steps)
        };
        let (steps, label) =
            futures_lite::future::try_zip(advance, self.link.wait(ticket)).await?;

        let name = self.bucket.classes().name_of(label).map(str::to_owned);
        match &name {
            Some(name) => info!("Classified: {}", name),
            None => warn!("Classified: label {} has no class entry", label),
        }
        sink.emit(&SortEvent::Classified { label, name });

        self.step(sink);
        let bucket = self.bucket.rotate_to(label).await?;
        info!("Bucket at {}° for label {}", bucket.angle_deg, label);
        sink.emit(&SortEvent::BucketRotated(bucket));

        self.step(sink);
        let cycle = self.fsm.completed_cycles();
        let elapsed_ms = started.elapsed().as_millis();
        info!("Cycle {} done in {} ms", cycle, elapsed_ms);
        sink.emit(&SortEvent::CycleCompleted { cycle });
        if let Err(e) = self.link.flush_logs().await {
            warn!("Log mirror flush failed: {}", e);
        }

        Ok(CycleReport {
            cycle,
            reference: frame.reference,
            label,
            steps,
            bucket,
            elapsed_ms,
        })
    }

    fn step(&mut self, sink: &mut impl EventSink) {
        let t = self.fsm.advance();
        sink.emit(&SortEvent::StateChanged {
            from: t.from,
            to: t.to,
        });
    }

    async fn fail(&mut self, e: &Error, sink: &mut impl EventSink) {
        error!("Sort cycle aborted in {}: {}", self.fsm.current_state(), e);
        self.link.abandon();
        if let Err(release) = self.belt.release() {
            warn!("Belt release after abort failed: {}", release);
        }
        if let Some(t) = self.fsm.abort() {
            sink.emit(&SortEvent::StateChanged {
                from: t.from,
                to: t.to,
            });
        }
        sink.emit(&SortEvent::CycleAborted { reason: e.clone() });
        if let Err(flush) = self.link.flush_logs().await {
            warn!("Log mirror flush failed: {}", flush);
        }
    }
}
