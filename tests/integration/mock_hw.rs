//! Mock hardware for integration tests.
//!
//! Every pin write, servo command, capture and classifier exchange is
//! recorded on one shared [`Timeline`] with the time it happened, so tests
//! can assert on both the order and the timing of the whole cycle.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

use sorter::app::events::SortEvent;
use sorter::app::ports::{CapturePort, EventSink};
use sorter::capture::CapturedFrame;
use sorter::classes::ClassTable;
use sorter::config::SorterConfig;
use sorter::rpc::codec::{FrameDecoder, HEADER_SIZE, MAX_FRAME_SIZE, encode_frame};
use sorter::rpc::transport::Transport;
use sorter::rpc::wire::WireEvent;

// ── Timeline ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HwCall {
    PinHigh(usize),
    PinLow(usize),
    Servo { duty: u16 },
    Capture { ok: bool },
    ClassifySent { id: u32, reference: String },
    ResultDelivered,
}

#[derive(Clone)]
pub struct Timeline {
    start: Instant,
    calls: Rc<RefCell<Vec<(Duration, HwCall)>>>,
}

#[allow(dead_code)]
impl Timeline {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            calls: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn record(&self, call: HwCall) {
        self.calls.borrow_mut().push((self.start.elapsed(), call));
    }

    pub fn now(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn calls(&self) -> Vec<(Duration, HwCall)> {
        self.calls.borrow().clone()
    }

    pub fn count(&self, pred: impl Fn(&HwCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|(_, c)| pred(c)).count()
    }

    pub fn first(&self, pred: impl Fn(&HwCall) -> bool) -> Option<Duration> {
        self.calls.borrow().iter().find(|(_, c)| pred(c)).map(|(t, _)| *t)
    }

    pub fn last(&self, pred: impl Fn(&HwCall) -> bool) -> Option<Duration> {
        self.calls.borrow().iter().rev().find(|(_, c)| pred(c)).map(|(t, _)| *t)
    }

    pub fn servo_duties(&self) -> Vec<u16> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|(_, c)| match c {
                HwCall::Servo { duty } => Some(*duty),
                _ => None,
            })
            .collect()
    }

    /// Level of every belt pin after the last recorded write.
    pub fn pin_levels(&self) -> [bool; 4] {
        let mut levels = [false; 4];
        for (_, c) in self.calls.borrow().iter() {
            match c {
                HwCall::PinHigh(i) => levels[*i] = true,
                HwCall::PinLow(i) => levels[*i] = false,
                _ => {}
            }
        }
        levels
    }
}

pub fn is_pin_high(c: &HwCall) -> bool {
    matches!(c, HwCall::PinHigh(_))
}

pub fn is_pin_write(c: &HwCall) -> bool {
    matches!(c, HwCall::PinHigh(_) | HwCall::PinLow(_))
}

pub fn is_servo(c: &HwCall) -> bool {
    matches!(c, HwCall::Servo { .. })
}

pub fn is_classify(c: &HwCall) -> bool {
    matches!(c, HwCall::ClassifySent { .. })
}

// ── Belt pins ─────────────────────────────────────────────────

pub struct RecordingPin {
    index: usize,
    timeline: Timeline,
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.timeline.record(HwCall::PinLow(self.index));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.timeline.record(HwCall::PinHigh(self.index));
        Ok(())
    }
}

pub fn belt_pins(timeline: &Timeline) -> [RecordingPin; 4] {
    core::array::from_fn(|index| RecordingPin {
        index,
        timeline: timeline.clone(),
    })
}

// ── Servo ─────────────────────────────────────────────────────

pub struct RecordingServo {
    timeline: Timeline,
}

impl RecordingServo {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
        }
    }
}

impl embedded_hal::pwm::ErrorType for RecordingServo {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for RecordingServo {
    fn max_duty_cycle(&self) -> u16 {
        20_000
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Infallible> {
        self.timeline.record(HwCall::Servo { duty });
        Ok(())
    }
}

// ── Camera ────────────────────────────────────────────────────

/// Returns a frame per call until the script says otherwise.
pub struct ScriptedCamera {
    timeline: Timeline,
    script: VecDeque<bool>,
}

impl ScriptedCamera {
    pub fn always(timeline: &Timeline) -> Self {
        Self::scripted(timeline, &[])
    }

    /// `results[i]` decides capture `i`; captures past the end succeed.
    pub fn scripted(timeline: &Timeline, results: &[bool]) -> Self {
        Self {
            timeline: timeline.clone(),
            script: results.iter().copied().collect(),
        }
    }
}

impl CapturePort for ScriptedCamera {
    async fn capture(&mut self) -> Option<CapturedFrame> {
        let ok = self.script.pop_front().unwrap_or(true);
        self.timeline.record(HwCall::Capture { ok });
        ok.then(|| CapturedFrame {
            path: PathBuf::from("public/currentBlock.jpg"),
            reference: "/currentBlock.jpg".into(),
        })
    }
}

// ── Classifier peer ───────────────────────────────────────────

/// How a scripted answer identifies its request.
#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
pub enum IdEcho {
    Matching,
    Omitted,
    Wrong(u32),
}

#[derive(Debug, Clone)]
pub struct Response {
    pub data: serde_json::Value,
    pub latency: Duration,
    pub id: IdEcho,
}

/// What the peer does with one `classify` request.
#[derive(Debug, Clone)]
#[allow(dead_code)]
pub enum Reply {
    /// Send these events, each after its own latency. Empty means the
    /// peer stays silent.
    Answer(Vec<Response>),
    /// Drop the connection.
    Disconnect,
}

#[allow(dead_code)]
impl Reply {
    pub fn label(n: u8) -> Self {
        Self::label_after(n, Duration::ZERO)
    }

    pub fn label_after(n: u8, latency: Duration) -> Self {
        Self::Answer(vec![Response {
            data: serde_json::json!(n),
            latency,
            id: IdEcho::Matching,
        }])
    }

    pub fn silent() -> Self {
        Self::Answer(Vec::new())
    }
}

/// Classifier peer answering from a script. Requests past the end of the
/// script get label 1.
pub struct ScriptedPeer {
    timeline: Timeline,
    decoder: FrameDecoder,
    script: VecDeque<Reply>,
    scheduled: Vec<(Instant, Vec<u8>)>,
    inbound: VecDeque<u8>,
    pub sent: Vec<WireEvent>,
    pub connected: bool,
}

#[allow(dead_code)]
impl ScriptedPeer {
    pub fn new(timeline: &Timeline, script: Vec<Reply>) -> Self {
        Self {
            timeline: timeline.clone(),
            decoder: FrameDecoder::new(),
            script: script.into(),
            scheduled: Vec::new(),
            inbound: VecDeque::new(),
            sent: Vec::new(),
            connected: true,
        }
    }

    pub fn classify_requests(&self) -> Vec<(u32, String)> {
        self.sent
            .iter()
            .filter_map(|e| match e {
                WireEvent::Classify { id, data } => Some((id.0, data.clone())),
                _ => None,
            })
            .collect()
    }

    fn on_event(&mut self, event: WireEvent) {
        if let WireEvent::Classify { id, data } = &event {
            self.timeline.record(HwCall::ClassifySent {
                id: id.0,
                reference: data.clone(),
            });
            match self.script.pop_front().unwrap_or_else(|| Reply::label(1)) {
                Reply::Disconnect => self.connected = false,
                Reply::Answer(responses) => {
                    let now = Instant::now();
                    for r in responses {
                        let mut json = serde_json::json!({ "event": "classified", "data": r.data });
                        match r.id {
                            IdEcho::Matching => json["id"] = serde_json::json!(id.0),
                            IdEcho::Wrong(other) => json["id"] = serde_json::json!(other),
                            IdEcho::Omitted => {}
                        }
                        self.scheduled.push((now + r.latency, frame(&json)));
                    }
                }
            }
        }
        self.sent.push(event);
    }
}

pub fn frame(json: &serde_json::Value) -> Vec<u8> {
    let payload = serde_json::to_vec(json).unwrap();
    let mut buf = vec![0u8; HEADER_SIZE + MAX_FRAME_SIZE];
    let n = encode_frame(&payload, &mut buf).unwrap();
    buf.truncate(n);
    buf
}

impl Transport for ScriptedPeer {
    type Error = &'static str;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, &'static str> {
        if !self.connected {
            return Err("peer gone");
        }
        let now = Instant::now();
        let mut i = 0;
        while i < self.scheduled.len() {
            if self.scheduled[i].0 <= now {
                let (_, bytes) = self.scheduled.remove(i);
                self.inbound.extend(bytes);
                self.timeline.record(HwCall::ResultDelivered);
            } else {
                i += 1;
            }
        }
        let n = buf.len().min(self.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(self.inbound.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, &'static str> {
        if !self.connected {
            return Err("peer gone");
        }
        let mut events = Vec::new();
        self.decoder.feed(data, |f| events.push(WireEvent::from_json(f).unwrap()));
        for event in events {
            self.on_event(event);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> Result<(), &'static str> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<SortEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn aborted(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, SortEvent::CycleAborted { .. }))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &SortEvent) {
        self.events.push(event.clone());
    }
}

// ── Config ────────────────────────────────────────────────────

pub const PHASE_HOLD_MS: u64 = 10;
pub const STEPS: u32 = 5;
pub const SETTLE_MS: u64 = 40;

/// Fast timings and the three-class table {1 axel 0°, 2 connectors 45°,
/// 5 gears 180°}.
pub fn test_config() -> SorterConfig {
    let mut config = SorterConfig::default();
    config.belt.phase_hold_ms = PHASE_HOLD_MS;
    config.belt.steps_per_advance = STEPS;
    config.servo.settle_ms = SETTLE_MS;
    config.classifier.poll_interval_ms = 1;
    config.classifier.mirror_logs = false;
    config.classes =
        ClassTable::from_rows(&[(1, "axel", 0), (2, "connectors", 45), (5, "gears", 180)]);
    config
}
