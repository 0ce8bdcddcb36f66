//! Classification channel: one request/response round trip per item.
//!
//! ```text
//!   request(ref) ──▶ [classify #n] ──▶ peer
//!                                        │
//!   wait(ticket) ◀── [classified #n] ◀───┘
//! ```
//!
//! At most one request is outstanding. `wait` polls the transport on a
//! reactor timer and resolves only when the matching `classified` event
//! arrives; there is no timeout. While waiting it also forwards mirrored
//! log lines to the peer.
//!
//! Outbound frames are staged in an outbox and written as the transport
//! accepts them, yielding to the executor whenever it is full. A send that
//! is dropped half way leaves its tail in the outbox, and the next send
//! writes that tail first, so the peer never sees a torn frame.

use core::time::Duration;

use log::{debug, info, warn};

use super::codec::{FrameDecoder, HEADER_SIZE, encode_frame};
use super::transport::Transport;
use super::wire::{RequestId, WireEvent};
use crate::adapters::logger;
use crate::classes::ClassLabel;
use crate::config::ClassifierConfig;
use crate::error::{LinkError, Result};

const READ_BUF_SIZE: usize = 1024;

/// Proof that a request was sent; redeemed once by
/// [`ClassificationChannel::wait`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a classification ticket must be waited on"]
pub struct Ticket {
    id: RequestId,
}

impl Ticket {
    pub fn id(&self) -> RequestId {
        self.id
    }
}

/// Request/response bridge to the remote classifier.
pub struct ClassificationChannel<T> {
    transport: T,
    decoder: FrameDecoder,
    read_buf: [u8; READ_BUF_SIZE],
    outbox: Vec<u8>,
    next_id: u32,
    outstanding: Option<RequestId>,
    poll_interval: Duration,
    mirror_logs: bool,
}

impl<T: Transport> ClassificationChannel<T> {
    pub fn new(transport: T, config: &ClassifierConfig) -> Self {
        Self {
            transport,
            decoder: FrameDecoder::new(),
            read_buf: [0; READ_BUF_SIZE],
            outbox: Vec::new(),
            next_id: 1,
            outstanding: None,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            mirror_logs: config.mirror_logs,
        }
    }

    // ── Request / response ────────────────────────────────────

    /// Send a `classify` event for `reference`.
    ///
    /// Fails with [`LinkError::RequestInFlight`] while a previous request
    /// has not been answered.
    pub async fn request(&mut self, reference: &str) -> Result<Ticket> {
        if let Some(id) = self.outstanding {
            warn!("Classifier link: request {} still outstanding", id);
            return Err(LinkError::RequestInFlight.into());
        }

        let id = RequestId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1).max(1);

        self.send(&WireEvent::Classify {
            id,
            data: reference.into(),
        })
        .await?;
        self.outstanding = Some(id);
        debug!("Classifier link: request {} sent for {}", id, reference);
        Ok(Ticket { id })
    }

    /// Wait for the answer to `ticket`.
    ///
    /// Never resolves if the peer stays connected but silent.
    pub async fn wait(&mut self, ticket: Ticket) -> Result<ClassLabel> {
        if self.outstanding != Some(ticket.id) {
            return Err(LinkError::UnknownTicket(ticket.id.0).into());
        }

        loop {
            let polled = match self.flush_logs().await {
                Ok(_) => self.poll_once(),
                Err(e) => Err(e),
            };
            match polled {
                Ok(Some(label)) => {
                    debug!("Classifier link: request {} answered with {}", ticket.id, label);
                    return Ok(label);
                }
                Ok(None) => {}
                Err(e) => {
                    self.outstanding = None;
                    return Err(e);
                }
            }
            async_io_mini::Timer::after(self.poll_interval).await;
        }
    }

    /// Request and wait in one step.
    pub async fn classify(&mut self, reference: &str) -> Result<ClassLabel> {
        let ticket = self.request(reference).await?;
        self.wait(ticket).await
    }

    /// Request currently awaiting an answer.
    pub fn outstanding(&self) -> Option<RequestId> {
        self.outstanding
    }

    /// Give up on the outstanding request. A late answer to it is then
    /// discarded as unsolicited.
    pub fn abandon(&mut self) -> Option<RequestId> {
        let dropped = self.outstanding.take();
        if let Some(id) = dropped {
            warn!("Classifier link: abandoning request {}", id);
        }
        dropped
    }

    // ── Log mirror ────────────────────────────────────────────

    /// Forward queued log lines to the peer. Returns how many were sent.
    pub async fn flush_logs(&mut self) -> Result<usize> {
        if !self.mirror_logs || !self.transport.is_connected() {
            return Ok(0);
        }
        let mut sent = 0;
        while let Some(line) = logger::take_mirrored() {
            self.send(&WireEvent::Log {
                data: line.as_str().into(),
            })
            .await?;
            sent += 1;
        }
        Ok(sent)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Internal ──────────────────────────────────────────────

    /// Read whatever the transport has and settle the outstanding request
    /// if its answer is among the frames.
    fn poll_once(&mut self) -> Result<Option<ClassLabel>> {
        if !self.transport.is_connected() {
            return Err(LinkError::Disconnected.into());
        }

        let n = match self.transport.read(&mut self.read_buf) {
            Ok(n) => n,
            Err(e) => return Err(self.link_error(&e).into()),
        };
        if n == 0 {
            return Ok(None);
        }

        let rejected_before = self.decoder.rejected_headers();
        let mut events = Vec::new();
        self.decoder.feed(&self.read_buf[..n], |frame| {
            events.push(WireEvent::from_json(frame));
        });
        let rejected = self.decoder.rejected_headers().saturating_sub(rejected_before);
        if rejected > 0 {
            warn!("Classifier link: skipped {} bad frame header(s)", rejected);
        }

        let mut answer = None;
        for event in events {
            match event {
                Ok(WireEvent::Classified { id, data }) => {
                    let Some(expected) = self.outstanding else {
                        warn!("Classifier link: unsolicited result {} discarded", data);
                        continue;
                    };
                    if id.is_some_and(|got| got != expected) {
                        warn!(
                            "Classifier link: result for {:?} does not match outstanding {}, \
                             discarded",
                            id.map(|i| i.0),
                            expected
                        );
                        continue;
                    }
                    let label = data.to_label()?;
                    self.outstanding = None;
                    answer = Some(label);
                }
                Ok(other) => debug!("Classifier link: ignoring inbound {:?}", other),
                Err(e) => warn!("Classifier link: malformed event discarded: {}", e),
            }
        }
        Ok(answer)
    }

    /// Frame `event` into the outbox and write the outbox out.
    async fn send(&mut self, event: &WireEvent) -> Result<()> {
        let payload = event.to_json()?;
        let start = self.outbox.len();
        self.outbox.resize(start + HEADER_SIZE + payload.len(), 0);
        if encode_frame(&payload, &mut self.outbox[start..]).is_none() {
            self.outbox.truncate(start);
            let reason = format!("{} byte payload exceeds frame limit", payload.len());
            return Err(LinkError::Encode(reason).into());
        }
        self.drain_outbox().await
    }

    /// Write the outbox until it is empty, waiting a poll interval each
    /// time the transport takes nothing.
    async fn drain_outbox(&mut self) -> Result<()> {
        while !self.outbox.is_empty() {
            match self.transport.write(&self.outbox) {
                Ok(0) => {
                    async_io_mini::Timer::after(self.poll_interval).await;
                }
                Ok(n) => self.outbox = self.outbox.split_off(n.min(self.outbox.len())),
                Err(e) => {
                    self.outbox.clear();
                    return Err(self.link_error(&e).into());
                }
            }
        }
        self.transport
            .flush()
            .map_err(|e| self.link_error(&e).into())
    }

    fn link_error(&self, e: &T::Error) -> LinkError {
        if self.transport.is_connected() {
            LinkError::Io(format!("{e:?}"))
        } else {
            info!("Classifier link: peer disconnected");
            LinkError::Disconnected
        }
    }
}
