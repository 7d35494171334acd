//! Async transport and request correlation
//!
//! The link delivers raw 20-byte frames in both directions with no
//! sequence numbers. Acknowledgements are matched to requests by
//! their command tag and echoed register address, and the link is
//! single-slot: one request is in flight at a time, everything else
//! queues behind it in submission order. A dedicated engine task owns
//! the link, which is what enforces both properties.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use crate::frame::{Frame, FRAME_SIZE};
use crate::multi::{MultiPacketSequence, COMPLETION_MARKER};
use crate::registers::{Register, REG_BUFFER, REG_POWER};
use crate::types::{Acknowledgement, Command, ProtocolError};

/// Default time to wait for an acknowledgement
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A raw frame as it crosses the link
pub type WireFrame = [u8; FRAME_SIZE];

/// Both directions of an established link
///
/// The producer of this handle (a BLE session, a test harness) feeds
/// notification bytes into `incoming` and drains `outgoing` into the
/// write characteristic.
pub struct LinkHandle {
    pub outgoing: mpsc::Sender<WireFrame>,
    pub incoming: mpsc::Receiver<WireFrame>,
}

/// Transport tuning knobs
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long to wait for an acknowledgement before giving up.
    pub ack_timeout: Duration,
    /// Index of the first frame in a multi-packet sequence. Most
    /// firmware counts from 0x00, some from 0x01.
    pub multi_start_index: u8,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_TIMEOUT,
            multi_start_index: 0x00,
        }
    }
}

/// Unsolicited reports from the device
///
/// The device notifies on its own schedule as well as in response to
/// requests. Whatever arrives while no matching request is pending is
/// published here instead of being dropped.
#[derive(Debug, Clone)]
pub enum LightEvent {
    /// Power state report, typically the reply to a keepalive.
    PowerReported(bool),
    /// Color buffer page report.
    BufferReported { page: u8, content: Vec<u8> },
    /// Any other register report.
    RegisterReported { register: Register, content: Vec<u8> },
}

/// A queued request, answered over its own oneshot
enum Intent {
    Read {
        register: Register,
        reply: oneshot::Sender<Result<Vec<u8>, ProtocolError>>,
    },
    Write {
        register: Register,
        content: Vec<u8>,
        reply: oneshot::Sender<Result<(), ProtocolError>>,
    },
    WriteMulti {
        data: Bytes,
        reply: oneshot::Sender<Result<(), ProtocolError>>,
    },
    SendRaw {
        frame: Frame,
    },
}

/// Request/acknowledgement transport over a framed link
pub struct LightTransport {
    intent_tx: mpsc::Sender<Intent>,
    event_tx: broadcast::Sender<LightEvent>,
}

impl LightTransport {
    /// Take ownership of a link and start the engine task
    #[must_use]
    pub fn new(link: LinkHandle) -> Self {
        Self::with_config(link, TransportConfig::default())
    }

    /// As [`new`](Self::new), with explicit tuning
    #[must_use]
    pub fn with_config(link: LinkHandle, config: TransportConfig) -> Self {
        let (intent_tx, intent_rx) = mpsc::channel(32);
        let (event_tx, _) = broadcast::channel(64);

        let engine = Engine {
            link,
            config,
            event_tx: event_tx.clone(),
        };
        tokio::spawn(engine.run(intent_rx));

        Self {
            intent_tx,
            event_tx,
        }
    }

    /// Read a register, returning its content with the trailing zero
    /// padding already stripped
    pub async fn read_register(&self, register: Register) -> Result<Vec<u8>, ProtocolError> {
        let (reply, response) = oneshot::channel();
        self.intent_tx
            .send(Intent::Read { register, reply })
            .await
            .map_err(|_| ProtocolError::NotConnected)?;
        response.await.map_err(|_| ProtocolError::NotConnected)?
    }

    /// Write raw content to a register and wait for the address echo
    pub async fn write_register(
        &self,
        register: Register,
        content: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let (reply, response) = oneshot::channel();
        self.intent_tx
            .send(Intent::Write {
                register,
                content,
                reply,
            })
            .await
            .map_err(|_| ProtocolError::NotConnected)?;
        response.await.map_err(|_| ProtocolError::NotConnected)?
    }

    /// Send a bulk payload as a multi-packet sequence and wait for
    /// the completion acknowledgement.
    ///
    /// A timeout here is reported as [`ProtocolError::Indeterminate`]:
    /// the device acknowledges only once, after acting on the whole
    /// sequence, so a missing acknowledgement does not say how much
    /// of it was applied.
    pub async fn write_multi(&self, data: Bytes) -> Result<(), ProtocolError> {
        let (reply, response) = oneshot::channel();
        self.intent_tx
            .send(Intent::WriteMulti { data, reply })
            .await
            .map_err(|_| ProtocolError::NotConnected)?;
        response.await.map_err(|_| ProtocolError::NotConnected)?
    }

    /// Send a frame without waiting for any acknowledgement.
    ///
    /// For fire-and-forget traffic: restart commands that drop the
    /// link before acknowledging, and the opaque audio family.
    pub async fn send_frame(&self, frame: Frame) -> Result<(), ProtocolError> {
        self.intent_tx
            .send(Intent::SendRaw { frame })
            .await
            .map_err(|_| ProtocolError::NotConnected)
    }

    /// Subscribe to unsolicited device reports
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<LightEvent> {
        self.event_tx.subscribe()
    }
}

struct Engine {
    link: LinkHandle,
    config: TransportConfig,
    event_tx: broadcast::Sender<LightEvent>,
}

enum Wakeup {
    Intent(Option<Intent>),
    Inbound(Option<WireFrame>),
}

impl Engine {
    async fn run(mut self, mut intent_rx: mpsc::Receiver<Intent>) {
        loop {
            let wakeup = tokio::select! {
                intent = intent_rx.recv() => Wakeup::Intent(intent),
                raw = self.link.incoming.recv() => Wakeup::Inbound(raw),
            };
            match wakeup {
                Wakeup::Intent(Some(intent)) => {
                    if !self.dispatch(intent).await {
                        break;
                    }
                }
                Wakeup::Inbound(Some(raw)) => self.handle_unsolicited(&raw),
                Wakeup::Intent(None) | Wakeup::Inbound(None) => break,
            }
        }
        tracing::debug!("transport engine shutting down");
    }

    /// Run one queued intent to completion. Returns false once the
    /// link is gone.
    async fn dispatch(&mut self, intent: Intent) -> bool {
        match intent {
            Intent::Read { register, reply } => {
                if reply.is_closed() {
                    // Caller gave up while queued, do not spend the
                    // link on it.
                    return true;
                }
                let result = self.request_read(register).await;
                let lost = matches!(result, Err(ProtocolError::NotConnected));
                let _ = reply.send(result);
                !lost
            }
            Intent::Write {
                register,
                content,
                reply,
            } => {
                if reply.is_closed() {
                    return true;
                }
                let result = self.request_write(register, content).await;
                let lost = matches!(result, Err(ProtocolError::NotConnected));
                let _ = reply.send(result);
                !lost
            }
            Intent::WriteMulti { data, reply } => {
                if reply.is_closed() {
                    return true;
                }
                let result = self.request_multi(data).await;
                let lost = matches!(result, Err(ProtocolError::NotConnected));
                let _ = reply.send(result);
                !lost
            }
            Intent::SendRaw { frame } => self.send(&frame).await.is_ok(),
        }
    }

    async fn send(&self, frame: &Frame) -> Result<(), ProtocolError> {
        self.link
            .outgoing
            .send(frame.encode())
            .await
            .map_err(|_| ProtocolError::NotConnected)
    }

    async fn request_read(&mut self, register: Register) -> Result<Vec<u8>, ProtocolError> {
        let frame = Frame::new(Command::Read, register.address_bytes())?;
        self.send(&frame).await?;

        let deadline = Instant::now() + self.config.ack_timeout;
        let ack = self.await_ack(Command::Read, register, deadline).await?;
        Ok(ack.content)
    }

    async fn request_write(
        &mut self,
        register: Register,
        content: Vec<u8>,
    ) -> Result<(), ProtocolError> {
        let mut payload = register.address_bytes();
        payload.extend_from_slice(&content);
        let frame = Frame::new(Command::Write, payload)?;
        self.send(&frame).await?;

        let deadline = Instant::now() + self.config.ack_timeout;
        self.await_ack(Command::Write, register, deadline).await?;
        Ok(())
    }

    async fn request_multi(&mut self, data: Bytes) -> Result<(), ProtocolError> {
        let sequence = MultiPacketSequence::split(data, self.config.multi_start_index)?;
        tracing::debug!(frames = sequence.len(), "sending multi-packet sequence");
        for frame in sequence.frames() {
            self.send(frame).await?;
        }

        let deadline = Instant::now() + self.config.ack_timeout;
        let completion = Register::plain(COMPLETION_MARKER);
        match self.await_ack(Command::Multi, completion, deadline).await {
            Ok(_) => Ok(()),
            // The device acknowledges after acting on the sequence,
            // so silence leaves its effect unknown.
            Err(ProtocolError::Timeout) => Err(ProtocolError::Indeterminate),
            Err(e) => Err(e),
        }
    }

    /// Wait for the acknowledgement matching a request, forwarding
    /// everything else that arrives in the meantime
    async fn await_ack(
        &mut self,
        command: Command,
        register: Register,
        deadline: Instant,
    ) -> Result<Acknowledgement, ProtocolError> {
        loop {
            let raw = match tokio::time::timeout_at(deadline, self.link.incoming.recv()).await {
                Ok(Some(raw)) => raw,
                Ok(None) => return Err(ProtocolError::NotConnected),
                Err(_) => return Err(ProtocolError::Timeout),
            };

            match self.decode_inbound(&raw) {
                Some(ack) if ack.command == command && ack.register == register => {
                    return Ok(ack);
                }
                Some(ack) => self.notify(&ack),
                None => {}
            }
        }
    }

    fn handle_unsolicited(&self, raw: &WireFrame) {
        if let Some(ack) = self.decode_inbound(raw) {
            self.notify(&ack);
        }
    }

    /// Decode and parse an inbound frame, logging and dropping
    /// anything malformed
    fn decode_inbound(&self, raw: &WireFrame) -> Option<Acknowledgement> {
        let frame = match Frame::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("dropping malformed frame: {e}");
                return None;
            }
        };
        Acknowledgement::parse(&frame)
    }

    fn notify(&self, ack: &Acknowledgement) {
        tracing::debug!(
            register = %ack.register,
            content_len = ack.content.len(),
            "forwarding unmatched report"
        );
        let event = match (ack.register.register, ack.register.sub) {
            (REG_POWER, None) => LightEvent::PowerReported(ack.content.first() == Some(&0x01)),
            (REG_BUFFER, Some(page)) => LightEvent::BufferReported {
                page,
                content: ack.content.clone(),
            },
            _ => LightEvent::RegisterReported {
                register: ack.register,
                content: ack.content.clone(),
            },
        };
        let _ = self.event_tx.send(event);
    }
}
