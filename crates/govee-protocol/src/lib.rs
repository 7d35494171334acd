//! Register protocol implementation for Govee BLE LED controllers
//!
//! This crate implements the register-based binary protocol spoken
//! over the controller's write/notify characteristic pair: fixed
//! 20-byte frames, register interpretation, multi-packet bulk writes,
//! and request/acknowledgement correlation over a single-slot link.

pub mod frame;
pub mod multi;
pub mod registers;
pub mod transport;
pub mod types;

pub use frame::{Frame, FRAME_SIZE, MAX_PAYLOAD};
pub use multi::MultiPacketSequence;
pub use registers::{Argb, BufferPage, BufferUnit, Mode, Register, RegisterValue};
pub use transport::{LightEvent, LightTransport, LinkHandle, TransportConfig, WireFrame};
pub use types::*;
