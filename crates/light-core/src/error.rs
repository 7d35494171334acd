//! Error types for light control

use govee_protocol::ProtocolError;
use thiserror::Error;

/// Errors from the high-level light interface
#[derive(Error, Debug)]
pub enum LightError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("Unknown scene: {0}")]
    UnknownScene(String),

    #[error("Unexpected content in register {register}: {content:02x?}")]
    UnexpectedContent { register: String, content: Vec<u8> },

    #[error("Invalid scene catalog: {0}")]
    InvalidCatalog(String),
}
