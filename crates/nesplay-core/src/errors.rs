//! Codec error types.

use thiserror::Error;

/// A frame that does not match the `{"cmd": string, "data": string}` schema.
///
/// Never fatal: the dispatcher logs it and drops the frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame was not valid JSON or did not match the command schema.
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),
}
