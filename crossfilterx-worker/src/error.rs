//! The worker's error surface: the engine's errors plus the protocol-level
//! failures that only make sense at the message boundary (§7).

use thiserror::Error;

use crossfilterx_engine::EngineError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("malformed columnar payload: {reason}")]
    MalformedPayload { reason: String },

    #[error("the engine has not been ingested yet")]
    NotIngested,

    /// A raw message failed to decode as a known [`crate::protocol::InboundMessage`]
    /// — an unrecognized `type` tag, a field of the wrong shape, or (per §6/§7)
    /// a function-based dimension submitted where only a pre-computed `column:
    /// u16[]` is accepted. Only reachable through [`crate::Worker::handle_json`];
    /// a caller that already holds a typed `InboundMessage` cannot produce this,
    /// since the wire shape makes those malformed states unrepresentable.
    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

pub type WorkerResult<T> = Result<T, WorkerError>;
