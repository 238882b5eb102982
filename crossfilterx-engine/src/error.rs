//! The engine's error surface.
//!
//! Every failure mode the engine can produce is a named variant, never a
//! catch-all, so that a dispatcher sitting above this crate can translate
//! each one to a specific outbound error code without inspecting strings.

use thiserror::Error;

use crate::common::DimId;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("schema mismatch: {reason}")]
    SchemaMismatch { reason: String },

    #[error("unknown dimension: {}", dim_id.0)]
    UnknownDimension { dim_id: DimId },
}

pub type EngineResult<T> = Result<T, EngineError>;
