//! Domain error taxonomy (§7): semantic, not tied to any transport. The HTTP
//! edge (`http::error`) maps these onto status codes.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// A valid but deliberately unimplemented combination (e.g. filtering by
    /// email/phone/premium in the group API). Maps to 400 at the edge like
    /// `BadRequest`, but is logged at a higher level.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An invariant was violated. The reference implementation's stance is
    /// that this is a bug, not a recoverable condition — callers should let
    /// it propagate and crash rather than paper over it.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
