//! Error taxonomy for the frame pipeline.
//!
//! End-of-stream is deliberately *not* here: it is a terminal signal carried by
//! `source::FrameRead`, handled by the playback state machine.

use std::fmt;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Bad path, unreadable container, device busy. Never retried; state is
    /// left unchanged by the caller.
    Acquisition(String),
    /// Malformed selector or out-of-range numeric parameter (e.g. gamma <= 0).
    InvalidParameter(String),
    /// Operation the source cannot perform, e.g. seeking a live camera.
    Unsupported(&'static str),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Acquisition(msg) => write!(f, "acquisition failed: {}", msg),
            PipelineError::InvalidParameter(msg) => write!(f, "invalid parameter: {}", msg),
            PipelineError::Unsupported(op) => write!(f, "unsupported operation: {}", op),
        }
    }
}

impl std::error::Error for PipelineError {}
