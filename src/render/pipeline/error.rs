//! Pipeline error types.

use serde::{Deserialize, Serialize};

use super::BufferKind;
use crate::expr::ExprError;

/// Why a stage gave up on a buffer.
///
/// A stage error never aborts a render: the pipeline restores the buffer
/// and records a [`RenderWarning`].
#[derive(thiserror::Error, Debug)]
pub enum PassError {
    #[error("expression error: {0}")]
    Expr(#[from] ExprError),

    #[error("stage '{stage}' failed: {message}")]
    Stage { stage: String, message: String },
}

impl PassError {
    /// Create a stage-specific error.
    #[allow(dead_code)]
    pub fn stage(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Stage {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

/// Something that went wrong without stopping the render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderWarning {
    /// Stage name, or `parse` for template syntax kept as text.
    pub stage: String,
    pub buffer: BufferKind,
    pub message: String,
}

impl RenderWarning {
    pub fn new(stage: impl Into<String>, buffer: BufferKind, message: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            buffer,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} / {}] {}", self.buffer, self.stage, self.message)
    }
}
