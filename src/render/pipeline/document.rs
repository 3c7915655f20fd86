//! Buffers being processed through the pipeline.

use serde::{Deserialize, Serialize};

use crate::markup::Fragment;

/// Which part of the document a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferKind {
    Header,
    Content,
    Footer,
}

impl BufferKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BufferKind::Header => "header",
            BufferKind::Content => "content",
            BufferKind::Footer => "footer",
        }
    }
}

impl std::fmt::Display for BufferKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One document part, parsed once and rewritten in place by each stage.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub kind: BufferKind,
    pub tree: Fragment,
}

impl Buffer {
    pub fn new(kind: BufferKind, tree: Fragment) -> Self {
        Self { kind, tree }
    }
}
