//! Document rendering.
//!
//! [`DocumentRenderer`] turns a stored template and a variable map into a
//! self-contained HTML document ready for print. The work is split into:
//!
//! - `pipeline`: the buffer stages (logos, loops, tables, ... interpolation)
//! - `defaults`: header and footer used when a template leaves them empty
//! - `page`: CSS and HTML assembly with Tera
//! - `watch`: file watching for the preview server

mod defaults;
mod page;
mod pipeline;
mod renderer;
pub mod watch;

use serde::{Deserialize, Serialize};

pub use renderer::DocumentRenderer;
pub use watch::{ChangeKind, FileWatcher, WatchEvent, WatchPaths};

/// Identifiers of the document being rendered, used to look up its
/// signatures and attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderRequest {
    #[serde(default, alias = "organizationId")]
    pub organization_id: Option<String>,
    #[serde(default, alias = "documentId")]
    pub document_id: Option<String>,
}
