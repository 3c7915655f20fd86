//! Default pipeline stages.
//!
//! The standard buffer pipeline consists of:
//!
//! 1. **LogosStage** - Inline logo images as data URIs
//! 2. **LoopsStage** - Unroll `{FOREACH}` blocks
//! 3. **TablesStage** - Expand `{TABLE}` tokens into HTML tables
//! 4. **ConditionalsStage** - Pick `{IF}` / `{ELSE}` branches
//! 5. **VisibilityStage** - Apply `data-show-if` / `data-hide-if`
//! 6. **CalculationsStage** - Evaluate `{SUM(..)}`, `{CALC(..)}`...
//! 7. **HyperlinksStage** - Build `{LINK}`, `{EMAIL}`, `{PHONE}`, `{SMS}` anchors
//! 8. **SignaturesStage** - Fill `<signature-field>` zones
//! 9. **AttachmentsStage** - Link `<attachment-field>` uploads
//! 10. **CodesStage** - Point QR code and barcode images at the image services
//! 11. **InterpolateStage** - Substitute the remaining `{key}` placeholders

mod attachments;
mod calculations;
mod codes;
mod conditionals;
mod hyperlinks;
mod interpolate;
mod logos;
mod loops;
mod signatures;
mod tables;
mod visibility;

pub use attachments::AttachmentsStage;
pub use calculations::CalculationsStage;
pub use codes::CodesStage;
pub use conditionals::ConditionalsStage;
pub use hyperlinks::HyperlinksStage;
pub use interpolate::{InterpolateStage, interpolate_text};
pub use logos::{LogosStage, insert_logo_markers};
pub use loops::LoopsStage;
pub use signatures::SignaturesStage;
pub use tables::TablesStage;
pub use visibility::VisibilityStage;
