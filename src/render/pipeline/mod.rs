//! Render pipeline for document buffers.
//!
//! Each buffer (header, content, footer) is parsed once into a tree, then
//! transformed by a fixed series of stages:
//!
//! 1. logos, 2. loops, 3. tables, 4. conditionals, 5. visibility,
//! 6. calculations, 7. hyperlinks, 8. signatures, 9. attachments,
//! 10. codes, 11. interpolate
//!
//! Every stage runs over every buffer before the next stage starts, so a
//! token behaves the same wherever it appears. A stage that fails on a
//! buffer leaves that buffer exactly as it found it and the failure becomes
//! a [`RenderWarning`].

mod context;
mod document;
mod error;
pub mod stages;

use async_trait::async_trait;

pub use context::PipelineContext;
pub use document::{Buffer, BufferKind};
pub use error::{PassError, RenderWarning};

use stages::{
    AttachmentsStage, CalculationsStage, CodesStage, ConditionalsStage, HyperlinksStage,
    InterpolateStage, LogosStage, LoopsStage, SignaturesStage, TablesStage, VisibilityStage,
};

/// A stage in the render pipeline.
///
/// A stage rewrites one buffer's tree in place. The `ctx` gives access to
/// the variables, settings, collaborators and per-render caches.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Unique name for this stage (used in warnings and for insertion points).
    fn name(&self) -> &'static str;

    /// Process one buffer through this stage.
    async fn process(
        &self,
        buffer: &mut Buffer,
        ctx: &mut PipelineContext<'_>,
    ) -> Result<(), PassError>;
}

/// The buffer processing pipeline.
///
/// The default pipeline holds the eleven stages listed in the module docs.
///
/// # Extension Points
///
/// Insert custom stages using `insert_before` or `insert_after`:
///
/// ```ignore
/// pipeline.insert_after("loops", MyCustomStage);
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Create the default pipeline with standard stages.
    pub fn default_pipeline() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(LogosStage);
        pipeline.add_stage(LoopsStage);
        pipeline.add_stage(TablesStage);
        pipeline.add_stage(ConditionalsStage);
        pipeline.add_stage(VisibilityStage);
        pipeline.add_stage(CalculationsStage);
        pipeline.add_stage(HyperlinksStage);
        pipeline.add_stage(SignaturesStage);
        pipeline.add_stage(AttachmentsStage);
        pipeline.add_stage(CodesStage);
        pipeline.add_stage(InterpolateStage);
        pipeline
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Insert a stage before the named stage.
    ///
    /// # Panics
    ///
    /// Panics if no stage with the given name exists.
    #[allow(dead_code)]
    pub fn insert_before<S: Stage + 'static>(&mut self, name: &str, stage: S) -> &mut Self {
        let pos = self.position(name);
        self.stages.insert(pos, Box::new(stage));
        self
    }

    /// Insert a stage after the named stage.
    ///
    /// # Panics
    ///
    /// Panics if no stage with the given name exists.
    #[allow(dead_code)]
    pub fn insert_after<S: Stage + 'static>(&mut self, name: &str, stage: S) -> &mut Self {
        let pos = self.position(name);
        self.stages.insert(pos + 1, Box::new(stage));
        self
    }

    fn position(&self, name: &str) -> usize {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .unwrap_or_else(|| panic!("stage '{}' not found in pipeline", name))
    }

    /// Run the pipeline on a set of buffers.
    ///
    /// Never fails: stage errors are recorded in the context's warnings.
    pub async fn run(&self, buffers: &mut [Buffer], ctx: &mut PipelineContext<'_>) {
        for stage in &self.stages {
            for buffer in buffers.iter_mut() {
                let snapshot = buffer.tree.clone();
                if let Err(e) = stage.process(buffer, ctx).await {
                    buffer.tree = snapshot;
                    ctx.warn(stage.name(), buffer.kind, e.to_string());
                }
            }
        }
    }

    /// Get the names of all stages in order.
    #[allow(dead_code)]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::default_pipeline()
    }
}
