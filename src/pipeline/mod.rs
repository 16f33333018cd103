//! Pipeline construction.

mod builder;
#[allow(clippy::module_inception)]
mod pipeline;

pub use builder::PipelineBuilder;
pub use pipeline::Pipeline;
#[cfg(feature = "async")]
pub use pipeline::AsyncPipeline;
