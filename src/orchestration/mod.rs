pub mod batch_orchestrator;
pub mod image_pipeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use batch_orchestrator::{discover_images, BatchOrchestrator};
pub use image_pipeline::{Collaborators, ImagePipeline};
