// Pure image-side stages of the workflow: mask painting, text layout and
// compositing

pub mod composite;
pub mod layout;
pub mod mask;

pub use composite::TextCompositor;
pub use layout::{layout_region, wrap_text, RegionLayout, TextMeasure};
pub use mask::{build_mask, build_mask_for_image, DEFAULT_MASK_PADDING};
