pub mod color;
pub mod image_ops;

// Re-export commonly used items
pub use color::parse_css_color;
pub use image_ops::{
    decode_image, encode_image, output_format_for, read_dimensions,
    run_blocking,
};
