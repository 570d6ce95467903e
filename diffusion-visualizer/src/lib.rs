pub mod collaborator;
pub mod png;
pub mod render;

pub use collaborator::{compose_panels, AnimationAssembler, Annotator, GifAssembler, GlyphAnnotator};
pub use png::PngEncoder;
pub use render::{cell_color, render, render_scaled, RgbGrid};
