// Document-to-PDF rendering pipeline.
// One browser process and one page per request; teardown is unconditional.
// Resume and cover-letter exports share the same pipeline, parameterized by DocumentFamily.

pub mod assemble;
pub mod chrome;
pub mod error;
pub mod export;
pub mod fonts;
pub mod geometry;
pub mod handlers;
pub mod measure;
pub mod pipeline;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

// Re-export the public API consumed by main and the router.
pub use chrome::ChromeLauncher;
pub use error::RenderError;
pub use fonts::DocumentFamily;
pub use pipeline::{RenderPipeline, RenderTimings};
