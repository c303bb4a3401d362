//! Density masks from UV triangles.
//!
//! Triangles tagged with a density are routed to one of two texture tiles
//! (UDIM 1001 and 1002), scan-converted into an 8-bit grayscale mask per
//! tile, then refined with a radial ramp, two layers of deterministic noise
//! and a Gaussian blur.
//!
//! # Example
//!
//! ```
//! use density_mask::{DensityMaskPipeline, MaskConfig, TileId, TriangleRecord};
//!
//! let pipeline = DensityMaskPipeline::new(MaskConfig::with_size(64, 64)).unwrap();
//! let records = vec![TriangleRecord::new(
//!     "density_body",
//!     200,
//!     vec![[0.1, 0.1], [0.5, 0.1], [0.1, 0.5]],
//! )];
//!
//! let output = pipeline.run(&records);
//! assert!(output.tile(TileId::FIRST).raw.coverage() > 0);
//! assert_eq!(output.tile(TileId::SECOND).raw.coverage(), 0);
//! ```

pub mod blur;
pub mod core;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod raster;
pub mod refine;
pub mod router;

pub use crate::core::{
    Canvas, MaskConfig, NoiseParams, RasterStats, RefineLayers, TileId, TriangleRecord,
};
pub use crate::error::{MaskError, MaskResult};
pub use crate::pipeline::{DensityMaskPipeline, PipelineOutput, TileOutput};
