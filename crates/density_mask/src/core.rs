use serde::{Deserialize, Serialize};

use crate::error::MaskError;

/// Default canvas edge length in pixels.
pub const DEFAULT_CANVAS_DIM: u32 = 2048;

/// First UDIM number; tile `n` is written as `1001 + n`.
pub const UDIM_BASE: u32 = 1001;

/// One of the two texture-space tiles the pipeline renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(u8);

impl TileId {
    pub const FIRST: TileId = TileId(0);
    pub const SECOND: TileId = TileId(1);
    pub const ALL: [TileId; 2] = [TileId::FIRST, TileId::SECOND];

    /// Maps an integer tile offset to a routed tile. Only 0 and 1 are routed.
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(TileId::FIRST),
            1 => Some(TileId::SECOND),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn udim(self) -> u32 {
        UDIM_BASE + self.0 as u32
    }
}

/// A triangle as delivered by the exporter document.
///
/// `uvs` is kept as a plain vector so records with the wrong vertex
/// count still decode and can be rejected by the router instead of
/// failing the whole document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriangleRecord {
    pub region: String,
    pub density: u8,
    pub uvs: Vec<[f64; 2]>,
}

impl TriangleRecord {
    pub fn new(region: impl Into<String>, density: u8, uvs: Vec<[f64; 2]>) -> Self {
        Self {
            region: region.into(),
            density,
            uvs,
        }
    }
}

/// Single-channel 8-bit raster, row-major with row 0 at the top.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Creates a zero-filled canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize],
        }
    }

    /// Wraps an existing pixel buffer. The buffer length must be `width * height`.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, MaskError> {
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(MaskError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Mutable view of the samples. The slice can be rewritten but not resized.
    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        x as usize + self.width as usize * y as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.pixels[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let index = self.index(x, y);
        self.pixels[index] = value;
    }

    /// Number of non-zero samples.
    pub fn coverage(&self) -> usize {
        self.pixels.iter().filter(|&&p| p != 0).count()
    }
}

/// Parameters of the refinement pass. Fixed for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseParams {
    /// UV anchor of the radial ramp.
    pub ramp_center: [f64; 2],
    /// Cells per UV unit of the block noise grid.
    pub block_scale: f64,
    pub block_strength: f64,
    /// Angular frequency of the smooth noise.
    pub low_scale: f64,
    pub low_strength: f64,
    /// Gaussian sigma in pixels. Zero disables the blur.
    pub blur_radius: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            ramp_center: [0.5, 1.0],
            block_scale: 32.0,
            block_strength: 0.1,
            low_scale: 4.0,
            low_strength: 0.08,
            blur_radius: 4.0,
        }
    }
}

impl NoiseParams {
    pub fn validate(&self) -> Result<(), String> {
        if !self.ramp_center.iter().all(|c| c.is_finite()) {
            return Err("ramp_center must be finite".into());
        }
        if !self.block_scale.is_finite() || self.block_scale <= 0.0 {
            return Err("block_scale must be finite and > 0".into());
        }
        if !self.block_strength.is_finite() {
            return Err("block_strength must be finite".into());
        }
        if !self.low_scale.is_finite() || !self.low_strength.is_finite() {
            return Err("low_scale and low_strength must be finite".into());
        }
        if !self.blur_radius.is_finite() || self.blur_radius < 0.0 {
            return Err("blur_radius must be finite and >= 0".into());
        }
        Ok(())
    }
}

/// Switches for the individual refinement factors. A disabled layer
/// contributes a factor of exactly 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefineLayers {
    pub ramp: bool,
    pub low_noise: bool,
    pub block_noise: bool,
}

impl Default for RefineLayers {
    fn default() -> Self {
        Self {
            ramp: true,
            low_noise: true,
            block_noise: true,
        }
    }
}

impl RefineLayers {
    /// Every factor disabled: refinement reduces to the raw mask.
    pub fn none() -> Self {
        Self {
            ramp: false,
            low_noise: false,
            block_noise: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub width: u32,
    pub height: u32,
    pub noise: NoiseParams,
    pub layers: RefineLayers,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_DIM,
            height: DEFAULT_CANVAS_DIM,
            noise: NoiseParams::default(),
            layers: RefineLayers::default(),
        }
    }
}

impl MaskConfig {
    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.width == 0 || self.height == 0 {
            return Err("width and height must be >= 1".into());
        }
        if (self.width as usize).checked_mul(self.height as usize).is_none() {
            return Err("width * height overflows".into());
        }
        self.noise.validate()
    }
}

/// Counters collected while routing and drawing one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub records: u32,
    pub rasterized: [u32; 2],
    pub skipped_vertex_count: u32,
    pub skipped_tile: u32,
    pub skipped_out_of_tile: u32,
    pub skipped_degenerate: u32,
    /// Document elements that did not decode into a record.
    pub skipped_undecodable: u32,
}

impl RasterStats {
    pub fn total_rasterized(&self) -> u32 {
        self.rasterized.iter().sum()
    }

    pub fn total_skipped(&self) -> u32 {
        self.skipped_vertex_count
            + self.skipped_tile
            + self.skipped_out_of_tile
            + self.skipped_degenerate
            + self.skipped_undecodable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_tool_defaults() {
        let config = MaskConfig::default();
        assert_eq!(config.width, 2048);
        assert_eq!(config.height, 2048);
        assert_eq!(config.noise.ramp_center, [0.5, 1.0]);
        assert_eq!(config.noise.block_scale, 32.0);
        assert_eq!(config.noise.block_strength, 0.1);
        assert_eq!(config.noise.low_scale, 4.0);
        assert_eq!(config.noise.low_strength, 0.08);
        assert_eq!(config.noise.blur_radius, 4.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        assert!(MaskConfig::with_size(0, 16).validate().is_err());
        assert!(MaskConfig::with_size(16, 0).validate().is_err());
    }

    #[test]
    fn rejects_negative_blur_radius() {
        let mut config = MaskConfig::default();
        config.noise.blur_radius = -1.0;
        assert!(config.validate().is_err());
        config.noise.blur_radius = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_config_keeps_defaults() {
        let config: MaskConfig =
            serde_json::from_str(r#"{ "width": 512, "noise": { "blur_radius": 0.0 } }"#)
                .expect("config");
        assert_eq!(config.width, 512);
        assert_eq!(config.height, 2048);
        assert_eq!(config.noise.blur_radius, 0.0);
        assert_eq!(config.noise.block_scale, 32.0);
        assert!(config.layers.ramp);
    }

    #[test]
    fn tile_ids_map_to_udims() {
        assert_eq!(TileId::from_index(0), Some(TileId::FIRST));
        assert_eq!(TileId::from_index(1), Some(TileId::SECOND));
        assert_eq!(TileId::from_index(2), None);
        assert_eq!(TileId::from_index(-1), None);
        assert_eq!(TileId::FIRST.udim(), 1001);
        assert_eq!(TileId::SECOND.udim(), 1002);
    }

    #[test]
    fn canvas_from_raw_checks_length() {
        assert!(Canvas::from_raw(4, 4, vec![0; 16]).is_ok());
        assert!(matches!(
            Canvas::from_raw(4, 4, vec![0; 15]),
            Err(MaskError::DimensionMismatch { expected: 16, actual: 15 })
        ));
    }
}
