//! Procedural refinement of a raw density mask.
//!
//! Each output sample is the raw sample scaled by three factors that only
//! depend on the sample's UV position:
//!
//! - a radial ramp, 1 at the anchor and falling linearly to 0 at UV distance 1,
//! - a smooth low-frequency field `1 + sin(u s) sin(v s) k`,
//! - a per-cell block noise `1 + n(iu, iv) k` with `n` a fixed integer hash.
//!
//! The product is clamped to `[0, 1]` before quantizing back to 8 bits.

use std::time::Instant;

use glam::DVec2;
use rayon::prelude::*;

use crate::core::{Canvas, NoiseParams, RefineLayers};

/// Spatial hash primes of the block-noise seed.
const HASH_PRIME_U: i64 = 73_856_093;
const HASH_PRIME_V: i64 = 19_349_663;

/// UV of the pixel center at `(x, y)`; a 1-pixel axis maps to 0.
#[inline]
pub fn pixel_to_uv(x: u32, y: u32, width: u32, height: u32) -> DVec2 {
    let max_x = width.saturating_sub(1).max(1) as f64;
    let max_y = height.saturating_sub(1).max(1) as f64;
    DVec2::new(x as f64 / max_x, 1.0 - y as f64 / max_y)
}

#[inline]
pub fn radial_ramp(uv: DVec2, center: DVec2) -> f64 {
    (1.0 - uv.distance(center)).max(0.0)
}

#[inline]
pub fn low_frequency_noise(uv: DVec2, scale: f64) -> f64 {
    (uv.x * scale).sin() * (uv.y * scale).sin()
}

/// Deterministic value in `[-1, 1)` for a block-noise cell.
///
/// The same `(iu, iv)` always yields the same value, in and across runs.
pub fn block_noise(iu: i64, iv: i64) -> f64 {
    let seed = iu.wrapping_mul(HASH_PRIME_U) ^ iv.wrapping_mul(HASH_PRIME_V);
    let bits = splitmix64(seed as u64);
    // 53 high bits give an exact f64 in [0, 1).
    let unit = (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64);
    unit * 2.0 - 1.0
}

#[inline]
fn splitmix64(seed: u64) -> u64 {
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Block-noise cell containing `uv`.
#[inline]
pub fn block_cell(uv: DVec2, scale: f64) -> (i64, i64) {
    ((uv.x * scale).floor() as i64, (uv.y * scale).floor() as i64)
}

/// Refined intensity in `[0, 1]` for a raw sample at `uv`.
pub fn refine_value(raw: u8, uv: DVec2, params: &NoiseParams, layers: RefineLayers) -> f64 {
    let base = raw as f64 / 255.0;
    let ramp = if layers.ramp {
        radial_ramp(uv, DVec2::from(params.ramp_center))
    } else {
        1.0
    };
    let low_n = if layers.low_noise {
        1.0 + low_frequency_noise(uv, params.low_scale) * params.low_strength
    } else {
        1.0
    };
    let block_n = if layers.block_noise {
        let (iu, iv) = block_cell(uv, params.block_scale);
        1.0 + block_noise(iu, iv) * params.block_strength
    } else {
        1.0
    };

    let value = base * ramp * low_n * block_n;
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

#[inline]
pub fn quantize(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Produces the refined canvas. `raw` is left untouched.
pub fn refine(raw: &Canvas, params: &NoiseParams, layers: RefineLayers) -> Canvas {
    let start = Instant::now();
    let (width, height) = (raw.width(), raw.height());
    let mut out = Canvas::new(width, height);
    if width == 0 || height == 0 {
        return out;
    }

    out.pixels_mut()
        .par_chunks_mut(width as usize)
        .zip(raw.pixels().par_chunks(width as usize))
        .enumerate()
        .for_each(|(y, (dst_row, src_row))| {
            for (x, (dst, &src)) in dst_row.iter_mut().zip(src_row).enumerate() {
                // Zero stays zero under every factor.
                if src == 0 {
                    continue;
                }
                let uv = pixel_to_uv(x as u32, y as u32, width, height);
                *dst = quantize(refine_value(src, uv, params, layers));
            }
        });

    tracing::debug!(
        width,
        height,
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "applied ramp and layered noise"
    );
    out
}
