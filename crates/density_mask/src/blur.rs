//! Separable Gaussian blur with clamp-to-edge sampling.
//!
//! `radius` is the standard deviation in pixels. The kernel extends to
//! `ceil(3 * radius)` taps on each side, capped at the larger canvas
//! dimension. Samples outside the canvas repeat the nearest border sample.

use rayon::prelude::*;

use crate::core::Canvas;

/// Normalized 1D Gaussian weights, `2 * half + 1` long, where `half` is
/// `ceil(3 * radius)` but never more than `max_half`.
pub fn gaussian_kernel(radius: f64, max_half: usize) -> Vec<f32> {
    if !radius.is_finite() || radius <= 0.0 || max_half == 0 {
        return vec![1.0];
    }
    let half = (3.0 * radius).ceil().min(max_half as f64) as i64;
    let denom = 2.0 * radius * radius;
    let weights: Vec<f64> = (-half..=half)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let sum: f64 = weights.iter().sum();
    weights.iter().map(|w| (w / sum) as f32).collect()
}

/// Blurs `src` into a new canvas. `src` is only read.
pub fn gaussian_blur(src: &Canvas, radius: f64) -> Canvas {
    let (width, height) = (src.width() as usize, src.height() as usize);
    if width == 0 || height == 0 {
        return src.clone();
    }
    // Taps past the far border only repeat border samples.
    let kernel = gaussian_kernel(radius, width.max(height));
    if kernel.len() == 1 {
        return src.clone();
    }

    let mut tmp = vec![0f32; width * height];
    horizontal_pass(src.pixels(), &mut tmp, width, &kernel);

    let mut dst = Canvas::new(src.width(), src.height());
    vertical_pass(&tmp, dst.pixels_mut(), width, height, &kernel);
    dst
}

fn horizontal_pass(src: &[u8], dst: &mut [f32], width: usize, kernel: &[f32]) {
    let half = (kernel.len() / 2) as i64;
    let last = width as i64 - 1;
    dst.par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(dst_row, src_row)| {
            for (x, out) in dst_row.iter_mut().enumerate() {
                let mut acc = 0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - half).clamp(0, last) as usize;
                    acc += w * src_row[sx] as f32;
                }
                *out = acc;
            }
        });
}

fn vertical_pass(src: &[f32], dst: &mut [u8], width: usize, height: usize, kernel: &[f32]) {
    let half = (kernel.len() / 2) as i64;
    let last = height as i64 - 1;
    dst.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, dst_row)| {
            for (x, out) in dst_row.iter_mut().enumerate() {
                let mut acc = 0f32;
                for (k, &w) in kernel.iter().enumerate() {
                    let sy = (y as i64 + k as i64 - half).clamp(0, last) as usize;
                    acc += w * src[sy * width + x];
                }
                *out = acc.round().clamp(0.0, 255.0) as u8;
            }
        });
}
