use std::time::Instant;

use glam::{DVec2, I64Vec2};

use crate::core::{Canvas, MaskConfig, RasterStats, TileId, TriangleRecord};
use crate::router::{partition, RoutedTriangle};

/// The raw masks of both tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileCanvases {
    pub canvases: [Canvas; 2],
}

impl TileCanvases {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvases: [Canvas::new(width, height), Canvas::new(width, height)],
        }
    }

    pub fn tile(&self, tile: TileId) -> &Canvas {
        &self.canvases[tile.index()]
    }
}

/// Maps a tile-local UV to pixel space. `v = 1` is the top row.
pub fn uv_to_pixel(uv: DVec2, width: u32, height: u32) -> I64Vec2 {
    let max_x = width.saturating_sub(1) as f64;
    let max_y = height.saturating_sub(1) as f64;
    I64Vec2::new(
        (uv.x * max_x).round() as i64,
        ((1.0 - uv.y) * max_y).round() as i64,
    )
}

/// Twice the signed area of `(a, b, p)`; positive when `p` is left of `a -> b`.
///
/// Widened to `i128` so any coordinates within `±2^61` stay exact.
#[inline]
fn edge(a: I64Vec2, b: I64Vec2, p: I64Vec2) -> i128 {
    let (ax, ay) = (a.x as i128, a.y as i128);
    (b.x as i128 - ax) * (p.y as i128 - ay) - (b.y as i128 - ay) * (p.x as i128 - ax)
}

/// Fills every pixel inside or on the boundary of `pts` with `value`.
///
/// Returns `false` without touching the canvas when the triangle has zero
/// area. Parts of the triangle outside the canvas are clipped.
pub fn fill_triangle(canvas: &mut Canvas, pts: [I64Vec2; 3], value: u8) -> bool {
    let [p0, p1, p2] = pts;
    let area = edge(p0, p1, p2);
    if area == 0 {
        return false;
    }
    // Normalize winding so the inside test is always `>= 0`.
    let (p1, p2) = if area < 0 { (p2, p1) } else { (p1, p2) };

    let max_x = canvas.width() as i64 - 1;
    let max_y = canvas.height() as i64 - 1;
    let min = p0.min(p1).min(p2).max(I64Vec2::ZERO);
    let max = p0.max(p1).max(p2).min(I64Vec2::new(max_x, max_y));
    if min.x > max.x || min.y > max.y {
        return true;
    }

    for y in min.y..=max.y {
        for x in min.x..=max.x {
            let p = I64Vec2::new(x, y);
            if edge(p1, p2, p) >= 0 && edge(p2, p0, p) >= 0 && edge(p0, p1, p) >= 0 {
                canvas.set(x as u32, y as u32, value);
            }
        }
    }
    true
}

/// Draws routed triangles in order; later triangles overwrite earlier ones.
/// Returns the number of triangles skipped as degenerate.
pub fn draw_tile(canvas: &mut Canvas, triangles: &[RoutedTriangle]) -> u32 {
    let (width, height) = (canvas.width(), canvas.height());
    let mut degenerate = 0;
    for tri in triangles {
        let pts = tri.local_uvs.map(|uv| uv_to_pixel(uv, width, height));
        if !fill_triangle(canvas, pts, tri.density) {
            degenerate += 1;
        }
    }
    degenerate
}

/// Routes and rasterizes a batch into fresh raw canvases.
pub fn rasterize(records: &[TriangleRecord], config: &MaskConfig) -> (TileCanvases, RasterStats) {
    let start = Instant::now();
    let mut stats = RasterStats::default();
    let bins = partition(records, &mut stats);

    let mut canvases = TileCanvases::new(config.width, config.height);
    let [first, second] = &mut canvases.canvases;
    let (degenerate_first, degenerate_second) = rayon::join(
        || draw_tile(first, bins.tile(TileId::FIRST)),
        || draw_tile(second, bins.tile(TileId::SECOND)),
    );

    let degenerate = [degenerate_first, degenerate_second];
    for tile in TileId::ALL {
        stats.rasterized[tile.index()] = bins.tile(tile).len() as u32 - degenerate[tile.index()];
    }
    stats.skipped_degenerate = degenerate.iter().sum();

    tracing::info!(
        records = stats.records,
        tile_1001 = stats.rasterized[0],
        tile_1002 = stats.rasterized[1],
        skipped = stats.total_skipped(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "rasterized base density masks"
    );
    (canvases, stats)
}
