//! Tile routing for UV triangles.
//!
//! The tile of a triangle is the integer part of its first vertex's `u`.
//! All three vertices are shifted into that tile and must land inside
//! `[0, 1]`, bounds included: a vertex sitting exactly on the right seam
//! (`u_local == 1.0`) stays with the first vertex's tile. `v` must lie in
//! `[0, 1]` as well.

use glam::DVec2;

use crate::core::{RasterStats, TileId, TriangleRecord};

/// A triangle in tile-local UV space, ready to rasterize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutedTriangle {
    pub tile: TileId,
    pub density: u8,
    pub local_uvs: [DVec2; 3],
}

/// Why a record was not routed. All of these are silent skips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteReject {
    /// The record does not carry exactly three UV pairs.
    VertexCount(usize),
    /// A vertex falls outside the first vertex's tile, has `v` outside
    /// `[0, 1]`, or is not finite.
    OutOfTile,
    /// The tile offset is neither 0 nor 1.
    TileOutOfRange(i64),
}

impl RouteReject {
    pub fn count_in(self, stats: &mut RasterStats) {
        match self {
            RouteReject::VertexCount(_) => stats.skipped_vertex_count += 1,
            RouteReject::OutOfTile => stats.skipped_out_of_tile += 1,
            RouteReject::TileOutOfRange(_) => stats.skipped_tile += 1,
        }
    }
}

pub fn route(record: &TriangleRecord) -> Result<RoutedTriangle, RouteReject> {
    if record.uvs.len() != 3 {
        return Err(RouteReject::VertexCount(record.uvs.len()));
    }
    let uvs = [
        DVec2::from(record.uvs[0]),
        DVec2::from(record.uvs[1]),
        DVec2::from(record.uvs[2]),
    ];
    if uvs.iter().any(|uv| !uv.is_finite()) {
        return Err(RouteReject::OutOfTile);
    }

    let tile_offset = uvs[0].x.floor();
    let mut local_uvs = [DVec2::ZERO; 3];
    for (local, uv) in local_uvs.iter_mut().zip(uvs.iter()) {
        let u_local = uv.x - tile_offset;
        if !(0.0..=1.0).contains(&u_local) || !(0.0..=1.0).contains(&uv.y) {
            return Err(RouteReject::OutOfTile);
        }
        *local = DVec2::new(u_local, uv.y);
    }

    // Far-out offsets saturate in the cast and are rejected below.
    let tile_index = tile_offset as i64;
    let tile = TileId::from_index(tile_index).ok_or(RouteReject::TileOutOfRange(tile_index))?;

    Ok(RoutedTriangle {
        tile,
        density: record.density,
        local_uvs,
    })
}

/// Routed triangles grouped per tile, each list in input order.
#[derive(Debug, Clone, Default)]
pub struct TileBins {
    pub bins: [Vec<RoutedTriangle>; 2],
}

impl TileBins {
    pub fn tile(&self, tile: TileId) -> &[RoutedTriangle] {
        &self.bins[tile.index()]
    }

    pub fn len(&self) -> usize {
        self.bins.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Routes every record, counting rejects in `stats`.
pub fn partition(records: &[TriangleRecord], stats: &mut RasterStats) -> TileBins {
    let mut bins = TileBins::default();
    for (index, record) in records.iter().enumerate() {
        stats.records += 1;
        match route(record) {
            Ok(tri) => bins.bins[tri.tile.index()].push(tri),
            Err(reject) => {
                tracing::trace!(index, region = %record.region, ?reject, "skipping triangle");
                reject.count_in(stats);
            }
        }
    }
    bins
}
