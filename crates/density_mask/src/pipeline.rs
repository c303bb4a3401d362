use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::blur::gaussian_blur;
use crate::core::{Canvas, MaskConfig, RasterStats, TileId, TriangleRecord};
use crate::error::{MaskError, MaskResult};
use crate::io::{commit_staged, stage_canvas, tile_paths, RecordBatch};
use crate::raster::rasterize;
use crate::refine::refine;

/// Raw and refined masks of one tile.
#[derive(Debug, Clone)]
pub struct TileOutput {
    pub tile: TileId,
    pub raw: Canvas,
    pub refined: Canvas,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tiles: [TileOutput; 2],
    pub stats: RasterStats,
}

impl PipelineOutput {
    pub fn tile(&self, tile: TileId) -> &TileOutput {
        &self.tiles[tile.index()]
    }

    /// Writes the four PNGs into `dir` and returns their paths, raw first.
    ///
    /// All four images are encoded to `.partial` files before any of them is
    /// renamed into place, so a failed encode leaves no output behind.
    pub fn write(&self, dir: &Path, prefix: &str) -> MaskResult<Vec<PathBuf>> {
        fs::create_dir_all(dir).map_err(|err| MaskError::io(dir, err))?;
        let mut targets: Vec<(PathBuf, &Canvas)> = Vec::with_capacity(4);
        for output in &self.tiles {
            targets.push((tile_paths(dir, prefix, output.tile).raw, &output.raw));
        }
        for output in &self.tiles {
            targets.push((tile_paths(dir, prefix, output.tile).refined, &output.refined));
        }

        let mut staged = Vec::with_capacity(targets.len());
        for (path, canvas) in &targets {
            match stage_canvas(path, canvas) {
                Ok(partial) => staged.push(partial),
                Err(err) => {
                    discard(&staged);
                    return Err(err);
                }
            }
        }
        for (index, ((path, _), partial)) in targets.iter().zip(&staged).enumerate() {
            if let Err(err) = commit_staged(partial, path) {
                discard(&staged[index + 1..]);
                return Err(err);
            }
        }

        let written: Vec<PathBuf> = targets.into_iter().map(|(path, _)| path).collect();
        tracing::info!(dir = %dir.display(), files = written.len(), "wrote density masks");
        Ok(written)
    }
}

fn discard(staged: &[PathBuf]) {
    for partial in staged {
        let _ = fs::remove_file(partial);
    }
}

/// Validated configuration bound to the rasterize -> refine -> blur chain.
#[derive(Debug, Clone)]
pub struct DensityMaskPipeline {
    config: MaskConfig,
}

impl DensityMaskPipeline {
    pub fn new(config: MaskConfig) -> MaskResult<Self> {
        config.validate().map_err(MaskError::Config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &MaskConfig {
        &self.config
    }

    /// Refines and blurs one raw mask into a new canvas.
    pub fn refine_tile(&self, raw: &Canvas) -> Canvas {
        let noise = &self.config.noise;
        let refined = refine(raw, noise, self.config.layers);
        gaussian_blur(&refined, noise.blur_radius)
    }

    pub fn run(&self, records: &[TriangleRecord]) -> PipelineOutput {
        let start = Instant::now();
        let (canvases, stats) = rasterize(records, &self.config);
        let [raw_first, raw_second] = canvases.canvases;

        let (refined_first, refined_second) = rayon::join(
            || self.refine_tile(&raw_first),
            || self.refine_tile(&raw_second),
        );

        tracing::info!(
            width = self.config.width,
            height = self.config.height,
            elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
            "procedural refinement completed"
        );

        PipelineOutput {
            tiles: [
                TileOutput {
                    tile: TileId::FIRST,
                    raw: raw_first,
                    refined: refined_first,
                },
                TileOutput {
                    tile: TileId::SECOND,
                    raw: raw_second,
                    refined: refined_second,
                },
            ],
            stats,
        }
    }

    /// Runs a decoded document, folding its undecodable count into the stats.
    pub fn run_batch(&self, batch: &RecordBatch) -> PipelineOutput {
        let mut output = self.run(&batch.records);
        output.stats.skipped_undecodable += batch.undecodable;
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::RefineLayers;
    use crate::io::load_canvas;
    use crate::raster::uv_to_pixel;
    use glam::DVec2;
    use tempfile::tempdir;

    fn config(size: u32) -> MaskConfig {
        MaskConfig::with_size(size, size)
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(matches!(
            DensityMaskPipeline::new(MaskConfig::with_size(0, 64)),
            Err(MaskError::Config(_))
        ));
        let mut bad = config(64);
        bad.noise.blur_radius = -4.0;
        assert!(DensityMaskPipeline::new(bad).is_err());
    }

    #[test]
    fn single_triangle_fills_first_tile_only() {
        let size = 101;
        let pipeline = DensityMaskPipeline::new(config(size)).expect("pipeline");
        let records = vec![TriangleRecord::new(
            "density_body",
            200,
            vec![[0.1, 0.1], [0.5, 0.1], [0.1, 0.5]],
        )];
        let output = pipeline.run(&records);
        let raw = &output.tile(TileId::FIRST).raw;

        // Legs of 40 pixels from (10, 90): 41 + 40 + ... + 1 samples.
        assert_eq!(uv_to_pixel(DVec2::new(0.1, 0.1), size, size).to_array(), [10, 90]);
        assert_eq!(raw.coverage(), 41 * 42 / 2);
        assert_eq!(raw.get(20, 80), 200);
        assert_eq!(raw.get(10, 90), 200);
        assert_eq!(raw.get(60, 20), 0);
        assert!(raw.pixels().iter().all(|&p| p == 0 || p == 200));
        assert_eq!(output.tile(TileId::SECOND).raw.coverage(), 0);
        assert_eq!(output.tile(TileId::SECOND).refined.coverage(), 0);
        assert_eq!(output.stats.rasterized, [1, 0]);
    }

    #[test]
    fn triangle_past_one_routes_to_second_tile() {
        let pipeline = DensityMaskPipeline::new(config(101)).expect("pipeline");
        let shifted = vec![TriangleRecord::new(
            "density_leg",
            30,
            vec![[1.2, 0.1], [1.6, 0.1], [1.2, 0.5]],
        )];
        let local = vec![TriangleRecord::new(
            "density_leg",
            30,
            vec![[0.2, 0.1], [0.6, 0.1], [0.2, 0.5]],
        )];
        let shifted_out = pipeline.run(&shifted);
        let local_out = pipeline.run(&local);
        assert_eq!(shifted_out.tile(TileId::FIRST).raw.coverage(), 0);
        assert_eq!(
            shifted_out.tile(TileId::SECOND).raw,
            local_out.tile(TileId::FIRST).raw
        );
    }

    #[test]
    fn short_record_is_skipped_and_batch_continues() {
        let pipeline = DensityMaskPipeline::new(config(64)).expect("pipeline");
        let valid = TriangleRecord::new("density_body", 255, vec![[0.1, 0.1], [0.9, 0.1], [0.1, 0.9]]);
        let short = TriangleRecord::new("density_head", 30, vec![[0.2, 0.2], [0.4, 0.4]]);

        let with_short = pipeline.run(&[short, valid.clone()]);
        let without = pipeline.run(&[valid]);
        assert_eq!(with_short.stats.skipped_vertex_count, 1);
        assert_eq!(with_short.stats.rasterized, [1, 0]);
        for tile in TileId::ALL {
            assert_eq!(with_short.tile(tile).raw, without.tile(tile).raw);
            assert_eq!(with_short.tile(tile).refined, without.tile(tile).refined);
        }
    }

    #[test]
    fn refined_mask_stays_inside_raw_support_without_blur() {
        let mut cfg = config(64);
        cfg.noise.blur_radius = 0.0;
        let pipeline = DensityMaskPipeline::new(cfg).expect("pipeline");
        let records = vec![TriangleRecord::new(
            "density_body",
            255,
            vec![[0.0, 1.0], [1.0, 1.0], [0.5, 0.0]],
        )];
        let output = pipeline.run(&records);
        let tile = output.tile(TileId::FIRST);
        for (raw, refined) in tile.raw.pixels().iter().zip(tile.refined.pixels()) {
            if *raw == 0 {
                assert_eq!(*refined, 0);
            }
        }
        // Bottom of the triangle is UV distance 1 from the anchor.
        assert!(tile.refined.get(32, 0) > tile.refined.get(32, 60));
    }

    #[test]
    fn disabled_layers_and_blur_reproduce_raw() {
        let mut cfg = config(32);
        cfg.layers = RefineLayers::none();
        cfg.noise.blur_radius = 0.0;
        let pipeline = DensityMaskPipeline::new(cfg).expect("pipeline");
        let records = vec![TriangleRecord::new("a", 123, vec![[0.1, 0.1], [0.9, 0.2], [0.4, 0.8]])];
        let output = pipeline.run(&records);
        let tile = output.tile(TileId::FIRST);
        assert_eq!(tile.raw, tile.refined);
    }

    #[test]
    fn run_is_deterministic() {
        let pipeline = DensityMaskPipeline::new(config(48)).expect("pipeline");
        let records = vec![
            TriangleRecord::new("a", 255, vec![[0.05, 0.05], [0.95, 0.1], [0.5, 0.95]]),
            TriangleRecord::new("b", 90, vec![[1.1, 0.2], [1.8, 0.3], [1.4, 0.9]]),
        ];
        let a = pipeline.run(&records);
        let b = pipeline.run(&records);
        for tile in TileId::ALL {
            assert_eq!(a.tile(tile).refined, b.tile(tile).refined);
        }
    }

    #[test]
    fn refined_pixels_are_pinned() {
        let mut cfg = config(33);
        cfg.noise.blur_radius = 0.0;
        let pipeline = DensityMaskPipeline::new(cfg).expect("pipeline");
        let records = vec![
            TriangleRecord::new("lower", 255, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]),
            TriangleRecord::new("upper", 255, vec![[0.0, 0.0], [1.0, 1.0], [0.0, 1.0]]),
        ];
        let output = pipeline.run(&records);
        let tile = output.tile(TileId::FIRST);
        assert!(tile.raw.pixels().iter().all(|&p| p == 255));
        assert_eq!(tile.refined.get(16, 0), 234);
        assert_eq!(tile.refined.get(10, 8), 191);
        assert_eq!(tile.refined.get(20, 12), 144);
        assert_eq!(tile.refined.get(5, 5), 159);
    }

    #[test]
    fn writes_four_outputs_that_round_trip() {
        let dir = tempdir().expect("tempdir");
        let pipeline = DensityMaskPipeline::new(config(40)).expect("pipeline");
        let records = vec![
            TriangleRecord::new("a", 200, vec![[0.1, 0.1], [0.5, 0.1], [0.1, 0.5]]),
            TriangleRecord::new("b", 30, vec![[1.3, 0.6], [1.9, 0.6], [1.3, 0.95]]),
        ];
        let output = pipeline.run(&records);
        let written = output.write(dir.path(), "horse_density").expect("write");
        let names: Vec<String> = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "horse_density_1001.png",
                "horse_density_1002.png",
                "horse_density_1001_ramp.png",
                "horse_density_1002_ramp.png",
            ]
        );
        for tile in TileId::ALL {
            let paths = tile_paths(dir.path(), "horse_density", tile);
            assert_eq!(load_canvas(&paths.raw).expect("raw"), output.tile(tile).raw);
            assert_eq!(
                load_canvas(&paths.refined).expect("refined"),
                output.tile(tile).refined
            );
        }
    }

    #[test]
    fn failed_encode_leaves_no_outputs() {
        let dir = tempdir().expect("tempdir");
        let pipeline = DensityMaskPipeline::new(config(24)).expect("pipeline");
        let records = vec![TriangleRecord::new("a", 200, vec![[0.1, 0.1], [0.5, 0.1], [0.1, 0.5]])];
        let output = pipeline.run(&records);

        // A directory squatting on the last staging path makes that encode fail.
        let blocker = dir.path().join("horse_density_1002_ramp.png.partial");
        fs::create_dir(&blocker).expect("blocker");

        let err = output.write(dir.path(), "horse_density").unwrap_err();
        assert!(matches!(err, MaskError::Io { .. }));
        let left: Vec<PathBuf> = fs::read_dir(dir.path())
            .expect("read_dir")
            .map(|entry| entry.expect("entry").path())
            .collect();
        assert_eq!(left, vec![blocker]);
    }
}
