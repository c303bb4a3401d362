//! Reading the triangle document and persisting canvases as 8-bit PNG.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, ImageEncoder};

use crate::core::{Canvas, MaskConfig, TileId, TriangleRecord};
use crate::error::{MaskError, MaskResult};

/// Records decoded from one exporter document.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    pub records: Vec<TriangleRecord>,
    /// Elements of the document that did not decode as a record.
    pub undecodable: u32,
}

/// Decodes a JSON array of triangle records.
///
/// The document itself must be an array; individual elements that fail to
/// decode are skipped and counted.
pub fn parse_records(text: &str, source: &Path) -> MaskResult<RecordBatch> {
    let values: Vec<serde_json::Value> =
        serde_json::from_str(text).map_err(|err| MaskError::Json {
            path: source.to_path_buf(),
            source: err,
        })?;

    let mut batch = RecordBatch {
        records: Vec::with_capacity(values.len()),
        undecodable: 0,
    };
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<TriangleRecord>(value) {
            Ok(record) => batch.records.push(record),
            Err(err) => {
                tracing::warn!(index, error = %err, "skipping undecodable triangle record");
                batch.undecodable += 1;
            }
        }
    }
    Ok(batch)
}

pub fn load_records(path: &Path) -> MaskResult<RecordBatch> {
    let text = fs::read_to_string(path).map_err(|err| MaskError::io(path, err))?;
    let batch = parse_records(&text, path)?;
    tracing::info!(
        path = %path.display(),
        records = batch.records.len(),
        undecodable = batch.undecodable,
        "loaded triangle records"
    );
    Ok(batch)
}

/// Reads a JSON configuration; missing fields take their defaults.
pub fn load_config(path: &Path) -> MaskResult<MaskConfig> {
    let text = fs::read_to_string(path).map_err(|err| MaskError::io(path, err))?;
    serde_json::from_str(&text).map_err(|err| MaskError::Json {
        path: path.to_path_buf(),
        source: err,
    })
}

/// Loads any decodable image as an 8-bit grayscale canvas.
pub fn load_canvas(path: &Path) -> MaskResult<Canvas> {
    let image = image::open(path).map_err(|err| MaskError::image(path, err))?;
    let gray = image.into_luma8();
    let (width, height) = gray.dimensions();
    Canvas::from_raw(width, height, gray.into_raw())
}

/// Writes `canvas` as a lossless 8-bit grayscale PNG.
///
/// The image is encoded to a sibling `.partial` file and renamed into place,
/// so `path` only ever holds a complete image.
pub fn save_canvas(path: &Path, canvas: &Canvas) -> MaskResult<()> {
    let partial = stage_canvas(path, canvas)?;
    commit_staged(&partial, path)
}

/// Encodes `canvas` next to `path` and returns the staged `.partial` path.
/// Nothing is left behind on failure.
pub(crate) fn stage_canvas(path: &Path, canvas: &Canvas) -> MaskResult<PathBuf> {
    let partial = partial_path(path);
    if let Err(err) = write_png_l8(&partial, canvas) {
        let _ = fs::remove_file(&partial);
        return Err(err);
    }
    Ok(partial)
}

/// Moves a staged file into its final place.
pub(crate) fn commit_staged(partial: &Path, path: &Path) -> MaskResult<()> {
    if let Err(err) = fs::rename(partial, path) {
        let _ = fs::remove_file(partial);
        return Err(MaskError::io(path, err));
    }
    tracing::debug!(path = %path.display(), "wrote canvas");
    Ok(())
}

fn write_png_l8(path: &Path, canvas: &Canvas) -> MaskResult<()> {
    let file = File::create(path).map_err(|err| MaskError::io(path, err))?;
    let mut writer = BufWriter::new(file);
    let encoder = PngEncoder::new_with_quality(
        &mut writer,
        CompressionType::Default,
        FilterType::Adaptive,
    );
    encoder
        .write_image(
            canvas.pixels(),
            canvas.width(),
            canvas.height(),
            ExtendedColorType::L8,
        )
        .map_err(|err| MaskError::image(path, err))?;
    writer.flush().map_err(|err| MaskError::io(path, err))?;
    Ok(())
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Output paths of one tile: `<prefix>_<udim>.png` and `<prefix>_<udim>_ramp.png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilePaths {
    pub raw: PathBuf,
    pub refined: PathBuf,
}

pub fn tile_paths(dir: &Path, prefix: &str, tile: TileId) -> TilePaths {
    let udim = tile.udim();
    TilePaths {
        raw: dir.join(format!("{prefix}_{udim}.png")),
        refined: dir.join(format!("{prefix}_{udim}_ramp.png")),
    }
}
