//! Loading imagery for classification.

use crate::error::{Result, RunnerError};
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tacmap_classify::{AnalysisConfig, AnalysisResult, ClassificationWorker, ImageData};
use tiff::decoder::{Decoder, DecodingResult};
use tiff::ColorType;
use tracing::{debug, info};

/// Decode an 8-bit gray, RGB or RGBA TIFF into RGBA pixels.
pub fn decode_image<R: Read + Seek>(reader: R) -> Result<ImageData> {
    let mut decoder = Decoder::new(reader)?;
    let (width, height) = decoder.dimensions()?;
    let color = decoder.colortype()?;

    let samples = match decoder.read_image()? {
        DecodingResult::U8(buf) => buf,
        _ => {
            return Err(RunnerError::UnsupportedImage(format!(
                "{color:?}: only 8-bit samples are supported"
            )))
        }
    };

    let image = match color {
        ColorType::RGBA(8) => ImageData::new(width, height, samples)?,
        ColorType::RGB(8) => ImageData::from_rgb(width, height, &samples)?,
        ColorType::Gray(8) => {
            let rgba = samples.iter().flat_map(|&v| [v, v, v, 255]).collect();
            ImageData::new(width, height, rgba)?
        }
        other => {
            return Err(RunnerError::UnsupportedImage(format!("{other:?}")));
        }
    };
    debug!(width, height, color = ?color, "decoded image");
    Ok(image)
}

/// Read a TIFF file from disk.
pub fn load_image(path: impl AsRef<Path>) -> Result<ImageData> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_image(Cursor::new(bytes))
}

/// Run one image through a dedicated classification worker.
///
/// Blocks until the worker answers; call from a blocking context.
pub fn classify_file(path: impl AsRef<Path>, config: AnalysisConfig) -> Result<AnalysisResult> {
    let path = path.as_ref();
    let image = load_image(path)?;

    let worker = ClassificationWorker::spawn()?;
    let result = worker.analyze(image, config)?;
    worker.shutdown()?;

    info!(
        path = %path.display(),
        sampled = result.stats.sampled,
        classified = result.stats.classified,
        coverage = result.stats.coverage_percent,
        "classified image"
    );
    Ok(result)
}
