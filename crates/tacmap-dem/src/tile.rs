//! Decoded raster tiles.

use crate::bounds::{Bounds, METERS_PER_DEGREE};
use crate::{Result, TerrainError};
use std::io::Cursor;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;

/// GDAL_NODATA, stored as an ASCII string.
const GDAL_NODATA_TAG: u16 = 42113;

/// Decoding buffer limit. Provincial vegetation rasters reach several
/// thousand pixels per side.
const DECODE_LIMIT_BYTES: usize = 1024 * 1024 * 1024;

/// A single-band raster tile.
///
/// Immutable once decoded; shared between callers through `Arc`.
#[derive(Debug, Clone)]
pub struct RasterTile {
    /// Samples in row-major order (north to south, west to east).
    data: Vec<f32>,
    width: u32,
    height: u32,
    bounds: Bounds,
    /// Samples equal to this are treated as missing.
    no_data: Option<f32>,
    /// Stored values are divided by this to get physical values.
    scale_factor: f64,
}

impl RasterTile {
    /// Build a tile from raw samples.
    pub fn from_raw(width: u32, height: u32, bounds: Bounds, data: Vec<f32>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(TerrainError::InvalidRaster(format!(
                "empty raster {width}x{height}"
            )));
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(TerrainError::InvalidRaster(format!(
                "{width}x{height} raster needs {expected} samples, got {}",
                data.len()
            )));
        }
        if !bounds.is_valid() {
            return Err(TerrainError::InvalidRaster(format!(
                "invalid bounds {bounds:?}"
            )));
        }

        Ok(Self {
            data,
            width,
            height,
            bounds,
            no_data: None,
            scale_factor: 1.0,
        })
    }

    /// Decode a single-band GeoTIFF from memory, placing it at `bounds`.
    ///
    /// The no-data value is read from the GDAL_NODATA tag when present.
    pub fn from_tiff_bytes(bytes: &[u8], bounds: Bounds) -> Result<Self> {
        let mut limits = Limits::default();
        limits.decoding_buffer_size = DECODE_LIMIT_BYTES;
        limits.intermediate_buffer_size = DECODE_LIMIT_BYTES;
        limits.ifd_value_size = DECODE_LIMIT_BYTES;
        let mut decoder = Decoder::new(Cursor::new(bytes))?.with_limits(limits);

        let (width, height) = decoder.dimensions()?;
        let no_data = Self::read_nodata_value(&mut decoder);
        let data = Self::decode_samples(&mut decoder)?;

        if data.len() != width as usize * height as usize {
            return Err(TerrainError::UnsupportedDataType(format!(
                "{} samples for a {width}x{height} image; only single-band rasters are supported",
                data.len()
            )));
        }

        let mut tile = Self::from_raw(width, height, bounds, data)?;
        tile.no_data = no_data;
        Ok(tile)
    }

    /// Set the no-data value.
    pub fn with_no_data(mut self, no_data: Option<f32>) -> Self {
        self.no_data = no_data;
        self
    }

    /// Set the scale factor. Zero and non-finite values are ignored.
    pub fn with_scale_factor(mut self, scale_factor: f64) -> Self {
        if scale_factor != 0.0 && scale_factor.is_finite() {
            self.scale_factor = scale_factor;
        }
        self
    }

    fn decode_samples<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
        let result = decoder.read_image()?;

        match result {
            DecodingResult::F32(data) => Ok(data),
            DecodingResult::F64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U16(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U32(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I8(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::U64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
            DecodingResult::I64(data) => Ok(data.into_iter().map(|v| v as f32).collect()),
        }
    }

    fn read_nodata_value<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f32> {
        decoder
            .get_tag_ascii_string(Tag::Unknown(GDAL_NODATA_TAG))
            .ok()
            .and_then(|s| s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).parse().ok())
    }

    /// Pixel containing the coordinate.
    ///
    /// Points on the east or south edge map to the last column or row.
    /// `None` outside the bounds.
    pub fn pixel_at(&self, lat: f64, lon: f64) -> Option<(u32, u32)> {
        if !self.bounds.contains(lat, lon) {
            return None;
        }
        let x = ((lon - self.bounds.west) / self.bounds.width()) * self.width as f64;
        let y = ((self.bounds.north - lat) / self.bounds.height()) * self.height as f64;
        if !x.is_finite() || !y.is_finite() {
            // Degenerate bounds collapse to the first pixel.
            return Some((0, 0));
        }
        let px = (x.floor() as u32).min(self.width - 1);
        let py = (y.floor() as u32).min(self.height - 1);
        Some((px, py))
    }

    /// Stored sample at a pixel, `None` when missing.
    pub fn raw_pixel(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let value = *self.data.get(y as usize * self.width as usize + x as usize)?;
        if value.is_nan() {
            return None;
        }
        if let Some(nodata) = self.no_data {
            if (value - nodata).abs() < 0.001 {
                return None;
            }
        }
        Some(value)
    }

    /// Stored sample at a coordinate, nearest pixel.
    pub fn raw_value(&self, lat: f64, lon: f64) -> Option<f32> {
        let (x, y) = self.pixel_at(lat, lon)?;
        self.raw_pixel(x, y)
    }

    /// Physical value (stored value divided by the scale factor) at a
    /// coordinate, nearest pixel.
    ///
    /// `None` outside the tile or on missing data.
    pub fn sample_value(&self, lat: f64, lon: f64) -> Option<f64> {
        self.raw_value(lat, lon)
            .map(|v| v as f64 / self.scale_factor)
    }

    /// Physical value bilinearly interpolated between the four surrounding
    /// pixels, treating pixel (0,0) as the north-west corner and the last
    /// pixel as the south-east corner.
    ///
    /// `None` outside the tile or when any of the four pixels is missing.
    pub fn sample_bilinear(&self, lat: f64, lon: f64) -> Option<f64> {
        if !self.bounds.contains(lat, lon) {
            return None;
        }

        let x = ((lon - self.bounds.west) / self.bounds.width()) * (self.width - 1) as f64;
        let y = ((self.bounds.north - lat) / self.bounds.height()) * (self.height - 1) as f64;
        let x = if x.is_finite() { x } else { 0.0 };
        let y = if y.is_finite() { y } else { 0.0 };

        let x0 = (x.floor() as u32).min(self.width - 1);
        let y0 = (y.floor() as u32).min(self.height - 1);
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);

        let fx = x - x0 as f64;
        let fy = y - y0 as f64;

        let v00 = self.raw_pixel(x0, y0)? as f64;
        let v10 = self.raw_pixel(x1, y0)? as f64;
        let v01 = self.raw_pixel(x0, y1)? as f64;
        let v11 = self.raw_pixel(x1, y1)? as f64;

        let value = v00 * (1.0 - fx) * (1.0 - fy)
            + v10 * fx * (1.0 - fy)
            + v01 * (1.0 - fx) * fy
            + v11 * fx * fy;

        Some(value / self.scale_factor)
    }

    /// Terrain slope in percent (rise over run times 100) at a coordinate.
    ///
    /// Uses central differences one pixel either side, falling back to a
    /// one-sided difference at the tile edge.
    pub fn slope_percent(&self, lat: f64, lon: f64) -> Option<f64> {
        let (dlon, dlat) = self.resolution();
        let center = self.sample_bilinear(lat, lon)?;

        let gradient = |before: Option<f64>, after: Option<f64>, step_m: f64| -> Option<f64> {
            match (before, after) {
                (Some(b), Some(a)) => Some((a - b) / (2.0 * step_m)),
                (Some(b), None) => Some((center - b) / step_m),
                (None, Some(a)) => Some((a - center) / step_m),
                (None, None) => None,
            }
        };

        let step_y = dlat * METERS_PER_DEGREE;
        let step_x = dlon * METERS_PER_DEGREE * lat.to_radians().cos();
        if step_x <= 0.0 || step_y <= 0.0 {
            return None;
        }

        let gy = gradient(
            self.sample_bilinear(lat - dlat, lon),
            self.sample_bilinear(lat + dlat, lon),
            step_y,
        )
        .unwrap_or(0.0);
        let gx = gradient(
            self.sample_bilinear(lat, lon - dlon),
            self.sample_bilinear(lat, lon + dlon),
            step_x,
        )
        .unwrap_or(0.0);

        Some(gx.hypot(gy) * 100.0)
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Dimensions in pixels.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Degrees per pixel as `(lon, lat)`.
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.width as f64,
            self.bounds.height() / self.height as f64,
        )
    }

    pub fn no_data(&self) -> Option<f32> {
        self.no_data
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }
}
