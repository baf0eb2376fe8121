//! GeoTIFF writing.
//!
//! Multi-band rasters are written with one image directory per band. Every
//! directory carries the full georeference, the nodata value and the band
//! name in ImageDescription, so each band is a valid single-band GeoTIFF on
//! its own.

use crate::band::RasterBand;
use crate::error::{GeoTiffError, GeoTiffResult};
use crate::geokeys::{encode_geokeys, format_nodata, GDAL_NODATA, GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT};
use agro_common::{CrsCode, GeoTransform};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use tiff::encoder::colortype::{ColorType, Gray32Float, Gray8};
use tiff::encoder::compression::{Compression, Lzw, Uncompressed};
use tiff::encoder::{TiffEncoder, TiffValue};
use tiff::tags::Tag;
use tracing::debug;

/// Sample type written to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelType {
    #[default]
    Float32,
    /// Values are rounded and clamped to 0..=255; NaN becomes the nodata
    /// value, or 0 without one.
    UInt8,
}

/// Writer configuration shared by every band of a file.
#[derive(Debug, Clone)]
pub struct GeoTiffWriter {
    pub transform: GeoTransform,
    pub crs: CrsCode,
    pub nodata: Option<f64>,
    pub pixel_type: PixelType,
    pub compress: bool,
}

impl GeoTiffWriter {
    /// Float32, LZW-compressed writer without a nodata value.
    pub fn new(transform: GeoTransform, crs: CrsCode) -> Self {
        Self {
            transform,
            crs,
            nodata: None,
            pixel_type: PixelType::Float32,
            compress: true,
        }
    }

    pub fn with_nodata(mut self, nodata: f64) -> Self {
        self.nodata = Some(nodata);
        self
    }

    pub fn with_pixel_type(mut self, pixel_type: PixelType) -> Self {
        self.pixel_type = pixel_type;
        self
    }

    pub fn uncompressed(mut self) -> Self {
        self.compress = false;
        self
    }

    /// Write named bands to `path`. All bands must share one size.
    pub fn write(&self, path: impl AsRef<Path>, bands: &[(&str, &RasterBand)]) -> GeoTiffResult<()> {
        let path = path.as_ref();
        let Some((_, first)) = bands.first() else {
            return Err(GeoTiffError::InvalidDimensions("no bands to write".to_string()));
        };
        let (width, height) = (first.width, first.height);
        if let Some((name, band)) = bands
            .iter()
            .find(|(_, b)| b.width != width || b.height != height)
        {
            return Err(GeoTiffError::InvalidDimensions(format!(
                "band '{}' is {}x{}, expected {}x{}",
                name, band.width, band.height, width, height
            )));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = BufWriter::new(File::create(path)?);
        let mut encoder = TiffEncoder::new(file).map_err(encode_err)?;

        for (name, band) in bands {
            match (self.pixel_type, self.compress) {
                (PixelType::Float32, true) => {
                    self.write_page::<_, Gray32Float, _>(&mut encoder, name, band, Lzw::default(), &band.data)?
                }
                (PixelType::Float32, false) => {
                    self.write_page::<_, Gray32Float, _>(&mut encoder, name, band, Uncompressed, &band.data)?
                }
                (PixelType::UInt8, compress) => {
                    let bytes = self.to_u8(band);
                    if compress {
                        self.write_page::<_, Gray8, _>(&mut encoder, name, band, Lzw::default(), &bytes)?
                    } else {
                        self.write_page::<_, Gray8, _>(&mut encoder, name, band, Uncompressed, &bytes)?
                    }
                }
            }
        }

        debug!(
            path = %path.display(),
            bands = bands.len(),
            width = width,
            height = height,
            "Wrote GeoTIFF"
        );
        Ok(())
    }

    fn write_page<W, C, D>(
        &self,
        encoder: &mut TiffEncoder<W>,
        name: &str,
        band: &RasterBand,
        compression: D,
        data: &[C::Inner],
    ) -> GeoTiffResult<()>
    where
        W: Write + Seek,
        C: ColorType,
        D: Compression,
        [C::Inner]: TiffValue,
    {
        let mut image = encoder
            .new_image_with_compression::<C, D>(band.width as u32, band.height as u32, compression)
            .map_err(encode_err)?;

        let gt = &self.transform;
        let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        let geokeys = encode_geokeys(self.crs);

        let dir = image.encoder();
        dir.write_tag(MODEL_PIXEL_SCALE, &scale[..]).map_err(encode_err)?;
        dir.write_tag(MODEL_TIEPOINT, &tiepoint[..]).map_err(encode_err)?;
        dir.write_tag(GEO_KEY_DIRECTORY, geokeys.as_slice())
            .map_err(encode_err)?;
        if let Some(nodata) = self.nodata {
            dir.write_tag(GDAL_NODATA, format_nodata(nodata).as_str())
                .map_err(encode_err)?;
        }
        if !name.is_empty() {
            dir.write_tag(Tag::ImageDescription, name).map_err(encode_err)?;
        }

        image.write_data(data).map_err(encode_err)?;
        Ok(())
    }

    fn to_u8(&self, band: &RasterBand) -> Vec<u8> {
        let fill = self
            .nodata
            .filter(|v| !v.is_nan())
            .map(|v| v.clamp(0.0, 255.0) as u8)
            .unwrap_or(0);
        band.data
            .iter()
            .map(|v| {
                if v.is_nan() {
                    fill
                } else {
                    v.round().clamp(0.0, 255.0) as u8
                }
            })
            .collect()
    }
}

fn encode_err(err: tiff::TiffError) -> GeoTiffError {
    GeoTiffError::Encode(err.to_string())
}

/// Write the "Banda i: name" listing that accompanies multi-band outputs.
pub fn write_band_names(path: impl AsRef<Path>, names: &[String]) -> std::io::Result<()> {
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        out.push_str(&format!("Banda {}: {}\n", i + 1, name));
    }
    std::fs::write(path, out)
}
