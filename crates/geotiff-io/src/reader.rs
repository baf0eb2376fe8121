//! GeoTIFF reading: raster properties and band data.

use crate::band::RasterBand;
use crate::chunks::{read_planes, supported_compression, Interleave};
use crate::error::{GeoTiffError, GeoTiffResult};
use crate::geokeys::{
    decode_crs, decode_epsg, parse_band_descriptions, parse_nodata, GDAL_METADATA, GDAL_NODATA,
    GEO_KEY_DIRECTORY, MODEL_PIXEL_SCALE, MODEL_TIEPOINT, MODEL_TRANSFORMATION,
};
use agro_common::{BoundingBox, CrsCode, GeoTransform};
use num_traits::NumCast;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::tags::Tag;
use tracing::{debug, warn};

/// How bands are laid out in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BandLayout {
    /// One image directory per band (IFD indices listed in band order)
    Pages(Vec<usize>),
    /// Several samples in the first image directory
    Samples {
        samples: usize,
        interleave: Interleave,
    },
}

/// Properties of a raster file.
#[derive(Debug, Clone, Serialize)]
pub struct RasterInfo {
    pub path: PathBuf,
    /// CRS when it is one this workspace can project
    pub crs: Option<CrsCode>,
    /// Raw EPSG code declared in the file
    pub epsg: Option<u32>,
    pub width: usize,
    pub height: usize,
    pub transform: GeoTransform,
    pub nodata: Option<f64>,
    /// Sample type name ("uint8", "float32", ...)
    pub dtype: String,
    /// Number of bands
    pub count: usize,
    /// Band descriptions in band order
    pub descriptions: Vec<Option<String>>,
    #[serde(skip)]
    layout: BandLayout,
}

impl RasterInfo {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// "EPSG:n", or "None" for files without a declared CRS.
    pub fn crs_string(&self) -> String {
        match self.epsg {
            Some(code) => format!("EPSG:{}", code),
            None => "None".to_string(),
        }
    }

    pub fn bounds(&self) -> BoundingBox {
        self.transform.bounds(self.width, self.height)
    }

    pub fn res(&self) -> (f64, f64) {
        self.transform.resolution()
    }

    /// Description of a 1-based band.
    pub fn description(&self, band: usize) -> Option<&str> {
        self.descriptions
            .get(band.checked_sub(1)?)
            .and_then(|d| d.as_deref())
    }

    /// 1-based index of the first band whose description contains `needle`
    /// (case-insensitive), or band 1 when none does.
    pub fn find_band(&self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.descriptions
            .iter()
            .position(|d| {
                d.as_deref()
                    .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .map(|i| i + 1)
            .unwrap_or(1)
    }
}

fn open(path: &Path) -> GeoTiffResult<Decoder<BufReader<File>>> {
    let file = File::open(path)?;
    let decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());
    Ok(decoder)
}

/// Read the properties of a GeoTIFF without decoding pixels.
pub fn read_info(path: impl AsRef<Path>) -> GeoTiffResult<RasterInfo> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    scan(&mut decoder, path)
}

/// Read a single 1-based band as `f32`.
pub fn read_band(path: impl AsRef<Path>, band: usize) -> GeoTiffResult<RasterBand> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let info = scan(&mut decoder, path)?;
    decode_band(&mut decoder, &info, band)
}

/// Read the properties and every band of a GeoTIFF.
pub fn read_all_bands(path: impl AsRef<Path>) -> GeoTiffResult<(RasterInfo, Vec<RasterBand>)> {
    let path = path.as_ref();
    let mut decoder = open(path)?;
    let info = scan(&mut decoder, path)?;

    let bands = match &info.layout {
        BandLayout::Samples { .. } => decode_samples(&mut decoder, &info)?
            .into_iter()
            .map(|data| RasterBand::new(data, info.width, info.height))
            .collect(),
        BandLayout::Pages(_) => (1..=info.count)
            .map(|band| decode_band(&mut decoder, &info, band))
            .collect::<GeoTiffResult<Vec<_>>>()?,
    };
    Ok((info, bands))
}

fn scan<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> GeoTiffResult<RasterInfo> {
    decoder.seek_to_image(0)?;
    let (width, height) = decoder.dimensions()?;
    let (width, height) = (width as usize, height as usize);

    let samples = decoder.get_tag_u32(Tag::SamplesPerPixel).unwrap_or(1) as usize;
    let interleave = Interleave::from_tag(decoder.get_tag_u32(Tag::PlanarConfiguration).unwrap_or(1));

    let bits = decoder
        .get_tag_u32_vec(Tag::BitsPerSample)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(8);
    let format = decoder
        .get_tag_u32_vec(Tag::SampleFormat)
        .ok()
        .and_then(|v| v.first().copied())
        .unwrap_or(1);
    let dtype = dtype_name(format, bits).to_string();

    let keys = decoder.get_tag_u16_vec(GEO_KEY_DIRECTORY).ok();
    let epsg = keys.as_deref().and_then(decode_epsg);
    let crs = keys.as_deref().and_then(decode_crs);
    if epsg.is_some() && crs.is_none() {
        debug!(path = %path.display(), epsg = ?epsg, "CRS is not supported for reprojection");
    }

    let transform = read_transform(decoder).unwrap_or_else(|| {
        warn!(path = %path.display(), "No georeferencing tags, using identity transform");
        GeoTransform::default()
    });

    let nodata = decoder
        .get_tag_ascii_string(GDAL_NODATA)
        .ok()
        .and_then(|s| parse_nodata(&s));

    let (layout, descriptions) = if samples > 1 {
        let descriptions = decoder
            .get_tag_ascii_string(GDAL_METADATA)
            .map(|xml| parse_band_descriptions(&xml, samples))
            .unwrap_or_else(|_| vec![None; samples]);
        (BandLayout::Samples { samples, interleave }, descriptions)
    } else {
        let mut pages = vec![0];
        let mut descriptions = vec![page_description(decoder)];
        let mut ifd = 0;
        while decoder.more_images() {
            decoder.next_image()?;
            ifd += 1;
            // Skip overviews and masks (reduced-resolution subfiles)
            let subfile = decoder.get_tag_u32(Tag::NewSubfileType).unwrap_or(0);
            let dims = decoder.dimensions()?;
            if subfile & 1 != 0 || dims != (width as u32, height as u32) {
                continue;
            }
            pages.push(ifd);
            descriptions.push(page_description(decoder));
        }
        (BandLayout::Pages(pages), descriptions)
    };

    let count = match &layout {
        BandLayout::Pages(pages) => pages.len(),
        BandLayout::Samples { samples, .. } => *samples,
    };

    Ok(RasterInfo {
        path: path.to_path_buf(),
        crs,
        epsg,
        width,
        height,
        transform,
        nodata,
        dtype,
        count,
        descriptions,
        layout,
    })
}

fn page_description<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<String> {
    if let Ok(xml) = decoder.get_tag_ascii_string(GDAL_METADATA) {
        if let Some(Some(d)) = parse_band_descriptions(&xml, 1).into_iter().next() {
            return Some(d);
        }
    }
    decoder
        .get_tag_ascii_string(Tag::ImageDescription)
        .ok()
        .map(|s| s.trim_end_matches('\0').to_string())
        .filter(|s| !s.is_empty())
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    if let (Ok(scale), Ok(tiepoint)) = (
        decoder.get_tag_f64_vec(MODEL_PIXEL_SCALE),
        decoder.get_tag_f64_vec(MODEL_TIEPOINT),
    ) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    let matrix = decoder.get_tag_f64_vec(MODEL_TRANSFORMATION).ok()?;
    if matrix.len() < 8 {
        return None;
    }
    Some(GeoTransform::from_gdal([
        matrix[3], matrix[0], matrix[1], matrix[7], matrix[4], matrix[5],
    ]))
}

fn decode_band<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    info: &RasterInfo,
    band: usize,
) -> GeoTiffResult<RasterBand> {
    if band == 0 || band > info.count {
        return Err(GeoTiffError::BandOutOfRange {
            band,
            count: info.count,
        });
    }

    match &info.layout {
        BandLayout::Pages(pages) => {
            let data = decode_current(decoder, pages[band - 1])?;
            check_len(&data, info.width * info.height)?;
            Ok(RasterBand::new(data, info.width, info.height))
        }
        BandLayout::Samples { .. } => {
            let data = decode_samples(decoder, info)?.swap_remove(band - 1);
            Ok(RasterBand::new(data, info.width, info.height))
        }
    }
}

/// One plane per sample of a multi-sample directory.
fn decode_samples<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    info: &RasterInfo,
) -> GeoTiffResult<Vec<Vec<f32>>> {
    let BandLayout::Samples { samples, interleave } = info.layout else {
        return Err(GeoTiffError::UnsupportedDataType(
            "raster stores one band per directory".to_string(),
        ));
    };

    decoder.seek_to_image(0)?;
    let compression = decoder.get_tag_u32(Tag::Compression).unwrap_or(1);
    if supported_compression(compression) || interleave == Interleave::Band {
        return read_planes(decoder, &info.path, info.width, info.height, samples, interleave);
    }

    // LZW and friends: `tiff` expands pixel-interleaved RGB(A) chunks itself
    let data = decode_current(decoder, 0)?;
    check_len(&data, info.width * info.height * samples)?;
    Ok(deinterleave(&data, samples, info.width, info.height)
        .into_iter()
        .map(|band| band.data)
        .collect())
}

fn decode_current<R: Read + Seek>(decoder: &mut Decoder<R>, ifd: usize) -> GeoTiffResult<Vec<f32>> {
    decoder.seek_to_image(ifd)?;
    let result = decoder.read_image()?;
    Ok(match result {
        DecodingResult::U8(buf) => cast_all(&buf),
        DecodingResult::U16(buf) => cast_all(&buf),
        DecodingResult::U32(buf) => cast_all(&buf),
        DecodingResult::U64(buf) => cast_all(&buf),
        DecodingResult::I8(buf) => cast_all(&buf),
        DecodingResult::I16(buf) => cast_all(&buf),
        DecodingResult::I32(buf) => cast_all(&buf),
        DecodingResult::I64(buf) => cast_all(&buf),
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => cast_all(&buf),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(GeoTiffError::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    })
}

fn cast_all<T: NumCast + Copy>(buf: &[T]) -> Vec<f32> {
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect()
}

fn deinterleave(data: &[f32], samples: usize, width: usize, height: usize) -> Vec<RasterBand> {
    (0..samples)
        .map(|s| {
            let values = data.iter().skip(s).step_by(samples).copied().collect();
            RasterBand::new(values, width, height)
        })
        .collect()
}

fn check_len(data: &[f32], expected: usize) -> GeoTiffResult<()> {
    if data.len() != expected {
        return Err(GeoTiffError::InvalidDimensions(format!(
            "decoded {} samples, expected {}",
            data.len(),
            expected
        )));
    }
    Ok(())
}

/// Sample type name as reported by GDAL/rasterio.
fn dtype_name(sample_format: u32, bits: u32) -> &'static str {
    match (sample_format, bits) {
        (1, 8) => "uint8",
        (1, 16) => "uint16",
        (1, 32) => "uint32",
        (1, 64) => "uint64",
        (2, 8) => "int8",
        (2, 16) => "int16",
        (2, 32) => "int32",
        (2, 64) => "int64",
        (3, 32) => "float32",
        (3, 64) => "float64",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_names() {
        assert_eq!(dtype_name(1, 8), "uint8");
        assert_eq!(dtype_name(3, 32), "float32");
        assert_eq!(dtype_name(2, 16), "int16");
        assert_eq!(dtype_name(9, 9), "unknown");
    }

    #[test]
    fn test_deinterleave() {
        let data = vec![1.0, 10.0, 2.0, 20.0, 3.0, 30.0, 4.0, 40.0];
        let bands = deinterleave(&data, 2, 2, 2);
        assert_eq!(bands[0].data, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bands[1].data, vec![10.0, 20.0, 30.0, 40.0]);
    }

    #[test]
    fn test_find_band_by_description() {
        let info = RasterInfo {
            path: PathBuf::from("x.tif"),
            crs: None,
            epsg: None,
            width: 1,
            height: 1,
            transform: GeoTransform::default(),
            nodata: None,
            dtype: "float32".to_string(),
            count: 3,
            descriptions: vec![Some("B4".into()), None, Some("ndvi_mean".into())],
            layout: BandLayout::Pages(vec![0, 1, 2]),
        };
        assert_eq!(info.find_band("NDVI"), 3);
        assert_eq!(info.find_band("EVI"), 1);
        assert_eq!(info.description(1), Some("B4"));
        assert_eq!(info.description(2), None);
        assert_eq!(info.crs_string(), "None");
    }
}
