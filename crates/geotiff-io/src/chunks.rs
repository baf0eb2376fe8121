//! Sample-level decoding of multi-sample images.
//!
//! `tiff` only expands multi-sample chunks for RGB/CMYK photometrics and
//! reads just the first plane of band-interleaved files. Multispectral
//! scenes are greyscale with many samples, pixel- or band-interleaved, so
//! their strips and tiles are decoded here.

use crate::error::{GeoTiffError, GeoTiffResult};
use flate2::read::ZlibDecoder;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use tiff::decoder::Decoder;
use tiff::tags::Tag;

const COMPRESSION_NONE: u32 = 1;
const COMPRESSION_DEFLATE: u32 = 8;
const COMPRESSION_ADOBE_DEFLATE: u32 = 32946;

/// How samples are arranged in chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Interleave {
    /// PlanarConfiguration=1: every chunk holds all samples of a pixel
    Pixel,
    /// PlanarConfiguration=2: one run of chunks per sample
    Band,
}

impl Interleave {
    pub(crate) fn from_tag(planar: u32) -> Self {
        if planar == 2 {
            Interleave::Band
        } else {
            Interleave::Pixel
        }
    }
}

/// Strip or tile grid of the first image directory.
#[derive(Debug, Clone)]
struct ChunkGrid {
    offsets: Vec<u64>,
    byte_counts: Vec<u64>,
    chunk_width: usize,
    chunk_height: usize,
    /// Strips store only the rows inside the image; tiles are padded
    tiled: bool,
}

#[derive(Debug, Clone, Copy)]
struct SampleType {
    format: u32,
    bytes: usize,
    little_endian: bool,
}

/// Whether chunks of this directory can be decoded here.
pub(crate) fn supported_compression(compression: u32) -> bool {
    matches!(
        compression,
        COMPRESSION_NONE | COMPRESSION_DEFLATE | COMPRESSION_ADOBE_DEFLATE
    )
}

/// Decode every sample of the first image directory into one `f32` plane
/// per sample.
pub(crate) fn read_planes<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
    width: usize,
    height: usize,
    samples: usize,
    interleave: Interleave,
) -> GeoTiffResult<Vec<Vec<f32>>> {
    decoder.seek_to_image(0)?;
    if width == 0 || height == 0 {
        return Ok(vec![Vec::new(); samples]);
    }

    let compression = decoder.get_tag_u32(Tag::Compression).unwrap_or(COMPRESSION_NONE);
    if !supported_compression(compression) {
        return Err(GeoTiffError::UnsupportedDataType(format!(
            "compression {} for a {}-sample image",
            compression, samples
        )));
    }
    let predictor = decoder.get_tag_u32(Tag::Predictor).unwrap_or(1);
    if predictor != 1 {
        return Err(GeoTiffError::UnsupportedDataType(format!(
            "predictor {} for a {}-sample image",
            predictor, samples
        )));
    }

    let grid = chunk_grid(decoder, width, height)?;
    let mut file = BufReader::new(File::open(path)?);
    let sample_type = sample_type(decoder, &mut file)?;

    let across = width.div_ceil(grid.chunk_width);
    let down = height.div_ceil(grid.chunk_height);
    let per_plane = across * down;
    let (planes, chunk_samples) = match interleave {
        Interleave::Pixel => (1, samples),
        Interleave::Band => (samples, 1),
    };
    if grid.offsets.len() < per_plane * planes || grid.byte_counts.len() < grid.offsets.len() {
        return Err(GeoTiffError::Decode(format!(
            "{} chunks for a {}x{} grid of {} plane(s)",
            grid.offsets.len(),
            across,
            down,
            planes
        )));
    }

    let mut out = vec![vec![f32::NAN; width * height]; samples];
    for plane in 0..planes {
        for chunk in 0..per_plane {
            let index = plane * per_plane + chunk;
            let raw = read_chunk(&mut file, grid.offsets[index], grid.byte_counts[index], compression)?;

            let x0 = (chunk % across) * grid.chunk_width;
            let y0 = (chunk / across) * grid.chunk_height;
            let cols = grid.chunk_width.min(width - x0);
            let rows = grid.chunk_height.min(height - y0);
            let stride = if grid.tiled { grid.chunk_width } else { cols };

            let needed = (rows - 1) * stride * chunk_samples + cols * chunk_samples;
            if raw.len() < needed * sample_type.bytes {
                return Err(GeoTiffError::Decode(format!(
                    "chunk {} holds {} bytes, expected at least {}",
                    index,
                    raw.len(),
                    needed * sample_type.bytes
                )));
            }

            for row in 0..rows {
                for col in 0..cols {
                    let pixel = (y0 + row) * width + x0 + col;
                    for s in 0..chunk_samples {
                        let at = ((row * stride + col) * chunk_samples + s) * sample_type.bytes;
                        let band = if chunk_samples == 1 { plane } else { s };
                        out[band][pixel] = decode_sample(&raw[at..at + sample_type.bytes], sample_type);
                    }
                }
            }
        }
    }

    Ok(out)
}

fn chunk_grid<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    width: usize,
    height: usize,
) -> GeoTiffResult<ChunkGrid> {
    if let (Ok(tile_width), Ok(tile_height)) = (
        decoder.get_tag_u32(Tag::TileWidth),
        decoder.get_tag_u32(Tag::TileLength),
    ) {
        if tile_width == 0 || tile_height == 0 {
            return Err(GeoTiffError::Decode("zero tile size".to_string()));
        }
        return Ok(ChunkGrid {
            offsets: decoder.get_tag_u64_vec(Tag::TileOffsets)?,
            byte_counts: decoder.get_tag_u64_vec(Tag::TileByteCounts)?,
            chunk_width: tile_width as usize,
            chunk_height: tile_height as usize,
            tiled: true,
        });
    }

    let rows_per_strip = decoder
        .get_tag_u32(Tag::RowsPerStrip)
        .map(|r| (r as usize).min(height))
        .unwrap_or(height)
        .max(1);
    Ok(ChunkGrid {
        offsets: decoder.get_tag_u64_vec(Tag::StripOffsets)?,
        byte_counts: decoder.get_tag_u64_vec(Tag::StripByteCounts)?,
        chunk_width: width.max(1),
        chunk_height: rows_per_strip,
        tiled: false,
    })
}

fn sample_type<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    file: &mut BufReader<File>,
) -> GeoTiffResult<SampleType> {
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
    if !matches!((format, bits), (1 | 2, 8 | 16 | 32 | 64) | (3, 32 | 64)) {
        return Err(GeoTiffError::UnsupportedDataType(format!(
            "sample format {} with {} bits",
            format, bits
        )));
    }

    let mut order = [0u8; 2];
    file.seek(SeekFrom::Start(0))?;
    file.read_exact(&mut order)?;

    Ok(SampleType {
        format,
        bytes: bits as usize / 8,
        little_endian: &order == b"II",
    })
}

fn read_chunk(
    file: &mut BufReader<File>,
    offset: u64,
    byte_count: u64,
    compression: u32,
) -> GeoTiffResult<Vec<u8>> {
    file.seek(SeekFrom::Start(offset))?;
    let mut raw = vec![0u8; byte_count as usize];
    file.read_exact(&mut raw)?;
    if compression == COMPRESSION_NONE {
        return Ok(raw);
    }

    let mut inflated = Vec::new();
    ZlibDecoder::new(raw.as_slice())
        .read_to_end(&mut inflated)
        .map_err(|e| GeoTiffError::Decode(format!("deflate chunk at {}: {}", offset, e)))?;
    Ok(inflated)
}

fn decode_sample(bytes: &[u8], ty: SampleType) -> f32 {
    macro_rules! num {
        ($t:ty) => {{
            let mut buf = [0u8; std::mem::size_of::<$t>()];
            buf.copy_from_slice(bytes);
            if ty.little_endian {
                <$t>::from_le_bytes(buf)
            } else {
                <$t>::from_be_bytes(buf)
            }
        }};
    }

    match (ty.format, ty.bytes) {
        (1, 1) => bytes[0] as f32,
        (1, 2) => num!(u16) as f32,
        (1, 4) => num!(u32) as f32,
        (1, 8) => num!(u64) as f32,
        (2, 1) => bytes[0] as i8 as f32,
        (2, 2) => num!(i16) as f32,
        (2, 4) => num!(i32) as f32,
        (2, 8) => num!(i64) as f32,
        (3, 4) => num!(f32),
        (3, 8) => num!(f64) as f32,
        _ => f32::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sample_byte_orders() {
        let le = SampleType {
            format: 1,
            bytes: 2,
            little_endian: true,
        };
        assert_eq!(decode_sample(&[0x01, 0x02], le), 513.0);
        let be = SampleType {
            little_endian: false,
            ..le
        };
        assert_eq!(decode_sample(&[0x01, 0x02], be), 258.0);

        let float = SampleType {
            format: 3,
            bytes: 4,
            little_endian: true,
        };
        assert_eq!(decode_sample(&0.25f32.to_le_bytes(), float), 0.25);

        let signed = SampleType {
            format: 2,
            bytes: 1,
            little_endian: true,
        };
        assert_eq!(decode_sample(&[0xff], signed), -1.0);
    }

    #[test]
    fn test_interleave_from_tag() {
        assert_eq!(Interleave::from_tag(1), Interleave::Pixel);
        assert_eq!(Interleave::from_tag(2), Interleave::Band);
    }
}
