//! PNG encoding for RGBA previews.
//!
//! Class previews rarely use more than a few dozen colours, so
//! [`encode_auto`] first tries an indexed image (color type 3) and falls
//! back to RGBA (color type 6) past 256 colours.

use crate::error::{RenderError, RenderResult};
use image::RgbaImage;
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::Path;

/// Maximum colors for indexed PNG
const MAX_PALETTE_SIZE: usize = 256;

/// Pixel count above which palette extraction runs in parallel
const PARALLEL_THRESHOLD: usize = 4096;

const SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

#[inline(always)]
fn pack(px: &[u8]) -> u32 {
    u32::from_le_bytes([px[0], px[1], px[2], px[3]])
}

/// Colour table and per-pixel indices of an image with at most 256 colours.
#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub colors: Vec<[u8; 4]>,
    pub indices: Vec<u8>,
}

impl Palette {
    /// Index the RGBA `pixels`, or `None` when they use more than 256
    /// colours.
    pub fn from_pixels(pixels: &[u8]) -> Option<Self> {
        if pixels.len() / 4 >= PARALLEL_THRESHOLD {
            Self::from_pixels_parallel(pixels)
        } else {
            Self::from_pixels_sequential(pixels)
        }
    }

    fn from_pixels_sequential(pixels: &[u8]) -> Option<Self> {
        let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
        let mut colors = Vec::new();
        let mut indices = Vec::with_capacity(pixels.len() / 4);

        for px in pixels.chunks_exact(4) {
            let key = pack(px);
            let index = match lookup.get(&key) {
                Some(&i) => i,
                None => {
                    if colors.len() == MAX_PALETTE_SIZE {
                        return None;
                    }
                    let i = colors.len() as u8;
                    colors.push([px[0], px[1], px[2], px[3]]);
                    lookup.insert(key, i);
                    i
                }
            };
            indices.push(index);
        }
        Some(Self { colors, indices })
    }

    /// Collect distinct colours per chunk in parallel, merge them, then map
    /// pixels to indices in parallel.
    fn from_pixels_parallel(pixels: &[u8]) -> Option<Self> {
        let chunk_pixels = (pixels.len() / 4 / rayon::current_num_threads()).max(256);

        let per_chunk: Vec<HashSet<u32>> = pixels
            .par_chunks(chunk_pixels * 4)
            .map(|chunk| {
                let mut seen = HashSet::new();
                for px in chunk.chunks_exact(4) {
                    seen.insert(pack(px));
                    if seen.len() > MAX_PALETTE_SIZE {
                        break;
                    }
                }
                seen
            })
            .collect();

        let mut lookup: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
        let mut colors = Vec::new();
        for key in per_chunk.into_iter().flatten() {
            if lookup.contains_key(&key) {
                continue;
            }
            if colors.len() == MAX_PALETTE_SIZE {
                return None;
            }
            lookup.insert(key, colors.len() as u8);
            colors.push(key.to_le_bytes());
        }

        let indices = pixels
            .par_chunks_exact(4)
            .map(|px| lookup.get(&pack(px)).copied().unwrap_or(0))
            .collect();
        Some(Self { colors, indices })
    }
}

fn check_size(len: usize, width: usize, height: usize, bytes_per_pixel: usize) -> RenderResult<()> {
    if len != width * height * bytes_per_pixel {
        return Err(RenderError::InvalidSize(format!(
            "{} bytes for {}x{} at {} bytes per pixel",
            len, width, height, bytes_per_pixel
        )));
    }
    Ok(())
}

fn write_chunk(png: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(kind);
    png.extend_from_slice(data);
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(kind);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

fn header(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut png = SIGNATURE.to_vec();
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    // bit depth, color type, compression, filter, interlace
    ihdr.extend_from_slice(&[8, color_type, 0, 0, 0]);
    write_chunk(&mut png, b"IHDR", &ihdr);
    png
}

/// Zlib stream of the scanlines, each prefixed with filter type 0.
fn compress_scanlines(data: &[u8], row_bytes: usize) -> RenderResult<Vec<u8>> {
    let rows = if row_bytes == 0 { 0 } else { data.len() / row_bytes };
    let mut raw = Vec::with_capacity(rows * (row_bytes + 1));
    for row in data.chunks_exact(row_bytes.max(1)).take(rows) {
        raw.push(0);
        raw.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&raw)
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    encoder.finish().map_err(|e| RenderError::Encode(e.to_string()))
}

/// Encode RGBA pixels (4 bytes per pixel) as an RGBA PNG.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_size(pixels.len(), width, height, 4)?;
    let mut png = header(width, height, 6);
    write_chunk(&mut png, b"IDAT", &compress_scanlines(pixels, width * 4)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Encode an indexed PNG. A tRNS chunk is written when any palette entry is
/// not fully opaque.
pub fn encode_indexed(width: usize, height: usize, palette: &Palette) -> RenderResult<Vec<u8>> {
    check_size(palette.indices.len(), width, height, 1)?;
    if palette.colors.is_empty() || palette.colors.len() > MAX_PALETTE_SIZE {
        return Err(RenderError::Encode(format!(
            "palette has {} colors",
            palette.colors.len()
        )));
    }

    let mut png = header(width, height, 3);
    let plte: Vec<u8> = palette.colors.iter().flat_map(|c| [c[0], c[1], c[2]]).collect();
    write_chunk(&mut png, b"PLTE", &plte);
    if palette.colors.iter().any(|c| c[3] < 255) {
        let trns: Vec<u8> = palette.colors.iter().map(|c| c[3]).collect();
        write_chunk(&mut png, b"tRNS", &trns);
    }
    write_chunk(&mut png, b"IDAT", &compress_scanlines(&palette.indices, width)?);
    write_chunk(&mut png, b"IEND", &[]);
    Ok(png)
}

/// Indexed PNG when the pixels fit a palette, RGBA otherwise.
pub fn encode_auto(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    check_size(pixels.len(), width, height, 4)?;
    match Palette::from_pixels(pixels) {
        Some(palette) if !palette.colors.is_empty() => encode_indexed(width, height, &palette),
        _ => encode_rgba(pixels, width, height),
    }
}

/// Encode `image` with [`encode_auto`] and write it to `path`.
pub fn save_png(image: &RgbaImage, path: impl AsRef<Path>) -> RenderResult<()> {
    let path = path.as_ref();
    let bytes = encode_auto(image.as_raw(), image.width() as usize, image.height() as usize)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    tracing::debug!(path = %path.display(), "Wrote PNG");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_shares_indices() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            255, 0, 0, 255, //
            0, 0, 0, 0,
        ];
        let palette = Palette::from_pixels(&pixels).unwrap();
        assert_eq!(palette.colors.len(), 3);
        assert_eq!(palette.indices[0], palette.indices[2]);
        assert_eq!(palette.colors[palette.indices[3] as usize], [0, 0, 0, 0]);
    }

    #[test]
    fn test_parallel_palette_matches_colors() {
        let mut pixels = Vec::with_capacity(128 * 128 * 4);
        for y in 0..128u32 {
            for x in 0..128u32 {
                let class = ((x / 16 + y / 16) % 6) as u8;
                pixels.extend_from_slice(&[class * 40, 200 - class * 20, 10, 255]);
            }
        }
        let palette = Palette::from_pixels(&pixels).unwrap();
        assert_eq!(palette.colors.len(), 6);
        for (px, idx) in pixels.chunks_exact(4).zip(palette.indices.iter()) {
            assert_eq!(&palette.colors[*idx as usize][..], px);
        }
    }

    #[test]
    fn test_too_many_colors() {
        let pixels: Vec<u8> = (0..300u32).flat_map(|i| [(i % 256) as u8, (i / 256) as u8, 0, 255]).collect();
        assert!(Palette::from_pixels(&pixels).is_none());
        let png = encode_auto(&pixels, 300, 1).unwrap();
        // color type byte of IHDR
        assert_eq!(png[25], 6);
    }

    #[test]
    fn test_size_is_checked() {
        assert!(matches!(encode_rgba(&[0; 12], 2, 2), Err(RenderError::InvalidSize(_))));
    }
}
