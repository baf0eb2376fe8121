//! GeoTIFF key directory and GDAL metadata tags.

use agro_common::CrsCode;
use quick_xml::events::Event;
use quick_xml::Reader;
use tiff::tags::Tag;

/// ModelPixelScaleTag (33550)
pub const MODEL_PIXEL_SCALE: Tag = Tag::ModelPixelScaleTag;
/// ModelTiepointTag (33922)
pub const MODEL_TIEPOINT: Tag = Tag::ModelTiepointTag;
/// ModelTransformationTag (34264)
pub const MODEL_TRANSFORMATION: Tag = Tag::ModelTransformationTag;
/// GeoKeyDirectoryTag (34735)
pub const GEO_KEY_DIRECTORY: Tag = Tag::GeoKeyDirectoryTag;
/// GDAL_METADATA (42112, XML band metadata). `tiff` has no named variant.
pub const GDAL_METADATA: Tag = Tag::Unknown(42112);
/// GDAL_NODATA (42113, ASCII nodata value)
pub const GDAL_NODATA: Tag = Tag::GdalNodata;

const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

const MODEL_TYPE_PROJECTED: u16 = 1;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;
const RASTER_PIXEL_IS_AREA: u16 = 1;

/// Key directory declaring `crs`: version 1.1.0 header followed by
/// `[key, location, count, value]` entries with inline values.
pub fn encode_geokeys(crs: CrsCode) -> Vec<u16> {
    let (model_type, crs_key) = if crs.is_geographic() {
        (MODEL_TYPE_GEOGRAPHIC, GEOGRAPHIC_TYPE)
    } else {
        (MODEL_TYPE_PROJECTED, PROJECTED_CS_TYPE)
    };

    vec![
        1, 1, 0, 3, //
        GT_MODEL_TYPE, 0, 1, model_type, //
        GT_RASTER_TYPE, 0, 1, RASTER_PIXEL_IS_AREA, //
        crs_key, 0, 1, crs.epsg() as u16,
    ]
}

/// EPSG code declared by a key directory, if any.
pub fn decode_epsg(keys: &[u16]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let count = keys[3] as usize;
    let mut projected = None;
    let mut geographic = None;

    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        // Only inline SHORT values carry a code; 32767 means user-defined.
        if location != 0 || value == 0 || value == 32767 {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE => projected = Some(value as u32),
            GEOGRAPHIC_TYPE => geographic = Some(value as u32),
            _ => {}
        }
    }

    projected.or(geographic)
}

/// CRS declared by a key directory, when it is one this workspace knows.
pub fn decode_crs(keys: &[u16]) -> Option<CrsCode> {
    decode_epsg(keys).and_then(CrsCode::from_epsg)
}

/// Parse a GDAL_NODATA string ("nan", "-9999", "0\0").
pub fn parse_nodata(s: &str) -> Option<f64> {
    let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if s.is_empty() {
        return None;
    }
    if s.eq_ignore_ascii_case("nan") {
        return Some(f64::NAN);
    }
    s.parse().ok()
}

/// Text written to GDAL_NODATA.
pub fn format_nodata(nodata: f64) -> String {
    if nodata.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", nodata)
    }
}

/// Band descriptions from a GDAL_METADATA document, indexed by sample.
///
/// ```xml
/// <GDALMetadata>
///   <Item name="DESCRIPTION" sample="0" role="description">NDVI</Item>
/// </GDALMetadata>
/// ```
pub fn parse_band_descriptions(xml: &str, samples: usize) -> Vec<Option<String>> {
    let mut descriptions = vec![None; samples];
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut current_sample: Option<usize> = None;
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"Item" => {
                let mut is_description = false;
                let mut sample = None;
                for attr in e.attributes().flatten() {
                    let value = String::from_utf8_lossy(&attr.value).into_owned();
                    match attr.key.as_ref() {
                        b"role" => is_description = value == "description",
                        b"name" if value == "DESCRIPTION" => is_description = true,
                        b"sample" => sample = value.parse::<usize>().ok(),
                        _ => {}
                    }
                }
                current_sample = if is_description { sample } else { None };
            }
            Ok(Event::Text(t)) => {
                if let (Some(sample), Ok(text)) = (current_sample, t.unescape()) {
                    if sample < samples {
                        descriptions[sample] = Some(text.into_owned());
                    }
                }
            }
            Ok(Event::End(_)) => current_sample = None,
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
    }

    descriptions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geokeys_roundtrip() {
        let utm = CrsCode::Utm {
            zone: 21,
            south: true,
        };
        assert_eq!(decode_crs(&encode_geokeys(utm)), Some(utm));
        assert_eq!(
            decode_crs(&encode_geokeys(CrsCode::Epsg4326)),
            Some(CrsCode::Epsg4326)
        );
    }

    #[test]
    fn test_projected_wins_over_geographic() {
        let keys = vec![
            1, 1, 0, 2, //
            2048, 0, 1, 4326, //
            3072, 0, 1, 22185,
        ];
        assert_eq!(decode_epsg(&keys), Some(22185));
    }

    #[test]
    fn test_user_defined_is_ignored() {
        let keys = vec![1, 1, 0, 1, 3072, 0, 1, 32767];
        assert_eq!(decode_epsg(&keys), None);
    }

    #[test]
    fn test_parse_nodata() {
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert_eq!(parse_nodata("255"), Some(255.0));
        assert_eq!(parse_nodata(""), None);
    }

    #[test]
    fn test_parse_band_descriptions() {
        let xml = r#"<GDALMetadata>
  <Item name="DESCRIPTION" sample="0" role="description">B4</Item>
  <Item name="DESCRIPTION" sample="1" role="description">NDVI</Item>
  <Item name="SCALE" sample="1" role="scale">1</Item>
</GDALMetadata>"#;
        let d = parse_band_descriptions(xml, 3);
        assert_eq!(d, vec![Some("B4".to_string()), Some("NDVI".to_string()), None]);
    }
}
