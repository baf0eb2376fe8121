//! Common test fixtures for the agromodel workspace.
//!
//! Grids, CRSs and styles mirror the real inputs: 10 m Sentinel-2 NDVI in
//! UTM 21S around Tres Arroyos and INTA crop maps in Gauss-Krüger.

use agro_common::{CrsCode, GeoTransform, MonthPeriod};
use geotiff_io::{GeoTiffResult, GeoTiffWriter, PixelType, RasterBand};
use std::path::{Path, PathBuf};

/// Common CRS definitions.
pub mod crs {
    use agro_common::CrsCode;

    /// Sentinel-2 exports (WGS 84 / UTM zone 21S)
    pub const UTM_21S: CrsCode = CrsCode::Utm {
        zone: 21,
        south: true,
    };

    /// INTA crop maps (POSGAR 2007 / Argentina 5)
    pub const POSGAR_5: CrsCode = CrsCode::GaussKruger { zone: 5 };
}

/// Common grid definitions.
pub mod grid {
    use agro_common::GeoTransform;

    /// 10 m grid whose upper-left corner sits 14 km north-west of the centre.
    pub fn sentinel_transform() -> GeoTransform {
        GeoTransform::new(199_510.0, 5_761_700.0, 10.0, -10.0)
    }
}

/// Land-cover style documents.
pub mod styles {
    /// QML style with a paletted renderer covering the main crop classes and
    /// the transparent no-data entry.
    pub const MNC_QML: &str = r##"<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>
<qgis version="3.28.0" styleCategories="AllStyleCategories">
  <pipe>
    <rasterrenderer type="paletted" opacity="1" band="1" nodataColor="">
      <colorPalette>
        <paletteEntry value="0" color="#000000" label="Sin dato" alpha="0"/>
        <paletteEntry value="10" color="#e6c800" label="Maíz" alpha="255"/>
        <paletteEntry value="11" color="#ff7f00" label="Girasol" alpha="255"/>
        <paletteEntry value="12" color="#00a000" label="Soja" alpha="255"/>
        <paletteEntry value="21" color="#b8860b" label="Trigo" alpha="255"/>
        <paletteEntry value="22" color="#d2b48c" label="Cebada" alpha="255"/>
        <paletteEntry value="255" color="#ffffff" label="No data" alpha="0"/>
      </colorPalette>
    </rasterrenderer>
  </pipe>
</qgis>
"##;

    /// Colour-ramp variant of the same legend, with `r,g,b,a` colours.
    pub const MNC_RAMP_QML: &str = r##"<qgis>
  <rastershader>
    <colorrampshader colorRampType="EXACT">
      <item value="10" label="Maíz" color="230,200,0,255"/>
      <item value="12.0" label="Soja" color="#00a000"/>
      <item value="255" label="No data" color="#ffffff" alpha="0"/>
    </colorrampshader>
  </rastershader>
</qgis>
"##;
}

/// The 13 months of the 2023/24 campaign.
pub fn campaign_months() -> Vec<MonthPeriod> {
    let start = MonthPeriod { year: 2023, month: 6 };
    let end = MonthPeriod { year: 2024, month: 6 };
    agro_common::months_between(start, end)
}

/// Write a single-band float32 NDVI raster named `NDVI_YYYY-MM.tif` into `dir`.
pub fn write_ndvi_month(
    dir: &Path,
    month: MonthPeriod,
    band: &RasterBand,
    transform: GeoTransform,
    crs: CrsCode,
) -> GeoTiffResult<PathBuf> {
    let path = dir.join(format!("NDVI_{}.tif", month.label()));
    GeoTiffWriter::new(transform, crs)
        .with_nodata(-9999.0)
        .write(&path, &[("NDVI", band)])?;
    Ok(path)
}

/// Write a uint8 crop-class raster with nodata 255.
pub fn write_class_raster(
    path: &Path,
    band: &RasterBand,
    transform: GeoTransform,
    crs: CrsCode,
) -> GeoTiffResult<PathBuf> {
    GeoTiffWriter::new(transform, crs)
        .with_nodata(255.0)
        .with_pixel_type(PixelType::UInt8)
        .write(path, &[("", band)])?;
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_campaign_months() {
        let months = campaign_months();
        assert_eq!(months.len(), 13);
        assert_eq!(months[0].label(), "2023-06");
        assert_eq!(months[12].label(), "2024-06");
    }

    #[test]
    fn test_sentinel_grid_is_north_up() {
        let gt = grid::sentinel_transform();
        assert!(gt.pixel_height < 0.0);
        assert_eq!(gt.resolution(), (10.0, 10.0));
    }

    #[test]
    fn test_styles_parse() {
        let style = agro_common::LandCoverStyle::from_qml_str("mnc", styles::MNC_QML).unwrap();
        assert_eq!(style.len(), 7);
        let ramp = agro_common::LandCoverStyle::from_qml_str("mnc", styles::MNC_RAMP_QML).unwrap();
        assert_eq!(ramp.len(), 3);
    }
}
