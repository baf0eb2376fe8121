//! Rendering tests that go through PNG files on disk.

use agro_common::{Color, LandCoverStyle};
use geotiff_io::RasterBand;
use renderer::{
    encode_auto, render_classes, render_ramp, render_time_series, save_png, ColorRamp, Panel,
    Series,
};
use test_utils::{create_class_stripes, create_ndvi_grid, styles::MNC_QML};

// ============================================================================
// Helper functions
// ============================================================================

fn style() -> LandCoverStyle {
    LandCoverStyle::from_qml_str("mnc", MNC_QML).unwrap()
}

/// Color type byte of the IHDR chunk.
fn color_type(png: &[u8]) -> u8 {
    png[25]
}

// ============================================================================
// Classified previews
// ============================================================================

#[test]
fn test_class_preview_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let band = RasterBand::new(create_class_stripes(64, 32, &[10, 12, 255, 0], 8), 64, 32);
    let img = render_classes(&band, &style());

    let path = dir.path().join("previews").join("mnc.png");
    save_png(&img, &path).unwrap();

    let back = image::open(&path).unwrap().to_rgba8();
    assert_eq!(back.dimensions(), (64, 32));
    assert_eq!(back.get_pixel(0, 0).0, [0xe6, 0xc8, 0x00, 255]);
    assert_eq!(back.get_pixel(8, 0).0, [0x00, 0xa0, 0x00, 255]);
    // 255 and the alpha-0 class 0 are transparent
    assert_eq!(back.get_pixel(16, 0).0[3], 0);
    assert_eq!(back.get_pixel(24, 0).0[3], 0);
}

#[test]
fn test_class_preview_is_indexed() {
    let band = RasterBand::new(create_class_stripes(32, 32, &[10, 11, 12, 21, 22], 4), 32, 32);
    let img = render_classes(&band, &style());
    let png = encode_auto(img.as_raw(), 32, 32).unwrap();
    assert_eq!(color_type(&png), 3);
}

// ============================================================================
// NDVI ramp
// ============================================================================

#[test]
fn test_ndvi_ramp_preview() {
    let dir = tempfile::tempdir().unwrap();
    let band = RasterBand::new(create_ndvi_grid(50, 50), 50, 50);
    let img = render_ramp(&band, &ColorRamp::ndvi());
    let path = dir.path().join("ndvi.png");
    save_png(&img, &path).unwrap();

    let back = image::open(&path).unwrap().to_rgba8();
    assert_eq!(back.get_pixel(10, 10), img.get_pixel(10, 10));
    assert_eq!(back.get_pixel(49, 49), img.get_pixel(49, 49));
}

// ============================================================================
// Time-series chart
// ============================================================================

#[test]
fn test_chart_png() {
    let dir = tempfile::tempdir().unwrap();
    let months: Vec<String> = ["2023-06", "2023-07", "2023-08"].iter().map(|s| s.to_string()).collect();
    let panels = vec![
        Panel {
            title: "Invierno 2023".to_string(),
            months: months.clone(),
            series: vec![Series {
                label: "Trigo".to_string(),
                color: Color::rgb(184, 134, 11),
                values: vec![Some(0.3), Some(0.5), Some(0.7)],
            }],
        },
        Panel {
            title: "Verano 2024".to_string(),
            months,
            series: vec![Series {
                label: "Soja".to_string(),
                color: Color::rgb(0, 160, 0),
                values: vec![None, Some(0.2), Some(0.6)],
            }],
        },
    ];

    let img = render_time_series(&panels, 800, 300);
    let path = dir.path().join("3_evolucion_ndvi_por_categoria.png");
    save_png(&img, &path).unwrap();

    let back = image::open(&path).unwrap().to_rgba8();
    assert_eq!(back.dimensions(), (800, 300));
    assert!(back.pixels().any(|p| p.0 == [184, 134, 11, 255]));
    assert!(back.pixels().any(|p| p.0 == [0, 160, 0, 255]));
}
