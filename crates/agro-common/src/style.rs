//! Land-cover class styles.
//!
//! A style maps the discrete pixel values of a crop-type raster to a display
//! color and a crop label. Styles are read from QGIS raster-layer style files
//! (`.qml`) or JSON, and are immutable once loaded.

use crate::error::{AgroError, AgroResult};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

/// Pixel value reserved for "no data" in the crop maps.
pub const NO_DATA_CLASS: i64 = 255;

/// An RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    255
}

impl Color {
    /// Grey used for classes whose color is missing or unreadable.
    pub const FALLBACK: Color = Color::rgb(0x88, 0x88, 0x88);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn transparent() -> Self {
        Self::rgba(0, 0, 0, 0)
    }

    /// Parse "#RRGGBB" or "#RRGGBBAA".
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.trim().strip_prefix('#')?;
        if !s.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&s[i..i + 2], 16).ok();

        match s.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(channel(0)?, channel(2)?, channel(4)?, channel(6)?)),
            _ => None,
        }
    }

    /// Parse a QML color attribute: "#RRGGBB" or "r,g,b[,a]".
    pub fn from_qml(s: &str) -> Option<Self> {
        if s.trim_start().starts_with('#') {
            return Self::from_hex(s);
        }
        if !s.contains(',') {
            return None;
        }

        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u8>().ok())
            .collect::<Option<Vec<u8>>>()?;
        match parts.as_slice() {
            [r, g, b] => Some(Self::rgb(*r, *g, *b)),
            [r, g, b, a, ..] => Some(Self::rgba(*r, *g, *b, *a)),
            _ => None,
        }
    }

    /// Lowercase "#rrggbb" (alpha dropped).
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_rgba(&self) -> (u8, u8, u8, u8) {
        (self.r, self.g, self.b, self.a)
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }
}

/// One row of the class table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub value: i64,
    pub color: Color,
    pub label: String,
}

impl ClassEntry {
    pub fn new(value: i64, color: Color, label: impl Into<String>) -> Self {
        Self {
            value,
            color,
            label: label.into(),
        }
    }

    /// The 255 sentinel with zero alpha marks pixels without data.
    pub fn is_no_data(&self) -> bool {
        self.value == NO_DATA_CLASS && self.color.a == 0
    }
}

/// Ordered class table for a crop-type raster.
///
/// Entries are kept sorted by value and values are unique.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LandCoverStyle {
    pub name: String,
    entries: Vec<ClassEntry>,
}

#[derive(Deserialize)]
struct StyleFile {
    #[serde(default)]
    name: String,
    entries: Vec<ClassEntry>,
}

impl LandCoverStyle {
    /// Build a style, sorting entries and rejecting duplicate values.
    pub fn new(name: impl Into<String>, mut entries: Vec<ClassEntry>) -> AgroResult<Self> {
        entries.sort_by_key(|e| e.value);
        if let Some(pair) = entries.windows(2).find(|w| w[0].value == w[1].value) {
            return Err(AgroError::DuplicateClass(pair[0].value));
        }

        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// Load a style from a `.qml` or `.json` file, chosen by extension.
    pub fn from_file(path: impl AsRef<Path>) -> AgroResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AgroError::DataReadError(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_qml_str(&name, &content)
        }
    }

    /// Parse the JSON form `{"name": ..., "entries": [{value, color, label}]}`.
    pub fn from_json(json: &str) -> AgroResult<Self> {
        let file: StyleFile =
            serde_json::from_str(json).map_err(|e| AgroError::InvalidStyle(e.to_string()))?;
        Self::new(file.name, file.entries)
    }

    /// Parse a QGIS style document.
    ///
    /// Every `<item>` (color ramp shader) or `<paletteEntry>` (paletted
    /// renderer) carrying both `value` and `label` becomes a class. Values
    /// are read as floats and truncated to integers. Missing or unreadable
    /// colors fall back to [`Color::FALLBACK`]; an `alpha` attribute
    /// overrides the color's alpha channel.
    pub fn from_qml_str(name: &str, xml: &str) -> AgroResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut entries = Vec::new();
        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                    if matches!(e.name().as_ref(), b"item" | b"paletteEntry") {
                        if let Some(entry) = parse_qml_entry(&e)? {
                            entries.push(entry);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(AgroError::InvalidStyle(format!(
                        "XML parsing error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
        }

        if entries.is_empty() {
            return Err(AgroError::InvalidStyle(format!(
                "no classes found in style '{}'",
                name
            )));
        }
        Self::new(name, entries)
    }

    /// Serialize as a paletted-raster QGIS style.
    pub fn to_qml(&self) -> String {
        let mut out = String::new();
        out.push_str("<!DOCTYPE qgis PUBLIC 'http://mrcc.com/qgis.dtd' 'SYSTEM'>\n");
        out.push_str("<qgis styleCategories=\"AllStyleCategories\">\n");
        out.push_str("  <pipe>\n");
        out.push_str("    <rasterrenderer type=\"paletted\" band=\"1\" opacity=\"1\">\n");
        out.push_str("      <colorPalette>\n");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "        <paletteEntry value=\"{}\" color=\"{}\" alpha=\"{}\" label=\"{}\"/>",
                entry.value,
                entry.color.to_hex(),
                entry.color.a,
                quick_xml::escape::escape(entry.label.as_str())
            );
        }
        out.push_str("      </colorPalette>\n");
        out.push_str("    </rasterrenderer>\n");
        out.push_str("  </pipe>\n");
        out.push_str("</qgis>\n");
        out
    }

    /// Entry for a class value.
    pub fn get(&self, value: i64) -> Option<&ClassEntry> {
        self.entries
            .binary_search_by_key(&value, |e| e.value)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Display color for a pixel value; unknown and no-data values are transparent.
    pub fn color_for(&self, value: i64) -> Color {
        match self.get(value) {
            Some(entry) if !entry.is_no_data() => entry.color,
            _ => Color::transparent(),
        }
    }

    /// Label for a pixel value, or `"Class <v>"` when the style does not know it.
    pub fn label_for(&self, value: i64) -> String {
        self.get(value)
            .map(|e| e.label.clone())
            .unwrap_or_else(|| format!("Class {}", value))
    }

    /// Classes that take part in statistics: no-data entries and `exclude`
    /// values are dropped.
    pub fn valid_classes(&self, exclude: &[i64]) -> Vec<&ClassEntry> {
        self.entries
            .iter()
            .filter(|e| !e.is_no_data() && !exclude.contains(&e.value))
            .collect()
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_qml_entry(e: &BytesStart<'_>) -> AgroResult<Option<ClassEntry>> {
    let mut value = None;
    let mut label = None;
    let mut color = None;
    let mut alpha = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|e| AgroError::InvalidStyle(e.to_string()))?;
        let text = attr
            .unescape_value()
            .map_err(|e| AgroError::InvalidStyle(e.to_string()))?
            .into_owned();
        match attr.key.as_ref() {
            b"value" => value = Some(text),
            b"label" => label = Some(text),
            b"color" => color = Some(text),
            b"alpha" => alpha = Some(text),
            _ => {}
        }
    }

    let (Some(value), Some(label)) = (value, label) else {
        return Ok(None);
    };
    if value.is_empty() || label.is_empty() {
        return Ok(None);
    }

    let value = match value.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v.trunc() as i64,
        _ => {
            return Err(AgroError::InvalidStyle(format!(
                "invalid class value '{}'",
                value
            )))
        }
    };

    let mut color = color
        .as_deref()
        .and_then(Color::from_qml)
        .unwrap_or(Color::FALLBACK);
    if let Some(a) = alpha.and_then(|a| a.trim().parse::<u8>().ok()) {
        color.a = a;
    }

    Ok(Some(ClassEntry::new(value, color, label)))
}
