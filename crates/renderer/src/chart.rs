//! Monthly NDVI line charts, one panel per season.
//!
//! Each panel plots one polyline with markers per crop class in the class
//! colour. The y axis starts at 0. Months without a value break the line,
//! and classes without any value are left out of the plot and the legend.
//!
//! Text needs a TrueType font; without one the chart is drawn without
//! titles and tick labels.

use crate::error::{RenderError, RenderResult};
use agro_common::Color;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut,
    draw_text_mut, text_size,
};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::path::Path;
use tracing::warn;

/// One class line.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub color: Color,
    /// One value per month of the panel
    pub values: Vec<Option<f64>>,
}

impl Series {
    pub fn has_values(&self) -> bool {
        self.values.iter().any(|v| v.is_some_and(f64::is_finite))
    }
}

/// One season's chart.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub title: String,
    pub months: Vec<String>,
    pub series: Vec<Series>,
}

impl Panel {
    /// Largest finite value of any series.
    pub fn max_value(&self) -> Option<f64> {
        self.series
            .iter()
            .flat_map(|s| s.values.iter().flatten())
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}

/// Top of the y axis: the maximum rounded up to a tenth, within 0.1..=1.0.
pub fn y_axis_max(max_value: Option<f64>) -> f64 {
    match max_value {
        Some(v) => ((v * 10.0).ceil() / 10.0).clamp(0.1, 1.0),
        None => 1.0,
    }
}

/// Pixel rectangle of a panel's plot area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotArea {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl PlotArea {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    /// X of month `index` out of `count`, months spread edge to edge.
    pub fn x_at(&self, index: usize, count: usize) -> f32 {
        if count <= 1 {
            return self.left + self.width() / 2.0;
        }
        self.left + self.width() * index as f32 / (count - 1) as f32
    }

    /// Y of `value` on a 0..`y_max` axis; values outside are clamped.
    pub fn y_at(&self, value: f64, y_max: f64) -> f32 {
        let t = (value / y_max).clamp(0.0, 1.0) as f32;
        self.bottom - t * self.height()
    }
}

/// Chart size, line styling and optional font.
pub struct ChartOptions {
    pub width: u32,
    pub height: u32,
    pub line_width: u32,
    pub marker_radius: i32,
    pub font_size: f32,
    font: Option<Font<'static>>,
}

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const AXIS: Rgba<u8> = Rgba([60, 60, 60, 255]);
const GRID: Rgba<u8> = Rgba([210, 210, 210, 255]);
const TEXT: Rgba<u8> = Rgba([20, 20, 20, 255]);

fn rgba(color: Color) -> Rgba<u8> {
    let color = if color.is_transparent() { Color::FALLBACK } else { color };
    Rgba([color.r, color.g, color.b, 255])
}

impl ChartOptions {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            line_width: 2,
            marker_radius: 4,
            font_size: 14.0,
            font: None,
        }
    }

    /// Use the TrueType font at `path` for titles and labels.
    pub fn with_font_file(self, path: impl AsRef<Path>) -> RenderResult<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        self.with_font_bytes(bytes)
    }

    pub fn with_font_bytes(mut self, bytes: Vec<u8>) -> RenderResult<Self> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| RenderError::Font("could not parse font data".to_string()))?;
        self.font = Some(font);
        Ok(self)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn legend_width(&self) -> f32 {
        if self.font.is_some() {
            150.0
        } else {
            24.0
        }
    }

    /// Plot area of panel `index` out of `count`, panels side by side.
    pub fn plot_area(&self, index: usize, count: usize) -> PlotArea {
        let panel_width = self.width as f32 / count.max(1) as f32;
        let x0 = panel_width * index as f32;
        let (left_margin, top_margin, bottom_margin) = if self.font.is_some() {
            (48.0, 36.0, 48.0)
        } else {
            (16.0, 12.0, 12.0)
        };
        let right = (x0 + panel_width - self.legend_width()).max(x0 + left_margin + 1.0);
        let bottom = (self.height as f32 - bottom_margin).max(top_margin + 1.0);
        PlotArea {
            left: x0 + left_margin,
            top: top_margin,
            right,
            bottom,
        }
    }

    /// Draw every panel.
    pub fn render(&self, panels: &[Panel]) -> RgbaImage {
        let mut img = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        for (i, panel) in panels.iter().enumerate() {
            let area = self.plot_area(i, panels.len());
            self.draw_panel(&mut img, panel, area);
        }
        img
    }

    fn draw_panel(&self, img: &mut RgbaImage, panel: &Panel, area: PlotArea) {
        let y_max = y_axis_max(panel.max_value());
        let step = if y_max <= 0.5 { 0.1 } else { 0.2 };
        let n = panel.months.len();

        // Dashed grid
        let ticks: Vec<f64> = (0..)
            .map(|k| k as f64 * step)
            .take_while(|v| *v <= y_max + 1e-9)
            .collect();
        for tick in &ticks {
            let y = area.y_at(*tick, y_max);
            dashed_line(img, (area.left, y), (area.right, y), GRID);
        }
        for i in 0..n {
            let x = area.x_at(i, n);
            dashed_line(img, (x, area.top), (x, area.bottom), GRID);
        }
        draw_hollow_rect_mut(
            img,
            Rect::at(area.left as i32, area.top as i32)
                .of_size(area.width().max(1.0) as u32, area.height().max(1.0) as u32 + 1),
            AXIS,
        );

        let drawn: Vec<&Series> = panel.series.iter().filter(|s| s.has_values()).collect();
        for series in &drawn {
            self.draw_series(img, series, area, y_max, n);
        }

        // Legend swatches right of the plot
        for (i, series) in drawn.iter().enumerate() {
            let x = area.right as i32 + 8;
            let y = area.top as i32 + i as i32 * 18;
            draw_filled_rect_mut(img, Rect::at(x, y).of_size(10, 10), rgba(series.color));
        }

        if let Some(font) = &self.font {
            self.draw_labels(img, font, panel, &drawn, area, &ticks, y_max);
        }
    }

    fn draw_series(&self, img: &mut RgbaImage, series: &Series, area: PlotArea, y_max: f64, n: usize) {
        let color = rgba(series.color);
        let point = |i: usize| -> Option<(f32, f32)> {
            let v = series.values.get(i).copied().flatten().filter(|v| v.is_finite())?;
            Some((area.x_at(i, n), area.y_at(v, y_max)))
        };

        for i in 1..n {
            if let (Some(a), Some(b)) = (point(i - 1), point(i)) {
                for o in 0..self.line_width {
                    let d = o as f32 - (self.line_width / 2) as f32;
                    draw_line_segment_mut(img, (a.0, a.1 + d), (b.0, b.1 + d), color);
                }
            }
        }
        for i in 0..n {
            if let Some((x, y)) = point(i) {
                draw_filled_circle_mut(img, (x as i32, y as i32), self.marker_radius, color);
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_labels(
        &self,
        img: &mut RgbaImage,
        font: &Font<'static>,
        panel: &Panel,
        drawn: &[&Series],
        area: PlotArea,
        ticks: &[f64],
        y_max: f64,
    ) {
        let scale = Scale::uniform(self.font_size);
        let small = Scale::uniform(self.font_size * 0.8);

        let (title_w, _) = text_size(scale, font, &panel.title);
        let title_x = area.left + (area.width() - title_w as f32) / 2.0;
        draw_text_mut(img, TEXT, title_x.max(0.0) as i32, 8, scale, font, &panel.title);

        for tick in ticks {
            let label = format!("{:.1}", tick);
            let (w, h) = text_size(small, font, &label);
            let y = area.y_at(*tick, y_max) as i32 - h / 2;
            draw_text_mut(img, TEXT, area.left as i32 - w - 6, y, small, font, &label);
        }

        // Skip month labels that would overlap
        let n = panel.months.len();
        let widest = panel
            .months
            .iter()
            .map(|m| text_size(small, font, m).0)
            .max()
            .unwrap_or(0) as f32;
        let slot = if n > 1 { area.width() / (n - 1) as f32 } else { area.width() };
        let every = ((widest + 6.0) / slot.max(1.0)).ceil().max(1.0) as usize;
        for (i, month) in panel.months.iter().enumerate().step_by(every) {
            let (w, _) = text_size(small, font, month);
            let x = area.x_at(i, n) as i32 - w / 2;
            draw_text_mut(img, TEXT, x, area.bottom as i32 + 6, small, font, month);
        }

        for (i, series) in drawn.iter().enumerate() {
            let x = area.right as i32 + 22;
            let y = area.top as i32 + i as i32 * 18 - 2;
            draw_text_mut(img, TEXT, x, y, small, font, &series.label);
        }
    }
}

/// Dashed line of 6 px dashes and 4 px gaps.
fn dashed_line(img: &mut RgbaImage, start: (f32, f32), end: (f32, f32), color: Rgba<u8>) {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len = (dx * dx + dy * dy).sqrt();
    if len < 1.0 {
        return;
    }
    let (ux, uy) = (dx / len, dy / len);
    let mut t = 0.0;
    while t < len {
        let t1 = (t + 6.0).min(len);
        draw_line_segment_mut(
            img,
            (start.0 + ux * t, start.1 + uy * t),
            (start.0 + ux * t1, start.1 + uy * t1),
            color,
        );
        t += 10.0;
    }
}

/// Render `panels` side by side on a `width` x `height` white chart without
/// text.
pub fn render_time_series(panels: &[Panel], width: u32, height: u32) -> RgbaImage {
    if panels.is_empty() {
        warn!("No panels to chart");
    }
    ChartOptions::new(width, height).render(panels)
}
