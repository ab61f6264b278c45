//! Native fallback charts, drawn when generated plotting code is missing or
//! fails to produce an image.

use std::path::Path;

use anyhow::{Context, Result};
use plotters::element::Pie;
use plotters::prelude::*;
use serde_json::Value;

const PALETTE: [RGBColor; 5] = [
    RGBColor(0xFF, 0x6B, 0x6B),
    RGBColor(0x4E, 0xCD, 0xC4),
    RGBColor(0x45, 0xB7, 0xD1),
    RGBColor(0x96, 0xCE, 0xB4),
    RGBColor(0xFF, 0xEA, 0xA7),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    Line,
    Scatter,
    Pie,
}

impl ChartKind {
    /// Pick a chart type from words in the user's request; bar by default.
    pub fn from_request(request: &str) -> Self {
        let request = request.to_lowercase();
        if request.contains("pie") {
            ChartKind::Pie
        } else if request.contains("line") {
            ChartKind::Line
        } else if request.contains("scatter") {
            ChartKind::Scatter
        } else {
            ChartKind::Bar
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    pub x_label: String,
    pub y_label: String,
}

fn label_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn number_of(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

impl ChartData {
    /// First column becomes labels and second column values. Rows whose value
    /// is not numeric are skipped. Single-column results count each row once.
    pub fn from_rows(cols: &[String], rows: &[Vec<Value>]) -> Self {
        let x_label = cols.first().cloned().unwrap_or_else(|| "Category".to_string());
        let y_label = cols.get(1).cloned().unwrap_or_else(|| "Value".to_string());

        let two_columns = rows.first().is_some_and(|row| row.len() >= 2);
        let (labels, values) = if two_columns {
            rows.iter()
                .filter_map(|row| Some((label_of(&row[0]), number_of(row.get(1)?)?)))
                .unzip()
        } else {
            (1..=rows.len()).map(|i| (format!("Item {}", i), 1.0)).unzip()
        };

        Self {
            labels,
            values,
            x_label,
            y_label,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn value_range(&self) -> (f64, f64) {
        let min = self.values.iter().cloned().fold(0.0_f64, f64::min);
        let max = self.values.iter().cloned().fold(0.0_f64, f64::max);
        let pad = ((max - min).abs() * 0.1).max(1.0);
        (if min < 0.0 { min - pad } else { 0.0 }, max + pad)
    }
}

fn draw_notice(path: &Path, title: &str, message: &str) -> Result<()> {
    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 28))?;
    root.draw(&Text::new(
        message.to_string(),
        (140, 260),
        ("sans-serif", 24).into_font().color(&RED),
    ))?;
    root.present()?;
    Ok(())
}

fn draw_bar(path: &Path, data: &ChartData, title: &str) -> Result<()> {
    let n = data.values.len();
    let (y_min, y_max) = data.value_range();

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..n as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc(&data.x_label)
        .y_desc(&data.y_label)
        .x_labels(n.min(20))
        .x_label_formatter(&|x| data.labels.get(x.floor() as usize).cloned().unwrap_or_default())
        .draw()?;

    chart.draw_series(data.values.iter().enumerate().map(|(i, v)| {
        let color = PALETTE[i % PALETTE.len()];
        Rectangle::new([(i as f64 + 0.1, 0.0), (i as f64 + 0.9, *v)], color.filled())
    }))?;

    chart.draw_series(data.values.iter().enumerate().map(|(i, v)| {
        Text::new(format!("{}", v.round() as i64), (i as f64 + 0.35, *v), ("sans-serif", 14))
    }))?;

    root.present()?;
    Ok(())
}

fn draw_points(path: &Path, data: &ChartData, title: &str, kind: ChartKind) -> Result<()> {
    let n = data.values.len();
    let (y_min, y_max) = data.value_range();

    let root = BitMapBackend::new(path, (1000, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(title, ("sans-serif", 24))
        .x_label_area_size(60)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5).max(0.5), y_min..y_max)?;

    let x_desc = if kind == ChartKind::Scatter { "Data Points" } else { data.x_label.as_str() };
    chart
        .configure_mesh()
        .x_desc(x_desc)
        .y_desc(&data.y_label)
        .x_labels(n.min(20))
        .x_label_formatter(&|x| {
            let idx = x.round();
            if idx < 0.0 {
                return String::new();
            }
            data.labels.get(idx as usize).cloned().unwrap_or_default()
        })
        .draw()?;

    let points: Vec<(f64, f64)> = data.values.iter().enumerate().map(|(i, v)| (i as f64, *v)).collect();
    if kind == ChartKind::Line {
        chart.draw_series(LineSeries::new(points.clone(), PALETTE[2].stroke_width(2)))?;
    }
    chart.draw_series(points.iter().map(|p| Circle::new(*p, 6, PALETTE[0].filled())))?;
    chart.draw_series(points.iter().map(|(x, y)| {
        Text::new(format!("{:.1}", y), (*x, *y), ("sans-serif", 13))
    }))?;

    root.present()?;
    Ok(())
}

fn draw_pie(path: &Path, data: &ChartData, title: &str) -> Result<()> {
    let sizes: Vec<f64> = data.values.iter().map(|v| v.abs()).collect();
    if sizes.iter().sum::<f64>() <= 0.0 {
        return draw_notice(path, title, "Cannot create pie chart: no positive values");
    }
    let colors: Vec<RGBColor> = (0..sizes.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();

    let root = BitMapBackend::new(path, (800, 800)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled(title, ("sans-serif", 24))?;

    let (w, h) = root.dim_in_pixel();
    let center = (w as i32 / 2, h as i32 / 2);
    let radius = (w.min(h) as f64) * 0.35;
    let mut pie = Pie::new(&center, &radius, &sizes, &colors, &data.labels);
    pie.start_angle(90.0);
    pie.label_style(("sans-serif", 16).into_font());
    pie.percentages(("sans-serif", 14).into_font().color(&BLACK));
    root.draw(&pie)?;

    root.present()?;
    Ok(())
}

/// Draw `data` to a PNG file.
pub fn render_to_file(path: &Path, kind: ChartKind, data: &ChartData, title: &str) -> Result<()> {
    if data.is_empty() {
        return draw_notice(path, "No Data Available", "No data available for visualization");
    }
    match kind {
        ChartKind::Bar => draw_bar(path, data, title),
        ChartKind::Line | ChartKind::Scatter => draw_points(path, data, title, kind),
        ChartKind::Pie => draw_pie(path, data, title),
    }
}

/// Draw `data` and return the PNG bytes.
pub fn render_png(kind: ChartKind, data: &ChartData, title: &str) -> Result<Vec<u8>> {
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .context("Failed to create chart file")?;
    render_to_file(file.path(), kind, data, title)?;
    std::fs::read(file.path()).context("Failed to read rendered chart")
}
