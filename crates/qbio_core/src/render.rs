//! Chart backends: where a finished `Figure` goes.
//!
//! The façades never draw anything themselves. They hand a `Figure` and a
//! name to a `ChartBackend`, which publishes it and reports where it went.

use crate::figure::{Figure, Mode};
use crate::settings::{OutputFormat, Settings};
use anyhow::{anyhow, Context, Result};
use plotters::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, PartialEq)]
pub struct ChartArtifact {
    pub name: String,
    pub path: PathBuf,
    pub format: OutputFormat,
}

pub trait ChartBackend {
    fn publish(&self, figure: &Figure, name: &str) -> Result<ChartArtifact>;
}

/// Writes the figure as plotly JSON.
#[derive(Debug, Clone)]
pub struct JsonBackend {
    pub directory: PathBuf,
}

/// Writes a standalone page that draws the figure with plotly.js.
#[derive(Debug, Clone)]
pub struct HtmlBackend {
    pub directory: PathBuf,
}

/// Renders a static SVG with plotters.
#[derive(Debug, Clone)]
pub struct SvgBackend {
    pub directory: PathBuf,
    pub width: u32,
    pub height: u32,
}

impl ChartBackend for JsonBackend {
    fn publish(&self, figure: &Figure, name: &str) -> Result<ChartArtifact> {
        let body = figure.to_json()?;
        write_artifact(&self.directory, name, OutputFormat::Json, &body)
    }
}

impl ChartBackend for HtmlBackend {
    fn publish(&self, figure: &Figure, name: &str) -> Result<ChartArtifact> {
        let body = html_page(figure)?;
        write_artifact(&self.directory, name, OutputFormat::Html, &body)
    }
}

impl ChartBackend for SvgBackend {
    fn publish(&self, figure: &Figure, name: &str) -> Result<ChartArtifact> {
        let body = render_svg(figure, self.width, self.height)
            .with_context(|| format!("Failed to render chart '{}'", figure.title()))?;
        write_artifact(&self.directory, name, OutputFormat::Svg, &body)
    }
}

/// Picks the backend named in the output settings.
pub fn backend_for(settings: &Settings) -> Box<dyn ChartBackend> {
    let directory = settings.output.directory.clone();
    match settings.output.format {
        OutputFormat::Json => Box::new(JsonBackend { directory }),
        OutputFormat::Html => Box::new(HtmlBackend { directory }),
        OutputFormat::Svg => Box::new(SvgBackend {
            directory,
            width: settings.style.width,
            height: settings.style.height,
        }),
    }
}

/// Filesystem-safe name derived from a chart title.
pub fn file_stem(title: &str) -> String {
    let mut stem = String::with_capacity(title.len());
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            stem.push(ch.to_ascii_lowercase());
        } else if !stem.is_empty() && !stem.ends_with('_') {
            stem.push('_');
        }
    }
    while stem.ends_with('_') {
        stem.pop();
    }
    if stem.is_empty() {
        stem.push_str("chart");
    }
    stem
}

fn extension(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Json => "json",
        OutputFormat::Html => "html",
        OutputFormat::Svg => "svg",
    }
}

fn write_artifact(
    directory: &Path,
    name: &str,
    format: OutputFormat,
    body: &str,
) -> Result<ChartArtifact> {
    fs::create_dir_all(directory)
        .with_context(|| format!("Failed to create output directory {}", directory.display()))?;
    let path = directory.join(format!("{name}.{}", extension(format)));
    fs::write(&path, body).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote chart");

    Ok(ChartArtifact {
        name: name.to_string(),
        path,
        format,
    })
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn html_page(figure: &Figure) -> Result<String> {
    // Keep the payload from closing the script element early.
    let json = figure.to_json()?.replace("</", "<\\/");
    Ok(format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<script src="{PLOTLY_CDN}"></script>
</head>
<body>
<div id="chart" style="width:100%;height:95vh;"></div>
<script>
const figure = {json};
Plotly.newPlot("chart", figure.data, figure.layout, {{responsive: true}});
</script>
</body>
</html>
"#,
        title = escape_html(figure.title()),
    ))
}

fn padded(range: (f64, f64)) -> (f64, f64) {
    if range.1 > range.0 {
        let pad = 0.02 * (range.1 - range.0);
        (range.0 - pad, range.1 + pad)
    } else {
        (range.0 - 1.0, range.1 + 1.0)
    }
}

/// Runs of consecutive finite points.
fn finite_segments(x: &[f64], y: &[f64]) -> Vec<Vec<(f64, f64)>> {
    let mut segments = Vec::new();
    let mut current = Vec::new();
    for (&px, &py) in x.iter().zip(y) {
        if px.is_finite() && py.is_finite() {
            current.push((px, py));
        } else if !current.is_empty() {
            segments.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        segments.push(current);
    }
    segments
}

fn draw_error<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("Drawing failed: {err}")
}

fn render_svg(figure: &Figure, width: u32, height: u32) -> Result<String> {
    let bounds = figure
        .bounds()
        .context("Figure has no finite points to draw.")?;
    let (x_min, x_max) = padded(bounds.x);
    let (y_min, y_max) = padded(bounds.y);
    let layout = &figure.layout;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(draw_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(figure.title(), ("sans-serif", layout.font.size))
            .margin(20)
            .x_label_area_size(60)
            .y_label_area_size(80)
            .build_cartesian_2d(x_min..x_max, y_min..y_max)
            .map_err(draw_error)?;

        let mut mesh = chart.configure_mesh();
        mesh.x_desc(layout.xaxis.title.text.as_str())
            .y_desc(layout.yaxis.title.text.as_str())
            .axis_desc_style(("sans-serif", layout.xaxis.title.font.map_or(20, |f| f.size)))
            .label_style(("sans-serif", layout.xaxis.tickfont.size));
        if !layout.xaxis.showgrid {
            mesh.disable_mesh();
        }
        mesh.draw().map_err(draw_error)?;

        for (index, trace) in figure.data.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            match trace.mode {
                Mode::Lines => {
                    let stroke = trace.line.map_or(2.0, |l| l.width).round().max(1.0) as u32;
                    let style = color.stroke_width(stroke);
                    let mut labelled = false;
                    for segment in finite_segments(&trace.x, &trace.y) {
                        let series = chart
                            .draw_series(LineSeries::new(segment, style))
                            .map_err(draw_error)?;
                        if !labelled {
                            series.label(trace.name.clone()).legend(move |(x, y)| {
                                PathElement::new(vec![(x, y), (x + 20, y)], style)
                            });
                            labelled = true;
                        }
                    }
                }
                Mode::Markers => {
                    let radius = (trace.marker.map_or(6.0, |m| m.size) / 2.0).round().max(1.0) as i32;
                    let style = color.filled();
                    let points: Vec<(f64, f64)> = finite_segments(&trace.x, &trace.y)
                        .into_iter()
                        .flatten()
                        .collect();
                    chart
                        .draw_series(points.into_iter().map(|p| Circle::new(p, radius, style)))
                        .map_err(draw_error)?
                        .label(trace.name.clone())
                        .legend(move |(x, y)| Circle::new((x + 10, y), radius, style));
                }
            }
        }

        if layout.legend.is_some() || figure.data.len() > 1 {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.5))
                .border_style(BLACK)
                .draw()
                .map_err(draw_error)?;
        }
        root.present().map_err(draw_error)?;
    }
    Ok(svg)
}
