//! Chart descriptions in the shape plotly.js consumes.
//!
//! A `Figure` is plain data: the façades build one, and a `ChartBackend`
//! decides what to do with it. Non-finite coordinates serialize as `null`,
//! which plotly draws as a break in the line.

use crate::settings::PlotStyle;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Mode {
    #[serde(rename = "lines")]
    Lines,
    #[serde(rename = "markers")]
    Markers,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Line {
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Marker {
    pub size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Font {
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

impl Title {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
        }
    }
}

/// A scatter trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trace {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub mode: Mode,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<Line>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<Marker>,
}

impl Trace {
    pub fn lines(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            kind: "scatter",
            x,
            y,
            mode: Mode::Lines,
            name: name.into(),
            line: None,
            marker: None,
        }
    }

    pub fn markers(name: impl Into<String>, x: Vec<f64>, y: Vec<f64>) -> Self {
        Self {
            mode: Mode::Markers,
            ..Self::lines(name, x, y)
        }
    }

    pub fn with_line_width(mut self, width: f64) -> Self {
        self.line = Some(Line { width });
        self
    }

    pub fn with_marker_size(mut self, size: f64) -> Self {
        self.marker = Some(Marker { size });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Axis {
    pub title: Title,
    pub showgrid: bool,
    pub tickfont: Font,
    pub zerolinewidth: f64,
    pub ticks: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub x: f64,
    pub y: f64,
    pub bordercolor: String,
    pub bgcolor: String,
    pub borderwidth: f64,
    pub font: Font,
    pub xanchor: String,
    pub yanchor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Layout {
    pub title: Title,
    pub autosize: bool,
    pub font: Font,
    pub xaxis: Axis,
    pub yaxis: Axis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
}

impl Layout {
    /// Title, axis titles and fonts shared by every chart.
    pub fn styled(title: &str, x_label: &str, y_label: &str, style: &PlotStyle) -> Self {
        let axis = |label: &str, ticks: &str| Axis {
            title: Title {
                text: label.to_string(),
                font: Some(Font {
                    size: style.axis_title_size,
                }),
            },
            showgrid: style.show_grid,
            tickfont: Font {
                size: style.tick_size,
            },
            zerolinewidth: style.zero_line_width,
            ticks: ticks.to_string(),
        };

        Self {
            title: Title::plain(title),
            autosize: true,
            font: Font {
                size: style.font_size,
            },
            xaxis: axis(x_label, &style.x_ticks),
            yaxis: axis(y_label, &style.y_ticks),
            legend: None,
        }
    }

    /// Adds a legend anchored in the top-right corner of the plot area.
    pub fn with_corner_legend(mut self, style: &PlotStyle) -> Self {
        self.legend = Some(Legend {
            x: 1.0,
            y: 1.0,
            bordercolor: style.legend_border_color.clone(),
            bgcolor: style.legend_background.clone(),
            borderwidth: style.legend_border_width,
            font: Font {
                size: style.legend_font_size,
            },
            xanchor: "right".to_string(),
            yanchor: "top".to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Figure {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: (f64, f64),
    pub y: (f64, f64),
}

impl Figure {
    pub fn new(data: Vec<Trace>, layout: Layout) -> Self {
        Self { data, layout }
    }

    pub fn title(&self) -> &str {
        &self.layout.title.text
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize figure.")
    }

    /// Extent of all finite points, or `None` for a figure with no data.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for trace in &self.data {
            for (&x, &y) in trace.x.iter().zip(&trace.y) {
                if !x.is_finite() || !y.is_finite() {
                    continue;
                }
                bounds = Some(match bounds {
                    None => Bounds {
                        x: (x, x),
                        y: (y, y),
                    },
                    Some(b) => Bounds {
                        x: (b.x.0.min(x), b.x.1.max(x)),
                        y: (b.y.0.min(y), b.y.1.max(y)),
                    },
                });
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::{Figure, Layout, Trace};
    use crate::settings::PlotStyle;
    use serde_json::Value;

    fn sample() -> Figure {
        let style = PlotStyle::default();
        Figure::new(
            vec![
                Trace::lines("a", vec![0.0, 1.0, f64::NAN, 2.0], vec![1.0, 2.0, f64::NAN, -1.0])
                    .with_line_width(style.line_width),
                Trace::markers("b", vec![5.0], vec![3.0]).with_marker_size(style.marker_size),
            ],
            Layout::styled("Title", "time", "population", &style).with_corner_legend(&style),
        )
    }

    #[test]
    fn serializes_in_plotly_shape() {
        let json: Value = serde_json::from_str(&sample().to_json().expect("json")).expect("parse");

        assert_eq!(json["data"][0]["type"], "scatter");
        assert_eq!(json["data"][0]["mode"], "lines");
        assert_eq!(json["data"][0]["line"]["width"], 5.0);
        assert!(json["data"][0].get("marker").is_none());
        assert_eq!(json["data"][1]["mode"], "markers");
        assert_eq!(json["data"][1]["marker"]["size"], 14.0);
        assert_eq!(json["layout"]["title"]["text"], "Title");
        assert_eq!(json["layout"]["font"]["size"], 22);
        assert_eq!(json["layout"]["xaxis"]["ticks"], "outside");
        assert_eq!(json["layout"]["yaxis"]["ticks"], "inside");
        assert_eq!(json["layout"]["xaxis"]["title"]["font"]["size"], 20);
        assert_eq!(json["layout"]["legend"]["xanchor"], "right");
    }

    #[test]
    fn non_finite_points_become_null() {
        let json: Value = serde_json::from_str(&sample().to_json().expect("json")).expect("parse");
        assert!(json["data"][0]["x"][2].is_null());
        assert!(json["data"][0]["y"][2].is_null());
    }

    #[test]
    fn bounds_skip_breaks() {
        let bounds = sample().bounds().expect("bounds");
        assert_eq!(bounds.x, (0.0, 5.0));
        assert_eq!(bounds.y, (-1.0, 3.0));
    }

    #[test]
    fn empty_figure_has_no_bounds() {
        let style = PlotStyle::default();
        let figure = Figure::new(Vec::new(), Layout::styled("t", "x", "y", &style));
        assert!(figure.bounds().is_none());
    }
}
