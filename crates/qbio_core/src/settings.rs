//! Run settings: solver tolerances, chart styling, output and logging.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! usable configuration. Values can be overridden from the environment with
//! the `QBIO` prefix, e.g. `QBIO__SOLVER__RTOL=1e-8`.

use crate::error::ValidationError;
use anyhow::{Context, Result};
use config::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub solver: SolverSettings,
    pub style: PlotStyle,
    pub output: OutputSettings,
    pub log: LogSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.solver.validate()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Tsit5 with error control, stopping exactly on every output time.
    #[default]
    Adaptive,
    /// Fixed-step classic Runge-Kutta.
    Rk4,
    /// Fixed-step Tsitouras 5th order.
    Tsit5,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverSettings {
    pub method: Method,
    pub rtol: f64,
    pub atol: f64,
    /// Budget of attempted steps for one call to `integrate`.
    pub max_steps: usize,
    /// Equal sub-steps per output interval for the fixed-step methods.
    pub substeps: usize,
    /// First trial step of the adaptive method; 0 picks one from the grid.
    pub initial_step: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            method: Method::Adaptive,
            rtol: 1e-10,
            atol: 1e-12,
            max_steps: 1_000_000,
            substeps: 10,
            initial_step: 0.0,
        }
    }
}

impl SolverSettings {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.rtol > 0.0) {
            return Err(ValidationError::NonPositiveSetting("rtol"));
        }
        if !(self.atol > 0.0) {
            return Err(ValidationError::NonPositiveSetting("atol"));
        }
        if self.max_steps == 0 {
            return Err(ValidationError::NonPositiveSetting("max_steps"));
        }
        if self.substeps == 0 {
            return Err(ValidationError::NonPositiveSetting("substeps"));
        }
        if self.initial_step < 0.0 || !self.initial_step.is_finite() {
            return Err(ValidationError::NonPositiveSetting("initial_step"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlotStyle {
    pub font_size: u32,
    pub axis_title_size: u32,
    pub tick_size: u32,
    pub line_width: f64,
    pub marker_size: f64,
    pub zero_line_width: f64,
    pub show_grid: bool,
    pub x_ticks: String,
    pub y_ticks: String,
    pub legend_border_color: String,
    pub legend_background: String,
    pub legend_border_width: f64,
    pub legend_font_size: u32,
    /// Pixel size of static renders.
    pub width: u32,
    pub height: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        Self {
            font_size: 22,
            axis_title_size: 20,
            tick_size: 14,
            line_width: 5.0,
            marker_size: 14.0,
            zero_line_width: 1.0,
            show_grid: false,
            x_ticks: "outside".to_string(),
            y_ticks: "inside".to_string(),
            legend_border_color: "#404040".to_string(),
            legend_background: "rgba(255, 255, 255, 0.5)".to_string(),
            legend_border_width: 1.0,
            legend_font_size: 16,
            width: 1200,
            height: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Json,
    #[default]
    Html,
    Svg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSettings {
    pub directory: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("plots"),
            format: OutputFormat::Html,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Reads a TOML settings file, layered under `QBIO__*` environment variables.
pub fn read_settings(path: impl AsRef<Path>) -> Result<Settings> {
    read_settings_with_prefix(path, "QBIO")
}

/// As `read_settings`, with overrides taken from `<prefix>__SECTION__KEY`.
pub fn read_settings_with_prefix(path: impl AsRef<Path>, prefix: &str) -> Result<Settings> {
    let path = path.as_ref();
    let parsed = Config::builder()
        .add_source(config::File::from(path).format(config::FileFormat::Toml))
        .add_source(config::Environment::with_prefix(prefix).separator("__"))
        .build()
        .with_context(|| format!("Failed to read settings from {}", path.display()))?;

    let settings: Settings = parsed
        .try_deserialize()
        .context("Settings file has an unexpected shape.")?;
    settings.validate()?;
    Ok(settings)
}
