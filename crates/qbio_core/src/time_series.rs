//! Time-course charts: every variable of a system plotted against time.

use crate::error::ValidationError;
use crate::figure::{Figure, Layout, Trace};
use crate::integrate::{integrate, time_grid, Solution};
use crate::render::{file_stem, ChartArtifact, ChartBackend};
use crate::settings::{PlotStyle, Settings, SolverSettings};
use crate::system::OdeSystem;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::info;

/// Time span `[start, end]` cut into `steps` equal intervals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    pub start: f64,
    pub end: f64,
    pub steps: usize,
}

impl Domain {
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self { start, end, steps }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.start.is_finite() || !self.end.is_finite() || self.end <= self.start {
            return Err(ValidationError::InvalidDomain {
                start: self.start,
                end: self.end,
            });
        }
        if self.steps == 0 {
            return Err(ValidationError::ZeroSteps);
        }
        Ok(())
    }

    /// The `steps + 1` output times.
    pub fn grid(&self) -> Vec<f64> {
        time_grid(self.start, self.end, self.steps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotLabels {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
}

impl PlotLabels {
    pub fn new(
        title: impl Into<String>,
        x_label: impl Into<String>,
        y_label: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.into(),
            y_label: y_label.into(),
        }
    }
}

/// A validated bundle for one time-course chart of up to ten variables.
#[derive(Debug)]
pub struct TimeSeriesPlot {
    domain: Domain,
    labels: PlotLabels,
    var_labels: Vec<String>,
    system: OdeSystem,
    init_conds: Vec<f64>,
}

impl TimeSeriesPlot {
    pub fn new(
        domain: Domain,
        labels: PlotLabels,
        var_labels: Vec<String>,
        system: OdeSystem,
        init_conds: Vec<f64>,
    ) -> Result<Self, ValidationError> {
        system.validate_initial_conditions(&init_conds)?;
        if var_labels.len() != init_conds.len() {
            return Err(ValidationError::LabelCountMismatch {
                labels: var_labels.len(),
                conditions: init_conds.len(),
            });
        }
        domain.validate()?;

        Ok(Self {
            domain,
            labels,
            var_labels,
            system,
            init_conds,
        })
    }

    /// The two-variable form: `x1' = eqn1(x1, x2)`, `x2' = eqn2(x1, x2)`.
    pub fn two_by_two<F, G>(
        domain: Domain,
        labels: PlotLabels,
        x1_label: impl Into<String>,
        x2_label: impl Into<String>,
        eqn1: F,
        eqn2: G,
        init_conds: [f64; 2],
    ) -> Result<Self, ValidationError>
    where
        F: Fn(f64, f64) -> f64 + 'static,
        G: Fn(f64, f64) -> f64 + 'static,
    {
        Self::new(
            domain,
            labels,
            vec![x1_label.into(), x2_label.into()],
            OdeSystem::two_by_two(eqn1, eqn2),
            init_conds.to_vec(),
        )
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn labels(&self) -> &PlotLabels {
        &self.labels
    }

    pub fn var_labels(&self) -> &[String] {
        &self.var_labels
    }

    pub fn init_conds(&self) -> &[f64] {
        &self.init_conds
    }

    pub fn system(&self) -> &OdeSystem {
        &self.system
    }

    pub fn solve(&self, settings: &SolverSettings) -> Result<Solution> {
        let solution = integrate(
            &self.system,
            &self.init_conds,
            &self.domain.grid(),
            settings,
        )
        .with_context(|| format!("Failed to solve '{}'", self.labels.title))?;

        info!(
            title = %self.labels.title,
            variables = self.system.dimension(),
            points = solution.times.len(),
            evaluations = solution.stats.evaluations,
            "Solved time series"
        );
        Ok(solution)
    }

    /// One line per variable, named by its label.
    pub fn figure(&self, solution: &Solution, style: &PlotStyle) -> Result<Figure> {
        if solution.dimension() != self.var_labels.len() {
            bail!(
                "Solution has {} variables but the chart has {} labels.",
                solution.dimension(),
                self.var_labels.len()
            );
        }
        let data = self
            .var_labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                Trace::lines(label.as_str(), solution.times.clone(), solution.column(i))
                    .with_line_width(style.line_width)
            })
            .collect();

        let layout = Layout::styled(
            &self.labels.title,
            &self.labels.x_label,
            &self.labels.y_label,
            style,
        )
        .with_corner_legend(style);

        Ok(Figure::new(data, layout))
    }

    /// Solve, build the chart and hand it to `backend`.
    pub fn plot(&self, settings: &Settings, backend: &dyn ChartBackend) -> Result<ChartArtifact> {
        let solution = self.solve(&settings.solver)?;
        let figure = self.figure(&solution, &settings.style)?;
        backend.publish(&figure, &file_stem(&self.labels.title))
    }

    /// The solution as a table headed by the x label and variable labels.
    pub fn write_csv<W: io::Write>(&self, solution: &Solution, writer: W) -> Result<()> {
        solution.write_csv(writer, &self.labels.x_label, &self.var_labels)
    }
}
