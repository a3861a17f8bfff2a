//! Phase plane of a two-species competition model with carrying capacities.
//!
//! The chart overlays streamlines of the vector field `(eqn1, eqn2)` with
//! the four equilibria of the Lotka-Volterra competition model
//! `x1' = r1 x1 (K1 - x1 - a x2) / K1`, `x2' = r2 x2 (K2 - x2 - b x1) / K2`.

use crate::equilibrium::{linearize, Stability};
use crate::error::ValidationError;
use crate::figure::{Figure, Layout, Trace};
use crate::integrate::linspace;
use crate::render::{file_stem, ChartArtifact, ChartBackend};
use crate::settings::{PlotStyle, Settings};
use crate::streamline::{streamlines, StreamlineOptions};
use crate::system::OdeSystem;
use crate::time_series::PlotLabels;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{info, warn};

const STREAMLINE_DENSITY: f64 = 1.1;
const ARROW_DIVISOR: f64 = 60.0;
/// Replaces an axis start of exactly zero, where the competition field
/// vanishes along the whole axis.
const ZERO_SHIFT: f64 = 0.01;

/// One axis of the sampling mesh: `steps` points from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridAxis {
    pub start: f64,
    pub end: f64,
    pub steps: usize,
}

impl GridAxis {
    pub fn new(start: f64, end: f64, steps: usize) -> Self {
        Self { start, end, steps }
    }

    fn validate(&self, axis: &'static str) -> Result<(), ValidationError> {
        if self.steps < 2
            || !self.start.is_finite()
            || !self.end.is_finite()
            || self.end <= self.start
        {
            return Err(ValidationError::InvalidAxis { axis });
        }
        Ok(())
    }

    fn shifted(self) -> Self {
        if self.start == 0.0 {
            Self {
                start: ZERO_SHIFT,
                ..self
            }
        } else {
            self
        }
    }

    pub fn points(&self) -> Vec<f64> {
        linspace(self.start, self.end, self.steps)
    }
}

/// Carrying capacities and interaction coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub carry1: f64,
    pub carry2: f64,
    pub a: f64,
    pub b: f64,
}

impl Competition {
    /// `[E1, E2, E3, E4]`; E1 is `None` when `a * b == 1`.
    pub fn equilibria(&self) -> [Option<(f64, f64)>; 4] {
        let Competition { carry1, carry2, a, b } = *self;
        let denom = 1.0 - a * b;
        let coexistence = if denom == 0.0 {
            warn!(a, b, "Coexistence equilibrium is undefined when a * b == 1");
            None
        } else {
            Some(((carry1 - a * carry2) / denom, (carry2 - b * carry1) / denom))
        };
        [
            coexistence,
            Some((0.0, carry2)),
            Some((carry1, 0.0)),
            Some((0.0, 0.0)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Equilibrium {
    pub name: String,
    pub x: f64,
    pub y: f64,
    /// `None` when the field cannot be linearised there.
    pub stability: Option<Stability>,
}

/// `u = eqn1`, `v = eqn2` on the mesh, row-major with one row per y value.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorField {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub u: Vec<f64>,
    pub v: Vec<f64>,
}

#[derive(Debug)]
pub struct PhasePlaneWithCarry {
    x_axis: GridAxis,
    y_axis: GridAxis,
    labels: PlotLabels,
    competition: Competition,
    system: OdeSystem,
}

impl PhasePlaneWithCarry {
    #[allow(clippy::too_many_arguments)]
    pub fn new<F, G>(
        x_axis: GridAxis,
        y_axis: GridAxis,
        labels: PlotLabels,
        carry1: f64,
        carry2: f64,
        a: f64,
        b: f64,
        eqn1: F,
        eqn2: G,
    ) -> Result<Self, ValidationError>
    where
        F: Fn(f64, f64) -> f64 + 'static,
        G: Fn(f64, f64) -> f64 + 'static,
    {
        x_axis.validate("x")?;
        y_axis.validate("y")?;
        let (x_axis, y_axis) = (x_axis.shifted(), y_axis.shifted());
        // Shifting can swallow a very short axis.
        x_axis.validate("x")?;
        y_axis.validate("y")?;

        Ok(Self {
            x_axis,
            y_axis,
            labels,
            competition: Competition { carry1, carry2, a, b },
            system: OdeSystem::two_by_two(eqn1, eqn2),
        })
    }

    /// The x axis after the zero shift.
    pub fn x_axis(&self) -> GridAxis {
        self.x_axis
    }

    pub fn y_axis(&self) -> GridAxis {
        self.y_axis
    }

    pub fn labels(&self) -> &PlotLabels {
        &self.labels
    }

    pub fn competition(&self) -> Competition {
        self.competition
    }

    /// Equilibria in chart order, each classified from the Jacobian of the
    /// supplied equations.
    pub fn equilibria(&self) -> Vec<Equilibrium> {
        self.competition
            .equilibria()
            .into_iter()
            .enumerate()
            .filter_map(|(i, point)| {
                let (x, y) = point?;
                let stability = match linearize(&self.system, &[x, y]) {
                    Ok(linear) => Some(linear.stability),
                    Err(err) => {
                        warn!("Could not classify equilibrium {}: {err:#}", i + 1);
                        None
                    }
                };
                Some(Equilibrium {
                    name: format!("Equilibrium {}", i + 1),
                    x,
                    y,
                    stability,
                })
            })
            .collect()
    }

    pub fn vector_field(&self) -> VectorField {
        let x = self.x_axis.points();
        let y = self.y_axis.points();
        let mut u = Vec::with_capacity(x.len() * y.len());
        let mut v = Vec::with_capacity(x.len() * y.len());
        for &yj in &y {
            for &xi in &x {
                let rates = self.system.evaluate(&[xi, yj]);
                u.push(rates[0]);
                v.push(rates[1]);
            }
        }
        VectorField { x, y, u, v }
    }

    pub fn streamline_options(&self) -> StreamlineOptions {
        StreamlineOptions {
            density: STREAMLINE_DENSITY,
            angle: PI / 9.0,
            arrow_scale: (self.x_axis.end - self.x_axis.start) / ARROW_DIVISOR,
        }
    }

    /// Streamlines first, then one marker trace per equilibrium.
    pub fn figure(&self, style: &PlotStyle) -> Result<Figure> {
        let field = self.vector_field();
        let lines = streamlines(
            &field.x,
            &field.y,
            &field.u,
            &field.v,
            self.streamline_options(),
        )
        .context("Failed to trace streamlines.")?;
        let count = lines.lines.len();

        let mut data = vec![lines.into_trace("Streamline")];
        for equilibrium in self.equilibria() {
            if let Some(stability) = equilibrium.stability {
                info!(
                    name = %equilibrium.name,
                    x = equilibrium.x,
                    y = equilibrium.y,
                    %stability,
                    stable = stability.is_stable(),
                    "Equilibrium"
                );
            }
            data.push(
                Trace::markers(equilibrium.name, vec![equilibrium.x], vec![equilibrium.y])
                    .with_marker_size(style.marker_size),
            );
        }
        info!(title = %self.labels.title, streamlines = count, "Built phase plane");

        let layout = Layout::styled(
            &self.labels.title,
            &self.labels.x_label,
            &self.labels.y_label,
            style,
        );
        Ok(Figure::new(data, layout))
    }

    pub fn plot(&self, settings: &Settings, backend: &dyn ChartBackend) -> Result<ChartArtifact> {
        let figure = self.figure(&settings.style)?;
        backend.publish(&figure, &file_stem(&self.labels.title))
    }
}
