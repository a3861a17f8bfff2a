//! Integration driver: states of a system sampled on a fixed output grid.

use crate::settings::{Method, SolverSettings};
use crate::solvers::{Tsit5, RK4};
use crate::traits::{DynamicalSystem, EmbeddedStepper, Steppable};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::cell::Cell;
use std::io;
use tracing::debug;

/// `n` evenly spaced points from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let denom = (n - 1) as f64;
            let mut points: Vec<f64> = (0..n)
                .map(|i| start + (end - start) * (i as f64) / denom)
                .collect();
            points[n - 1] = end;
            points
        }
    }
}

/// Output times for a domain split into `steps` intervals.
pub fn time_grid(start: f64, end: f64, steps: usize) -> Vec<f64> {
    linspace(start, end, steps + 1)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SolverStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub evaluations: usize,
}

/// States of the system at each requested time. Row `i` of `states` belongs
/// to `times[i]`; the first row is the initial condition.
#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
    pub stats: SolverStats,
}

impl Solution {
    pub fn dimension(&self) -> usize {
        self.states.first().map_or(0, Vec::len)
    }

    /// Trajectory of one variable across the grid.
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.states.iter().map(|row| row[index]).collect()
    }

    pub fn final_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }

    /// Writes the solution as a table: one time column named `x_label`, then
    /// one column per variable.
    pub fn write_csv<W: io::Write>(
        &self,
        writer: W,
        x_label: &str,
        labels: &[String],
    ) -> Result<()> {
        if labels.len() != self.dimension() {
            bail!(
                "Expected {} column labels, got {}.",
                self.dimension(),
                labels.len()
            );
        }
        let mut out = csv::Writer::from_writer(writer);
        let mut header = Vec::with_capacity(labels.len() + 1);
        header.push(x_label.to_string());
        header.extend(labels.iter().cloned());
        out.write_record(&header)?;

        for (t, row) in self.times.iter().zip(&self.states) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(t.to_string());
            record.extend(row.iter().map(f64::to_string));
            out.write_record(&record)?;
        }
        out.flush().context("Failed to flush solution table.")?;
        Ok(())
    }
}

struct Counted<'a, S> {
    inner: &'a S,
    calls: Cell<usize>,
}

impl<S: DynamicalSystem<f64>> DynamicalSystem<f64> for Counted<'_, S> {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn apply(&self, t: f64, x: &[f64], out: &mut [f64]) {
        self.calls.set(self.calls.get() + 1);
        self.inner.apply(t, x, out);
    }
}

/// Integrates `system` from `init` at `grid[0]` and records the state at
/// every grid point.
pub fn integrate(
    system: &impl DynamicalSystem<f64>,
    init: &[f64],
    grid: &[f64],
    settings: &SolverSettings,
) -> Result<Solution> {
    settings.validate()?;
    let dim = system.dimension();
    if init.len() != dim {
        bail!(
            "Initial state dimension mismatch. Expected {}, got {}.",
            dim,
            init.len()
        );
    }
    if grid.is_empty() {
        bail!("Output grid is empty.");
    }
    if grid.iter().any(|t| !t.is_finite()) {
        bail!("Output grid contains a non-finite time.");
    }
    if grid.windows(2).any(|w| w[1] <= w[0]) {
        bail!("Output grid must be strictly increasing.");
    }

    let counted = Counted {
        inner: system,
        calls: Cell::new(0),
    };
    let mut derivative = vec![0.0; dim];
    counted.apply(grid[0], init, &mut derivative);
    if derivative.iter().any(|v| !v.is_finite()) {
        bail!(
            "Right-hand side produced a non-finite value at t = {}.",
            grid[0]
        );
    }

    let mut solution = match settings.method {
        Method::Adaptive => integrate_adaptive(&counted, init, grid, settings)?,
        Method::Rk4 => {
            integrate_fixed(&counted, RK4::<f64>::new(dim), init, grid, settings.substeps)?
        }
        Method::Tsit5 => {
            integrate_fixed(&counted, Tsit5::<f64>::new(dim), init, grid, settings.substeps)?
        }
    };
    solution.stats.evaluations = counted.calls.get();

    debug!(
        method = ?settings.method,
        points = solution.times.len(),
        accepted = solution.stats.accepted_steps,
        rejected = solution.stats.rejected_steps,
        evaluations = solution.stats.evaluations,
        "integration finished"
    );
    Ok(solution)
}

fn integrate_fixed<S: Steppable<f64>>(
    system: &impl DynamicalSystem<f64>,
    mut stepper: S,
    init: &[f64],
    grid: &[f64],
    substeps: usize,
) -> Result<Solution> {
    let mut state = init.to_vec();
    let mut states = Vec::with_capacity(grid.len());
    let mut stats = SolverStats::default();
    states.push(state.clone());

    for pair in grid.windows(2) {
        let (start, target) = (pair[0], pair[1]);
        let dt = (target - start) / substeps as f64;
        let mut t = start;
        for _ in 0..substeps {
            stepper.step(system, &mut t, &mut state, dt);
            stats.accepted_steps += 1;
        }
        if state.iter().any(|v| !v.is_finite()) {
            bail!(
                "Solution became non-finite between t = {} and t = {}.",
                start,
                target
            );
        }
        states.push(state.clone());
    }

    Ok(Solution {
        times: grid.to_vec(),
        states,
        stats,
    })
}

fn error_norm(err: &[f64], before: &[f64], after: &[f64], settings: &SolverSettings) -> f64 {
    let sum: f64 = err
        .iter()
        .zip(before.iter().zip(after))
        .map(|(e, (y0, y1))| {
            let scale = settings.atol + settings.rtol * y0.abs().max(y1.abs());
            (e / scale) * (e / scale)
        })
        .sum();
    (sum / err.len() as f64).sqrt()
}

fn integrate_adaptive(
    system: &impl DynamicalSystem<f64>,
    init: &[f64],
    grid: &[f64],
    settings: &SolverSettings,
) -> Result<Solution> {
    let dim = init.len();
    let mut stepper = Tsit5::<f64>::new(dim);
    let exponent = -1.0 / (stepper.error_order() as f64 + 1.0);
    let mut state = init.to_vec();
    let mut candidate = vec![0.0; dim];
    let mut err = vec![0.0; dim];
    let mut states = Vec::with_capacity(grid.len());
    let mut stats = SolverStats::default();
    states.push(state.clone());

    let mut t = grid[0];
    let mut h = if settings.initial_step > 0.0 {
        settings.initial_step
    } else if grid.len() > 1 {
        (grid[1] - grid[0]) * 1e-2
    } else {
        0.0
    };
    let mut attempts = 0usize;

    for &target in &grid[1..] {
        while t < target {
            if attempts >= settings.max_steps {
                bail!(
                    "Integrator exceeded {} steps at t = {} before reaching t = {}.",
                    settings.max_steps,
                    t,
                    target
                );
            }
            attempts += 1;

            let remaining = target - t;
            let lands = h >= remaining;
            let dt = if lands { remaining } else { h };

            stepper.try_step(system, t, &state, dt, &mut candidate, &mut err);
            let mut norm = error_norm(&err, &state, &candidate, settings);
            if candidate.iter().any(|v| !v.is_finite()) {
                norm = f64::INFINITY;
            }

            let accepted = norm <= 1.0;
            if accepted {
                t = if lands { target } else { t + dt };
                state.copy_from_slice(&candidate);
                stats.accepted_steps += 1;
            } else {
                stats.rejected_steps += 1;
            }

            let factor = if norm == 0.0 {
                5.0
            } else if norm.is_finite() {
                (0.9 * norm.powf(exponent)).clamp(0.2, 5.0)
            } else {
                0.2
            };
            let proposed = dt * factor;
            h = if accepted && lands {
                h.max(proposed)
            } else {
                proposed
            };

            let min_step = 1e-14 * t.abs().max(1.0);
            if h < min_step {
                bail!(
                    "Step size underflow at t = {}; the right-hand side may be singular or non-finite there.",
                    t
                );
            }
        }
        states.push(state.clone());
    }

    Ok(Solution {
        times: grid.to_vec(),
        states,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::{integrate, linspace, time_grid};
    use crate::settings::{Method, SolverSettings};
    use crate::system::OdeSystem;

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn logistic(r: f64, k: f64) -> OdeSystem {
        OdeSystem::new().with_equation(move |x: &[f64]| r * x[0] * (k - x[0]) / k)
    }

    fn logistic_exact(r: f64, k: f64, x0: f64, t: f64) -> f64 {
        k / (1.0 + (k - x0) / x0 * (-r * t).exp())
    }

    #[test]
    fn linspace_includes_both_ends() {
        let points = linspace(0.0, 1.0, 5);
        assert_eq!(points, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1), vec![3.0]);
        assert!(linspace(3.0, 4.0, 0).is_empty());
    }

    #[test]
    fn time_grid_has_steps_plus_one_points() {
        let grid = time_grid(0.0, 100.0, 200);
        assert_eq!(grid.len(), 201);
        assert_eq!(grid[0], 0.0);
        assert_eq!(grid[200], 100.0);
        assert!((grid[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn adaptive_matches_logistic_solution() {
        let system = logistic(0.15, 50.0);
        let grid = time_grid(0.0, 100.0, 200);
        let solution = integrate(&system, &[1.0], &grid, &SolverSettings::default())
            .expect("integration should succeed");

        assert_eq!(solution.times.len(), 201);
        assert_eq!(solution.states[0], vec![1.0]);
        for (t, row) in solution.times.iter().zip(&solution.states) {
            let exact = logistic_exact(0.15, 50.0, 1.0, *t);
            assert!(
                (row[0] - exact).abs() < 1e-6,
                "t = {t}: got {}, expected {exact}",
                row[0]
            );
        }
        assert!(solution.stats.accepted_steps > 0);
        assert!(solution.stats.evaluations > solution.stats.accepted_steps);
    }

    #[test]
    fn fixed_step_methods_agree_with_adaptive() {
        let system = OdeSystem::two_by_two(|_x1, x2| x2, |x1, _x2| -x1);
        let grid = time_grid(0.0, 3.0, 30);
        for method in [Method::Rk4, Method::Tsit5] {
            let settings = SolverSettings {
                method,
                substeps: 20,
                ..SolverSettings::default()
            };
            let solution =
                integrate(&system, &[1.0, 0.0], &grid, &settings).expect("integration");
            let last = solution.final_state().expect("final state");
            assert!((last[0] - 3.0f64.cos()).abs() < 1e-6, "{method:?}");
            assert!((last[1] + 3.0f64.sin()).abs() < 1e-6, "{method:?}");
            assert_eq!(solution.stats.accepted_steps, 30 * 20);
        }
    }

    #[test]
    fn integrate_rejects_dimension_mismatch() {
        let system = logistic(1.0, 1.0);
        assert_err_contains(
            integrate(&system, &[1.0, 2.0], &[0.0, 1.0], &SolverSettings::default()),
            "dimension mismatch",
        );
    }

    #[test]
    fn integrate_rejects_unordered_grid() {
        let system = logistic(1.0, 1.0);
        assert_err_contains(
            integrate(&system, &[0.5], &[0.0, 1.0, 1.0], &SolverSettings::default()),
            "strictly increasing",
        );
    }

    #[test]
    fn integrate_reports_non_finite_right_hand_side() {
        let system = OdeSystem::new().with_equation(|x: &[f64]| x[0].ln());
        assert_err_contains(
            integrate(&system, &[-1.0], &[0.0, 1.0], &SolverSettings::default()),
            "non-finite",
        );
    }

    #[test]
    fn integrate_stops_at_step_budget() {
        let system = logistic(0.15, 50.0);
        let settings = SolverSettings {
            max_steps: 3,
            ..SolverSettings::default()
        };
        assert_err_contains(
            integrate(&system, &[1.0], &time_grid(0.0, 100.0, 200), &settings),
            "exceeded 3 steps",
        );
    }

    #[test]
    fn fixed_step_reports_interval_where_solution_blows_up() {
        let system =
            OdeSystem::new().with_equation(|x: &[f64]| if x[0] < 0.3 { 1.0 } else { f64::NAN });
        let settings = SolverSettings {
            method: Method::Rk4,
            ..SolverSettings::default()
        };
        assert_err_contains(
            integrate(&system, &[0.0], &[0.0, 0.25, 0.5, 0.75], &settings),
            "Solution became non-finite between t = 0.25 and t = 0.5",
        );
    }

    #[test]
    fn adaptive_reports_step_size_underflow() {
        let system =
            OdeSystem::new().with_equation(|x: &[f64]| if x[0] == 1.0 { 1.0 } else { f64::NAN });
        assert_err_contains(
            integrate(&system, &[1.0], &[0.0, 1.0], &SolverSettings::default()),
            "Step size underflow at t = 0;",
        );
    }

    #[test]
    fn solution_writes_labeled_table() {
        let system = logistic(1.0, 10.0);
        let solution = integrate(
            &system,
            &[1.0],
            &time_grid(0.0, 1.0, 2),
            &SolverSettings::default(),
        )
        .expect("integration");

        let mut buffer = Vec::new();
        solution
            .write_csv(&mut buffer, "time", &["N".to_string()])
            .expect("csv should write");
        let text = String::from_utf8(buffer).expect("utf8");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "time,N");
        assert!(lines[1].starts_with("0,1"));
    }
}
