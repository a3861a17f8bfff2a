//! Ready-made examples for class.

use crate::error::ValidationError;
use crate::phase_plane::{GridAxis, PhasePlaneWithCarry};
use crate::render::{ChartArtifact, ChartBackend};
use crate::settings::Settings;
use crate::system::OdeSystem;
use crate::time_series::{Domain, PlotLabels, TimeSeriesPlot};
use anyhow::Result;

// Lotka-Volterra competition between two populations.
const R1: f64 = 0.15;
const K1: f64 = 50.0;
const A: f64 = 0.2;
const R2: f64 = 0.3;
const K2: f64 = 60.0;
const B: f64 = 0.6;

fn competition_rate1(x1: f64, x2: f64) -> f64 {
    R1 * x1 * (K1 - x1 - A * x2) / K1
}

fn competition_rate2(x1: f64, x2: f64) -> f64 {
    R2 * x2 * (K2 - B * x1 - x2) / K2
}

pub fn competition_time_series() -> Result<TimeSeriesPlot, ValidationError> {
    TimeSeriesPlot::two_by_two(
        Domain::new(0.0, 100.0, 200),
        PlotLabels::new("Demo: 2x2 Nonlinear ODE System", "time (days)", "population"),
        "Population 1",
        "Population 2",
        competition_rate1,
        competition_rate2,
        [1.0, 1.0],
    )
}

/// Model A of GPVI receptor signalling in platelets from Dunster et al.
/// (2015): ligand binding, receptor phosphorylation and Syk recruitment.
pub fn dunster_model_a() -> Result<TimeSeriesPlot, ValidationError> {
    let k_1 = 8.0;
    let k_m1 = 3.02e-2;
    let v_e = 3.3e-9;
    let v_p = 7.4e-18;
    let avogadro = 6.0221409e23;
    let k_2 = 3.02e-2;
    let k_3 = 9.55e5;
    let rho_1 = 5.13e-1;
    let gamma_1 = 3.53;

    // Second-order rates converted to molecules in the platelet and the
    // extracellular volume.
    let syk_binding = k_3 / (v_p * avogadro);
    let ligand_scale = 1.0 / (v_e * avogadro);

    // State: [g, G, G_p, G_b0, G_b1, L, s]
    let system = OdeSystem::new()
        .with_equation(move |x: &[f64]| -k_1 * x[0] * x[5] + k_m1 * x[1])
        .with_equation(move |x: &[f64]| k_1 * x[0] * x[5] - k_m1 * x[1] - k_2 * x[1])
        .with_equation(move |x: &[f64]| k_2 * x[1] - syk_binding * x[2] * x[6])
        .with_equation(move |x: &[f64]| {
            syk_binding * x[2] * x[6] - rho_1 * x[3] + gamma_1 * x[4]
        })
        .with_equation(move |x: &[f64]| rho_1 * x[3] - gamma_1 * x[4])
        .with_equation(move |x: &[f64]| {
            ligand_scale * (-k_1 * x[0] * x[5] + k_m1 * x[1])
        })
        .with_equation(move |x: &[f64]| -syk_binding * x[6] * x[2]);

    let var_labels = [
        "GPVI",
        "Ligand-GPVI Complex",
        "Phosphorylated Receptor",
        "Bound Syk",
        "Phosphorylated Syk",
        "Ligand",
        "Cytosolic Syk",
    ]
    .map(String::from)
    .to_vec();

    TimeSeriesPlot::new(
        Domain::new(0.0, 250.0, 2500),
        PlotLabels::new(
            "Demo: Model A, Dunster et al. (2015)",
            "time (seconds)",
            "molecules",
        ),
        var_labels,
        system,
        vec![5000.0, 0.0, 0.0, 0.0, 0.0, 3e-2, 2763.0],
    )
}

pub fn competition_phase_plane() -> Result<PhasePlaneWithCarry, ValidationError> {
    PhasePlaneWithCarry::new(
        GridAxis::new(0.0, 100.0, 200),
        GridAxis::new(0.0, 100.0, 200),
        PlotLabels::new("Demo: 2x2 Phase Plane with Carry Capacity", "$N_1$", "$N_2$"),
        K1,
        K2,
        A,
        B,
        competition_rate1,
        competition_rate2,
    )
}

/// Publishes every demo chart through `backend`.
pub fn run_all(settings: &Settings, backend: &dyn ChartBackend) -> Result<Vec<ChartArtifact>> {
    Ok(vec![
        competition_time_series()?.plot(settings, backend)?,
        dunster_model_a()?.plot(settings, backend)?,
        competition_phase_plane()?.plot(settings, backend)?,
    ])
}

#[cfg(test)]
mod tests {
    use super::{competition_phase_plane, competition_time_series, dunster_model_a, run_all};
    use crate::render::JsonBackend;
    use crate::settings::{Settings, SolverSettings};

    #[test]
    fn competition_approaches_coexistence() {
        let plot = competition_time_series().expect("demo builds");
        let solution = plot.solve(&SolverSettings::default()).expect("solve");
        assert_eq!(solution.times.len(), 201);

        let last = solution.final_state().expect("final state");
        let expected = [38.0 / 0.88, 30.0 / 0.88];
        assert!((last[0] - expected[0]).abs() < 0.5, "got {last:?}");
        assert!((last[1] - expected[1]).abs() < 0.5, "got {last:?}");
    }

    #[test]
    fn dunster_model_conserves_receptor_and_syk() {
        let plot = dunster_model_a().expect("demo builds");
        assert_eq!(plot.var_labels().len(), 7);
        let solution = plot.solve(&SolverSettings::default()).expect("solve");
        assert_eq!(solution.times.len(), 2501);

        for row in solution.states.iter().step_by(250) {
            let receptor: f64 = row[..5].iter().sum();
            let syk = row[6] + row[3] + row[4];
            assert!((receptor - 5000.0).abs() < 1e-4, "receptor total {receptor}");
            assert!((syk - 2763.0).abs() < 1e-4, "syk total {syk}");
        }
        let last = solution.final_state().expect("final state");
        assert!(last[0] < 5000.0);
        assert!(last[6] < 2763.0);
    }

    #[test]
    fn phase_plane_demo_uses_shifted_axes() {
        let plane = competition_phase_plane().expect("demo builds");
        assert_eq!(plane.x_axis().start, 0.01);
        assert_eq!(plane.x_axis().steps, 200);
        assert_eq!(plane.equilibria().len(), 4);
    }

    #[test]
    fn run_all_publishes_three_charts() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dir = tmp.path().to_path_buf();
        let backend = JsonBackend {
            directory: dir.clone(),
        };
        let artifacts = run_all(&Settings::default(), &backend).expect("demos run");

        let names: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "demo_2x2_nonlinear_ode_system",
                "demo_model_a_dunster_et_al_2015",
                "demo_2x2_phase_plane_with_carry_capacity"
            ]
        );
    }
}
