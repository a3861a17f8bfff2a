use crate::traits::DynamicalSystem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::linalg::SVD;
use nalgebra::{Complex, DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Damped Newton iteration with step halving.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    /// Fraction of the full Newton step tried first.
    pub damping: f64,
    pub tolerance: f64,
    /// Times a step may be halved when it does not shrink the residual.
    pub max_halvings: usize,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 25,
            damping: 1.0,
            tolerance: 1e-9,
            max_halvings: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EigenPair {
    pub value: ComplexNumber,
    pub vector: Vec<ComplexNumber>,
}

/// Local behaviour of a flow near an equilibrium, read off the eigenvalues of
/// its Jacobian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    StableNode,
    UnstableNode,
    StableFocus,
    UnstableFocus,
    Saddle,
    Centre,
    /// At least one eigenvalue with zero real part, so linearisation decides
    /// nothing.
    Degenerate,
}

impl Stability {
    pub fn from_eigenvalues(values: &[ComplexNumber]) -> Self {
        let scale = values
            .iter()
            .map(|v| v.re.hypot(v.im))
            .fold(1.0_f64, f64::max);
        let zero = 1e-9 * scale;

        let on_axis = values.iter().filter(|v| v.re.abs() <= zero).count();
        let rotating = values.iter().any(|v| v.im.abs() > zero);
        if on_axis == values.len() && rotating && values.iter().all(|v| v.im.abs() > zero) {
            return Stability::Centre;
        }
        if on_axis > 0 {
            return Stability::Degenerate;
        }

        let negative = values.iter().filter(|v| v.re < 0.0).count();
        if negative == values.len() {
            if rotating {
                Stability::StableFocus
            } else {
                Stability::StableNode
            }
        } else if negative == 0 {
            if rotating {
                Stability::UnstableFocus
            } else {
                Stability::UnstableNode
            }
        } else {
            Stability::Saddle
        }
    }

    pub fn is_stable(self) -> bool {
        matches!(self, Stability::StableNode | Stability::StableFocus)
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stability::StableNode => "stable node",
            Stability::UnstableNode => "unstable node",
            Stability::StableFocus => "stable focus",
            Stability::UnstableFocus => "unstable focus",
            Stability::Saddle => "saddle",
            Stability::Centre => "centre",
            Stability::Degenerate => "degenerate",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linearization {
    /// Row-major `dim x dim`.
    pub jacobian: Vec<f64>,
    pub eigenpairs: Vec<EigenPair>,
    pub stability: Stability,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquilibriumResult {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
    pub stable: bool,
    pub linearization: Linearization,
}

/// Finds a zero of the right-hand side near `initial_guess` and classifies it.
pub fn solve_equilibrium(
    system: &impl DynamicalSystem<f64>,
    initial_guess: &[f64],
    settings: NewtonSettings,
) -> Result<EquilibriumResult> {
    let dim = system.dimension();
    if dim == 0 {
        bail!("System has no equations.");
    }
    if initial_guess.len() != dim {
        bail!(
            "Initial guess dimension mismatch. Expected {}, got {}.",
            dim,
            initial_guess.len()
        );
    }
    if settings.max_steps == 0 || settings.damping <= 0.0 || settings.tolerance <= 0.0 {
        bail!("Newton settings need max_steps > 0, damping > 0 and tolerance > 0.");
    }

    let rhs = |x: &DVector<f64>| {
        let mut out = DVector::<f64>::zeros(dim);
        system.apply(0.0, x.as_slice(), out.as_mut_slice());
        out
    };

    let mut state = DVector::from_column_slice(initial_guess);
    let mut residual = rhs(&state);
    let mut iterations = 0usize;

    loop {
        let norm = residual.norm();
        if norm <= settings.tolerance {
            break;
        }
        if !norm.is_finite() {
            bail!("Right-hand side is not finite at {:?}.", state.as_slice());
        }
        if iterations == settings.max_steps {
            bail!(
                "Newton iteration did not converge in {} steps (residual {:e}).",
                settings.max_steps,
                norm
            );
        }

        let jac = DMatrix::from_row_slice(dim, dim, &jacobian(system, state.as_slice()));
        let delta = jac
            .lu()
            .solve(&residual)
            .ok_or_else(|| anyhow!("Jacobian is singular at {:?}.", state.as_slice()))?;

        let mut scale = settings.damping;
        let mut next = &state - &delta * scale;
        let mut next_residual = rhs(&next);
        for _ in 0..settings.max_halvings {
            if next_residual.norm() < norm {
                break;
            }
            scale *= 0.5;
            next = &state - &delta * scale;
            next_residual = rhs(&next);
        }

        state = next;
        residual = next_residual;
        iterations += 1;
    }

    let linearization = linearize(system, state.as_slice())?;
    debug!(
        iterations,
        stability = %linearization.stability,
        "Newton iteration converged"
    );
    Ok(EquilibriumResult {
        residual_norm: residual.norm(),
        state: state.as_slice().to_vec(),
        iterations,
        stable: linearization.stability.is_stable(),
        linearization,
    })
}

/// Jacobian, eigenpairs and stability class of `system` at `state`.
pub fn linearize(system: &impl DynamicalSystem<f64>, state: &[f64]) -> Result<Linearization> {
    let dim = system.dimension();
    if state.len() != dim {
        bail!(
            "State dimension mismatch. Expected {}, got {}.",
            dim,
            state.len()
        );
    }
    let jacobian = jacobian(system, state);
    if jacobian.iter().any(|v| !v.is_finite()) {
        bail!("Jacobian has non-finite entries at {:?}.", state);
    }
    let eigenpairs = compute_eigenpairs(dim, &jacobian)
        .context("Failed to compute eigenvalues/eigenvectors of Jacobian.")?;
    let values: Vec<ComplexNumber> = eigenpairs.iter().map(|p| p.value).collect();

    Ok(Linearization {
        jacobian,
        eigenpairs,
        stability: Stability::from_eigenvalues(&values),
    })
}

/// Row-major Jacobian by central differences.
pub fn jacobian(system: &impl DynamicalSystem<f64>, state: &[f64]) -> Vec<f64> {
    let dim = state.len();
    let mut jacobian = vec![0.0; dim * dim];
    let mut shifted = state.to_vec();
    let mut plus = vec![0.0; dim];
    let mut minus = vec![0.0; dim];

    for j in 0..dim {
        let h = 1e-6 * state[j].abs().max(1.0);
        shifted[j] = state[j] + h;
        system.apply(0.0, &shifted, &mut plus);
        shifted[j] = state[j] - h;
        system.apply(0.0, &shifted, &mut minus);
        shifted[j] = state[j];

        for i in 0..dim {
            jacobian[i * dim + j] = (plus[i] - minus[i]) / (2.0 * h);
        }
    }
    jacobian
}

fn compute_eigenpairs(dim: usize, jacobian: &[f64]) -> Result<Vec<EigenPair>> {
    let matrix = DMatrix::from_row_slice(dim, dim, jacobian);
    let eigenvalues = matrix.complex_eigenvalues();
    let complex_matrix = matrix.map(|v| Complex::new(v, 0.0));

    let mut pairs = Vec::with_capacity(dim);
    for idx in 0..dim {
        let lambda = eigenvalues[idx];

        let mut shifted = complex_matrix.clone();
        for i in 0..dim {
            shifted[(i, i)] -= lambda;
        }

        let svd = SVD::new(shifted, true, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| anyhow!("Failed to compute eigenvector for eigenvalue index {}", idx))?;
        let row_index = v_t.nrows().saturating_sub(1);
        let mut vector: Vec<Complex<f64>> = v_t.row(row_index).iter().map(|c| c.conj()).collect();
        normalize_complex_vector(&mut vector);

        pairs.push(EigenPair {
            value: ComplexNumber::from(lambda),
            vector: vector.into_iter().map(ComplexNumber::from).collect(),
        });
    }
    Ok(pairs)
}

fn normalize_complex_vector(vec: &mut [Complex<f64>]) {
    let norm = vec.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    if norm > 0.0 {
        for entry in vec {
            *entry /= norm;
        }
    }
}
