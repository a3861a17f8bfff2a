//! Systems of ODEs built from plain closures.

use crate::error::{ValidationError, MAX_EQUATIONS};
use crate::traits::DynamicalSystem;
use std::fmt;

/// One right-hand side: `x_i' = f_i(x1, ..., xN)`.
///
/// The closure receives the whole ordered state, so an equation for a 2x2
/// system reads `|x: &[f64]| r * x[0] * (k - x[0] - a * x[1]) / k`.
pub type Equation = Box<dyn Fn(&[f64]) -> f64>;

/// An ordered, autonomous system of equations.
#[derive(Default)]
pub struct OdeSystem {
    equations: Vec<Equation>,
}

impl OdeSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the common `eqn1 = f(x1, x2)`, `eqn2 = g(x1, x2)` form.
    pub fn two_by_two<F, G>(eqn1: F, eqn2: G) -> Self
    where
        F: Fn(f64, f64) -> f64 + 'static,
        G: Fn(f64, f64) -> f64 + 'static,
    {
        Self::new()
            .with_equation(move |x: &[f64]| eqn1(x[0], x[1]))
            .with_equation(move |x: &[f64]| eqn2(x[0], x[1]))
    }

    pub fn with_equation<F>(mut self, equation: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + 'static,
    {
        self.push(equation);
        self
    }

    pub fn push<F>(&mut self, equation: F)
    where
        F: Fn(&[f64]) -> f64 + 'static,
    {
        self.equations.push(Box::new(equation));
    }

    pub fn dimension(&self) -> usize {
        self.equations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.equations.is_empty()
    }

    /// Evaluates every right-hand side at `state`.
    pub fn evaluate(&self, state: &[f64]) -> Vec<f64> {
        self.equations.iter().map(|eq| eq(state)).collect()
    }

    /// Checks the size of the system and that it agrees with `init`.
    pub fn validate_initial_conditions(&self, init: &[f64]) -> Result<(), ValidationError> {
        let equations = self.dimension();
        if equations == 0 {
            return Err(ValidationError::EmptySystem);
        }
        if equations > MAX_EQUATIONS {
            return Err(ValidationError::TooManyEquations { count: equations });
        }
        if equations != init.len() {
            return Err(ValidationError::EquationCountMismatch {
                equations,
                conditions: init.len(),
            });
        }
        if let Some(index) = init.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteInitialCondition { index });
        }
        Ok(())
    }
}

impl fmt::Debug for OdeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdeSystem")
            .field("dimension", &self.dimension())
            .finish()
    }
}

impl DynamicalSystem<f64> for OdeSystem {
    fn dimension(&self) -> usize {
        self.equations.len()
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        for (slot, eq) in out.iter_mut().zip(&self.equations) {
            *slot = eq(x);
        }
    }
}
