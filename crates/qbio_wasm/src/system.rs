//! JS-backed ODE systems and low-level utilities.

use js_sys::{Array, Function};
use qbio_core::equilibrium::{jacobian, linearize, solve_equilibrium, NewtonSettings};
use qbio_core::integrate::integrate;
use qbio_core::settings::{Method, SolverSettings};
use qbio_core::solvers::{Tsit5, RK4};
use qbio_core::system::OdeSystem;
use qbio_core::time_series::Domain;
use qbio_core::traits::Steppable;
use serde::Serialize;
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub(crate) fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

pub(crate) fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Maps a solver name from the page to a `Method`.
pub fn parse_method(name: &str) -> Result<Method, String> {
    match name.trim().to_ascii_lowercase().as_str() {
        "" | "adaptive" => Ok(Method::Adaptive),
        "rk4" => Ok(Method::Rk4),
        "tsit5" => Ok(Method::Tsit5),
        other => Err(format!("Unknown solver '{}'", other)),
    }
}

pub(crate) fn solver_settings(method: &str) -> Result<SolverSettings, JsValue> {
    Ok(SolverSettings {
        method: parse_method(method).map_err(|e| JsValue::from_str(&e))?,
        ..SolverSettings::default()
    })
}

/// Calls `function(x1, ..., xN)`; anything but a number comes back as NaN,
/// which the integrator reports as a non-finite right-hand side.
pub(crate) fn js_equation(function: Function) -> impl Fn(&[f64]) -> f64 {
    move |x: &[f64]| {
        let args: Array = x.iter().map(|&v| JsValue::from_f64(v)).collect();
        function
            .apply(&JsValue::NULL, &args)
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(f64::NAN)
    }
}

pub(crate) fn js_pair_equation(function: Function) -> impl Fn(f64, f64) -> f64 {
    move |x1, x2| {
        function
            .call2(&JsValue::NULL, &JsValue::from_f64(x1), &JsValue::from_f64(x2))
            .ok()
            .and_then(|v| v.as_f64())
            .unwrap_or(f64::NAN)
    }
}

pub(crate) fn build_system(equations: &Array) -> Result<OdeSystem, JsValue> {
    let mut system = OdeSystem::new();
    for (index, value) in equations.iter().enumerate() {
        let function = value
            .dyn_into::<Function>()
            .map_err(|_| JsValue::from_str(&format!("Equation {} is not a function", index + 1)))?;
        system.push(js_equation(function));
    }
    Ok(system)
}

/// Returns the solution of `equations` on `steps` equal intervals of
/// `[start, end]`.
#[wasm_bindgen]
pub fn integrate_system(
    equations: Array,
    init_conds: Vec<f64>,
    start: f64,
    end: f64,
    steps: u32,
    method: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let system = build_system(&equations)?;
    system
        .validate_initial_conditions(&init_conds)
        .map_err(js_error)?;
    let domain = Domain::new(start, end, steps as usize);
    domain.validate().map_err(js_error)?;
    let settings = solver_settings(method)?;

    let solution = integrate(&system, &init_conds, &domain.grid(), &settings)
        .map_err(|e| JsValue::from_str(&format!("Integration failed: {:#}", e)))?;
    to_js(&solution)
}

#[wasm_bindgen]
pub struct WasmSystem {
    pub(crate) system: OdeSystem,
    state: Vec<f64>,
    t: f64,
    pub(crate) solver: SolverType,
}

pub(crate) enum SolverType {
    RK4(RK4<f64>),
    Tsit5(Tsit5<f64>),
}

#[wasm_bindgen]
impl WasmSystem {
    #[wasm_bindgen(constructor)]
    pub fn new(equations: Array, solver_name: &str) -> Result<WasmSystem, JsValue> {
        console_error_panic_hook::set_once();

        let system = build_system(&equations)?;
        let dim = system.dimension();

        let solver = match solver_name {
            "rk4" => SolverType::RK4(RK4::new(dim)),
            "tsit5" => SolverType::Tsit5(Tsit5::new(dim)),
            _ => return Err(JsValue::from_str("Unknown solver")),
        };

        Ok(WasmSystem {
            system,
            state: vec![0.0; dim],
            t: 0.0,
            solver,
        })
    }

    pub fn set_state(&mut self, state: &[f64]) -> Result<(), JsValue> {
        check_state_len(self.system.dimension(), state).map_err(|e| JsValue::from_str(&e))?;
        self.state = state.to_vec();
        Ok(())
    }

    pub fn get_state(&self) -> Vec<f64> {
        self.state.clone()
    }

    pub fn set_t(&mut self, t: f64) {
        self.t = t;
    }

    pub fn get_t(&self) -> f64 {
        self.t
    }

    pub fn step(&mut self, dt: f64) {
        match &mut self.solver {
            SolverType::RK4(s) => s.step(&self.system, &mut self.t, &mut self.state, dt),
            SolverType::Tsit5(s) => s.step(&self.system, &mut self.t, &mut self.state, dt),
        }
    }

    /// Row-major Jacobian at the current state.
    pub fn compute_jacobian(&self) -> Vec<f64> {
        jacobian(&self.system, &self.state)
    }

    /// Jacobian, eigenpairs and stability class at the current state.
    pub fn linearize(&self) -> Result<JsValue, JsValue> {
        let result = linearize(&self.system, &self.state)
            .map_err(|e| JsValue::from_str(&format!("Linearization failed: {:#}", e)))?;
        to_js(&result)
    }

    /// Newton search for an equilibrium from `initial_guess`, with its
    /// linearisation.
    pub fn solve_equilibrium(
        &self,
        initial_guess: Vec<f64>,
        max_steps: u32,
        damping: f64,
    ) -> Result<JsValue, JsValue> {
        let settings = NewtonSettings {
            max_steps: max_steps as usize,
            damping,
            ..NewtonSettings::default()
        };
        let result = solve_equilibrium(&self.system, &initial_guess, settings)
            .map_err(|e| JsValue::from_str(&format!("Equilibrium solve failed: {:#}", e)))?;
        to_js(&result)
    }
}

fn check_state_len(dim: usize, state: &[f64]) -> Result<(), String> {
    if state.len() != dim {
        return Err(format!(
            "State dimension mismatch. Expected {}, got {}.",
            dim,
            state.len()
        ));
    }
    Ok(())
}
