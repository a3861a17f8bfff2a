//! Chart exports: each runs a façade and returns the plotly figure, ready
//! for `Plotly.newPlot(el, fig.data, fig.layout)`.

use crate::system::{build_system, js_error, js_pair_equation, solver_settings, to_js};
use js_sys::{Array, Function};
use qbio_core::phase_plane::{GridAxis, PhasePlaneWithCarry};
use qbio_core::settings::PlotStyle;
use qbio_core::time_series::{Domain, PlotLabels, TimeSeriesPlot};
use wasm_bindgen::prelude::*;

pub(crate) fn time_series_to_js(plot: &TimeSeriesPlot, method: &str) -> Result<JsValue, JsValue> {
    let settings = solver_settings(method)?;
    let solution = plot
        .solve(&settings)
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    let figure = plot
        .figure(&solution, &PlotStyle::default())
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    to_js(&figure)
}

pub(crate) fn phase_plane_to_js(plane: &PhasePlaneWithCarry) -> Result<JsValue, JsValue> {
    let figure = plane
        .figure(&PlotStyle::default())
        .map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    to_js(&figure)
}

#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn time_series_figure(
    start: f64,
    end: f64,
    steps: u32,
    title: String,
    x_label: String,
    y_label: String,
    var_labels: Vec<String>,
    equations: Array,
    init_conds: Vec<f64>,
    method: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let system = build_system(&equations)?;
    let plot = TimeSeriesPlot::new(
        Domain::new(start, end, steps as usize),
        PlotLabels::new(title, x_label, y_label),
        var_labels,
        system,
        init_conds,
    )
    .map_err(js_error)?;
    time_series_to_js(&plot, method)
}

#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn two_by_two_figure(
    start: f64,
    end: f64,
    steps: u32,
    title: String,
    x_label: String,
    y_label: String,
    x1_label: String,
    x2_label: String,
    eqn1: Function,
    eqn2: Function,
    init1: f64,
    init2: f64,
    method: &str,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let plot = TimeSeriesPlot::two_by_two(
        Domain::new(start, end, steps as usize),
        PlotLabels::new(title, x_label, y_label),
        x1_label,
        x2_label,
        js_pair_equation(eqn1),
        js_pair_equation(eqn2),
        [init1, init2],
    )
    .map_err(js_error)?;
    time_series_to_js(&plot, method)
}

#[wasm_bindgen]
#[allow(clippy::too_many_arguments)]
pub fn phase_plane_figure(
    x_start: f64,
    x_end: f64,
    x_steps: u32,
    y_start: f64,
    y_end: f64,
    y_steps: u32,
    title: String,
    x_label: String,
    y_label: String,
    carry1: f64,
    carry2: f64,
    a: f64,
    b: f64,
    eqn1: Function,
    eqn2: Function,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let plane = PhasePlaneWithCarry::new(
        GridAxis::new(x_start, x_end, x_steps as usize),
        GridAxis::new(y_start, y_end, y_steps as usize),
        PlotLabels::new(title, x_label, y_label),
        carry1,
        carry2,
        a,
        b,
        js_pair_equation(eqn1),
        js_pair_equation(eqn2),
    )
    .map_err(js_error)?;
    phase_plane_to_js(&plane)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{phase_plane_figure, time_series_figure, two_by_two_figure};
    use js_sys::{Array, Function, Reflect};
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn get(value: &JsValue, key: &str) -> JsValue {
        Reflect::get(value, &JsValue::from_str(key)).expect("property")
    }

    fn decay() -> Function {
        Function::new_with_args("x1, x2", "return -x1;")
    }

    fn growth() -> Function {
        Function::new_with_args("x1, x2", "return 0.5 * x2;")
    }

    #[wasm_bindgen_test]
    fn two_by_two_figure_names_traces() {
        let figure = two_by_two_figure(
            0.0,
            1.0,
            10,
            "Decay".into(),
            "t".into(),
            "x".into(),
            "A".into(),
            "B".into(),
            decay(),
            growth(),
            1.0,
            1.0,
            "adaptive",
        )
        .expect("figure");

        let data = Array::from(&get(&figure, "data"));
        assert_eq!(data.length(), 2);
        assert_eq!(get(&data.get(0), "name").as_string().as_deref(), Some("A"));
        let x = Array::from(&get(&data.get(0), "x"));
        assert_eq!(x.length(), 11);
    }

    #[wasm_bindgen_test]
    fn time_series_figure_reports_count_mismatch() {
        let equations = Array::of2(&decay(), &growth());
        let result = time_series_figure(
            0.0,
            1.0,
            10,
            "t".into(),
            "x".into(),
            "y".into(),
            vec!["A".into(), "B".into()],
            equations,
            vec![1.0, 2.0, 3.0],
            "rk4",
        );
        let message = result.err().and_then(|e| e.as_string()).unwrap_or_default();
        assert!(message.contains("Equations: 2, Conditions: 3"));
    }

    #[wasm_bindgen_test]
    fn phase_plane_figure_has_streamlines_and_equilibria() {
        let eqn1 = Function::new_with_args("x1, x2", "return 0.15 * x1 * (50 - x1 - 0.2 * x2) / 50;");
        let eqn2 = Function::new_with_args("x1, x2", "return 0.3 * x2 * (60 - 0.6 * x1 - x2) / 60;");
        let figure = phase_plane_figure(
            0.0, 100.0, 40, 0.0, 100.0, 40, "Plane".into(), "N1".into(), "N2".into(), 50.0,
            60.0, 0.2, 0.6, eqn1, eqn2,
        )
        .expect("figure");

        let data = Array::from(&get(&figure, "data"));
        assert_eq!(data.length(), 5);
        assert_eq!(get(&data.get(0), "name").as_string().as_deref(), Some("Streamline"));
        assert_eq!(get(&data.get(4), "name").as_string().as_deref(), Some("Equilibrium 4"));
    }
}
