//! The classroom demos, rendered in the browser.

use crate::figures::{phase_plane_to_js, time_series_to_js};
use crate::system::js_error;
use qbio_core::demos;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn demo_competition_time_series() -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let plot = demos::competition_time_series().map_err(js_error)?;
    time_series_to_js(&plot, "adaptive")
}

#[wasm_bindgen]
pub fn demo_dunster_model_a() -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let plot = demos::dunster_model_a().map_err(js_error)?;
    time_series_to_js(&plot, "adaptive")
}

#[wasm_bindgen]
pub fn demo_competition_phase_plane() -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let plane = demos::competition_phase_plane().map_err(js_error)?;
    phase_plane_to_js(&plane)
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::{demo_competition_phase_plane, demo_dunster_model_a};
    use js_sys::{Array, Reflect};
    use wasm_bindgen::JsValue;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn dunster_demo_has_seven_traces() {
        let figure = demo_dunster_model_a().expect("demo");
        let data = Reflect::get(&figure, &JsValue::from_str("data")).expect("data");
        assert_eq!(Array::from(&data).length(), 7);
    }

    #[wasm_bindgen_test]
    fn phase_plane_demo_builds() {
        let figure = demo_competition_phase_plane().expect("demo");
        let layout = Reflect::get(&figure, &JsValue::from_str("layout")).expect("layout");
        let title = Reflect::get(&layout, &JsValue::from_str("title")).expect("title");
        let text = Reflect::get(&title, &JsValue::from_str("text")).expect("text");
        assert_eq!(
            text.as_string().as_deref(),
            Some("Demo: 2x2 Phase Plane with Carry Capacity")
        );
    }
}
