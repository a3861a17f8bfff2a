//! Browser bindings for `qbio_core`.
//!
//! Equations are plain JS functions of the state variables, e.g.
//! `(x1, x2) => 0.15 * x1 * (50 - x1 - 0.2 * x2) / 50`. Chart exports return
//! a plotly figure object.

mod demos;
mod figures;
mod system;

pub use demos::{demo_competition_phase_plane, demo_competition_time_series, demo_dunster_model_a};
pub use figures::{phase_plane_figure, time_series_figure, two_by_two_figure};
pub use system::{integrate_system, parse_method, WasmSystem};
