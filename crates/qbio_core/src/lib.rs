/// The `qbio_core` crate solves small ODE systems and turns the results into
/// charts for quantitative biology teaching.
///
/// Key components:
/// - **Façades**: `TimeSeriesPlot` (every variable against time) and
///   `PhasePlaneWithCarry` (streamlines and equilibria of a competition model).
/// - **Traits**: `Scalar`, `DynamicalSystem` (ODE right-hand sides), `Steppable`
///   and `EmbeddedStepper` (solvers).
/// - **Solvers**: RK4 and Tsit5, driven by `integrate` with fixed or adaptive steps.
/// - **Charts**: a plotly-shaped `Figure`, published through a `ChartBackend`
///   as JSON, a standalone HTML page, or an SVG.
pub mod demos;
pub mod equilibrium;
pub mod error;
pub mod figure;
pub mod integrate;
pub mod logger;
pub mod phase_plane;
pub mod render;
pub mod settings;
pub mod solvers;
pub mod streamline;
pub mod system;
pub mod time_series;
pub mod traits;

pub use error::ValidationError;
pub use figure::Figure;
pub use integrate::{integrate, Solution};
pub use phase_plane::{GridAxis, PhasePlaneWithCarry};
pub use render::{backend_for, ChartArtifact, ChartBackend};
pub use settings::{read_settings, Settings};
pub use system::OdeSystem;
pub use time_series::{Domain, PlotLabels, TimeSeriesPlot};
