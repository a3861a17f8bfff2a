use thiserror::Error;

/// Largest system the façades accept.
pub const MAX_EQUATIONS: usize = 10;

/// Rejections raised while checking a parameter bundle, before any
/// integration or rendering happens.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("System has no equations.")]
    EmptySystem,

    #[error("Systems are limited to {max} equations, got {count}.", max = MAX_EQUATIONS)]
    TooManyEquations { count: usize },

    #[error(
        "Number of equations does not equal number of initial conditions. \
         Equations: {equations}, Conditions: {conditions}"
    )]
    EquationCountMismatch { equations: usize, conditions: usize },

    #[error(
        "Number of variable labels does not equal number of initial conditions. \
         Labels: {labels}, Conditions: {conditions}"
    )]
    LabelCountMismatch { labels: usize, conditions: usize },

    #[error("Domain bounds must be finite with end > start (got {start} to {end}).")]
    InvalidDomain { start: f64, end: f64 },

    #[error("Domain needs at least one interval.")]
    ZeroSteps,

    #[error("Grid axis '{axis}' needs at least 2 samples and finite bounds with end > start.")]
    InvalidAxis { axis: &'static str },

    #[error("Initial condition {index} is not finite.")]
    NonFiniteInitialCondition { index: usize },

    #[error("Solver setting '{0}' must be positive.")]
    NonPositiveSetting(&'static str),
}
