use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Numeric type the steppers are written against.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// A right-hand side `dx/dt = f(t, x)`.
pub trait DynamicalSystem<T: Scalar> {
    /// Returns the dimension of the state space.
    fn dimension(&self) -> usize;

    /// Writes `f(t, x)` into `out`.
    fn apply(&self, t: T, x: &[T], out: &mut [T]);
}

/// A fixed-step integrator.
pub trait Steppable<T: Scalar> {
    /// Advances `state` from `t` to `t + dt`, updating both in place.
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T);

    /// Order of accuracy of the propagated solution.
    fn order(&self) -> usize;
}

/// A stepper carrying an embedded lower-order solution, usable for
/// step-size control.
///
/// `try_step` computes the candidate state into `out` and the local error
/// estimate into `err` without touching `state`, so a rejected step costs
/// nothing but the evaluations.
pub trait EmbeddedStepper<T: Scalar> {
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        out: &mut [T],
        err: &mut [T],
    );

    /// Order of the embedded error estimate, used by the step controller.
    fn error_order(&self) -> usize;
}
