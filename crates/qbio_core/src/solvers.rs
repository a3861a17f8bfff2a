use crate::traits::{DynamicalSystem, EmbeddedStepper, Scalar, Steppable};

fn lit<T: Scalar>(value: f64) -> T {
    T::from_f64(value).unwrap_or_else(T::nan)
}

/// Classic Runge-Kutta 4th Order Solver
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half: T = lit(0.5);
        let sixth: T = lit(1.0 / 6.0);
        let two: T = lit(2.0);
        let t0 = *t;
        let n = state.len();

        system.apply(t0, state, &mut self.k1);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        for i in 0..n {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }

    fn order(&self) -> usize {
        4
    }
}

// Tsitouras 5(4) tableau.
const C: [f64; 5] = [0.161, 0.327, 0.9, 0.9800255409045097, 1.0];
const A2: [f64; 1] = [0.161];
const A3: [f64; 2] = [-0.008480655492356989, 0.335480655492357];
const A4: [f64; 3] = [2.897153057105493, -6.359448489975075, 4.3622954328695815];
const A5: [f64; 4] = [
    5.325864828439257,
    -11.748883564062828,
    7.4955393428898365,
    -0.09249506636175525,
];
const A6: [f64; 5] = [
    5.86145544294642,
    -12.92096931784711,
    8.159367898576159,
    -0.071584973281401,
    -0.028269050394068383,
];
const B: [f64; 6] = [
    0.09646076681806523,
    0.01,
    0.4798896504144996,
    1.379008574103742,
    -3.290069515436081,
    2.324710524099774,
];
// Difference between the 5th order weights and the embedded 4th order ones.
// The last entry multiplies the FSAL stage f(t + dt, y_next).
const BTILDE: [f64; 7] = [
    -0.00178001105222577714,
    -0.0008164344596567469,
    0.007880878010261995,
    -0.1447110071732629,
    0.5823571654525552,
    -0.45808210592918697,
    1.0 / 66.0,
];

/// Tsitouras 5/4 Solver
pub struct Tsit5<T: Scalar> {
    k: [Vec<T>; 7],
    tmp: Vec<T>,
}

impl<T: Scalar> Tsit5<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k: std::array::from_fn(|_| vec![z; dim]),
            tmp: vec![z; dim],
        }
    }

    /// Evaluates the six stages at `(t, state)` and writes the 5th order
    /// solution into `out`.
    fn stages(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        out: &mut [T],
    ) {
        let n = state.len();
        let rows: [&[f64]; 5] = [&A2, &A3, &A4, &A5, &A6];

        system.apply(t, state, &mut self.k[0]);
        for (stage, row) in rows.iter().enumerate() {
            for i in 0..n {
                let mut acc = T::zero();
                for (j, &a) in row.iter().enumerate() {
                    acc = acc + lit::<T>(a) * self.k[j][i];
                }
                self.tmp[i] = state[i] + dt * acc;
            }
            system.apply(t + lit::<T>(C[stage]) * dt, &self.tmp, &mut self.k[stage + 1]);
        }

        for i in 0..n {
            let mut acc = T::zero();
            for (j, &b) in B.iter().enumerate() {
                acc = acc + lit::<T>(b) * self.k[j][i];
            }
            out[i] = state[i] + dt * acc;
        }
    }
}

impl<T: Scalar> Steppable<T> for Tsit5<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let mut next = vec![T::zero(); state.len()];
        self.stages(system, *t, state, dt, &mut next);
        state.copy_from_slice(&next);
        *t = *t + dt;
    }

    fn order(&self) -> usize {
        5
    }
}

impl<T: Scalar> EmbeddedStepper<T> for Tsit5<T> {
    fn try_step(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        out: &mut [T],
        err: &mut [T],
    ) {
        self.stages(system, t, state, dt, out);
        system.apply(t + dt, out, &mut self.k[6]);

        for i in 0..state.len() {
            let mut acc = T::zero();
            for (j, &e) in BTILDE.iter().enumerate() {
                acc = acc + lit::<T>(e) * self.k[j][i];
            }
            err[i] = dt * acc;
        }
    }

    fn error_order(&self) -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::{Tsit5, A2, A3, A4, A5, A6, B, C, RK4};
    use crate::traits::{DynamicalSystem, EmbeddedStepper, Steppable};

    struct Decay;

    impl DynamicalSystem<f64> for Decay {
        fn dimension(&self) -> usize {
            1
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = -x[0];
        }
    }

    struct Oscillator;

    impl DynamicalSystem<f64> for Oscillator {
        fn dimension(&self) -> usize {
            2
        }

        fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
            out[0] = x[1];
            out[1] = -x[0];
        }
    }

    #[test]
    fn rk4_tracks_exponential_decay() {
        let mut stepper = RK4::new(1);
        let mut t = 0.0;
        let mut state = [1.0];
        for _ in 0..100 {
            stepper.step(&Decay, &mut t, &mut state, 0.01);
        }
        assert!((t - 1.0).abs() < 1e-12);
        assert!((state[0] - (-1.0f64).exp()).abs() < 1e-10);
    }

    #[test]
    fn tsit5_fixed_step_is_more_accurate_than_rk4() {
        let mut rk4 = RK4::new(2);
        let mut tsit5 = Tsit5::new(2);
        let (mut t_a, mut t_b) = (0.0, 0.0);
        let mut a = [1.0, 0.0];
        let mut b = [1.0, 0.0];
        for _ in 0..20 {
            rk4.step(&Oscillator, &mut t_a, &mut a, 0.1);
            tsit5.step(&Oscillator, &mut t_b, &mut b, 0.1);
        }
        let exact = 2.0f64.cos();
        assert!((b[0] - exact).abs() < (a[0] - exact).abs());
        assert!((b[0] - exact).abs() < 1e-6);
    }

    #[test]
    fn tsit5_error_estimate_shrinks_with_step() {
        let mut stepper = Tsit5::new(1);
        let mut out = [0.0];
        let mut err_large = [0.0];
        let mut err_small = [0.0];
        stepper.try_step(&Decay, 0.0, &[1.0], 0.4, &mut out, &mut err_large);
        stepper.try_step(&Decay, 0.0, &[1.0], 0.1, &mut out, &mut err_small);
        assert!(err_small[0].abs() < err_large[0].abs());
        assert!((out[0] - (-0.1f64).exp()).abs() < 1e-8);
    }

    #[test]
    fn tsit5_error_estimate_vanishes_for_linear_growth() {
        struct Constant;
        impl DynamicalSystem<f64> for Constant {
            fn dimension(&self) -> usize {
                1
            }
            fn apply(&self, _t: f64, _x: &[f64], out: &mut [f64]) {
                out[0] = 2.0;
            }
        }
        let mut stepper = Tsit5::new(1);
        let mut out = [0.0];
        let mut err = [0.0];
        stepper.try_step(&Constant, 0.0, &[1.0], 0.5, &mut out, &mut err);
        assert!((out[0] - 2.0).abs() < 1e-12);
        assert!(err[0].abs() < 1e-12);
    }

    #[test]
    fn tsit5_rows_sum_to_nodes() {
        let rows: [&[f64]; 5] = [&A2, &A3, &A4, &A5, &A6];
        for (row, c) in rows.iter().zip(C) {
            let sum: f64 = row.iter().sum();
            assert!((sum - c).abs() < 1e-12, "row sums to {sum}, node is {c}");
        }
        let nodes = [0.0, C[0], C[1], C[2], C[3], C[4]];
        for (power, expected) in [(0, 1.0), (1, 0.5), (2, 1.0 / 3.0), (3, 0.25), (4, 0.2)] {
            let sum: f64 = B.iter().zip(nodes).map(|(b, c)| b * c.powi(power)).sum();
            assert!((sum - expected).abs() < 1e-12, "power {power}: {sum}");
        }
    }

    #[test]
    fn tsit5_converges_at_fifth_order() {
        let global_error = |steps: usize| {
            let mut stepper = Tsit5::new(1);
            let mut t = 0.0;
            let mut state = [1.0];
            let dt = 1.0 / steps as f64;
            for _ in 0..steps {
                stepper.step(&Decay, &mut t, &mut state, dt);
            }
            (state[0] - (-1.0f64).exp()).abs()
        };
        let ratio = global_error(10) / global_error(20);
        assert!(ratio > 20.0, "halving the step only reduced the error by {ratio}");
    }
}
