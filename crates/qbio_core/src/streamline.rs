//! Streamlines of a sampled 2D vector field, laid out the way plotly's
//! figure factory does it.
//!
//! The plot area is covered by a coarse occupancy mask. Seeds are taken from
//! the mask cells, boundary first and spiralling inward; each seed is traced
//! forward and backward through the speed-normalised field until it leaves
//! the grid, runs into a cell another streamline already claimed, or reaches
//! the arc-length cap. Short traces are dropped and give their cells back.

use crate::figure::Trace;
use anyhow::{bail, Result};
use std::f64::consts::PI;

const STEP: f64 = 0.01;
const MAX_ARC: f64 = 2.0;
const MIN_ARC: f64 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamlineOptions {
    /// Mask resolution is `30 * density` cells per side.
    pub density: f64,
    /// Half-angle between an arrow barb and the streamline.
    pub angle: f64,
    /// Barb length in data units.
    pub arrow_scale: f64,
}

impl Default for StreamlineOptions {
    fn default() -> Self {
        Self {
            density: 1.0,
            angle: PI / 9.0,
            arrow_scale: 0.09,
        }
    }
}

type Point = (f64, f64);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Streamlines {
    /// Polylines in data coordinates.
    pub lines: Vec<Vec<Point>>,
    /// Arrow heads as `[barb, tip, barb]`.
    pub arrows: Vec<[Point; 3]>,
}

impl Streamlines {
    /// All polylines followed by all arrow heads, each piece terminated by a
    /// NaN so that a single line trace draws them unconnected.
    pub fn flatten(&self) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for line in &self.lines {
            for &(x, y) in line {
                xs.push(x);
                ys.push(y);
            }
            xs.push(f64::NAN);
            ys.push(f64::NAN);
        }
        for arrow in &self.arrows {
            for &(x, y) in arrow {
                xs.push(x);
                ys.push(y);
            }
            xs.push(f64::NAN);
            ys.push(f64::NAN);
        }
        (xs, ys)
    }

    pub fn into_trace(self, name: &str) -> Trace {
        let (x, y) = self.flatten();
        Trace::lines(name, x, y)
    }
}

/// Traces streamlines of the field `(u, v)` sampled on the mesh `x` × `y`.
///
/// `u` and `v` are row-major with one row per `y` value, i.e. the value at
/// `(x[i], y[j])` is `u[j * x.len() + i]`.
pub fn streamlines(
    x: &[f64],
    y: &[f64],
    u: &[f64],
    v: &[f64],
    options: StreamlineOptions,
) -> Result<Streamlines> {
    check_axis("x", x)?;
    check_axis("y", y)?;
    let (nx, ny) = (x.len(), y.len());
    if u.len() != nx * ny || v.len() != nx * ny {
        bail!(
            "Vector field must have {} samples per component, got {} and {}.",
            nx * ny,
            u.len(),
            v.len()
        );
    }
    if !(options.density > 0.0) {
        bail!("Streamline density must be positive.");
    }
    let density = (30.0 * options.density) as usize;
    if density < 2 {
        bail!("Streamline density is too low to seed any streamline.");
    }

    let mut tracer = Tracer::new(x, y, u, v, density);
    tracer.seed_all();

    let (dx, dy) = (x[1] - x[0], y[1] - y[0]);
    let lines: Vec<Vec<Point>> = tracer
        .trajectories
        .into_iter()
        .map(|traj| {
            traj.into_iter()
                .map(|(xi, yi)| (xi * dx + x[0], yi * dy + y[0]))
                .collect()
        })
        .collect();
    let arrows = lines
        .iter()
        .filter_map(|line| arrow_head(line, &options))
        .collect();

    Ok(Streamlines { lines, arrows })
}

fn check_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.len() < 2 {
        bail!("Axis {name} needs at least two samples.");
    }
    let step = axis[1] - axis[0];
    if !(step > 0.0) || !step.is_finite() {
        bail!("Axis {name} must be increasing.");
    }
    let tolerance = 1e-8 * step.abs() + 1e-12;
    if axis
        .windows(2)
        .any(|w| ((w[1] - w[0]) - step).abs() > tolerance)
    {
        bail!("Axis {name} must be evenly spaced.");
    }
    Ok(())
}

/// Arrow head a third of the way along the polyline.
fn arrow_head(line: &[Point], options: &StreamlineOptions) -> Option<[Point; 3]> {
    // The index counts the break that terminates the polyline.
    let end = (line.len() + 1) / 3;
    if end == 0 || end >= line.len() {
        return None;
    }
    let (tip_x, tip_y) = line[end];
    let (prev_x, prev_y) = line[end - 1];
    let (dif_x, dif_y) = (tip_x - prev_x, tip_y - prev_y);

    let heading = (dif_y / dif_x).atan();
    let (a1, a2) = (heading + options.angle, heading - options.angle);
    let seg1 = (a1.cos() * options.arrow_scale, a1.sin() * options.arrow_scale);
    let seg2 = (a2.cos() * options.arrow_scale, a2.sin() * options.arrow_scale);
    let sign = if dif_x >= 0.0 { -1.0 } else { 1.0 };

    Some([
        (tip_x + sign * seg1.0, tip_y + sign * seg1.1),
        (tip_x, tip_y),
        (tip_x + sign * seg2.0, tip_y + sign * seg2.1),
    ])
}

/// Works in grid-index coordinates: `xi` runs over `0..nx-1`.
struct Tracer {
    nx: usize,
    ny: usize,
    u: Vec<f64>,
    v: Vec<f64>,
    speed: Vec<f64>,
    density: usize,
    spacing_x: f64,
    spacing_y: f64,
    blank: Vec<bool>,
    trajectories: Vec<Vec<Point>>,
}

impl Tracer {
    fn new(x: &[f64], y: &[f64], u: &[f64], v: &[f64], density: usize) -> Self {
        let (nx, ny) = (x.len(), y.len());
        let x_range = x[nx - 1] - x[0];
        let y_range = y[ny - 1] - y[0];

        let mut su = Vec::with_capacity(u.len());
        let mut sv = Vec::with_capacity(v.len());
        let mut speed = Vec::with_capacity(u.len());
        for (&ui, &vi) in u.iter().zip(v) {
            let (au, av) = (ui / x_range, vi / y_range);
            speed.push((au * au + av * av).sqrt());
            su.push(au * nx as f64);
            sv.push(av * ny as f64);
        }

        Self {
            nx,
            ny,
            u: su,
            v: sv,
            speed,
            density,
            spacing_x: nx as f64 / (density - 1) as f64,
            spacing_y: ny as f64 / (density - 1) as f64,
            blank: vec![false; density * density],
            trajectories: Vec::new(),
        }
    }

    fn blank_pos(&self, xi: f64, yi: f64) -> (usize, usize) {
        let xb = ((xi / self.spacing_x) + 0.5) as usize;
        let yb = ((yi / self.spacing_y) + 0.5) as usize;
        (xb.min(self.density - 1), yb.min(self.density - 1))
    }

    fn inside(&self, xi: f64, yi: f64) -> bool {
        xi >= 0.0 && xi < (self.nx - 1) as f64 && yi >= 0.0 && yi < (self.ny - 1) as f64
    }

    fn value_at(&self, field: &[f64], xi: f64, yi: f64) -> Option<f64> {
        if !(xi >= 0.0 && yi >= 0.0) {
            return None;
        }
        let (ix, iy) = (xi as usize, yi as usize);
        if ix + 1 >= self.nx || iy + 1 >= self.ny {
            return None;
        }
        let at = |cx: usize, cy: usize| field[cy * self.nx + cx];
        let (xt, yt) = (xi - ix as f64, yi - iy as f64);
        let a0 = at(ix, iy) * (1.0 - xt) + at(ix + 1, iy) * xt;
        let a1 = at(ix, iy + 1) * (1.0 - xt) + at(ix + 1, iy + 1) * xt;
        Some(a0 * (1.0 - yt) + a1 * yt)
    }

    /// Unit-speed direction at `(xi, yi)`, reversed for backward tracing.
    fn direction(&self, xi: f64, yi: f64, sign: f64) -> Option<Point> {
        let speed = self.value_at(&self.speed, xi, yi)?;
        let ui = self.value_at(&self.u, xi, yi)?;
        let vi = self.value_at(&self.v, xi, yi)?;
        let (dx, dy) = (sign * ui / speed, sign * vi / speed);
        (dx.is_finite() && dy.is_finite()).then_some((dx, dy))
    }

    fn trace(&mut self, x0: f64, y0: f64, sign: f64, claimed: &mut Vec<usize>) -> (f64, Vec<Point>) {
        let mut arc = 0.0;
        let (mut xi, mut yi) = (x0, y0);
        let mut cell = self.blank_pos(xi, yi);
        let mut traj = Vec::new();

        while self.inside(xi, yi) {
            traj.push((xi, yi));
            let Some(k1) = self.direction(xi, yi, sign) else { break };
            let Some(k2) = self.direction(xi + 0.5 * STEP * k1.0, yi + 0.5 * STEP * k1.1, sign)
            else {
                break;
            };
            let Some(k3) = self.direction(xi + 0.5 * STEP * k2.0, yi + 0.5 * STEP * k2.1, sign)
            else {
                break;
            };
            let Some(k4) = self.direction(xi + STEP * k3.0, yi + STEP * k3.1, sign) else {
                break;
            };
            xi += STEP * (k1.0 + 2.0 * k2.0 + 2.0 * k3.0 + k4.0) / 6.0;
            yi += STEP * (k1.1 + 2.0 * k2.1 + 2.0 * k3.1 + k4.1) / 6.0;
            if !self.inside(xi, yi) {
                break;
            }
            arc += STEP;

            let next = self.blank_pos(xi, yi);
            if next != cell {
                let index = next.1 * self.density + next.0;
                if self.blank[index] {
                    break;
                }
                self.blank[index] = true;
                claimed.push(index);
                cell = next;
            }
            if arc > MAX_ARC {
                break;
            }
        }
        (arc, traj)
    }

    fn integrate_seed(&mut self, x0: f64, y0: f64) -> Option<Vec<Point>> {
        let mut claimed = Vec::new();
        let (forward_arc, forward) = self.trace(x0, y0, 1.0, &mut claimed);
        let (backward_arc, backward) = self.trace(x0, y0, -1.0, &mut claimed);

        let mut line: Vec<Point> = backward.into_iter().rev().collect();
        line.extend(forward.into_iter().skip(1));
        if line.is_empty() {
            return None;
        }

        if forward_arc + backward_arc > MIN_ARC {
            let (xb, yb) = self.blank_pos(x0, y0);
            self.blank[yb * self.density + xb] = true;
            Some(line)
        } else {
            for index in claimed {
                self.blank[index] = false;
            }
            None
        }
    }

    fn seed(&mut self, xb: usize, yb: usize) {
        if xb >= self.density || yb >= self.density {
            return;
        }
        if self.blank[yb * self.density + xb] {
            return;
        }
        let (x0, y0) = (xb as f64 * self.spacing_x, yb as f64 * self.spacing_y);
        if let Some(traj) = self.integrate_seed(x0, y0) {
            self.trajectories.push(traj);
        }
    }

    fn seed_all(&mut self) {
        let d = self.density;
        for indent in 0..d / 2 {
            for i in 0..d - 2 * indent {
                self.seed(i + indent, indent);
                self.seed(i + indent, d - 1 - indent);
                self.seed(indent, i + indent);
                self.seed(d - 1 - indent, i + indent);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{streamlines, StreamlineOptions};
    use crate::integrate::linspace;

    fn sample_field(
        x: &[f64],
        y: &[f64],
        f: impl Fn(f64, f64) -> (f64, f64),
    ) -> (Vec<f64>, Vec<f64>) {
        let mut u = Vec::with_capacity(x.len() * y.len());
        let mut v = Vec::with_capacity(x.len() * y.len());
        for &yj in y {
            for &xi in x {
                let (a, b) = f(xi, yj);
                u.push(a);
                v.push(b);
            }
        }
        (u, v)
    }

    #[test]
    fn uniform_field_gives_horizontal_lines() {
        let x = linspace(0.0, 1.0, 20);
        let y = linspace(0.0, 1.0, 20);
        let (u, v) = sample_field(&x, &y, |_, _| (1.0, 0.0));
        let result = streamlines(&x, &y, &u, &v, StreamlineOptions::default())
            .expect("streamlines should compute");

        assert!(!result.lines.is_empty());
        for line in &result.lines {
            let y0 = line[0].1;
            assert!(line.iter().all(|p| (p.1 - y0).abs() < 1e-9));
            assert!(line.windows(2).all(|w| w[1].0 > w[0].0));
            assert!(line
                .iter()
                .all(|p| (0.0..=1.0).contains(&p.0) && (0.0..=1.0).contains(&p.1)));
        }
        assert_eq!(result.arrows.len(), result.lines.len());
    }

    #[test]
    fn arrows_point_along_the_flow() {
        let x = linspace(0.0, 1.0, 20);
        let y = linspace(0.0, 1.0, 20);
        let (u, v) = sample_field(&x, &y, |_, _| (1.0, 0.0));
        let options = StreamlineOptions::default();
        let result = streamlines(&x, &y, &u, &v, options).expect("streamlines");

        for [barb1, tip, barb2] in &result.arrows {
            assert!(barb1.0 < tip.0 && barb2.0 < tip.0);
            assert!(((barb1.1 - tip.1) + (barb2.1 - tip.1)).abs() < 1e-12);
            let length = ((tip.0 - barb1.0).powi(2) + (tip.1 - barb1.1).powi(2)).sqrt();
            assert!((length - options.arrow_scale).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_field_has_no_streamlines() {
        let x = linspace(0.0, 1.0, 10);
        let y = linspace(0.0, 1.0, 10);
        let (u, v) = sample_field(&x, &y, |_, _| (0.0, 0.0));
        let result = streamlines(&x, &y, &u, &v, StreamlineOptions::default()).expect("streamlines");
        assert!(result.lines.is_empty());
        assert!(result.arrows.is_empty());
    }

    #[test]
    fn rotation_field_is_covered() {
        let x = linspace(-1.0, 1.0, 40);
        let y = linspace(-1.0, 1.0, 40);
        let (u, v) = sample_field(&x, &y, |a, b| (-b, a));
        let result = streamlines(&x, &y, &u, &v, StreamlineOptions::default()).expect("streamlines");
        assert!(result.lines.len() > 5);

        let (xs, ys) = result.flatten();
        let breaks = xs.iter().filter(|v| v.is_nan()).count();
        assert_eq!(breaks, result.lines.len() + result.arrows.len());
        assert_eq!(xs.len(), ys.len());
    }

    #[test]
    fn rejects_uneven_axis_and_bad_shapes() {
        let x = vec![0.0, 0.1, 0.3];
        let y = linspace(0.0, 1.0, 3);
        let err = streamlines(&x, &y, &[0.0; 9], &[0.0; 9], StreamlineOptions::default())
            .expect_err("uneven axis should fail");
        assert!(err.to_string().contains("evenly spaced"));

        let x = linspace(0.0, 1.0, 3);
        let err = streamlines(&x, &y, &[0.0; 8], &[0.0; 9], StreamlineOptions::default())
            .expect_err("short field should fail");
        assert!(err.to_string().contains("9 samples"));
    }
}
