//! Scalar interpolation strategies.
//!
//! Both strategies fit `y(x)` through a set of points and then evaluate it
//! at arbitrary abscissae. Fitting is pure; evaluation is a pure function
//! of `x` given the fitted state.

use steadystack_common::error::{StackError, StackResult};

/// A point on the `(x, y)` plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A curve fitted through scalar samples.
pub trait ScalarInterpolator: Sized {
    /// Fewest points `fit` accepts.
    const MIN_POINTS: usize;

    /// Fit the curve through `points`.
    fn fit(points: &[Point2]) -> StackResult<Self>;

    /// Evaluate the fitted curve at `x`.
    fn interpolate(&self, x: f64) -> f64;
}

/// Straight line through exactly two points: `y = a*x + b`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearInterpolator {
    a: f64,
    b: f64,
}

impl LinearInterpolator {
    /// Fit through `p0` and `p1`. Fails if they share an abscissa.
    pub fn through(p0: Point2, p1: Point2) -> StackResult<Self> {
        if p0.x == p1.x {
            return Err(StackError::interpolation(format!(
                "linear fit needs distinct abscissae, both are {}",
                p0.x
            )));
        }
        let a = (p1.y - p0.y) / (p1.x - p0.x);
        let b = p0.y - a * p0.x;
        Ok(Self { a, b })
    }

    pub fn slope(&self) -> f64 {
        self.a
    }

    pub fn intercept(&self) -> f64 {
        self.b
    }
}

impl ScalarInterpolator for LinearInterpolator {
    const MIN_POINTS: usize = 2;

    fn fit(points: &[Point2]) -> StackResult<Self> {
        match points {
            [p0, p1] => Self::through(*p0, *p1),
            _ => Err(StackError::interpolation(format!(
                "linear fit takes exactly 2 points, got {}",
                points.len()
            ))),
        }
    }

    fn interpolate(&self, x: f64) -> f64 {
        self.a * x + self.b
    }
}

/// Natural cubic spline through all supplied points.
///
/// Segment `i` is `y_i + b_i·dx + c_i·dx² + d_i·dx³` with `dx = x - x_i`.
/// The second derivative is zero at both ends. Outside `[x_0, x_n]` the
/// spline continues along the tangent at the nearest end point, which keeps
/// the extension C²-continuous because the end curvature is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline {
    /// Fitted domain `(x_first, x_last)`.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Number of knots.
    pub fn knots(&self) -> usize {
        self.xs.len()
    }

    fn start_slope(&self) -> f64 {
        self.b[0]
    }

    fn end_slope(&self) -> f64 {
        let i = self.b.len() - 1;
        let h = self.xs[i + 1] - self.xs[i];
        self.b[i] + 2.0 * self.c[i] * h + 3.0 * self.d[i] * h * h
    }

    fn eval_segment(&self, i: usize, x: f64) -> f64 {
        let dx = x - self.xs[i];
        self.ys[i] + dx * (self.b[i] + dx * (self.c[i] + dx * self.d[i]))
    }
}

impl ScalarInterpolator for CubicSpline {
    const MIN_POINTS: usize = 2;

    fn fit(points: &[Point2]) -> StackResult<Self> {
        let n = points.len();
        if n < Self::MIN_POINTS {
            return Err(StackError::interpolation(format!(
                "cubic spline needs at least 2 points, got {n}"
            )));
        }
        if let Some(pair) = points.windows(2).find(|w| w[1].x <= w[0].x) {
            return Err(StackError::interpolation(format!(
                "cubic spline abscissae must be strictly increasing ({} then {})",
                pair[0].x, pair[1].x
            )));
        }

        let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
        let ys: Vec<f64> = points.iter().map(|p| p.y).collect();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        // Second derivatives at the knots; natural ends stay zero.
        let mut m = vec![0.0; n];
        if n > 2 {
            let size = n - 2;
            let mut diag = vec![0.0; size];
            let mut upper = vec![0.0; size];
            let mut rhs = vec![0.0; size];
            for k in 0..size {
                let i = k + 1;
                diag[k] = 2.0 * (h[i - 1] + h[i]);
                upper[k] = h[i];
                rhs[k] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
            }

            // Thomas algorithm; the sub-diagonal entry of row k is h[k].
            for k in 1..size {
                let w = h[k] / diag[k - 1];
                diag[k] -= w * upper[k - 1];
                rhs[k] -= w * rhs[k - 1];
            }
            m[size] = rhs[size - 1] / diag[size - 1];
            for k in (0..size - 1).rev() {
                m[k + 1] = (rhs[k] - upper[k] * m[k + 2]) / diag[k];
            }
        }

        let mut b = Vec::with_capacity(n - 1);
        let mut c = Vec::with_capacity(n - 1);
        let mut d = Vec::with_capacity(n - 1);
        for i in 0..n - 1 {
            b.push((ys[i + 1] - ys[i]) / h[i] - h[i] * (2.0 * m[i] + m[i + 1]) / 6.0);
            c.push(m[i] / 2.0);
            d.push((m[i + 1] - m[i]) / (6.0 * h[i]));
        }

        Ok(Self { xs, ys, b, c, d })
    }

    fn interpolate(&self, x: f64) -> f64 {
        if x.is_nan() {
            return f64::NAN;
        }
        let last = self.xs.len() - 1;
        if x < self.xs[0] {
            return self.ys[0] + self.start_slope() * (x - self.xs[0]);
        }
        if x > self.xs[last] {
            return self.ys[last] + self.end_slope() * (x - self.xs[last]);
        }
        if let Ok(i) = self.xs.binary_search_by(|knot| knot.total_cmp(&x)) {
            return self.ys[i];
        }
        let segment = (self.xs.partition_point(|&xi| xi <= x) - 1).min(last - 1);
        self.eval_segment(segment, x)
    }
}
