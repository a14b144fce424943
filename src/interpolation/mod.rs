//! Interpolation of rate-distortion samples.
//!
//! Curves are interpolated as a function of quality. The default interpolant
//! is a piecewise cubic spline with not-a-knot end conditions, which needs at
//! least four knots. Sparser curves are rejected unless the caller opts into
//! [`LowOrder::Polynomial`].
//!
//! ## Key Types
//!
//! - [`CubicSpline`]: not-a-knot cubic spline
//! - [`Polynomial`]: interpolating polynomial in Newton form
//! - [`Interpolant`]: one of the above, chosen by sample count and policy

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Minimum number of knots for a cubic fit.
pub const CUBIC_MIN_KNOTS: usize = 4;

/// Policy for curves with fewer than [`CUBIC_MIN_KNOTS`] samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LowOrder {
    /// Fail with [`Error::InsufficientSamples`].
    #[default]
    Reject,
    /// Use the interpolating polynomial of degree `n - 1`.
    Polynomial,
}

/// Piecewise cubic spline with not-a-knot end conditions.
///
/// The third derivative is continuous across the second and the
/// second-to-last knots, so four knots yield the single cubic through them.
#[derive(Debug, Clone)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    /// Second derivative at each knot.
    m: Vec<f64>,
}

impl CubicSpline {
    /// Fit a spline through `(xs[i], ys[i])`.
    ///
    /// `xs` must be strictly increasing.
    ///
    /// ```
    /// use rd_eval::interpolation::CubicSpline;
    ///
    /// let xs = [0.0, 1.0, 2.0, 3.0];
    /// let ys: Vec<f64> = xs.iter().map(|x| x * x * x).collect();
    /// let spline = CubicSpline::not_a_knot(&xs, &ys).unwrap();
    /// assert!((spline.evaluate(1.5).unwrap() - 3.375).abs() < 1e-9);
    /// ```
    pub fn not_a_knot(xs: &[f64], ys: &[f64]) -> Result<Self> {
        check_knots(xs, ys, CUBIC_MIN_KNOTS)?;

        let n = xs.len();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slope: Vec<f64> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / h[i]).collect();

        let mut a = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];

        a[0][0] = h[1];
        a[0][1] = -(h[0] + h[1]);
        a[0][2] = h[0];

        for i in 1..n - 1 {
            a[i][i - 1] = h[i - 1];
            a[i][i] = 2.0 * (h[i - 1] + h[i]);
            a[i][i + 1] = h[i];
            rhs[i] = 6.0 * (slope[i] - slope[i - 1]);
        }

        a[n - 1][n - 3] = h[n - 2];
        a[n - 1][n - 2] = -(h[n - 3] + h[n - 2]);
        a[n - 1][n - 1] = h[n - 3];

        let m = solve_dense(a, rhs).ok_or_else(|| Error::InsufficientSamples {
            required: CUBIC_MIN_KNOTS,
            actual: n,
        })?;

        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            m,
        })
    }

    /// Fitted domain `(first knot, last knot)`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the spline. Extrapolation is an error.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        check_domain(x, self.domain())?;

        let last = self.xs.len() - 2;
        let i = self.xs.partition_point(|&k| k <= x).saturating_sub(1).min(last);

        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (self.ys[i], self.ys[i + 1]);
        let (m0, m1) = (self.m[i], self.m[i + 1]);
        let h = x1 - x0;
        let left = x1 - x;
        let right = x - x0;

        Ok(m0 * left.powi(3) / (6.0 * h)
            + m1 * right.powi(3) / (6.0 * h)
            + (y0 / h - m0 * h / 6.0) * left
            + (y1 / h - m1 * h / 6.0) * right)
    }
}

/// Interpolating polynomial through all knots, in Newton form.
#[derive(Debug, Clone)]
pub struct Polynomial {
    xs: Vec<f64>,
    coefficients: Vec<f64>,
}

impl Polynomial {
    /// Fit the polynomial of degree `xs.len() - 1` through the knots.
    pub fn fit(xs: &[f64], ys: &[f64]) -> Result<Self> {
        check_knots(xs, ys, 2)?;

        // Divided differences, computed in place.
        let mut coefficients = ys.to_vec();
        for level in 1..xs.len() {
            for i in (level..xs.len()).rev() {
                coefficients[i] =
                    (coefficients[i] - coefficients[i - 1]) / (xs[i] - xs[i - level]);
            }
        }

        Ok(Self {
            xs: xs.to_vec(),
            coefficients,
        })
    }

    /// Fitted domain `(first knot, last knot)`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Evaluate the polynomial. Extrapolation is an error.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        check_domain(x, self.domain())?;
        let mut value = 0.0;
        for i in (0..self.coefficients.len()).rev() {
            value = value * (x - self.xs[i]) + self.coefficients[i];
        }
        Ok(value)
    }
}

/// Interpolant fitted through a rate-distortion curve.
#[derive(Debug, Clone)]
pub enum Interpolant {
    /// Not-a-knot cubic spline (four or more knots).
    Cubic(CubicSpline),
    /// Low-order polynomial (two or three knots, opt-in only).
    Polynomial(Polynomial),
}

impl Interpolant {
    /// Fit through `(xs[i], ys[i])`, choosing the interpolant by knot count.
    pub fn fit(xs: &[f64], ys: &[f64], low_order: LowOrder) -> Result<Self> {
        if xs.len() >= CUBIC_MIN_KNOTS {
            return CubicSpline::not_a_knot(xs, ys).map(Self::Cubic);
        }
        match low_order {
            LowOrder::Reject => Err(Error::InsufficientSamples {
                required: CUBIC_MIN_KNOTS,
                actual: xs.len(),
            }),
            LowOrder::Polynomial => Polynomial::fit(xs, ys).map(Self::Polynomial),
        }
    }

    /// Fitted domain `(first knot, last knot)`.
    #[must_use]
    pub fn domain(&self) -> (f64, f64) {
        match self {
            Self::Cubic(s) => s.domain(),
            Self::Polynomial(p) => p.domain(),
        }
    }

    /// Evaluate inside the fitted domain.
    pub fn evaluate(&self, x: f64) -> Result<f64> {
        match self {
            Self::Cubic(s) => s.evaluate(x),
            Self::Polynomial(p) => p.evaluate(x),
        }
    }
}

fn check_knots(xs: &[f64], ys: &[f64], required: usize) -> Result<()> {
    if xs.len() != ys.len() || xs.len() < required {
        return Err(Error::InsufficientSamples {
            required,
            actual: xs.len().min(ys.len()),
        });
    }
    if let Some(w) = xs.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::DuplicateQuality(w[1]));
    }
    Ok(())
}

fn check_domain(x: f64, (min, max): (f64, f64)) -> Result<()> {
    if x >= min && x <= max {
        Ok(())
    } else {
        Err(Error::OutOfDomain { x, min, max })
    }
}

/// Gaussian elimination with partial pivoting. `None` if singular.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}
