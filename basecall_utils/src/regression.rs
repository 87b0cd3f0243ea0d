//! Robust linear regression with Huber's loss.
//!
//! The fit is computed by iteratively reweighted least squares:
//! start from the ordinary least squares, then repeat
//! 1. scale <- MAD of the residuals around zero, normalized to the standard deviation of a Gaussian,
//! 2. weight_i <- 1 if |r_i/scale| <= t, t/|r_i/scale| otherwise,
//! 3. solve the weighted least squares,
//!
//! until the sum of Huber's loss changes less than `tol`.
use nalgebra::{Matrix2, Vector2};

/// Tuning constant giving 95% efficiency on Gaussian errors.
pub const HUBER_T: f64 = 1.345;
/// Third quartile of the standard Gaussian.
const MAD_NORMALIZER: f64 = 0.674_489_750_196_081_7;

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum RegressionError {
    #[error("At least two points are needed for a regression, but {0} given")]
    TooFewPoints(usize),
    #[error("Lengths of the predictor ({0}) and the response ({1}) differ")]
    Length(usize, usize),
    #[error("All the predictors are the same, so the slope can not be determined")]
    Singular,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
    /// Final estimate of the scale of the residuals.
    pub scale: f64,
    pub iterations: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HuberRegression {
    pub t: f64,
    pub max_iter: usize,
    pub tol: f64,
}

impl std::default::Default for HuberRegression {
    fn default() -> Self {
        Self {
            t: HUBER_T,
            max_iter: 50,
            tol: 1e-8,
        }
    }
}

impl HuberRegression {
    fn weight(&self, z: f64) -> f64 {
        let z = z.abs();
        if z <= self.t {
            1f64
        } else {
            self.t / z
        }
    }
    fn rho(&self, z: f64) -> f64 {
        let z = z.abs();
        if z <= self.t {
            z * z / 2f64
        } else {
            self.t * z - self.t * self.t / 2f64
        }
    }
    /// Fit `ys ~ slope * xs + intercept`.
    pub fn fit(&self, xs: &[f64], ys: &[f64]) -> Result<LinearFit, RegressionError> {
        if xs.len() != ys.len() {
            return Err(RegressionError::Length(xs.len(), ys.len()));
        }
        if xs.len() < 2 {
            return Err(RegressionError::TooFewPoints(xs.len()));
        }
        if xs.iter().all(|&x| x == xs[0]) {
            return Err(RegressionError::Singular);
        }
        let mut weights = vec![1f64; xs.len()];
        let (mut intercept, mut slope) = weighted_least_squares(xs, ys, &weights)?;
        let mut residuals = residuals(xs, ys, intercept, slope);
        let mut scale = mad(&residuals);
        let mut deviance = f64::INFINITY;
        let mut iterations = 0;
        while iterations < self.max_iter {
            if scale == 0f64 {
                debug!("HUBER\tThe residuals vanished at {} iterations.", iterations);
                break;
            }
            weights
                .iter_mut()
                .zip(residuals.iter())
                .for_each(|(w, r)| *w = self.weight(r / scale));
            let (c, m) = weighted_least_squares(xs, ys, &weights)?;
            intercept = c;
            slope = m;
            residuals = self::residuals(xs, ys, intercept, slope);
            scale = mad(&residuals);
            iterations += 1;
            if scale == 0f64 {
                break;
            }
            let current: f64 = residuals.iter().map(|r| self.rho(r / scale)).sum();
            let converged = (current - deviance).abs() <= self.tol;
            deviance = current;
            if converged {
                break;
            }
        }
        trace!("HUBER\t{}\t{}\t{}\t{}", intercept, slope, scale, iterations);
        Ok(LinearFit {
            intercept,
            slope,
            scale,
            iterations,
        })
    }
}

fn residuals(xs: &[f64], ys: &[f64], intercept: f64, slope: f64) -> Vec<f64> {
    xs.iter()
        .zip(ys.iter())
        .map(|(x, y)| y - intercept - slope * x)
        .collect()
}

/// Median absolute deviation around zero, scaled to be consistent with the standard deviation.
fn mad(residuals: &[f64]) -> f64 {
    let mut abs: Vec<f64> = residuals.iter().map(|r| r.abs()).collect();
    abs.sort_by(|a, b| a.total_cmp(b));
    let len = abs.len();
    let median = match len % 2 {
        0 => (abs[len / 2 - 1] + abs[len / 2]) / 2f64,
        _ => abs[len / 2],
    };
    median / MAD_NORMALIZER
}

// Solve (X^T W X) beta = X^T W y with X = [1, x].
fn weighted_least_squares(xs: &[f64], ys: &[f64], ws: &[f64]) -> Result<(f64, f64), RegressionError> {
    let (mut sw, mut swx, mut swxx, mut swy, mut swxy) = (0f64, 0f64, 0f64, 0f64, 0f64);
    for ((&x, &y), &w) in xs.iter().zip(ys.iter()).zip(ws.iter()) {
        sw += w;
        swx += w * x;
        swxx += w * x * x;
        swy += w * y;
        swxy += w * x * y;
    }
    let gram = Matrix2::new(sw, swx, swx, swxx);
    let moment = Vector2::new(swy, swxy);
    let beta = gram.try_inverse().ok_or(RegressionError::Singular)? * moment;
    Ok((beta[0], beta[1]))
}

/// Regress the empirical q-scores on the mean q-scores of basecalls. Returns (intercept, slope).
pub fn calculate_regression(mean_qscores: &[f64], calc_qscores: &[f64]) -> Result<(f64, f64), RegressionError> {
    let fit = HuberRegression::default().fit(mean_qscores, calc_qscores)?;
    Ok((fit.intercept, fit.slope))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_distr::{Distribution, Normal};
    use rand_xoshiro::Xoshiro256PlusPlus;
    fn sim_line<R: Rng>(rng: &mut R, n: usize, noise: f64) -> (Vec<f64>, Vec<f64>) {
        let normal = Normal::new(0f64, noise).unwrap();
        let xs: Vec<f64> = (0..n).map(|_| rng.gen_range(5f64..35f64)).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2f64 * x + 1f64 + normal.sample(&mut *rng)).collect();
        (xs, ys)
    }
    #[test]
    fn recover_line() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(4234);
        let (xs, ys) = sim_line(&mut rng, 200, 0.1);
        let (intercept, slope) = calculate_regression(&xs, &ys).unwrap();
        assert!((slope - 2f64).abs() < 0.05, "{}", slope);
        assert!((intercept - 1f64).abs() < 0.2, "{}", intercept);
    }
    #[test]
    fn robust_to_outliers() {
        let mut rng: Xoshiro256PlusPlus = SeedableRng::seed_from_u64(2);
        let (xs, mut ys) = sim_line(&mut rng, 300, 0.2);
        ys.iter_mut().step_by(10).for_each(|y| *y += 20f64);
        let fit = HuberRegression::default().fit(&xs, &ys).unwrap();
        assert!((fit.slope - 2f64).abs() < 0.05, "{:?}", fit);
        assert!((fit.intercept - 1f64).abs() < 0.5, "{:?}", fit);
        // Least squares passes through the mean, which the outliers shift by 2.
        let ones = vec![1f64; xs.len()];
        let (c, m) = weighted_least_squares(&xs, &ys, &ones).unwrap();
        let mean_x = xs.iter().sum::<f64>() / xs.len() as f64;
        let shift = c + m * mean_x - (2f64 * mean_x + 1f64);
        assert!(1.5 < shift, "{}", shift);
        assert!((fit.predict(mean_x) - (2f64 * mean_x + 1f64)).abs() < 0.2);
    }
    #[test]
    fn exact_line() {
        let xs: Vec<f64> = (0..10).map(|x| x as f64).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2f64 * x + 1f64).collect();
        let fit = HuberRegression::default().fit(&xs, &ys).unwrap();
        assert!((fit.slope - 2f64).abs() < 0.000_001);
        assert!((fit.intercept - 1f64).abs() < 0.000_001);
        assert!((fit.predict(3f64) - 7f64).abs() < 0.000_001);
    }
    #[test]
    fn degenerate_inputs() {
        let huber = HuberRegression::default();
        assert_eq!(huber.fit(&[1f64], &[2f64]), Err(RegressionError::TooFewPoints(1)));
        assert_eq!(
            huber.fit(&[1f64, 2f64], &[2f64]),
            Err(RegressionError::Length(2, 1))
        );
        assert_eq!(
            huber.fit(&[3f64, 3f64, 3f64], &[1f64, 2f64, 3f64]),
            Err(RegressionError::Singular)
        );
    }
    #[test]
    fn median_absolute_deviation() {
        let mad = mad(&[-1f64, 2f64, -3f64, 4f64]);
        assert!((mad - 2.5 / MAD_NORMALIZER).abs() < 0.000_001);
    }
}
