//! Fixed spherical camera grid.
//!
//! Angles are in degrees. `phi` is the azimuth around the vertical axis and
//! `theta` the elevation, with -90 looking from below and 90 from above.

use crate::error::{ThumbnailError, ThumbnailResult};

/// A camera orientation on the unit sphere and its position in the grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSample {
    pub index: usize,
    pub phi: f64,
    pub theta: f64,
}

/// `n` azimuth angles evenly spaced over [0, 360).
pub fn phi_values(n: usize) -> ThumbnailResult<Vec<f64>> {
    if n == 0 {
        return Err(ThumbnailError::validation(
            "phi sample count must be at least 1",
        ));
    }
    let step = 360.0 / n as f64;
    Ok((0..n).map(|i| step * i as f64).collect())
}

/// `n` elevation angles spanning [-90, 90] inclusive, or `[0]` for a single sample.
pub fn theta_values(n: usize) -> ThumbnailResult<Vec<f64>> {
    match n {
        0 => Err(ThumbnailError::validation(
            "theta sample count must be at least 1",
        )),
        1 => Ok(vec![0.0]),
        _ => {
            let step = 180.0 / (n - 1) as f64;
            Ok((0..n)
                .map(|i| if i == n - 1 { 90.0 } else { -90.0 + step * i as f64 })
                .collect())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AngularGrid {
    phi: Vec<f64>,
    theta: Vec<f64>,
}

impl AngularGrid {
    pub fn new(phi_samples: usize, theta_samples: usize) -> ThumbnailResult<Self> {
        Ok(Self {
            phi: phi_values(phi_samples)?,
            theta: theta_values(theta_samples)?,
        })
    }

    /// Grid with the same angular step along both axes.
    pub fn from_step(step: f64) -> ThumbnailResult<Self> {
        if !step.is_finite() || step <= 0.0 || step > 360.0 {
            return Err(ThumbnailError::validation(format!(
                "angle step must be within (0, 360], got {step}"
            )));
        }
        let phi_samples = ((360.0 / step).round() as usize).max(1);
        let theta_samples = (180.0 / step).round() as usize + 1;
        Self::new(phi_samples, theta_samples)
    }

    pub fn phi(&self) -> &[f64] {
        &self.phi
    }

    pub fn theta(&self) -> &[f64] {
        &self.theta
    }

    pub fn len(&self) -> usize {
        self.phi.len() * self.theta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Samples in phi-major order: every theta for a phi before the next phi.
    pub fn samples(&self) -> impl Iterator<Item = CameraSample> + '_ {
        self.phi.iter().enumerate().flat_map(move |(p, &phi)| {
            self.theta
                .iter()
                .enumerate()
                .map(move |(t, &theta)| CameraSample {
                    index: p * self.theta.len() + t,
                    phi,
                    theta,
                })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phi_values_cover_the_circle() {
        for n in 1..=37 {
            let phi = phi_values(n).unwrap();
            assert_eq!(phi.len(), n);
            assert_eq!(phi[0], 0.0);
            assert!(phi.windows(2).all(|w| w[0] < w[1]));
            assert!(phi.iter().all(|&v| (0.0..360.0).contains(&v)));
        }
    }

    #[test]
    fn theta_values_span_poles() {
        assert_eq!(theta_values(1).unwrap(), vec![0.0]);
        for n in 2..=19 {
            let theta = theta_values(n).unwrap();
            assert_eq!(theta.len(), n);
            assert_eq!(theta[0], -90.0);
            assert_eq!(theta[n - 1], 90.0);
            let step = 180.0 / (n - 1) as f64;
            for w in theta.windows(2) {
                assert!((w[1] - w[0] - step).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn zero_samples_are_rejected() {
        assert!(matches!(phi_values(0), Err(ThumbnailError::Validation(_))));
        assert!(matches!(theta_values(0), Err(ThumbnailError::Validation(_))));
        assert!(AngularGrid::new(4, 0).is_err());
    }

    #[test]
    fn grid_is_phi_major() {
        let grid = AngularGrid::new(4, 3).unwrap();
        let samples: Vec<_> = grid.samples().collect();
        assert_eq!(samples.len(), 12);
        for (i, s) in samples.iter().enumerate() {
            assert_eq!(s.index, i);
            assert_eq!(s.phi, grid.phi()[i / 3]);
            assert_eq!(s.theta, grid.theta()[i % 3]);
        }
    }

    #[test]
    fn from_step_matches_job_defaults() {
        let grid = AngularGrid::from_step(20.0).unwrap();
        assert_eq!(grid.phi().len(), 18);
        assert_eq!(grid.theta().len(), 10);
        assert_eq!(grid.theta()[0], -90.0);
        assert!(AngularGrid::from_step(0.0).is_err());
        assert!(AngularGrid::from_step(f64::NAN).is_err());
    }
}
