//! Estimates where the light source is, given where the sensors are and how
//! bright each of them reads.
//!
//! Two physical models are available, see [`EstimationModel`]. Both are
//! turned into a scalar cost over candidate points and minimized with
//! [`NelderMead`], seeded at the centroid of the sensors.

use crate::nelder_mead::{Minimum, NelderMead};
use crate::{PixelPoint, Point};

use clap::ValueEnum;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fewest sensors that pin down a position
pub const MIN_SENSORS: usize = 2;

/// How intensity readings are related to distance from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
pub enum EstimationModel {
    /// Intensity falls off with the square of the distance. Every pair of
    /// sensors contributes the mismatch between their log-intensity ratio
    /// and the ratio predicted by their distances, so an unknown gain
    /// shared by all sensors cancels out.
    #[default]
    InverseSquare,
    /// Each reading maps linearly to a pseudo-distance
    /// (`max_strength + distance_offset - reading`) and the fit is weighted
    /// towards the brightest, nearest sensors.
    PseudoDistance,
}

impl fmt::Display for EstimationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimationModel::InverseSquare => write!(f, "inverse-square"),
            EstimationModel::PseudoDistance => write!(f, "pseudo-distance"),
        }
    }
}

/// Reasons an estimate could not be attempted.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimateError {
    /// Not enough active sensors with a reading.
    InsufficientSensors {
        /// Fewest sensors accepted
        need: usize,
        /// Sensors given
        have: usize,
    },
    /// `positions` and `readings` do not line up.
    DimensionMismatch {
        /// Length of the position slice
        positions: usize,
        /// Length of the reading slice
        readings: usize,
    },
    /// A reading is negative, infinite or not a number.
    InvalidReading {
        /// Position of the reading in the slice
        index: usize,
        /// The offending value
        reading: f64,
    },
}

impl fmt::Display for EstimateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateError::InsufficientSensors { need, have } => {
                write!(f, "need at least {} sensors, got {}", need, have)
            }
            EstimateError::DimensionMismatch {
                positions,
                readings,
            } => write!(
                f,
                "position count ({}) != reading count ({})",
                positions, readings
            ),
            EstimateError::InvalidReading { index, reading } => {
                write!(f, "reading {} is unusable: {}", index, reading)
            }
        }
    }
}

impl std::error::Error for EstimateError {}

/// Per-sensor terms that do not depend on the candidate point.
enum Prepared {
    InverseSquare { logs: Vec<f64> },
    PseudoDistance { targets: Vec<(f64, f64)> },
}

/// Fits a source position to a set of sensor readings.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceEstimator {
    /// Objective to minimize
    pub model: EstimationModel,
    /// Added before every logarithm and distance division
    pub epsilon: f64,
    /// Strongest reading a mote can produce
    pub max_strength: f64,
    /// Pseudo-distance of a sensor reading `max_strength`
    pub distance_offset: f64,
    /// Budget and tolerances of the fit. The initial step is replaced by
    /// one scaled to the sensor layout.
    pub solver: NelderMead,
}

impl Default for SourceEstimator {
    fn default() -> Self {
        Self {
            model: EstimationModel::default(),
            epsilon: 1e-6,
            max_strength: 300.0,
            distance_offset: 10.0,
            solver: NelderMead::default(),
        }
    }
}

impl SourceEstimator {
    /// Default settings with the given model.
    pub fn new(model: EstimationModel) -> Self {
        Self {
            model,
            ..Self::default()
        }
    }

    /// The best-fit source position, rounded to the nearest pixel.
    pub fn estimate(
        &self,
        positions: &[Point],
        readings: &[f64],
    ) -> Result<PixelPoint, EstimateError> {
        self.locate(positions, readings)
            .map(|min| PixelPoint::from(min.point))
    }

    /// Runs the minimizer and returns the unrounded result together with
    /// its cost and iteration count. Nothing is attempted with fewer than
    /// [`MIN_SENSORS`] sensors, or when a reading is not a finite,
    /// non-negative number.
    pub fn locate(&self, positions: &[Point], readings: &[f64]) -> Result<Minimum, EstimateError> {
        if positions.len() != readings.len() {
            return Err(EstimateError::DimensionMismatch {
                positions: positions.len(),
                readings: readings.len(),
            });
        }
        if positions.len() < MIN_SENSORS {
            return Err(EstimateError::InsufficientSensors {
                need: MIN_SENSORS,
                have: positions.len(),
            });
        }
        if let Some((index, &reading)) = readings
            .iter()
            .enumerate()
            .find(|(_, r)| !(r.is_finite() && **r >= 0.0))
        {
            return Err(EstimateError::InvalidReading { index, reading });
        }

        let centroid = centroid(positions);
        let spread = positions
            .iter()
            .map(|p| p.abs_dist(&centroid))
            .fold(0.0, f64::max);
        let solver = NelderMead {
            initial_step: (spread * 0.25).max(1.0),
            ..self.solver
        };

        let prepared = self.prepare(readings);
        let min = solver.minimize(centroid, |p| self.cost(&prepared, positions, p));

        if min.converged {
            debug!(
                "{} fit converged to {} after {} iterations (cost {:.3e})",
                self.model, min.point, min.iterations, min.value
            );
        } else {
            warn!(
                "{} fit stopped at {} after {} iterations without converging (cost {:.3e})",
                self.model, min.point, min.iterations, min.value
            );
        }

        Ok(min)
    }

    fn prepare(&self, readings: &[f64]) -> Prepared {
        match self.model {
            EstimationModel::InverseSquare => Prepared::InverseSquare {
                logs: readings
                    .iter()
                    .map(|r| (r.max(0.0) + self.epsilon).ln())
                    .collect(),
            },
            EstimationModel::PseudoDistance => Prepared::PseudoDistance {
                targets: readings
                    .iter()
                    .map(|r| {
                        let distance = self.max_strength + self.distance_offset - r;
                        let normalized = distance / self.max_strength;
                        // Readings below the offset would give a negative weight
                        let weight = (1.0 + (1.0 - normalized)).ln().max(0.0);
                        (distance, weight)
                    })
                    .collect(),
            },
        }
    }

    fn cost(&self, prepared: &Prepared, positions: &[Point], p: Point) -> f64 {
        match prepared {
            Prepared::InverseSquare { logs } => {
                let log_dists: Vec<f64> = positions
                    .iter()
                    .map(|s| (s.abs_dist(&p) + self.epsilon).ln())
                    .collect();
                let mut total = 0.0;
                for i in 0..positions.len() {
                    for j in (i + 1)..positions.len() {
                        let observed = logs[i] - logs[j];
                        let predicted = 2.0 * (log_dists[j] - log_dists[i]);
                        total += (observed - predicted).powi(2);
                    }
                }
                total
            }
            Prepared::PseudoDistance { targets } => positions
                .iter()
                .zip(targets)
                .map(|(s, &(distance, weight))| (s.abs_dist(&p) - distance).powi(2) * weight)
                .sum(),
        }
    }
}

fn centroid(points: &[Point]) -> Point {
    let n = points.len() as f64;
    let (x, y) = points
        .iter()
        .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
    Point { x: x / n, y: y / n }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    /// Readings an ideal inverse-square source of strength `k` at `source`
    /// would produce
    fn inverse_square(sensors: &[Point], source: Point, k: f64) -> Vec<f64> {
        sensors
            .iter()
            .map(|s| k / s.abs_dist(&source).powi(2))
            .collect()
    }

    #[test]
    fn recovers_inverse_square_source() {
        let sensors = [pt(0.0, 0.0), pt(100.0, 0.0), pt(50.0, 100.0)];
        let estimator = SourceEstimator::new(EstimationModel::InverseSquare);

        for k in [100.0, 2500.0, 4.0e6] {
            let readings = inverse_square(&sensors, pt(50.0, 50.0), k);
            let estimate = estimator.estimate(&sensors, &readings).unwrap();
            assert!(
                (estimate.x - 50).abs() <= 2 && (estimate.y - 50).abs() <= 2,
                "k={} gave {}",
                k,
                estimate
            );
        }
    }

    #[test]
    fn recovers_pseudo_distance_source() {
        let sensors = [pt(0.0, 0.0), pt(200.0, 0.0), pt(100.0, 200.0)];
        let source = pt(100.0, 80.0);
        let estimator = SourceEstimator::new(EstimationModel::PseudoDistance);
        let readings: Vec<f64> = sensors
            .iter()
            .map(|s| estimator.max_strength + estimator.distance_offset - s.abs_dist(&source))
            .collect();

        let estimate = estimator.estimate(&sensors, &readings).unwrap();

        assert!((estimate.x - 100).abs() <= 2, "{}", estimate);
        assert!((estimate.y - 80).abs() <= 2, "{}", estimate);
    }

    #[test]
    fn symmetric_layout_finds_centre() {
        let sensors = [
            pt(100.0, 100.0),
            pt(300.0, 100.0),
            pt(100.0, 300.0),
            pt(300.0, 300.0),
        ];
        let centre = PixelPoint { x: 200, y: 200 };

        let inverse = SourceEstimator::new(EstimationModel::InverseSquare);
        let estimate = inverse.estimate(&sensors, &[80.0; 4]).unwrap();
        assert!((estimate.x - centre.x).abs() <= 2 && (estimate.y - centre.y).abs() <= 2);

        // Pseudo-distance equal to the half diagonal
        let pseudo = SourceEstimator::new(EstimationModel::PseudoDistance);
        let reading = pseudo.max_strength + pseudo.distance_offset - 100.0 * 2f64.sqrt();
        let estimate = pseudo.estimate(&sensors, &[reading; 4]).unwrap();
        assert!((estimate.x - centre.x).abs() <= 2 && (estimate.y - centre.y).abs() <= 2);
    }

    #[test]
    fn sensor_order_does_not_matter() {
        let sensors = vec![
            pt(120.0, 90.0),
            pt(410.0, 130.0),
            pt(260.0, 380.0),
            pt(90.0, 300.0),
        ];
        let source = pt(230.0, 210.0);

        for model in [EstimationModel::InverseSquare, EstimationModel::PseudoDistance] {
            let estimator = SourceEstimator::new(model);
            let readings = match model {
                EstimationModel::InverseSquare => inverse_square(&sensors, source, 1.0e5),
                EstimationModel::PseudoDistance => sensors
                    .iter()
                    .map(|s| 300.0 - 0.8 * s.abs_dist(&source))
                    .collect(),
            };
            let forward = estimator.locate(&sensors, &readings).unwrap().point;

            let order = [2, 0, 3, 1];
            let shuffled_sensors: Vec<Point> = order.iter().map(|&i| sensors[i]).collect();
            let shuffled_readings: Vec<f64> = order.iter().map(|&i| readings[i]).collect();
            let shuffled = estimator
                .locate(&shuffled_sensors, &shuffled_readings)
                .unwrap()
                .point;

            assert!(
                forward.abs_dist(&shuffled) < 0.5,
                "{}: {} vs {}",
                model,
                forward,
                shuffled
            );
        }
    }

    #[test]
    fn refuses_fewer_than_two_sensors() {
        let estimator = SourceEstimator::default();

        assert_eq!(
            estimator.estimate(&[pt(1.0, 1.0)], &[10.0]),
            Err(EstimateError::InsufficientSensors { need: 2, have: 1 })
        );
        assert_eq!(
            estimator.estimate(&[], &[]),
            Err(EstimateError::InsufficientSensors { need: 2, have: 0 })
        );
    }

    #[test]
    fn refuses_mismatched_inputs() {
        let estimator = SourceEstimator::default();

        assert_eq!(
            estimator.estimate(&[pt(1.0, 1.0), pt(2.0, 2.0)], &[10.0]),
            Err(EstimateError::DimensionMismatch {
                positions: 2,
                readings: 1
            })
        );
    }

    #[test]
    fn refuses_unusable_readings() {
        let sensors = [pt(0.0, 0.0), pt(100.0, 0.0), pt(50.0, 100.0)];

        for model in [EstimationModel::InverseSquare, EstimationModel::PseudoDistance] {
            let estimator = SourceEstimator::new(model);

            let err = estimator
                .locate(&sensors, &[f64::NAN, 200.0, 100.0])
                .unwrap_err();
            assert!(
                matches!(err, EstimateError::InvalidReading { index: 0, reading } if reading.is_nan())
            );
            assert_eq!(
                estimator.estimate(&sensors, &[20.0, f64::INFINITY, 10.0]),
                Err(EstimateError::InvalidReading {
                    index: 1,
                    reading: f64::INFINITY
                })
            );
            assert_eq!(
                estimator.estimate(&sensors, &[20.0, 10.0, -4.0]),
                Err(EstimateError::InvalidReading {
                    index: 2,
                    reading: -4.0
                })
            );
        }
    }

    #[test]
    fn zero_readings_stay_finite() {
        let sensors = [pt(0.0, 0.0), pt(100.0, 0.0), pt(50.0, 100.0)];
        let min = SourceEstimator::default()
            .locate(&sensors, &[0.0, 0.0, 0.0])
            .unwrap();

        assert!(min.value.is_finite());
        assert!(min.point.x.is_finite() && min.point.y.is_finite());
    }
}
