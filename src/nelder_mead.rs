//! A small two-dimensional Nelder–Mead simplex minimizer.
//!
//! Derivative-free, which suits the estimator objectives: they are cheap to
//! evaluate but have kinks wherever a candidate point sits on top of a
//! sensor. The iteration budget is explicit so a bad input can never stall
//! the interactive loop.

use crate::Point;

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Tuning for [`NelderMead::minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NelderMead {
    /// Upper bound on simplex iterations
    pub max_iterations: usize,
    /// Stop once every vertex is within this distance of the best one...
    pub x_tolerance: f64,
    /// ...and every vertex value is within this of the best value
    pub f_tolerance: f64,
    /// Edge length of the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 400,
            x_tolerance: 1e-4,
            f_tolerance: 1e-4,
            initial_step: 10.0,
        }
    }
}

/// The outcome of a minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Minimum {
    /// Best vertex found
    pub point: Point,
    /// Objective at `point`
    pub value: f64,
    /// Simplex iterations performed
    pub iterations: usize,
    /// `false` when the iteration budget ran out first
    pub converged: bool,
}

/// Largest of `spreads`, or NaN if any of them is NaN
fn max_spread(spreads: impl Iterator<Item = f64>) -> f64 {
    spreads.fold(0.0, |acc, v| if v.is_nan() { f64::NAN } else { acc.max(v) })
}

fn lerp(from: Point, to: Point, t: f64) -> Point {
    Point {
        x: from.x + t * (to.x - from.x),
        y: from.y + t * (to.y - from.y),
    }
}

impl NelderMead {
    /// Minimize `f` starting from a simplex anchored at `start`.
    pub fn minimize<F>(&self, start: Point, f: F) -> Minimum
    where
        F: Fn(Point) -> f64,
    {
        let step = if self.initial_step > 0.0 {
            self.initial_step
        } else {
            1.0
        };
        let mut simplex: [(Point, f64); 3] = [
            start,
            Point {
                x: start.x + step,
                y: start.y,
            },
            Point {
                x: start.x,
                y: start.y + step,
            },
        ]
        .map(|p| (p, f(p)));

        let mut iterations = 0;
        let mut converged = false;
        while iterations < self.max_iterations {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
            let (best, worst) = (simplex[0], simplex[2]);
            // Nothing finite to descend from
            if !best.1.is_finite() {
                break;
            }

            let x_spread = max_spread(
                simplex[1..]
                    .iter()
                    .map(|(p, _)| (p.x - best.0.x).abs().max((p.y - best.0.y).abs())),
            );
            let f_spread = max_spread(simplex[1..].iter().map(|(_, v)| (v - best.1).abs()));
            if x_spread <= self.x_tolerance && f_spread <= self.f_tolerance {
                converged = true;
                break;
            }
            iterations += 1;

            // Centroid of every vertex except the worst
            let centroid = lerp(simplex[0].0, simplex[1].0, 0.5);

            let reflected = lerp(centroid, worst.0, -REFLECTION);
            let f_reflected = f(reflected);

            if f_reflected < best.1 {
                let expanded = lerp(centroid, worst.0, -EXPANSION);
                let f_expanded = f(expanded);
                simplex[2] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < simplex[1].1 {
                simplex[2] = (reflected, f_reflected);
                continue;
            }

            let contracted = if f_reflected < worst.1 {
                lerp(centroid, reflected, CONTRACTION)
            } else {
                lerp(centroid, worst.0, CONTRACTION)
            };
            let f_contracted = f(contracted);
            if f_contracted < worst.1.min(f_reflected) {
                simplex[2] = (contracted, f_contracted);
                continue;
            }

            for vertex in simplex[1..].iter_mut() {
                let p = lerp(best.0, vertex.0, SHRINK);
                *vertex = (p, f(p));
            }
        }

        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
        Minimum {
            point: simplex[0].0,
            value: simplex[0].1,
            iterations,
            converged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_bowl_minimum() {
        let target = Point { x: 3.0, y: -7.5 };
        let min = NelderMead::default().minimize(Point { x: 0.0, y: 0.0 }, |p| {
            (p.x - target.x).powi(2) + 2.0 * (p.y - target.y).powi(2)
        });

        assert!(min.converged);
        assert!(min.point.abs_dist(&target) < 0.01);
        assert!(min.value < 1e-3);
    }

    #[test]
    fn rosenbrock_valley() {
        let nm = NelderMead {
            max_iterations: 2000,
            x_tolerance: 1e-6,
            f_tolerance: 1e-9,
            initial_step: 0.5,
        };
        let min = nm.minimize(Point { x: -1.2, y: 1.0 }, |p| {
            (1.0 - p.x).powi(2) + 100.0 * (p.y - p.x * p.x).powi(2)
        });

        assert!(min.converged);
        assert!(min.point.abs_dist(&Point { x: 1.0, y: 1.0 }) < 1e-2);
    }

    #[test]
    fn respects_iteration_budget() {
        let nm = NelderMead {
            max_iterations: 3,
            ..NelderMead::default()
        };
        let min = nm.minimize(Point { x: 500.0, y: 500.0 }, |p| p.x * p.x + p.y * p.y);

        assert!(!min.converged);
        assert_eq!(min.iterations, 3);
    }

    #[test]
    fn nan_objective_never_converges() {
        let min = NelderMead::default().minimize(Point { x: 1.0, y: 1.0 }, |_| f64::NAN);

        assert!(!min.converged);
        assert!(min.value.is_nan());
    }

    #[test]
    fn nan_region_blocks_convergence() {
        // A tight simplex whose vertices off the start evaluate to NaN
        let nm = NelderMead {
            initial_step: 1e-6,
            max_iterations: 50,
            ..NelderMead::default()
        };
        let min = nm.minimize(Point { x: 0.0, y: 0.0 }, |p| {
            if p.x == 0.0 && p.y == 0.0 {
                0.0
            } else {
                f64::NAN
            }
        });

        assert!(!min.converged);
        assert_eq!(min.point, Point { x: 0.0, y: 0.0 });
    }
}
