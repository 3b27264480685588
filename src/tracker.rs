//! Keeps the last known source estimate between ticks.

use crate::estimator::{SourceEstimator, MIN_SENSORS};
use crate::sensor_registry::SensorRegistry;
use crate::PixelPoint;

use log::{trace, warn};

/// Re-estimates the source position every tick when enough sensors are
/// active, and otherwise holds on to the previous estimate.
#[derive(Debug, Clone)]
pub struct SourceTracker {
    estimator: SourceEstimator,
    last: Option<PixelPoint>,
}

impl SourceTracker {
    /// A tracker with no estimate yet.
    pub fn new(estimator: SourceEstimator) -> Self {
        Self {
            estimator,
            last: None,
        }
    }

    /// Estimate from the active sensors of `registry`. With fewer than
    /// two of them the estimator is not run and the previous estimate,
    /// if any, is returned unchanged.
    pub fn update(&mut self, registry: &SensorRegistry) -> Option<PixelPoint> {
        let (positions, readings) = registry.observations();
        if positions.len() < MIN_SENSORS {
            trace!(
                "{} active sensor(s) with readings, keeping {:?}",
                positions.len(),
                self.last
            );
            return self.last;
        }

        match self.estimator.estimate(&positions, &readings) {
            Ok(estimate) => self.last = Some(estimate),
            Err(e) => warn!("Skipping estimate: {}", e),
        }
        self.last
    }

    /// The most recent successful estimate
    pub fn last(&self) -> Option<PixelPoint> {
        self.last
    }

    /// The estimator used by [`SourceTracker::update`]
    pub fn estimator(&self) -> &SourceEstimator {
        &self.estimator
    }
}
