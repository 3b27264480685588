//! Runtime configuration, read from a [RON](https://github.com/ron-rs/ron)
//! file. Every field is optional, so a config file only has to name what
//! it changes:
//!
//! ```text
//! (
//!     model: PseudoDistance,
//!     tick_rate: 30.0,
//!     sensors: [
//!         (id: Some(3), x: 120.0, y: 80.0),
//!         (id: Some(4), x: 400.0, y: 260.0, active: false),
//!     ],
//! )
//! ```

use crate::estimator::{EstimationModel, SourceEstimator};
use crate::frame_decoder::{FrameDecoder, DEFAULT_MAX_BUFFERED};
use crate::nelder_mead::NelderMead;
use crate::replay::REPLAY_OFFSET;
use crate::sensor_registry::{SensorId, SensorRegistry};
use crate::Point;

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    fs::File,
    io::{Read, Write},
    path::Path,
};

/// Slowest loop rate accepted, in ticks per second
pub const MIN_TICK_RATE: f64 = 1e-3;

/// Where a sensor sits on the map, as laid out by the user.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SensorPlacement {
    /// Wire id, `None` for a sensor that only exists on the map
    #[serde(default)]
    pub id: Option<SensorId>,
    /// Horizontal position, in pixels
    pub x: f64,
    /// Vertical position, in pixels
    pub y: f64,
    /// Whether the sensor takes part in estimation
    #[serde(default = "default_active")]
    pub active: bool,
    /// Starting intensity, for sensors that are not reporting over the wire
    #[serde(default)]
    pub intensity: Option<f64>,
}

fn default_active() -> bool {
    true
}

/// All the knobs of a run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// How readings are turned into a position
    pub model: EstimationModel,
    /// See [`SourceEstimator::epsilon`]
    pub epsilon: f64,
    /// See [`SourceEstimator::max_strength`]
    pub max_strength: f64,
    /// See [`SourceEstimator::distance_offset`]
    pub distance_offset: f64,
    /// Minimizer iteration budget per estimate
    pub max_iterations: usize,
    /// Minimizer stopping tolerance, used for both position and cost
    pub tolerance: f64,
    /// Loop iterations per second
    pub tick_rate: f64,
    /// Cap on unconsumed serial text, see [`FrameDecoder::new`]
    pub max_buffered_bytes: usize,
    /// Frames skipped at the head of each replayed sequence
    pub replay_offset: usize,
    /// Where newly discovered motes are dropped on the map
    pub spawn: Point,
    /// Sensors placed before any mote reports
    pub sensors: Vec<SensorPlacement>,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        let estimator = SourceEstimator::default();
        let manual = |x, y| SensorPlacement {
            id: None,
            x,
            y,
            active: true,
            intensity: Some(10.0),
        };

        Self {
            model: estimator.model,
            epsilon: estimator.epsilon,
            max_strength: estimator.max_strength,
            distance_offset: estimator.distance_offset,
            max_iterations: estimator.solver.max_iterations,
            tolerance: estimator.solver.x_tolerance,
            tick_rate: 60.0,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
            replay_offset: REPLAY_OFFSET,
            spawn: Point { x: 160.0, y: 160.0 },
            sensors: vec![
                manual(110.0, 110.0),
                manual(210.0, 210.0),
                manual(310.0, 110.0),
            ],
        }
    }
}

/// Things that can go wrong loading or saving a [LocatorConfig].
#[derive(Debug)]
pub enum ConfigError {
    /// Returned when io fails when reading or writing files.
    IoError(std::io::Error),
    /// Returned when serialization fails.
    RonError(ron::Error),
    /// Returned when the file is not valid RON for a [LocatorConfig].
    RonSpannedError(ron::de::SpannedError),
    /// Returned when a value is out of its meaningful range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ConfigError as CE;
        let msg = match self {
            CE::IoError(error) => Cow::from(format!("io error: {}", error)),
            CE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            CE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
            CE::Invalid(why) => Cow::from(*why),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for ConfigError {}

impl LocatorConfig {
    /// Read a [LocatorConfig] from the path provided.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut handle = File::open(path).map_err(ConfigError::IoError)?;
        Self::from_file(&mut handle)
    }

    /// Read a [LocatorConfig] from the [Read]able object provided.
    pub fn from_file(file: &mut impl Read) -> Result<Self, ConfigError> {
        let mut raw_text = String::new();
        file.read_to_string(&mut raw_text)
            .map_err(ConfigError::IoError)?;

        let config = ron::de::from_str::<LocatorConfig>(&raw_text)
            .map_err(ConfigError::RonSpannedError)?;
        config.validate()?;
        Ok(config)
    }

    /// Write out a [LocatorConfig] to the path provided.
    pub fn to_path(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let mut handle = File::create(path).map_err(ConfigError::IoError)?;
        self.to_file(&mut handle)
    }

    /// Write out a [LocatorConfig] to the [Write]able object provided.
    pub fn to_file(&self, file: &mut impl Write) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::RonError)?;
        file.write_all(text.as_bytes())
            .map_err(ConfigError::IoError)
    }

    /// Reject values no run could make sense of.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.tick_rate.is_finite() && self.tick_rate >= MIN_TICK_RATE) {
            return Err(ConfigError::Invalid(
                "tick_rate must be finite and at least one tick per 1000 seconds",
            ));
        }
        if !(self.max_strength > 0.0) {
            return Err(ConfigError::Invalid("max_strength must be positive"));
        }
        if !(self.epsilon > 0.0) {
            return Err(ConfigError::Invalid("epsilon must be positive"));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::Invalid("max_iterations must be at least 1"));
        }
        if self.max_buffered_bytes == 0 {
            return Err(ConfigError::Invalid("max_buffered_bytes must be at least 1"));
        }
        Ok(())
    }

    /// A [`SourceEstimator`] with these settings.
    pub fn estimator(&self) -> SourceEstimator {
        SourceEstimator {
            model: self.model,
            epsilon: self.epsilon,
            max_strength: self.max_strength,
            distance_offset: self.distance_offset,
            solver: NelderMead {
                max_iterations: self.max_iterations,
                x_tolerance: self.tolerance,
                f_tolerance: self.tolerance,
                ..NelderMead::default()
            },
        }
    }

    /// An empty [`FrameDecoder`] capped at `max_buffered_bytes`.
    pub fn decoder(&self) -> FrameDecoder {
        FrameDecoder::new(self.max_buffered_bytes)
    }

    /// A registry holding every configured sensor placement.
    pub fn registry(&self) -> SensorRegistry {
        let mut registry = SensorRegistry::new(self.spawn);
        for placement in &self.sensors {
            let i = registry.add_sensor(
                placement.id,
                Point {
                    x: placement.x,
                    y: placement.y,
                },
                placement.active,
            );
            if let Some(intensity) = placement.intensity {
                registry.set_intensity(i, intensity);
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let text = r#"(
            model: PseudoDistance,
            tick_rate: 30.0,
            sensors: [
                (id: Some(3), x: 120.0, y: 80.0),
                (x: 400.0, y: 260.0, active: false),
            ],
        )"#;

        let config = LocatorConfig::from_file(&mut text.as_bytes()).unwrap();

        assert_eq!(config.model, EstimationModel::PseudoDistance);
        assert_eq!(config.tick_rate, 30.0);
        assert_eq!(config.replay_offset, REPLAY_OFFSET);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.sensors[0].id, Some(3));
        assert!(config.sensors[0].active);
        assert!(!config.sensors[1].active);
        assert_eq!(config.sensors[1].id, None);
    }

    #[test]
    fn file_round_trip() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut config = LocatorConfig::default();
        config.max_iterations = 50;
        config.spawn = Point { x: 1.0, y: 2.0 };

        config.to_path(file.path()).unwrap();
        let loaded = LocatorConfig::from_path(file.path()).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn rejects_bad_values() {
        let err = LocatorConfig::from_file(&mut "(tick_rate: 0.0)".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        for rate in ["1e-300", "-5.0"] {
            let text = format!("(tick_rate: {})", rate);
            let err = LocatorConfig::from_file(&mut text.as_bytes()).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{}", rate);
        }
        for rate in [f64::INFINITY, f64::NAN] {
            let config = LocatorConfig {
                tick_rate: rate,
                ..LocatorConfig::default()
            };
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
        let slow = LocatorConfig::from_file(&mut "(tick_rate: 0.001)".as_bytes()).unwrap();
        assert_eq!(slow.tick_rate, MIN_TICK_RATE);

        let err = LocatorConfig::from_file(&mut "(model: Sideways)".as_bytes()).unwrap_err();
        assert!(matches!(err, ConfigError::RonSpannedError(_)));

        let err = LocatorConfig::from_path("/definitely/not/here.ron").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }

    #[test]
    fn default_registry_is_estimable() {
        let config = LocatorConfig::default();
        let registry = config.registry();

        let (positions, readings) = registry.observations();
        assert_eq!(positions.len(), 3);
        assert_eq!(readings, vec![10.0; 3]);
        assert!(config.estimator().estimate(&positions, &readings).is_ok());
    }
}
