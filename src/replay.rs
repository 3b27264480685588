//! Stands in for the motes when no hardware is attached, by replaying a
//! recorded light dataset.
//!
//! The dataset is a table with one row per sample:
//!
//! ```text
//! sensor_id,light
//! 3,512
//! 4,130
//! 3,498
//! ```
//!
//! Rows are grouped into one sequence per sensor, in file order, and the
//! sensors are served in ascending id order.

use crate::sensor_registry::{Reading, SensorId};

use log::{debug, info};
use rand::prelude::*;
use serde::Deserialize;
use std::{
    collections::BTreeMap,
    fmt,
    fs::File,
    io::{self, Read},
    path::Path,
};

/// Most sensors a replay will serve at once
pub const MAX_REPLAY_SENSORS: usize = 4;
/// Frames skipped at the head of every recorded sequence
pub const REPLAY_OFFSET: usize = 1200;

/// Synthetic reading ranges used once the recording runs dry
const FALLBACK_RANGES: [std::ops::Range<f64>; 2] = [20.0..30.0, 30.0..40.0];

/// One replay frame, a value (or nothing) per sensor slot
pub type ReplayFrame = [Option<f64>; MAX_REPLAY_SENSORS];

/// Things that can go wrong loading a replay dataset.
#[derive(Debug)]
pub enum ReplayError {
    /// Could not open the dataset.
    IoError(io::Error),
    /// A row is missing a column or holds something that is not a number.
    CsvError(csv::Error),
    /// The dataset has fewer distinct sensors than an estimate needs.
    TooFewSensors(usize),
    /// A light value is negative, infinite or not a number.
    InvalidLight {
        /// Sensor the value belongs to
        sensor_id: SensorId,
        /// Data row, counted from zero in file order
        record: usize,
        /// The offending value
        light: f64,
    },
}

impl fmt::Display for ReplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplayError::IoError(e) => write!(f, "io error: {}", e),
            ReplayError::CsvError(e) => write!(f, "malformed dataset: {}", e),
            ReplayError::TooFewSensors(n) => {
                write!(f, "dataset holds {} sensor(s), at least 2 are needed", n)
            }
            ReplayError::InvalidLight {
                sensor_id,
                record,
                light,
            } => write!(
                f,
                "record {} gives sensor {} a light value of {}",
                record, sensor_id, light
            ),
        }
    }
}

impl std::error::Error for ReplayError {}

impl From<io::Error> for ReplayError {
    fn from(value: io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<csv::Error> for ReplayError {
    fn from(value: csv::Error) -> Self {
        Self::CsvError(value)
    }
}

#[derive(Debug, Deserialize)]
struct Row {
    sensor_id: SensorId,
    light: f64,
}

/// Replays recorded per-sensor light sequences.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    sensor_ids: Vec<SensorId>,
    sequences: Vec<Vec<f64>>,
    offset: usize,
    rng: StdRng,
}

impl ReplaySource {
    /// Load a dataset from a CSV file with `sensor_id` and `light` columns.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let file = File::open(path.as_ref())?;
        info!("Loading replay dataset {}", path.as_ref().display());
        Self::from_reader(file)
    }

    /// Load a dataset from anything that yields CSV text.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ReplayError> {
        let rows = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader)
            .into_deserialize::<Row>()
            .map(|row| row.map(|r| (r.sensor_id, r.light)))
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(rows)
    }

    /// Build from `(sensor_id, light)` pairs in recording order.
    ///
    /// Every light value must be finite and non-negative. A dataset with
    /// fewer than two sensors is refused here rather than replayed as
    /// nothing but synthetic frames.
    pub fn from_records<I>(records: I) -> Result<Self, ReplayError>
    where
        I: IntoIterator<Item = (SensorId, f64)>,
    {
        let mut grouped: BTreeMap<SensorId, Vec<f64>> = BTreeMap::new();
        for (record, (id, light)) in records.into_iter().enumerate() {
            if !(light.is_finite() && light >= 0.0) {
                return Err(ReplayError::InvalidLight {
                    sensor_id: id,
                    record,
                    light,
                });
            }
            grouped.entry(id).or_default().push(light);
        }

        if grouped.len() < 2 {
            return Err(ReplayError::TooFewSensors(grouped.len()));
        }
        if grouped.len() > MAX_REPLAY_SENSORS {
            info!(
                "Dataset holds {} sensors, replaying the first {}",
                grouped.len(),
                MAX_REPLAY_SENSORS
            );
        }

        let (sensor_ids, sequences) = grouped.into_iter().take(MAX_REPLAY_SENSORS).unzip();
        Ok(Self {
            sensor_ids,
            sequences,
            offset: REPLAY_OFFSET,
            rng: StdRng::from_entropy(),
        })
    }

    /// Use a fixed seed for the synthetic fallback values.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Change how far into every sequence frame zero starts.
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Ids served by each slot, ascending
    pub fn sensor_ids(&self) -> &[SensorId] {
        &self.sensor_ids
    }

    /// The value of every sensor slot at frame `index`.
    ///
    /// When fewer than two slots still have recorded data, two synthetic
    /// values are returned instead, so an estimate is always possible.
    pub fn get(&mut self, index: usize) -> ReplayFrame {
        let mut frame: ReplayFrame = [None; MAX_REPLAY_SENSORS];
        for (slot, sequence) in frame.iter_mut().zip(&self.sequences) {
            *slot = index
                .checked_add(self.offset)
                .and_then(|i| sequence.get(i))
                .copied();
        }

        if frame.iter().flatten().count() < 2 {
            debug!("Replay ran out of data at frame {}, synthesizing", index);
            frame = [None; MAX_REPLAY_SENSORS];
            for (slot, range) in frame.iter_mut().zip(FALLBACK_RANGES) {
                *slot = Some(self.rng.gen_range(range));
            }
        }

        frame
    }

    /// [`ReplaySource::get`], attributed to the sensor ids of each slot.
    pub fn readings(&mut self, index: usize) -> Vec<Reading> {
        let frame = self.get(index);
        self.sensor_ids
            .iter()
            .zip(frame)
            .filter_map(|(&sensor_id, value)| {
                value.map(|intensity| Reading {
                    sensor_id,
                    intensity,
                    seq: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ramp(len: usize, scale: f64) -> Vec<f64> {
        (0..len).map(|i| i as f64 * scale).collect()
    }

    fn records(ids: &[SensorId], len: usize) -> Vec<(SensorId, f64)> {
        ids.iter()
            .flat_map(|&id| ramp(len, id as f64).into_iter().map(move |v| (id, v)))
            .collect()
    }

    fn assert_fallback(frame: ReplayFrame) {
        let a = frame[0].unwrap();
        let b = frame[1].unwrap();
        assert!((20.0..30.0).contains(&a), "{}", a);
        assert!((30.0..40.0).contains(&b), "{}", b);
        assert_eq!(frame[2], None);
        assert_eq!(frame[3], None);
    }

    #[test]
    fn serves_values_past_the_offset() {
        let mut source = ReplaySource::from_records(records(&[2, 1], 1210)).unwrap();

        assert_eq!(source.sensor_ids(), &[1, 2]);
        let frame = source.get(3);
        assert_eq!(frame, [Some(1203.0), Some(2406.0), None, None]);
    }

    #[test]
    fn caps_at_four_sensors() {
        let mut source = ReplaySource::from_records(records(&[9, 5, 7, 1, 3], 1201)).unwrap();

        assert_eq!(source.sensor_ids(), &[1, 3, 5, 7]);
        assert_eq!(
            source.get(0),
            [Some(1200.0), Some(3600.0), Some(6000.0), Some(8400.0)]
        );
    }

    #[test]
    fn exhausted_data_falls_back() {
        let mut source = ReplaySource::from_records(records(&[1, 2, 3, 4], 1205))
            .unwrap()
            .with_seed(7);

        for index in [5, 6, 100, usize::MAX] {
            assert_fallback(source.get(index));
        }
    }

    #[test]
    fn single_survivor_falls_back() {
        let mut recs = records(&[1, 2], 1201);
        recs.extend(ramp(1300, 1.0).into_iter().map(|v| (3, v)));
        let mut source = ReplaySource::from_records(recs).unwrap();

        // Only sensor 3 has data at frame 50
        assert_fallback(source.get(50));
    }

    #[test]
    fn readings_follow_slot_ids() {
        let mut source = ReplaySource::from_records(records(&[10, 20, 30], 1202))
            .unwrap()
            .with_offset(0);

        let readings = source.readings(1);
        let ids: Vec<_> = readings.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
        assert_eq!(readings[2].intensity, 30.0);

        let fallback = source.readings(5000);
        let ids: Vec<_> = fallback.iter().map(|r| r.sensor_id).collect();
        assert_eq!(ids, vec![10, 20]);
    }

    #[test]
    fn loads_csv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sensor_id, light").unwrap();
        writeln!(file, "4, 130").unwrap();
        writeln!(file, "3, 512").unwrap();
        writeln!(file, "3, 498.5").unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::from_csv(file.path()).unwrap().with_offset(0);

        assert_eq!(source.sensor_ids(), &[3, 4]);
        assert_eq!(source.get(0), [Some(512.0), Some(130.0), None, None]);
        // Sensor 4 has nothing left at frame 1
        assert_fallback(source.get(1));
    }

    #[test]
    fn rejects_bad_datasets() {
        assert!(matches!(
            ReplaySource::from_csv("/definitely/not/here.csv"),
            Err(ReplayError::IoError(_))
        ));
        assert!(matches!(
            ReplaySource::from_reader("sensor_id,light\n1,bright\n".as_bytes()),
            Err(ReplayError::CsvError(_))
        ));
        assert!(matches!(
            ReplaySource::from_reader("sensor_id,light\n1,3\n1,4\n".as_bytes()),
            Err(ReplayError::TooFewSensors(1))
        ));
        assert!(matches!(
            ReplaySource::from_records(Vec::new()),
            Err(ReplayError::TooFewSensors(0))
        ));
    }

    #[test]
    fn rejects_unusable_light_values() {
        assert!(matches!(
            ReplaySource::from_reader("sensor_id,light\n1,NaN\n2,50\n".as_bytes()),
            Err(ReplayError::InvalidLight {
                sensor_id: 1,
                record: 0,
                ..
            })
        ));
        assert!(matches!(
            ReplaySource::from_reader("sensor_id,light\n1,20\n2,-50\n".as_bytes()),
            Err(ReplayError::InvalidLight {
                sensor_id: 2,
                record: 1,
                light,
            }) if light == -50.0
        ));
        assert!(matches!(
            ReplaySource::from_records(vec![(1, 3.0), (2, 4.0), (1, f64::INFINITY)]),
            Err(ReplayError::InvalidLight { record: 2, .. })
        ));

        // Zero is a legitimate reading
        assert!(ReplaySource::from_records(vec![(1, 0.0), (2, 0.0)]).is_ok());
    }
}
