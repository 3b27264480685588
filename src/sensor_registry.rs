//! The sensor/reading table. Every mote we have heard from, or that was
//! placed by hand, lives here along with the most recent [`Reading`] it
//! reported.
//!
//! Ownership is split: the reading pipeline decides which sensors *exist*
//! (see [`SensorRegistry::upsert`]), while positions and the `active` flag
//! belong to whoever lays out the map.

use crate::Point;
use log::info;

/// Mote ids as they appear on the wire
pub type SensorId = u32;

/// A single light intensity report.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    /// Mote that took the sample
    pub sensor_id: SensorId,
    /// Non-negative light intensity
    pub intensity: f64,
    /// Sequence number, if the sender included one
    pub seq: Option<u32>,
}

/// A light sensor on the map.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorNode {
    /// `None` for sensors placed by hand that never reported over the wire
    pub id: Option<SensorId>,
    /// Where the sensor sits on the map
    pub position: Point,
    /// Only active sensors are estimated from
    pub active: bool,
    /// The latest intensity for this sensor, if any
    pub intensity: Option<f64>,
    /// Sequence number of the latest reading, if the sender included one
    pub seq: Option<u32>,
}

/// What [`SensorRegistry::upsert`] did with a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The sensor was already known, its reading was replaced
    Updated(usize),
    /// The sensor was unknown and has been appended at the spawn point
    Registered(usize),
}

/// The table of sensors, indexed by insertion order.
#[derive(Debug, Clone)]
pub struct SensorRegistry {
    sensors: Vec<SensorNode>,
    spawn: Point,
}

impl SensorRegistry {
    /// An empty registry. Sensors discovered through [`SensorRegistry::upsert`]
    /// are placed at `spawn` until someone moves them.
    pub fn new(spawn: Point) -> Self {
        Self {
            sensors: Vec::new(),
            spawn,
        }
    }

    /// Place a sensor by hand, returns its index.
    pub fn add_sensor(&mut self, id: Option<SensorId>, position: Point, active: bool) -> usize {
        self.sensors.push(SensorNode {
            id,
            position,
            active,
            intensity: None,
            seq: None,
        });
        self.sensors.len() - 1
    }

    /// Store `reading` as the latest value of its sensor, registering the
    /// sensor first if its id has never been seen. Known sensors keep their
    /// position and `active` flag.
    pub fn upsert(&mut self, reading: Reading) -> Upsert {
        let outcome = match self.index_of(reading.sensor_id) {
            Some(i) => Upsert::Updated(i),
            None => {
                info!(
                    "Registering mote {} at {}",
                    reading.sensor_id, self.spawn
                );
                Upsert::Registered(self.add_sensor(Some(reading.sensor_id), self.spawn, true))
            }
        };

        let (Upsert::Updated(i) | Upsert::Registered(i)) = outcome;
        let node = &mut self.sensors[i];
        node.intensity = Some(reading.intensity);
        node.seq = reading.seq;

        outcome
    }

    /// Index of the sensor with the given wire id
    pub fn index_of(&self, id: SensorId) -> Option<usize> {
        self.sensors.iter().position(|s| s.id == Some(id))
    }

    /// The sensor at `index`, if any
    pub fn get(&self, index: usize) -> Option<&SensorNode> {
        self.sensors.get(index)
    }

    /// Every sensor, in registry order
    pub fn iter(&self) -> impl Iterator<Item = &SensorNode> {
        self.sensors.iter()
    }

    /// Number of sensors, active or not
    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    /// `true` before any sensor is placed or heard from
    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Move a sensor. Returns `false` if there is no sensor at `index`.
    pub fn set_position(&mut self, index: usize, position: Point) -> bool {
        self.sensors
            .get_mut(index)
            .map(|s| s.position = position)
            .is_some()
    }

    /// Include or exclude a sensor from estimation.
    pub fn set_active(&mut self, index: usize, active: bool) -> bool {
        self.sensors
            .get_mut(index)
            .map(|s| s.active = active)
            .is_some()
    }

    /// Overwrite the intensity of a sensor by hand, the way a slider would.
    pub fn set_intensity(&mut self, index: usize, intensity: f64) -> bool {
        self.sensors
            .get_mut(index)
            .map(|s| s.intensity = Some(intensity.max(0.0)))
            .is_some()
    }

    /// Positions and intensities of every active sensor that has a reading,
    /// in registry order. The two vectors always have the same length.
    pub fn observations(&self) -> (Vec<Point>, Vec<f64>) {
        self.sensors
            .iter()
            .filter(|s| s.active)
            .filter_map(|s| s.intensity.map(|i| (s.position, i)))
            .unzip()
    }
}
